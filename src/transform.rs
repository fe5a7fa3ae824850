//! Representation-aware frame transforms.
//!
//! Canonicalization applies each entity's local frame to its feature
//! tensor block by block, following the declared `TensorRep`: scalars are
//! untouched, four-vector blocks transform as v -> Lv, and rank-r blocks
//! contract L along each of their r tensor axes. Decanonicalization uses
//! the metric inverse g L^T g; the relative transform composes the two
//! frame matrices first and applies the result once.

use crate::algebra::lorentz_inverse;
use crate::error::FrameError;
use crate::reps::TensorRep;
use ndarray::{s, Array1, Array3, Array4, ArrayView1, ArrayView2};
use std::error::Error;

fn check_shapes(
    features: &Array3<f32>,
    frames: &Array4<f32>,
    rep: &TensorRep,
) -> Result<(), FrameError> {
    let f = features.shape();
    let l = frames.shape();
    rep.validate_width(f[2])?;
    if l[2] != 4 || l[3] != 4 {
        return Err(FrameError::Configuration(format!(
            "frames must have shape (batch, entity, 4, 4), got {:?}",
            l
        )));
    }
    if f[0] != l[0] || f[1] != l[1] {
        return Err(FrameError::Configuration(format!(
            "feature batch/entity dims {:?} do not match frame dims {:?}",
            &f[..2],
            &l[..2]
        )));
    }
    Ok(())
}

/// Contracts `l` along each of the `rank` tensor axes of a flattened
/// rank-`rank` block of length 4^rank.
fn transform_block(l: &ArrayView2<f32>, block: ArrayView1<f32>, rank: usize) -> Array1<f32> {
    let mut current = block.to_owned();
    for axis in 0..rank {
        let lead = 4usize.pow(axis as u32);
        let trail = 4usize.pow((rank - axis - 1) as u32);
        let mut next = Array1::zeros(current.len());
        for i in 0..lead {
            for j in 0..trail {
                for alpha in 0..4 {
                    let mut acc = 0.0f32;
                    for beta in 0..4 {
                        acc += l[[alpha, beta]] * current[(i * 4 + beta) * trail + j];
                    }
                    next[(i * 4 + alpha) * trail + j] = acc;
                }
            }
        }
        current = next;
    }
    current
}

/// Applies per-entity matrices to a feature tensor under `rep`. The
/// matrices are consumed as-is; callers pick L, L^-1 or a composition.
fn apply(
    features: &Array3<f32>,
    matrices: &dyn Fn(usize, usize) -> ndarray::Array2<f32>,
    shape: (usize, usize),
    rep: &TensorRep,
) -> Array3<f32> {
    let (batches, entities) = shape;
    let mut out = features.clone();
    for b in 0..batches {
        for n in 0..entities {
            let l = matrices(b, n);
            let mut offset = 0usize;
            for term in rep.terms() {
                let block_len = 4usize.pow(term.rank as u32);
                for m in 0..term.mult {
                    let start = offset + m * block_len;
                    if term.rank == 0 {
                        continue;
                    }
                    let block = features.slice(s![b, n, start..start + block_len]);
                    let transformed = transform_block(&l.view(), block, term.rank);
                    out.slice_mut(s![b, n, start..start + block_len])
                        .assign(&transformed);
                }
                offset += term.channels();
            }
        }
    }
    out
}

/// Global -> local: applies each entity's frame to its features.
pub fn canonicalize(
    features: &Array3<f32>,
    frames: &Array4<f32>,
    rep: &TensorRep,
) -> Result<Array3<f32>, Box<dyn Error>> {
    check_shapes(features, frames, rep)?;
    let shape = (features.shape()[0], features.shape()[1]);
    Ok(apply(
        features,
        &|b, n| frames.slice(s![b, n, .., ..]).to_owned(),
        shape,
        rep,
    ))
}

/// Local -> global: applies the metric inverse of each entity's frame.
/// Inverse of `canonicalize` up to floating-point error.
pub fn decanonicalize(
    features: &Array3<f32>,
    frames: &Array4<f32>,
    rep: &TensorRep,
) -> Result<Array3<f32>, Box<dyn Error>> {
    check_shapes(features, frames, rep)?;
    let shape = (features.shape()[0], features.shape()[1]);
    Ok(apply(
        features,
        &|b, n| lorentz_inverse(&frames.slice(s![b, n, .., ..])),
        shape,
        rep,
    ))
}

/// The batch of relative frames L_ij = L_i · L_j^-1 mapping frame j's
/// coordinates into frame i's. Inputs are aligned `(batch, pair, 4, 4)`
/// stacks gathered by the caller.
pub fn relative_frames(
    frames_i: &Array4<f32>,
    frames_j: &Array4<f32>,
) -> Result<Array4<f32>, Box<dyn Error>> {
    if frames_i.shape() != frames_j.shape() {
        return Err(format!(
            "relative_frames expects matching shapes, got {:?} and {:?}",
            frames_i.shape(),
            frames_j.shape()
        )
        .into());
    }
    let shape = frames_i.shape();
    if shape.len() != 4 || shape[2] != 4 || shape[3] != 4 {
        return Err(format!(
            "relative_frames expects (batch, pair, 4, 4) stacks, got {:?}",
            shape
        )
        .into());
    }
    let mut out = Array4::zeros((shape[0], shape[1], 4, 4));
    for b in 0..shape[0] {
        for n in 0..shape[1] {
            let li = frames_i.slice(s![b, n, .., ..]);
            let lj_inv = lorentz_inverse(&frames_j.slice(s![b, n, .., ..]));
            out.slice_mut(s![b, n, .., ..]).assign(&li.dot(&lj_inv));
        }
    }
    Ok(out)
}

/// Expresses features held in frame j directly in frame i by composing
/// L_ij = L_i · L_j^-1 first and transforming once. Mathematically equal
/// to decanonicalizing with L_j then canonicalizing with L_i.
pub fn relative_transform(
    features_j: &Array3<f32>,
    frames_i: &Array4<f32>,
    frames_j: &Array4<f32>,
    rep: &TensorRep,
) -> Result<Array3<f32>, Box<dyn Error>> {
    let composed = relative_frames(frames_i, frames_j)?;
    canonicalize(features_j, &composed, rep)
}
