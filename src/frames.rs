//! Frame construction engine.
//!
//! Maps per-entity candidate four-vectors to a local Lorentz frame
//! L = R·B, where B is the pure boost into the rest frame of the first
//! candidate and R the rotation aligning the boosted second and third
//! candidates with fixed spatial axes. Degenerate inputs (lightlike first
//! candidate, collinear spatial directions) are repaired with seeded noise
//! and counted; they never raise.

use crate::algebra::{cross3v, dot4, norm4, normalize4};
use crate::config::{FrameConfig, FrameVariant};
use crate::error::FrameError;
use ndarray::{s, Array1, Array2, Array3, Array4, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;
use std::error::Error;

/// Counters of how often the degeneracy guards fired in one batch.
///
/// Exposed for diagnostics: a high trigger fraction means ill-conditioned
/// upstream input, not a numerical emergency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegularizationStats {
    pub entities: usize,
    pub lightlike: usize,
    pub collinear: usize,
}

impl RegularizationStats {
    pub fn total(&self) -> usize {
        self.lightlike + self.collinear
    }

    pub fn trigger_fraction(&self) -> f32 {
        if self.entities == 0 {
            0.0
        } else {
            self.total() as f32 / self.entities as f32
        }
    }
}

/// Raises each four-vector's energy component until its squared Minkowski
/// norm is at least `mass_floor`^2. Shares the floor semantics of the
/// frame construction guards but runs as input pre-processing.
pub fn regulate_momenta(momenta: &Array3<f32>, mass_floor: f32) -> Result<Array3<f32>, Box<dyn Error>> {
    let shape = momenta.shape();
    if shape.len() != 3 || shape[2] != 4 {
        return Err(format!(
            "regulate_momenta expects momenta of shape (batch, entity, 4), got {:?}",
            shape
        )
        .into());
    }
    let floor_sq = mass_floor * mass_floor;
    let mut out = momenta.clone();
    for b in 0..shape[0] {
        for n in 0..shape[1] {
            let p = momenta.slice(s![b, n, ..]);
            if dot4(p, p) < floor_sq {
                let spatial_sq = p[1] * p[1] + p[2] * p[2] + p[3] * p[3];
                out[[b, n, 0]] = (floor_sq + spatial_sq).sqrt();
            }
        }
    }
    Ok(out)
}

/// A strictly timelike noise four-vector: component-wise |N(0,1)| with the
/// energy component set to twice the spatial norm.
fn timelike_noise(rng: &mut StdRng) -> Array1<f32> {
    let x: f32 = rng.sample::<f32, _>(StandardNormal).abs();
    let y: f32 = rng.sample::<f32, _>(StandardNormal).abs();
    let z: f32 = rng.sample::<f32, _>(StandardNormal).abs();
    let e = 2.0 * (x * x + y * y + z * z).sqrt();
    Array1::from(vec![e, x, y, z])
}

fn gaussian3(rng: &mut StdRng) -> Array1<f32> {
    Array1::from(vec![
        rng.sample::<f32, _>(StandardNormal),
        rng.sample::<f32, _>(StandardNormal),
        rng.sample::<f32, _>(StandardNormal),
    ])
}

fn gaussian4(rng: &mut StdRng) -> Array1<f32> {
    Array1::from(vec![
        rng.sample::<f32, _>(StandardNormal),
        rng.sample::<f32, _>(StandardNormal),
        rng.sample::<f32, _>(StandardNormal),
        rng.sample::<f32, _>(StandardNormal),
    ])
}

/// Pure boost carrying the unit timelike vector `u` onto the rest axis:
/// B·u = (1, 0, 0, 0). Requires u[0] > 0.
fn boost_to_rest(u: ArrayView1<f32>) -> Array2<f32> {
    let mut b = Array2::zeros((4, 4));
    b[[0, 0]] = u[0];
    for i in 1..4 {
        b[[0, i]] = -u[i];
        b[[i, 0]] = -u[i];
        for j in 1..4 {
            let delta = if i == j { 1.0 } else { 0.0 };
            b[[i, j]] = delta + u[i] * u[j] / (1.0 + u[0]);
        }
    }
    b
}

/// 3D Gram-Schmidt: orthonormal right-handed basis from two non-collinear
/// spatial vectors.
fn gram_schmidt3(
    w1: ArrayView1<f32>,
    w2: ArrayView1<f32>,
    eps: f32,
) -> (Array1<f32>, Array1<f32>, Array1<f32>) {
    let norm_b = |w: &Array1<f32>| -> Array1<f32> {
        let n = (w[0] * w[0] + w[1] * w[1] + w[2] * w[2]).sqrt() + eps;
        w.mapv(|x| x / n)
    };
    let e1 = norm_b(&w1.to_owned());
    let proj = w2[0] * e1[0] + w2[1] * e1[1] + w2[2] * e1[2];
    let ortho = w2.to_owned() - &e1.mapv(|x| x * proj);
    let e2 = norm_b(&ortho);
    let e3 = cross3v(e1.view(), e2.view());
    (e1, e2, e3)
}

/// Builds per-entity local Lorentz frames from candidate vector sets.
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    config: FrameConfig,
}

impl FrameBuilder {
    pub fn new(config: FrameConfig) -> Result<Self, FrameError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Constructs one frame per entity from `(batch, entity, K, 4)`
    /// candidates, K >= 3 (only the first three are used).
    ///
    /// Returns the `(batch, entity, 4, 4)` frame stack together with the
    /// regularization counters for the batch. Degenerate candidates are
    /// repaired with noise from `rng` and never raise; a trigger fraction
    /// above `warn_fraction` is logged as a warning.
    pub fn build(
        &self,
        candidates: &Array4<f32>,
        rng: &mut StdRng,
    ) -> Result<(Array4<f32>, RegularizationStats), Box<dyn Error>> {
        let shape = candidates.shape();
        if shape.len() != 4 || shape[3] != 4 {
            return Err(format!(
                "candidate vectors must have shape (batch, entity, K, 4), got {:?}",
                shape
            )
            .into());
        }
        let (batches, entities, k) = (shape[0], shape[1], shape[2]);
        if k < 3 {
            return Err(FrameError::Configuration(format!(
                "frame construction needs at least 3 candidate vectors per entity, got K={}",
                k
            ))
            .into());
        }

        let mut stats = RegularizationStats {
            entities: batches * entities,
            ..Default::default()
        };
        let mut frames = Array4::zeros((batches, entities, 4, 4));

        if self.config.variant == FrameVariant::Identity {
            for b in 0..batches {
                for n in 0..entities {
                    frames.slice_mut(s![b, n, .., ..]).assign(&Array2::eye(4));
                }
            }
            return Ok((frames, stats));
        }

        let mut working: Array4<f32> = candidates.slice(s![.., .., 0..3, ..]).to_owned();
        self.apply_variant_overrides(&mut working, rng);
        self.condition_candidates(&mut working);

        for b in 0..batches {
            for n in 0..entities {
                let mut v0 = working.slice(s![b, n, 0, ..]).to_owned();
                if norm4(v0.view()) < self.config.eps_lightlike {
                    // Project onto the timelike cone before perturbing:
                    // energy at twice the spatial norm keeps the boost
                    // moderate even for lightlike or spacelike candidates
                    // with large components.
                    let spatial = (v0[1] * v0[1] + v0[2] * v0[2] + v0[3] * v0[3]).sqrt();
                    v0[0] = 2.0 * spatial.max(self.config.eps_lightlike);
                    let noise = timelike_noise(rng);
                    v0 = v0 + &noise.mapv(|x| x * self.config.eps_lightlike);
                    stats.lightlike += 1;
                }
                let mut u = normalize4(v0.view(), self.config.eps_norm);
                if u[0] < 0.0 {
                    u.mapv_inplace(|x| -x);
                }
                let boost = boost_to_rest(u.view());

                let bv1: Array1<f32> = boost.dot(&working.slice(s![b, n, 1, ..]));
                let bv2: Array1<f32> = boost.dot(&working.slice(s![b, n, 2, ..]));
                let mut w1 = bv1.slice(s![1..4]).to_owned();
                let mut w2 = bv2.slice(s![1..4]).to_owned();

                let cross = cross3v(w1.view(), w2.view());
                let cross_norm = (cross[0] * cross[0] + cross[1] * cross[1] + cross[2] * cross[2]).sqrt();
                if cross_norm < self.config.eps_collinear {
                    w1 = w1 + &gaussian3(rng).mapv(|x| x * self.config.eps_collinear);
                    w2 = w2 + &gaussian3(rng).mapv(|x| x * self.config.eps_collinear);
                    stats.collinear += 1;
                }

                let (e1, e2, e3) = gram_schmidt3(w1.view(), w2.view(), self.config.eps_norm);
                let mut rotation = Array2::zeros((4, 4));
                rotation[[0, 0]] = 1.0;
                for i in 0..3 {
                    rotation[[1, i + 1]] = e1[i];
                    rotation[[2, i + 1]] = e2[i];
                    rotation[[3, i + 1]] = e3[i];
                }

                let local = rotation.dot(&boost);
                frames.slice_mut(s![b, n, .., ..]).assign(&local);
            }
        }

        if stats.trigger_fraction() > self.config.warn_fraction {
            log::warn!(
                "degeneracy regularization fired for {:.2}% of entities ({} lightlike, {} collinear of {}); upstream input is ill-conditioned",
                100.0 * stats.trigger_fraction(),
                stats.lightlike,
                stats.collinear,
                stats.entities
            );
        } else if stats.total() > 0 {
            log::debug!(
                "degeneracy regularization: {} lightlike, {} collinear of {} entities",
                stats.lightlike,
                stats.collinear,
                stats.entities
            );
        }

        Ok((frames, stats))
    }

    /// Subgroup-restricted variants pin candidate slots to fixed axes; the
    /// random variant replaces all three with sampled vectors.
    fn apply_variant_overrides(&self, working: &mut Array4<f32>, rng: &mut StdRng) {
        let (batches, entities) = (working.shape()[0], working.shape()[1]);
        let rest_axis = Array1::from(vec![1.0f32, 0.0, 0.0, 0.0]);
        let z_axis = Array1::from(vec![0.0f32, 0.0, 0.0, 1.0]);
        match self.config.variant {
            FrameVariant::FullLorentz | FrameVariant::Identity => {}
            FrameVariant::So3 => {
                for b in 0..batches {
                    for n in 0..entities {
                        working.slice_mut(s![b, n, 0, ..]).assign(&rest_axis);
                    }
                }
            }
            FrameVariant::So2 => {
                for b in 0..batches {
                    for n in 0..entities {
                        working.slice_mut(s![b, n, 0, ..]).assign(&rest_axis);
                        working.slice_mut(s![b, n, 1, ..]).assign(&z_axis);
                    }
                }
            }
            FrameVariant::Random => {
                for b in 0..batches {
                    for n in 0..entities {
                        working.slice_mut(s![b, n, 0, ..]).assign(&timelike_noise(rng));
                        working.slice_mut(s![b, n, 1, ..]).assign(&gaussian4(rng));
                        working.slice_mut(s![b, n, 2, ..]).assign(&gaussian4(rng));
                    }
                }
            }
        }
    }

    /// Per batch sample and candidate index, scale so the summed squared
    /// component norm over entities is one. Conditioning only: a positive
    /// per-candidate scale changes neither the boost direction nor the
    /// Gram-Schmidt output.
    fn condition_candidates(&self, working: &mut Array4<f32>) {
        let (batches, entities) = (working.shape()[0], working.shape()[1]);
        for b in 0..batches {
            for k in 0..3 {
                let mut sum_sq = 0.0f32;
                for n in 0..entities {
                    for c in 0..4 {
                        let x = working[[b, n, k, c]];
                        sum_sq += x * x;
                    }
                }
                let scale = 1.0 / (sum_sq.sqrt() + self.config.eps_norm);
                working.slice_mut(s![b, .., k, ..]).mapv_inplace(|x| x * scale);
            }
        }
    }
}

/// Defensive check that every frame satisfies L^T g L = g within `tol`.
///
/// Intended for tests and debug builds; production passes skip it.
pub fn assert_lorentz(frames: &Array4<f32>, tol: f32) -> Result<(), FrameError> {
    let shape = frames.shape();
    if shape.len() != 4 || shape[2] != 4 || shape[3] != 4 {
        return Err(FrameError::InvariantViolation(format!(
            "expected frames of shape (batch, entity, 4, 4), got {:?}",
            shape
        )));
    }
    for b in 0..shape[0] {
        for n in 0..shape[1] {
            let l = frames.slice(s![b, n, .., ..]);
            let residual = lorentz_residual(&l);
            if !residual.is_finite() || residual > tol {
                return Err(FrameError::InvariantViolation(format!(
                    "frame at (batch {}, entity {}) violates L^T g L = g: residual {:e} > {:e}",
                    b, n, residual, tol
                )));
            }
        }
    }
    Ok(())
}

/// Max-abs deviation of L^T g L from g.
pub fn lorentz_residual(l: &ArrayView2<f32>) -> f32 {
    use crate::algebra::METRIC;
    let mut worst = 0.0f32;
    for i in 0..4 {
        for j in 0..4 {
            let mut acc = 0.0f32;
            for a in 0..4 {
                acc += l[[a, i]] * METRIC[a] * l[[a, j]];
            }
            let expected = if i == j { METRIC[i] } else { 0.0 };
            let dev = (acc - expected).abs();
            if !dev.is_finite() {
                return f32::INFINITY;
            }
            if dev > worst {
                worst = dev;
            }
        }
    }
    worst
}
