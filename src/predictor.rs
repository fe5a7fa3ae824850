//! Vector predictor contract.
//!
//! The frame construction engine consumes K >= 3 candidate four-vectors
//! per entity. Where those come from is the caller's business; anything
//! satisfying `VectorPredictor` plugs in, as long as it is equivariant:
//! transforming the input momenta by a global Lorentz matrix must
//! transform every predicted candidate by the same matrix.

use ndarray::{Array3, Array4};
use std::error::Error;

pub trait VectorPredictor: std::fmt::Debug {
    /// Number K of candidate vectors produced per entity.
    fn num_candidates(&self) -> usize;

    /// Maps `(batch, entity, 4)` momenta and `(batch, entity, S)` scalars
    /// to `(batch, entity, K, 4)` candidate vectors.
    fn predict(
        &self,
        momenta: &Array3<f32>,
        scalars: &Array3<f32>,
    ) -> Result<Array4<f32>, Box<dyn Error>>;
}

/// Deterministic baseline predictor: candidate k of entity n is a fixed
/// positive mix of all entity momenta in the batch sample.
///
/// The mixing coefficients do not depend on the momenta, so the output is
/// exactly equivariant, and positive weights on physical (timelike,
/// positive-energy) momenta keep the first candidate timelike. Used by
/// the demo binary and the integration tests; a learned sub-network would
/// implement the same trait.
#[derive(Debug, Clone)]
pub struct MomentumMixPredictor {
    num_candidates: usize,
}

impl MomentumMixPredictor {
    pub fn new(num_candidates: usize) -> Result<Self, Box<dyn Error>> {
        if num_candidates < 3 {
            return Err(format!(
                "predictor must produce at least 3 candidates, got {}",
                num_candidates
            )
            .into());
        }
        Ok(Self { num_candidates })
    }

    fn coefficient(&self, k: usize, n: usize, j: usize, entities: usize) -> f32 {
        ((j + n) % entities + 1) as f32 / (k as f32 + 1.0) + (k * (j + 1)) as f32 * 0.3
    }
}

impl VectorPredictor for MomentumMixPredictor {
    fn num_candidates(&self) -> usize {
        self.num_candidates
    }

    fn predict(
        &self,
        momenta: &Array3<f32>,
        scalars: &Array3<f32>,
    ) -> Result<Array4<f32>, Box<dyn Error>> {
        let shape = momenta.shape();
        if shape.len() != 3 || shape[2] != 4 {
            return Err(format!(
                "predictor expects momenta of shape (batch, entity, 4), got {:?}",
                shape
            )
            .into());
        }
        let (batches, entities) = (shape[0], shape[1]);
        if scalars.shape()[0] != batches || scalars.shape()[1] != entities {
            return Err(format!(
                "scalar features {:?} do not match momenta batch/entity dims {:?}",
                scalars.shape(),
                &shape[..2]
            )
            .into());
        }

        let mut out = Array4::zeros((batches, entities, self.num_candidates, 4));
        for b in 0..batches {
            for n in 0..entities {
                for k in 0..self.num_candidates {
                    for j in 0..entities {
                        let coeff = self.coefficient(k, n, j, entities);
                        for c in 0..4 {
                            out[[b, n, k, c]] += coeff * momenta[[b, j, c]];
                        }
                    }
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use crate::algebra::dot4;
    use ndarray::{s, Array2};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rand_distr::StandardNormal;

    fn random_momenta(rng: &mut StdRng, b: usize, n: usize) -> Array3<f32> {
        let mut p = Array3::zeros((b, n, 4));
        for bi in 0..b {
            for ni in 0..n {
                let x: f32 = rng.sample(StandardNormal);
                let y: f32 = rng.sample(StandardNormal);
                let z: f32 = rng.sample(StandardNormal);
                let mass = 0.5 + rng.gen::<f32>();
                p[[bi, ni, 0]] = (mass * mass + x * x + y * y + z * z).sqrt();
                p[[bi, ni, 1]] = x;
                p[[bi, ni, 2]] = y;
                p[[bi, ni, 3]] = z;
            }
        }
        p
    }

    #[test]
    fn test_rejects_fewer_than_three_candidates() {
        assert!(MomentumMixPredictor::new(2).is_err());
        assert!(MomentumMixPredictor::new(3).is_ok());
    }

    #[test]
    fn test_output_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let momenta = random_momenta(&mut rng, 2, 5);
        let scalars = Array3::zeros((2, 5, 1));
        let predictor = MomentumMixPredictor::new(4).unwrap();
        let cands = predictor.predict(&momenta, &scalars).unwrap();
        assert_eq!(cands.shape(), &[2, 5, 4, 4]);
    }

    #[test]
    fn test_first_candidate_is_timelike() {
        let mut rng = StdRng::seed_from_u64(2);
        let momenta = random_momenta(&mut rng, 1, 6);
        let scalars = Array3::zeros((1, 6, 1));
        let predictor = MomentumMixPredictor::new(3).unwrap();
        let cands = predictor.predict(&momenta, &scalars).unwrap();
        for n in 0..6 {
            let v0 = cands.slice(s![0, n, 0, ..]);
            assert!(dot4(v0, v0) > 0.0, "candidate 0 of entity {} not timelike", n);
            assert!(v0[0] > 0.0);
        }
    }

    #[test]
    fn test_equivariance_under_boost() {
        let mut rng = StdRng::seed_from_u64(3);
        let momenta = random_momenta(&mut rng, 1, 4);
        let scalars = Array3::zeros((1, 4, 2));
        let predictor = MomentumMixPredictor::new(3).unwrap();

        // Boost along y with beta = 0.5.
        let beta = 0.5f32;
        let gamma = 1.0 / (1.0 - beta * beta).sqrt();
        let mut lambda = Array2::eye(4);
        lambda[[0, 0]] = gamma;
        lambda[[0, 2]] = -gamma * beta;
        lambda[[2, 0]] = -gamma * beta;
        lambda[[2, 2]] = gamma;

        let mut transformed = Array3::zeros((1, 4, 4));
        for n in 0..4 {
            let v = lambda.dot(&momenta.slice(s![0, n, ..]));
            transformed.slice_mut(s![0, n, ..]).assign(&v);
        }

        let cands = predictor.predict(&momenta, &scalars).unwrap();
        let cands_t = predictor.predict(&transformed, &scalars).unwrap();
        for n in 0..4 {
            for k in 0..3 {
                let expected: ndarray::Array1<f32> = lambda.dot(&cands.slice(s![0, n, k, ..]));
                for c in 0..4 {
                    assert_abs_diff_eq!(cands_t[[0, n, k, c]], expected[c], epsilon = 1e-4);
                }
            }
        }
    }

    #[test]
    fn test_shape_mismatch_is_error() {
        let momenta = Array3::zeros((1, 4, 4));
        let scalars = Array3::zeros((1, 3, 1));
        let predictor = MomentumMixPredictor::new(3).unwrap();
        assert!(predictor.predict(&momenta, &scalars).is_err());
    }
}
