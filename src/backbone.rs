//! Backbone contract.
//!
//! A backbone consumes canonicalized per-entity features together with
//! the frame stack (so it can derive relative frames for any entity pair
//! it exchanges messages between) and produces per-entity features in the
//! same local-frame convention. Two baselines ship with the crate: a
//! relative-frame message-passing layer and an invariant linear readout.

use crate::reps::TensorRep;
use crate::transform::relative_frames;
use ndarray::{s, Array1, Array3, Array4};
use std::error::Error;

pub trait Backbone: std::fmt::Debug {
    /// Maps `(batch, entity, C)` local features to `(batch, entity, C_out)`
    /// features, with `frames` available for relative-frame lookups.
    fn forward(
        &self,
        features: &Array3<f32>,
        frames: &Array4<f32>,
    ) -> Result<Array3<f32>, Box<dyn Error>>;
}

/// Mean message passing with relative frames.
///
/// Every entity i receives each neighbour j's features expressed in i's
/// frame via L_ij = L_i · L_j^-1 and adds their mean to its own. Features
/// must decompose under `rep`; scalars pass through the exchange
/// untouched, tensor blocks are re-expressed per pair.
#[derive(Debug, Clone)]
pub struct RelativeExchange {
    rep: TensorRep,
}

impl RelativeExchange {
    pub fn new(rep: TensorRep) -> Self {
        Self { rep }
    }
}

impl Backbone for RelativeExchange {
    fn forward(
        &self,
        features: &Array3<f32>,
        frames: &Array4<f32>,
    ) -> Result<Array3<f32>, Box<dyn Error>> {
        let shape = features.shape();
        let (batches, entities, channels) = (shape[0], shape[1], shape[2]);
        self.rep.validate_width(channels)?;

        let mut out = features.clone();
        if entities < 2 {
            return Ok(out);
        }
        for i in 0..entities {
            // Gather every entity's features and frames as i's neighbours;
            // alignment is (batch, neighbour).
            let frames_i = frames
                .slice(s![.., i..i + 1, .., ..])
                .to_owned()
                .broadcast((batches, entities, 4, 4))
                .ok_or("failed to broadcast receiver frames")?
                .to_owned();
            let received = relative_frames(&frames_i, frames)
                .and_then(|rel| crate::transform::canonicalize(features, &rel, &self.rep))?;

            for b in 0..batches {
                let mut mean = Array1::<f32>::zeros(channels);
                let mut count = 0.0f32;
                for j in 0..entities {
                    if j == i {
                        continue;
                    }
                    mean = mean + &received.slice(s![b, j, ..]);
                    count += 1.0;
                }
                mean.mapv_inplace(|x| x / count);
                let mut target = out.slice_mut(s![b, i, ..]);
                target += &mean;
            }
        }
        Ok(out)
    }
}

/// Linear readout over channels producing one output per entity.
///
/// On canonicalized (frame-invariant) inputs the output is a Lorentz
/// invariant, which is what the end-to-end invariance check exercises.
#[derive(Debug, Clone)]
pub struct InvariantReadout {
    weights: Array1<f32>,
    bias: f32,
}

impl InvariantReadout {
    /// Deterministic non-trivial weights; a trained head would replace
    /// them through the same constructor.
    pub fn new(in_channels: usize) -> Self {
        let weights = Array1::from_iter((0..in_channels).map(|c| 1.0 / (c as f32 + 1.0)));
        Self { weights, bias: 0.1 }
    }

    pub fn with_weights(weights: Array1<f32>, bias: f32) -> Self {
        Self { weights, bias }
    }
}

impl Backbone for InvariantReadout {
    fn forward(
        &self,
        features: &Array3<f32>,
        _frames: &Array4<f32>,
    ) -> Result<Array3<f32>, Box<dyn Error>> {
        let shape = features.shape();
        let (batches, entities, channels) = (shape[0], shape[1], shape[2]);
        if channels != self.weights.len() {
            return Err(format!(
                "readout configured for {} channels but features have {}",
                self.weights.len(),
                channels
            )
            .into());
        }
        let mut out = Array3::zeros((batches, entities, 1));
        for b in 0..batches {
            for n in 0..entities {
                let dot = features.slice(s![b, n, ..]).dot(&self.weights);
                out[[b, n, 0]] = dot + self.bias;
            }
        }
        Ok(out)
    }
}

/// Chains the relative exchange and the readout; the shape the demo and
/// the end-to-end tests run.
#[derive(Debug, Clone)]
pub struct ExchangeReadout {
    exchange: RelativeExchange,
    readout: InvariantReadout,
}

impl ExchangeReadout {
    pub fn new(rep: TensorRep) -> Self {
        let readout = InvariantReadout::new(rep.dim());
        Self {
            exchange: RelativeExchange::new(rep),
            readout,
        }
    }
}

impl Backbone for ExchangeReadout {
    fn forward(
        &self,
        features: &Array3<f32>,
        frames: &Array4<f32>,
    ) -> Result<Array3<f32>, Box<dyn Error>> {
        let mixed = self.exchange.forward(features, frames)?;
        self.readout.forward(&mixed, frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FrameConfig, FrameVariant};
    use crate::frames::FrameBuilder;
    use approx::assert_abs_diff_eq;
    use ndarray::Array4;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_frames(rng: &mut StdRng, b: usize, n: usize) -> Array4<f32> {
        let config = FrameConfig {
            variant: FrameVariant::Random,
            ..FrameConfig::default()
        };
        let builder = FrameBuilder::new(config).unwrap();
        let placeholder = Array4::zeros((b, n, 3, 4));
        builder.build(&placeholder, rng).unwrap().0
    }

    #[test]
    fn test_readout_shape_and_values() {
        let features = Array3::from_shape_fn((1, 2, 3), |(_, n, c)| (n * 3 + c) as f32);
        let frames = Array4::zeros((1, 2, 4, 4));
        let readout = InvariantReadout::with_weights(Array1::from(vec![1.0, 0.5, 0.25]), 0.0);
        let out = readout.forward(&features, &frames).unwrap();
        assert_eq!(out.shape(), &[1, 2, 1]);
        // Entity 0: 0*1 + 1*0.5 + 2*0.25 = 1.0
        assert_abs_diff_eq!(out[[0, 0, 0]], 1.0, epsilon = 1e-6);
        // Entity 1: 3*1 + 4*0.5 + 5*0.25 = 6.25
        assert_abs_diff_eq!(out[[0, 1, 0]], 6.25, epsilon = 1e-6);
    }

    #[test]
    fn test_readout_channel_mismatch_is_error() {
        let features = Array3::zeros((1, 2, 5));
        let frames = Array4::zeros((1, 2, 4, 4));
        let readout = InvariantReadout::new(3);
        assert!(readout.forward(&features, &frames).is_err());
    }

    #[test]
    fn test_exchange_preserves_shape_and_scalars_mix_plainly() {
        let mut rng = StdRng::seed_from_u64(5);
        let rep = TensorRep::parse("2x0n").unwrap();
        let frames = random_frames(&mut rng, 1, 3);
        let features = Array3::from_shape_fn((1, 3, 2), |(_, n, c)| (n + c) as f32);
        let exchange = RelativeExchange::new(rep);
        let out = exchange.forward(&features, &frames).unwrap();
        assert_eq!(out.shape(), &[1, 3, 2]);
        // Scalars are frame-independent: entity 0 channel 0 receives the
        // plain mean of entities 1 and 2.
        let expected = features[[0, 0, 0]] + (features[[0, 1, 0]] + features[[0, 2, 0]]) / 2.0;
        assert_abs_diff_eq!(out[[0, 0, 0]], expected, epsilon = 1e-5);
    }

    #[test]
    fn test_exchange_single_entity_is_identity() {
        let mut rng = StdRng::seed_from_u64(6);
        let rep = TensorRep::parse("1x1n").unwrap();
        let frames = random_frames(&mut rng, 1, 1);
        let features = Array3::from_shape_fn((1, 1, 4), |(_, _, c)| c as f32);
        let exchange = RelativeExchange::new(rep);
        let out = exchange.forward(&features, &frames).unwrap();
        assert_eq!(out, features);
    }

    #[test]
    fn test_exchange_rejects_wrong_width() {
        let mut rng = StdRng::seed_from_u64(7);
        let rep = TensorRep::parse("1x1n").unwrap();
        let frames = random_frames(&mut rng, 1, 2);
        let features = Array3::zeros((1, 2, 7));
        let exchange = RelativeExchange::new(rep);
        assert!(exchange.forward(&features, &frames).is_err());
    }
}
