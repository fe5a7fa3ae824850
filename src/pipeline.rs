//! End-to-end canonicalization pipeline.
//!
//! regulate momenta -> predict candidate vectors -> construct frames ->
//! canonicalize the momenta -> concatenate scalars -> backbone ->
//! decanonicalize. All intermediates are transient per forward call;
//! nothing is cached across batches.

use crate::backbone::Backbone;
use crate::config::FrameConfig;
use crate::frames::{FrameBuilder, RegularizationStats};
use crate::predictor::VectorPredictor;
use crate::reps::TensorRep;
use crate::transform::{canonicalize, decanonicalize};
use ndarray::{concatenate, Array3, Axis};
use rand::rngs::StdRng;
use std::error::Error;

pub struct CanonicalizationPipeline {
    builder: FrameBuilder,
    predictor: Box<dyn VectorPredictor>,
    backbone: Box<dyn Backbone>,
    momentum_rep: TensorRep,
    output_rep: TensorRep,
}

impl CanonicalizationPipeline {
    /// `output_rep` declares the backbone output's decomposition; for
    /// scalar outputs the final decanonicalization is a no-op but the
    /// declared width is still validated.
    pub fn new(
        config: FrameConfig,
        predictor: Box<dyn VectorPredictor>,
        backbone: Box<dyn Backbone>,
        output_rep: TensorRep,
    ) -> Result<Self, Box<dyn Error>> {
        let builder = FrameBuilder::new(config)?;
        let momentum_rep = TensorRep::parse("1x1n")?;
        Ok(Self {
            builder,
            predictor,
            backbone,
            momentum_rep,
            output_rep,
        })
    }

    /// Runs one forward evaluation over `(batch, entity, 4)` momenta and
    /// `(batch, entity, S)` scalar features.
    pub fn forward(
        &self,
        momenta: &Array3<f32>,
        scalars: &Array3<f32>,
        rng: &mut StdRng,
    ) -> Result<(Array3<f32>, RegularizationStats), Box<dyn Error>> {
        let regulated = crate::frames::regulate_momenta(momenta, self.builder.config().mass_floor)?;
        let candidates = self.predictor.predict(&regulated, scalars)?;
        let (frames, stats) = self.builder.build(&candidates, rng)?;

        let local_momenta = canonicalize(&regulated, &frames, &self.momentum_rep)?;
        let features = concatenate(Axis(2), &[local_momenta.view(), scalars.view()])
            .map_err(|e| format!("failed to concatenate momenta and scalars: {}", e))?;

        let output = self.backbone.forward(&features, &frames)?;
        let global = decanonicalize(&output, &frames, &self.output_rep)?;
        Ok((global, stats))
    }
}
