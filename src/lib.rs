//! Local Lorentz frames for particle-level networks.
//!
//! Gives every entity in a batch its own local reference frame (a 4x4
//! Lorentz matrix built from predicted candidate vectors) and transforms
//! tensor-valued features into and out of those frames. Canonicalized
//! features are exactly invariant under global Lorentz transforms of the
//! input, so any downstream network inherits equivariance for free.
//!
//! The crate splits into the metric algebra (`algebra`), the frame
//! construction engine (`frames`), the tensor representation algebra
//! (`reps`), the transform service (`transform`) and the pluggable
//! predictor/backbone contracts with shipped baselines (`predictor`,
//! `backbone`, `pipeline`).

pub mod algebra;
pub mod backbone;
pub mod config;
pub mod error;
pub mod frames;
pub mod pipeline;
pub mod predictor;
pub mod reps;
pub mod transform;

pub use config::{FrameConfig, FrameVariant};
pub use error::FrameError;
pub use frames::{assert_lorentz, regulate_momenta, FrameBuilder, RegularizationStats};
pub use pipeline::CanonicalizationPipeline;
pub use reps::{Parity, RepTerm, TensorRep};
pub use transform::{canonicalize, decanonicalize, relative_frames, relative_transform};
