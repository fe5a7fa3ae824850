use clap::Parser;
use lorentz_frames::backbone::ExchangeReadout;
use lorentz_frames::predictor::{MomentumMixPredictor, VectorPredictor};
use lorentz_frames::{
    assert_lorentz, canonicalize, CanonicalizationPipeline, FrameBuilder, FrameConfig,
    FrameVariant, TensorRep,
};
use ndarray::{s, Array3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Runs a synthetic particle batch through frame construction,
/// canonicalization and the baseline backbone, printing diagnostics.
#[derive(Parser, Debug)]
#[command(name = "frame_demo")]
struct Args {
    /// Number of batch samples
    #[arg(long, default_value_t = 8)]
    batches: usize,

    /// Entities (particles) per batch sample
    #[arg(long, default_value_t = 10)]
    entities: usize,

    /// Frame variant: full_lorentz, so3, so2, random or identity.
    /// Overrides the config file when given.
    #[arg(long)]
    variant: Option<String>,

    /// Random seed for input generation and regularization noise.
    /// Overrides the config file when given.
    #[arg(long)]
    seed: Option<u64>,

    /// Optional JSON config file
    #[arg(long)]
    config: Option<String>,
}

/// Config file first, explicit flags on top. Flags left unset keep
/// whatever the file (or the defaults) declared.
fn resolve_config(
    path: Option<&str>,
    variant: Option<&str>,
    seed: Option<u64>,
) -> Result<FrameConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(p) => FrameConfig::load(p)?,
        None => FrameConfig::default(),
    };
    if let Some(v) = variant {
        config.variant = v.parse::<FrameVariant>()?;
    }
    if let Some(s) = seed {
        config.seed = s;
    }
    Ok(config)
}

fn random_momenta(rng: &mut StdRng, batches: usize, entities: usize) -> Array3<f32> {
    let mut p = Array3::zeros((batches, entities, 4));
    for b in 0..batches {
        for n in 0..entities {
            let x: f32 = rng.sample(StandardNormal);
            let y: f32 = rng.sample(StandardNormal);
            let z: f32 = rng.sample(StandardNormal);
            let mass = 0.1 + rng.gen::<f32>();
            p[[b, n, 0]] = (mass * mass + x * x + y * y + z * z).sqrt();
            p[[b, n, 1]] = x;
            p[[b, n, 2]] = y;
            p[[b, n, 3]] = z;
        }
    }
    p
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = resolve_config(
        args.config.as_deref(),
        args.variant.as_deref(),
        args.seed,
    )?;

    println!(
        "Generating {} batches of {} entities (variant {:?}, seed {})",
        args.batches, args.entities, config.variant, config.seed
    );

    let mut rng = StdRng::seed_from_u64(config.seed);
    let momenta = random_momenta(&mut rng, args.batches, args.entities);
    let scalars = Array3::from_shape_fn((args.batches, args.entities, 1), |(b, n, _)| {
        (b + n) as f32 * 0.05
    });

    // Frame diagnostics on the raw construction path.
    let builder = FrameBuilder::new(config)?;
    let predictor = MomentumMixPredictor::new(3)?;
    let regulated = lorentz_frames::regulate_momenta(&momenta, config.mass_floor)?;
    let candidates = predictor.predict(&regulated, &scalars)?;
    let (frames, stats) = builder.build(&candidates, &mut rng)?;
    println!(
        "Constructed {} frames; regularization: {} lightlike, {} collinear ({:.3}% of entities)",
        stats.entities,
        stats.lightlike,
        stats.collinear,
        100.0 * stats.trigger_fraction()
    );
    assert_lorentz(&frames, 1e-3)?;
    println!("All frames satisfy L^T g L = g within 1e-3.");

    let momentum_rep = TensorRep::parse("1x1n")?;
    let local = canonicalize(&regulated, &frames, &momentum_rep)?;
    let sample: ndarray::ArrayView1<f32> = local.slice(s![0, 0, ..]);
    println!(
        "Entity (0,0) canonicalized momentum: [{:.4}, {:.4}, {:.4}, {:.4}]",
        sample[0], sample[1], sample[2], sample[3]
    );

    // Full pipeline with the baseline backbone.
    let feature_rep = TensorRep::parse("1x1n+1x0n")?;
    let pipeline = CanonicalizationPipeline::new(
        config,
        Box::new(MomentumMixPredictor::new(3)?),
        Box::new(ExchangeReadout::new(feature_rep)),
        TensorRep::parse("1x0n")?,
    )?;
    let mut pipeline_rng = StdRng::seed_from_u64(config.seed);
    let (output, pipeline_stats) = pipeline.forward(&momenta, &scalars, &mut pipeline_rng)?;

    let mean: f32 = output.iter().sum::<f32>() / output.len() as f32;
    println!(
        "Pipeline output shape {:?}, mean {:.5}, regularization triggers {}",
        output.shape(),
        mean,
        pipeline_stats.total()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_file_fields_survive_without_flags() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(file, r#"{{"variant": "so2", "seed": 42}}"#)?;
        let path = file.path().to_str().ok_or("temp path not utf-8")?.to_string();

        let config = resolve_config(Some(&path), None, None)?;
        assert_eq!(config.variant, FrameVariant::So2);
        assert_eq!(config.seed, 42);
        Ok(())
    }

    #[test]
    fn test_flags_override_config_file() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(file, r#"{{"variant": "so2", "seed": 42}}"#)?;
        let path = file.path().to_str().ok_or("temp path not utf-8")?.to_string();

        let config = resolve_config(Some(&path), Some("identity"), Some(7))?;
        assert_eq!(config.variant, FrameVariant::Identity);
        assert_eq!(config.seed, 7);
        Ok(())
    }

    #[test]
    fn test_no_file_no_flags_is_default() {
        let config = resolve_config(None, None, None).unwrap();
        assert_eq!(config.variant, FrameConfig::default().variant);
        assert_eq!(config.seed, FrameConfig::default().seed);
    }
}
