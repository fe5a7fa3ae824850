use crate::error::FrameError;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Frame construction strategy, selectable from configuration.
///
/// All variants share the same input/output contract; the restricted ones
/// pin some candidate vectors to fixed axes and are equivariant only under
/// the corresponding subgroup.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FrameVariant {
    /// Boost + rotation from three predicted vectors (default).
    FullLorentz,
    /// Time axis pinned; rotation from two predicted vectors. SO(3) only.
    So3,
    /// Time and z axes pinned; one predicted vector remains. SO(2) only.
    So2,
    /// Random Lorentz frame per entity, for augmentation.
    Random,
    /// L = identity, no-op baseline.
    Identity,
}

impl FromStr for FrameVariant {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full_lorentz" => Ok(FrameVariant::FullLorentz),
            "so3" => Ok(FrameVariant::So3),
            "so2" => Ok(FrameVariant::So2),
            "random" => Ok(FrameVariant::Random),
            "identity" => Ok(FrameVariant::Identity),
            other => Err(FrameError::Configuration(format!(
                "unknown frame variant '{}' (expected full_lorentz, so3, so2, random or identity)",
                other
            ))),
        }
    }
}

/// Configuration surface of the frame construction engine.
///
/// Every field has a serde default so a partial JSON file only overrides
/// what it names. The epsilons are detection thresholds and noise scales
/// for the degeneracy guards; `mass_floor` is the shared floor used by
/// `regulate_momenta`; `warn_fraction` is the diagnostic threshold above
/// which a batch's regularization rate is logged as a warning.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct FrameConfig {
    pub variant: FrameVariant,
    pub eps_lightlike: f32,
    pub eps_collinear: f32,
    pub eps_norm: f32,
    pub mass_floor: f32,
    pub warn_fraction: f32,
    pub seed: u64,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            variant: FrameVariant::FullLorentz,
            eps_lightlike: 1e-6,
            eps_collinear: 1e-6,
            eps_norm: 1e-15,
            mass_floor: 1e-3,
            warn_fraction: 0.01,
            seed: 0,
        }
    }
}

impl FrameConfig {
    pub fn load(config_path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        if !Path::new(config_path).exists() {
            return Err(format!("Config file not found at: {}", config_path).into());
        }

        let mut file = File::open(config_path)
            .map_err(|e| format!("Failed to open config file {}: {}", config_path, e))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| format!("Failed to read config file {}: {}", config_path, e))?;

        let config: FrameConfig = serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to deserialize JSON from {}: {}", config_path, e))?;

        Ok(config)
    }

    /// Sanity checks on the numeric fields; raised at builder construction.
    pub fn validate(&self) -> Result<(), FrameError> {
        if !(self.eps_lightlike > 0.0 && self.eps_collinear > 0.0 && self.eps_norm > 0.0) {
            return Err(FrameError::Configuration(format!(
                "regularization epsilons must be positive, got lightlike={}, collinear={}, norm={}",
                self.eps_lightlike, self.eps_collinear, self.eps_norm
            )));
        }
        if self.mass_floor < 0.0 {
            return Err(FrameError::Configuration(format!(
                "mass floor must be non-negative, got {}",
                self.mass_floor
            )));
        }
        if !(0.0..=1.0).contains(&self.warn_fraction) {
            return Err(FrameError::Configuration(format!(
                "warn fraction must lie in [0, 1], got {}",
                self.warn_fraction
            )));
        }
        Ok(())
    }
}
