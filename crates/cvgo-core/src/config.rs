//! Runtime configuration.
//!
//! Every tunable lives in one immutable [`Config`] that is loaded once (from a
//! TOML file or defaults) and handed by reference to each component when it is
//! constructed. Defaults reproduce the values the tracker was tuned with.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub tracking: TrackingConfig,
    pub trigger: TriggerConfig,
    pub process: ProcessConfig,
}

/// Blob tracker and angle filter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackingConfig {
    /// Side of the centred square used to seed the flood fill (pixels)
    pub reticle_size: u32,
    /// Side of the centred square inside which the aim point snaps to centre (pixels)
    pub no_aim_size: u32,
    /// Flood fill lattice step, also the side of each sampled block (pixels)
    pub sample_size: u32,
    /// Exponential smoothing divisor for the angle filter (K >= 1)
    pub smoothing: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            reticle_size: 40,
            no_aim_size: 80,
            sample_size: 2,
            smoothing: 4.0,
        }
    }
}

/// Trigger gesture thresholds, as percentages of the frame resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TriggerConfig {
    pub min_distance: f64,
    pub max_distance: f64,
    pub allowed_y_deviation: f64,
    pub allowed_x_deviation: f64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            min_distance: 3.0,
            max_distance: 15.0,
            allowed_y_deviation: 3.0,
            allowed_x_deviation: 2.0,
        }
    }
}

/// Target process settings used at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessConfig {
    /// Executable name of the target process
    pub name: String,
    /// Modules to record in the module table
    pub modules: Vec<String>,
    /// Delay between attempts while waiting for the process (ms)
    pub poll_interval_ms: u64,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            name: "csgo.exe".to_string(),
            modules: vec!["engine.dll".to_string(), "client.dll".to_string()],
            poll_interval_ms: 1000,
        }
    }
}

impl Config {
    /// Load and validate a configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        debug!("Loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        let tracking = &self.tracking;
        if tracking.sample_size == 0 {
            return Err(Error::InvalidConfig(
                "tracking.sample_size must be at least 1".to_string(),
            ));
        }
        if !tracking.smoothing.is_finite() || tracking.smoothing < 1.0 {
            return Err(Error::InvalidConfig(format!(
                "tracking.smoothing must be >= 1, got {}",
                tracking.smoothing
            )));
        }

        let trigger = &self.trigger;
        for (name, value) in [
            ("min_distance", trigger.min_distance),
            ("max_distance", trigger.max_distance),
            ("allowed_y_deviation", trigger.allowed_y_deviation),
            ("allowed_x_deviation", trigger.allowed_x_deviation),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "trigger.{} must be a non-negative percentage, got {}",
                    name, value
                )));
            }
        }
        if trigger.min_distance > trigger.max_distance {
            return Err(Error::InvalidConfig(format!(
                "trigger.min_distance ({}) exceeds trigger.max_distance ({})",
                trigger.min_distance, trigger.max_distance
            )));
        }

        if self.process.name.trim().is_empty() {
            return Err(Error::InvalidConfig("process.name is empty".to_string()));
        }

        Ok(())
    }
}
