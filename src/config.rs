//! Registry configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// How a re-detection changes the TTL of an existing track.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlPolicy {
    /// `ttl += 1` on every hit. Tracks that are seen often accumulate credit.
    #[default]
    Increment,
    /// `ttl = default_ttl` on every hit.
    Reset,
}

/// Noise parameters for the constant-velocity Kalman estimator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanParams {
    /// Process noise spectral density (units^2 / s^3).
    pub process_noise: f64,
    /// Measurement noise variance (units^2).
    pub measurement_noise: f64,
    /// Initial variance of x, y, width and height.
    pub initial_position_variance: f64,
    /// Initial variance of the rates.
    pub initial_velocity_variance: f64,
}

impl Default for KalmanParams {
    fn default() -> Self {
        Self {
            process_noise: 1.0,
            measurement_noise: 4.0,
            initial_position_variance: 10.0,
            initial_velocity_variance: 10_000.0,
        }
    }
}

impl KalmanParams {
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("process_noise", self.process_noise, false),
            ("measurement_noise", self.measurement_noise, true),
            ("initial_position_variance", self.initial_position_variance, true),
            ("initial_velocity_variance", self.initial_velocity_variance, true),
        ];
        for (name, value, strictly_positive) in checks {
            let ok = value.is_finite() && if strictly_positive { value > 0.0 } else { value >= 0.0 };
            if !ok {
                return Err(Error::InvalidConfig(format!(
                    "{} must be {}, got {}",
                    name,
                    if strictly_positive { "positive" } else { "non-negative" },
                    value
                )));
            }
        }
        Ok(())
    }
}

/// Configuration for the track registry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Batches a new track survives without being re-detected.
    pub default_ttl: i32,

    /// Idle time after which a track is dropped regardless of its TTL.
    pub max_idle_ms: i64,

    /// TTL change applied on re-detection.
    pub ttl_policy: TtlPolicy,

    /// Clamp predicted width/height to zero instead of returning negative sizes.
    /// Set to false to reproduce the unclamped historical output.
    pub clamp_predicted_size: bool,

    /// Parameters of the default Kalman estimator.
    pub kalman: KalmanParams,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new(5, 5000)
    }
}

impl RegistryConfig {
    /// Create a configuration with the given lifetimes and default everything else.
    ///
    /// # Arguments
    /// * `default_ttl` - Batches-to-live for new tracks
    /// * `max_idle_ms` - Idle timeout in milliseconds
    pub fn new(default_ttl: i32, max_idle_ms: i64) -> Self {
        Self {
            default_ttl,
            max_idle_ms,
            ttl_policy: TtlPolicy::default(),
            clamp_predicted_size: true,
            kalman: KalmanParams::default(),
        }
    }

    /// Builder-style TTL policy override.
    pub fn with_ttl_policy(mut self, policy: TtlPolicy) -> Self {
        self.ttl_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_ttl < 1 {
            return Err(Error::InvalidConfig(format!(
                "default_ttl must be at least 1, got {}",
                self.default_ttl
            )));
        }
        if self.max_idle_ms < 0 {
            return Err(Error::InvalidConfig(format!(
                "max_idle_ms must be non-negative, got {}",
                self.max_idle_ms
            )));
        }
        self.kalman.validate()
    }

    /// Parse and validate a JSON configuration document.
    ///
    /// Missing fields take their default values.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }
}
