use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Upper bound on the simulated compute latency. The compute stub blocks the MMIO access path
/// for this long, so keep it bounded.
pub const MAX_COMPUTE_LATENCY_MS: u64 = 10_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid device config json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("compute latency {latency_ms} ms exceeds the maximum of {max_ms} ms")]
    LatencyTooLarge { latency_ms: u64, max_ms: u64 },
}

/// Construction-time configuration of an [`crate::InferenceDevice`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InferenceDeviceConfig {
    /// How long the default compute stub blocks a `START` command.
    pub compute_latency_ms: u64,
    /// Byte the default compute stub writes to every output byte.
    pub output_fill: u8,
}

impl Default for InferenceDeviceConfig {
    fn default() -> Self {
        Self {
            compute_latency_ms: 10,
            output_fill: 0x01,
        }
    }
}

impl InferenceDeviceConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compute_latency_ms > MAX_COMPUTE_LATENCY_MS {
            return Err(ConfigError::LatencyTooLarge {
                latency_ms: self.compute_latency_ms,
                max_ms: MAX_COMPUTE_LATENCY_MS,
            });
        }
        Ok(())
    }

    pub fn compute_latency(&self) -> Duration {
        Duration::from_millis(self.compute_latency_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = InferenceDeviceConfig::from_json_str(r#"{"output_fill": 7}"#).unwrap();
        assert_eq!(config.output_fill, 7);
        assert_eq!(config.compute_latency_ms, 10);

        let config = InferenceDeviceConfig::from_json_str("{}").unwrap();
        assert_eq!(config, InferenceDeviceConfig::default());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = InferenceDeviceConfig::from_json_str(r#"{"fill": 7}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)), "{err}");
    }

    #[test]
    fn latency_is_bounded() {
        let err = InferenceDeviceConfig::from_json_str(r#"{"compute_latency_ms": 10001}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::LatencyTooLarge {
                latency_ms: 10_001,
                max_ms: MAX_COMPUTE_LATENCY_MS
            }
        ));
    }
}
