//! Consolidator configuration: resource-dimension weights and default predicate parameters.
//!
//! A `*Raw` struct with optional fields deserialized from YAML, merged over hard-coded defaults.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ConsolidationError;

const WEIGHT_EPSILON: f64 = 1e-9;

/// Auxiliary structure used to parse `ConsolidatorConfig` from a YAML file.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
pub struct ConsolidatorConfigRaw {
    /// weight given to the compute (MIPS) dimension in tie-breaks; must sum with `w_iops` to 1.0
    pub w_mips: Option<f64>,
    /// weight given to the storage I/O (IOPS) dimension in tie-breaks
    pub w_iops: Option<f64>,
    /// default static over-utilization threshold, used by `StaticThresholdPredicate`
    pub static_overload_threshold: Option<f64>,
    /// multiplier applied to the spread in `MadThresholdPredicate`/`IqrThresholdPredicate`
    pub adaptive_threshold_multiplier: Option<f64>,
}

/// Errors that can occur while loading a `ConsolidatorConfig` from disk.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("could not read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error(transparent)]
    Invalid(#[from] ConsolidationError),
}

/// Resource-dimension weights and default predicate parameters for the consolidation planner.
#[derive(Debug, PartialEq, Clone)]
pub struct ConsolidatorConfig {
    pub w_mips: f64,
    pub w_iops: f64,
    pub static_overload_threshold: f64,
    pub adaptive_threshold_multiplier: f64,
}

impl ConsolidatorConfig {
    /// Creates a config with explicit weights, validating `w_mips + w_iops == 1.0`.
    pub fn new(w_mips: f64, w_iops: f64) -> Result<Self, ConsolidationError> {
        if (w_mips + w_iops - 1.0).abs() > WEIGHT_EPSILON {
            return Err(ConsolidationError::ConfigInvalid { w_mips, w_iops });
        }
        Ok(Self {
            w_mips,
            w_iops,
            static_overload_threshold: 0.8,
            adaptive_threshold_multiplier: 1.0,
        })
    }

    /// Default config: weights split evenly, 0.8 static threshold.
    pub fn default_weights() -> Self {
        Self::new(0.5, 0.5).unwrap()
    }

    /// Loads a config from a YAML file, merging any present fields over defaults.
    pub fn from_file(path: &str) -> Result<Self, ConfigLoadError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_string(),
            source,
        })?;
        let raw: ConsolidatorConfigRaw = serde_yaml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
            path: path.to_string(),
            source,
        })?;
        let default = Self::default_weights();
        let mut config = Self::new(
            raw.w_mips.unwrap_or(default.w_mips),
            raw.w_iops.unwrap_or(default.w_iops),
        )?;
        config.static_overload_threshold = raw
            .static_overload_threshold
            .unwrap_or(default.static_overload_threshold);
        config.adaptive_threshold_multiplier = raw
            .adaptive_threshold_multiplier
            .unwrap_or(default.adaptive_threshold_multiplier);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_weights_not_summing_to_one() {
        let err = ConsolidatorConfig::new(0.6, 0.5).unwrap_err();
        assert_eq!(
            err,
            ConsolidationError::ConfigInvalid {
                w_mips: 0.6,
                w_iops: 0.5
            }
        );
    }

    #[test]
    fn accepts_weights_within_epsilon() {
        assert!(ConsolidatorConfig::new(0.7, 0.3_0000000001).is_ok());
    }

    #[test]
    fn from_file_merges_over_defaults() {
        let dir = std::env::temp_dir();
        let path = dir.join("vm_consolidator_test_config.yaml");
        std::fs::write(&path, "w_mips: 0.7\nw_iops: 0.3\n").unwrap();
        let config = ConsolidatorConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.w_mips, 0.7);
        assert_eq!(config.w_iops, 0.3);
        assert_eq!(config.static_overload_threshold, 0.8);
        std::fs::remove_file(&path).ok();
    }
}
