//! Configuration types for index construction.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VecscanError};
use crate::metric::MetricType;

/// Configuration for a flat index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Vector dimension, fixed at construction.
    pub dimension: usize,
    /// Distance metric used to rank candidates.
    pub metric: MetricType,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dimension: 128,
            metric: MetricType::L2,
        }
    }
}

impl IndexConfig {
    /// Create a configuration with the given dimension and metric.
    pub fn new(dimension: usize, metric: MetricType) -> Self {
        Self { dimension, metric }
    }

    /// Validate this configuration.
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(VecscanError::configuration(
                "dimension must be a positive integer",
            ));
        }
        Ok(())
    }

    /// Parse a configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: IndexConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize this configuration to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Configuration for a fusion flat index.
///
/// Each stored item carries, next to its primary vector, a filter block of
/// `num_filters` auxiliary vectors of `filter_dim` floats each.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Primary vector dimension.
    pub dimension: usize,
    /// Number of filter vectors per item.
    pub num_filters: usize,
    /// Dimension of each filter vector.
    pub filter_dim: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            dimension: 128,
            num_filters: 1,
            filter_dim: 1,
        }
    }
}

impl FusionConfig {
    /// Create a fusion configuration.
    pub fn new(dimension: usize, num_filters: usize, filter_dim: usize) -> Self {
        Self {
            dimension,
            num_filters,
            filter_dim,
        }
    }

    /// Number of floats in one item's filter block.
    pub fn filter_len(&self) -> usize {
        self.num_filters * self.filter_dim
    }

    /// Validate this configuration.
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(VecscanError::configuration(
                "dimension must be a positive integer",
            ));
        }
        if self.num_filters == 0 || self.filter_dim == 0 {
            return Err(VecscanError::configuration(
                "filter shape must have positive num_filters and filter_dim",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = IndexConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.dimension, 128);
        assert_eq!(config.metric, MetricType::L2);
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let config = IndexConfig::new(0, MetricType::L2);
        assert!(matches!(
            config.validate(),
            Err(VecscanError::Configuration(_))
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let config = IndexConfig::new(64, MetricType::InnerProduct);
        let json = config.to_json().unwrap();
        let parsed = IndexConfig::from_json(&json).unwrap();
        assert_eq!(parsed.dimension, 64);
        assert_eq!(parsed.metric, MetricType::InnerProduct);
    }

    #[test]
    fn test_invalid_json_config_rejected() {
        let json = r#"{"dimension": 0, "metric": "l2"}"#;
        assert!(IndexConfig::from_json(json).is_err());
    }

    #[test]
    fn test_fusion_config_validation() {
        let config = FusionConfig::new(8, 3, 2);
        assert!(config.validate().is_ok());
        assert_eq!(config.filter_len(), 6);

        let bad = FusionConfig::new(8, 0, 2);
        assert!(matches!(bad.validate(), Err(VecscanError::Configuration(_))));
    }
}
