use serde::{Deserialize, Serialize};

use crate::select::RateSelector;
use crate::{Error, Result};

/// Settings for a subsampling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubsampleConfig {
    /// Probability of keeping each point.
    pub rate: f32,
    /// Fixed seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for SubsampleConfig {
    fn default() -> Self {
        Self {
            rate: 0.06,
            seed: None,
        }
    }
}

impl SubsampleConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.rate) {
            return Err(Error::InvalidRate(self.rate));
        }
        Ok(())
    }

    pub fn selector(&self) -> Result<RateSelector> {
        self.validate()?;
        Ok(RateSelector::new(self.rate, self.seed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config = SubsampleConfig::from_json_str(r#"{ "seed": 42 }"#).unwrap();
        assert_eq!(
            config,
            SubsampleConfig {
                rate: 0.06,
                seed: Some(42)
            }
        );
    }

    #[test]
    fn rate_out_of_range() {
        let err = SubsampleConfig::from_json_str(r#"{ "rate": 1.5 }"#).unwrap_err();
        assert!(matches!(err, Error::InvalidRate(r) if r == 1.5));

        let config = SubsampleConfig {
            rate: f32::NAN,
            seed: None,
        };
        assert!(config.selector().is_err());
    }

    #[test]
    fn selector_uses_rate() {
        let selector = SubsampleConfig { rate: 0.5, seed: Some(1) }.selector().unwrap();
        assert_eq!(selector.rate(), 0.5);
    }
}
