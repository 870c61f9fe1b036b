//! DDR construction parameters.

use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_DROPOUT_RATE, DEFAULT_HIDDEN_SIZE, DEFAULT_NUM_HIDDEN_LAYERS};
use crate::error::{DdrError, DdrResult};

/// Network shape and regularisation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DdrConfig {
    /// Input feature dimension.
    pub p: usize,

    /// Number of (affine, ReLU, dropout) blocks.
    pub num_hidden_layers: usize,

    /// Width of every hidden block.
    pub hidden_size: usize,

    /// Probability of zeroing a hidden unit in training mode.
    pub dropout_rate: f32,

    /// Seed for parameter initialisation and the default dropout source.
    pub seed: u64,
}

impl Default for DdrConfig {
    fn default() -> Self {
        Self {
            p: 1,
            num_hidden_layers: DEFAULT_NUM_HIDDEN_LAYERS,
            hidden_size: DEFAULT_HIDDEN_SIZE,
            dropout_rate: DEFAULT_DROPOUT_RATE,
            seed: 0,
        }
    }
}

impl DdrConfig {
    /// Defaults for everything except the input dimension.
    pub fn new(p: usize) -> Self {
        Self {
            p,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> DdrResult<()> {
        for (name, value) in [
            ("p", self.p),
            ("num_hidden_layers", self.num_hidden_layers),
            ("hidden_size", self.hidden_size),
        ] {
            if value == 0 {
                return Err(DdrError::InvalidDimension { name, value });
            }
        }
        if !self.dropout_rate.is_finite() || !(0.0..1.0).contains(&self.dropout_rate) {
            return Err(DdrError::InvalidDropoutRate(self.dropout_rate));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = DdrConfig::new(5);
        assert_eq!(c.p, 5);
        assert_eq!(c.num_hidden_layers, 2);
        assert_eq!(c.hidden_size, 100);
        assert!((c.dropout_rate - 0.2).abs() < 1e-7);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let c = DdrConfig::new(0);
        assert!(matches!(
            c.validate(),
            Err(DdrError::InvalidDimension { name: "p", .. })
        ));
        let c = DdrConfig {
            hidden_size: 0,
            ..DdrConfig::new(3)
        };
        assert!(matches!(
            c.validate(),
            Err(DdrError::InvalidDimension {
                name: "hidden_size",
                ..
            })
        ));
        let c = DdrConfig {
            num_hidden_layers: 0,
            ..DdrConfig::new(3)
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_dropout_range() {
        let c = DdrConfig {
            dropout_rate: 1.0,
            ..DdrConfig::new(3)
        };
        assert!(matches!(c.validate(), Err(DdrError::InvalidDropoutRate(_))));
    }
}
