//! Parameter persistence.
//!
//! A checkpoint stores the configuration, the cutpoints, and every layer's
//! weights, bincode-encoded. Loading re-runs all construction checks, so a
//! checkpoint whose weights disagree with its own configuration is refused.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DdrError, DdrResult};
use crate::model::config::DdrConfig;
use crate::model::cutpoints::Cutpoints;
use crate::model::ddr::Ddr;
use crate::nn::linear::Linear;
use crate::nn::module::ModeControl;

/// Bumped whenever the on-disk layout changes.
pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Checkpoint {
    version: u32,
    config: DdrConfig,
    cutpoints: Cutpoints,
    hidden: Vec<Linear>,
    pi: Linear,
}

impl Ddr {
    /// Serialise configuration, cutpoints, and parameters.
    pub fn to_bytes(&self) -> DdrResult<Vec<u8>> {
        let checkpoint = Checkpoint {
            version: CHECKPOINT_VERSION,
            config: self.config().clone(),
            cutpoints: self.cutpoints().clone(),
            hidden: self.hidden_layers().to_vec(),
            pi: self.output_layer().clone(),
        };
        Ok(bincode::serialize(&checkpoint)?)
    }

    /// Restore a model. The result starts in eval mode.
    pub fn from_bytes(bytes: &[u8]) -> DdrResult<Self> {
        let checkpoint: Checkpoint = bincode::deserialize(bytes)?;
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(DdrError::CorruptCheckpoint(format!(
                "unsupported version {} (expected {})",
                checkpoint.version, CHECKPOINT_VERSION
            )));
        }
        let mut model = Ddr::from_parts(
            checkpoint.config,
            checkpoint.cutpoints,
            checkpoint.hidden,
            checkpoint.pi,
        )
        .map_err(|e| DdrError::CorruptCheckpoint(e.to_string()))?;
        model.eval();
        Ok(model)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> DdrResult<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        std::fs::write(path, &bytes)?;
        tracing::debug!("saved DDR checkpoint ({} bytes) to {}", bytes.len(), path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> DdrResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let model = Self::from_bytes(&bytes)?;
        tracing::debug!("loaded DDR checkpoint from {}", path.display());
        Ok(model)
    }
}
