// ============================================================
// Layer 2 — InitUseCase
// ============================================================
// Builds a freshly initialised network from a preset and stores
// it as a checkpoint:
//
//   Step 1: Preset + precision → NetworkConfig   (Layer 3 - domain)
//   Step 2: Build the network                    (Layer 5 - ml)
//   Step 3: Save config and weights              (Layer 6 - infra)

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::{config::{NetworkConfig, PrecisionProfile}, presets::Preset};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::InferBackend;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitConfig {
    pub preset:         Preset,
    pub precision:      PrecisionProfile,
    pub checkpoint_dir: String,
}

pub struct InitUseCase {
    cfg: InitConfig,
}

impl InitUseCase {
    pub fn new(cfg: InitConfig) -> Self {
        Self { cfg }
    }

    /// Returns the config that was written.
    pub fn execute(&self) -> Result<NetworkConfig> {
        let network = self.cfg.preset.config(self.cfg.precision.clone());
        let device  = Default::default();
        let model   = network.init::<InferBackend>(&device)?;

        let ckpt = CheckpointManager::new(&self.cfg.checkpoint_dir)?;
        ckpt.save_config(&network)?;
        ckpt.save_model(&model)?;

        tracing::info!(
            preset = %self.cfg.preset,
            blocks = network.total_blocks(),
            dir = %ckpt.dir().display(),
            "Checkpoint written"
        );
        Ok(network)
    }
}
