// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores a SkipNet using Burn's CompactRecorder.
//
//   checkpoints/
//     skipnet.mpk            ← every parameter and BN running stat
//     network_config.json    ← NetworkConfig, including precision
//
// Weights alone cannot rebuild the network: the block layout,
// gate widths and precision profile come from the JSON file,
// the model is built from it, then the record is loaded in.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use std::{fs, path::{Path, PathBuf}};

use crate::domain::config::NetworkConfig;
use crate::ml::backbone::SkipNet;

const MODEL_FILE:  &str = "skipnet";
// extension CompactRecorder appends to MODEL_FILE
const MODEL_EXT:   &str = "mpk";
const CONFIG_FILE: &str = "network_config.json";

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates `dir` (and parents) if missing.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// True once both the weights and the config have been written.
    pub fn exists(&self) -> bool {
        self.dir.join(CONFIG_FILE).exists() && self.model_path().exists()
    }

    /// Full path of the weights file as written by the recorder.
    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE).with_extension(MODEL_EXT)
    }

    pub fn save_model<B: Backend>(&self, model: &SkipNet<B>) -> Result<()> {
        // recorder appends the extension
        let path = self.dir.join(MODEL_FILE);
        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        tracing::debug!(path = %path.display(), "Saved model weights");
        Ok(())
    }

    /// `model` must have been built from the stored config.
    pub fn load_model<B: Backend>(&self, model: SkipNet<B>, device: &B::Device) -> Result<SkipNet<B>> {
        let path = self.dir.join(MODEL_FILE);
        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Run 'init' first?", path.display())
            })?;

        Ok(model.load_record(record))
    }

    pub fn save_config(&self, cfg: &NetworkConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!(path = %path.display(), "Saved network config");
        Ok(())
    }

    /// Reads and re-validates the stored config.
    pub fn load_config(&self) -> Result<NetworkConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;

        let cfg: NetworkConfig = serde_json::from_str(&json)
            .with_context(|| format!("Malformed network config '{}'", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::PrecisionProfile;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn tiny() -> NetworkConfig {
        NetworkConfig::new(vec![1, 2], vec![4, 8], 3)
            .with_embed_dim(4)
            .with_hidden_dim(5)
            .with_precision(PrecisionProfile { num_bits: 6, predictive_forward: true, ..Default::default() })
    }

    fn weights(t: Tensor<TestBackend, 4>) -> Vec<f32> {
        t.into_data().convert::<f32>().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        ckpt.save_config(&tiny()).unwrap();
        assert_eq!(ckpt.load_config().unwrap(), tiny());
    }

    #[test]
    fn test_missing_checkpoint_is_an_error() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path().join("nested")).unwrap();
        assert!(!ckpt.exists());
        assert!(ckpt.load_config().is_err());

        let model = tiny().init::<TestBackend>(&Default::default()).unwrap();
        assert!(ckpt.load_model(model, &Default::default()).is_err());
    }

    #[test]
    fn test_exists_needs_both_weights_and_config() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();

        let model: SkipNet<TestBackend> = tiny().init(&Default::default()).unwrap();
        ckpt.save_model(&model).unwrap();
        assert!(ckpt.model_path().is_file());
        assert!(!ckpt.exists());

        ckpt.save_config(&tiny()).unwrap();
        assert!(ckpt.exists());
    }

    #[test]
    fn test_invalid_stored_config_is_rejected() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let bad  = NetworkConfig { group_widths: vec![4], ..tiny() };
        ckpt.save_config(&bad).unwrap();
        assert!(ckpt.load_config().is_err());
    }

    #[test]
    fn test_weights_survive_save_and_load() {
        let device = Default::default();
        let dir    = tempfile::tempdir().unwrap();
        let ckpt   = CheckpointManager::new(dir.path()).unwrap();

        let saved: SkipNet<TestBackend> = tiny().init(&device).unwrap();
        ckpt.save_model(&saved).unwrap();
        ckpt.save_config(&tiny()).unwrap();
        assert!(ckpt.exists());
        assert!(ckpt.model_path().is_file());

        let fresh: SkipNet<TestBackend> = ckpt.load_config().unwrap().init(&device).unwrap();
        let loaded = ckpt.load_model(fresh, &device).unwrap();

        // CompactRecorder stores half precision
        let before = weights(saved.stem.weight.val());
        let after  = weights(loaded.stem.weight.val());
        assert_eq!(before.len(), after.len());
        for (b, a) in before.iter().zip(&after) {
            assert!((b - a).abs() <= 1e-2 * b.abs().max(1.0), "{b} vs {a}");
        }
    }
}
