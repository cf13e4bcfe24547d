// ============================================================
// Layer 2 — ForwardUseCase
// ============================================================
// Runs seeded forward passes and reports gate usage:
//
//   Step 1: Load the network      (checkpoint, or fresh from preset)
//   Step 2: Run `passes` passes   (Layer 5 - ml)
//   Step 3: Append each summary   (Layer 6 - infra, optional)
//
// Pass i uses seed `seed + i` (wrapping), so a run is reproducible end to end.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::domain::{config::PrecisionProfile, presets::Preset, summary::GateSummary};
use crate::infra::{checkpoint::CheckpointManager, gate_log::GateUsageLogger};
use crate::ml::inferencer::GateInferencer;

// ─── Forward Configuration ───────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardConfig {
    /// Ignored when `checkpoint_dir` is set
    pub preset:         Preset,
    pub precision:      PrecisionProfile,
    pub batch_size:     usize,
    pub image_size:     usize,
    pub passes:         usize,
    pub seed:           u64,
    pub checkpoint_dir: Option<String>,
    pub stats_dir:      Option<String>,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            preset:         Preset::Cifar10Gate38,
            precision:      PrecisionProfile::default(),
            batch_size:     4,
            image_size:     32,
            passes:         1,
            seed:           42,
            checkpoint_dir: None,
            stats_dir:      None,
        }
    }
}

pub struct ForwardUseCase {
    cfg: ForwardConfig,
}

impl ForwardUseCase {
    pub fn new(cfg: ForwardConfig) -> Self {
        Self { cfg }
    }

    /// Returns one summary per pass, in order.
    pub fn execute(&self) -> Result<Vec<GateSummary>> {
        let cfg = &self.cfg;
        ensure!(cfg.batch_size > 0, "batch size must be at least 1");
        ensure!(cfg.image_size > 0, "image size must be at least 1");

        let inferencer = match &cfg.checkpoint_dir {
            Some(dir) => GateInferencer::from_checkpoint(&CheckpointManager::new(dir)?)?,
            None => {
                tracing::info!(preset = %cfg.preset, "Building fresh network");
                GateInferencer::fresh(cfg.preset.config(cfg.precision.clone()))?
            }
        };

        let logger = cfg.stats_dir.as_ref().map(GateUsageLogger::new).transpose()?;

        let mut summaries = Vec::with_capacity(cfg.passes);
        for pass in 0..cfg.passes {
            let seed    = cfg.seed.wrapping_add(pass as u64);
            let summary = inferencer.run(cfg.batch_size, cfg.image_size, seed)?;

            tracing::info!(
                pass = pass + 1,
                execution_rate = summary.overall_execution_rate(),
                skipped = summary.skipped_evaluations(),
                "Pass complete"
            );

            if let Some(logger) = &logger {
                logger.log(pass + 1, &summary)?;
            }
            summaries.push(summary);
        }
        Ok(summaries)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::init_use_case::{InitConfig, InitUseCase};

    fn small(preset: Preset) -> ForwardConfig {
        ForwardConfig { preset, batch_size: 2, image_size: 8, ..Default::default() }
    }

    #[test]
    fn test_fresh_passes_report_preset_decisions() {
        let cfg = ForwardConfig { passes: 2, ..small(Preset::Cifar10Gate38) };
        let summaries = ForwardUseCase::new(cfg).execute().unwrap();

        assert_eq!(summaries.len(), 2);
        for s in &summaries {
            assert_eq!(s.batch_size, 2);
            assert_eq!(s.decisions(), 16);
            assert_eq!(s.downsample_count(), 2);
        }
    }

    #[test]
    fn test_zero_batch_is_rejected() {
        let cfg = ForwardConfig { batch_size: 0, ..Default::default() };
        assert!(ForwardUseCase::new(cfg).execute().is_err());
    }

    #[test]
    fn test_seed_near_max_wraps_instead_of_overflowing() {
        let cfg = ForwardConfig { seed: u64::MAX, passes: 2, ..small(Preset::Cifar10Gate38) };
        let summaries = ForwardUseCase::new(cfg).execute().unwrap();
        assert_eq!(summaries.len(), 2);
        assert!(summaries.iter().all(|s| s.decisions() == 16));
    }

    #[test]
    fn test_checkpointed_network_is_used_and_logged() {
        let ckpt  = tempfile::tempdir().unwrap();
        let stats = tempfile::tempdir().unwrap();
        let ckpt_dir = ckpt.path().to_string_lossy().into_owned();

        InitUseCase::new(InitConfig {
            preset:         Preset::Cifar100Gate38,
            precision:      PrecisionProfile::default(),
            checkpoint_dir: ckpt_dir.clone(),
        })
        .execute()
        .unwrap();

        let cfg = ForwardConfig {
            checkpoint_dir: Some(ckpt_dir),
            stats_dir:      Some(stats.path().to_string_lossy().into_owned()),
            passes:         3,
            ..small(Preset::Cifar10Gate18)
        };
        let summaries = ForwardUseCase::new(cfg.clone()).execute().unwrap();
        // the checkpoint's layout wins over the preset argument
        assert_eq!(summaries[0].decisions(), 16);

        let again = ForwardUseCase::new(cfg).execute().unwrap();
        assert_eq!(summaries, again);

        let csv = std::fs::read_to_string(stats.path().join("gate_usage.csv")).unwrap();
        assert_eq!(csv.lines().count(), 1 + 6);
    }
}
