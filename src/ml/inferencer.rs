// ============================================================
// Layer 5 — Inferencer
// ============================================================
use anyhow::Result;
use burn::{prelude::*, tensor::TensorData};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::domain::config::NetworkConfig;
use crate::domain::summary::GateSummary;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::backbone::SkipNet;
use crate::ml::InferBackend;

pub struct GateInferencer {
    model:  SkipNet<InferBackend>,
    config: NetworkConfig,
    device: <InferBackend as Backend>::Device,
}

impl GateInferencer {
    /// Randomly initialised network built from `config`.
    pub fn fresh(config: NetworkConfig) -> Result<Self> {
        let device = Default::default();
        let model  = config.init::<InferBackend>(&device)?;
        Ok(Self { model, config, device })
    }

    /// Network restored from the weights and config stored in `ckpt_manager`.
    pub fn from_checkpoint(ckpt_manager: &CheckpointManager) -> Result<Self> {
        let device = Default::default();
        let config = ckpt_manager.load_config()?;
        let model  = config.init::<InferBackend>(&device)?;
        let model  = ckpt_manager.load_model(model, &device)?;
        tracing::info!(blocks = config.total_blocks(), "Model loaded from checkpoint");
        Ok(Self { model, config, device })
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn model(&self) -> &SkipNet<InferBackend> {
        &self.model
    }

    /// One forward pass over a batch of images drawn uniformly from [-1, 1).
    /// The same seeded RNG drives the images and every gate sample, so equal
    /// seeds give equal summaries.
    pub fn run(&self, batch_size: usize, image_size: usize, seed: u64) -> Result<GateSummary> {
        let mut rng = StdRng::seed_from_u64(seed);
        let images  = self.random_images(&mut rng, batch_size, image_size);

        let output  = self.model.forward(images, &mut rng)?;
        let summary = output.summary()?;

        tracing::debug!(
            batch_size,
            image_size,
            seed,
            decisions = summary.decisions(),
            execution_rate = summary.overall_execution_rate(),
            "forward pass finished"
        );
        Ok(summary)
    }

    fn random_images(&self, rng: &mut StdRng, batch_size: usize, image_size: usize) -> Tensor<InferBackend, 4> {
        let shape = [batch_size, self.config.in_channels, image_size, image_size];
        let len   = shape.iter().product::<usize>();
        let data: Vec<f32> = (0..len).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
        Tensor::from_data(TensorData::new(data, shape), &self.device)
    }
}
