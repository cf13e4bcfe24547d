// ============================================================
// Layer 5 — Gated Backbone (SkipNet)
// ============================================================
// Runs every forward pass through the same fixed sequence:
//
//   STEM          qconv3x3 → BN → ReLU, reset gate state
//   FIRST_BLOCK   block (0, 0) runs unconditionally,
//                 its output feeds the first gate decision
//   GATED_BLOCK   for every later block, in layout order:
//                   prev ← projection(prev)   if the block has one
//                   raw  ← block(x)
//                   x    ← mask ⊙ raw + (1 − mask) ⊙ prev
//                   prev ← x
//                   next decision from x (not after the last block)
//   CLASSIFY      global avg pool → flatten → linear
//
// mask ≈ 1 keeps the block's computed output, mask ≈ 0 carries
// the activation from before the block forward unchanged.
//
// Stages are stored in an ordered Vec, one entry per block, each
// addressed by (group, position).
//
// Reference: Burn Book §3 (Building Blocks)
//            Wang et al. (2018) SkipNet: Learning Dynamic Routing

use burn::{
    nn::{
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        BatchNorm, BatchNormConfig, Initializer, Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::relu,
};

use crate::domain::config::NetworkConfig;
use crate::domain::error::{ConfigError, SkipNetError, SkipNetResult};
use crate::domain::summary::GateSummary;
use crate::domain::traits::GateSampler;
use crate::ml::block::BasicBlock;
use crate::ml::gate::{GateDecision, GateEmbedding, RnnGate, RnnGateConfig};
use crate::ml::quant_conv::{PredictiveConv2d, PredictiveConv2dConfig};

// ─── GatedStage ───────────────────────────────────────────────────────────────
/// One residual block and the extractor that turns its output into a gate
/// embedding. The structurally last stage has no extractor.
#[derive(Module, Debug)]
pub struct GatedStage<B: Backend> {
    pub block:    BasicBlock<B>,
    pub gate:     Option<GateEmbedding<B>>,
    pub group:    usize,
    pub position: usize,
}

// ─── GatedOutput ──────────────────────────────────────────────────────────────
/// Everything a forward pass hands to the (external) loss computation.
#[derive(Debug, Clone)]
pub struct GatedOutput<B: Backend> {
    /// [batch, num_classes]
    pub logits:      Tensor<B, 2>,
    /// Hard masks, each [batch]; `total_blocks - 2` entries
    pub masks:       Vec<Tensor<B, 1>>,
    /// Gate probabilities, each [batch]; same length as `masks`
    pub probs:       Vec<Tensor<B, 1>>,
    /// One flag per block: was `prev` projected before the blend
    pub downsampled: Vec<bool>,
}

impl<B: Backend> GatedOutput<B> {
    /// Read the decisions back into plain numbers.
    pub fn summary(&self) -> SkipNetResult<GateSummary> {
        let batch_size = self.logits.dims()[0];
        let masks = self.masks.iter().cloned().map(read_f32).collect::<SkipNetResult<Vec<_>>>()?;
        let probs = self.probs.iter().cloned().map(read_f32).collect::<SkipNetResult<Vec<_>>>()?;
        Ok(GateSummary::from_decisions(batch_size, &masks, &probs, self.downsampled.clone()))
    }
}

pub(crate) fn read_f32<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> SkipNetResult<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| SkipNetError::Readback(format!("{e:?}")))
}

// ─── Blend ────────────────────────────────────────────────────────────────────
/// `mask ⊙ raw + (1 − mask) ⊙ prev` with a per-sample mask of shape [B, 1, 1, 1].
pub fn blend<B: Backend>(mask: Tensor<B, 4>, raw: Tensor<B, 4>, prev: Tensor<B, 4>) -> SkipNetResult<Tensor<B, 4>> {
    let shape = raw.dims();
    if prev.dims() != shape {
        return Err(SkipNetError::Shape {
            context:  "gate blend (carried activation)",
            expected: shape.to_vec(),
            actual:   prev.dims().to_vec(),
        });
    }
    if mask.dims() != [shape[0], 1, 1, 1] {
        return Err(SkipNetError::Shape {
            context:  "gate blend (mask)",
            expected: vec![shape[0], 1, 1, 1],
            actual:   mask.dims().to_vec(),
        });
    }

    let mask = mask.expand(raw.shape());
    let keep = mask.clone().neg().add_scalar(1.0);
    Ok(mask * raw + keep * prev)
}

// ─── Model ────────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct SkipNet<B: Backend> {
    pub stem:        PredictiveConv2d<B>,
    pub stem_bn:     BatchNorm<B, 2>,
    pub stages:      Vec<GatedStage<B>>,
    pub control:     RnnGate<B>,
    pub pool:        AdaptiveAvgPool2d,
    pub fc:          Linear<B>,
    pub in_channels: usize,
}

impl NetworkConfig {
    /// Validate the configuration and build the network on `device`.
    pub fn init<B: Backend>(&self, device: &B::Device) -> SkipNetResult<SkipNet<B>> {
        self.validate()?;

        let profile     = &self.precision;
        let layout      = self.block_layout();
        let stem_width  = self.group_widths[0];
        let final_width = self.final_width().ok_or(ConfigError::NoGroups)?;
        let last        = layout.len() - 1;

        let stem = PredictiveConv2dConfig::conv3x3(self.in_channels, stem_width, profile)
            .with_input_signed(true)
            .init(device);

        let stages = layout
            .iter()
            .enumerate()
            .map(|(idx, spec)| {
                Ok(GatedStage {
                    block:    BasicBlock::init(spec, profile, device)?,
                    gate:     (idx != last)
                        .then(|| GateEmbedding::init(spec.out_channels, self.embed_dim, profile, device)),
                    group:    spec.group,
                    position: spec.position,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let fc_std = (2.0 / (final_width * self.num_classes) as f64).sqrt();
        let fc = LinearConfig::new(final_width, self.num_classes)
            .with_initializer(Initializer::Normal { mean: 0.0, std: fc_std })
            .init(device);

        tracing::debug!(
            blocks = stages.len(),
            groups = self.blocks_per_group.len(),
            num_bits = profile.num_bits,
            num_bits_weight = profile.num_bits_weight,
            num_bits_grad = ?profile.num_bits_grad,
            predictive_forward = profile.predictive_forward,
            predictive_backward = profile.predictive_backward,
            "SkipNet built"
        );

        Ok(SkipNet {
            stem,
            stem_bn: BatchNormConfig::new(stem_width).init(device),
            stages,
            control: RnnGateConfig::new(self.embed_dim, self.hidden_dim).init(device),
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc,
            in_channels: self.in_channels,
        })
    }
}

impl<B: Backend> SkipNet<B> {
    /// images: [batch, channels, height, width]
    pub fn forward<S: GateSampler>(&self, images: Tensor<B, 4>, sampler: &mut S) -> SkipNetResult<GatedOutput<B>> {
        self.run(images, sampler, None)
    }

    /// Like [`forward`](Self::forward), additionally returning the activation
    /// after every block (after blending, for gated blocks).
    pub fn forward_traced<S: GateSampler>(
        &self,
        images:  Tensor<B, 4>,
        sampler: &mut S,
    ) -> SkipNetResult<(GatedOutput<B>, Vec<Tensor<B, 4>>)> {
        let mut trace = Vec::with_capacity(self.stages.len());
        let output = self.run(images, sampler, Some(&mut trace))?;
        Ok((output, trace))
    }

    /// Stage at (group, position), if it exists.
    pub fn stage(&self, group: usize, position: usize) -> Option<&GatedStage<B>> {
        self.stages.iter().find(|s| s.group == group && s.position == position)
    }

    /// Output of the stem, before any block.
    pub fn stem_forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        relu(self.stem_bn.forward(self.stem.forward(images)))
    }

    fn run<S: GateSampler>(
        &self,
        images:    Tensor<B, 4>,
        sampler:   &mut S,
        mut trace: Option<&mut Vec<Tensor<B, 4>>>,
    ) -> SkipNetResult<GatedOutput<B>> {
        let [batch, channels, height, width] = images.dims();
        if batch == 0 || height == 0 || width == 0 {
            return Err(SkipNetError::Shape {
                context:  "input images (empty)",
                expected: vec![batch.max(1), self.in_channels, height.max(1), width.max(1)],
                actual:   vec![batch, channels, height, width],
            });
        }
        if channels != self.in_channels {
            return Err(SkipNetError::Shape {
                context:  "input images",
                expected: vec![batch, self.in_channels, height, width],
                actual:   vec![batch, channels, height, width],
            });
        }
        let device = images.device();

        // ── STEM ──────────────────────────────────────────────────────────────
        let x = self.stem_forward(images);
        let mut state = self.control.reset(batch, &device);

        // ── FIRST_BLOCK ───────────────────────────────────────────────────────
        let (first, rest) = self
            .stages
            .split_first()
            .ok_or(ConfigError::TooFewBlocks { total: 0 })?;
        let first_gate = first
            .gate
            .as_ref()
            .ok_or(ConfigError::TooFewBlocks { total: self.stages.len() })?;

        let mut x = first.block.forward(x);
        if let Some(trace) = trace.as_mut() {
            trace.push(x.clone());
        }

        let mut decisions: Vec<GateDecision<B>> = Vec::with_capacity(self.stages.len());
        let mut downsampled = Vec::with_capacity(self.stages.len());
        downsampled.push(false);

        let (decision, next) = self.control.decide(first_gate.forward(x.clone()), state, sampler)?;
        state = next;
        let mut mask = decision.mask.clone();
        decisions.push(decision);

        let mut prev = x.clone();

        // ── GATED_BLOCK ───────────────────────────────────────────────────────
        for stage in rest {
            if stage.block.has_projection() {
                prev = stage.block.project(prev);
                downsampled.push(true);
            } else {
                downsampled.push(false);
            }

            let raw = stage.block.forward(x);
            x = blend(mask.clone(), raw, prev)?;
            prev = x.clone();
            if let Some(trace) = trace.as_mut() {
                trace.push(x.clone());
            }

            if let Some(gate) = &stage.gate {
                let (decision, next) = self.control.decide(gate.forward(x.clone()), state, sampler)?;
                state = next;
                mask = decision.mask.clone();
                decisions.push(decision);
            }
        }

        // The decision gating the final block is not reported.
        decisions.pop();

        tracing::trace!(batch, decisions = decisions.len(), "gated pass complete");

        // ── CLASSIFY ──────────────────────────────────────────────────────────
        let pooled = self.pool.forward(x);
        let [_, features, _, _] = pooled.dims();
        let logits = self.fc.forward(pooled.reshape([batch, features]));

        Ok(GatedOutput {
            logits,
            masks: decisions.iter().map(GateDecision::flat_mask).collect(),
            probs: decisions.into_iter().map(|d| d.prob).collect(),
            downsampled,
        })
    }
}
