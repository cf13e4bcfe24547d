// ============================================================
// Layer 5 — Recurrent Gate
// ============================================================
// Decides, per sample, whether the next residual block runs.
//
//   block output [B, C, H, W]
//        │  GateEmbedding: global avg pool → qconv1x1(C → E)
//        ▼
//   embedding [B, E] ── LSTM step ── Linear(H → 1) ── sigmoid ── prob [B]
//                          ▲   │
//                   GateState (hidden, cell) [1, B, H]
//
//   mask = hard(prob > u) with u ~ U[0, 1), straight-through
//
// The controller holds no hidden state itself. `reset` hands out
// a zeroed GateState, `decide` consumes one and returns the next,
// so every forward pass threads its own state through the loop.
//
// Reference: Burn Book §3 (Building Blocks)
//            Wang et al. (2018) SkipNet

use burn::{
    nn::{
        lstm::{Lstm, LstmConfig, LstmState},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        Initializer, Linear, LinearConfig,
    },
    prelude::*,
    tensor::{activation::sigmoid, TensorData},
};

use crate::domain::config::PrecisionProfile;
use crate::domain::error::{SkipNetError, SkipNetResult};
use crate::domain::traits::GateSampler;
use crate::ml::quant_conv::{PredictiveConv2d, PredictiveConv2dConfig};

// ─── Straight-through threshold ───────────────────────────────────────────────
/// Hard threshold with identity gradient.
///
/// Forward value is exactly `1.0` where `prob > sample` and `0.0` elsewhere;
/// the derivative with respect to `prob` is 1.
pub fn straight_through<B: Backend, const D: usize>(prob: Tensor<B, D>, sample: Tensor<B, D>) -> Tensor<B, D> {
    let hard = prob.clone().greater(sample).float();
    hard - prob.clone().detach() + prob
}

// ─── GateEmbedding ────────────────────────────────────────────────────────────
/// Spatially pooled, channel-reduced summary of a block output.
#[derive(Module, Debug)]
pub struct GateEmbedding<B: Backend> {
    pub pool: AdaptiveAvgPool2d,
    pub conv: PredictiveConv2d<B>,
}

impl<B: Backend> GateEmbedding<B> {
    pub fn init(channels: usize, embed_dim: usize, profile: &PrecisionProfile, device: &B::Device) -> Self {
        Self {
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            conv: PredictiveConv2dConfig::conv1x1(channels, embed_dim, profile)
                .with_input_signed(true)
                .init(device),
        }
    }

    /// [B, C, H, W] → [B, E]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let embedded = self.conv.forward(self.pool.forward(x));
        let [batch, embed, _, _] = embedded.dims();
        embedded.reshape([batch, embed])
    }
}

// ─── GateState ────────────────────────────────────────────────────────────────
/// LSTM hidden and cell tensors, each shaped [1, batch, hidden_dim].
///
/// Only [`RnnGate::reset`] creates one.
#[derive(Debug, Clone)]
pub struct GateState<B: Backend> {
    hidden: Tensor<B, 3>,
    cell:   Tensor<B, 3>,
}

impl<B: Backend> GateState<B> {
    pub fn batch_size(&self) -> usize {
        self.hidden.dims()[1]
    }

    pub fn hidden(&self) -> &Tensor<B, 3> {
        &self.hidden
    }

    pub fn cell(&self) -> &Tensor<B, 3> {
        &self.cell
    }

    /// Cut the autodiff history of the state, keeping its values.
    pub fn detach(self) -> Self {
        Self {
            hidden: self.hidden.detach(),
            cell:   self.cell.detach(),
        }
    }
}

// ─── GateDecision ─────────────────────────────────────────────────────────────
/// One gating decision for a whole batch.
#[derive(Debug, Clone)]
pub struct GateDecision<B: Backend> {
    /// Hard 0/1 values with straight-through gradient, shape [B, 1, 1, 1]
    pub mask: Tensor<B, 4>,
    /// Continuous probabilities in (0, 1), shape [B]
    pub prob: Tensor<B, 1>,
}

impl<B: Backend> GateDecision<B> {
    /// Mask flattened to [B].
    pub fn flat_mask(&self) -> Tensor<B, 1> {
        let batch = self.mask.dims()[0];
        self.mask.clone().reshape([batch])
    }
}

// ─── RnnGate ──────────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct RnnGateConfig {
    pub embed_dim:  usize,
    pub hidden_dim: usize,
}

impl RnnGateConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> RnnGate<B> {
        let std = (2.0 / self.hidden_dim as f64).sqrt();
        RnnGate {
            lstm:       LstmConfig::new(self.embed_dim, self.hidden_dim, true).init(device),
            proj:       LinearConfig::new(self.hidden_dim, 1)
                .with_initializer(Initializer::Normal { mean: 0.0, std })
                .init(device),
            embed_dim:  self.embed_dim,
            hidden_dim: self.hidden_dim,
        }
    }
}

#[derive(Module, Debug)]
pub struct RnnGate<B: Backend> {
    pub lstm:       Lstm<B>,
    pub proj:       Linear<B>,
    pub embed_dim:  usize,
    pub hidden_dim: usize,
}

impl<B: Backend> RnnGate<B> {
    /// Fresh zeroed state for a batch. Call once at the start of every pass.
    pub fn reset(&self, batch_size: usize, device: &B::Device) -> GateState<B> {
        GateState {
            hidden: Tensor::zeros([1, batch_size, self.hidden_dim], device),
            cell:   Tensor::zeros([1, batch_size, self.hidden_dim], device),
        }
    }

    /// Advance the LSTM one step on `embedding` ([B, E]) and sample a decision.
    pub fn decide<S: GateSampler>(
        &self,
        embedding: Tensor<B, 2>,
        state:     GateState<B>,
        sampler:   &mut S,
    ) -> SkipNetResult<(GateDecision<B>, GateState<B>)> {
        let [batch, embed] = embedding.dims();
        if batch != state.batch_size() || embed != self.embed_dim {
            return Err(SkipNetError::Shape {
                context:  "gate controller step",
                expected: vec![state.batch_size(), self.embed_dim],
                actual:   vec![batch, embed],
            });
        }
        let device = embedding.device();
        let hidden = self.hidden_dim;

        let previous = LstmState {
            cell:   state.cell.reshape([batch, hidden]),
            hidden: state.hidden.reshape([batch, hidden]),
        };
        let (_, next) = self.lstm.forward(embedding.reshape([batch, 1, embed]), Some(previous));

        let prob = sigmoid(self.proj.forward(next.hidden.clone())).reshape([batch]);

        let sample = Tensor::<B, 1>::from_data(
            TensorData::new(sampler.sample_uniform(batch), [batch]),
            &device,
        );
        let mask = straight_through(prob.clone(), sample).reshape([batch, 1, 1, 1]);

        tracing::trace!(batch, "gate decision sampled");

        let state = GateState {
            hidden: next.hidden.reshape([1, batch, hidden]),
            cell:   next.cell.reshape([1, batch, hidden]),
        };
        Ok((GateDecision { mask, prob }, state))
    }
}
