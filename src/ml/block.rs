// ============================================================
// Layer 5 — Residual Block
// ============================================================
// x ─── qconv3x3(s) ─── BN ─── ReLU ─── qconv3x3 ─── BN ──+── ReLU
//  │                                                       │
//  └── (qconv1x1(s) + BN when channels or stride change) ──┘
//
// The shortcut projection is also exposed through `project`,
// so the gated backbone can realign its carried activation with
// the very same weights before blending.

use burn::{
    nn::{BatchNorm, BatchNormConfig},
    prelude::*,
    tensor::activation::relu,
};

use crate::domain::config::{BlockSpec, PrecisionProfile};
use crate::domain::error::ConfigError;
use crate::ml::quant_conv::{PredictiveConv2d, PredictiveConv2dConfig};

// ─── Projection ───────────────────────────────────────────────────────────────
/// 1x1 quantized convolution + batch norm on the shortcut path.
#[derive(Module, Debug)]
pub struct Projection<B: Backend> {
    pub conv: PredictiveConv2d<B>,
    pub bn:   BatchNorm<B, 2>,
}

impl<B: Backend> Projection<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(x))
    }
}

// ─── BasicBlock ───────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    pub conv1:      PredictiveConv2d<B>,
    pub bn1:        BatchNorm<B, 2>,
    pub conv2:      PredictiveConv2d<B>,
    pub bn2:        BatchNorm<B, 2>,
    pub projection: Option<Projection<B>>,
}

impl<B: Backend> BasicBlock<B> {
    /// Build the block described by `spec`.
    ///
    /// Fails with [`ConfigError::MissingProjection`] when the spec changes
    /// channels or stride without asking for a projection.
    pub fn init(spec: &BlockSpec, profile: &PrecisionProfile, device: &B::Device) -> Result<Self, ConfigError> {
        spec.validate()?;

        let conv1 = PredictiveConv2dConfig::conv3x3(spec.in_channels, spec.out_channels, profile)
            .with_stride(spec.stride)
            .with_input_signed(true)
            .init(device);
        let conv2 = PredictiveConv2dConfig::conv3x3(spec.out_channels, spec.out_channels, profile)
            .with_input_signed(false)
            .init(device);

        let projection = spec.projection.then(|| Projection {
            conv: PredictiveConv2dConfig::conv1x1(spec.in_channels, spec.out_channels, profile)
                .with_stride(spec.stride)
                .with_input_signed(true)
                .init(device),
            bn:   BatchNormConfig::new(spec.out_channels).init(device),
        });

        Ok(Self {
            conv1,
            bn1: BatchNormConfig::new(spec.out_channels).init(device),
            conv2,
            bn2: BatchNormConfig::new(spec.out_channels).init(device),
            projection,
        })
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = relu(self.bn1.forward(self.conv1.forward(x.clone())));
        let out = self.bn2.forward(self.conv2.forward(out));
        relu(out + self.project(x))
    }

    /// Shortcut path: the projection when present, otherwise identity.
    pub fn project(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match &self.projection {
            Some(projection) => projection.forward(x),
            None => x,
        }
    }

    pub fn has_projection(&self) -> bool {
        self.projection.is_some()
    }
}
