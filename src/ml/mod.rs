// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All burn framework code lives in this layer. The domain layer
// above it only describes shapes and precision; everything that
// touches a tensor is here.
//
//   quant_conv.rs  — PredictiveConv2d, the reduced-precision
//                    convolution with optional MSB prediction
//
//   block.rs       — BasicBlock, the two-conv residual block
//                    and its 1x1 shortcut projection
//
//   gate.rs        — RnnGate: shared LSTM controller, the
//                    per-block embedding extractor and the
//                    straight-through binary gate
//
//   backbone.rs    — SkipNet: stem, gated block sequence,
//                    blend/bypass orchestration, classifier
//
//   inferencer.rs  — Runs seeded forward passes on a fresh or
//                    checkpointed network and summarises gates
//
// Reference: Burn Book §3 (Building Blocks)
//            Wang et al. (2018) SkipNet: Learning Dynamic Routing

/// Quantized convolution with predictive MSB execution
pub mod quant_conv;

/// Residual basic block
pub mod block;

/// Recurrent gate controller
pub mod gate;

/// Gated residual backbone
pub mod backbone;

/// Forward-pass runner over a built or restored network
pub mod inferencer;

/// Backend used outside of tests. NdArray runs everywhere; build with
/// `--features wgpu` to run on the GPU instead.
#[cfg(not(feature = "wgpu"))]
pub type InferBackend = burn::backend::NdArray;

#[cfg(feature = "wgpu")]
pub type InferBackend = burn::backend::Wgpu;
