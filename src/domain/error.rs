// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// Two kinds of failure exist in this crate and neither is
// ever retried:
//
//   ConfigError  — the network description is inconsistent.
//                  Detected once, before any weights exist.
//
//   SkipNetError — wraps ConfigError and adds the runtime
//                  failures of a forward pass (shape mismatch
//                  at a blend or controller step, tensor data
//                  that cannot be read back).
//
// Numeric saturation inside the quantized convolution is NOT
// an error: values outside the representable range are clipped.

use thiserror::Error;

/// Construction-time problems with a [`NetworkConfig`](super::config::NetworkConfig)
/// or [`PrecisionProfile`](super::config::PrecisionProfile).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("network needs at least one group of blocks")]
    NoGroups,

    #[error("{blocks} block counts were given for {widths} group widths")]
    GroupMismatch { blocks: usize, widths: usize },

    #[error("group {group} has no blocks")]
    EmptyGroup { group: usize },

    #[error("`{field}` must be greater than zero")]
    ZeroDimension { field: &'static str },

    #[error("network has {total} block(s); a gated network needs at least 2")]
    TooFewBlocks { total: usize },

    #[error("`{field}` = {value} is outside the supported range {min}..={max}")]
    BitWidth { field: &'static str, value: u32, min: u32, max: u32 },

    #[error("`{msb_field}` ({msb}) exceeds `{field}` ({bits})")]
    MsbExceedsBits { msb_field: &'static str, msb: u32, field: &'static str, bits: u32 },

    #[error("threshold {0} must be finite and non-negative")]
    Threshold(f64),

    #[error(
        "block ({group}, {position}) changes {in_channels}->{out_channels} channels \
         with stride {stride} but has no shortcut projection"
    )]
    MissingProjection {
        group:        usize,
        position:     usize,
        in_channels:  usize,
        out_channels: usize,
        stride:       usize,
    },

    #[error("unknown preset `{0}` (expected one of: {1})")]
    UnknownPreset(String, String),
}

/// Every failure a model can report, at construction or during a pass.
#[derive(Debug, Error)]
pub enum SkipNetError {
    #[error("invalid network configuration: {0}")]
    Config(#[from] ConfigError),

    /// A tensor did not have the shape the gating loop requires.
    /// Always a construction bug, never a transient condition.
    #[error("shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    Shape {
        context:  &'static str,
        expected: Vec<usize>,
        actual:   Vec<usize>,
    },

    #[error("could not read tensor data back as f32: {0}")]
    Readback(String),
}

pub type SkipNetResult<T> = Result<T, SkipNetError>;
