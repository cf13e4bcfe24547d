// ============================================================
// Layer 3 — Network Configuration
// ============================================================
// Immutable description of a gated residual network:
//
//   blocks_per_group  [6, 6, 6]       → 18 residual blocks
//   group_widths      [16, 32, 64]    → channels per group
//   embed_dim / hidden_dim            → recurrent gate sizes
//   precision                         → PrecisionProfile
//
// The precision profile is handed to every convolution the
// model builds. Nothing reads it from global state, so two
// models with different profiles can live side by side.
//
// Layout rule (ResNet for CIFAR):
//   - the stem outputs group_widths[0] channels
//   - the first block of every group after the first uses
//     stride 2 and therefore needs a shortcut projection
//   - a projection is also required whenever the channel
//     count changes between consecutive blocks

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

/// Supported activation / weight bit widths for the forward quantizer.
pub const MIN_FORWARD_BITS: u32 = 2;
pub const MAX_FORWARD_BITS: u32 = 16;
/// Gradient widths may go up to full single precision.
pub const MAX_GRAD_BITS: u32 = 32;

// ─── PrecisionProfile ─────────────────────────────────────────────────────────
/// Numeric precision settings shared by every convolution of a model.
///
/// Forward-side fields drive the quantized convolution directly.
/// Gradient-side fields (`num_bits_grad`, `msb_bits_grad`,
/// `biprecision`, `predictive_backward`) are validated and stored
/// with checkpoints but not applied: gradients come from the
/// autodiff backend in full precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecisionProfile {
    /// Activation bit width
    pub num_bits:            u32,
    /// Weight bit width
    pub num_bits_weight:     u32,
    /// Gradient bit width (recorded, not applied)
    pub num_bits_grad:       Option<u32>,
    /// Recorded, not applied
    pub biprecision:         bool,
    /// Run a coarse most-significant-bit pass to predict outputs
    pub predictive_forward:  bool,
    /// Recorded, not applied
    pub predictive_backward: bool,
    /// Activation bits of the coarse pass
    pub msb_bits:            u32,
    /// Weight bits of the coarse pass
    pub msb_bits_weight:     u32,
    /// Recorded, not applied
    pub msb_bits_grad:       u32,
    /// Prediction / sparsification threshold
    pub threshold:           f64,
    /// Zero activations whose magnitude is below `threshold`
    pub sparsify:            bool,
    /// Predict by sign (post-ReLU zeros) instead of by magnitude
    pub sign:                bool,
}

impl Default for PrecisionProfile {
    fn default() -> Self {
        Self {
            num_bits:            8,
            num_bits_weight:     8,
            num_bits_grad:       None,
            biprecision:         false,
            predictive_forward:  false,
            predictive_backward: true,
            msb_bits:            4,
            msb_bits_weight:     4,
            msb_bits_grad:       16,
            threshold:           5e-5,
            sparsify:            false,
            sign:                true,
        }
    }
}

impl PrecisionProfile {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_bits("num_bits", self.num_bits, MAX_FORWARD_BITS)?;
        check_bits("num_bits_weight", self.num_bits_weight, MAX_FORWARD_BITS)?;
        check_bits("msb_bits", self.msb_bits, MAX_FORWARD_BITS)?;
        check_bits("msb_bits_weight", self.msb_bits_weight, MAX_FORWARD_BITS)?;
        check_bits("msb_bits_grad", self.msb_bits_grad, MAX_GRAD_BITS)?;
        if let Some(bits) = self.num_bits_grad {
            check_bits("num_bits_grad", bits, MAX_GRAD_BITS)?;
        }

        if self.msb_bits > self.num_bits {
            return Err(ConfigError::MsbExceedsBits {
                msb_field: "msb_bits",
                msb:       self.msb_bits,
                field:     "num_bits",
                bits:      self.num_bits,
            });
        }
        if self.msb_bits_weight > self.num_bits_weight {
            return Err(ConfigError::MsbExceedsBits {
                msb_field: "msb_bits_weight",
                msb:       self.msb_bits_weight,
                field:     "num_bits_weight",
                bits:      self.num_bits_weight,
            });
        }

        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(ConfigError::Threshold(self.threshold));
        }
        Ok(())
    }
}

fn check_bits(field: &'static str, value: u32, max: u32) -> Result<(), ConfigError> {
    if (MIN_FORWARD_BITS..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::BitWidth { field, value, min: MIN_FORWARD_BITS, max })
    }
}

// ─── BlockSpec ────────────────────────────────────────────────────────────────
/// Static description of one residual block, addressed by (group, position).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSpec {
    pub group:        usize,
    pub position:     usize,
    pub in_channels:  usize,
    pub out_channels: usize,
    pub stride:       usize,
    /// Whether a 1x1 shortcut projection is built for this block
    pub projection:   bool,
}

impl BlockSpec {
    /// True when the block's output shape differs from its input shape.
    pub fn changes_shape(&self) -> bool {
        self.stride != 1 || self.in_channels != self.out_channels
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.in_channels == 0 || self.out_channels == 0 {
            return Err(ConfigError::ZeroDimension { field: "block channels" });
        }
        if self.stride == 0 {
            return Err(ConfigError::ZeroDimension { field: "block stride" });
        }
        if self.changes_shape() && !self.projection {
            return Err(ConfigError::MissingProjection {
                group:        self.group,
                position:     self.position,
                in_channels:  self.in_channels,
                out_channels: self.out_channels,
                stride:       self.stride,
            });
        }
        Ok(())
    }
}

impl fmt::Display for BlockSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "group {} block {:>2} | {:>4} -> {:<4} | stride {} | {}",
            self.group,
            self.position,
            self.in_channels,
            self.out_channels,
            self.stride,
            if self.projection { "projection" } else { "identity" },
        )
    }
}

// ─── NetworkConfig ────────────────────────────────────────────────────────────
/// Full description of a gated residual network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub blocks_per_group: Vec<usize>,
    pub group_widths:     Vec<usize>,
    /// Channels of the input images (3 for RGB)
    pub in_channels:      usize,
    /// Width of the pooled gate embedding fed to the LSTM
    pub embed_dim:        usize,
    /// LSTM hidden size
    pub hidden_dim:       usize,
    pub num_classes:      usize,
    pub precision:        PrecisionProfile,
}

impl NetworkConfig {
    /// RGB input, 10-dimensional gate embedding and hidden state,
    /// default precision profile.
    pub fn new(blocks_per_group: Vec<usize>, group_widths: Vec<usize>, num_classes: usize) -> Self {
        Self {
            blocks_per_group,
            group_widths,
            in_channels: 3,
            embed_dim:   10,
            hidden_dim:  10,
            num_classes,
            precision:   PrecisionProfile::default(),
        }
    }

    pub fn with_in_channels(mut self, in_channels: usize) -> Self {
        self.in_channels = in_channels;
        self
    }

    pub fn with_embed_dim(mut self, embed_dim: usize) -> Self {
        self.embed_dim = embed_dim;
        self
    }

    pub fn with_hidden_dim(mut self, hidden_dim: usize) -> Self {
        self.hidden_dim = hidden_dim;
        self
    }

    pub fn with_precision(mut self, precision: PrecisionProfile) -> Self {
        self.precision = precision;
        self
    }

    pub fn total_blocks(&self) -> usize {
        self.blocks_per_group.iter().sum()
    }

    /// Number of decisions a forward pass hands back to the caller.
    pub fn returned_decisions(&self) -> usize {
        self.total_blocks().saturating_sub(2)
    }

    /// Width of the final activation, i.e. the classifier input.
    pub fn final_width(&self) -> Option<usize> {
        self.group_widths.last().copied()
    }

    /// Blocks in execution order.
    pub fn block_layout(&self) -> Vec<BlockSpec> {
        let mut layout   = Vec::with_capacity(self.total_blocks());
        let mut channels = self.group_widths.first().copied().unwrap_or(0);

        for (group, (&blocks, &width)) in self
            .blocks_per_group
            .iter()
            .zip(self.group_widths.iter())
            .enumerate()
        {
            for position in 0..blocks {
                let stride = if group > 0 && position == 0 { 2 } else { 1 };
                let mut spec = BlockSpec {
                    group,
                    position,
                    in_channels: channels,
                    out_channels: width,
                    stride,
                    projection: false,
                };
                spec.projection = spec.changes_shape();
                layout.push(spec);
                channels = width;
            }
        }
        layout
    }

    /// Check every structural and numeric constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.blocks_per_group.is_empty() {
            return Err(ConfigError::NoGroups);
        }
        if self.blocks_per_group.len() != self.group_widths.len() {
            return Err(ConfigError::GroupMismatch {
                blocks: self.blocks_per_group.len(),
                widths: self.group_widths.len(),
            });
        }
        if let Some(group) = self.blocks_per_group.iter().position(|&n| n == 0) {
            return Err(ConfigError::EmptyGroup { group });
        }
        if self.group_widths.contains(&0) {
            return Err(ConfigError::ZeroDimension { field: "group_widths" });
        }
        for (field, value) in [
            ("in_channels", self.in_channels),
            ("embed_dim", self.embed_dim),
            ("hidden_dim", self.hidden_dim),
            ("num_classes", self.num_classes),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroDimension { field });
            }
        }

        let total = self.total_blocks();
        if total < 2 {
            return Err(ConfigError::TooFewBlocks { total });
        }

        self.precision.validate()?;
        self.block_layout().iter().try_for_each(BlockSpec::validate)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn cifar_like() -> NetworkConfig {
        NetworkConfig::new(vec![2, 2, 2], vec![16, 32, 64], 10)
    }

    #[test]
    fn test_default_profile_is_valid() {
        assert!(PrecisionProfile::default().validate().is_ok());
        assert!(cifar_like().validate().is_ok());
    }

    #[test]
    fn test_layout_strides_and_projections() {
        let layout = cifar_like().block_layout();
        assert_eq!(layout.len(), 6);

        let strides: Vec<usize>     = layout.iter().map(|b| b.stride).collect();
        let projections: Vec<bool>  = layout.iter().map(|b| b.projection).collect();
        assert_eq!(strides, vec![1, 1, 2, 1, 2, 1]);
        assert_eq!(projections, vec![false, false, true, false, true, false]);

        // Channel chain is continuous
        for pair in layout.windows(2) {
            assert_eq!(pair[0].out_channels, pair[1].in_channels);
        }
        assert_eq!(layout[2].in_channels, 16);
        assert_eq!(layout[2].out_channels, 32);
    }

    #[test]
    fn test_first_block_never_projects() {
        let layout = NetworkConfig::new(vec![1, 1, 1, 1], vec![64, 128, 256, 512], 10).block_layout();
        assert!(!layout[0].projection);
        assert_eq!(layout[0].in_channels, 64);
    }

    #[test]
    fn test_returned_decisions_is_total_minus_two() {
        assert_eq!(cifar_like().returned_decisions(), 4);
        assert_eq!(NetworkConfig::new(vec![18, 18, 18], vec![16, 32, 64], 10).returned_decisions(), 52);
    }

    #[test]
    fn test_group_mismatch_rejected() {
        let cfg = NetworkConfig::new(vec![2, 2], vec![16, 32, 64], 10);
        assert_eq!(cfg.validate(), Err(ConfigError::GroupMismatch { blocks: 2, widths: 3 }));
    }

    #[test]
    fn test_empty_and_single_block_networks_rejected() {
        assert_eq!(NetworkConfig::new(vec![], vec![], 10).validate(), Err(ConfigError::NoGroups));
        assert_eq!(
            NetworkConfig::new(vec![2, 0], vec![16, 32], 10).validate(),
            Err(ConfigError::EmptyGroup { group: 1 }),
        );
        assert_eq!(
            NetworkConfig::new(vec![1], vec![16], 10).validate(),
            Err(ConfigError::TooFewBlocks { total: 1 }),
        );
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let cfg = cifar_like().with_embed_dim(0);
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroDimension { field: "embed_dim" }));

        let cfg = NetworkConfig::new(vec![2], vec![0], 10);
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroDimension { field: "group_widths" }));
    }

    #[test]
    fn test_bit_width_bounds() {
        let profile = PrecisionProfile { num_bits: 1, ..Default::default() };
        assert!(matches!(profile.validate(), Err(ConfigError::BitWidth { field: "num_bits", .. })));

        let profile = PrecisionProfile { num_bits_grad: Some(40), ..Default::default() };
        assert!(matches!(profile.validate(), Err(ConfigError::BitWidth { field: "num_bits_grad", .. })));

        let profile = PrecisionProfile { num_bits: 4, msb_bits: 6, ..Default::default() };
        assert!(matches!(profile.validate(), Err(ConfigError::MsbExceedsBits { .. })));
    }

    #[test]
    fn test_threshold_must_be_finite_and_non_negative() {
        let profile = PrecisionProfile { threshold: -1.0, ..Default::default() };
        assert_eq!(profile.validate(), Err(ConfigError::Threshold(-1.0)));
        let profile = PrecisionProfile { threshold: f64::NAN, ..Default::default() };
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_missing_projection_detected() {
        let spec = BlockSpec {
            group:        1,
            position:     0,
            in_channels:  16,
            out_channels: 32,
            stride:       2,
            projection:   false,
        };
        assert!(matches!(spec.validate(), Err(ConfigError::MissingProjection { group: 1, .. })));

        // An explicit projection on an identity-shaped block is allowed
        let spec = BlockSpec { in_channels: 32, stride: 1, projection: true, ..spec };
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_config_json_round_trip() {
        let cfg  = cifar_like().with_hidden_dim(12);
        let json = serde_json::to_string(&cfg).unwrap();
        let back: NetworkConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
