// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Three subcommands: `layout`, `init` and `forward`.
// Precision flags are shared by `init` and `forward` through a
// flattened `PrecisionArgs` group.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::{forward_use_case::ForwardConfig, init_use_case::InitConfig};
use crate::domain::{config::PrecisionProfile, presets::Preset};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the block layout of a preset
    Layout(LayoutArgs),

    /// Build a randomly initialised network and save it as a checkpoint
    Init(InitArgs),

    /// Run seeded forward passes on random images and report gate usage
    Forward(ForwardArgs),
}

#[derive(Args, Debug)]
pub struct LayoutArgs {
    /// cifar10-18, cifar10-38, ..., cifar100-152
    #[arg(long, default_value = "cifar10-38")]
    pub preset: Preset,
}

/// Quantization settings. Unset flags keep the profile defaults.
#[derive(Args, Debug, Default)]
pub struct PrecisionArgs {
    /// Activation bit width
    #[arg(long)]
    pub num_bits: Option<u32>,

    /// Weight bit width
    #[arg(long)]
    pub num_bits_weight: Option<u32>,

    /// Gradient bit width (full precision when unset)
    #[arg(long)]
    pub num_bits_grad: Option<u32>,

    /// Most-significant activation bits of the predictive pass
    #[arg(long)]
    pub msb_bits: Option<u32>,

    /// Most-significant weight bits of the predictive pass
    #[arg(long)]
    pub msb_bits_weight: Option<u32>,

    /// Prediction and sparsification threshold
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Run the coarse MSB pass and keep its predicted-off outputs
    #[arg(long)]
    pub predictive_forward: bool,

    /// Zero activations below the threshold before each convolution
    #[arg(long)]
    pub sparsify: bool,
}

impl From<PrecisionArgs> for PrecisionProfile {
    fn from(a: PrecisionArgs) -> Self {
        let base = PrecisionProfile::default();
        PrecisionProfile {
            num_bits:           a.num_bits.unwrap_or(base.num_bits),
            num_bits_weight:    a.num_bits_weight.unwrap_or(base.num_bits_weight),
            num_bits_grad:      a.num_bits_grad.or(base.num_bits_grad),
            msb_bits:           a.msb_bits.unwrap_or(base.msb_bits),
            msb_bits_weight:    a.msb_bits_weight.unwrap_or(base.msb_bits_weight),
            threshold:          a.threshold.unwrap_or(base.threshold),
            predictive_forward: a.predictive_forward,
            sparsify:           a.sparsify,
            ..base
        }
    }
}

#[derive(Args, Debug)]
pub struct InitArgs {
    #[arg(long, default_value = "cifar10-38")]
    pub preset: Preset,

    /// Directory for the weights and network_config.json
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    #[command(flatten)]
    pub precision: PrecisionArgs,
}

impl From<InitArgs> for InitConfig {
    fn from(a: InitArgs) -> Self {
        InitConfig {
            preset:         a.preset,
            precision:      a.precision.into(),
            checkpoint_dir: a.checkpoint_dir,
        }
    }
}

#[derive(Args, Debug)]
pub struct ForwardArgs {
    /// Ignored when --checkpoint-dir is given
    #[arg(long, default_value = "cifar10-38")]
    pub preset: Preset,

    /// Load weights and config from here instead of building a fresh network
    #[arg(long)]
    pub checkpoint_dir: Option<String>,

    #[arg(long, default_value_t = 4)]
    pub batch_size: usize,

    /// Height and width of the random square images
    #[arg(long, default_value_t = 32)]
    pub image_size: usize,

    #[arg(long, default_value_t = 1)]
    pub passes: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Append one row per pass to <dir>/gate_usage.csv
    #[arg(long)]
    pub stats_dir: Option<String>,

    #[command(flatten)]
    pub precision: PrecisionArgs,
}

impl From<ForwardArgs> for ForwardConfig {
    fn from(a: ForwardArgs) -> Self {
        ForwardConfig {
            preset:         a.preset,
            precision:      a.precision.into(),
            batch_size:     a.batch_size,
            image_size:     a.image_size,
            passes:         a.passes,
            seed:           a.seed,
            checkpoint_dir: a.checkpoint_dir,
            stats_dir:      a.stats_dir,
        }
    }
}
