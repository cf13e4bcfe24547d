#![recursion_limit = "256"]
//! SkipNet: a residual network whose blocks are executed or bypassed per
//! sample by a recurrent gate, built on reduced-precision convolutions.
//!
//! ```no_run
//! use skipnet_sp::{NetworkConfig, SkipNet};
//! use burn::backend::NdArray;
//! use burn::prelude::*;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let device = Default::default();
//! let model: SkipNet<NdArray> = NetworkConfig::new(vec![2, 2, 2], vec![16, 32, 64], 10)
//!     .init(&device)?;
//! let images = Tensor::zeros([4, 3, 32, 32], &device);
//! let out = model.forward(images, &mut StdRng::seed_from_u64(0))?;
//! assert_eq!(out.masks.len(), 4);
//! # Ok::<(), skipnet_sp::SkipNetError>(())
//! ```

pub mod application;
pub mod cli;
pub mod domain;
pub mod infra;
pub mod ml;

pub use domain::config::{BlockSpec, NetworkConfig, PrecisionProfile};
pub use domain::error::{ConfigError, SkipNetError, SkipNetResult};
pub use domain::presets::Preset;
pub use domain::summary::GateSummary;
pub use domain::traits::{FixedThreshold, GateSampler};
pub use ml::backbone::{GatedOutput, SkipNet};
pub use ml::gate::{GateDecision, GateState, RnnGate};
pub use ml::quant_conv::PredictiveConv2d;
