// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs, enums and traits describing a gated
// residual network. No burn types live here.
//
//   config.rs   — NetworkConfig, PrecisionProfile, BlockSpec
//   presets.rs  — the published CIFAR SkipNet variants
//   error.rs    — ConfigError / SkipNetError taxonomy
//   summary.rs  — GateSummary, a plain-number view of a pass
//   traits.rs   — GateSampler, the gate's source of randomness

/// Network and precision configuration with validation
pub mod config;

/// Error types shared by every layer
pub mod error;

/// Named model configurations (the model factory)
pub mod presets;

/// Per-pass gate statistics
pub mod summary;

/// Core abstractions (traits) that other layers implement
pub mod traits;
