// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// File-system concerns shared by the application layer:
//
//   checkpoint.rs  — CompactRecorder weights plus the JSON
//                    NetworkConfig needed to rebuild the model
//
//   gate_log.rs    — per-pass gate statistics appended to CSV
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Gate usage CSV logger
pub mod gate_log;
