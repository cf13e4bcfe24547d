// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: no tensor math (Layer 5), no
// printing (Layer 1), no direct file formats (Layer 6).
//
//   init_use_case.rs     — preset → network → checkpoint
//   forward_use_case.rs  — seeded passes → gate summaries → CSV
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Build and store a network
pub mod init_use_case;

// Run forward passes and report gate usage
pub mod forward_use_case;
