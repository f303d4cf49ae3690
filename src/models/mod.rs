//! Core data models for redis-runner
//!
//! Data structures describing a supervised process and the outcome of a run.

pub mod process_handle;
pub mod run_outcome;

// Re-exports for convenience
pub use process_handle::{ExitReason, ProcessHandle, ProcessState};
pub use run_outcome::RunOutcome;
