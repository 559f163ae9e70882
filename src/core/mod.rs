// src/core/mod.rs

// The `core` module holds everything that does not touch the terminal:
// data models, the probes with their orchestrator, and scoring.

/// Shared data structures: `Target`, `ProbeName`, `ProbeResult`, the
/// per-probe payloads and the final `ScanReport`.
pub mod models;

/// The failure taxonomy shared by every probe.
pub mod error;

/// The individual probes and the `Scanner` that runs a selection of them
/// concurrently against one target.
pub mod scanner;

/// Turns collected probe results into the 0–100 security score.
pub mod scoring;
