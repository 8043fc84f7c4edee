//! Playlist reconciliation: multi-service fetch, authoritative selection,
//! canonical rewrite, and outward propagation.

pub mod batch;
pub mod engine;
pub mod report;

pub use batch::{BatchOptions, BatchSummary, run_batch};
pub use engine::SyncEngine;
pub use report::{SyncIssue, SyncReport, SyncStage};
