//! Scheduled batch reconciliation.
//!
//! Picks the stalest playlists up to a cap and syncs them one at a time,
//! each under its own wall-clock budget so one hung provider cannot starve
//! the rest of the batch.

use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;

use crate::db;
use crate::error::Result;
use crate::sync::engine::SyncEngine;

/// Tuning knobs for one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Playlists synced more recently than this are skipped
    pub staleness_secs: i64,
    /// Maximum playlists handled per run
    pub cap: u32,
    /// Wall-clock budget per playlist
    pub playlist_budget: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            staleness_secs: 24 * 3600,
            cap: 100,
            playlist_budget: Duration::from_secs(120),
        }
    }
}

/// Aggregate outcome of a batch run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
}

/// Sync every stale playlist, isolating failures per playlist.
///
/// A playlist that errors or runs over budget is logged and counted; the
/// batch always proceeds to the next one.
pub async fn run_batch(
    pool: &SqlitePool,
    engine: &SyncEngine,
    options: &BatchOptions,
) -> Result<BatchSummary> {
    let cutoff = Utc::now().timestamp() - options.staleness_secs;
    let stale = db::stale_playlist_ids(pool, cutoff, options.cap).await?;
    tracing::info!(count = stale.len(), cap = options.cap, "Starting batch sync");

    let mut summary = BatchSummary::default();
    for playlist_id in stale {
        summary.attempted += 1;
        match tokio::time::timeout(options.playlist_budget, engine.sync_playlist(playlist_id, None)).await
        {
            Ok(Ok(report)) => {
                summary.synced += 1;
                tracing::info!(playlist_id, issues = report.issues.len(), "Batch sync done");
            }
            Ok(Err(err)) => {
                summary.failed += 1;
                tracing::warn!(playlist_id, error = %err, "Batch sync failed");
            }
            Err(_) => {
                summary.failed += 1;
                tracing::warn!(
                    playlist_id,
                    budget_secs = options.playlist_budget.as_secs(),
                    "Batch sync ran over budget"
                );
            }
        }
    }

    tracing::info!(
        attempted = summary.attempted,
        synced = summary.synced,
        failed = summary.failed,
        "Batch sync finished"
    );
    Ok(summary)
}
