//! Shared test utilities.
//!
//! Only compiled for tests; keeps the tempdir-backed database setup in one
//! place so individual tests stay short.

use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::db::init_db;

/// Create a migrated SQLite database in a temp directory.
///
/// Returns the directory guard alongside the pool; dropping the guard
/// deletes the database file.
pub async fn temp_db() -> (TempDir, SqlitePool) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("test.db");
    let url = format!("sqlite:{}", db_path.display());
    let pool = init_db(&url).await.expect("Failed to init test db");
    (dir, pool)
}
