//! Database module for canonical playlist and track persistence.
//!
//! Uses SQLx with SQLite for lightweight, embedded database storage.
//! Provides async operations for:
//! - Canonical track resolution (external ids, ISRC)
//! - Playlist membership rewrites
//! - Playlist link and credential management
//!
//! # Example
//!
//! ```ignore
//! use tunesync::db::{init_db, get_playlist_tracks};
//!
//! let pool = init_db("sqlite:tunesync.db").await?;
//! let tracks = get_playlist_tracks(&pool, 1).await?;
//! ```

use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::model::{Credential, Playlist, PlaylistLink, ServiceKind, Track};
use crate::services::TrackMetadata;

/// Default database filename.
pub const DEFAULT_DB_NAME: &str = "tunesync.db";

/// Build a SQLite database URL from an optional path.
///
/// If no path is provided, uses [`DEFAULT_DB_NAME`] in the current directory.
pub fn db_url(path: Option<&std::path::Path>) -> String {
    match path {
        Some(p) => format!("sqlite:{}", p.display()),
        None => format!("sqlite:{}", DEFAULT_DB_NAME),
    }
}

/// Initialize the database connection pool and run migrations.
///
/// Creates the database file if it doesn't exist, establishes a connection
/// pool with up to 5 connections, and runs all pending migrations.
///
/// # Errors
///
/// Returns an error if:
/// - Database creation fails
/// - Connection cannot be established
/// - Migration fails
pub async fn init_db(db_url: &str) -> Result<SqlitePool, sqlx::Error> {
    if !sqlx::Sqlite::database_exists(db_url).await.unwrap_or(false) {
        sqlx::Sqlite::create_database(db_url).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

const TRACK_COLUMNS: &str = "id, name, artist, album, isrc, duration_ms, \
     spotify_id, apple_music_id, youtube_music_id, created_at, last_verified_at";

/// Get or create a user by username.
///
/// Idempotent - calling with the same name always returns the same ID.
pub async fn get_or_create_user(pool: &SqlitePool, username: &str) -> sqlx::Result<i64> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    if let Some((id,)) = row {
        Ok(id)
    } else {
        let result = sqlx::query("INSERT INTO users (username) VALUES (?)")
            .bind(username)
            .execute(pool)
            .await?;
        Ok(result.last_insert_rowid())
    }
}

/// Get a track by its database ID.
pub async fn get_track_by_id(pool: &SqlitePool, track_id: i64) -> sqlx::Result<Option<Track>> {
    sqlx::query_as::<_, Track>(&format!(
        "SELECT {TRACK_COLUMNS} FROM tracks WHERE id = ?"
    ))
    .bind(track_id)
    .fetch_optional(pool)
    .await
}

/// Find the canonical track that claims this external id on this service.
///
/// The per-service id columns carry partial unique indexes, so at most one
/// row can match.
pub async fn find_track_by_service_id(
    pool: &SqlitePool,
    service: ServiceKind,
    external_id: &str,
) -> sqlx::Result<Option<Track>> {
    let column = service.external_id_column();
    sqlx::query_as::<_, Track>(&format!(
        "SELECT {TRACK_COLUMNS} FROM tracks WHERE {column} = ?"
    ))
    .bind(external_id)
    .fetch_optional(pool)
    .await
}

/// Find a canonical track by ISRC.
///
/// ISRCs are not unique in the table (providers occasionally reuse them
/// across remasters), so the oldest row wins for determinism.
pub async fn find_track_by_isrc(pool: &SqlitePool, isrc: &str) -> sqlx::Result<Option<Track>> {
    sqlx::query_as::<_, Track>(&format!(
        "SELECT {TRACK_COLUMNS} FROM tracks WHERE isrc = ? ORDER BY id LIMIT 1"
    ))
    .bind(isrc)
    .fetch_optional(pool)
    .await
}

/// Insert a new canonical track seeded with one service's external id.
///
/// # Returns
///
/// The database ID of the new track.
pub async fn insert_track(
    pool: &SqlitePool,
    meta: &TrackMetadata,
    service: ServiceKind,
    external_id: &str,
) -> sqlx::Result<i64> {
    let column = service.external_id_column();
    let row: (i64,) = sqlx::query_as(&format!(
        "INSERT INTO tracks (name, artist, album, isrc, duration_ms, {column})
         VALUES (?, ?, ?, ?, ?, ?)
         RETURNING id"
    ))
    .bind(&meta.name)
    .bind(&meta.artist)
    .bind(&meta.album)
    .bind(&meta.isrc)
    .bind(meta.duration_ms)
    .bind(external_id)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

/// Stamp a service's external id onto an existing canonical track.
///
/// Used when an ISRC match proves that a track already known from one
/// service is the same recording on another.
pub async fn set_track_external_id(
    pool: &SqlitePool,
    track_id: i64,
    service: ServiceKind,
    external_id: &str,
) -> sqlx::Result<()> {
    let column = service.external_id_column();
    sqlx::query(&format!(
        "UPDATE tracks SET {column} = ?, last_verified_at = unixepoch() WHERE id = ?"
    ))
    .bind(external_id)
    .bind(track_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Record that a service just confirmed this track exists.
pub async fn touch_track_verified(pool: &SqlitePool, track_id: i64) -> sqlx::Result<()> {
    sqlx::query("UPDATE tracks SET last_verified_at = unixepoch() WHERE id = ?")
        .bind(track_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Get a playlist by its database ID.
pub async fn get_playlist(pool: &SqlitePool, playlist_id: i64) -> sqlx::Result<Option<Playlist>> {
    sqlx::query_as::<_, Playlist>(
        "SELECT id, name, description, owner_id, created_at, updated_at, last_synced_at
         FROM playlists WHERE id = ?",
    )
    .bind(playlist_id)
    .fetch_optional(pool)
    .await
}

/// Create a canonical playlist.
pub async fn create_playlist(
    pool: &SqlitePool,
    name: &str,
    description: &str,
    owner_id: i64,
) -> sqlx::Result<i64> {
    let result = sqlx::query(
        "INSERT INTO playlists (name, description, owner_id) VALUES (?, ?, ?)",
    )
    .bind(name)
    .bind(description)
    .bind(owner_id)
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Update a playlist's name and description from the authoritative snapshot.
pub async fn update_playlist_meta(
    pool: &SqlitePool,
    playlist_id: i64,
    name: &str,
    description: &str,
) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE playlists SET name = ?, description = ?, updated_at = unixepoch() WHERE id = ?",
    )
    .bind(name)
    .bind(description)
    .bind(playlist_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Record a successful sync of the whole playlist.
pub async fn touch_playlist_synced(
    pool: &SqlitePool,
    playlist_id: i64,
    now: i64,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE playlists SET last_synced_at = ? WHERE id = ?")
        .bind(now)
        .bind(playlist_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// IDs of playlists whose last sync is older than `cutoff` (or never ran).
///
/// Stalest first, capped so a batch run has a bounded amount of work.
pub async fn stale_playlist_ids(
    pool: &SqlitePool,
    cutoff: i64,
    cap: u32,
) -> sqlx::Result<Vec<i64>> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        "SELECT id FROM playlists
         WHERE last_synced_at IS NULL OR last_synced_at < ?
         ORDER BY COALESCE(last_synced_at, 0), id
         LIMIT ?",
    )
    .bind(cutoff)
    .bind(cap)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Get a playlist's canonical tracks in position order.
pub async fn get_playlist_tracks(
    pool: &SqlitePool,
    playlist_id: i64,
) -> sqlx::Result<Vec<Track>> {
    sqlx::query_as::<_, Track>(
        "SELECT t.id, t.name, t.artist, t.album, t.isrc, t.duration_ms,
                t.spotify_id, t.apple_music_id, t.youtube_music_id,
                t.created_at, t.last_verified_at
         FROM playlist_tracks pt
         JOIN tracks t ON t.id = pt.track_id
         WHERE pt.playlist_id = ?
         ORDER BY pt.position",
    )
    .bind(playlist_id)
    .fetch_all(pool)
    .await
}

/// Replace a playlist's membership with the given tracks, in order.
///
/// Runs in a single transaction so readers never observe a half-rewritten
/// playlist. Positions are reassigned densely from 0.
pub async fn replace_playlist_tracks(
    pool: &SqlitePool,
    playlist_id: i64,
    track_ids: &[i64],
) -> sqlx::Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM playlist_tracks WHERE playlist_id = ?")
        .bind(playlist_id)
        .execute(&mut *tx)
        .await?;

    for (position, track_id) in track_ids.iter().enumerate() {
        sqlx::query(
            "INSERT INTO playlist_tracks (playlist_id, track_id, position) VALUES (?, ?, ?)",
        )
        .bind(playlist_id)
        .bind(track_id)
        .bind(position as i64)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("UPDATE playlists SET updated_at = unixepoch() WHERE id = ?")
        .bind(playlist_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// All links for a playlist, oldest first.
///
/// The stable order makes authoritative selection deterministic when every
/// link reports the same freshness.
pub async fn list_links(pool: &SqlitePool, playlist_id: i64) -> sqlx::Result<Vec<PlaylistLink>> {
    sqlx::query_as::<_, PlaylistLink>(
        "SELECT id, playlist_id, user_id, service, service_playlist_id,
                is_source, last_synced_at, created_at
         FROM playlist_links WHERE playlist_id = ? ORDER BY id",
    )
    .bind(playlist_id)
    .fetch_all(pool)
    .await
}

/// Bind a playlist to one external representation.
///
/// The (playlist, service, user) unique constraint surfaces as a database
/// error; callers map it to a conflict.
pub async fn create_link(
    pool: &SqlitePool,
    playlist_id: i64,
    user_id: i64,
    service: ServiceKind,
    service_playlist_id: &str,
    is_source: bool,
) -> sqlx::Result<i64> {
    let result = sqlx::query(
        "INSERT INTO playlist_links (playlist_id, user_id, service, service_playlist_id, is_source)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(playlist_id)
    .bind(user_id)
    .bind(service)
    .bind(service_playlist_id)
    .bind(is_source)
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Record a successful push/fetch against one link.
pub async fn touch_link_synced(pool: &SqlitePool, link_id: i64, now: i64) -> sqlx::Result<()> {
    sqlx::query("UPDATE playlist_links SET last_synced_at = ? WHERE id = ?")
        .bind(now)
        .bind(link_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Get the stored credential for a (user, service) pair.
pub async fn get_credential(
    pool: &SqlitePool,
    user_id: i64,
    service: ServiceKind,
) -> sqlx::Result<Option<Credential>> {
    sqlx::query_as::<_, Credential>(
        "SELECT user_id, service, access_token, refresh_token, expires_at
         FROM credentials WHERE user_id = ? AND service = ?",
    )
    .bind(user_id)
    .bind(service)
    .fetch_optional(pool)
    .await
}

/// Insert or replace the credential for a (user, service) pair.
pub async fn upsert_credential(pool: &SqlitePool, cred: &Credential) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO credentials (user_id, service, access_token, refresh_token, expires_at)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(user_id, service) DO UPDATE SET
             access_token = excluded.access_token,
             refresh_token = excluded.refresh_token,
             expires_at = excluded.expires_at,
             updated_at = unixepoch()",
    )
    .bind(cred.user_id)
    .bind(cred.service)
    .bind(&cred.access_token)
    .bind(&cred.refresh_token)
    .bind(cred.expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Persist the outcome of a token refresh.
///
/// `refresh_token` must already account for retention: pass the old token
/// back in when the provider did not rotate it.
pub async fn update_credential_tokens(
    pool: &SqlitePool,
    user_id: i64,
    service: ServiceKind,
    access_token: &str,
    refresh_token: Option<&str>,
    expires_at: Option<i64>,
) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE credentials
         SET access_token = ?, refresh_token = ?, expires_at = ?, updated_at = unixepoch()
         WHERE user_id = ? AND service = ?",
    )
    .bind(access_token)
    .bind(refresh_token)
    .bind(expires_at)
    .bind(user_id)
    .bind(service)
    .execute(pool)
    .await?;
    Ok(())
}
