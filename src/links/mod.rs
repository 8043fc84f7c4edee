//! Playlist link registry and the import/export flows that create links.
//!
//! A link binds one canonical playlist to one external playlist on one
//! service, under one user's credential. At most one link may exist per
//! (playlist, service, user); violating that is a conflict, not a crash.

use sqlx::SqlitePool;

use crate::auth::TokenRefresher;
use crate::db;
use crate::error::{Error, Result};
use crate::model::{PlaylistLink, ServiceKind};
use crate::resolver;
use crate::services::ClientRegistry;

/// List a playlist's links, oldest first.
pub async fn list(pool: &SqlitePool, playlist_id: i64) -> Result<Vec<PlaylistLink>> {
    Ok(db::list_links(pool, playlist_id).await?)
}

/// Bind an existing canonical playlist to an existing external playlist.
///
/// # Errors
///
/// - [`Error::NotFound`] if the playlist does not exist
/// - [`Error::Forbidden`] if `user_id` does not own the playlist
/// - [`Error::Conflict`] if a link for this (service, user) already exists
pub async fn connect(
    pool: &SqlitePool,
    playlist_id: i64,
    user_id: i64,
    service: ServiceKind,
    service_playlist_id: &str,
) -> Result<i64> {
    let playlist = db::get_playlist(pool, playlist_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("playlist {playlist_id}")))?;
    if playlist.owner_id != user_id {
        return Err(Error::Forbidden);
    }

    db::create_link(pool, playlist_id, user_id, service, service_playlist_id, false)
        .await
        .map_err(|e| link_conflict(e, playlist_id, service))
}

/// Import an external playlist as a new canonical playlist.
///
/// Fetches the full snapshot, creates the canonical playlist owned by
/// `user_id`, resolves every track to a canonical identity, and records the
/// originating link as the source. The link starts out fresh so the first
/// reconciliation treats the import as authoritative.
pub async fn import_playlist(
    pool: &SqlitePool,
    registry: &ClientRegistry,
    tokens: &TokenRefresher,
    user_id: i64,
    service: ServiceKind,
    service_playlist_id: &str,
) -> Result<i64> {
    let token = tokens.access_token(user_id, service).await?;
    let client = registry.get(service)?;
    let snapshot = client.fetch_playlist(service_playlist_id, &token).await?;

    let playlist_id =
        db::create_playlist(pool, &snapshot.name, &snapshot.description, user_id).await?;
    let link_id = db::create_link(pool, playlist_id, user_id, service, service_playlist_id, true)
        .await
        .map_err(|e| link_conflict(e, playlist_id, service))?;

    let track_ids = resolver::resolve_tracks(pool, service, &snapshot.tracks).await?;
    db::replace_playlist_tracks(pool, playlist_id, &track_ids).await?;
    db::touch_link_synced(pool, link_id, chrono::Utc::now().timestamp()).await?;

    tracing::info!(
        playlist_id,
        service = %service,
        service_playlist_id,
        tracks = track_ids.len(),
        "Imported playlist"
    );
    Ok(playlist_id)
}

/// Export a canonical playlist to a service it is not yet linked to.
///
/// Creates the external playlist, links it, and pushes the canonical
/// tracks. Tracks without a known id on the target service get one
/// best-effort catalog search; a hit is stamped onto the canonical track so
/// later syncs skip the search, a miss just drops the track from this push.
pub async fn export_playlist(
    pool: &SqlitePool,
    registry: &ClientRegistry,
    tokens: &TokenRefresher,
    playlist_id: i64,
    user_id: i64,
    service: ServiceKind,
) -> Result<i64> {
    let playlist = db::get_playlist(pool, playlist_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("playlist {playlist_id}")))?;
    if playlist.owner_id != user_id {
        return Err(Error::Forbidden);
    }

    // Refuse before touching the service, so a duplicate export never
    // leaves an orphaned external playlist behind.
    let links = db::list_links(pool, playlist_id).await?;
    if links.iter().any(|l| l.service == service && l.user_id == user_id) {
        return Err(Error::conflict(format!(
            "playlist {playlist_id} is already linked to {service}"
        )));
    }

    let token = tokens.access_token(user_id, service).await?;
    let client = registry.get(service)?;
    let external_id = client
        .create_playlist(&playlist.name, &playlist.description, &token)
        .await?;
    let link_id = db::create_link(pool, playlist_id, user_id, service, &external_id, false)
        .await
        .map_err(|e| link_conflict(e, playlist_id, service))?;

    let tracks = db::get_playlist_tracks(pool, playlist_id).await?;
    let mut known = Vec::with_capacity(tracks.len());
    let mut skipped = 0usize;
    for track in &tracks {
        if let Some(id) = track.external_id(service) {
            known.push(id.to_string());
            continue;
        }
        match client.search_track(&track_meta(track), &token).await {
            Ok(Some(found)) => {
                db::set_track_external_id(pool, track.id, service, &found).await?;
                known.push(found);
            }
            Ok(None) => skipped += 1,
            Err(err) => {
                tracing::warn!(track_id = track.id, service = %service, error = %err, "Track search failed");
                skipped += 1;
            }
        }
    }
    if skipped > 0 {
        tracing::warn!(
            playlist_id,
            service = %service,
            skipped,
            "Some tracks have no id on the target service yet"
        );
    }

    client.replace_playlist_tracks(&external_id, &known, &token).await?;
    db::touch_link_synced(pool, link_id, chrono::Utc::now().timestamp()).await?;

    tracing::info!(playlist_id, service = %service, external_id, "Exported playlist");
    Ok(link_id)
}

fn track_meta(track: &crate::model::Track) -> crate::services::TrackMetadata {
    crate::services::TrackMetadata {
        name: track.name.clone(),
        artist: track.artist.clone(),
        album: track.album.clone(),
        isrc: track.isrc.clone(),
        duration_ms: track.duration_ms,
    }
}

fn link_conflict(err: sqlx::Error, playlist_id: i64, service: ServiceKind) -> Error {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.is_unique_violation()
    {
        return Error::conflict(format!(
            "playlist {playlist_id} is already linked to {service}"
        ));
    }
    Error::Database(err)
}
