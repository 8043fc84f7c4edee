//! Track identity resolution.
//!
//! Maps service-specific track entries onto canonical [`crate::model::Track`]
//! rows. Matching is tiered: the service's own external id is authoritative,
//! the ISRC bridges services, and only when both miss is a new canonical
//! track minted. The same input always resolves to the same canonical id,
//! so repeated syncs never multiply rows.

use sqlx::SqlitePool;

use crate::db;
use crate::error::Result;
use crate::model::ServiceKind;
use crate::services::{ServiceTrack, TrackMetadata};

/// Resolve one service track to a canonical track id, creating it if new.
///
/// Lookup order:
/// 1. Exact external-id match for `service` - the service already confirmed
///    this recording, so only the verification timestamp moves.
/// 2. ISRC match - the recording is known from another service; this
///    service's external id is stamped onto the existing row.
/// 3. Insert a new canonical track seeded with this service's id.
pub async fn resolve_or_create(
    pool: &SqlitePool,
    meta: &TrackMetadata,
    service: ServiceKind,
    external_id: &str,
) -> Result<i64> {
    if let Some(track) = db::find_track_by_service_id(pool, service, external_id).await? {
        db::touch_track_verified(pool, track.id).await?;
        return Ok(track.id);
    }

    if let Some(isrc) = meta.isrc.as_deref()
        && let Some(track) = db::find_track_by_isrc(pool, isrc).await?
    {
        db::set_track_external_id(pool, track.id, service, external_id).await?;
        tracing::debug!(
            track_id = track.id,
            service = %service,
            external_id,
            isrc,
            "Cross-linked track via ISRC"
        );
        return Ok(track.id);
    }

    let id = db::insert_track(pool, meta, service, external_id).await?;
    tracing::debug!(track_id = id, service = %service, external_id, "Created canonical track");
    Ok(id)
}

/// Resolve a whole snapshot's tracks in order.
///
/// Duplicates in the input resolve to the same canonical id at each
/// position, preserving the playlist's shape.
pub async fn resolve_tracks(
    pool: &SqlitePool,
    service: ServiceKind,
    tracks: &[ServiceTrack],
) -> Result<Vec<i64>> {
    let mut ids = Vec::with_capacity(tracks.len());
    for track in tracks {
        ids.push(resolve_or_create(pool, &track.meta, service, &track.id).await?);
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::temp_db;

    fn meta(name: &str, isrc: Option<&str>) -> TrackMetadata {
        TrackMetadata {
            name: name.to_string(),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            isrc: isrc.map(String::from),
            duration_ms: Some(180_000),
        }
    }

    #[tokio::test]
    async fn test_same_external_id_resolves_to_same_track() {
        let (_dir, pool) = temp_db().await;
        let m = meta("Song", None);

        let first = resolve_or_create(&pool, &m, ServiceKind::Spotify, "sp-1")
            .await
            .unwrap();
        let second = resolve_or_create(&pool, &m, ServiceKind::Spotify, "sp-1")
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_isrc_bridges_services_and_stamps_id() {
        let (_dir, pool) = temp_db().await;

        let from_spotify =
            resolve_or_create(&pool, &meta("Song", Some("USX1")), ServiceKind::Spotify, "sp-1")
                .await
                .unwrap();
        let from_apple = resolve_or_create(
            &pool,
            &meta("Song", Some("USX1")),
            ServiceKind::AppleMusic,
            "i.1",
        )
        .await
        .unwrap();
        assert_eq!(from_spotify, from_apple);

        // The apple id is now stamped, so the external-id path hits first
        let track = crate::db::get_track_by_id(&pool, from_spotify)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(track.spotify_id.as_deref(), Some("sp-1"));
        assert_eq!(track.apple_music_id.as_deref(), Some("i.1"));
    }

    #[tokio::test]
    async fn test_distinct_tracks_without_isrc_stay_distinct() {
        let (_dir, pool) = temp_db().await;

        let a = resolve_or_create(&pool, &meta("Song", None), ServiceKind::Spotify, "sp-1")
            .await
            .unwrap();
        let b = resolve_or_create(&pool, &meta("Song", None), ServiceKind::AppleMusic, "i.1")
            .await
            .unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_resolve_tracks_preserves_order_and_duplicates() {
        let (_dir, pool) = temp_db().await;
        let tracks = vec![
            ServiceTrack { id: "sp-a".into(), meta: meta("A", None) },
            ServiceTrack { id: "sp-b".into(), meta: meta("B", None) },
            ServiceTrack { id: "sp-a".into(), meta: meta("A", None) },
        ];

        let ids = resolve_tracks(&pool, ServiceKind::Spotify, &tracks)
            .await
            .unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[0], ids[2]);
        assert_ne!(ids[0], ids[1]);
    }
}
