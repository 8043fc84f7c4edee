//! Adapter layer: Convert Spotify DTOs to domain models
//!
//! This is the ONLY place where DTO types are converted to domain types.
//! This isolates API changes - if Spotify changes their response format,
//! only this file and dto.rs need to change.

use super::dto;
use crate::services::domain::{PlaylistSnapshot, ServiceTrack, TrackMetadata};

/// Convert a playlist plus all of its (already paginated) track items into a
/// snapshot, preserving provider order.
///
/// Items without a track object or without a provider id (removed tracks,
/// local files) are skipped: identity resolution keys on the external id, so
/// a placeholder would silently break matching.
pub fn to_snapshot(playlist: dto::Playlist, items: Vec<dto::PlaylistItem>) -> PlaylistSnapshot {
    PlaylistSnapshot {
        name: playlist.name,
        description: playlist.description.unwrap_or_default(),
        tracks: items.into_iter().filter_map(to_service_track).collect(),
        updated_at: None, // Spotify doesn't report a playlist mtime
    }
}

fn to_service_track(item: dto::PlaylistItem) -> Option<ServiceTrack> {
    let track = item.track?;
    if track.is_local {
        return None;
    }
    let id = track.id?;
    Some(ServiceTrack {
        id,
        meta: TrackMetadata {
            name: track.name,
            artist: track
                .artists
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            album: track.album.map(|a| a.name).unwrap_or_default(),
            isrc: track.external_ids.and_then(|ids| ids.isrc),
            duration_ms: track.duration_ms,
        },
    })
}

/// Extract the best match id from a search response, if any.
pub fn first_search_hit(response: dto::SearchResponse) -> Option<String> {
    response.tracks.items.into_iter().find_map(|t| t.id)
}

/// Spotify track URIs for a batch of bare track ids.
pub fn to_track_uris(track_ids: &[String]) -> Vec<String> {
    track_ids
        .iter()
        .map(|id| format!("spotify:track:{id}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: Option<&str>, name: &str, is_local: bool) -> dto::PlaylistItem {
        dto::PlaylistItem {
            track: Some(dto::TrackObject {
                id: id.map(String::from),
                name: name.to_string(),
                artists: vec![
                    dto::ArtistObject { name: "Artist 1".into() },
                    dto::ArtistObject { name: "Artist 2".into() },
                ],
                album: Some(dto::AlbumObject { name: "Album".into() }),
                duration_ms: Some(201_000),
                external_ids: Some(dto::ExternalIds { isrc: Some("ISRC1".into()) }),
                is_local,
            }),
        }
    }

    fn playlist() -> dto::Playlist {
        dto::Playlist {
            id: "pl".into(),
            name: "Mix".into(),
            description: None,
            tracks: dto::Page { items: vec![], next: None },
        }
    }

    #[test]
    fn test_snapshot_preserves_order_and_joins_artists() {
        let items = vec![item(Some("a"), "First", false), item(Some("b"), "Second", false)];
        let snap = to_snapshot(playlist(), items);

        assert_eq!(snap.description, "");
        assert_eq!(snap.tracks.len(), 2);
        assert_eq!(snap.tracks[0].id, "a");
        assert_eq!(snap.tracks[1].id, "b");
        assert_eq!(snap.tracks[0].meta.artist, "Artist 1, Artist 2");
        assert_eq!(snap.tracks[0].meta.isrc.as_deref(), Some("ISRC1"));
    }

    #[test]
    fn test_snapshot_drops_idless_and_local_tracks() {
        let items = vec![
            item(None, "Ghost", false),
            item(Some("real"), "Real", false),
            item(Some("local"), "Local", true),
            dto::PlaylistItem { track: None },
        ];
        let snap = to_snapshot(playlist(), items);
        assert_eq!(snap.tracks.len(), 1);
        assert_eq!(snap.tracks[0].id, "real");
    }

    #[test]
    fn test_track_uri_conversion() {
        let uris = to_track_uris(&["abc".into()]);
        assert_eq!(uris, vec!["spotify:track:abc".to_string()]);
    }
}
