//! Adapter layer: Convert Apple Music DTOs to domain models
//!
//! The ONLY place where Apple Music DTO types become domain types.

use chrono::DateTime;

use super::dto;
use crate::services::domain::{PlaylistSnapshot, ServiceTrack, TrackMetadata};

/// Convert a playlist resource plus its paginated songs into a snapshot,
/// preserving provider order. Songs without attributes cannot be resolved
/// and are skipped.
pub fn to_snapshot(
    playlist: dto::PlaylistResource,
    songs: Vec<dto::SongResource>,
) -> PlaylistSnapshot {
    let (name, description, updated_at) = match playlist.attributes {
        Some(attrs) => (
            attrs.name,
            attrs.description.and_then(|d| d.standard).unwrap_or_default(),
            attrs.last_modified_date.as_deref().and_then(parse_timestamp),
        ),
        None => (String::new(), String::new(), None),
    };

    PlaylistSnapshot {
        name,
        description,
        tracks: songs.into_iter().filter_map(to_service_track).collect(),
        updated_at,
    }
}

fn to_service_track(song: dto::SongResource) -> Option<ServiceTrack> {
    let attrs = song.attributes?;
    Some(ServiceTrack {
        id: song.id,
        meta: TrackMetadata {
            name: attrs.name,
            artist: attrs.artist_name,
            album: attrs.album_name.unwrap_or_default(),
            isrc: attrs.isrc,
            duration_ms: attrs.duration_in_millis,
        },
    })
}

fn parse_timestamp(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.timestamp())
}

/// Extract the best match id from a catalog search, if any.
pub fn first_search_hit(response: dto::SearchResponse) -> Option<String> {
    response
        .results
        .songs
        .and_then(|songs| songs.data.into_iter().next())
        .map(|song| song.id)
}
