//! Apple Music API Data Transfer Objects
//!
//! These types match EXACTLY what the Apple Music API returns.
//! DO NOT add fields that aren't in the API response.
//! DO NOT use these types outside the apple_music module - convert to domain types.
//!
//! API Reference: https://developer.apple.com/documentation/applemusicapi
//!
//! Example library playlist tracks response (trimmed):
//! ```json
//! {
//!   "data": [{
//!     "id": "i.4YBN3vgbLgpgEVx",
//!     "attributes": {
//!       "name": "Blank Space",
//!       "artistName": "Taylor Swift",
//!       "albumName": "1989",
//!       "durationInMillis": 231827,
//!       "playParams": {"id": "i.4YBN3vgbLgpgEVx", "catalogId": "907242703"}
//!     }
//!   }],
//!   "next": "/v1/me/library/playlists/p.abc/tracks?offset=100"
//! }
//! ```

use serde::{Deserialize, Serialize};

/// Generic envelope: every Apple Music response wraps resources in `data`,
/// with a relative `next` path when more pages exist.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Envelope<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    /// Relative path of the next page; absent on the last page
    pub next: Option<String>,
}

/// A library playlist resource.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaylistResource {
    pub id: String,
    pub attributes: Option<PlaylistAttributes>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistAttributes {
    pub name: String,
    pub description: Option<Description>,
    pub last_modified_date: Option<String>,
}

/// Apple wraps descriptions in an object with plain/standard variants.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Description {
    pub standard: Option<String>,
}

/// A song resource (library or catalog).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SongResource {
    pub id: String,
    pub attributes: Option<SongAttributes>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SongAttributes {
    pub name: String,
    pub artist_name: String,
    pub album_name: Option<String>,
    pub duration_in_millis: Option<i64>,
    /// Only present on catalog resources
    pub isrc: Option<String>,
    pub play_params: Option<PlayParams>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayParams {
    pub id: String,
    pub catalog_id: Option<String>,
}

/// Search results envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchResponse {
    pub results: SearchResults,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchResults {
    pub songs: Option<Envelope<SongResource>>,
}

// ============================================================================
// CONTRACT TESTS
// ============================================================================

#[cfg(test)]
mod contract_tests {
    use super::*;

    #[test]
    fn test_parse_playlist_resource() {
        let json = r#"{
            "data": [{
                "id": "p.abc",
                "attributes": {
                    "name": "Gym",
                    "description": {"standard": "Leg day"},
                    "lastModifiedDate": "2025-02-12T08:30:00Z"
                }
            }]
        }"#;

        let envelope: Envelope<PlaylistResource> =
            serde_json::from_str(json).expect("Should parse playlist envelope");
        let attrs = envelope.data[0].attributes.as_ref().unwrap();
        assert_eq!(attrs.name, "Gym");
        assert_eq!(attrs.description.as_ref().unwrap().standard.as_deref(), Some("Leg day"));
        assert!(envelope.next.is_none());
    }

    #[test]
    fn test_parse_paginated_tracks() {
        let json = r#"{
            "data": [{
                "id": "i.track1",
                "attributes": {
                    "name": "Blank Space",
                    "artistName": "Taylor Swift",
                    "albumName": "1989",
                    "durationInMillis": 231827,
                    "playParams": {"id": "i.track1", "catalogId": "907242703"}
                }
            }],
            "next": "/v1/me/library/playlists/p.abc/tracks?offset=100"
        }"#;

        let envelope: Envelope<SongResource> =
            serde_json::from_str(json).expect("Should parse tracks envelope");
        assert_eq!(envelope.data.len(), 1);
        assert!(envelope.next.is_some());
        let attrs = envelope.data[0].attributes.as_ref().unwrap();
        assert_eq!(attrs.artist_name, "Taylor Swift");
        assert_eq!(attrs.play_params.as_ref().unwrap().catalog_id.as_deref(), Some("907242703"));
    }

    #[test]
    fn test_parse_sparse_song() {
        let json = r#"{"data": [{"id": "i.x"}], "next": null}"#;
        let envelope: Envelope<SongResource> =
            serde_json::from_str(json).expect("Should parse sparse song");
        assert!(envelope.data[0].attributes.is_none());
    }

    #[test]
    fn test_parse_search_response() {
        let json = r#"{
            "results": {
                "songs": {
                    "data": [{"id": "907242703", "attributes": {
                        "name": "Blank Space", "artistName": "Taylor Swift",
                        "albumName": "1989", "durationInMillis": 231827,
                        "isrc": "USCJY1431309"
                    }}]
                }
            }
        }"#;

        let search: SearchResponse = serde_json::from_str(json).expect("Should parse search");
        let songs = search.results.songs.unwrap();
        assert_eq!(songs.data[0].id, "907242703");
        assert_eq!(
            songs.data[0].attributes.as_ref().unwrap().isrc.as_deref(),
            Some("USCJY1431309")
        );
    }
}
