//! Spotify Web API Data Transfer Objects
//!
//! These types match EXACTLY what the Spotify API returns.
//! DO NOT add fields that aren't in the API response.
//! DO NOT use these types outside the spotify module - convert to domain types.
//!
//! API Reference: https://developer.spotify.com/documentation/web-api
//!
//! Example playlist response (trimmed):
//! ```json
//! {
//!   "id": "37i9dQZF1DX",
//!   "name": "Road Trip",
//!   "description": "Windows down",
//!   "tracks": {
//!     "items": [{"track": {"id": "11dFghVXANMlKmJXsNCbNl", "name": "Cut To The Feeling",
//!                "artists": [{"name": "Carly Rae Jepsen"}], "album": {"name": "Cut To The Feeling"},
//!                "duration_ms": 207959, "external_ids": {"isrc": "USUM71703861"}}}],
//!     "next": "https://api.spotify.com/v1/playlists/37i9dQZF1DX/tracks?offset=100"
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};

/// A playlist with its first page of tracks embedded.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    /// Null for playlists that never had one set
    pub description: Option<String>,
    pub tracks: Page<PlaylistItem>,
}

/// Spotify's generic paging object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    /// Absolute URL of the next page; null on the last page
    pub next: Option<String>,
}

/// One entry in a playlist's track listing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaylistItem {
    /// Null when the track has been removed from the catalog
    pub track: Option<TrackObject>,
}

/// A full track object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackObject {
    /// Null for local files
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistObject>,
    pub album: Option<AlbumObject>,
    pub duration_ms: Option<i64>,
    pub external_ids: Option<ExternalIds>,
    #[serde(default)]
    pub is_local: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtistObject {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlbumObject {
    pub name: String,
}

/// Industry identifiers attached to a track.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExternalIds {
    pub isrc: Option<String>,
}

/// The authenticated user's profile (needed to create playlists).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserProfile {
    pub id: String,
}

/// Response to playlist creation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreatedPlaylist {
    pub id: String,
}

/// Track search results.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchResponse {
    pub tracks: Page<TrackObject>,
}

/// Response from the accounts token endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    /// Omitted when refresh token rotation is disabled for the app
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

// ============================================================================
// CONTRACT TESTS
// These verify our DTOs match what the real API returns.
// If these fail, the API has changed and we need to update our DTOs.
// ============================================================================
