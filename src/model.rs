//! Canonical data models for cross-service playlist sync.
//!
//! Defines the primary entities: [`Track`], [`Playlist`], [`PlaylistLink`],
//! and [`Credential`]. These are derived from SQLx for database mapping.
//!
//! # Database Schema
//!
//! The models map to the following tables:
//! - `tracks` - Canonical song entities with per-service external ids
//! - `playlists` - Ordered canonical track collections
//! - `playlist_links` - Bindings to external playlist representations
//! - `credentials` - Per (user, service) OAuth token state

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A supported streaming service.
///
/// Stored as snake_case TEXT in the database (`spotify`, `apple_music`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ServiceKind {
    Spotify,
    AppleMusic,
    YoutubeMusic,
}

impl ServiceKind {
    /// All services the data model has an external-id column for.
    pub const ALL: [ServiceKind; 3] = [
        ServiceKind::Spotify,
        ServiceKind::AppleMusic,
        ServiceKind::YoutubeMusic,
    ];

    /// The snake_case identifier used in the database and config.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Spotify => "spotify",
            ServiceKind::AppleMusic => "apple_music",
            ServiceKind::YoutubeMusic => "youtube_music",
        }
    }

    /// The `tracks` column holding this service's external id.
    ///
    /// Kept as a fixed set of known column names so callers can never
    /// interpolate untrusted strings into SQL.
    pub(crate) fn external_id_column(&self) -> &'static str {
        match self {
            ServiceKind::Spotify => "spotify_id",
            ServiceKind::AppleMusic => "apple_music_id",
            ServiceKind::YoutubeMusic => "youtube_music_id",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spotify" => Ok(ServiceKind::Spotify),
            "apple_music" => Ok(ServiceKind::AppleMusic),
            "youtube_music" => Ok(ServiceKind::YoutubeMusic),
            other => Err(format!("unknown service: {other}")),
        }
    }
}

/// A canonical track entity.
///
/// One row per distinct recording as far as we can tell. The per-service id
/// columns are filled in lazily as services confirm a match; the ISRC, when
/// present, is the stronger cross-service matching key.
#[derive(Debug, Clone, FromRow)]
pub struct Track {
    /// Database ID (auto-generated)
    pub id: i64,
    /// Track title
    pub name: String,
    /// Artist name (joined if the provider reports several)
    pub artist: String,
    /// Album title
    pub album: String,
    /// International Standard Recording Code, if the provider reported one
    pub isrc: Option<String>,
    /// Duration in milliseconds
    pub duration_ms: Option<i64>,
    /// Spotify track id
    pub spotify_id: Option<String>,
    /// Apple Music catalog/library id
    pub apple_music_id: Option<String>,
    /// YouTube Music video id
    pub youtube_music_id: Option<String>,
    /// Creation timestamp (epoch seconds)
    pub created_at: i64,
    /// Last time a service confirmed this track (epoch seconds)
    pub last_verified_at: i64,
}

impl Track {
    /// This track's external id on the given service, if known.
    pub fn external_id(&self, service: ServiceKind) -> Option<&str> {
        match service {
            ServiceKind::Spotify => self.spotify_id.as_deref(),
            ServiceKind::AppleMusic => self.apple_music_id.as_deref(),
            ServiceKind::YoutubeMusic => self.youtube_music_id.as_deref(),
        }
    }
}

/// A canonical, ordered playlist.
#[derive(Debug, Clone, FromRow)]
pub struct Playlist {
    /// Database ID (auto-generated)
    pub id: i64,
    /// Playlist name
    pub name: String,
    /// Playlist description
    pub description: String,
    /// Owning user
    pub owner_id: i64,
    /// Creation timestamp (epoch seconds)
    pub created_at: i64,
    /// Last metadata update (epoch seconds)
    pub updated_at: i64,
    /// Last successful sync; None means never synced
    pub last_synced_at: Option<i64>,
}

/// A binding between a canonical playlist and one external representation.
///
/// Reconciliation treats freshness (`last_synced_at`), not `is_source`, as
/// the tie-break for which service's data is authoritative.
#[derive(Debug, Clone, FromRow)]
pub struct PlaylistLink {
    /// Database ID (auto-generated)
    pub id: i64,
    /// The canonical playlist
    pub playlist_id: i64,
    /// The user whose credential is used against this service
    pub user_id: i64,
    /// Which service this link points at
    pub service: ServiceKind,
    /// The playlist's id in the service's own identifier space
    pub service_playlist_id: String,
    /// True only for the link created at import time (informational)
    pub is_source: bool,
    /// Last successful push/fetch for this link; None means never synced
    pub last_synced_at: Option<i64>,
    /// Creation timestamp (epoch seconds)
    pub created_at: i64,
}

impl PlaylistLink {
    /// Freshness key for authoritative selection: never-synced sorts lowest.
    pub fn freshness(&self) -> i64 {
        self.last_synced_at.unwrap_or(0)
    }
}

/// Per (user, service) OAuth token state.
///
/// If no refresh token is stored the access token is used until it expires
/// and is never silently replaced.
#[derive(Debug, Clone, FromRow)]
pub struct Credential {
    /// Owning user
    pub user_id: i64,
    /// The service these tokens are valid against
    pub service: ServiceKind,
    /// Bearer access token
    pub access_token: String,
    /// Refresh token, if the provider issued one
    pub refresh_token: Option<String>,
    /// Access token expiry (epoch seconds); None means unknown
    pub expires_at: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_kind_round_trip() {
        for kind in ServiceKind::ALL {
            assert_eq!(kind.as_str().parse::<ServiceKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_service_kind_rejects_unknown() {
        assert!("tidal".parse::<ServiceKind>().is_err());
    }

    #[test]
    fn test_track_external_id_accessor() {
        let track = Track {
            id: 1,
            name: "Song".into(),
            artist: "Artist".into(),
            album: "Album".into(),
            isrc: None,
            duration_ms: None,
            spotify_id: Some("sp-1".into()),
            apple_music_id: None,
            youtube_music_id: None,
            created_at: 0,
            last_verified_at: 0,
        };
        assert_eq!(track.external_id(ServiceKind::Spotify), Some("sp-1"));
        assert_eq!(track.external_id(ServiceKind::AppleMusic), None);
    }

    #[test]
    fn test_link_freshness_treats_never_synced_as_zero() {
        let link = PlaylistLink {
            id: 1,
            playlist_id: 1,
            user_id: 1,
            service: ServiceKind::Spotify,
            service_playlist_id: "x".into(),
            is_source: true,
            last_synced_at: None,
            created_at: 0,
        };
        assert_eq!(link.freshness(), 0);
    }
}
