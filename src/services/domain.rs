//! Internal domain models for the streaming service boundary.
//!
//! These types are OUR types - they don't change when external APIs change.
//! All external API responses get converted into these types via adapters.

/// Track metadata as reported by a streaming service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMetadata {
    /// Track title
    pub name: String,
    /// Artist name (joined if the provider reports several)
    pub artist: String,
    /// Album title
    pub album: String,
    /// International Standard Recording Code, if reported
    pub isrc: Option<String>,
    /// Duration in milliseconds
    pub duration_ms: Option<i64>,
}

/// One track in a fetched playlist snapshot.
///
/// `id` is always the provider-assigned external id. Adapters must drop
/// entries the provider returns without an id (local files, removed tracks)
/// rather than invent a placeholder - identity resolution keys on this value.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceTrack {
    /// The track's id in the service's own identifier space
    pub id: String,
    /// Reported metadata
    pub meta: TrackMetadata,
}

/// A full snapshot of an external playlist, in provider order.
#[derive(Debug, Clone, Default)]
pub struct PlaylistSnapshot {
    /// Playlist name on the service
    pub name: String,
    /// Playlist description on the service
    pub description: String,
    /// All tracks, pagination already followed
    pub tracks: Vec<ServiceTrack>,
    /// When the service says the playlist changed (epoch seconds), if known
    pub updated_at: Option<i64>,
}

/// Result of a token refresh against a provider.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    /// The new bearer access token
    pub access_token: String,
    /// A rotated refresh token; None means the provider kept the old one valid
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds
    pub expires_in: i64,
}

/// Errors at the streaming service boundary.
///
/// `Unimplemented` must stay loudly distinct from the transient variants so
/// callers can skip a service without mistaking it for a retryable failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    #[error("access token rejected by the service")]
    AuthExpired,

    #[error("rate limited - retry budget exhausted")]
    RateLimited,

    #[error("not found upstream: {0}")]
    NotFound(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("no client adapter for service: {0}")]
    Unimplemented(String),
}

impl ServiceError {
    /// Whether retrying later without user action could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::RateLimited | ServiceError::Unavailable(_))
    }
}
