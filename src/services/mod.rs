//! Streaming service adapters and the capability contract they implement.
//!
//! # Architecture
//!
//! This module follows a clean separation between:
//! - **Domain models** (`domain.rs`) - Internal types that represent our business logic
//! - **API DTOs** (`spotify/dto.rs`, `apple_music/dto.rs`) - Exact API response shapes
//! - **Adapters** - Convert DTOs to domain models
//! - **Clients** - HTTP clients for the provider APIs
//!
//! Every concrete adapter implements [`StreamingClient`]; the reconciliation
//! engine only ever sees that trait plus [`ClientRegistry`], the map of
//! already-constructed clients injected at startup. There is deliberately no
//! global service factory.

pub mod apple_music;
pub mod domain;
pub mod spotify;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::model::ServiceKind;

pub use domain::{PlaylistSnapshot, ServiceError, ServiceTrack, TokenGrant, TrackMetadata};

/// How many times a rate-limited request is retried before surfacing
/// [`ServiceError::RateLimited`].
pub const RATE_LIMIT_RETRY_BUDGET: u32 = 3;

/// Capability contract every streaming service adapter must satisfy.
///
/// Implementations own pagination (fetch returns the complete track list in
/// provider order), request batching where the provider caps items per call,
/// and rate-limit backoff (honor Retry-After, escalate only after the retry
/// budget is spent).
#[async_trait]
pub trait StreamingClient: Send + Sync + std::fmt::Debug {
    /// Fetch a playlist and all of its tracks, following pagination.
    async fn fetch_playlist(
        &self,
        playlist_id: &str,
        access_token: &str,
    ) -> Result<PlaylistSnapshot, ServiceError>;

    /// Create an empty playlist, returning the provider-assigned id.
    async fn create_playlist(
        &self,
        name: &str,
        description: &str,
        access_token: &str,
    ) -> Result<String, ServiceError>;

    /// Replace the playlist's contents with exactly `track_ids`, in order.
    ///
    /// Providers that cap items per call get a full replace for the first
    /// batch and ordered appends for the rest, so the final external order
    /// always equals the input order.
    async fn replace_playlist_tracks(
        &self,
        playlist_id: &str,
        track_ids: &[String],
        access_token: &str,
    ) -> Result<(), ServiceError>;

    /// Best-effort search for a track. Absence of a match is not an error.
    async fn search_track(
        &self,
        meta: &TrackMetadata,
        access_token: &str,
    ) -> Result<Option<String>, ServiceError>;

    /// Exchange a refresh token for a new access token (grant type
    /// `refresh_token`).
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, ServiceError>;
}

/// Dependency-injected map from service to an already-constructed client.
///
/// Built once at process startup from config; a missing entry surfaces as
/// [`ServiceError::Unimplemented`] so callers can skip the service.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    clients: HashMap<ServiceKind, Arc<dyn StreamingClient>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client for a service, replacing any previous one.
    pub fn insert(&mut self, service: ServiceKind, client: Arc<dyn StreamingClient>) {
        self.clients.insert(service, client);
    }

    /// Look up the client for a service.
    pub fn get(&self, service: ServiceKind) -> Result<Arc<dyn StreamingClient>, ServiceError> {
        self.clients
            .get(&service)
            .cloned()
            .ok_or_else(|| ServiceError::Unimplemented(service.to_string()))
    }

    /// Services with a registered client.
    pub fn services(&self) -> impl Iterator<Item = ServiceKind> + '_ {
        self.clients.keys().copied()
    }
}

/// Parse a Retry-After header value (delay seconds form) into a sleep
/// duration. Providers occasionally omit or mangle the header; fall back to
/// one second rather than hammering them.
pub(crate) fn retry_after_delay(headers: &reqwest::header::HeaderMap) -> Duration {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(1))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_unknown_service_is_unimplemented() {
        let registry = ClientRegistry::new();
        let err = registry.get(ServiceKind::YoutubeMusic).unwrap_err();
        assert!(matches!(err, ServiceError::Unimplemented(_)));
        assert!(err.to_string().contains("youtube_music"));
    }

    #[tokio::test]
    async fn test_registry_returns_registered_client() {
        let mut registry = ClientRegistry::new();
        registry.insert(
            ServiceKind::Spotify,
            Arc::new(mocks::MockClient::with_snapshot(mocks::snapshot(
                "Mix",
                &[("sp-1", "Song A", "Artist 1", None)],
            ))),
        );

        let client = registry.get(ServiceKind::Spotify).unwrap();
        let snap = client.fetch_playlist("x", "token").await.unwrap();
        assert_eq!(snap.tracks.len(), 1);
        assert_eq!(snap.tracks[0].id, "sp-1");
    }

    #[test]
    fn test_retry_after_parsing() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, "7".parse().unwrap());
        assert_eq!(retry_after_delay(&headers), Duration::from_secs(7));

        let empty = reqwest::header::HeaderMap::new();
        assert_eq!(retry_after_delay(&empty), Duration::from_secs(1));
    }
}
