//! Spotify Web API client
//!
//! Handles communication with the Spotify Web API and the accounts service.
//! See: https://developer.spotify.com/documentation/web-api
//!
//! ## API Quirks & Best Practices
//!
//! - Playlist track listings are paginated at 100 items; the paging object
//!   carries an absolute `next` URL which must be followed verbatim.
//! - Replacing playlist contents is a PUT of at most 100 URIs; longer lists
//!   are applied as one PUT followed by ordered POST appends.
//! - 429 responses carry a Retry-After header in whole seconds which the
//!   client must honor before retrying.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::json;

use super::{adapter, dto};
use crate::services::domain::{PlaylistSnapshot, ServiceError, TokenGrant, TrackMetadata};
use crate::services::{RATE_LIMIT_RETRY_BUDGET, StreamingClient, retry_after_delay};

/// Spotify caps playlist mutation calls at this many URIs.
const MAX_TRACKS_PER_REQUEST: usize = 100;

/// Per-request timeout; the sync engine applies its own wall-clock budget on top.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Spotify API client
#[derive(Debug)]
pub struct SpotifyClient {
    http_client: reqwest::Client,
    api_base: String,
    accounts_base: String,
    client_id: String,
    client_secret: String,
}

impl SpotifyClient {
    /// Create a new client with the application's OAuth credentials.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .gzip(true)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http_client,
            api_base: "https://api.spotify.com/v1".to_string(),
            accounts_base: "https://accounts.spotify.com".to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Create a client for testing with custom base URLs.
    #[cfg(test)]
    pub fn with_base_urls(api_base: impl Into<String>, accounts_base: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_base: api_base.into(),
            accounts_base: accounts_base.into(),
            client_id: "test-client".into(),
            client_secret: "test-secret".into(),
        }
    }

    /// Map a non-2xx response to the boundary error taxonomy.
    fn status_error(status: reqwest::StatusCode, context: &str) -> ServiceError {
        match status {
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                ServiceError::AuthExpired
            }
            reqwest::StatusCode::NOT_FOUND => ServiceError::NotFound(context.to_string()),
            _ => ServiceError::Unavailable(format!(
                "{context}: HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
        context: &str,
    ) -> Result<T, ServiceError> {
        let response = self
            .http_client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ServiceError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::status_error(status, context));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))
    }

    /// Send one playlist mutation (PUT replaces, POST appends), honoring
    /// Retry-After on 429 until the retry budget is spent.
    async fn send_track_batch(
        &self,
        playlist_id: &str,
        uris: &[String],
        access_token: &str,
        method: reqwest::Method,
    ) -> Result<(), ServiceError> {
        let url = format!("{}/playlists/{}/tracks", self.api_base, playlist_id);
        let body = json!({ "uris": uris });

        for attempt in 0..=RATE_LIMIT_RETRY_BUDGET {
            let response = self
                .http_client
                .request(method.clone(), &url)
                .bearer_auth(access_token)
                .json(&body)
                .send()
                .await
                .map_err(|e| ServiceError::Unavailable(e.to_string()))?;

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if attempt == RATE_LIMIT_RETRY_BUDGET {
                    return Err(ServiceError::RateLimited);
                }
                let delay = retry_after_delay(response.headers());
                tracing::debug!(
                    playlist_id,
                    delay_secs = delay.as_secs(),
                    attempt,
                    "Spotify rate limit, backing off"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            return Err(Self::status_error(status, "update playlist tracks"));
        }

        Err(ServiceError::RateLimited)
    }
}

#[async_trait]
impl StreamingClient for SpotifyClient {
    async fn fetch_playlist(
        &self,
        playlist_id: &str,
        access_token: &str,
    ) -> Result<PlaylistSnapshot, ServiceError> {
        let url = format!("{}/playlists/{}", self.api_base, playlist_id);
        let playlist: dto::Playlist = self.get_json(&url, access_token, "fetch playlist").await?;

        // Follow pagination; each page's next URL depends on the previous
        // response, so this is strictly sequential.
        let mut items = playlist.tracks.items.clone();
        let mut next_url = playlist.tracks.next.clone();
        while let Some(url) = next_url {
            let page: dto::Page<dto::PlaylistItem> = self
                .get_json(&url, access_token, "fetch playlist page")
                .await?;
            items.extend(page.items);
            next_url = page.next;
        }

        Ok(adapter::to_snapshot(playlist, items))
    }

    async fn create_playlist(
        &self,
        name: &str,
        description: &str,
        access_token: &str,
    ) -> Result<String, ServiceError> {
        let me_url = format!("{}/me", self.api_base);
        let user: dto::UserProfile = self.get_json(&me_url, access_token, "fetch profile").await?;

        let url = format!("{}/users/{}/playlists", self.api_base, user.id);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(access_token)
            .json(&json!({ "name": name, "description": description, "public": false }))
            .send()
            .await
            .map_err(|e| ServiceError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::status_error(status, "create playlist"));
        }

        let created: dto::CreatedPlaylist = response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))?;
        Ok(created.id)
    }

    async fn replace_playlist_tracks(
        &self,
        playlist_id: &str,
        track_ids: &[String],
        access_token: &str,
    ) -> Result<(), ServiceError> {
        let uris = adapter::to_track_uris(track_ids);
        let mut batches = uris.chunks(MAX_TRACKS_PER_REQUEST);

        // First batch is a full replace (wipes the playlist even when the
        // track list is empty); subsequent batches append in order.
        let first: &[String] = batches.next().unwrap_or(&[]);
        self.send_track_batch(playlist_id, first, access_token, reqwest::Method::PUT)
            .await?;

        for batch in batches {
            self.send_track_batch(playlist_id, batch, access_token, reqwest::Method::POST)
                .await?;
        }

        Ok(())
    }

    async fn search_track(
        &self,
        meta: &TrackMetadata,
        access_token: &str,
    ) -> Result<Option<String>, ServiceError> {
        let query = format!("track:{} artist:{}", meta.name, meta.artist);
        let url = format!(
            "{}/search?q={}&type=track&limit=5",
            self.api_base,
            urlencoding::encode(&query)
        );

        let response: dto::SearchResponse =
            self.get_json(&url, access_token, "search track").await?;
        Ok(adapter::first_search_hit(response))
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, ServiceError> {
        let url = format!("{}/api/token", self.accounts_base);
        let basic = BASE64.encode(format!("{}:{}", self.client_id, self.client_secret));

        let response = self
            .http_client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, format!("Basic {basic}"))
            .form(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)])
            .send()
            .await
            .map_err(|e| ServiceError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::status_error(status, "refresh token"));
        }

        let token: dto::TokenResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))?;

        Ok(TokenGrant {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in,
        })
    }
}
