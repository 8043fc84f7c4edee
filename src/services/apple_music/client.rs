//! Apple Music API client
//!
//! Handles communication with the Apple Music API for library playlists.
//! See: https://developer.apple.com/documentation/applemusicapi
//!
//! Authentication is two-layered: a long-lived developer token goes in the
//! Authorization header, and the per-user Music User Token (our stored
//! access token) goes in the Music-User-Token header. Pagination uses
//! offset-based relative `next` paths that must be resolved against the API
//! host.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::{adapter, dto};
use crate::services::domain::{PlaylistSnapshot, ServiceError, TokenGrant, TrackMetadata};
use crate::services::{RATE_LIMIT_RETRY_BUDGET, StreamingClient, retry_after_delay};

/// Apple Music caps relationship mutation calls at this many resources.
const MAX_TRACKS_PER_REQUEST: usize = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Apple Music API client
#[derive(Debug)]
pub struct AppleMusicClient {
    http_client: reqwest::Client,
    base_url: String,
    developer_token: String,
    storefront: String,
}

impl AppleMusicClient {
    /// Create a new client with the app's developer token.
    pub fn new(developer_token: impl Into<String>, storefront: impl Into<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .gzip(true)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http_client,
            base_url: "https://api.music.apple.com".to_string(),
            developer_token: developer_token.into(),
            storefront: storefront.into(),
        }
    }

    /// Create a client for testing with a custom base URL.
    #[cfg(test)]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into(),
            developer_token: "dev-token".into(),
            storefront: "us".into(),
        }
    }

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
        user_token: &str,
        context: &str,
    ) -> Result<T, ServiceError> {
        let response = self
            .http_client
            .get(url)
            .bearer_auth(&self.developer_token)
            .header("Music-User-Token", user_token)
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

    async fn send_track_batch(
        &self,
        playlist_id: &str,
        track_ids: &[String],
        user_token: &str,
        method: reqwest::Method,
    ) -> Result<(), ServiceError> {
        let url = format!("{}/v1/me/library/playlists/{}/tracks", self.base_url, playlist_id);
        let data: Vec<_> = track_ids
            .iter()
            .map(|id| json!({ "id": id, "type": "library-songs" }))
            .collect();
        let body = json!({ "data": data });

        for attempt in 0..=RATE_LIMIT_RETRY_BUDGET {
            let response = self
                .http_client
                .request(method.clone(), &url)
                .bearer_auth(&self.developer_token)
                .header("Music-User-Token", user_token)
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
                    "Apple Music rate limit, backing off"
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
impl StreamingClient for AppleMusicClient {
    async fn fetch_playlist(
        &self,
        playlist_id: &str,
        access_token: &str,
    ) -> Result<PlaylistSnapshot, ServiceError> {
        let url = format!("{}/v1/me/library/playlists/{}", self.base_url, playlist_id);
        let envelope: dto::Envelope<dto::PlaylistResource> =
            self.get_json(&url, access_token, "fetch playlist").await?;
        let playlist = envelope
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::NotFound(format!("playlist {playlist_id}")))?;

        // Offset pagination: next is a relative path rooted at the API host.
        let mut songs = Vec::new();
        let mut next = Some(format!(
            "{}/v1/me/library/playlists/{}/tracks?limit=100",
            self.base_url, playlist_id
        ));
        while let Some(url) = next {
            let page: dto::Envelope<dto::SongResource> = match self
                .get_json(&url, access_token, "fetch playlist page")
                .await
            {
                Ok(page) => page,
                // Apple 404s the tracks relationship of an empty playlist.
                Err(ServiceError::NotFound(_)) if songs.is_empty() => break,
                Err(e) => return Err(e),
            };
            songs.extend(page.data);
            next = page.next.map(|path| format!("{}{}", self.base_url, path));
        }

        Ok(adapter::to_snapshot(playlist, songs))
    }

    async fn create_playlist(
        &self,
        name: &str,
        description: &str,
        access_token: &str,
    ) -> Result<String, ServiceError> {
        let url = format!("{}/v1/me/library/playlists", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.developer_token)
            .header("Music-User-Token", access_token)
            .json(&json!({
                "attributes": { "name": name, "description": description }
            }))
            .send()
            .await
            .map_err(|e| ServiceError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::status_error(status, "create playlist"));
        }

        let envelope: dto::Envelope<dto::PlaylistResource> = response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))?;
        envelope
            .data
            .into_iter()
            .next()
            .map(|p| p.id)
            .ok_or_else(|| ServiceError::Parse("empty create response".to_string()))
    }

    async fn replace_playlist_tracks(
        &self,
        playlist_id: &str,
        track_ids: &[String],
        access_token: &str,
    ) -> Result<(), ServiceError> {
        let mut batches = track_ids.chunks(MAX_TRACKS_PER_REQUEST);

        // PUT replaces the whole tracks relationship; POST appends.
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
        let term = format!("{} {}", meta.name, meta.artist);
        let url = format!(
            "{}/v1/catalog/{}/search?types=songs&limit=5&term={}",
            self.base_url,
            self.storefront,
            urlencoding::encode(&term)
        );

        let response: dto::SearchResponse =
            self.get_json(&url, access_token, "search track").await?;
        Ok(adapter::first_search_hit(response))
    }

    /// Music User Tokens are minted by MusicKit on the user's device and
    /// cannot be refreshed server-side; the coordinator degrades to the
    /// stored token until the user re-authorizes.
    async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenGrant, ServiceError> {
        Err(ServiceError::Unimplemented(
            "apple_music token refresh".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn song_json(id: &str, name: &str) -> serde_json::Value {
        json!({
            "id": id,
            "attributes": {
                "name": name,
                "artistName": "Artist",
                "albumName": "Album",
                "durationInMillis": 1000
            }
        })
    }

    #[tokio::test]
    async fn test_fetch_playlist_follows_offset_pages() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/me/library/playlists/p.1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": "p.1", "attributes": {"name": "Gym"}}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/me/library/playlists/p.1/tracks"))
            .and(query_param("limit", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [song_json("i.1", "One")],
                "next": "/v1/me/library/playlists/p.1/tracks?offset=1"
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/me/library/playlists/p.1/tracks"))
            .and(query_param("offset", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [song_json("i.2", "Two")]
            })))
            .mount(&server)
            .await;

        let client = AppleMusicClient::with_base_url(server.uri());
        let snapshot = client.fetch_playlist("p.1", "user-token").await.unwrap();

        let ids: Vec<_> = snapshot.tracks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["i.1", "i.2"]);
        assert_eq!(snapshot.name, "Gym");
    }

    #[tokio::test]
    async fn test_empty_playlist_tracks_404_is_not_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/me/library/playlists/p.empty"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": "p.empty", "attributes": {"name": "New"}}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/me/library/playlists/p.empty/tracks"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = AppleMusicClient::with_base_url(server.uri());
        let snapshot = client.fetch_playlist("p.empty", "user-token").await.unwrap();
        assert!(snapshot.tracks.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_is_loudly_unimplemented() {
        let client = AppleMusicClient::with_base_url("http://unused");
        let err = client.refresh_token("whatever").await.unwrap_err();
        assert!(matches!(err, ServiceError::Unimplemented(_)));
    }
}
