//! The reconciliation engine.
//!
//! One invocation walks Fetching -> SelectingAuthoritative -> Rewriting ->
//! Propagating. Per-link failures are captured in the report instead of
//! aborting; the only hard failures are a missing/unlinked playlist and the
//! case where no linked service could be fetched at all.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use sqlx::SqlitePool;

use crate::auth::TokenRefresher;
use crate::db;
use crate::error::{Error, Result};
use crate::model::{PlaylistLink, Track};
use crate::resolver;
use crate::services::{ClientRegistry, PlaylistSnapshot};
use crate::sync::report::{SyncIssue, SyncReport, SyncStage};

/// Orchestrates reconciliation of one canonical playlist across its links.
pub struct SyncEngine {
    pool: SqlitePool,
    registry: ClientRegistry,
    tokens: Arc<TokenRefresher>,
}

impl SyncEngine {
    pub fn new(pool: SqlitePool, registry: ClientRegistry, tokens: Arc<TokenRefresher>) -> Self {
        Self { pool, registry, tokens }
    }

    /// Reconcile one playlist across all of its links.
    ///
    /// The snapshot from the most recently synced link wins wholesale
    /// (last-write-wins per link, no per-track merging). With every link
    /// never-synced, the oldest link wins; the link listing is ordered by id
    /// and selection only moves on strictly greater freshness.
    ///
    /// `acting_user` is checked against ownership and link membership when
    /// present; `None` means a trusted caller (batch runner, local CLI).
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the playlist does not exist
    /// - [`Error::Forbidden`] if the acting user neither owns the playlist
    ///   nor holds one of its links
    /// - [`Error::NoLinkedServices`] if it has no links
    /// - [`Error::NoServiceReachable`] if every link's fetch failed; the
    ///   canonical track list is untouched in that case
    pub async fn sync_playlist(
        &self,
        playlist_id: i64,
        acting_user: Option<i64>,
    ) -> Result<SyncReport> {
        let playlist = db::get_playlist(&self.pool, playlist_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("playlist {playlist_id}")))?;

        let links = db::list_links(&self.pool, playlist_id).await?;
        if let Some(user_id) = acting_user
            && playlist.owner_id != user_id
            && !links.iter().any(|l| l.user_id == user_id)
        {
            return Err(Error::Forbidden);
        }
        if links.is_empty() {
            return Err(Error::NoLinkedServices(playlist_id));
        }

        // Fetching: all links concurrently, then a join point before any
        // selection happens.
        let fetches = join_all(links.iter().map(|link| self.fetch_link(link))).await;

        let mut issues = Vec::new();
        let mut candidates: Vec<(&PlaylistLink, PlaylistSnapshot)> = Vec::new();
        for (link, fetched) in links.iter().zip(fetches) {
            match fetched {
                Ok(snapshot) => candidates.push((link, snapshot)),
                Err(message) => {
                    tracing::warn!(
                        playlist_id,
                        service = %link.service,
                        error = %message,
                        "Link fetch failed; excluded from authoritative pool"
                    );
                    issues.push(SyncIssue { service: link.service, stage: SyncStage::Fetch, message });
                }
            }
        }

        if candidates.is_empty() {
            return Err(Error::NoServiceReachable {
                playlist_id,
                failures: issues.into_iter().map(|i| (i.service, i.message)).collect(),
            });
        }

        // SelectingAuthoritative: greatest link freshness wins.
        let mut authoritative = candidates.remove(0);
        for candidate in candidates {
            if candidate.0.freshness() > authoritative.0.freshness() {
                authoritative = candidate;
            }
        }
        let (auth_link, auth_snapshot) = authoritative;
        tracing::info!(
            playlist_id,
            service = %auth_link.service,
            freshness = auth_link.freshness(),
            tracks = auth_snapshot.tracks.len(),
            "Selected authoritative snapshot"
        );

        // Rewriting: resolve every track, then replace membership atomically.
        let track_ids =
            resolver::resolve_tracks(&self.pool, auth_link.service, &auth_snapshot.tracks).await?;
        db::replace_playlist_tracks(&self.pool, playlist_id, &track_ids).await?;
        db::update_playlist_meta(&self.pool, playlist_id, &auth_snapshot.name, &auth_snapshot.description)
            .await?;

        let now = Utc::now().timestamp();
        db::touch_playlist_synced(&self.pool, playlist_id, now).await?;
        // The authoritative link is in sync with itself by definition.
        db::touch_link_synced(&self.pool, auth_link.id, now).await?;

        // Propagating: push the reconciled list to every other link,
        // concurrently, translated to each target's id space.
        let tracks = db::get_playlist_tracks(&self.pool, playlist_id).await?;
        let others: Vec<&PlaylistLink> = links.iter().filter(|l| l.id != auth_link.id).collect();
        let pushes = join_all(others.iter().map(|link| self.push_link(link, &tracks))).await;

        let mut synced_services = Vec::new();
        for (link, pushed) in others.iter().zip(pushes) {
            match pushed {
                Ok(count) => {
                    db::touch_link_synced(&self.pool, link.id, now).await?;
                    tracing::debug!(playlist_id, service = %link.service, count, "Pushed playlist");
                    synced_services.push(link.service);
                }
                Err(message) => {
                    tracing::warn!(
                        playlist_id,
                        service = %link.service,
                        error = %message,
                        "Push failed; canonical rewrite stands"
                    );
                    issues.push(SyncIssue { service: link.service, stage: SyncStage::Push, message });
                }
            }
        }

        Ok(SyncReport {
            playlist_id,
            authoritative: auth_link.service,
            track_count: track_ids.len(),
            synced_services,
            issues,
        })
    }

    async fn fetch_link(&self, link: &PlaylistLink) -> std::result::Result<PlaylistSnapshot, String> {
        let token = self
            .tokens
            .access_token(link.user_id, link.service)
            .await
            .map_err(|e| e.to_string())?;
        let client = self.registry.get(link.service).map_err(|e| e.to_string())?;
        client
            .fetch_playlist(&link.service_playlist_id, &token)
            .await
            .map_err(|e| e.to_string())
    }

    /// Push the canonical list to one link, keeping only tracks with a known
    /// id on that service. Returns how many tracks were pushed.
    async fn push_link(
        &self,
        link: &PlaylistLink,
        tracks: &[Track],
    ) -> std::result::Result<usize, String> {
        let token = self
            .tokens
            .access_token(link.user_id, link.service)
            .await
            .map_err(|e| e.to_string())?;
        let client = self.registry.get(link.service).map_err(|e| e.to_string())?;

        let external_ids: Vec<String> = tracks
            .iter()
            .filter_map(|t| t.external_id(link.service).map(String::from))
            .collect();

        client
            .replace_playlist_tracks(&link.service_playlist_id, &external_ids, &token)
            .await
            .map_err(|e| e.to_string())?;
        Ok(external_ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Credential, ServiceKind};
    use crate::services::domain::ServiceError;
    use crate::services::mocks::{MockClient, snapshot};
    use crate::test_utils::temp_db;

    struct Fixture {
        pool: SqlitePool,
        registry: ClientRegistry,
        user: i64,
        playlist: i64,
    }

    /// One playlist owned by one user with a valid credential per service.
    async fn fixture(pool: SqlitePool, services: &[ServiceKind]) -> Fixture {
        let user = db::get_or_create_user(&pool, "alice").await.unwrap();
        for &service in services {
            db::upsert_credential(
                &pool,
                &Credential {
                    user_id: user,
                    service,
                    access_token: "token".into(),
                    refresh_token: None,
                    expires_at: None,
                },
            )
            .await
            .unwrap();
        }
        let playlist = db::create_playlist(&pool, "Mix", "", user).await.unwrap();
        Fixture { pool, registry: ClientRegistry::new(), user, playlist }
    }

    async fn add_link(fx: &Fixture, service: ServiceKind, synced_at: Option<i64>) -> i64 {
        let id = db::create_link(&fx.pool, fx.playlist, fx.user, service, "ext-pl", false)
            .await
            .unwrap();
        if let Some(at) = synced_at {
            db::touch_link_synced(&fx.pool, id, at).await.unwrap();
        }
        id
    }

    fn engine(fx: &Fixture) -> SyncEngine {
        let tokens = Arc::new(TokenRefresher::new(fx.pool.clone(), fx.registry.clone()));
        SyncEngine::new(fx.pool.clone(), fx.registry.clone(), tokens)
    }

    #[tokio::test]
    async fn test_unlinked_playlist_is_rejected() {
        let (_dir, pool) = temp_db().await;
        let fx = fixture(pool, &[]).await;
        let err = engine(&fx).sync_playlist(fx.playlist, None).await.unwrap_err();
        assert!(matches!(err, Error::NoLinkedServices(_)));
    }

    #[tokio::test]
    async fn test_stranger_cannot_sync_someone_elses_playlist() {
        let (_dir, pool) = temp_db().await;
        let fx = fixture(pool, &[ServiceKind::Spotify]).await;
        add_link(&fx, ServiceKind::Spotify, None).await;
        let stranger = db::get_or_create_user(&fx.pool, "mallory").await.unwrap();

        let err = engine(&fx)
            .sync_playlist(fx.playlist, Some(stranger))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden));

        // The owner is always allowed through the authorization check
        let err = engine(&fx)
            .sync_playlist(fx.playlist, Some(fx.user))
            .await
            .unwrap_err();
        assert!(!matches!(err, Error::Forbidden));
    }

    #[tokio::test]
    async fn test_freshest_link_wins_and_ids_are_translated() {
        let (_dir, pool) = temp_db().await;
        let mut fx = fixture(
            pool,
            &[ServiceKind::Spotify, ServiceKind::AppleMusic, ServiceKind::YoutubeMusic],
        )
        .await;

        // Pre-resolve spotify sightings so ISRC cross-linking can translate
        // the authoritative youtube list into spotify ids.
        for (id, name, isrc) in [("sp-1", "One", "US1"), ("sp-2", "Two", "US2")] {
            resolver::resolve_or_create(
                &fx.pool,
                &crate::services::TrackMetadata {
                    name: name.into(),
                    artist: "Artist".into(),
                    album: String::new(),
                    isrc: Some(isrc.into()),
                    duration_ms: None,
                },
                ServiceKind::Spotify,
                id,
            )
            .await
            .unwrap();
        }

        let spotify = Arc::new(MockClient::with_snapshot(snapshot("stale", &[])));
        let apple = Arc::new(MockClient::with_snapshot(snapshot("stale", &[])));
        let youtube = Arc::new(MockClient::with_snapshot(snapshot(
            "Fresh Mix",
            &[
                ("yt-2", "Two", "Artist", Some("US2")),
                ("yt-1", "One", "Artist", Some("US1")),
            ],
        )));
        fx.registry.insert(ServiceKind::Spotify, spotify.clone());
        fx.registry.insert(ServiceKind::AppleMusic, apple.clone());
        fx.registry.insert(ServiceKind::YoutubeMusic, youtube.clone());

        add_link(&fx, ServiceKind::Spotify, None).await;
        add_link(&fx, ServiceKind::AppleMusic, Some(100)).await;
        add_link(&fx, ServiceKind::YoutubeMusic, Some(200)).await;

        let report = engine(&fx).sync_playlist(fx.playlist, None).await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.authoritative, ServiceKind::YoutubeMusic);
        assert_eq!(report.track_count, 2);
        assert_eq!(report.synced_services.len(), 2);

        // Canonical list follows the authoritative snapshot's order
        let tracks = db::get_playlist_tracks(&fx.pool, fx.playlist).await.unwrap();
        let names: Vec<_> = tracks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Two", "One"]);

        // Spotify received the translated, reordered id list
        assert_eq!(
            spotify.last_push().unwrap(),
            vec!["sp-2".to_string(), "sp-1".to_string()]
        );
        // Apple has no ids for these tracks, so its push is empty
        assert_eq!(apple.last_push().unwrap(), Vec::<String>::new());
        // The authoritative link is never pushed to
        assert!(youtube.last_push().is_none());

        // Playlist metadata follows the winner too
        let playlist = db::get_playlist(&fx.pool, fx.playlist).await.unwrap().unwrap();
        assert_eq!(playlist.name, "Fresh Mix");
        assert!(playlist.last_synced_at.is_some());
    }

    #[tokio::test]
    async fn test_all_never_synced_links_pick_the_oldest_deterministically() {
        let (_dir, pool) = temp_db().await;
        let mut fx = fixture(pool, &[ServiceKind::Spotify, ServiceKind::AppleMusic]).await;

        let spotify = Arc::new(MockClient::with_snapshot(snapshot(
            "From Spotify",
            &[("sp-1", "One", "Artist", None)],
        )));
        let apple = Arc::new(MockClient::with_snapshot(snapshot(
            "From Apple",
            &[("i.1", "Other", "Artist", None)],
        )));
        fx.registry.insert(ServiceKind::Spotify, spotify);
        fx.registry.insert(ServiceKind::AppleMusic, apple);

        add_link(&fx, ServiceKind::Spotify, None).await;
        add_link(&fx, ServiceKind::AppleMusic, None).await;

        let report = engine(&fx).sync_playlist(fx.playlist, None).await.unwrap();
        assert_eq!(report.authoritative, ServiceKind::Spotify);
    }

    #[tokio::test]
    async fn test_one_failed_push_does_not_block_the_rest() {
        let (_dir, pool) = temp_db().await;
        let mut fx = fixture(
            pool,
            &[ServiceKind::Spotify, ServiceKind::AppleMusic, ServiceKind::YoutubeMusic],
        )
        .await;

        let apple = Arc::new(MockClient::with_snapshot(snapshot(
            "Fresh",
            &[("i.1", "One", "Artist", None)],
        )));
        let spotify = Arc::new(MockClient::push_failing(
            snapshot("stale", &[]),
            ServiceError::Unavailable("503".into()),
        ));
        let youtube = Arc::new(MockClient::with_snapshot(snapshot("stale", &[])));
        fx.registry.insert(ServiceKind::AppleMusic, apple);
        fx.registry.insert(ServiceKind::Spotify, spotify);
        fx.registry.insert(ServiceKind::YoutubeMusic, youtube.clone());

        add_link(&fx, ServiceKind::Spotify, Some(50)).await;
        add_link(&fx, ServiceKind::AppleMusic, Some(200)).await;
        let youtube_link = add_link(&fx, ServiceKind::YoutubeMusic, Some(100)).await;

        let report = engine(&fx).sync_playlist(fx.playlist, None).await.unwrap();

        // Canonical rewrite stands despite the failed push
        let tracks = db::get_playlist_tracks(&fx.pool, fx.playlist).await.unwrap();
        assert_eq!(tracks.len(), 1);

        assert_eq!(report.synced_services, vec![ServiceKind::YoutubeMusic]);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].service, ServiceKind::Spotify);
        assert_eq!(report.issues[0].stage, SyncStage::Push);

        // The healthy link's sync timestamp advanced
        let links = db::list_links(&fx.pool, fx.playlist).await.unwrap();
        let youtube_synced = links.iter().find(|l| l.id == youtube_link).unwrap();
        assert!(youtube_synced.last_synced_at.unwrap() > 100);
    }

    #[tokio::test]
    async fn test_no_reachable_service_leaves_canonical_untouched() {
        let (_dir, pool) = temp_db().await;
        let mut fx = fixture(pool, &[ServiceKind::Spotify, ServiceKind::AppleMusic]).await;

        // Seed existing canonical membership
        let seeded = db::insert_track(
            &fx.pool,
            &crate::services::TrackMetadata {
                name: "Keep Me".into(),
                artist: "Artist".into(),
                album: String::new(),
                isrc: None,
                duration_ms: None,
            },
            ServiceKind::Spotify,
            "sp-keep",
        )
        .await
        .unwrap();
        db::replace_playlist_tracks(&fx.pool, fx.playlist, &[seeded]).await.unwrap();

        fx.registry.insert(
            ServiceKind::Spotify,
            Arc::new(MockClient::failing(ServiceError::Unavailable("503".into()))),
        );
        fx.registry.insert(
            ServiceKind::AppleMusic,
            Arc::new(MockClient::failing(ServiceError::AuthExpired)),
        );

        add_link(&fx, ServiceKind::Spotify, Some(100)).await;
        add_link(&fx, ServiceKind::AppleMusic, Some(200)).await;

        let err = engine(&fx).sync_playlist(fx.playlist, None).await.unwrap_err();
        match err {
            Error::NoServiceReachable { failures, .. } => assert_eq!(failures.len(), 2),
            other => panic!("expected NoServiceReachable, got {other}"),
        }

        let tracks = db::get_playlist_tracks(&fx.pool, fx.playlist).await.unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].name, "Keep Me");
    }
}
