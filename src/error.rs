//! Application-wide error types.
//!
//! This module provides a unified error hierarchy for the application.
//! Library modules use specific error types via `thiserror`, while
//! CLI/main uses `anyhow` for convenient error propagation.
//!
//! # Design
//!
//! - [`Error`]: Top-level application error enum
//! - [`crate::services::ServiceError`]: boundary taxonomy for streaming
//!   service calls, captured per link rather than propagated
//! - All errors implement `std::error::Error` for compatibility

use crate::model::ServiceKind;
use crate::services::ServiceError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
///
/// Aggregates errors from all subsystems for unified handling. Per-service
/// failures during a sync are collected into the sync report instead; only
/// the variants here abort a whole invocation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Entity missing locally (404-equivalent to callers)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller lacks rights to the canonical playlist
    #[error("Forbidden")]
    Forbidden,

    /// A conflicting row already exists (e.g. duplicate playlist link)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// No credential stored for this (user, service); requires user action
    #[error("No {service} account connected for user {user_id}")]
    AuthMissing { user_id: i64, service: ServiceKind },

    /// The playlist has no links, so there is nothing to reconcile against
    #[error("Playlist {0} has no linked services")]
    NoLinkedServices(i64),

    /// Every linked service failed to fetch; the canonical state is untouched
    #[error("Failed to fetch playlist {playlist_id} from any service ({} errors)", failures.len())]
    NoServiceReachable {
        playlist_id: i64,
        failures: Vec<(ServiceKind, String)>,
    },

    /// A streaming service call failed outside of per-link error capture
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),
}

impl Error {
    /// Create a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
