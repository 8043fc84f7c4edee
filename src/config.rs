//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\tunesync\config.toml
//! - macOS: ~/Library/Application Support/tunesync/config.toml
//! - Linux: ~/.config/tunesync/config.toml
//!
//! The config file is human-readable and editable. Settings are loaded at
//! startup; provider credentials live here, per-user OAuth tokens live in
//! the database.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::ServiceKind;
use crate::services::apple_music::AppleMusicClient;
use crate::services::spotify::SpotifyClient;
use crate::services::ClientRegistry;
use crate::sync::BatchOptions;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database settings
    pub database: DatabaseConfig,

    /// Spotify app credentials
    pub spotify: SpotifyConfig,

    /// Apple Music app credentials
    pub apple_music: AppleMusicConfig,

    /// Sync behavior tuning
    pub sync: SyncConfig,
}

/// Database settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite file; defaults next to the working directory
    pub path: Option<PathBuf>,
}

/// Spotify application credentials (from the developer dashboard)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Apple Music application credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppleMusicConfig {
    /// Signed MusicKit developer token
    pub developer_token: Option<String>,

    /// Catalog storefront used for track search
    pub storefront: String,
}

impl Default for AppleMusicConfig {
    fn default() -> Self {
        Self {
            developer_token: None,
            storefront: "us".to_string(),
        }
    }
}

/// Sync behavior tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Batch runs skip playlists synced within this many hours
    pub staleness_hours: u32,

    /// Maximum playlists per batch run
    pub batch_cap: u32,

    /// Wall-clock budget per playlist during a batch run, in seconds
    pub playlist_budget_secs: u64,

    /// Refresh tokens this many seconds before expiry
    pub token_skew_secs: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            staleness_hours: 24,
            batch_cap: 100,
            playlist_budget_secs: 120,
            token_skew_secs: crate::auth::DEFAULT_TOKEN_SKEW_SECS,
        }
    }
}

impl Config {
    /// Build the client registry from whichever services are configured.
    ///
    /// An unconfigured service simply has no entry; callers get a loud
    /// "no client adapter" error if a link points at it.
    pub fn build_registry(&self) -> ClientRegistry {
        let mut registry = ClientRegistry::new();

        if let (Some(id), Some(secret)) =
            (&self.spotify.client_id, &self.spotify.client_secret)
        {
            registry.insert(
                ServiceKind::Spotify,
                Arc::new(SpotifyClient::new(id.clone(), secret.clone())),
            );
        } else {
            tracing::debug!("Spotify credentials not configured");
        }

        if let Some(token) = &self.apple_music.developer_token {
            registry.insert(
                ServiceKind::AppleMusic,
                Arc::new(AppleMusicClient::new(
                    token.clone(),
                    self.apple_music.storefront.clone(),
                )),
            );
        } else {
            tracing::debug!("Apple Music developer token not configured");
        }

        registry
    }

    /// Batch options derived from the sync section.
    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            staleness_secs: i64::from(self.sync.staleness_hours) * 3600,
            cap: self.sync.batch_cap,
            playlist_budget: std::time::Duration::from_secs(self.sync.playlist_budget_secs),
        }
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tunesync"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from disk
///
/// Returns default config if file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Config::default();
    };

    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to disk
///
/// Creates the config directory if it doesn't exist.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    let dir = config_dir().ok_or(ConfigError::NoConfigDir)?;
    let path = dir.join("config.toml");

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::CreateDir(dir.clone(), e))?;

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, &path)
        .map_err(|e| ConfigError::Rename(temp_path, path.clone(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================
