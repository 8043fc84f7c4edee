//! CLI command definitions and handlers.
//!
//! Each subcommand is implemented against the shared pool/registry/engine
//! wiring and returns an `anyhow::Result<()>`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::auth::TokenRefresher;
use crate::model::ServiceKind;
use crate::sync::{SyncEngine, run_batch};
use crate::{config, db, links};

/// Cross-service playlist sync CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Database path (defaults to the configured path, then ./tunesync.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Reconcile one playlist across all of its linked services
    Sync {
        /// Canonical playlist id
        playlist_id: i64,
        /// Act as this user (checks ownership); omitted means trusted local use
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Sync every stale playlist, stalest first
    Batch {
        /// Override the configured per-run playlist cap
        #[arg(long)]
        cap: Option<u32>,
    },
    /// Import an external playlist as a new canonical playlist
    Import {
        /// Service to import from (spotify, apple_music, youtube_music)
        service: ServiceKind,
        /// The playlist's id on that service
        service_playlist_id: String,
        /// Username the import is performed as
        #[arg(short, long, default_value = "default")]
        user: String,
    },
    /// Create this playlist on another service and link it
    Export {
        /// Canonical playlist id
        playlist_id: i64,
        /// Target service
        service: ServiceKind,
        /// Username the export is performed as
        #[arg(short, long, default_value = "default")]
        user: String,
    },
    /// Link a playlist to an external playlist that already exists
    Connect {
        /// Canonical playlist id
        playlist_id: i64,
        /// Target service
        service: ServiceKind,
        /// The playlist's id on that service
        service_playlist_id: String,
        /// Username the link belongs to
        #[arg(short, long, default_value = "default")]
        user: String,
    },
    /// Show a playlist's links
    Links {
        /// Canonical playlist id
        playlist_id: i64,
    },
    /// Write a default config file to the OS config directory
    Init,
}

/// Run the specified CLI command.
pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    // Init needs no database or clients, so handle it before wiring them up.
    if let Commands::Init = cli.command {
        return init_config();
    }

    let config = config::load();

    let db_path = cli.db.or_else(|| config.database.path.clone());
    let url = db::db_url(db_path.as_deref());
    let pool = db::init_db(&url).await?;

    let registry = config.build_registry();
    let tokens = Arc::new(TokenRefresher::with_skew(
        pool.clone(),
        registry.clone(),
        config.sync.token_skew_secs,
    ));
    let engine = SyncEngine::new(pool.clone(), registry.clone(), tokens.clone());

    match cli.command {
        Commands::Sync { playlist_id, user } => {
            let acting_user = match user {
                Some(name) => Some(db::get_or_create_user(&pool, &name).await?),
                None => None,
            };
            let report = engine.sync_playlist(playlist_id, acting_user).await?;
            println!("{report}");
        }
        Commands::Batch { cap } => {
            let mut options = config.batch_options();
            if let Some(cap) = cap {
                options.cap = cap;
            }
            let summary = run_batch(&pool, &engine, &options).await?;
            println!(
                "Batch done: {} attempted, {} synced, {} failed",
                summary.attempted, summary.synced, summary.failed
            );
        }
        Commands::Import { service, service_playlist_id, user } => {
            let user_id = db::get_or_create_user(&pool, &user).await?;
            let playlist_id = links::import_playlist(
                &pool,
                &registry,
                &tokens,
                user_id,
                service,
                &service_playlist_id,
            )
            .await?;
            println!("Imported {service}:{service_playlist_id} as playlist {playlist_id}");
        }
        Commands::Export { playlist_id, service, user } => {
            let user_id = db::get_or_create_user(&pool, &user).await?;
            links::export_playlist(&pool, &registry, &tokens, playlist_id, user_id, service)
                .await?;
            println!("Exported playlist {playlist_id} to {service}");
        }
        Commands::Connect { playlist_id, service, service_playlist_id, user } => {
            let user_id = db::get_or_create_user(&pool, &user).await?;
            links::connect(&pool, playlist_id, user_id, service, &service_playlist_id).await?;
            println!("Linked playlist {playlist_id} to {service}:{service_playlist_id}");
        }
        Commands::Links { playlist_id } => {
            let all = links::list(&pool, playlist_id).await?;
            if all.is_empty() {
                println!("Playlist {playlist_id} has no links");
            }
            for link in all {
                let synced = match link.last_synced_at {
                    Some(at) => format!("last synced {at}"),
                    None => "never synced".to_string(),
                };
                let source = if link.is_source { " (source)" } else { "" };
                println!(
                    "{}: {} {}{source} - {synced}",
                    link.id, link.service, link.service_playlist_id
                );
            }
        }
        Commands::Init => unreachable!("handled above"),
    }

    Ok(())
}

fn init_config() -> anyhow::Result<()> {
    let path = config::config_path()
        .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;
    if path.exists() {
        anyhow::bail!("config already exists at {}", path.display());
    }
    config::save(&config::Config::default())?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}
