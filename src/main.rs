//! Connoisseur CLI entry point.

use anyhow::Context as _;
use clap::Parser;
use connoisseur::config::Config;
use connoisseur::db::Db;
use connoisseur::emotes::SqliteEmoteStore;
use connoisseur::messaging::discord::{self, DiscordHandler, DiscordTransport};
use connoisseur::replies::{ReplyCache, ReplySync};
use serenity::all::Http;
use std::sync::Arc;
use std::time::Duration;

/// Events buffered between the gateway and the reply synchronizer.
const EVENT_QUEUE: usize = 256;

/// How long shutdown waits for the synchronizer to drain.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "connoisseur")]
#[command(about = "Replies with the custom emotes people mention, and keeps those replies in sync")]
struct Cli {
    /// Path to config file (optional)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::load().context("failed to load configuration")?,
    };

    let _log_guard = connoisseur::logging::init_tracing(cli.debug, config.log_dir.as_deref())?;

    tracing::info!(data_dir = %config.data_dir.display(), "configuration loaded");

    let db = Db::connect(&config.sqlite_path())
        .await
        .context("failed to open database")?;
    let store = Arc::new(SqliteEmoteStore::new(db.sqlite.clone()));

    let http = Arc::new(Http::new(&config.discord_token));
    let transport = Arc::new(DiscordTransport::new(http, config.transport_timeout));

    let cache = ReplyCache::new(config.replies.capacity());
    let sync = ReplySync::new(store.clone(), transport.clone(), cache);
    let (event_tx, event_rx) = tokio::sync::mpsc::channel(EVENT_QUEUE);
    let sync_task = tokio::spawn(sync.run(event_rx));

    let handler = DiscordHandler::new(
        store,
        transport,
        event_tx,
        config.command_prefix.clone(),
        config.owner_ids.clone(),
    );
    let mut client = serenity::Client::builder(&config.discord_token, discord::intents())
        .event_handler(handler)
        .await
        .context("failed to build Discord client")?;
    let shard_manager = client.shard_manager.clone();

    tracing::info!("connoisseur started");

    tokio::select! {
        result = client.start() => {
            if let Err(error) = result {
                tracing::error!(%error, "Discord client stopped");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    tracing::info!("shutting down");
    shard_manager.shutdown_all().await;

    // The handler owns the last event sender; dropping the client closes the
    // queue so the synchronizer can drain and exit.
    drop(client);
    if tokio::time::timeout(DRAIN_TIMEOUT, sync_task).await.is_err() {
        tracing::warn!("reply synchronizer did not drain in time");
    }

    db.close().await;

    tracing::info!("connoisseur stopped");
    Ok(())
}
