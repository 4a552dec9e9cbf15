//! gametrack - demo CLI for the tracking facade.
//!
//! A small composition root exercising the crate end to end: it wires the
//! file-backed state store and the configured providers into a [`Tracker`]
//! and fires events from the command line.
//!
//! # Commands
//!
//! - `gametrack launch`: Track the app launch (once per process)
//! - `gametrack play --score <N>`: Track a played game
//! - `gametrack state`: Show the persisted counters
//!
//! # Environment Variables
//!
//! See the [`config`](gametrack::config) module for available options.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use gametrack::config::Config;
use gametrack::registry::ProviderRegistry;
use gametrack::store::{FileStore, StateStore, StoreKey};
use gametrack::tracker::Tracker;

/// Graceful transport drain timeout.
const SHUTDOWN_TIMEOUT_SECS: u64 = 5;

/// gametrack - game analytics tracking demo.
///
/// Fires tracked events through the configured analytics providers and
/// persists launch counters across runs.
#[derive(Parser, Debug)]
#[command(name = "gametrack")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    GAMETRACK_PROVIDERS       Comma-separated providers: mixpanel, console
    GAMETRACK_MIXPANEL_TOKEN  Mixpanel project token (required for mixpanel)
    GAMETRACK_MIXPANEL_URL    Ingestion base URL (default: https://api.mixpanel.com)
    GAMETRACK_DISTINCT_ID     Event identity (default: hostname)
    GAMETRACK_STATE_PATH      State file (default: ~/.gametrack/state.json)
    GAMETRACK_BATCH_SIZE      Transport batch size (default: 50)

EXAMPLES:
    # Track a launch to the console provider
    export GAMETRACK_PROVIDERS=console
    gametrack launch

    # Track a played game to Mixpanel
    export GAMETRACK_PROVIDERS=mixpanel
    export GAMETRACK_MIXPANEL_TOKEN=your-project-token
    gametrack play --score 1337
")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Track the app launch.
    ///
    /// Derives first-launch and launch-count state from the state file.
    /// Repeated runs of the same process would be suppressed; separate
    /// invocations are separate sessions and each tracks once.
    Launch,

    /// Track a played game.
    ///
    /// Keeps its own play counter in the state file, the way a game with
    /// its own save system would.
    Play {
        /// Score at the end of the game.
        #[arg(short, long)]
        score: i64,
    },

    /// Show the persisted counters.
    State,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let config = Config::from_env().context("failed to load configuration")?;
    let state_path = config.state_path.clone();

    match cli.command {
        Command::Launch => {
            let store = FileStore::open(&state_path).context("failed to open state store")?;
            let registry = Arc::new(ProviderRegistry::new(config));
            let tracker = Tracker::new(Box::new(store), Arc::clone(&registry));

            if tracker.app_launched().context("failed to track launch")? {
                println!("App launch tracked");
            } else {
                println!("App launch already tracked this session");
            }

            drain(&registry).await;
        }
        Command::Play { score } => {
            let mut store = FileStore::open(&state_path).context("failed to open state store")?;

            // The demo keeps its own play counter, like a game with its own
            // save system would.
            let game_count = store.get_int(StoreKey::GamePlayedGameCount, 0) + 1;
            store.set_int(StoreKey::GamePlayedGameCount, game_count);
            store.save().context("failed to save play counter")?;

            let registry = Arc::new(ProviderRegistry::new(config));
            let tracker = Tracker::new(Box::new(store), Arc::clone(&registry));

            tracker
                .game_played(score, game_count)
                .context("failed to track game")?;
            println!("Game play tracked (score: {score}, game count: {game_count})");

            drain(&registry).await;
        }
        Command::State => {
            let store = FileStore::open(&state_path).context("failed to open state store")?;

            println!("State file: {}", state_path.display());
            println!(
                "  {} = {}",
                StoreKey::AppLaunchedFirstTime.as_str(),
                store.get_int(StoreKey::AppLaunchedFirstTime, 1)
            );
            println!(
                "  {} = {}",
                StoreKey::AppLaunchedCount.as_str(),
                store.get_int(StoreKey::AppLaunchedCount, 0)
            );
            println!(
                "  {} = {}",
                StoreKey::GamePlayedGameCount.as_str(),
                store.get_int(StoreKey::GamePlayedGameCount, 0)
            );
        }
    }

    Ok(())
}

/// Drains transport workers so buffered events go out before exit.
async fn drain(registry: &ProviderRegistry) {
    let undelivered = registry
        .shutdown(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS))
        .await;
    if undelivered > 0 {
        warn!(undelivered, "Some events were not delivered before exit");
    }
}
