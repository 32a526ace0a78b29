//! Local bridge service backed by the simulated chain.
//!
//! Serves the bridge WebSocket endpoint with a `SimChain`/`SimSigner` pair
//! per connection, so a game surface can be developed end-to-end without a
//! real chain. Spins settle deterministically and verify against the same
//! reconstruction any auditor would run.

use anyhow::{Context, Result};
use clap::Parser;
use reelgate_bridge::{Service, ServiceConfig};
use reelgate_engine::mocks::{SimChain, SimSigner};
use reelgate_types::GameConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "reelgate-bridge", about = "Reelgate bridge service (simulated chain)")]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address override.
    #[arg(long)]
    listen: Option<SocketAddr>,
}

#[derive(Deserialize)]
struct FileConfig {
    #[serde(default = "default_listen")]
    listen: SocketAddr,
    #[serde(default)]
    service: ServiceConfig,
    /// Game variant; defaults to the built-in standard configuration.
    game: Option<GameConfig>,
    /// Starting wallet balance for each simulated surface.
    #[serde(default = "default_starting_balance")]
    starting_balance: u64,
    /// Base seed for the simulated chain; each connection derives its own.
    #[serde(default)]
    sim_seed: u64,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8425))
}

fn default_starting_balance() -> u64 {
    10_000
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            service: ServiceConfig::default(),
            game: None,
            starting_balance: default_starting_balance(),
            sim_seed: 0,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("could not read config file {}", path.display()))?;
            serde_yaml::from_str::<FileConfig>(&contents).context("could not parse config file")?
        }
        None => FileConfig::default(),
    };
    if let Some(listen) = args.listen {
        config.listen = listen;
    }

    let game = config.game.unwrap_or_else(GameConfig::standard);
    game.validate().context("invalid game configuration")?;
    info!(
        contract = %game.contract_id,
        reels = game.layout.reels,
        rows = game.layout.rows,
        paylines = game.paylines.len(),
        "loaded game configuration"
    );

    // Each connection gets its own simulated chain so surfaces do not share
    // balances; the per-connection seed keeps runs distinct but repeatable.
    let starting_balance = config.starting_balance;
    let base_seed = config.sim_seed;
    let game_for_factory = game.clone();
    let connection_counter = Arc::new(AtomicU64::new(0));
    let factory = move || {
        let connection = connection_counter.fetch_add(1, Ordering::Relaxed);
        let seed = base_seed.wrapping_add(connection);
        (
            SimChain::new(game_for_factory.clone(), starting_balance, seed),
            SimSigner::new(seed),
        )
    };

    let service = Service::new(config.service, game, factory);
    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("could not bind {}", config.listen))?;
    info!(listen = %config.listen, "bridge service listening");
    axum::serve(listener, service.router())
        .await
        .context("server error")?;
    Ok(())
}
