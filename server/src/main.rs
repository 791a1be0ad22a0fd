use clap::Parser;
use log::{info, warn};
use server::config::{ArenaConfig, MatchConfig};
use server::network::Server;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value_t = shared::DEFAULT_TICK_RATE)]
    tick_rate: u32,

    /// Maximum number of connected players
    #[arg(short, long, default_value_t = shared::DEFAULT_MAX_CLIENTS)]
    max_clients: usize,

    /// Players required before a round starts
    #[arg(long, default_value_t = shared::MIN_PLAYERS_TO_START)]
    min_players: usize,

    /// Seconds the round result stays up before the next countdown
    #[arg(long, default_value = "3.0")]
    round_end_delay: f32,

    /// Seconds between countdown steps
    #[arg(long, default_value = "1.0")]
    countdown_step: f32,

    /// JSON file with hazard home, spawn points and hazard tunables
    #[arg(short, long)]
    arena: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let arena = match &args.arena {
        Some(path) => {
            info!("Loading arena from {}", path.display());
            ArenaConfig::load(path)?
        }
        None => ArenaConfig::default(),
    };
    if arena.spawn_points.is_empty() {
        warn!("Arena has no spawn points, players will not be respawned");
    }

    let match_config = MatchConfig {
        min_players: args.min_players.max(1),
        round_end_delay: args.round_end_delay,
        countdown_step: args.countdown_step,
        ..MatchConfig::default()
    };

    let tick_rate = args.tick_rate.max(1);
    let address = format!("{}:{}", args.host, args.port);
    info!(
        "Starting server on {} at {}Hz (min players {}, max {})",
        address, tick_rate, match_config.min_players, args.max_clients
    );

    let mut server = Server::new(
        &address,
        Duration::from_secs_f64(1.0 / tick_rate as f64),
        args.max_clients,
        arena,
        match_config,
    )
    .await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
    }

    Ok(())
}
