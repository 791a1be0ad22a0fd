use clap::Parser;
use client::network::Client;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Display name shown in the lobby
    #[arg(short = 'n', long, default_value = "Bot")]
    name: String,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Chance that the bot punches the ball when it comes close
    #[arg(short = 'p', long, default_value = "0.6")]
    punch_probability: f64,

    /// Local update rate
    #[arg(short = 't', long, default_value_t = shared::DEFAULT_TICK_RATE)]
    tick_rate: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client {:?}...", args.name);
    info!("Connecting to: {}", args.server);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }

    let mut client = Client::new(
        &args.server,
        &args.name,
        args.fake_ping,
        args.punch_probability,
        args.tick_rate,
    )
    .await?;

    client.run().await?;

    Ok(())
}
