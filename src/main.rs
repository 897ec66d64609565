use clap::Parser;
use simple_gossip::{
    common::{Config, Result},
    service::serve,
};
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    init_tracing(config.verbose);
    info!(version = env!("CARGO_PKG_VERSION"), "simple-gossip starting");

    let result = serve(&config, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await;

    info!("simple-gossip stopped");
    result
}

// stdout carries protocol traffic, so logs go to stderr
fn init_tracing(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        })
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
