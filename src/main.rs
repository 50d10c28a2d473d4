//! Tycho CLI binary entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tycho::cli::{Cli, Commands, ServeArgs};
use tycho::config::Config;
use tycho::gateway::{self, GatewayConfig};
use tycho::models::shared_catalog;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve(args) => handle_serve(args).await,
        Commands::Models => handle_models().await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn handle_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = GatewayConfig::default().with_upstream(args.upstream);
    if !args.models.is_empty() {
        config = config.with_models(args.models);
    }
    let listener = tokio::net::TcpListener::bind(&args.addr).await?;
    gateway::serve(config, listener).await?;
    Ok(())
}

async fn handle_models() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();
    for model in shared_catalog().available(&config).await {
        println!("{model}");
    }
    Ok(())
}
