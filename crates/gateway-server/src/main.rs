//! Gateway binary entry point.

use clap::Parser;
use gateway_config::{load_config, ConfigLoader};
use gateway_server::{AppState, Server};
use gateway_telemetry::init_logging;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "api-gateway", about = "Resilient API gateway", version)]
struct Args {
    /// Configuration file (YAML, TOML or JSON)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            ConfigLoader::new()
                .with_file(path)
                .with_env_prefix("GATEWAY")
                .load()
                .await
        }
        None => load_config().await,
    };
    let mut config = match config {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if let Err(err) = init_logging(&config.logging) {
        eprintln!("failed to initialize logging: {err}");
        std::process::exit(1);
    }

    info!(
        routes = config.routes.len(),
        port = config.server.port,
        "Starting API gateway"
    );

    let state = match AppState::builder(config).build() {
        Ok(state) => state,
        Err(err) => {
            error!(error = %err, "Failed to build application state");
            std::process::exit(1);
        }
    };

    if let Err(err) = Server::new(state).run().await {
        error!(error = %err, "Server exited with error");
        std::process::exit(1);
    }
}
