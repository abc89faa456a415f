//! Authz Gate - HTTP authorization gate
//!
//! Asks a policy decision service about every request before forwarding it.

use authz_gate::{config::Config, metrics::server::MetricsServer, server::Server};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Authz Gate - HTTP authorization gate backed by OPA or OpenFGA
#[derive(Parser, Debug)]
#[command(name = "authz-gate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Validate the configuration and exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // Load configuration
    let config = Config::load(&args.config)?;
    info!("Loaded configuration from {:?}", args.config);

    if args.check_config {
        println!("Configuration OK");
        return Ok(());
    }

    info!("Starting Authz Gate v{}", authz_gate::VERSION);

    let mut metrics_server = if config.metrics.enabled {
        let mut server = MetricsServer::new(format!("0.0.0.0:{}", config.metrics.port));
        match server.start().await {
            Ok(_) => Some(server),
            Err(e) => {
                warn!("Metrics server disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    // Start server
    let server = Server::bind(config).await?;
    server.run().await?;

    if let Some(server) = metrics_server.as_mut() {
        server.shutdown().await;
    }

    Ok(())
}
