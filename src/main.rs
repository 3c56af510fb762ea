//! S3 Direct Upload - signing service for browser-to-bucket uploads

use clap::Parser;
use s3_direct_upload::metrics::server::MetricsServer;
use s3_direct_upload::{config::Config, server::Server};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// S3 Direct Upload - issues signed POST policies for direct uploads
#[derive(Parser, Debug)]
#[command(name = "s3-direct-upload")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    if args.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    info!("Starting S3 Direct Upload v{}", s3_direct_upload::VERSION);

    let config = Config::load(&args.config)?;
    info!("Loaded configuration from {:?}", args.config);

    let mut metrics_server = if config.metrics.enabled {
        let mut server = MetricsServer::new(format!("0.0.0.0:{}", config.metrics.port));
        match server.start().await {
            Ok(addr) => {
                info!("Metrics available on http://{}/metrics", addr);
                Some(server)
            }
            Err(e) => {
                warn!("Metrics server disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    let server = Server::new(config).await?;
    server.run().await?;

    if let Some(ref mut metrics_server) = metrics_server {
        metrics_server.shutdown().await;
    }

    Ok(())
}
