use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use format_daemon::config::{load_config, ConfigOverrides};
use format_daemon::observability::{init_tracing, metrics};
use format_daemon::StepEngine;

/// Formatting daemon: serves format requests over HTTP on a TCP port or a
/// unix socket.
#[derive(Debug, Parser)]
#[command(name = "format-daemon", version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "FORMAT_DAEMON_CONFIG")]
    config: PathBuf,

    /// Listen on 127.0.0.1:<PORT> instead of the configured endpoint.
    #[arg(long)]
    port: Option<u16>,

    /// Listen on a unix socket instead of the configured endpoint.
    #[arg(long)]
    unix_socket: Option<PathBuf>,

    /// Override the project root.
    #[arg(long)]
    project_root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let overrides = ConfigOverrides {
        port: args.port,
        unix_socket: args.unix_socket,
        project_root: args.project_root,
    };

    let config = load_config(&args.config, &overrides)?;
    init_tracing(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        "format-daemon starting"
    );

    if let Some(address) = &config.observability.metrics_address {
        metrics::install_exporter(address.parse()?)?;
    }

    let daemon = format_daemon::start(&config, Arc::new(StepEngine)).await?;
    daemon.run().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
