use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod index;
mod server;
mod service;
mod state;

use config::ServerConfig;

/// Serve a folder of preview images by name
#[derive(Parser)]
#[command(name = "preview-index", version, about)]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// HTTP listen port
    #[arg(long, default_value_t = 8188)]
    port: u16,

    /// Directory that relative image folders are resolved against
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// Settings file to use instead of probing the host layout
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Prefix of the keys this service owns in the settings file
    #[arg(long, default_value = "PreviewIndex")]
    namespace: String,

    /// Route prefix ("" to mount at the root)
    #[arg(long, default_value = "/PreviewIndex")]
    api_prefix: String,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let base_dir = match cli.base_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    let config = ServerConfig {
        host: cli.host,
        port: cli.port,
        base_dir,
        settings_path: cli.settings,
        namespace: cli.namespace,
        api_prefix: cli.api_prefix,
    };

    server::run(config).await
}
