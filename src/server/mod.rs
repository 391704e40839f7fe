//! HTTP server module
//!
//! - Route table and handlers (http.rs)
//! - Error to response mapping (error.rs)

pub mod error;
pub mod http;

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::service::AssetService;
use crate::state::settings::SettingsStore;

/// Build the service from config, index once, and serve until Ctrl-C.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let settings = match &config.settings_path {
        Some(path) => SettingsStore::at(path),
        None => SettingsStore::discover(&std::env::current_dir()?),
    };
    let service = Arc::new(AssetService::new(&config, settings));

    let startup = service.clone();
    let report = tokio::task::spawn_blocking(move || startup.rebuild_index()).await?;
    if !report.success {
        warn!("⚠️  Starting with an empty index; call /index once the image folder exists");
    }

    let app = http::router(service.clone(), &config.api_prefix);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🎨 Preview index listening on http://{addr}{}", config.api_prefix);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    service.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("⚠️  Could not listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
