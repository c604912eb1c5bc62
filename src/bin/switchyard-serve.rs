//! Long-running server: one listener, one dispatch loop.
//!
//! Usage: `switchyard-serve [settings-file]`

use std::path::PathBuf;
use std::sync::Arc;
use switchyard::demo::{self, DemoOptions, MemoryStore};
use switchyard::logging::{LogConfig, LogFormat, LogLevel};
use switchyard::server;
use switchyard_config::ServerSettings;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let file = std::env::args().nth(1).map(PathBuf::from);
    let settings = ServerSettings::load(file.as_deref())?;

    let _guard = LogConfig::new()
        .level(LogLevel::from_str(&settings.log_level).unwrap_or(LogLevel::Info))
        .format(LogFormat::Json)
        .init()?;

    let mut options = DemoOptions {
        max_body_bytes: settings.max_body_bytes,
        ..DemoOptions::default()
    };
    if settings.api_keys.is_empty() {
        warn!("No api_keys configured, falling back to the development key");
    } else {
        options.api_keys = settings.api_keys.clone();
    }

    let dispatcher = demo::build_server(
        settings.dispatch.clone(),
        options,
        Arc::new(MemoryStore::new()),
    )?;
    for entry in dispatcher.routes() {
        info!(method = %entry.method, pattern = %entry.pattern, target = ?entry.target, "Route");
    }

    let listener = TcpListener::bind(settings.bind_addr()?).await?;
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Shutdown requested");
    };

    let served = server::serve(listener, Arc::new(dispatcher), shutdown).await?;
    info!(served, "Server stopped");
    Ok(())
}
