//! Per-process entry point: answers the request in the CGI environment, then exits.
//!
//! Logs go to stderr; stdout carries the response.

use std::sync::Arc;
use switchyard::cgi;
use switchyard::demo::{self, DemoOptions, MemoryStore};
use switchyard::logging::{LogConfig, LogFormat, LogLevel, LogOutput};
use switchyard_config::ServerSettings;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let file = std::env::var_os("SWITCHYARD_CONFIG").map(std::path::PathBuf::from);
    let settings = ServerSettings::load(file.as_deref())?;

    let _guard = LogConfig::new()
        .level(LogLevel::from_str(&settings.log_level).unwrap_or(LogLevel::Warn))
        .format(LogFormat::Compact)
        .output(LogOutput::Stderr)
        .with_colors(false)
        .init()?;

    let mut options = DemoOptions {
        max_body_bytes: settings.max_body_bytes,
        ..DemoOptions::default()
    };
    if !settings.api_keys.is_empty() {
        options.api_keys = settings.api_keys.clone();
    }

    let dispatcher = demo::build_server(
        settings.dispatch.clone(),
        options,
        Arc::new(MemoryStore::new()),
    )?;
    let status = cgi::run_once(&dispatcher).await?;
    tracing::debug!(status, "Done");
    Ok(())
}
