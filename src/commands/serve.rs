//! Serve command handler

use anyhow::Result;
use cognify::{run_server, Config};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "cognify=info,tower_http=info";

pub async fn run_serve(port: Option<u16>) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    if !Config::exists() {
        tracing::info!("no config file found, using defaults and environment");
    }

    let mut config = Config::load_effective()?;
    if let Some(port) = port {
        config.server.port = port;
    }

    run_server(config).await
}
