use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use robustirc_bridge::bridge::server::Bridge;
use robustirc_bridge::cluster::registry::ServerRegistry;
use robustirc_bridge::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    let servers = config.server_list()?;
    info!(servers = ?servers, listen = %config.listen, "starting robustirc bridge");

    let registry = Arc::new(ServerRegistry::new(servers));
    Bridge::bind(&config.listen, registry).await?.run().await
}
