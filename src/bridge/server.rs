//! Acceptor: binds the local IRC listener and spawns one engine per
//! accepted connection.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use super::engine;
use crate::cluster::registry::ServerRegistry;
use crate::cluster::router::Router;
use crate::cluster::session::SessionClient;

/// A bound bridge, ready to accept IRC clients.
pub struct Bridge {
    listener: TcpListener,
    client: SessionClient,
    registry: Arc<ServerRegistry>,
}

impl Bridge {
    /// Bind the listen address. Binding first means port conflicts fail
    /// fast at startup.
    pub async fn bind(
        listen: &str,
        registry: Arc<ServerRegistry>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let router = Router::new(Arc::clone(&registry))?;
        let client = SessionClient::new(router);
        let listener = TcpListener::bind(listen).await?;
        info!("robustirc bridge listening on {listen}");
        Ok(Self {
            listener,
            client,
            registry,
        })
    }

    /// The locally bound address.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever. Accept errors are logged and the loop
    /// continues.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        loop {
            let (socket, addr) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("could not accept IRC client connection: {e}");
                    continue;
                }
            };
            info!(%addr, "new client connection");
            let client = self.client.clone();
            let registry = Arc::clone(&self.registry);
            tokio::spawn(async move {
                engine::handle_client(socket, addr, client, registry).await;
                info!(%addr, "disconnected");
            });
        }
    }
}
