//! Command-line flag surface.

use clap::Parser;

/// Bridges IRC clients (RFC 1459) onto a RobustIRC cluster.
///
/// Bridge instances are supposed to be long-running, and ideally as close
/// to the IRC client as possible, e.g. on the same machine. Network problems
/// between the bridge and the cluster are handled transparently.
#[derive(Parser, Debug)]
#[command(name = "robustirc-bridge", version)]
pub struct Config {
    /// Comma-separated list of host:port addresses of the RobustIRC
    /// server(s) to connect to.
    #[arg(
        long,
        default_value = "localhost:8001",
        value_delimiter = ',',
        value_name = "HOST:PORT"
    )]
    pub servers: Vec<String>,

    /// host:port to listen on for IRC client connections.
    #[arg(long, default_value = "localhost:6667", value_name = "HOST:PORT")]
    pub listen: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("need at least one server address in --servers")]
    NoServers,
}

impl Config {
    /// The configured server list, trimmed, with empty entries removed.
    pub fn server_list(&self) -> Result<Vec<String>, ConfigError> {
        let servers: Vec<String> = self
            .servers
            .iter()
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
        if servers.is_empty() {
            return Err(ConfigError::NoServers);
        }
        Ok(servers)
    }
}
