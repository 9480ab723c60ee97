use std::net::SocketAddr;

use crate::cli::ServeArgs;

/// Process-wide settings, fixed for the lifetime of the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub key: String,
}

impl From<ServeArgs> for ServerConfig {
    fn from(args: ServeArgs) -> Self {
        Self {
            listen: SocketAddr::new(args.host, args.port),
            key: args.key,
        }
    }
}
