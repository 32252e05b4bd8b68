//! Server configuration.

use mirror_store::MAX_SEARCH_LIMIT;
use std::net::SocketAddr;

/// Configuration for the HTTP panel.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Rows returned by a resource listing when no `limit` is given.
    pub default_search_limit: usize,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            default_search_limit: 20,
        }
    }

    /// Sets the default listing size, clamped to the store's maximum.
    pub fn with_default_search_limit(mut self, limit: usize) -> Self {
        self.default_search_limit = limit.clamp(1, MAX_SEARCH_LIMIT);
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 8080)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.default_search_limit, 20);
    }

    #[test]
    fn config_builder() {
        let config = ServerConfig::new("0.0.0.0:9000".parse().unwrap())
            .with_default_search_limit(5000);
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.default_search_limit, MAX_SEARCH_LIMIT);
    }
}
