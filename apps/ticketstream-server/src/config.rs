//! Server configuration loaded from the environment.

use std::env;
use std::net::SocketAddr;

/// Top-level server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Redis connection URL for tracking and the ticket cache.
    pub redis_url: String,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub rust_log: String,
}

impl ServerConfig {
    /// Load from environment variables, failing fast on unparseable
    /// values.
    ///
    /// - `HOST` (default `0.0.0.0`)
    /// - `PORT` (default `8080`)
    /// - `REDIS_URL` (default `redis://127.0.0.1:6379`)
    /// - `RUST_LOG` (default `info`)
    pub fn from_env() -> Result<Self, String> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|e| format!("Invalid PORT '{raw}': {e}"))?,
            Err(_) => 8080,
        };
        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            host,
            port,
            redis_url,
            rust_log,
        })
    }

    /// Socket address to bind.
    pub fn bind_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| format!("Invalid bind address: {e}"))
    }
}
