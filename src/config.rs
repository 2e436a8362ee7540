//! Endpoint configuration from environment variables.

use std::env;

pub const DEFAULT_HOST: &str = "localhost:8000";
pub const WS_PATH: &str = "/ws/bid";

#[derive(Debug, Clone)]
pub struct Config {
    /// Full WebSocket endpoint URL.
    pub endpoint: String,
}

impl Config {
    /// Resolve the endpoint once at startup.
    ///
    /// Environment variables:
    /// - `PADDLE_WS_URL`: explicit endpoint override, used verbatim
    /// - `PADDLE_HOST`: `host[:port]` to derive the endpoint from (default: `localhost:8000`)
    /// - `PADDLE_TLS`: `1` or `true` upgrades the scheme to `wss`
    pub fn from_env() -> Self {
        if let Ok(endpoint) = env::var("PADDLE_WS_URL") {
            return Self { endpoint };
        }

        let host = env::var("PADDLE_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let tls = env::var("PADDLE_TLS")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let scheme = if tls { "wss" } else { "ws" };

        Self {
            endpoint: format!("{scheme}://{host}{WS_PATH}"),
        }
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}
