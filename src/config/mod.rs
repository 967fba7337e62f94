// Configuration module entry point
// Loads layered configuration and holds the shared runtime state

mod state;
mod types;

use std::net::SocketAddr;
use std::time::Duration;

use crate::http::{ParserOptions, TrailingLine};

// Re-export public types
pub use state::AppState;
pub use types::{
    Config, HealthConfig, HttpConfig, LoggingConfig, PerformanceConfig, RoutesConfig,
    ServerConfig,
};

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("SERVER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.backlog", 128)?
            .set_default("server.reuse_port", true)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.show_headers", false)?
            .set_default("performance.connection_timeout", 30)?
            .set_default("http.server_name", "mini-http/0.1")?
            .set_default("http.max_body_size", 1_048_576)? // 1MiB
            .set_default("http.strict_line_termination", false)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("config")
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

impl HttpConfig {
    /// Parser settings derived from this section
    pub const fn parser_options(&self) -> ParserOptions {
        ParserOptions {
            max_body_size: self.max_body_size,
            trailing_line: if self.strict_line_termination {
                TrailingLine::Reject
            } else {
                TrailingLine::Accept
            },
        }
    }
}

impl PerformanceConfig {
    /// Per-connection deadline; `None` when disabled with 0
    pub const fn connection_deadline(&self) -> Option<Duration> {
        if self.connection_timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(self.connection_timeout))
        }
    }
}
