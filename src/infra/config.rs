//! For reading application configuration.

use config::{builder::DefaultState, ConfigBuilder};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_ADDRESS: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT_STR: &str = "10s";
const DEFAULT_CONCURRENCY_LIMIT: usize = 500;
const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug,greeting_service=debug";

/// Application configuration.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    /// Server address.
    pub address: String,
    /// Server http port.
    pub port: u16,
    /// How long a request may take before it is aborted.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Maximum number of requests handled at once.
    pub concurrency_limit: usize,
    /// Whether to serve the OpenAPI document.
    pub expose_openapi: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            expose_openapi: false,
        }
    }
}

impl ServerConfig {
    /// The socket address to bind to, accepted by anything taking [`ToSocketAddrs`](std::net::ToSocketAddrs).
    pub fn bind_address(&self) -> (&str, u16) {
        (self.address.as_str(), self.port)
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct LoggingConfig {
    /// Filter directives, used when `RUST_LOG` is not set.
    pub filter: String,
    /// Directory for JSON log files. Nothing is written to disk if unset.
    #[serde(default)]
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            directory: None,
        }
    }
}

/// Retrieve [`Config`] from defaults, an optional `config` file, and `APP__` environment variables.
#[tracing::instrument]
pub fn load_config() -> Result<Config, config::ConfigError> {
    let config = with_defaults()?
        .add_source(config::File::with_name("config").required(false))
        .add_source(environment())
        .build()?
        .try_deserialize()?;
    Ok(config)
}

/// A builder holding the default value of every setting.
fn with_defaults() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    config::Config::builder()
        .set_default("server.address", DEFAULT_ADDRESS)?
        .set_default("server.port", i64::from(DEFAULT_PORT))?
        .set_default("server.request_timeout", DEFAULT_REQUEST_TIMEOUT_STR)?
        .set_default("server.concurrency_limit", DEFAULT_CONCURRENCY_LIMIT as u64)?
        .set_default("server.expose_openapi", false)?
        .set_default("logging.filter", DEFAULT_LOG_FILTER)
}

/// Environment variables such as `APP__SERVER__PORT`.
fn environment() -> config::Environment {
    config::Environment::with_prefix("app").separator("__")
}
