//! Layered configuration: in-code defaults, then `config/{environment}.toml`,
//! then `AWP_`-prefixed environment variables (double underscore separates
//! nesting, e.g. `AWP_DATABASE__URL`).

use config::{ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// "development" or "production"
    pub environment: String,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub orders: OrdersConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL (required, no default)
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrdersConfig {
    /// Prefix for generated order numbers, e.g. "PO" -> "PO-2026-0001"
    pub number_prefix: String,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("AWP_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        config::Config::builder()
            .set_default("environment", environment.as_str())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("orders.number_prefix", "PO")?
            .add_source(File::with_name(&format!("config/{environment}")).required(false))
            .add_source(
                Environment::with_prefix("AWP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
