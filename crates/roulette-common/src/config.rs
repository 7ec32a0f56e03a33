//! Service configuration loaded from environment variables and config files.
//!
//! Supports `.env` files for development and environment variables for
//! production. Precedence: env vars > `.env` file > `config.toml` > defaults.

use serde::Deserialize;

use crate::error::Result;

/// Top-level configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Interface the server binds. Defaults to all interfaces.
    pub bind_address: String,
    /// TCP port the server listens on.
    pub port: u16,
    /// The single origin permitted for CORS and WebSocket upgrades.
    pub allowed_origin: String,
}

impl AppConfig {
    /// Load configuration from the environment.
    ///
    /// Env vars use the `ROULETTE` prefix with `__` separators, e.g.
    /// `ROULETTE_SERVER__PORT=9000`.
    pub fn load() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenvy::dotenv();

        let cfg = config::Config::builder()
            .set_default("server.bind_address", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.allowed_origin", "http://localhost:3000")?
            // Optional config file
            .add_source(config::File::with_name("config").required(false))
            // Environment variables (ROULETTE_SERVER__PORT, etc.)
            .add_source(
                config::Environment::with_prefix("ROULETTE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(cfg.try_deserialize()?)
    }
}
