//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use simple_bank::db::DatabaseConfig;
use simple_bank::db::config::parse_env_or;
use simple_bank::ledger::TransferConfig;
use std::net::SocketAddr;
use std::time::Duration;

/// Bind address used when neither `--bind` nor `SERVER_BIND` is given
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Transfer engine configuration
    pub transfer: TransferConfig,
    /// Prometheus exporter address; metrics are not exported when unset
    pub metrics_bind: Option<SocketAddr>,
    /// Apply schema migrations on startup
    pub run_migrations: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    /// * `migrate_override` - Force migrations on (from CLI args)
    ///
    /// # Returns
    ///
    /// * `Result<ServerConfig, ConfigError>` - Loaded configuration or error
    ///
    /// # Errors
    ///
    /// Returns error if an address variable is set but does not parse
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
        migrate_override: bool,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(addr) => addr,
            None => parse_addr("SERVER_BIND")?.unwrap_or(default_bind()),
        };

        let mut database = DatabaseConfig::from_env();
        if let Some(url) = database_url_override {
            database.database_url = url;
        }

        let metrics_bind = parse_addr("METRICS_BIND")?;
        let run_migrations = migrate_override || parse_env_or("RUN_MIGRATIONS", false);

        Ok(ServerConfig {
            bind,
            database,
            transfer: TransferConfig::from_env(),
            metrics_bind,
            run_migrations,
        })
    }

    /// Validate configuration after loading
    ///
    /// # Returns
    ///
    /// * `Result<(), ConfigError>` - Success or validation error
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.database_url.is_empty() {
            return Err(ConfigError::Invalid {
                var: "DATABASE_URL".to_string(),
                reason: "Must not be empty".to_string(),
            });
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid {
                var: "DB_MAX_CONNECTIONS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!(
                    "Cannot exceed max connections ({})",
                    self.database.max_connections
                ),
            });
        }

        if self.transfer.transfer_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "TRANSFER_TIMEOUT_MS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self
            .transfer
            .lock_timeout
            .is_some_and(|lock_timeout| lock_timeout >= self.transfer.transfer_timeout)
        {
            return Err(ConfigError::Invalid {
                var: "LOCK_TIMEOUT_MS".to_string(),
                reason: format!(
                    "Must be shorter than the transfer timeout ({}ms)",
                    self.transfer.transfer_timeout.as_millis()
                ),
            });
        }

        if self.metrics_bind == Some(self.bind) {
            return Err(ConfigError::Invalid {
                var: "METRICS_BIND".to_string(),
                reason: format!("Must differ from the server address ({})", self.bind),
            });
        }

        Ok(())
    }

    /// Lock wait bound handed to the store
    pub fn lock_timeout(&self) -> Option<Duration> {
        self.transfer.lock_timeout
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid address in {var}: {value}")]
    InvalidAddress { var: String, value: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Parse an optional socket address from the environment
fn parse_addr(var: &str) -> Result<Option<SocketAddr>, ConfigError> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidAddress {
                var: var.to_string(),
                value,
            }),
        _ => Ok(None),
    }
}
