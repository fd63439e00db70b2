//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use dine_tab::db::DatabaseConfig;
use dine_tab::tab::RetryPolicy;
use std::net::SocketAddr;
use std::str::FromStr;

/// Default HTTP bind address
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Which tab store to run against
    pub store: StoreBackend,
    /// Database configuration (used by the Postgres store)
    pub database: DatabaseConfig,
    /// Optimistic transaction retry budget
    pub retry: RetryPolicy,
    /// Security configuration
    pub security: SecurityConfig,
    /// Prometheus scrape address; metrics are off when unset
    pub metrics_bind: Option<SocketAddr>,
}

/// Tab store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// Process-local store; state is lost on restart
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreBackend::Postgres),
            "memory" | "mem" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::Invalid {
                var: "STORE_BACKEND".to_string(),
                reason: format!("Unknown store '{other}', expected 'postgres' or 'memory'"),
            }),
        }
    }
}

/// Security-related configuration
#[derive(Clone)]
pub struct SecurityConfig {
    /// Shared secret the payment provider signs confirmations with (required)
    pub payment_callback_secret: String,
    /// Key for administrative endpoints (required)
    pub admin_api_key: String,
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("payment_callback_secret", &"<redacted>")
            .field("admin_api_key", &"<redacted>")
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    /// * `store_override` - Optional store backend override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
        store_override: Option<StoreBackend>,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(addr) => addr,
            None => parse_addr("SERVER_BIND", DEFAULT_BIND)?,
        };

        let store = match store_override {
            Some(store) => store,
            None => std::env::var("STORE_BACKEND")
                .ok()
                .map(|v| v.parse::<StoreBackend>())
                .transpose()?
                .unwrap_or(StoreBackend::Postgres),
        };

        let mut database = DatabaseConfig::from_env();
        if let Some(url) = database_url_override {
            database.database_url = url;
        }

        let retry = RetryPolicy::from_env();

        // Security configuration (REQUIRED)
        let payment_callback_secret =
            std::env::var("PAYMENT_CALLBACK_SECRET").map_err(|_| ConfigError::MissingRequired {
                var: "PAYMENT_CALLBACK_SECRET".to_string(),
                hint: "Shared with the payment provider; generate with: openssl rand -hex 32"
                    .to_string(),
            })?;

        let admin_api_key =
            std::env::var("ADMIN_API_KEY").map_err(|_| ConfigError::MissingRequired {
                var: "ADMIN_API_KEY".to_string(),
                hint: "Generate with: openssl rand -hex 24".to_string(),
            })?;

        let metrics_bind = match std::env::var("METRICS_BIND") {
            Ok(v) if !v.trim().is_empty() => {
                Some(v.trim().parse().map_err(|_| ConfigError::Invalid {
                    var: "METRICS_BIND".to_string(),
                    reason: format!("'{v}' is not a socket address"),
                })?)
            }
            _ => None,
        };

        Ok(ServerConfig {
            bind,
            store,
            database,
            retry,
            security: SecurityConfig {
                payment_callback_secret,
                admin_api_key,
            },
            metrics_bind,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.payment_callback_secret.len() < 32 {
            return Err(ConfigError::Invalid {
                var: "PAYMENT_CALLBACK_SECRET".to_string(),
                reason: "Must be at least 32 characters".to_string(),
            });
        }

        if self.security.admin_api_key.len() < 16 {
            return Err(ConfigError::Invalid {
                var: "ADMIN_API_KEY".to_string(),
                reason: "Must be at least 16 characters".to_string(),
            });
        }

        if self.store == StoreBackend::Postgres {
            if self.database.database_url.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    var: "DATABASE_URL".to_string(),
                    reason: "Required for the postgres store".to_string(),
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
        }

        if self.metrics_bind == Some(self.bind) {
            return Err(ConfigError::Invalid {
                var: "METRICS_BIND".to_string(),
                reason: format!("Must differ from the server address ({})", self.bind),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse a socket address variable with default fallback
fn parse_addr(key: &str, default: &str) -> Result<SocketAddr, ConfigError> {
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse().map_err(|_| ConfigError::Invalid {
        var: key.to_string(),
        reason: format!("'{raw}' is not a socket address"),
    })
}
