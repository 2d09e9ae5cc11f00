//! Server configuration.
//!
//! Configuration is loaded from environment variables with fallback to
//! defaults suitable for local development.

use std::env;
use std::path::PathBuf;

use serde::Serialize;

use brewpos_core::{TaxRate, DEFAULT_TAX_RATE_BPS};

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,

    /// Path to the SQLite database file
    pub database_path: PathBuf,

    /// JWT secret key for signing tokens
    pub jwt_secret: String,

    /// JWT token lifetime in seconds
    pub jwt_lifetime_secs: i64,

    /// Sales tax rate in basis points (1000 = 10%)
    pub tax_rate_bps: u32,

    /// Public base URL encoded into receipt QR codes
    pub public_base_url: String,

    /// Directory for stored files (QR PNGs, product images)
    pub storage_dir: PathBuf,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config = ServerConfig {
            http_port: env::var("BREWPOS_HTTP_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("BREWPOS_HTTP_PORT".to_string()))?,

            database_path: env::var("BREWPOS_DATABASE_PATH")
                .unwrap_or_else(|_| "brewpos.db".to_string())
                .into(),

            jwt_secret: env::var("BREWPOS_JWT_SECRET").unwrap_or_else(|_| {
                // In production this MUST be set via environment variable
                "brewpos-dev-secret-change-in-production".to_string()
            }),

            jwt_lifetime_secs: env::var("BREWPOS_JWT_LIFETIME_SECS")
                .unwrap_or_else(|_| "28800".to_string()) // 8 hours, one shift
                .parse()
                .map_err(|_| ConfigError::InvalidValue("BREWPOS_JWT_LIFETIME_SECS".to_string()))?,

            tax_rate_bps: env::var("BREWPOS_TAX_RATE_BPS")
                .unwrap_or_else(|_| DEFAULT_TAX_RATE_BPS.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("BREWPOS_TAX_RATE_BPS".to_string()))?,

            public_base_url: env::var("BREWPOS_PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),

            storage_dir: env::var("BREWPOS_STORAGE_DIR")
                .unwrap_or_else(|_| "storage".to_string())
                .into(),
        };

        Ok(config)
    }

    /// The configured tax rate as a typed value.
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        // Runs without any BREWPOS_* vars set in CI
        let config = ServerConfig::load().unwrap();
        assert!(config.http_port > 0);
        assert!(!config.jwt_secret.is_empty());
        assert!(!config.public_base_url.ends_with('/'));
        assert_eq!(config.tax_rate().bps(), config.tax_rate_bps);
    }
}
