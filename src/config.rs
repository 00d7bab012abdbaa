//! Configuration loaded from the environment

use std::path::PathBuf;
use std::time::Duration;

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for environment variable {0}")]
    Invalid(&'static str),
}

/// Razorpay credentials
#[derive(Debug, Clone)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub webhook_secret: String,
    pub base_url: String,
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    /// Supabase project JWT secret (HS256)
    pub jwt_secret: String,
    pub razorpay: RazorpayConfig,
    /// Where the seat cache snapshot lives, if persisted
    pub seat_cache_path: Option<PathBuf>,
    pub request_timeout: Duration,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parsed_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = required("DATABASE_URL")?;
        let database_max_connections = parsed_or("DATABASE_MAX_CONNECTIONS", 10u32)?;

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = parsed_or("PORT", 8080u16)?;

        let jwt_secret = required("SUPABASE_JWT_SECRET")?;

        let razorpay = RazorpayConfig {
            key_id: required("RAZORPAY_KEY_ID")?,
            key_secret: required("RAZORPAY_KEY_SECRET")?,
            webhook_secret: required("RAZORPAY_WEBHOOK_SECRET")?,
            base_url: std::env::var("RAZORPAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.razorpay.com/v1".to_string()),
        };

        let seat_cache_path = std::env::var("SEAT_CACHE_PATH").ok().map(PathBuf::from);
        let request_timeout = Duration::from_secs(parsed_or("REQUEST_TIMEOUT_SECS", 30u64)?);

        Ok(Self {
            host,
            port,
            database_url,
            database_max_connections,
            jwt_secret,
            razorpay,
            seat_cache_path,
            request_timeout,
        })
    }
}
