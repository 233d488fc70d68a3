//! Configuration management for the orders service
//!
//! Loads configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

use crate::notifier::{DEFAULT_SUBJECT, DEFAULT_TEMPLATE};

/// Where persisted state lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Redis,
    /// Process-local; for development and tests
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(StorageBackend::Redis),
            "memory" => Ok(StorageBackend::Memory),
            other => anyhow::bail!("Unknown storage backend: {}", other),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis connection URL
    pub redis_url: String,

    pub storage_backend: StorageBackend,

    /// API server host
    pub api_host: String,

    /// API server port
    pub api_port: u16,

    /// Whether members may order right now
    pub orders_enabled: bool,

    /// Idle lifetime of a session cart
    pub cart_ttl_secs: u64,

    pub confirmation_subject: String,
    pub confirmation_template: String,

    /// Mail relay for confirmations; unset means log only
    pub mail_relay_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            storage_backend: StorageBackend::Redis,
            api_host: "0.0.0.0".to_string(),
            api_port: 8090,
            orders_enabled: true,
            cart_ttl_secs: 60 * 60 * 24 * 14,
            confirmation_subject: DEFAULT_SUBJECT.to_string(),
            confirmation_template: DEFAULT_TEMPLATE.to_string(),
            mail_relay_url: None,
        }
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("Invalid {}: {}", name, other),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let config = Config {
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),

            storage_backend: match env::var("STORAGE_BACKEND") {
                Ok(value) => value.parse().context("Invalid STORAGE_BACKEND")?,
                Err(_) => defaults.storage_backend,
            },

            api_host: env::var("API_HOST").unwrap_or(defaults.api_host),

            api_port: match env::var("API_PORT") {
                Ok(value) => value.parse().context("Invalid API_PORT")?,
                Err(_) => defaults.api_port,
            },

            orders_enabled: match env::var("ORDERS_ENABLED") {
                Ok(value) => parse_flag("ORDERS_ENABLED", &value)?,
                Err(_) => defaults.orders_enabled,
            },

            cart_ttl_secs: match env::var("CART_TTL_SECS") {
                Ok(value) => value.parse().context("Invalid CART_TTL_SECS")?,
                Err(_) => defaults.cart_ttl_secs,
            },

            confirmation_subject: env::var("ORDER_CONFIRMATION_SUBJECT")
                .unwrap_or(defaults.confirmation_subject),

            confirmation_template: env::var("ORDER_CONFIRMATION_TEMPLATE")
                .unwrap_or(defaults.confirmation_template),

            mail_relay_url: env::var("MAIL_RELAY_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.api_port == 0 {
            anyhow::bail!("API_PORT must be greater than 0");
        }

        if self.cart_ttl_secs == 0 {
            anyhow::bail!("CART_TTL_SECS must be greater than 0");
        }

        if !self.confirmation_template.contains("{order_number}") {
            anyhow::bail!("ORDER_CONFIRMATION_TEMPLATE must contain {{order_number}}");
        }

        Ok(())
    }

    /// Get the API server address
    pub fn api_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}
