//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8083)
//! - `DATABASE_URL` - `PostgreSQL` connection string; the in-memory store is used when unset
//! - `NATS_URL` - NATS server for domain events (optional)
//! - `STORAGE_DIR` - Root directory for uploaded files (default: ./uploads)
//! - `STORAGE_BUCKET` - Bucket name (default: images)
//! - `PUBLIC_BASE_URL` - Base URL for public file links (default: `http://localhost:{PORT}`)
//! - `SESSION_TTL_HOURS` - Session lifetime (default: 24)
//! - `LOW_STOCK_THRESHOLD` - Dashboard low-stock cut-off (default: 10)

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use chrono::Duration;
use secrecy::SecretString;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    /// Contains credentials.
    pub database_url: Option<SecretString>,
    pub nats_url: Option<String>,
    pub storage_dir: PathBuf,
    pub storage_bucket: String,
    pub public_base_url: String,
    pub session_ttl: Duration,
    pub low_stock_threshold: u32,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("nats_url", &self.nats_url)
            .field("storage_dir", &self.storage_dir)
            .field("storage_bucket", &self.storage_bucket)
            .field("public_base_url", &self.public_base_url)
            .field("session_ttl", &self.session_ttl)
            .field("low_stock_threshold", &self.low_stock_threshold)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: 8083,
            database_url: None,
            nats_url: None,
            storage_dir: PathBuf::from("./uploads"),
            storage_bucket: "images".into(),
            public_base_url: "http://localhost:8083".into(),
            session_ttl: Duration::hours(24),
            low_stock_threshold: 10,
        }
    }
}

impl Config {
    /// Load from the process environment, reading `.env` first if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let port = parse_or(&lookup, "PORT", defaults.port)?;
        let ttl_hours: i64 = parse_or(&lookup, "SESSION_TTL_HOURS", 24)?;
        if ttl_hours <= 0 {
            return Err(ConfigError::InvalidEnvVar("SESSION_TTL_HOURS".into(), "must be positive".into()));
        }

        Ok(Self {
            host: parse_or(&lookup, "HOST", defaults.host)?,
            port,
            database_url: non_empty(&lookup, "DATABASE_URL").map(SecretString::from),
            nats_url: non_empty(&lookup, "NATS_URL"),
            storage_dir: non_empty(&lookup, "STORAGE_DIR").map_or(defaults.storage_dir, PathBuf::from),
            storage_bucket: non_empty(&lookup, "STORAGE_BUCKET").unwrap_or(defaults.storage_bucket),
            public_base_url: non_empty(&lookup, "PUBLIC_BASE_URL").unwrap_or_else(|| format!("http://localhost:{port}")),
            session_ttl: Duration::hours(ttl_hours),
            low_stock_threshold: parse_or(&lookup, "LOW_STOCK_THRESHOLD", defaults.low_stock_threshold)?,
        })
    }

    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr { SocketAddr::new(self.host, self.port) }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(lookup, key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 8083);
        assert!(config.database_url.is_none());
        assert_eq!(config.public_base_url, "http://localhost:8083");
        assert_eq!(config.low_stock_threshold, 10);
    }

    #[test]
    fn test_overrides_and_redaction() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "9000"),
            ("DATABASE_URL", "postgres://shop:hunter2@db/shop"),
            ("LOW_STOCK_THRESHOLD", "3"),
        ]))
        .unwrap();
        assert_eq!(config.public_base_url, "http://localhost:9000");
        assert_eq!(config.low_stock_threshold, 3);
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(Config::from_lookup(lookup(&[("PORT", "eighty")])), Err(ConfigError::InvalidEnvVar(k, _)) if k == "PORT"));
        assert!(Config::from_lookup(lookup(&[("SESSION_TTL_HOURS", "0")])).is_err());
    }
}
