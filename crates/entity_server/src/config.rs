//! Server configuration read from the environment.

use std::net::SocketAddr;

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 5001;
pub const DEFAULT_BULK_CONCURRENCY: usize = 16;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has an invalid value '{value}'")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `None` runs on the in-memory stores.
    pub database_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub internal_access_token: Option<String>,
    pub bulk_concurrency: usize,
    pub db_max_connections: u32,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("ENTITY_JWT_SECRET").ok_or(ConfigError::Missing("ENTITY_JWT_SECRET"))?;
        let bind_addr = parse_or(
            "ENTITY_BIND_ADDR",
            get("ENTITY_BIND_ADDR"),
            SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
        )?;
        let bulk_concurrency = parse_or(
            "ENTITY_BULK_CONCURRENCY",
            get("ENTITY_BULK_CONCURRENCY"),
            DEFAULT_BULK_CONCURRENCY,
        )?;
        if bulk_concurrency == 0 {
            return Err(ConfigError::Invalid {
                var: "ENTITY_BULK_CONCURRENCY",
                value: "0".into(),
            });
        }
        let db_max_connections = parse_or(
            "ENTITY_DB_MAX_CONNECTIONS",
            get("ENTITY_DB_MAX_CONNECTIONS"),
            DEFAULT_DB_MAX_CONNECTIONS,
        )?;

        Ok(Self {
            database_url: get("ENTITY_DATABASE_URL"),
            bind_addr,
            jwt_secret,
            internal_access_token: get("INTERNAL_ACCESS_TOKEN"),
            bulk_concurrency,
            db_max_connections,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    var: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}
