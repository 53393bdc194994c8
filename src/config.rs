//! Process configuration from environment variables (a `.env` file is honoured).

use crate::error::ConfigError;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub ip: String,
    pub port: u16,
    /// Prefix for resource routes, e.g. `/api/v1`. Empty mounts at the root.
    pub api_prefix: String,
    pub database_url: String,
    /// Postgres schema holding the document table.
    pub db_schema: String,
    pub db_max_connections: u32,
    pub request_timeout: Duration,
    pub body_limit: usize,
    /// Allowed CORS origins; empty mirrors the request origin.
    pub cors_origins: Vec<String>,
    pub hash_passwords: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            ip: "0.0.0.0".into(),
            port: 3000,
            api_prefix: String::new(),
            database_url: "postgres://localhost/quill".into(),
            db_schema: "quill".into(),
            db_max_connections: 5,
            request_timeout: Duration::from_millis(10_000),
            body_limit: 1024 * 1024,
            cors_origins: Vec::new(),
            hash_passwords: true,
        }
    }
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = AppConfig::default();
        Ok(AppConfig {
            ip: lookup("APP_IP").unwrap_or(d.ip),
            port: parse(&lookup, "APP_PORT", d.port)?,
            api_prefix: lookup("API_PREFIX").map(normalize_prefix).unwrap_or(d.api_prefix),
            database_url: lookup("DATABASE_URL").unwrap_or(d.database_url),
            db_schema: lookup("QUILL_SCHEMA").unwrap_or(d.db_schema),
            db_max_connections: parse(&lookup, "DB_MAX_CONNECTIONS", d.db_max_connections)?,
            request_timeout: Duration::from_millis(parse(
                &lookup,
                "REQUEST_TIMEOUT_MS",
                d.request_timeout.as_millis() as u64,
            )?),
            body_limit: parse(&lookup, "BODY_LIMIT_BYTES", d.body_limit)?,
            cors_origins: lookup("CORS_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(str::trim)
                        .filter(|o| !o.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or(d.cors_origins),
            hash_passwords: parse(&lookup, "HASH_PASSWORDS", d.hash_passwords)?,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

fn parse<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

/// "api/v1/" -> "/api/v1"; "/" and "" -> "".
fn normalize_prefix(raw: String) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}
