//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every section has defaults, so a missing file or a partial file is
//! fine. Secrets (the JWT signing key) are referenced by env-var name in
//! the config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use tracing::warn;

use crate::rates::exchangerate_api::DEFAULT_BASE_URL;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub rates: RatesConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".into(), port: 3001 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path.
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "kantor.db".into() }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RatesConfig {
    /// Endpoint prefix; the base currency code is appended.
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_BASE_URL.into(), timeout_secs: 10 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    /// Name of the env var holding the JWT signing secret.
    pub jwt_secret_env: String,
    pub token_ttl_secs: u64,
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret_env: "KANTOR_JWT_SECRET".into(),
            token_ttl_secs: 86_400,
            bcrypt_cost: 10,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            warn!(path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse()
            .with_context(|| format!("Invalid listen address: {addr}"))
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// The JWT secret from the configured env var.
    ///
    /// When unset, a random per-process secret is generated: tokens then
    /// stop working after a restart.
    pub fn jwt_secret(&self) -> SecretString {
        match Self::resolve_env(&self.auth.jwt_secret_env) {
            Ok(secret) if !secret.is_empty() => SecretString::new(secret),
            _ => {
                warn!(
                    env = %self.auth.jwt_secret_env,
                    "JWT secret not set, generating an ephemeral one"
                );
                SecretString::new(uuid::Uuid::new_v4().to_string())
            }
        }
    }
}
