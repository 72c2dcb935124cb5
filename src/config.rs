//! Process configuration
//!
//! Resolves the control-plane endpoint and signing identity. Values come
//! from the environment first (`SDC_URL`, `SDC_ACCOUNT`, `SDC_KEY_ID`,
//! `SDC_KEY_PATH`), then from an optional `credentials.json` in the working
//! directory, matching the lookup order the CLI flags override.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Default bound for nested resolver fan-out (per-machine re-fetches,
/// per-network lookups).
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default TTL for the GET response cache, in milliseconds.
pub const DEFAULT_CACHE_TTL_MS: u64 = 9_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration value: {0} (set the environment variable or credentials.json)")]
    Missing(&'static str),
    #[error("failed to read credentials file: {0}")]
    CredentialsFile(#[from] std::io::Error),
}

/// Resolved process configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Control-plane base URL, e.g. `https://cloudapi.example.com`
    pub api_base_url: String,
    /// Account login the service signs requests for
    pub account: String,
    /// Name of the signing key registered under the account
    pub key_id: String,
    /// Path to the RSA private key PEM
    pub key_path: PathBuf,
    /// Bound for nested resolver fan-out
    pub concurrency: usize,
    /// GET response cache TTL in milliseconds
    pub cache_ttl_ms: u64,
}

/// Shape of the optional `credentials.json` fallback file
#[derive(Debug, Clone, Default, Deserialize)]
struct FileCredentials {
    #[serde(default, alias = "SDC_URL")]
    url: Option<String>,
    #[serde(default, alias = "SDC_ACCOUNT")]
    account: Option<String>,
    #[serde(default, alias = "SDC_KEY_ID", alias = "keyId")]
    key_id: Option<String>,
    #[serde(default, alias = "SDC_KEY_PATH", alias = "keyPath")]
    key_path: Option<String>,
}

impl Config {
    /// Load configuration from the environment, falling back to
    /// `credentials.json` when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env: HashMap<String, String> = std::env::vars().collect();
        let file = Self::load_credentials_file();
        Self::from_parts(&env, file)
    }

    /// Resolve configuration from explicit sources. Environment wins over
    /// the credentials file for every field.
    fn from_parts(
        env: &HashMap<String, String>,
        file: FileCredentials,
    ) -> Result<Self, ConfigError> {
        let pick = |var: &str, fallback: &Option<String>| {
            env.get(var)
                .cloned()
                .filter(|v| !v.is_empty())
                .or_else(|| fallback.clone())
        };

        let api_base_url =
            pick("SDC_URL", &file.url).ok_or(ConfigError::Missing("SDC_URL"))?;
        let account =
            pick("SDC_ACCOUNT", &file.account).ok_or(ConfigError::Missing("SDC_ACCOUNT"))?;
        let key_id =
            pick("SDC_KEY_ID", &file.key_id).ok_or(ConfigError::Missing("SDC_KEY_ID"))?;
        let key_path =
            pick("SDC_KEY_PATH", &file.key_path).ok_or(ConfigError::Missing("SDC_KEY_PATH"))?;

        let concurrency = env
            .get("SDC_CONCURRENCY")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_CONCURRENCY);

        let cache_ttl_ms = env
            .get("SDC_CACHE_TTL_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_CACHE_TTL_MS);

        Ok(Self {
            api_base_url,
            account,
            key_id,
            key_path: PathBuf::from(key_path),
            concurrency,
            cache_ttl_ms,
        })
    }

    fn load_credentials_file() -> FileCredentials {
        match std::fs::read_to_string("credentials.json") {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => FileCredentials::default(),
        }
    }
}
