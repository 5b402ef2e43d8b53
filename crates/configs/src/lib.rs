//! # configs
//!
//! Typed settings for the lifecycle service. Sources are layered, later ones
//! winning:
//!
//! 1. built-in defaults
//! 2. `config/default.toml` (optional)
//! 3. `config/{APP_ENV}.toml` (optional)
//! 4. environment variables prefixed `LISTINGS__`, e.g.
//!    `LISTINGS__SERVER__PORT=8080` or `LISTINGS__STORAGE__DATABASE_URL=...`
//!
//! A `.env` file is read first when present.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use domains::MalformedCreatedAtPolicy;
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub log: LogSettings,
    pub storage: StorageSettings,
    pub lifecycle: LifecycleSettings,
    pub rate_limit: RateLimitSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ServerSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Fallback filter when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub database_url: Option<SecretString>,
    pub max_connections: u32,
    /// JSON fixture loaded into the in-memory backend at startup.
    pub fixture_path: Option<PathBuf>,
    pub rate_limit_backend: RateLimitBackend,
    pub redis_url: Option<SecretString>,
    pub redis_prefix: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            database_url: None,
            max_connections: 10,
            fixture_path: None,
            rate_limit_backend: RateLimitBackend::Memory,
            redis_url: None,
            redis_prefix: "ratelimit".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LifecycleSettings {
    pub malformed_created_at: MalformedCreatedAtPolicy,
    /// Page size a sweep reads active listing ids in; the sweep walks all pages.
    pub sweep_batch_limit: usize,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            malformed_created_at: MalformedCreatedAtPolicy::Flag,
            sweep_batch_limit: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RuleSettings {
    pub limit: u32,
    pub window_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub default: RuleSettings,
    /// Keyed by route path as registered in the router.
    pub endpoints: HashMap<String, RuleSettings>,
    pub cleanup_probability: f64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        let endpoints = HashMap::from([
            (
                "/api/v1/listings/{id}/evaluate".to_string(),
                RuleSettings { limit: 60, window_secs: 60 },
            ),
            (
                "/api/v1/lifecycle/sweep".to_string(),
                RuleSettings { limit: 5, window_secs: 60 },
            ),
            (
                "/api/v1/messages/ids".to_string(),
                RuleSettings { limit: 30, window_secs: 60 },
            ),
        ]);
        Self {
            enabled: true,
            default: RuleSettings {
                limit: 100,
                window_secs: 60,
            },
            endpoints,
            cleanup_probability: 0.01,
        }
    }
}

impl Settings {
    /// Reads `.env`, then layers files under `./config` and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), ".env loaded");
        }
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        Self::load_from(Path::new("config"), &env)
    }

    pub fn load_from(dir: &Path, env: &str) -> Result<Self, ConfigError> {
        let default_file = dir.join("default");
        let env_file = dir.join(env);
        let settings: Settings = Config::builder()
            .add_source(File::with_name(&default_file.to_string_lossy()).required(false))
            .add_source(File::with_name(&env_file.to_string_lossy()).required(false))
            .add_source(
                Environment::with_prefix("LISTINGS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parses settings from a TOML document only.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.backend == StorageBackend::Postgres && self.storage.database_url.is_none() {
            return Err(ConfigError::Invalid(
                "storage.database_url is required for the postgres backend".to_string(),
            ));
        }
        if self.storage.rate_limit_backend == RateLimitBackend::Redis
            && self.storage.redis_url.is_none()
        {
            return Err(ConfigError::Invalid(
                "storage.redis_url is required for the redis rate-limit backend".to_string(),
            ));
        }
        if self.lifecycle.sweep_batch_limit == 0 {
            return Err(ConfigError::Invalid(
                "lifecycle.sweep_batch_limit must be positive".to_string(),
            ));
        }

        let limits = &self.rate_limit;
        if !(0.0..=1.0).contains(&limits.cleanup_probability) {
            return Err(ConfigError::Invalid(format!(
                "rate_limit.cleanup_probability must be within [0, 1], got {}",
                limits.cleanup_probability
            )));
        }
        let endpoint_rules = limits
            .endpoints
            .iter()
            .map(|(name, rule)| (name.as_str(), rule));
        for (name, rule) in std::iter::once(("default", &limits.default)).chain(endpoint_rules) {
            if rule.limit == 0 || rule.window_secs == 0 {
                return Err(ConfigError::Invalid(format!(
                    "rate limit rule {name} needs a positive limit and window"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.server.address(), "127.0.0.1:8080");
        assert_eq!(settings.storage.backend, StorageBackend::Memory);
        assert_eq!(settings.lifecycle.malformed_created_at, MalformedCreatedAtPolicy::Flag);
    }

    #[test]
    fn test_toml_overrides() {
        let settings = Settings::from_toml(
            r#"
            [server]
            port = 9090

            [storage]
            backend = "postgres"
            database_url = "postgres://u:p@localhost/listings"

            [lifecycle]
            malformed_created_at = "substitute_now"

            [rate_limit]
            cleanup_probability = 0.5
            [rate_limit.default]
            limit = 5
            window_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(
            settings.storage.database_url.unwrap().expose_secret(),
            "postgres://u:p@localhost/listings"
        );
        assert_eq!(
            settings.lifecycle.malformed_created_at,
            MalformedCreatedAtPolicy::SubstituteNow
        );
        assert_eq!(settings.rate_limit.default.limit, 5);
    }

    #[test]
    fn test_postgres_requires_url() {
        let err = Settings::from_toml("[storage]\nbackend = \"postgres\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_out_of_range_probability() {
        let err = Settings::from_toml("[rate_limit]\ncleanup_probability = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_zero_window() {
        let err = Settings::from_toml(
            "[rate_limit.endpoints.\"/x\"]\nlimit = 5\nwindow_secs = 0\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
