//! Service configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). The deployment scope picks the backend
//! and pool defaults; individual `DB_*` keys override them.

use std::net::SocketAddr;
use std::str::FromStr;

use crate::persistence::{
    Backend, BackendSelection, DeploymentScope, PoolConfig, StoreError, select,
};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::InvalidValue {
                key: "LOG_FORMAT",
                value: s.to_string(),
            }),
        }
    }
}

/// Configuration errors detected at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable is set to a value that cannot be used.
    #[error("invalid value for {key}: `{value}`")]
    InvalidValue {
        /// Environment variable name.
        key: &'static str,
        /// Offending value.
        value: String,
    },

    /// `DATABASE_URL` points at a backend the scope does not use.
    #[error("DATABASE_URL targets {url_backend}, but scope `{scope}` requires {scope_backend}")]
    BackendMismatch {
        /// Configured scope.
        scope: DeploymentScope,
        /// Backend the scope selects.
        scope_backend: Backend,
        /// Backend named by the URL.
        url_backend: Backend,
    },

    /// Storage configuration rejected by the persistence layer.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Top-level service configuration.
///
/// Loaded once at startup via [`AppConfig::from_env`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,
    /// Deployment scope driving backend selection.
    pub scope: DeploymentScope,
    /// Effective pool configuration (scope defaults plus overrides).
    pub pool: PoolConfig,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Log output format.
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// Falls back to scope defaults when a variable is not set. Numeric and
    /// boolean overrides that fail to parse keep their default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for an unknown
    /// `DEPLOYMENT_SCOPE` or `LOG_FORMAT` or an unparsable `LISTEN_ADDR`,
    /// [`ConfigError::BackendMismatch`] when `DATABASE_URL` names a
    /// different backend than the scope, and [`ConfigError::Store`] for
    /// invalid pool sizing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let scope = match lookup("DEPLOYMENT_SCOPE") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "DEPLOYMENT_SCOPE",
                value: raw,
            })?,
            None => DeploymentScope::default(),
        };

        let defaults = select(scope).pool;
        let backend_url = lookup("DATABASE_URL").unwrap_or(defaults.backend_url);
        let url_backend = Backend::from_url(&backend_url)?;
        if url_backend != scope.backend() {
            return Err(ConfigError::BackendMismatch {
                scope,
                scope_backend: scope.backend(),
                url_backend,
            });
        }

        let pool = PoolConfig {
            max_persistent: parse_or(&lookup, "DB_MAX_PERSISTENT", defaults.max_persistent),
            max_overflow: parse_or(&lookup, "DB_MAX_OVERFLOW", defaults.max_overflow),
            recycle_seconds: parse_or(&lookup, "DB_RECYCLE_SECONDS", defaults.recycle_seconds),
            pre_ping: parse_bool_or(&lookup, "DB_PRE_PING", defaults.pre_ping),
            backend_url,
            acquire_timeout_secs: parse_or(
                &lookup,
                "DB_ACQUIRE_TIMEOUT_SECS",
                defaults.acquire_timeout_secs,
            ),
            idle_timeout_secs: parse_or(
                &lookup,
                "DB_IDLE_TIMEOUT_SECS",
                defaults.idle_timeout_secs,
            ),
            echo_queries: parse_bool_or(&lookup, "DB_ECHO_QUERIES", defaults.echo_queries),
        };
        pool.validate()?;

        let raw_addr = lookup("LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let listen_addr = raw_addr.parse().map_err(|_| ConfigError::InvalidValue {
            key: "LISTEN_ADDR",
            value: raw_addr.clone(),
        })?;

        let log_format = match lookup("LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => LogFormat::default(),
        };

        Ok(Self {
            listen_addr,
            scope,
            pool,
            request_timeout_secs: parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30),
            log_format,
        })
    }

    /// Backend selection for the configured scope with the effective pool
    /// settings applied.
    #[must_use]
    pub fn selection(&self) -> BackendSelection {
        BackendSelection {
            pool: self.pool.clone(),
            ..select(self.scope)
        }
    }
}

/// Parses `key` as `T`, returning `default` on missing or invalid values.
fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parses `key` as a boolean. Accepts `"true"`, `"1"`, `"false"`, `"0"`
/// (case-insensitive). Returns `default` otherwise.
fn parse_bool_or<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}
