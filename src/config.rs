//! Oracle configuration.
//!
//! Defaults suit an interactive test run. `OracleConfig::from_env` lets CI
//! override them without code changes.

use std::env;
use std::time::Duration;

use thiserror::Error;

/// Enables fail-fast (`1`, `true`, `yes`, `on` / `0`, `false`, `no`, `off`).
pub const FAIL_FAST_ENV: &str = "ER_ORACLE_FAIL_FAST";

/// Grace delay in milliseconds before a fail-fast run stops.
pub const FAIL_FAST_GRACE_ENV: &str = "ER_ORACLE_FAIL_FAST_GRACE_MS";

/// Configuration and flag-table errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable `{name}` contained invalid UTF-8")]
    InvalidUnicode {
        name: &'static str,
    },

    #[error("invalid value `{value}` for `{name}`: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to parse {source_name}: {message}")]
    Parse {
        source_name: &'static str,
        message: String,
    },

    #[error("flag name `{name}` must match SZ_[A-Z0-9_]+")]
    InvalidFlagName {
        name: String,
    },

    #[error("flag `{name}` registered twice")]
    DuplicateFlag {
        name: String,
    },

    #[error("flag `{name}` is not registered")]
    UnknownFlag {
        name: String,
    },
}

/// Driver configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleConfig {
    /// Stop the run after the first failing case.
    pub fail_fast: bool,
    /// How long a fail-fast run waits before stopping, so in-flight log
    /// output and diagnostics can be flushed.
    pub fail_fast_grace: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            fail_fast: false,
            fail_fast_grace: Duration::from_millis(250),
        }
    }
}

impl OracleConfig {
    /// Defaults overridden by `ER_ORACLE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name))
    }

    /// Same as [`Self::from_env`] but reading from an arbitrary source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Result<String, env::VarError>,
    {
        let mut config = Self::default();
        if let Some(raw) = read_var(&lookup, FAIL_FAST_ENV)? {
            config.fail_fast = parse_bool(FAIL_FAST_ENV, &raw)?;
        }
        if let Some(raw) = read_var(&lookup, FAIL_FAST_GRACE_ENV)? {
            let millis = raw
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidValue {
                    name: FAIL_FAST_GRACE_ENV,
                    value: raw.clone(),
                    reason: e.to_string(),
                })?;
            config.fail_fast_grace = Duration::from_millis(millis);
        }
        Ok(config)
    }

    /// Enables fail-fast with the given grace delay.
    #[must_use]
    pub const fn with_fail_fast(mut self, grace: Duration) -> Self {
        self.fail_fast = true;
        self.fail_fast_grace = grace;
        self
    }
}

fn read_var<F>(lookup: &F, name: &'static str) -> Result<Option<String>, ConfigError>
where
    F: Fn(&'static str) -> Result<String, env::VarError>,
{
    match lookup(name) {
        Ok(raw) => Ok(Some(raw)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidUnicode { name }),
    }
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            name,
            value: other.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
