//! Error types for er-oracle.
//!
//! Two families live here. [`SdkError`] is what the resolution engine raises;
//! the oracle only ever asserts on it. [`OracleError`] is what the oracle
//! itself reports: harness bugs, unparseable results, and validation
//! mismatches.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::RecordKey;
use crate::validate::ValidationFailure;

/// Failures raised by the resolution engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SdkError {
    #[error("Unknown data source: {code}")]
    UnknownDataSource {
        code: String,
    },

    #[error("Not found: {what}")]
    NotFound {
        what: String,
    },

    #[error("Bad input: {reason}")]
    BadInput {
        reason: String,
    },

    #[error("Default configuration replace conflict: expected {expected}, current {current}")]
    ReplaceConflict {
        expected: i64,
        current: i64,
    },

    #[error("Environment has been destroyed")]
    EnvironmentDestroyed,
}

impl SdkError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Creates a bad-input error.
    #[must_use]
    pub fn bad_input(reason: impl Into<String>) -> Self {
        Self::BadInput {
            reason: reason.into(),
        }
    }

    /// The documented kind of this failure.
    #[must_use]
    pub const fn kind(&self) -> SdkErrorKind {
        match self {
            Self::UnknownDataSource { .. } => SdkErrorKind::UnknownDataSource,
            Self::NotFound { .. } => SdkErrorKind::NotFound,
            Self::BadInput { .. } => SdkErrorKind::BadInput,
            Self::ReplaceConflict { .. } => SdkErrorKind::ReplaceConflict,
            Self::EnvironmentDestroyed => SdkErrorKind::EnvironmentDestroyed,
        }
    }
}

/// Kind of an engine failure, used by expectations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SdkErrorKind {
    /// Data source code not registered in the active configuration.
    UnknownDataSource,
    /// Unknown record or entity identifier.
    NotFound,
    /// Malformed attributes, invalid export column, invalid search profile.
    BadInput,
    /// Optimistic-concurrency violation on default-configuration swap.
    ReplaceConflict,
    /// Use after teardown.
    EnvironmentDestroyed,
}

impl fmt::Display for SdkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownDataSource => write!(f, "unknown_data_source"),
            Self::NotFound => write!(f, "not_found"),
            Self::BadInput => write!(f, "bad_input"),
            Self::ReplaceConflict => write!(f, "replace_conflict"),
            Self::EnvironmentDestroyed => write!(f, "environment_destroyed"),
        }
    }
}

/// Top-level error type for er-oracle.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("SDK error: {0}")]
    Sdk(#[from] SdkError),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationFailure),

    #[error("Failed to parse {operation} result: {message}")]
    ResponseParse {
        operation: &'static str,
        message: String,
    },

    #[error("Record {key} is not part of the fixture lookup")]
    UnknownRecord {
        key: RecordKey,
    },

    #[error("Precondition violated: {message}")]
    Precondition {
        message: String,
    },

    #[error("Expected {expected} failure but the call succeeded")]
    UnexpectedSuccess {
        expected: SdkErrorKind,
    },

    #[error("Expected {expected} but the call failed with {actual}")]
    UnexpectedFailure {
        expected: String,
        actual: SdkError,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OracleError {
    /// Creates a precondition error.
    #[must_use]
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    /// Returns true if this error is a validation mismatch.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this error came straight from the engine.
    #[must_use]
    pub const fn is_sdk(&self) -> bool {
        matches!(self, Self::Sdk(_))
    }

    /// Returns true if this error points at a bug in the harness itself
    /// rather than at the engine's behavior.
    #[must_use]
    pub const fn is_harness(&self) -> bool {
        matches!(
            self,
            Self::UnknownRecord { .. } | Self::Precondition { .. } | Self::Config(_) | Self::Io(_)
        )
    }
}

/// Result type alias for oracle operations.
pub type OracleResult<T> = Result<T, OracleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sdk_error_kinds() {
        assert_eq!(
            SdkError::UnknownDataSource {
                code: "X".to_string()
            }
            .kind(),
            SdkErrorKind::UnknownDataSource
        );
        assert_eq!(SdkError::not_found("1").kind(), SdkErrorKind::NotFound);
        assert_eq!(SdkError::bad_input("x").kind(), SdkErrorKind::BadInput);
        assert_eq!(
            SdkError::ReplaceConflict {
                expected: 1,
                current: 2
            }
            .kind(),
            SdkErrorKind::ReplaceConflict
        );
        assert_eq!(
            SdkError::EnvironmentDestroyed.kind(),
            SdkErrorKind::EnvironmentDestroyed
        );
    }

    #[test]
    fn test_sdk_error_display() {
        let err = SdkError::ReplaceConflict {
            expected: 10,
            current: 11,
        };
        let msg = err.to_string();
        assert!(msg.contains("10"));
        assert!(msg.contains("11"));
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&SdkErrorKind::NotFound).unwrap();
        assert_eq!(json, "\"not_found\"");
        assert_eq!(SdkErrorKind::BadInput.to_string(), "bad_input");
    }

    #[test]
    fn test_oracle_error_from_sdk() {
        let err: OracleError = SdkError::EnvironmentDestroyed.into();
        assert!(err.is_sdk());
        assert!(!err.is_harness());
    }

    #[test]
    fn test_oracle_error_harness_kinds() {
        let err = OracleError::UnknownRecord {
            key: RecordKey::new("VIP", "9"),
        };
        assert!(err.is_harness());
        assert!(err.to_string().contains("VIP:9"));
        assert!(OracleError::precondition("empty").is_harness());
    }

    #[test]
    fn test_unexpected_success_display() {
        let err = OracleError::UnexpectedSuccess {
            expected: SdkErrorKind::NotFound,
        };
        assert!(err.to_string().contains("not_found"));
    }
}
