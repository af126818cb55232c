//! Path and network result validation.
//!
//! Validators are pure functions of `(lookup, actual JSON, flags, expected)`:
//! running one twice on the same inputs yields the same outcome. Every check
//! runs even after an earlier one failed, so a single report shows all
//! mismatches together with the expected and actual values.

mod network;
mod path;

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::record::EntityId;

pub use network::{check_network, validate_network};
pub use path::{check_path, validate_path};

/// The individual rule a mismatch violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    /// Path present/absent and of the expected length.
    Presence,
    /// Path starts and ends at the requested entities.
    Endpoints,
    /// Path visits exactly the expected entities in order.
    Order,
    /// Strictly avoided entities do not appear.
    Avoidance,
    /// Some intermediate entity carries a required data source.
    RequiredSources,
    /// Relationship metadata present iff matching info was requested.
    MatchingInfo,
    /// Entity details match the path entities exactly.
    DetailCompleteness,
    /// An expected pairwise network path matches.
    NetworkPath,
    /// The network contains a pair nobody asked about.
    UnexpectedPath,
    /// The network reports the same pair more than once.
    DuplicatePath,
    /// Entity detail count is within the build-out bounds.
    EntityCount,
    /// Every required entity has a detail.
    RequiredCoverage,
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Presence => "presence",
            Self::Endpoints => "endpoints",
            Self::Order => "order",
            Self::Avoidance => "avoidance",
            Self::RequiredSources => "required_sources",
            Self::MatchingInfo => "matching_info",
            Self::DetailCompleteness => "detail_completeness",
            Self::NetworkPath => "network_path",
            Self::UnexpectedPath => "unexpected_path",
            Self::DuplicatePath => "duplicate_path",
            Self::EntityCount => "entity_count",
            Self::RequiredCoverage => "required_coverage",
        };
        f.write_str(name)
    }
}

/// One violated rule with its expected and actual values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub check: Check,
    pub expected: String,
    pub actual: String,
}

impl Mismatch {
    pub(crate) fn new(check: Check, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            check,
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] expected {}, actual {}",
            self.check, self.expected, self.actual
        )
    }
}

/// All mismatches found for one result, with the case context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{context}: {}", render_mismatches(.mismatches))]
pub struct ValidationFailure {
    pub context: String,
    pub mismatches: Vec<Mismatch>,
}

impl ValidationFailure {
    /// True if any mismatch violated `check`.
    #[must_use]
    pub fn violates(&self, check: Check) -> bool {
        self.mismatches.iter().any(|m| m.check == check)
    }
}

fn render_mismatches(mismatches: &[Mismatch]) -> String {
    mismatches
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Turns collected mismatches into a result.
pub(crate) fn finish(context: String, mismatches: Vec<Mismatch>) -> Result<(), ValidationFailure> {
    if mismatches.is_empty() {
        Ok(())
    } else {
        Err(ValidationFailure {
            context,
            mismatches,
        })
    }
}

pub(crate) fn render_chain(chain: &[EntityId]) -> String {
    let ids: Vec<String> = chain.iter().map(ToString::to_string).collect();
    format!("[{}]", ids.join(", "))
}

pub(crate) fn render_set(ids: &BTreeSet<EntityId>) -> String {
    let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
    format!("{{{}}}", ids.join(", "))
}
