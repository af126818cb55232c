//! Test cases: one operation, one flag set, one expectation.

use std::fmt;

use serde::Serialize;

use crate::error::SdkErrorKind;
use crate::expected::{ExpectedNetworkSpec, ExpectedPathSpec};
use crate::flags::FlagSet;
use crate::record::{EntityId, EntityRef, RecordKey};
use crate::sdk::{FindNetworkRequest, FindPathRequest};

/// The SDK call a case makes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Operation {
    FindPath(FindPathRequest),
    FindNetwork(FindNetworkRequest),
    GetEntity { entity: EntityRef },
    GetRecord { record: RecordKey },
    Search { attributes: String },
    WhyEntities { first: EntityId, second: EntityId },
    HowEntity { entity: EntityId },
    /// Opens an export, fetches it to exhaustion and closes it.
    Export,
    AddRecord { record: RecordKey, json: String },
    DeleteRecord { record: RecordKey },
    /// Swaps the default configuration, reading the current id first unless
    /// `current` is given.
    ReplaceDefaultConfig { current: Option<i64>, replacement: i64 },
}

impl Operation {
    /// Short operation name for logs and reports.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::FindPath(_) => "find-path",
            Self::FindNetwork(_) => "find-network",
            Self::GetEntity { .. } => "get-entity",
            Self::GetRecord { .. } => "get-record",
            Self::Search { .. } => "search",
            Self::WhyEntities { .. } => "why-entities",
            Self::HowEntity { .. } => "how-entity",
            Self::Export => "export",
            Self::AddRecord { .. } => "add-record",
            Self::DeleteRecord { .. } => "delete-record",
            Self::ReplaceDefaultConfig { .. } => "replace-default-config",
        }
    }
}

/// What the case expects back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    /// A find-path result matching the expected path.
    Path(ExpectedPathSpec),
    /// A find-network result matching the expected network.
    Network(ExpectedNetworkSpec),
    /// Any successful result.
    Success,
    /// A failure of exactly this kind.
    Failure(SdkErrorKind),
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(spec) if spec.expects_no_path() => write!(f, "no path"),
            Self::Path(spec) => write!(f, "path of {} entities", spec.expected_length),
            Self::Network(spec) => write!(f, "network of {} paths", spec.paths.len()),
            Self::Success => write!(f, "success"),
            Self::Failure(kind) => write!(f, "{kind} failure"),
        }
    }
}

/// One generated test case, consumed once by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub description: String,
    pub operation: Operation,
    pub flags: FlagSet,
    pub expectation: Expectation,
}

impl TestCase {
    /// Creates a case.
    #[must_use]
    pub fn new(
        description: impl Into<String>,
        operation: Operation,
        flags: FlagSet,
        expectation: Expectation,
    ) -> Self {
        Self {
            description: description.into(),
            operation,
            flags,
            expectation,
        }
    }

    /// Stable content hash identifying this case across runs.
    ///
    /// Covers the description, the operation with its inputs, the flag
    /// names and the expectation.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.description.as_bytes());
        hasher.update(&[0]);
        match serde_json::to_vec(&self.operation) {
            Ok(bytes) => hasher.update(&bytes),
            Err(_) => hasher.update(self.operation.name().as_bytes()),
        };
        hasher.update(&[0]);
        for name in self.flags.names() {
            hasher.update(name.as_bytes());
            hasher.update(b"|");
        }
        hasher.update(&[0]);
        hasher.update(self.expectation.to_string().as_bytes());
        let hex = hasher.finalize().to_hex();
        hex.as_str()[..16].to_string()
    }
}
