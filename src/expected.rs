//! Expected results for path and network searches.
//!
//! Expectations are written in terms of [`RecordKey`]s, which are stable
//! across fixture loads, and translated to entity ids through the lookup
//! snapshot only at validation time.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{OracleError, OracleResult};
use crate::record::{normalize_data_source, RecordKey};

/// What a single path search is expected to return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedPathSpec {
    pub start: RecordKey,
    pub end: RecordKey,
    pub max_degrees: u32,
    pub avoid: BTreeSet<RecordKey>,
    pub avoidance_strict: bool,
    pub required_sources: BTreeSet<String>,
    /// Number of entities on the path; 0 means no path.
    pub expected_length: usize,
    /// Exact path as records, start first. Empty when only the length is known.
    pub expected_path: Vec<RecordKey>,
}

impl ExpectedPathSpec {
    /// Starts a builder for a path between `start` and `end`.
    #[must_use]
    pub fn builder(start: RecordKey, end: RecordKey) -> ExpectedPathBuilder {
        ExpectedPathBuilder::new(start, end)
    }

    /// True when no path at all is expected.
    #[must_use]
    pub const fn expects_no_path(&self) -> bool {
        self.expected_length == 0
    }
}

/// Builder for [`ExpectedPathSpec`].
///
/// # Example
/// ```
/// use er_oracle::{ExpectedPathSpec, RecordKey};
///
/// let spec = ExpectedPathSpec::builder(
///         RecordKey::new("PASSENGER", "ABC123"),
///         RecordKey::new("EMPLOYEE", "DEF890"),
///     )
///     .max_degrees(2)
///     .path([
///         RecordKey::new("PASSENGER", "ABC123"),
///         RecordKey::new("VIP", "MNO345"),
///         RecordKey::new("EMPLOYEE", "DEF890"),
///     ])
///     .build()
///     .unwrap();
/// assert_eq!(spec.expected_length, 3);
/// ```
#[derive(Debug, Clone)]
pub struct ExpectedPathBuilder {
    start: RecordKey,
    end: RecordKey,
    max_degrees: u32,
    avoid: BTreeSet<RecordKey>,
    avoidance_strict: bool,
    required_sources: BTreeSet<String>,
    expected_length: Option<usize>,
    expected_path: Vec<RecordKey>,
}

impl ExpectedPathBuilder {
    fn new(start: RecordKey, end: RecordKey) -> Self {
        Self {
            start,
            end,
            max_degrees: 1,
            avoid: BTreeSet::new(),
            avoidance_strict: false,
            required_sources: BTreeSet::new(),
            expected_length: None,
            expected_path: Vec::new(),
        }
    }

    /// Maximum degrees of separation searched (default 1).
    #[must_use]
    pub fn max_degrees(mut self, degrees: u32) -> Self {
        self.max_degrees = degrees;
        self
    }

    /// Adds an entity (named by one of its records) to route around.
    #[must_use]
    pub fn avoid(mut self, key: RecordKey) -> Self {
        self.avoid.insert(key);
        self
    }

    /// Whether avoided entities are forbidden rather than merely undesirable.
    #[must_use]
    pub fn strict_avoidance(mut self, strict: bool) -> Self {
        self.avoidance_strict = strict;
        self
    }

    /// Adds a data source that some intermediate entity must carry.
    #[must_use]
    pub fn require_source(mut self, code: impl AsRef<str>) -> Self {
        self.required_sources
            .insert(normalize_data_source(code.as_ref()));
        self
    }

    /// Expects exactly this path; sets the expected length from it.
    #[must_use]
    pub fn path(mut self, keys: impl IntoIterator<Item = RecordKey>) -> Self {
        self.expected_path = keys.into_iter().collect();
        self.expected_length = Some(self.expected_path.len());
        self
    }

    /// Expects a path of `length` entities without pinning its order.
    #[must_use]
    pub fn length(mut self, length: usize) -> Self {
        self.expected_length = Some(length);
        self
    }

    /// Expects that no path is found.
    #[must_use]
    pub fn no_path(mut self) -> Self {
        self.expected_path.clear();
        self.expected_length = Some(0);
        self
    }

    /// Validates and builds the expectation.
    pub fn build(self) -> OracleResult<ExpectedPathSpec> {
        let expected_length = self.expected_length.ok_or_else(|| {
            OracleError::precondition("expected path needs a path, a length, or no_path()")
        })?;

        if !self.expected_path.is_empty() {
            if self.expected_path.first() != Some(&self.start)
                || self.expected_path.last() != Some(&self.end)
            {
                return Err(OracleError::precondition(format!(
                    "expected path must run from {} to {}",
                    self.start, self.end
                )));
            }
            if self.expected_path.len() < 2 {
                return Err(OracleError::precondition(
                    "an expected path has at least two entities",
                ));
            }
            if expected_length != self.expected_path.len() {
                return Err(OracleError::precondition(format!(
                    "expected length {expected_length} contradicts a path of {} entities",
                    self.expected_path.len()
                )));
            }
        }
        if expected_length == 1 {
            return Err(OracleError::precondition(
                "an expected path has zero or at least two entities",
            ));
        }

        Ok(ExpectedPathSpec {
            start: self.start,
            end: self.end,
            max_degrees: self.max_degrees,
            avoid: self.avoid,
            avoidance_strict: self.avoidance_strict,
            required_sources: self.required_sources,
            expected_length,
            expected_path: self.expected_path,
        })
    }
}

/// One expected pairwise entry of a network result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpectedPath {
    /// A concrete path, named by records in order.
    Connected(Vec<RecordKey>),
    /// The pair was requested but no path connects it.
    Disconnected { start: RecordKey, end: RecordKey },
}

impl ExpectedPath {
    /// Every record the entry names.
    #[must_use]
    pub fn records(&self) -> Vec<&RecordKey> {
        match self {
            Self::Connected(keys) => keys.iter().collect(),
            Self::Disconnected { start, end } => vec![start, end],
        }
    }

    /// The two endpoints.
    #[must_use]
    pub fn endpoints(&self) -> Option<(&RecordKey, &RecordKey)> {
        match self {
            Self::Connected(keys) => Some((keys.first()?, keys.last()?)),
            Self::Disconnected { start, end } => Some((start, end)),
        }
    }
}

/// What a network search is expected to return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedNetworkSpec {
    /// Entities (named by a record) the network was requested for.
    pub requested: Vec<RecordKey>,
    pub paths: Vec<ExpectedPath>,
    pub max_degrees: u32,
    pub build_out_degrees: u32,
    pub build_out_max_entities: usize,
    /// Entities that must show up among the build-out details.
    pub required_build_out: BTreeSet<RecordKey>,
}

impl ExpectedNetworkSpec {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> ExpectedNetworkBuilder {
        ExpectedNetworkBuilder::default()
    }

    /// Extra entities the result may carry beyond the required set.
    ///
    /// Zero when build-out is disabled.
    #[must_use]
    pub const fn build_out_allowance(&self) -> usize {
        if self.build_out_degrees == 0 {
            0
        } else {
            self.build_out_max_entities
        }
    }
}

/// Builder for [`ExpectedNetworkSpec`].
#[derive(Debug, Clone)]
pub struct ExpectedNetworkBuilder {
    requested: Vec<RecordKey>,
    paths: Vec<ExpectedPath>,
    max_degrees: u32,
    build_out_degrees: u32,
    build_out_max_entities: usize,
    required_build_out: BTreeSet<RecordKey>,
}

impl Default for ExpectedNetworkBuilder {
    fn default() -> Self {
        Self {
            requested: Vec::new(),
            paths: Vec::new(),
            max_degrees: 1,
            build_out_degrees: 0,
            build_out_max_entities: 0,
            required_build_out: BTreeSet::new(),
        }
    }
}

impl ExpectedNetworkBuilder {
    /// Adds a requested entity.
    #[must_use]
    pub fn request(mut self, key: RecordKey) -> Self {
        if !self.requested.contains(&key) {
            self.requested.push(key);
        }
        self
    }

    /// Maximum degrees between requested entities (default 1).
    #[must_use]
    pub fn max_degrees(mut self, degrees: u32) -> Self {
        self.max_degrees = degrees;
        self
    }

    /// Build-out degrees and the cap on extra entities.
    #[must_use]
    pub fn build_out(mut self, degrees: u32, max_entities: usize) -> Self {
        self.build_out_degrees = degrees;
        self.build_out_max_entities = max_entities;
        self
    }

    /// Expects this exact path between its first and last record.
    #[must_use]
    pub fn connected(mut self, keys: impl IntoIterator<Item = RecordKey>) -> Self {
        self.paths
            .push(ExpectedPath::Connected(keys.into_iter().collect()));
        self
    }

    /// Expects the pair to be reported with no connecting path.
    #[must_use]
    pub fn disconnected(mut self, start: RecordKey, end: RecordKey) -> Self {
        self.paths.push(ExpectedPath::Disconnected { start, end });
        self
    }

    /// Requires an entity to appear among the build-out details.
    #[must_use]
    pub fn require_build_out(mut self, key: RecordKey) -> Self {
        self.required_build_out.insert(key);
        self
    }

    /// Validates and builds the expectation.
    pub fn build(self) -> OracleResult<ExpectedNetworkSpec> {
        if self.requested.is_empty() {
            return Err(OracleError::precondition(
                "a network expectation needs at least one requested entity",
            ));
        }
        for path in &self.paths {
            if let ExpectedPath::Connected(keys) = path {
                if keys.len() < 2 {
                    return Err(OracleError::precondition(
                        "a connected network path has at least two entities",
                    ));
                }
            }
        }
        if !self.required_build_out.is_empty() && self.build_out_degrees == 0 {
            return Err(OracleError::precondition(
                "required build-out entities need build-out degrees > 0",
            ));
        }

        Ok(ExpectedNetworkSpec {
            requested: self.requested,
            paths: self.paths,
            max_degrees: self.max_degrees,
            build_out_degrees: self.build_out_degrees,
            build_out_max_entities: self.build_out_max_entities,
            required_build_out: self.required_build_out,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(ds: &str, id: &str) -> RecordKey {
        RecordKey::new(ds, id)
    }

    #[test]
    fn test_path_builder_requires_expectation() {
        let err = ExpectedPathSpec::builder(key("A", "1"), key("B", "2"))
            .build()
            .unwrap_err();
        assert!(err.is_harness());
    }

    #[test]
    fn test_path_builder_checks_endpoints() {
        let err = ExpectedPathSpec::builder(key("A", "1"), key("B", "2"))
            .path([key("B", "2"), key("A", "1")])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("must run from"));
    }

    #[test]
    fn test_path_builder_rejects_conflicting_length() {
        let err = ExpectedPathSpec::builder(key("A", "1"), key("B", "2"))
            .path([key("A", "1"), key("B", "2")])
            .length(4)
            .build()
            .unwrap_err();
        assert!(err.is_harness());
        assert!(err.to_string().contains("contradicts"));

        let spec = ExpectedPathSpec::builder(key("A", "1"), key("B", "2"))
            .path([key("A", "1"), key("B", "2")])
            .length(2)
            .build()
            .unwrap();
        assert_eq!(spec.expected_length, 2);
    }

    #[test]
    fn test_no_path_spec() {
        let spec = ExpectedPathSpec::builder(key("A", "1"), key("B", "2"))
            .max_degrees(1)
            .avoid(key("C", "3"))
            .strict_avoidance(true)
            .require_source(" vip ")
            .no_path()
            .build()
            .unwrap();
        assert!(spec.expects_no_path());
        assert!(spec.required_sources.contains("VIP"));
        assert!(spec.avoidance_strict);
    }

    #[test]
    fn test_length_one_rejected() {
        assert!(ExpectedPathSpec::builder(key("A", "1"), key("B", "2"))
            .length(1)
            .build()
            .is_err());
    }

    #[test]
    fn test_network_builder() {
        let spec = ExpectedNetworkSpec::builder()
            .request(key("A", "1"))
            .request(key("B", "2"))
            .request(key("A", "1"))
            .build_out(1, 1000)
            .disconnected(key("A", "1"), key("B", "2"))
            .build()
            .unwrap();
        assert_eq!(spec.requested.len(), 2);
        assert_eq!(spec.build_out_allowance(), 1000);
        assert_eq!(spec.paths[0].records().len(), 2);
    }

    #[test]
    fn test_network_allowance_zero_without_build_out() {
        let spec = ExpectedNetworkSpec::builder()
            .request(key("A", "1"))
            .build_out(0, 10)
            .build()
            .unwrap();
        assert_eq!(spec.build_out_allowance(), 0);
    }

    #[test]
    fn test_network_builder_rejects_short_path() {
        assert!(ExpectedNetworkSpec::builder()
            .request(key("A", "1"))
            .connected([key("A", "1")])
            .build()
            .is_err());
        assert!(ExpectedNetworkSpec::builder().build().is_err());
    }

    #[test]
    fn test_expected_path_endpoints() {
        let path = ExpectedPath::Connected(vec![key("A", "1"), key("C", "3"), key("B", "2")]);
        let (start, end) = path.endpoints().unwrap();
        assert_eq!(start, &key("A", "1"));
        assert_eq!(end, &key("B", "2"));
    }
}
