//! Sequential case execution and the run report.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::OracleConfig;
use crate::driver::case::{Expectation, Operation, TestCase};
use crate::error::{OracleError, OracleResult, SdkError};
use crate::export::ExportGuard;
use crate::lookup::RecordEntityLookup;
use crate::record::RecordKey;
use crate::sdk::{FixtureLoader, ResolutionSdk};
use crate::validate::{validate_network, validate_path};

/// A JSON-Lines fixture file for one data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureFile {
    pub data_source: String,
    pub path: PathBuf,
    pub encoding: String,
}

impl FixtureFile {
    /// A UTF-8 fixture file.
    #[must_use]
    pub fn utf8(data_source: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            data_source: data_source.into(),
            path: path.into(),
            encoding: "UTF-8".to_string(),
        }
    }
}

/// Why a case failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// The result did not match the expectation.
    Validation,
    /// The call failed, or succeeded, contrary to the expectation.
    Outcome,
    /// The harness itself is wrong (unknown record, bad scenario, I/O).
    Harness,
    /// The result could not be parsed.
    Parse,
}

impl FailureCategory {
    fn of(error: &OracleError) -> Self {
        match error {
            OracleError::Validation(_) => Self::Validation,
            OracleError::ResponseParse { .. } => Self::Parse,
            OracleError::Sdk(_)
            | OracleError::UnexpectedSuccess { .. }
            | OracleError::UnexpectedFailure { .. } => Self::Outcome,
            _ => Self::Harness,
        }
    }
}

/// Outcome of one case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    Failed {
        category: FailureCategory,
        message: String,
    },
    /// Not run because an earlier case failed under fail-fast.
    Skipped,
}

impl Verdict {
    fn from_result(result: &OracleResult<()>) -> Self {
        match result {
            Ok(()) => Self::Passed,
            Err(e) => Self::Failed {
                category: FailureCategory::of(e),
                message: e.to_string(),
            },
        }
    }
}

/// Report line for one case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseReport {
    pub description: String,
    pub operation: &'static str,
    pub fingerprint: String,
    pub verdict: Verdict,
    pub elapsed_micros: u64,
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cases: Vec<CaseReport>,
}

impl RunReport {
    /// Number of passed cases.
    #[must_use]
    pub fn passed(&self) -> usize {
        self.count(|v| matches!(v, Verdict::Passed))
    }

    /// Number of failed cases.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|v| matches!(v, Verdict::Failed { .. }))
    }

    /// Number of skipped cases.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|v| matches!(v, Verdict::Skipped))
    }

    /// True when every case passed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.cases.iter().all(|c| c.verdict == Verdict::Passed)
    }

    /// Failed cases only.
    pub fn failures(&self) -> impl Iterator<Item = &CaseReport> {
        self.cases
            .iter()
            .filter(|c| matches!(c.verdict, Verdict::Failed { .. }))
    }

    /// Pretty JSON rendering.
    ///
    /// # Errors
    ///
    /// Propagates serialization failures.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    fn count(&self, pred: impl Fn(&Verdict) -> bool) -> usize {
        self.cases.iter().filter(|c| pred(&c.verdict)).count()
    }
}

/// Drives cases against an engine and a fixture loader.
///
/// Cases share the engine's mutable repository, so they run one at a time
/// in the order given.
#[derive(Debug)]
pub struct OracleDriver<'a, S: ResolutionSdk + FixtureLoader + ?Sized> {
    sdk: &'a S,
    config: OracleConfig,
    loaded: BTreeMap<RecordKey, String>,
    lookup: RecordEntityLookup,
}

impl<'a, S: ResolutionSdk + FixtureLoader + ?Sized> OracleDriver<'a, S> {
    /// Creates a driver with an empty lookup.
    #[must_use]
    pub fn new(sdk: &'a S, config: OracleConfig) -> Self {
        Self {
            sdk,
            config,
            loaded: BTreeMap::new(),
            lookup: RecordEntityLookup::default(),
        }
    }

    /// The engine under test.
    #[must_use]
    pub const fn sdk(&self) -> &'a S {
        self.sdk
    }

    /// The current lookup snapshot.
    #[must_use]
    pub const fn lookup(&self) -> &RecordEntityLookup {
        &self.lookup
    }

    /// JSON of every loaded fixture record.
    #[must_use]
    pub const fn loaded_records(&self) -> &BTreeMap<RecordKey, String> {
        &self.loaded
    }

    /// Configures data sources, loads every file, drains redo and snapshots
    /// the lookup over everything loaded.
    ///
    /// # Errors
    ///
    /// Propagates engine failures.
    #[tracing::instrument(skip(self, files), fields(files = files.len()))]
    pub fn load_fixture(&mut self, data_sources: &[&str], files: &[FixtureFile]) -> OracleResult<()> {
        self.sdk.configure_data_sources(data_sources)?;
        for file in files {
            let records = self
                .sdk
                .load_records(&file.data_source, &file.path, &file.encoding)?;
            self.loaded.extend(records);
        }
        let redone = self.sdk.drain_redo()?;
        self.refresh_lookup()?;
        tracing::info!(
            records = self.lookup.record_count(),
            entities = self.lookup.entity_count(),
            redone,
            "fixture loaded"
        );
        Ok(())
    }

    /// Re-snapshots the lookup over all loaded records.
    ///
    /// # Errors
    ///
    /// Propagates engine failures, including a loaded record that has since
    /// been deleted.
    pub fn refresh_lookup(&mut self) -> OracleResult<()> {
        let keys: Vec<RecordKey> = self.loaded.keys().cloned().collect();
        self.lookup = self.sdk.entity_lookup(&keys)?;
        Ok(())
    }

    /// Runs one case against the current lookup.
    ///
    /// # Errors
    ///
    /// Returns the validation, outcome or harness error that failed the case.
    pub fn run_case(&self, case: &TestCase) -> OracleResult<()> {
        let outcome = self.invoke(case);
        match (&case.expectation, outcome) {
            (Expectation::Failure(kind), Err(actual)) if actual.kind() == *kind => Ok(()),
            (Expectation::Failure(kind), Err(actual)) => Err(OracleError::UnexpectedFailure {
                expected: kind.to_string(),
                actual,
            }),
            (Expectation::Failure(kind), Ok(_)) => {
                Err(OracleError::UnexpectedSuccess { expected: *kind })
            }
            (_, Err(actual)) => Err(OracleError::UnexpectedFailure {
                expected: "success".to_string(),
                actual,
            }),
            (Expectation::Success, Ok(_)) => Ok(()),
            (Expectation::Path(spec), Ok(json)) => {
                if !matches!(case.operation, Operation::FindPath(_)) {
                    return Err(mismatched_expectation(case));
                }
                validate_path(&self.lookup, &json, &case.flags, spec)
            }
            (Expectation::Network(spec), Ok(json)) => {
                if !matches!(case.operation, Operation::FindNetwork(_)) {
                    return Err(mismatched_expectation(case));
                }
                validate_network(&self.lookup, &json, &case.flags, spec)
            }
        }
    }

    /// Calls the engine for `case`, returning its textual result.
    fn invoke(&self, case: &TestCase) -> Result<String, SdkError> {
        let sdk = self.sdk;
        let flags = &case.flags;
        match &case.operation {
            Operation::FindPath(request) => sdk.find_path(request, flags),
            Operation::FindNetwork(request) => sdk.find_network(request, flags),
            Operation::GetEntity { entity } => sdk.get_entity(entity, flags),
            Operation::GetRecord { record } => sdk.get_record(record, flags),
            Operation::Search { attributes } => sdk.search_by_attributes(attributes, flags),
            Operation::WhyEntities { first, second } => sdk.why_entities(*first, *second, flags),
            Operation::HowEntity { entity } => sdk.how_entity(*entity, flags),
            Operation::Export => {
                let guard = ExportGuard::open(sdk, flags)?;
                let lines = guard.fetch_all()?;
                guard.close()?;
                Ok(lines.join("\n"))
            }
            Operation::AddRecord { record, json } => {
                sdk.add_record(record, json).map(|()| String::new())
            }
            Operation::DeleteRecord { record } => sdk.delete_record(record).map(|()| String::new()),
            Operation::ReplaceDefaultConfig {
                current,
                replacement,
            } => {
                let current = match current {
                    Some(id) => *id,
                    None => sdk.default_config_id()?,
                };
                sdk.replace_default_config_id(current, *replacement)
                    .map(|()| String::new())
            }
        }
    }

    /// Runs every case in order and reports the outcome of each.
    ///
    /// With fail-fast enabled the first failure stops the run after the
    /// configured grace delay; the remaining cases are reported as skipped.
    pub fn run(&self, cases: &[TestCase]) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let span = tracing::info_span!("oracle_run", %run_id, cases = cases.len());
        let _enter = span.enter();

        let mut reports = Vec::with_capacity(cases.len());
        let mut stopped = false;
        for case in cases {
            let fingerprint = case.fingerprint();
            if stopped {
                reports.push(CaseReport {
                    description: case.description.clone(),
                    operation: case.operation.name(),
                    fingerprint,
                    verdict: Verdict::Skipped,
                    elapsed_micros: 0,
                });
                continue;
            }

            let case_span = tracing::debug_span!(
                "case",
                fingerprint = %fingerprint,
                operation = case.operation.name()
            );
            let _case = case_span.enter();
            let begin = Instant::now();
            let result = self.run_case(case);
            let elapsed_micros = u64::try_from(begin.elapsed().as_micros()).unwrap_or(u64::MAX);

            match &result {
                Ok(()) => tracing::debug!(description = %case.description, "case passed"),
                Err(e) => tracing::warn!(
                    description = %case.description,
                    expected = %case.expectation,
                    error = %e,
                    "case failed"
                ),
            }
            let verdict = Verdict::from_result(&result);
            let failed = matches!(verdict, Verdict::Failed { .. });
            reports.push(CaseReport {
                description: case.description.clone(),
                operation: case.operation.name(),
                fingerprint,
                verdict,
                elapsed_micros,
            });

            if failed && self.config.fail_fast {
                tracing::error!(
                    grace_ms = u64::try_from(self.config.fail_fast_grace.as_millis()).unwrap_or(u64::MAX),
                    "fail-fast: stopping run"
                );
                thread::sleep(self.config.fail_fast_grace);
                stopped = true;
            }
        }

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            cases: reports,
        };
        tracing::info!(
            passed = report.passed(),
            failed = report.failed(),
            skipped = report.skipped(),
            "oracle run finished"
        );
        report
    }
}

fn mismatched_expectation(case: &TestCase) -> OracleError {
    OracleError::precondition(format!(
        "case `{}` expects {} from a {} call",
        case.description,
        case.expectation,
        case.operation.name()
    ))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::SdkErrorKind;
    use crate::fixture::InMemoryFixture;
    use crate::flags::FlagSet;
    use crate::record::{EntityId, EntityRef};

    fn fixture() -> InMemoryFixture {
        let fx = InMemoryFixture::new();
        fx.configure_data_sources(&["TEST"]).unwrap();
        fx.add_record(&RecordKey::new("TEST", "1"), r#"{"NAME_FULL":"Ann"}"#)
            .unwrap();
        fx
    }

    fn get(id: i64, expectation: Expectation) -> TestCase {
        TestCase::new(
            format!("get entity {id}"),
            Operation::GetEntity {
                entity: EntityRef::Entity(EntityId::new(id)),
            },
            FlagSet::none(),
            expectation,
        )
    }

    #[test]
    fn test_expected_failure_kinds() {
        let fx = fixture();
        let driver = OracleDriver::new(&fx, OracleConfig::default());

        assert!(driver
            .run_case(&get(99, Expectation::Failure(SdkErrorKind::NotFound)))
            .is_ok());
        assert!(matches!(
            driver.run_case(&get(1, Expectation::Failure(SdkErrorKind::NotFound))),
            Err(OracleError::UnexpectedSuccess { .. })
        ));
        assert!(matches!(
            driver.run_case(&get(99, Expectation::Failure(SdkErrorKind::BadInput))),
            Err(OracleError::UnexpectedFailure { .. })
        ));
        assert!(matches!(
            driver.run_case(&get(99, Expectation::Success)),
            Err(OracleError::UnexpectedFailure { .. })
        ));
    }

    #[test]
    fn test_path_expectation_on_wrong_operation_is_harness_error() {
        let fx = fixture();
        let driver = OracleDriver::new(&fx, OracleConfig::default());
        let spec = crate::expected::ExpectedPathSpec::builder(
            RecordKey::new("TEST", "1"),
            RecordKey::new("TEST", "1"),
        )
        .no_path()
        .build()
        .unwrap();
        let err = driver.run_case(&get(1, Expectation::Path(spec))).unwrap_err();
        assert!(err.is_harness());
    }

    #[test]
    fn test_fail_fast_skips_remaining_cases() {
        let fx = fixture();
        let config = OracleConfig::default().with_fail_fast(Duration::from_millis(1));
        let driver = OracleDriver::new(&fx, config);
        let cases = vec![
            get(1, Expectation::Success),
            get(99, Expectation::Success),
            get(1, Expectation::Success),
        ];
        let report = driver.run(&cases);
        assert_eq!(report.passed(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped(), 1);
        assert!(!report.is_success());
    }

    #[test]
    fn test_run_without_fail_fast_runs_everything() {
        let fx = fixture();
        let driver = OracleDriver::new(&fx, OracleConfig::default());
        let cases = vec![get(99, Expectation::Success), get(1, Expectation::Success)];
        let report = driver.run(&cases);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.passed(), 1);
        let failure = report.failures().next().unwrap();
        assert!(matches!(
            failure.verdict,
            Verdict::Failed {
                category: FailureCategory::Outcome,
                ..
            }
        ));

        let json = report.to_json().unwrap();
        assert!(json.contains("\"status\": \"failed\""));
        assert!(json.contains(&report.run_id.to_string()));
    }

    #[test]
    fn test_export_operation_closes_handle() {
        let fx = fixture();
        let driver = OracleDriver::new(&fx, OracleConfig::default());
        let case = TestCase::new("export", Operation::Export, FlagSet::none(), Expectation::Success);
        driver.run_case(&case).unwrap();
        assert_eq!(fx.open_exports().unwrap(), 0);
    }

    #[test]
    fn test_replace_default_config_reads_current() {
        let fx = fixture();
        let driver = OracleDriver::new(&fx, OracleConfig::default());
        let current = fx.default_config_id().unwrap();
        let ok = TestCase::new(
            "replace with itself",
            Operation::ReplaceDefaultConfig {
                current: None,
                replacement: current,
            },
            FlagSet::none(),
            Expectation::Success,
        );
        driver.run_case(&ok).unwrap();

        let stale = TestCase::new(
            "replace from stale id",
            Operation::ReplaceDefaultConfig {
                current: Some(current + 100),
                replacement: current,
            },
            FlagSet::none(),
            Expectation::Failure(SdkErrorKind::ReplaceConflict),
        );
        driver.run_case(&stale).unwrap();
    }
}
