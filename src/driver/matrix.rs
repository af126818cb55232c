//! Parameter matrices for path and network cases.
//!
//! Each scenario is crossed with every [`IdentifierForm`] through
//! [`generate_combinations`], and flag-set variants are dealt round-robin
//! across the resulting cases with a [`Circular`] cursor. Coverage of flag
//! combinations spreads evenly without multiplying the case count.

use std::fmt;

use crate::combinatorics::{generate_combinations, Circular};
use crate::driver::case::{Expectation, Operation, TestCase};
use crate::error::OracleResult;
use crate::expected::{ExpectedNetworkSpec, ExpectedPathSpec};
use crate::flags::{network_flag_variants, path_flag_variants, FlagSet, SZ_FIND_PATH_STRICT_AVOID};
use crate::lookup::RecordEntityLookup;
use crate::record::{EntityRef, RecordKey};
use crate::sdk::{FindNetworkRequest, FindPathRequest};

/// How a case names the entities it asks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierForm {
    /// By `(data source, record id)`.
    ByRecord,
    /// By the entity id the record currently resolves to.
    ByEntity,
}

impl IdentifierForm {
    /// Every form, in matrix order.
    pub const ALL: [Self; 2] = [Self::ByRecord, Self::ByEntity];

    fn identify(self, lookup: &RecordEntityLookup, key: &RecordKey) -> OracleResult<EntityRef> {
        match self {
            Self::ByRecord => Ok(EntityRef::Record(key.clone())),
            Self::ByEntity => Ok(EntityRef::Entity(lookup.require_entity_id(key)?)),
        }
    }
}

impl fmt::Display for IdentifierForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByRecord => write!(f, "by record"),
            Self::ByEntity => write!(f, "by entity"),
        }
    }
}

/// A named path expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathScenario {
    pub name: String,
    pub spec: ExpectedPathSpec,
}

impl PathScenario {
    /// Creates a scenario.
    #[must_use]
    pub fn new(name: impl Into<String>, spec: ExpectedPathSpec) -> Self {
        Self {
            name: name.into(),
            spec,
        }
    }
}

/// A named network expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkScenario {
    pub name: String,
    pub spec: ExpectedNetworkSpec,
}

impl NetworkScenario {
    /// Creates a scenario.
    #[must_use]
    pub fn new(name: impl Into<String>, spec: ExpectedNetworkSpec) -> Self {
        Self {
            name: name.into(),
            spec,
        }
    }
}

fn scenario_form_grid(scenarios: usize) -> OracleResult<Vec<Vec<usize>>> {
    generate_combinations(&[
        (0..scenarios).collect::<Vec<_>>(),
        (0..IdentifierForm::ALL.len()).collect::<Vec<_>>(),
    ])
}

/// Expands path scenarios into cases.
///
/// Strict avoidance is part of each scenario, so the dealt flag set gains or
/// loses `SZ_FIND_PATH_STRICT_AVOID` to match it.
///
/// # Errors
///
/// Returns [`OracleError::UnknownRecord`](crate::OracleError::UnknownRecord)
/// when a scenario names a record outside the lookup.
pub fn path_cases(
    lookup: &RecordEntityLookup,
    scenarios: &[PathScenario],
) -> OracleResult<Vec<TestCase>> {
    path_cases_with(lookup, scenarios, path_flag_variants())
}

/// As [`path_cases`], dealing the given flag variants.
///
/// # Errors
///
/// Also fails with a precondition error when `variants` is empty.
pub fn path_cases_with(
    lookup: &RecordEntityLookup,
    scenarios: &[PathScenario],
    variants: &[FlagSet],
) -> OracleResult<Vec<TestCase>> {
    let mut flags = Circular::new(variants.to_vec())?;
    let mut cases = Vec::new();
    for combo in scenario_form_grid(scenarios.len())? {
        let scenario = &scenarios[combo[0]];
        let form = IdentifierForm::ALL[combo[1]];
        let spec = &scenario.spec;

        let dealt = flags.next_value();
        let case_flags = if spec.avoidance_strict {
            dealt.with(SZ_FIND_PATH_STRICT_AVOID)
        } else {
            dealt.without(SZ_FIND_PATH_STRICT_AVOID)
        };

        let request = FindPathRequest {
            start: form.identify(lookup, &spec.start)?,
            end: form.identify(lookup, &spec.end)?,
            max_degrees: spec.max_degrees,
            avoid: spec
                .avoid
                .iter()
                .map(|key| form.identify(lookup, key))
                .collect::<OracleResult<Vec<_>>>()?,
            required_sources: spec.required_sources.clone(),
        };
        cases.push(TestCase::new(
            format!("{} ({form}) [{case_flags}]", scenario.name),
            Operation::FindPath(request),
            case_flags,
            Expectation::Path(spec.clone()),
        ));
    }
    Ok(cases)
}

/// Expands network scenarios into cases.
///
/// # Errors
///
/// Returns [`OracleError::UnknownRecord`](crate::OracleError::UnknownRecord)
/// when a scenario names a record outside the lookup.
pub fn network_cases(
    lookup: &RecordEntityLookup,
    scenarios: &[NetworkScenario],
) -> OracleResult<Vec<TestCase>> {
    network_cases_with(lookup, scenarios, network_flag_variants())
}

/// As [`network_cases`], dealing the given flag variants.
///
/// # Errors
///
/// Also fails with a precondition error when `variants` is empty.
pub fn network_cases_with(
    lookup: &RecordEntityLookup,
    scenarios: &[NetworkScenario],
    variants: &[FlagSet],
) -> OracleResult<Vec<TestCase>> {
    let mut flags = Circular::new(variants.to_vec())?;
    let mut cases = Vec::new();
    for combo in scenario_form_grid(scenarios.len())? {
        let scenario = &scenarios[combo[0]];
        let form = IdentifierForm::ALL[combo[1]];
        let spec = &scenario.spec;
        let case_flags = flags.next_value();

        let request = FindNetworkRequest {
            entities: spec
                .requested
                .iter()
                .map(|key| form.identify(lookup, key))
                .collect::<OracleResult<Vec<_>>>()?,
            max_degrees: spec.max_degrees,
            build_out_degrees: spec.build_out_degrees,
            build_out_max_entities: spec.build_out_max_entities,
        };
        cases.push(TestCase::new(
            format!("{} ({form}) [{case_flags}]", scenario.name),
            Operation::FindNetwork(request),
            case_flags,
            Expectation::Network(spec.clone()),
        ));
    }
    Ok(cases)
}
