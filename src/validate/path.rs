//! Validation of a single find-path result.

use std::collections::BTreeSet;

use crate::error::OracleResult;
use crate::expected::ExpectedPathSpec;
use crate::flags::{FlagSet, SZ_FIND_PATH_INCLUDE_MATCHING_INFO};
use crate::lookup::RecordEntityLookup;
use crate::record::EntityId;
use crate::response::PathResponse;

use super::{finish, render_chain, render_set, Check, Mismatch};

/// Validates find-path output against `spec`.
///
/// # Errors
/// - [`crate::OracleError::ResponseParse`] if `actual_json` is not a path result
/// - [`crate::OracleError::UnknownRecord`] if `spec` names a record the lookup
///   does not know
/// - [`crate::OracleError::Validation`] carrying every mismatch found
pub fn validate_path(
    lookup: &RecordEntityLookup,
    actual_json: &str,
    flags: &FlagSet,
    spec: &ExpectedPathSpec,
) -> OracleResult<()> {
    let response = PathResponse::parse(actual_json)?;
    let mismatches = check_path(lookup, &response, flags, spec)?;
    finish(
        format!(
            "find-path {} -> {} (max degrees {}, flags {flags})",
            spec.start, spec.end, spec.max_degrees
        ),
        mismatches,
    )?;
    Ok(())
}

/// Runs every path check and returns the mismatches found.
pub fn check_path(
    lookup: &RecordEntityLookup,
    response: &PathResponse,
    flags: &FlagSet,
    spec: &ExpectedPathSpec,
) -> OracleResult<Vec<Mismatch>> {
    let chain = response.chain();
    let start_id = lookup.require_entity_id(&spec.start)?;
    let end_id = lookup.require_entity_id(&spec.end)?;
    let mut out = Vec::new();

    // presence
    if spec.expects_no_path() {
        if !chain.is_empty() {
            out.push(Mismatch::new(Check::Presence, "no path", render_chain(chain)));
        }
    } else if chain.len() != spec.expected_length {
        out.push(Mismatch::new(
            Check::Presence,
            format!("{} entities", spec.expected_length),
            format!("{} entities {}", chain.len(), render_chain(chain)),
        ));
    }

    // endpoints
    if let (Some(&first), Some(&last)) = (chain.first(), chain.last()) {
        if first != start_id || last != end_id {
            out.push(Mismatch::new(
                Check::Endpoints,
                format!("{start_id} .. {end_id}"),
                format!("{first} .. {last}"),
            ));
        }
    }

    // exact order
    if !spec.expected_path.is_empty() {
        let expected = spec
            .expected_path
            .iter()
            .map(|k| lookup.require_entity_id(k))
            .collect::<OracleResult<Vec<EntityId>>>()?;
        if chain != expected.as_slice() {
            out.push(Mismatch::new(
                Check::Order,
                render_chain(&expected),
                render_chain(chain),
            ));
        }
    }

    // Non-strict avoidance is a soft preference; nothing to assert.
    if spec.avoidance_strict && !spec.avoid.is_empty() {
        let avoided = lookup.entity_ids_of(&spec.avoid)?;
        let hits: BTreeSet<EntityId> = chain
            .iter()
            .copied()
            .filter(|id| avoided.contains(id))
            .collect();
        if !hits.is_empty() {
            out.push(Mismatch::new(
                Check::Avoidance,
                format!("none of {}", render_set(&avoided)),
                format!("{} on path {}", render_set(&hits), render_chain(chain)),
            ));
        }
    }

    if !spec.required_sources.is_empty() && chain.len() > 2 {
        let intermediates = &chain[1..chain.len() - 1];
        let satisfied = intermediates.iter().any(|&id| {
            lookup
                .data_sources_of(id)
                .iter()
                .any(|ds| spec.required_sources.contains(*ds))
        });
        if !satisfied {
            out.push(Mismatch::new(
                Check::RequiredSources,
                format!("an intermediate entity from {:?}", spec.required_sources),
                format!("intermediates {}", render_chain(intermediates)),
            ));
        }
    } else if !spec.required_sources.is_empty() && !chain.is_empty() {
        out.push(Mismatch::new(
            Check::RequiredSources,
            format!("an intermediate entity from {:?}", spec.required_sources),
            format!("no intermediates on {}", render_chain(chain)),
        ));
    }

    out.extend(matching_info_mismatch(
        flags.contains(SZ_FIND_PATH_INCLUDE_MATCHING_INFO),
        response.path_links.is_some(),
        "ENTITY_PATH_LINKS",
    ));

    // detail completeness
    let mut expected_details: BTreeSet<EntityId> = chain.iter().copied().collect();
    expected_details.insert(start_id);
    expected_details.insert(end_id);
    let actual_details = response.detail_ids();
    if expected_details != actual_details {
        let missing: BTreeSet<EntityId> =
            expected_details.difference(&actual_details).copied().collect();
        let extra: BTreeSet<EntityId> =
            actual_details.difference(&expected_details).copied().collect();
        out.push(Mismatch::new(
            Check::DetailCompleteness,
            render_set(&expected_details),
            format!(
                "{} (missing {}, extra {})",
                render_set(&actual_details),
                render_set(&missing),
                render_set(&extra)
            ),
        ));
    }

    Ok(out)
}

pub(super) fn matching_info_mismatch(
    requested: bool,
    present: bool,
    field: &str,
) -> Option<Mismatch> {
    match (requested, present) {
        (true, false) => Some(Mismatch::new(
            Check::MatchingInfo,
            format!("{field} (matching info requested)"),
            "absent",
        )),
        (false, true) => Some(Mismatch::new(
            Check::MatchingInfo,
            format!("no {field} (matching info not requested)"),
            "present",
        )),
        _ => None,
    }
}
