//! Validation of a find-network result.
//!
//! Actual paths are re-keyed by [`CanonicalPairKey`] and oriented to start at
//! the lower entity id, expected paths are translated and oriented the same
//! way, and the two maps are compared key by key.

use std::collections::{BTreeMap, BTreeSet};

use crate::canonical::CanonicalPairKey;
use crate::error::OracleResult;
use crate::expected::{ExpectedNetworkSpec, ExpectedPath};
use crate::flags::{FlagSet, SZ_FIND_NETWORK_INCLUDE_MATCHING_INFO};
use crate::lookup::RecordEntityLookup;
use crate::record::EntityId;
use crate::response::NetworkResponse;

use super::path::matching_info_mismatch;
use super::{finish, render_chain, render_set, Check, Mismatch};

/// Validates find-network output against `spec`.
///
/// # Errors
/// - [`crate::OracleError::ResponseParse`] if `actual_json` is not a network result
/// - [`crate::OracleError::UnknownRecord`] if `spec` names a record the lookup
///   does not know
/// - [`crate::OracleError::Validation`] carrying every mismatch found
pub fn validate_network(
    lookup: &RecordEntityLookup,
    actual_json: &str,
    flags: &FlagSet,
    spec: &ExpectedNetworkSpec,
) -> OracleResult<()> {
    let response = NetworkResponse::parse(actual_json)?;
    let mismatches = check_network(lookup, &response, flags, spec)?;
    let requested: Vec<String> = spec.requested.iter().map(ToString::to_string).collect();
    finish(
        format!(
            "find-network [{}] (max degrees {}, build-out {}/{}, flags {flags})",
            requested.join(", "),
            spec.max_degrees,
            spec.build_out_degrees,
            spec.build_out_max_entities
        ),
        mismatches,
    )?;
    Ok(())
}

/// Runs every network check and returns the mismatches found.
pub fn check_network(
    lookup: &RecordEntityLookup,
    response: &NetworkResponse,
    flags: &FlagSet,
    spec: &ExpectedNetworkSpec,
) -> OracleResult<Vec<Mismatch>> {
    let mut out = Vec::new();

    let mut actual_by_key: BTreeMap<CanonicalPairKey, Vec<EntityId>> = BTreeMap::new();
    for path in &response.entity_paths {
        let start = path.start_entity_id.or_else(|| path.entities.first().copied());
        let end = path.end_entity_id.or_else(|| path.entities.last().copied());
        let (Some(start), Some(end)) = (start, end) else {
            out.push(Mismatch::new(
                Check::NetworkPath,
                "START_ENTITY_ID and END_ENTITY_ID",
                format!("entry without endpoints {}", render_chain(&path.entities)),
            ));
            continue;
        };
        let key = CanonicalPairKey::new(start, end);
        let oriented = key.orient(&path.entities);
        if let Some(previous) = actual_by_key.insert(key, oriented) {
            out.push(Mismatch::new(
                Check::DuplicatePath,
                format!("one entry for {key}"),
                format!("another entry {}", render_chain(&previous)),
            ));
        }
    }

    let mut required: BTreeSet<EntityId> = lookup.entity_ids_of(&spec.requested)?;
    let mut expected_keys = BTreeSet::new();

    for expected in &spec.paths {
        match expected {
            ExpectedPath::Connected(keys) => {
                let ids = keys
                    .iter()
                    .map(|k| lookup.require_entity_id(k))
                    .collect::<OracleResult<Vec<EntityId>>>()?;
                required.extend(ids.iter().copied());
                let (Some(&first), Some(&last)) = (ids.first(), ids.last()) else {
                    continue;
                };
                let key = CanonicalPairKey::new(first, last);
                expected_keys.insert(key);
                let expected_chain = key.orient(&ids);
                match actual_by_key.get(&key) {
                    None => out.push(Mismatch::new(
                        Check::NetworkPath,
                        format!("{key} via {}", render_chain(&expected_chain)),
                        "no entry",
                    )),
                    Some(actual) if *actual != expected_chain => out.push(Mismatch::new(
                        Check::NetworkPath,
                        format!("{key} via {}", render_chain(&expected_chain)),
                        format!("{key} via {}", render_chain(actual)),
                    )),
                    Some(_) => {}
                }
            }
            ExpectedPath::Disconnected { start, end } => {
                let start_id = lookup.require_entity_id(start)?;
                let end_id = lookup.require_entity_id(end)?;
                required.insert(start_id);
                required.insert(end_id);
                let key = CanonicalPairKey::new(start_id, end_id);
                expected_keys.insert(key);
                match actual_by_key.get(&key) {
                    None => out.push(Mismatch::new(
                        Check::NetworkPath,
                        format!("{key} reported with no connecting path"),
                        "no entry",
                    )),
                    Some(actual) if !actual.is_empty() => out.push(Mismatch::new(
                        Check::NetworkPath,
                        format!("{key} reported with no connecting path"),
                        format!("{key} via {}", render_chain(actual)),
                    )),
                    Some(_) => {}
                }
            }
        }
    }

    for (key, chain) in &actual_by_key {
        if !expected_keys.contains(key) {
            out.push(Mismatch::new(
                Check::UnexpectedPath,
                "only expected pairs",
                format!("{key} via {}", render_chain(chain)),
            ));
        }
    }

    let details = response.detail_ids();
    let min_count = required.len();
    let max_count = min_count.saturating_add(spec.build_out_allowance());
    if details.len() < min_count || details.len() > max_count {
        out.push(Mismatch::new(
            Check::EntityCount,
            format!("between {min_count} and {max_count} entity details"),
            format!("{} entity details", details.len()),
        ));
    }

    out.extend(matching_info_mismatch(
        flags.contains(SZ_FIND_NETWORK_INCLUDE_MATCHING_INFO),
        response.network_links.is_some(),
        "ENTITY_NETWORK_LINKS",
    ));

    let missing: BTreeSet<EntityId> = required.difference(&details).copied().collect();
    if !missing.is_empty() {
        out.push(Mismatch::new(
            Check::RequiredCoverage,
            format!("details for {}", render_set(&required)),
            format!("missing {}", render_set(&missing)),
        ));
    }

    let build_out = lookup.entity_ids_of(&spec.required_build_out)?;
    let missing_build_out: BTreeSet<EntityId> = build_out.difference(&details).copied().collect();
    if !missing_build_out.is_empty() {
        out.push(Mismatch::new(
            Check::RequiredCoverage,
            format!("build-out details for {}", render_set(&build_out)),
            format!("missing {}", render_set(&missing_build_out)),
        ));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::error::OracleError;
    use crate::record::RecordKey;

    fn key(id: &str) -> RecordKey {
        RecordKey::new("TEST", id)
    }

    /// Records `E1`..`E9` resolve to entities 1..9.
    fn lookup() -> RecordEntityLookup {
        let map: BTreeMap<RecordKey, EntityId> = (1..=9)
            .map(|i| (key(&format!("E{i}")), EntityId::new(i)))
            .collect();
        RecordEntityLookup::build(map)
    }

    fn network_json(paths: &[(i64, i64, &[i64])], details: &[i64], links: bool) -> String {
        let paths: Vec<String> = paths
            .iter()
            .map(|(s, e, chain)| {
                let chain: Vec<String> = chain.iter().map(ToString::to_string).collect();
                format!(
                    r#"{{"START_ENTITY_ID":{s},"END_ENTITY_ID":{e},"ENTITIES":[{}]}}"#,
                    chain.join(",")
                )
            })
            .collect();
        let details: Vec<String> = details
            .iter()
            .map(|id| format!(r#"{{"RESOLVED_ENTITY":{{"ENTITY_ID":{id}}}}}"#))
            .collect();
        let links = if links {
            r#","ENTITY_NETWORK_LINKS":[]"#
        } else {
            ""
        };
        format!(
            r#"{{"ENTITY_PATHS":[{}]{links},"ENTITIES":[{}]}}"#,
            paths.join(","),
            details.join(",")
        )
    }

    fn checks(result: OracleResult<()>) -> Vec<Check> {
        match result {
            Err(OracleError::Validation(f)) => f.mismatches.iter().map(|m| m.check).collect(),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn test_single_entity_network() {
        let spec = ExpectedNetworkSpec::builder()
            .request(key("E1"))
            .max_degrees(1)
            .build_out(0, 10)
            .build()
            .unwrap();
        let ok = network_json(&[], &[1], false);
        validate_network(&lookup(), &ok, &FlagSet::none(), &spec).unwrap();

        let extra = network_json(&[], &[1, 2], false);
        assert_eq!(
            checks(validate_network(&lookup(), &extra, &FlagSet::none(), &spec)),
            vec![Check::EntityCount]
        );
    }

    #[test]
    fn test_reversed_actual_path_matches() {
        let spec = ExpectedNetworkSpec::builder()
            .request(key("E1"))
            .request(key("E3"))
            .max_degrees(2)
            .connected([key("E1"), key("E2"), key("E3")])
            .build()
            .unwrap();
        let json = network_json(&[(3, 1, &[3, 2, 1])], &[1, 2, 3], false);
        validate_network(&lookup(), &json, &FlagSet::none(), &spec).unwrap();
    }

    #[test]
    fn test_reversed_expected_path_matches() {
        let spec = ExpectedNetworkSpec::builder()
            .request(key("E1"))
            .request(key("E3"))
            .max_degrees(2)
            .connected([key("E3"), key("E2"), key("E1")])
            .build()
            .unwrap();
        let json = network_json(&[(1, 3, &[1, 2, 3])], &[1, 2, 3], false);
        validate_network(&lookup(), &json, &FlagSet::none(), &spec).unwrap();
    }

    #[test]
    fn test_wrong_intermediate() {
        let spec = ExpectedNetworkSpec::builder()
            .request(key("E1"))
            .request(key("E3"))
            .max_degrees(2)
            .connected([key("E1"), key("E2"), key("E3")])
            .build()
            .unwrap();
        let json = network_json(&[(1, 3, &[1, 4, 3])], &[1, 2, 3, 4], false);
        let found = checks(validate_network(&lookup(), &json, &FlagSet::none(), &spec));
        assert_eq!(found, vec![Check::NetworkPath, Check::EntityCount]);
    }

    #[test]
    fn test_disconnected_pair_with_build_out() {
        let spec = ExpectedNetworkSpec::builder()
            .request(key("E1"))
            .request(key("E5"))
            .max_degrees(1)
            .build_out(1, 1000)
            .disconnected(key("E1"), key("E5"))
            .require_build_out(key("E2"))
            .require_build_out(key("E6"))
            .build()
            .unwrap();
        let json = network_json(&[(1, 5, &[])], &[1, 2, 5, 6], false);
        validate_network(&lookup(), &json, &FlagSet::none(), &spec).unwrap();

        let missing_sentinel = network_json(&[], &[1, 2, 5, 6], false);
        assert_eq!(
            checks(validate_network(
                &lookup(),
                &missing_sentinel,
                &FlagSet::none(),
                &spec
            )),
            vec![Check::NetworkPath]
        );

        let missing_neighbor = network_json(&[(5, 1, &[])], &[1, 2, 5], false);
        assert_eq!(
            checks(validate_network(
                &lookup(),
                &missing_neighbor,
                &FlagSet::none(),
                &spec
            )),
            vec![Check::RequiredCoverage]
        );
    }

    #[test]
    fn test_disconnected_pair_rejects_chain() {
        let spec = ExpectedNetworkSpec::builder()
            .request(key("E1"))
            .request(key("E5"))
            .disconnected(key("E1"), key("E5"))
            .build()
            .unwrap();
        let json = network_json(&[(1, 5, &[1, 5])], &[1, 5], false);
        assert_eq!(
            checks(validate_network(&lookup(), &json, &FlagSet::none(), &spec)),
            vec![Check::NetworkPath]
        );
    }

    #[test]
    fn test_unexpected_and_duplicate_pairs() {
        let spec = ExpectedNetworkSpec::builder()
            .request(key("E1"))
            .request(key("E2"))
            .connected([key("E1"), key("E2")])
            .build()
            .unwrap();
        let json = network_json(
            &[(1, 2, &[1, 2]), (2, 1, &[2, 1]), (1, 3, &[1, 3])],
            &[1, 2],
            false,
        );
        let found = checks(validate_network(&lookup(), &json, &FlagSet::none(), &spec));
        assert!(found.contains(&Check::DuplicatePath));
        assert!(found.contains(&Check::UnexpectedPath));
    }

    #[test]
    fn test_count_upper_bound() {
        let spec = ExpectedNetworkSpec::builder()
            .request(key("E1"))
            .build_out(1, 2)
            .build()
            .unwrap();
        let json = network_json(&[], &[1, 2, 3], false);
        validate_network(&lookup(), &json, &FlagSet::none(), &spec).unwrap();
        let json = network_json(&[], &[1, 2, 3, 4], false);
        assert_eq!(
            checks(validate_network(&lookup(), &json, &FlagSet::none(), &spec)),
            vec![Check::EntityCount]
        );
    }

    #[test]
    fn test_missing_required_detail() {
        let spec = ExpectedNetworkSpec::builder()
            .request(key("E1"))
            .request(key("E2"))
            .connected([key("E1"), key("E2")])
            .build()
            .unwrap();
        let json = network_json(&[(1, 2, &[1, 2])], &[1], false);
        assert_eq!(
            checks(validate_network(&lookup(), &json, &FlagSet::none(), &spec)),
            vec![Check::EntityCount, Check::RequiredCoverage]
        );
    }

    #[test]
    fn test_network_matching_info() {
        let spec = ExpectedNetworkSpec::builder()
            .request(key("E1"))
            .build()
            .unwrap();
        let flags = FlagSet::of(&[SZ_FIND_NETWORK_INCLUDE_MATCHING_INFO]);
        let without = network_json(&[], &[1], false);
        assert_eq!(
            checks(validate_network(&lookup(), &without, &flags, &spec)),
            vec![Check::MatchingInfo]
        );
        let with = network_json(&[], &[1], true);
        validate_network(&lookup(), &with, &flags, &spec).unwrap();
        assert_eq!(
            checks(validate_network(&lookup(), &with, &FlagSet::none(), &spec)),
            vec![Check::MatchingInfo]
        );
    }
}
