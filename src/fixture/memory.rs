//! Thread-safe in-memory engine state.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::{json, Map, Value};

use crate::canonical::CanonicalPairKey;
use crate::error::SdkError;
use crate::fixture::graph::{self, Adjacency, PathQuery};
use crate::fixture::record::{parse_object, AnchorRef, FixtureRecord};
use crate::flags::{
    FlagSet, SZ_ENTITY_INCLUDE_DISCLOSED_RELATIONS, SZ_ENTITY_INCLUDE_ENTITY_NAME,
    SZ_ENTITY_INCLUDE_RECORD_DATA, SZ_ENTITY_INCLUDE_RECORD_MATCHING_INFO,
    SZ_ENTITY_INCLUDE_RECORD_SUMMARY, SZ_EXPORT_INCLUDE_MULTI_RECORD_ENTITIES,
    SZ_EXPORT_INCLUDE_SINGLE_RECORD_ENTITIES, SZ_FIND_NETWORK_INCLUDE_MATCHING_INFO,
    SZ_FIND_PATH_INCLUDE_MATCHING_INFO, SZ_FIND_PATH_STRICT_AVOID, SZ_SEARCH_INCLUDE_STATS,
};
use crate::lookup::RecordEntityLookup;
use crate::record::{normalize_data_source, EntityId, EntityRef, RecordKey};
use crate::sdk::{
    ExportHandle, FindNetworkRequest, FindPathRequest, FixtureLoader, ResolutionSdk,
};

const DISCLOSED_MATCH_KEY: &str = "+REL_POINTER";
const RESOLVED_MATCH_KEY: &str = "+ENTITY_KEY";

#[derive(Debug)]
struct FixtureState {
    destroyed: bool,
    data_sources: BTreeSet<String>,
    configs: BTreeSet<i64>,
    default_config: i64,
    records: BTreeMap<RecordKey, FixtureRecord>,
    entity_of: BTreeMap<RecordKey, EntityId>,
    members: BTreeMap<EntityId, BTreeSet<RecordKey>>,
    entity_keys: BTreeMap<String, EntityId>,
    next_entity: i64,
    anchors: BTreeMap<AnchorRef, RecordKey>,
    pending: BTreeSet<(RecordKey, AnchorRef)>,
    exports: BTreeMap<i64, VecDeque<String>>,
    next_export: i64,
}

impl Default for FixtureState {
    fn default() -> Self {
        Self {
            destroyed: false,
            data_sources: BTreeSet::new(),
            configs: BTreeSet::from([1]),
            default_config: 1,
            records: BTreeMap::new(),
            entity_of: BTreeMap::new(),
            members: BTreeMap::new(),
            entity_keys: BTreeMap::new(),
            next_entity: 1,
            anchors: BTreeMap::new(),
            pending: BTreeSet::new(),
            exports: BTreeMap::new(),
            next_export: 1,
        }
    }
}

impl FixtureState {
    fn require_source(&self, code: &str) -> Result<String, SdkError> {
        let code = normalize_data_source(code);
        if self.data_sources.contains(&code) {
            Ok(code)
        } else {
            Err(SdkError::UnknownDataSource { code })
        }
    }

    fn insert(&mut self, record: FixtureRecord) -> EntityId {
        let key = record.key.clone();
        self.remove(&key);

        let existing = record
            .entity_key
            .as_ref()
            .and_then(|k| self.entity_keys.get(k).copied());
        let id = existing.unwrap_or_else(|| {
            let id = EntityId::new(self.next_entity);
            self.next_entity += 1;
            if let Some(k) = &record.entity_key {
                self.entity_keys.insert(k.clone(), id);
            }
            id
        });

        self.entity_of.insert(key.clone(), id);
        self.members.entry(id).or_default().insert(key.clone());
        for anchor in &record.anchors {
            self.anchors.insert(anchor.clone(), key.clone());
        }
        for pointer in &record.pointers {
            if !self.anchors.contains_key(pointer) {
                self.pending.insert((key.clone(), pointer.clone()));
            }
        }
        self.records.insert(key, record);
        id
    }

    fn remove(&mut self, key: &RecordKey) -> bool {
        if self.records.remove(key).is_none() {
            return false;
        }
        if let Some(id) = self.entity_of.remove(key) {
            let now_empty = self.members.get_mut(&id).is_some_and(|m| {
                m.remove(key);
                m.is_empty()
            });
            if now_empty {
                self.members.remove(&id);
                self.entity_keys.retain(|_, e| *e != id);
            }
        }
        self.anchors.retain(|_, owner| owner != key);
        self.pending.retain(|(pointer, _)| pointer != key);
        true
    }

    fn drain_redo(&mut self) -> usize {
        let ready: Vec<(RecordKey, AnchorRef)> = self
            .pending
            .iter()
            .filter(|(_, anchor)| self.anchors.contains_key(anchor))
            .cloned()
            .collect();
        for item in &ready {
            self.pending.remove(item);
        }
        ready.len()
    }

    fn adjacency(&self) -> Adjacency {
        let mut adjacency = Adjacency::new();
        for (key, record) in &self.records {
            for pointer in &record.pointers {
                if self.pending.contains(&(key.clone(), pointer.clone())) {
                    continue;
                }
                let Some(anchor_owner) = self.anchors.get(pointer) else {
                    continue;
                };
                let (Some(&a), Some(&b)) =
                    (self.entity_of.get(key), self.entity_of.get(anchor_owner))
                else {
                    continue;
                };
                if a != b {
                    adjacency.entry(a).or_default().insert(b);
                    adjacency.entry(b).or_default().insert(a);
                }
            }
        }
        adjacency
    }

    fn resolve(&self, entity: &EntityRef) -> Result<EntityId, SdkError> {
        match entity {
            EntityRef::Entity(id) => {
                if self.members.contains_key(id) {
                    Ok(*id)
                } else {
                    Err(SdkError::not_found(format!("entity {id}")))
                }
            }
            EntityRef::Record(key) => {
                self.require_source(key.data_source())?;
                self.entity_of
                    .get(key)
                    .copied()
                    .ok_or_else(|| SdkError::not_found(format!("record {key}")))
            }
        }
    }

    fn entity_name(&self, id: EntityId) -> Option<String> {
        self.members
            .get(&id)?
            .iter()
            .filter_map(|k| self.records.get(k))
            .find_map(FixtureRecord::name)
    }

    fn entity_json(&self, id: EntityId, flags: &FlagSet, adjacency: &Adjacency) -> Value {
        let members = self.members.get(&id).cloned().unwrap_or_default();
        let mut resolved = Map::new();
        resolved.insert("ENTITY_ID".into(), json!(id));
        if flags.contains(SZ_ENTITY_INCLUDE_ENTITY_NAME) {
            if let Some(name) = self.entity_name(id) {
                resolved.insert("ENTITY_NAME".into(), json!(name));
            }
        }
        if flags.contains(SZ_ENTITY_INCLUDE_RECORD_SUMMARY) {
            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for key in &members {
                *counts.entry(key.data_source()).or_default() += 1;
            }
            let summary: Vec<Value> = counts
                .into_iter()
                .map(|(ds, n)| json!({"DATA_SOURCE": ds, "RECORD_COUNT": n}))
                .collect();
            resolved.insert("RECORD_SUMMARY".into(), Value::Array(summary));
        }

        let first = members.iter().next().cloned();
        let records: Vec<Value> = members
            .iter()
            .map(|key| {
                let mut rec = Map::new();
                rec.insert("DATA_SOURCE".into(), json!(key.data_source()));
                rec.insert("RECORD_ID".into(), json!(key.record_id()));
                if flags.contains(SZ_ENTITY_INCLUDE_RECORD_DATA) {
                    if let Some(record) = self.records.get(key) {
                        rec.insert("JSON_DATA".into(), Value::Object(record.attributes.clone()));
                    }
                }
                if flags.contains(SZ_ENTITY_INCLUDE_RECORD_MATCHING_INFO) {
                    let match_key = if first.as_ref() == Some(key) {
                        ""
                    } else {
                        RESOLVED_MATCH_KEY
                    };
                    rec.insert("MATCH_KEY".into(), json!(match_key));
                }
                Value::Object(rec)
            })
            .collect();
        resolved.insert("RECORDS".into(), Value::Array(records));

        let mut detail = Map::new();
        detail.insert("RESOLVED_ENTITY".into(), Value::Object(resolved));
        if flags.contains(SZ_ENTITY_INCLUDE_DISCLOSED_RELATIONS) {
            let related: Vec<Value> = adjacency
                .get(&id)
                .into_iter()
                .flatten()
                .map(|n| {
                    json!({
                        "ENTITY_ID": n,
                        "IS_DISCLOSED": 1,
                        "MATCH_KEY": DISCLOSED_MATCH_KEY,
                    })
                })
                .collect();
            detail.insert("RELATED_ENTITIES".into(), Value::Array(related));
        }
        Value::Object(detail)
    }

    fn details_json(&self, ids: &BTreeSet<EntityId>, flags: &FlagSet, adjacency: &Adjacency) -> Value {
        Value::Array(
            ids.iter()
                .map(|id| self.entity_json(*id, flags, adjacency))
                .collect(),
        )
    }
}

fn links_json(ids: &BTreeSet<EntityId>, adjacency: &Adjacency) -> Value {
    let mut pairs = BTreeSet::new();
    for id in ids {
        for n in adjacency.get(id).into_iter().flatten() {
            if ids.contains(n) {
                pairs.insert(CanonicalPairKey::new(*id, *n));
            }
        }
    }
    Value::Array(
        pairs
            .into_iter()
            .map(|pair| {
                json!({
                    "MIN_ENTITY_ID": pair.low(),
                    "MAX_ENTITY_ID": pair.high(),
                    "MATCH_LEVEL_CODE": "DISCLOSED",
                    "MATCH_KEY": DISCLOSED_MATCH_KEY,
                    "IS_DISCLOSED": 1,
                })
            })
            .collect(),
    )
}

fn check_encoding(encoding: &str) -> Result<(), SdkError> {
    let normalized = encoding.trim().to_ascii_uppercase().replace('-', "");
    if normalized == "UTF8" {
        Ok(())
    } else {
        Err(SdkError::bad_input(format!("unsupported encoding: {encoding}")))
    }
}

/// Deterministic stand-in for the resolution engine.
#[derive(Debug, Default)]
pub struct InMemoryFixture {
    state: RwLock<FixtureState>,
}

impl InMemoryFixture {
    /// Creates an empty environment with no data sources configured.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of resolved entities currently held.
    ///
    /// # Errors
    ///
    /// Fails once the environment is destroyed.
    pub fn entity_count(&self) -> Result<usize, SdkError> {
        Ok(self.read()?.members.len())
    }

    /// Number of relationship pointers still waiting for their anchor.
    ///
    /// # Errors
    ///
    /// Fails once the environment is destroyed.
    pub fn pending_redo(&self) -> Result<usize, SdkError> {
        let state = self.read()?;
        Ok(state
            .pending
            .iter()
            .filter(|(_, anchor)| state.anchors.contains_key(anchor))
            .count())
    }

    /// Number of export handles not yet closed.
    ///
    /// # Errors
    ///
    /// Fails once the environment is destroyed.
    pub fn open_exports(&self) -> Result<usize, SdkError> {
        Ok(self.read()?.exports.len())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, FixtureState>, SdkError> {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if guard.destroyed {
            return Err(SdkError::EnvironmentDestroyed);
        }
        Ok(guard)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, FixtureState>, SdkError> {
        let guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if guard.destroyed {
            return Err(SdkError::EnvironmentDestroyed);
        }
        Ok(guard)
    }
}

impl ResolutionSdk for InMemoryFixture {
    fn add_record(&self, key: &RecordKey, record_json: &str) -> Result<(), SdkError> {
        let mut state = self.write()?;
        state.require_source(key.data_source())?;
        let record = FixtureRecord::parse_keyed(key, record_json)?;
        let id = state.insert(record);
        tracing::trace!(record = %key, entity = %id, "record added");
        Ok(())
    }

    fn delete_record(&self, key: &RecordKey) -> Result<(), SdkError> {
        let mut state = self.write()?;
        state.require_source(key.data_source())?;
        if state.remove(key) {
            tracing::trace!(record = %key, "record deleted");
        }
        Ok(())
    }

    fn find_path(&self, request: &FindPathRequest, flags: &FlagSet) -> Result<String, SdkError> {
        let state = self.read()?;
        let start = state.resolve(&request.start)?;
        let end = state.resolve(&request.end)?;
        let avoid = request
            .avoid
            .iter()
            .map(|r| state.resolve(r))
            .collect::<Result<BTreeSet<_>, _>>()?;
        let required = request
            .required_sources
            .iter()
            .map(|code| state.require_source(code))
            .collect::<Result<BTreeSet<_>, _>>()?;
        let qualifying: Option<BTreeSet<EntityId>> = (!required.is_empty()).then(|| {
            state
                .members
                .iter()
                .filter(|(_, keys)| keys.iter().any(|k| required.contains(k.data_source())))
                .map(|(id, _)| *id)
                .collect()
        });

        let adjacency = state.adjacency();
        let query = PathQuery {
            start,
            end,
            max_degrees: request.max_degrees,
            avoid: &avoid,
            strict_avoid: flags.contains(SZ_FIND_PATH_STRICT_AVOID),
            qualifying: qualifying.as_ref(),
        };
        let chain = graph::find_path(&adjacency, &query).unwrap_or_default();
        tracing::debug!(%start, %end, hops = chain.len().saturating_sub(1), "find-path evaluated");

        let mut detail_ids: BTreeSet<EntityId> = chain.iter().copied().collect();
        detail_ids.insert(start);
        detail_ids.insert(end);

        let mut out = Map::new();
        out.insert(
            "ENTITY_PATHS".into(),
            json!([{ "START_ENTITY_ID": start, "END_ENTITY_ID": end, "ENTITIES": chain }]),
        );
        if flags.contains(SZ_FIND_PATH_INCLUDE_MATCHING_INFO) {
            out.insert("ENTITY_PATH_LINKS".into(), links_json(&detail_ids, &adjacency));
        }
        out.insert(
            "ENTITIES".into(),
            state.details_json(&detail_ids, flags, &adjacency),
        );
        Ok(Value::Object(out).to_string())
    }

    fn find_network(
        &self,
        request: &FindNetworkRequest,
        flags: &FlagSet,
    ) -> Result<String, SdkError> {
        let state = self.read()?;
        let mut requested: Vec<EntityId> = Vec::new();
        for entity in &request.entities {
            let id = state.resolve(entity)?;
            if !requested.contains(&id) {
                requested.push(id);
            }
        }
        if requested.is_empty() {
            return Err(SdkError::bad_input("find-network requires at least one entity"));
        }

        let adjacency = state.adjacency();
        let no_avoid = BTreeSet::new();
        let mut detail_ids: BTreeSet<EntityId> = requested.iter().copied().collect();
        let mut paths = Vec::new();
        for (i, &start) in requested.iter().enumerate() {
            for &end in &requested[i + 1..] {
                let query = PathQuery {
                    start,
                    end,
                    max_degrees: request.max_degrees,
                    avoid: &no_avoid,
                    strict_avoid: false,
                    qualifying: None,
                };
                let chain = graph::find_path(&adjacency, &query).unwrap_or_default();
                detail_ids.extend(chain.iter().copied());
                paths.push(json!({
                    "START_ENTITY_ID": start,
                    "END_ENTITY_ID": end,
                    "ENTITIES": chain,
                }));
            }
        }

        let extra = graph::build_out(
            &adjacency,
            &detail_ids,
            request.build_out_degrees,
            request.build_out_max_entities,
        );
        tracing::debug!(
            requested = requested.len(),
            pairs = paths.len(),
            build_out = extra.len(),
            "find-network evaluated"
        );
        detail_ids.extend(extra);

        let mut out = Map::new();
        out.insert("ENTITY_PATHS".into(), Value::Array(paths));
        if flags.contains(SZ_FIND_NETWORK_INCLUDE_MATCHING_INFO) {
            out.insert("ENTITY_NETWORK_LINKS".into(), links_json(&detail_ids, &adjacency));
        }
        out.insert(
            "ENTITIES".into(),
            state.details_json(&detail_ids, flags, &adjacency),
        );
        Ok(Value::Object(out).to_string())
    }

    fn get_entity(&self, entity: &EntityRef, flags: &FlagSet) -> Result<String, SdkError> {
        let state = self.read()?;
        let id = state.resolve(entity)?;
        Ok(state.entity_json(id, flags, &state.adjacency()).to_string())
    }

    fn get_record(&self, key: &RecordKey, _flags: &FlagSet) -> Result<String, SdkError> {
        let state = self.read()?;
        state.require_source(key.data_source())?;
        let record = state
            .records
            .get(key)
            .ok_or_else(|| SdkError::not_found(format!("record {key}")))?;
        Ok(json!({
            "DATA_SOURCE": key.data_source(),
            "RECORD_ID": key.record_id(),
            "JSON_DATA": record.attributes,
        })
        .to_string())
    }

    fn search_by_attributes(
        &self,
        attributes_json: &str,
        flags: &FlagSet,
    ) -> Result<String, SdkError> {
        let criteria = parse_object(attributes_json)?;
        if criteria.is_empty() {
            return Err(SdkError::bad_input("search requires at least one attribute"));
        }
        let state = self.read()?;
        let adjacency = state.adjacency();
        let match_key: String = criteria.keys().map(|k| format!("+{k}")).collect();

        let hits: Vec<EntityId> = state
            .members
            .iter()
            .filter(|(_, keys)| {
                keys.iter()
                    .filter_map(|k| state.records.get(k))
                    .any(|r| r.matches(&criteria))
            })
            .map(|(id, _)| *id)
            .collect();

        let results: Vec<Value> = hits
            .iter()
            .map(|id| {
                json!({
                    "MATCH_INFO": { "MATCH_LEVEL_CODE": "MATCH", "MATCH_KEY": match_key },
                    "ENTITY": state.entity_json(*id, flags, &adjacency),
                })
            })
            .collect();

        let mut out = Map::new();
        out.insert("RESOLVED_ENTITIES".into(), Value::Array(results));
        if flags.contains(SZ_SEARCH_INCLUDE_STATS) {
            out.insert(
                "SEARCH_STATISTICS".into(),
                json!({
                    "CANDIDATES_CONSIDERED": state.members.len(),
                    "CANDIDATES_RETURNED": hits.len(),
                }),
            );
        }
        Ok(Value::Object(out).to_string())
    }

    fn why_entities(
        &self,
        first: EntityId,
        second: EntityId,
        flags: &FlagSet,
    ) -> Result<String, SdkError> {
        let state = self.read()?;
        let a = state.resolve(&EntityRef::Entity(first))?;
        let b = state.resolve(&EntityRef::Entity(second))?;
        let adjacency = state.adjacency();
        let (why_key, rule) = if a == b {
            (RESOLVED_MATCH_KEY, "SAME_ENTITY_KEY")
        } else if adjacency.get(&a).is_some_and(|n| n.contains(&b)) {
            (DISCLOSED_MATCH_KEY, "DISCLOSED")
        } else {
            ("", "NONE")
        };
        let ids = BTreeSet::from([a, b]);
        Ok(json!({
            "WHY_RESULTS": [{
                "ENTITY_ID": a,
                "ENTITY_ID_2": b,
                "MATCH_INFO": { "WHY_KEY": why_key, "WHY_ERRULE_CODE": rule },
            }],
            "ENTITIES": state.details_json(&ids, flags, &adjacency),
        })
        .to_string())
    }

    fn how_entity(&self, entity: EntityId, _flags: &FlagSet) -> Result<String, SdkError> {
        let state = self.read()?;
        let id = state.resolve(&EntityRef::Entity(entity))?;
        let members: Vec<&RecordKey> = state.members.get(&id).into_iter().flatten().collect();
        let record_json = |key: &RecordKey| {
            json!({ "DATA_SOURCE": key.data_source(), "RECORD_ID": key.record_id() })
        };

        let steps: Vec<Value> = members
            .iter()
            .skip(1)
            .enumerate()
            .map(|(n, key)| {
                json!({
                    "STEP": n + 1,
                    "INBOUND_RECORD": record_json(*key),
                    "RESULT_VIRTUAL_ENTITY_ID": format!("V{id}"),
                    "MATCH_INFO": { "MATCH_KEY": RESOLVED_MATCH_KEY },
                })
            })
            .collect();
        let member_records: Vec<Value> = members.iter().map(|k| record_json(*k)).collect();

        Ok(json!({
            "HOW_RESULTS": {
                "RESOLUTION_STEPS": steps,
                "FINAL_STATE": {
                    "VIRTUAL_ENTITIES": [{
                        "VIRTUAL_ENTITY_ID": format!("V{id}"),
                        "MEMBER_RECORDS": member_records,
                    }],
                },
            },
        })
        .to_string())
    }

    fn export_json_entity_report(&self, flags: &FlagSet) -> Result<ExportHandle, SdkError> {
        let mut state = self.write()?;
        let mut multi = flags.contains(SZ_EXPORT_INCLUDE_MULTI_RECORD_ENTITIES);
        let mut single = flags.contains(SZ_EXPORT_INCLUDE_SINGLE_RECORD_ENTITIES);
        if !multi && !single {
            multi = true;
            single = true;
        }

        let adjacency = state.adjacency();
        let lines: VecDeque<String> = state
            .members
            .iter()
            .filter(|(_, keys)| if keys.len() > 1 { multi } else { single })
            .map(|(id, _)| state.entity_json(*id, flags, &adjacency).to_string())
            .collect();

        let raw = state.next_export;
        state.next_export += 1;
        state.exports.insert(raw, lines);
        Ok(ExportHandle::new(raw))
    }

    fn fetch_next(&self, handle: ExportHandle) -> Result<Option<String>, SdkError> {
        let mut state = self.write()?;
        let queue = state
            .exports
            .get_mut(&handle.get())
            .ok_or_else(|| SdkError::not_found(format!("{handle}")))?;
        Ok(queue.pop_front())
    }

    fn close_export(&self, handle: ExportHandle) -> Result<(), SdkError> {
        let mut state = self.write()?;
        state
            .exports
            .remove(&handle.get())
            .map(|_| ())
            .ok_or_else(|| SdkError::not_found(format!("{handle}")))
    }

    fn default_config_id(&self) -> Result<i64, SdkError> {
        Ok(self.read()?.default_config)
    }

    fn replace_default_config_id(&self, current: i64, replacement: i64) -> Result<(), SdkError> {
        let mut state = self.write()?;
        if state.default_config != current {
            return Err(SdkError::ReplaceConflict {
                expected: current,
                current: state.default_config,
            });
        }
        if !state.configs.contains(&replacement) {
            return Err(SdkError::not_found(format!("configuration {replacement}")));
        }
        state.default_config = replacement;
        Ok(())
    }

    fn destroy(&self) -> Result<(), SdkError> {
        let mut state = self.write()?;
        let open = state.exports.len();
        *state = FixtureState {
            destroyed: true,
            ..FixtureState::default()
        };
        tracing::info!(open_exports = open, "fixture environment destroyed");
        Ok(())
    }
}

impl FixtureLoader for InMemoryFixture {
    fn configure_data_sources(&self, codes: &[&str]) -> Result<(), SdkError> {
        let mut state = self.write()?;
        for code in codes {
            let code = normalize_data_source(code);
            if code.is_empty() {
                return Err(SdkError::bad_input("data source code is empty"));
            }
            state.data_sources.insert(code);
        }
        let config = state.configs.iter().next_back().copied().unwrap_or(0) + 1;
        state.configs.insert(config);
        state.default_config = config;
        tracing::debug!(config, sources = state.data_sources.len(), "data sources configured");
        Ok(())
    }

    fn load_records(
        &self,
        data_source: &str,
        path: &Path,
        encoding: &str,
    ) -> Result<BTreeMap<RecordKey, String>, SdkError> {
        check_encoding(encoding)?;
        let code = self.read()?.require_source(data_source)?;
        let text = fs::read_to_string(path)
            .map_err(|e| SdkError::bad_input(format!("cannot read {}: {e}", path.display())))?;

        let mut parsed = Vec::new();
        let mut loaded = BTreeMap::new();
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let record = FixtureRecord::parse_line(&code, line)?;
            loaded.insert(record.key.clone(), line.to_string());
            parsed.push(record);
        }

        let mut state = self.write()?;
        for record in parsed {
            state.insert(record);
        }
        let redone = state.drain_redo();
        tracing::info!(
            data_source = %code,
            path = %path.display(),
            records = loaded.len(),
            redone,
            "fixture records loaded"
        );
        Ok(loaded)
    }

    fn drain_redo(&self) -> Result<usize, SdkError> {
        Ok(self.write()?.drain_redo())
    }

    fn entity_lookup(&self, keys: &[RecordKey]) -> Result<RecordEntityLookup, SdkError> {
        let state = self.read()?;
        keys.iter()
            .map(|key| {
                state
                    .entity_of
                    .get(key)
                    .map(|id| (key.clone(), *id))
                    .ok_or_else(|| SdkError::not_found(format!("record {key}")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SdkErrorKind;
    use crate::flags::find_default_flags;
    use crate::response::{NetworkResponse, PathResponse};

    fn fixture() -> InMemoryFixture {
        let fx = InMemoryFixture::new();
        fx.configure_data_sources(&["TEST"]).unwrap();
        fx
    }

    fn key(id: &str) -> RecordKey {
        RecordKey::new("TEST", id)
    }

    fn chain_fixture() -> InMemoryFixture {
        let fx = fixture();
        fx.add_record(&key("A"), r#"{"REL_ANCHOR_DOMAIN":"T","REL_ANCHOR_KEY":"A"}"#)
            .unwrap();
        fx.add_record(
            &key("B"),
            r#"{"RELATIONSHIPS":[
                {"REL_ANCHOR_DOMAIN":"T","REL_ANCHOR_KEY":"B"},
                {"REL_POINTER_DOMAIN":"T","REL_POINTER_KEY":"A"}]}"#,
        )
        .unwrap();
        fx.add_record(&key("C"), r#"{"REL_POINTER_DOMAIN":"T","REL_POINTER_KEY":"B"}"#)
            .unwrap();
        fx
    }

    #[test]
    fn test_entity_key_merges_records() {
        let fx = fixture();
        fx.add_record(&key("1"), r#"{"ENTITY_KEY":"X"}"#).unwrap();
        fx.add_record(&key("2"), r#"{"ENTITY_KEY":"X"}"#).unwrap();
        fx.add_record(&key("3"), r"{}").unwrap();
        let lookup = fx.entity_lookup(&[key("1"), key("2"), key("3")]).unwrap();
        assert_eq!(lookup.entity_id_of(&key("1")), lookup.entity_id_of(&key("2")));
        assert_ne!(lookup.entity_id_of(&key("1")), lookup.entity_id_of(&key("3")));
        assert_eq!(fx.entity_count().unwrap(), 2);
    }

    #[test]
    fn test_delete_record_dissolves_empty_entity() {
        let fx = fixture();
        fx.add_record(&key("1"), r"{}").unwrap();
        fx.delete_record(&key("1")).unwrap();
        fx.delete_record(&key("1")).unwrap();
        assert_eq!(fx.entity_count().unwrap(), 0);
        let err = fx.entity_lookup(&[key("1")]).unwrap_err();
        assert_eq!(err.kind(), SdkErrorKind::NotFound);
    }

    #[test]
    fn test_pointer_before_anchor_waits_for_redo() {
        let fx = fixture();
        fx.add_record(&key("P"), r#"{"REL_POINTER_DOMAIN":"T","REL_POINTER_KEY":"A"}"#)
            .unwrap();
        fx.add_record(&key("A"), r#"{"REL_ANCHOR_DOMAIN":"T","REL_ANCHOR_KEY":"A"}"#)
            .unwrap();
        assert_eq!(fx.pending_redo().unwrap(), 1);

        let request = FindPathRequest::between(key("P"), key("A"), 1);
        let before = PathResponse::parse(&fx.find_path(&request, &FlagSet::none()).unwrap()).unwrap();
        assert!(before.chain().is_empty());

        assert_eq!(fx.drain_redo().unwrap(), 1);
        assert_eq!(fx.drain_redo().unwrap(), 0);
        let after = PathResponse::parse(&fx.find_path(&request, &FlagSet::none()).unwrap()).unwrap();
        assert_eq!(after.chain().len(), 2);
    }

    #[test]
    fn test_find_path_output_shape() {
        let fx = chain_fixture();
        let request = FindPathRequest::between(key("A"), key("C"), 2);
        let flags = find_default_flags().with(SZ_FIND_PATH_INCLUDE_MATCHING_INFO);
        let json = fx.find_path(&request, &flags).unwrap();
        let response = PathResponse::parse(&json).unwrap();
        assert_eq!(response.chain().len(), 3);
        assert_eq!(response.detail_ids().len(), 3);
        assert!(response.path_links.is_some());

        let plain = PathResponse::parse(&fx.find_path(&request, &FlagSet::none()).unwrap()).unwrap();
        assert!(plain.path_links.is_none());
    }

    #[test]
    fn test_find_path_strict_avoid_flag() {
        let fx = chain_fixture();
        let mut request = FindPathRequest::between(key("A"), key("C"), 2);
        request.avoid.push(key("B").into());

        let soft = PathResponse::parse(&fx.find_path(&request, &FlagSet::none()).unwrap()).unwrap();
        assert_eq!(soft.chain().len(), 3);

        let strict_flags = FlagSet::none().with(SZ_FIND_PATH_STRICT_AVOID);
        let strict = PathResponse::parse(&fx.find_path(&request, &strict_flags).unwrap()).unwrap();
        assert!(strict.chain().is_empty());
        assert_eq!(strict.detail_ids().len(), 2);
    }

    #[test]
    fn test_find_network_build_out() {
        let fx = chain_fixture();
        let request = FindNetworkRequest {
            entities: vec![key("A").into()],
            max_degrees: 1,
            build_out_degrees: 1,
            build_out_max_entities: 1000,
        };
        let json = fx.find_network(&request, &FlagSet::none()).unwrap();
        let response = NetworkResponse::parse(&json).unwrap();
        assert!(response.entity_paths.is_empty());
        assert_eq!(response.detail_ids().len(), 2);

        let none = FindNetworkRequest {
            entities: Vec::new(),
            ..request
        };
        let err = fx.find_network(&none, &FlagSet::none()).unwrap_err();
        assert_eq!(err.kind(), SdkErrorKind::BadInput);
    }

    #[test]
    fn test_unknown_data_source_and_record() {
        let fx = fixture();
        let err = fx
            .add_record(&RecordKey::new("NOPE", "1"), r"{}")
            .unwrap_err();
        assert_eq!(err.kind(), SdkErrorKind::UnknownDataSource);
        let err = fx.get_record(&key("missing"), &FlagSet::none()).unwrap_err();
        assert_eq!(err.kind(), SdkErrorKind::NotFound);
        let err = fx.add_record(&key("1"), "{").unwrap_err();
        assert_eq!(err.kind(), SdkErrorKind::BadInput);
    }

    #[test]
    fn test_export_handles() {
        let fx = fixture();
        fx.add_record(&key("1"), r#"{"ENTITY_KEY":"X"}"#).unwrap();
        fx.add_record(&key("2"), r#"{"ENTITY_KEY":"X"}"#).unwrap();
        fx.add_record(&key("3"), r"{}").unwrap();

        let multi = FlagSet::none().with(SZ_EXPORT_INCLUDE_MULTI_RECORD_ENTITIES);
        let handle = fx.export_json_entity_report(&multi).unwrap();
        assert!(fx.fetch_next(handle).unwrap().is_some());
        assert!(fx.fetch_next(handle).unwrap().is_none());
        fx.close_export(handle).unwrap();
        assert_eq!(
            fx.close_export(handle).unwrap_err().kind(),
            SdkErrorKind::NotFound
        );
        assert_eq!(fx.fetch_next(handle).unwrap_err().kind(), SdkErrorKind::NotFound);
    }

    #[test]
    fn test_replace_default_config_conflict() {
        let fx = fixture();
        let current = fx.default_config_id().unwrap();
        fx.configure_data_sources(&["OTHER"]).unwrap();
        let newer = fx.default_config_id().unwrap();
        assert_ne!(current, newer);

        let err = fx.replace_default_config_id(current, current).unwrap_err();
        assert_eq!(err.kind(), SdkErrorKind::ReplaceConflict);
        fx.replace_default_config_id(newer, current).unwrap();
        assert_eq!(fx.default_config_id().unwrap(), current);
    }

    #[test]
    fn test_destroy_poisons_every_call() {
        let fx = fixture();
        fx.destroy().unwrap();
        assert_eq!(
            fx.default_config_id().unwrap_err().kind(),
            SdkErrorKind::EnvironmentDestroyed
        );
        assert_eq!(fx.destroy().unwrap_err().kind(), SdkErrorKind::EnvironmentDestroyed);
    }

    #[test]
    fn test_why_and_how() {
        let fx = chain_fixture();
        fx.add_record(&key("A2"), r"{}").unwrap();
        let lookup = fx.entity_lookup(&[key("A"), key("B")]).unwrap();
        let a = lookup.require_entity_id(&key("A")).unwrap();
        let b = lookup.require_entity_id(&key("B")).unwrap();

        let why: Value = serde_json::from_str(&fx.why_entities(a, b, &FlagSet::none()).unwrap()).unwrap();
        assert_eq!(why["WHY_RESULTS"][0]["MATCH_INFO"]["WHY_KEY"], DISCLOSED_MATCH_KEY);

        let how: Value = serde_json::from_str(&fx.how_entity(a, &FlagSet::none()).unwrap()).unwrap();
        assert_eq!(how["HOW_RESULTS"]["RESOLUTION_STEPS"].as_array().map(Vec::len), Some(0));

        let err = fx.how_entity(EntityId::new(999), &FlagSet::none()).unwrap_err();
        assert_eq!(err.kind(), SdkErrorKind::NotFound);
    }

    #[test]
    fn test_search_by_attributes() {
        let fx = fixture();
        fx.add_record(&key("1"), r#"{"NAME_LAST":"Smith"}"#).unwrap();
        fx.add_record(&key("2"), r#"{"NAME_LAST":"Jones"}"#).unwrap();
        let flags = FlagSet::none().with(SZ_SEARCH_INCLUDE_STATS);
        let out: Value =
            serde_json::from_str(&fx.search_by_attributes(r#"{"NAME_LAST":"smith"}"#, &flags).unwrap())
                .unwrap();
        assert_eq!(out["RESOLVED_ENTITIES"].as_array().map(Vec::len), Some(1));
        assert_eq!(out["SEARCH_STATISTICS"]["CANDIDATES_RETURNED"], 1);

        let err = fx.search_by_attributes("{}", &flags).unwrap_err();
        assert_eq!(err.kind(), SdkErrorKind::BadInput);
    }

    #[test]
    fn test_load_records_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.jsonl");
        fs::write(
            &path,
            "{\"RECORD_ID\":\"1\",\"ENTITY_KEY\":\"K\"}\n\n{\"RECORD_ID\":\"2\",\"ENTITY_KEY\":\"K\"}\n",
        )
        .unwrap();

        let fx = fixture();
        let loaded = fx.load_records("test", &path, "UTF-8").unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(fx.entity_count().unwrap(), 1);

        let err = fx.load_records("test", &path, "latin1").unwrap_err();
        assert_eq!(err.kind(), SdkErrorKind::BadInput);
        let err = fx.load_records("nope", &path, "utf8").unwrap_err();
        assert_eq!(err.kind(), SdkErrorKind::UnknownDataSource);
    }
}
