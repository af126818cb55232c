//! Contracts of the external collaborators the oracle drives.
//!
//! The resolution engine and the fixture loader are opaque. These traits are
//! the narrow surface the oracle consumes: every engine call returns JSON
//! text or a typed [`SdkError`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SdkError;
use crate::flags::FlagSet;
use crate::lookup::RecordEntityLookup;
use crate::record::{EntityId, EntityRef, RecordKey};

/// Opaque handle to an in-progress bulk export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExportHandle(i64);

impl ExportHandle {
    /// Wraps a raw handle value.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// The raw handle value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ExportHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "export#{}", self.0)
    }
}

/// Inputs of a find-path call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FindPathRequest {
    /// First endpoint.
    pub start: EntityRef,
    /// Second endpoint.
    pub end: EntityRef,
    /// Maximum number of relationship hops.
    pub max_degrees: u32,
    /// Entities the path should route around.
    pub avoid: Vec<EntityRef>,
    /// Data source codes an intermediate entity must carry.
    pub required_sources: BTreeSet<String>,
}

impl FindPathRequest {
    /// A plain request with no avoidance and no required sources.
    #[must_use]
    pub fn between(start: impl Into<EntityRef>, end: impl Into<EntityRef>, max_degrees: u32) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            max_degrees,
            avoid: Vec::new(),
            required_sources: BTreeSet::new(),
        }
    }
}

/// Inputs of a find-network call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FindNetworkRequest {
    /// Entities to connect.
    pub entities: Vec<EntityRef>,
    /// Maximum hops between any two requested entities.
    pub max_degrees: u32,
    /// Hops to expand outward from the requested entities.
    pub build_out_degrees: u32,
    /// Cap on the total number of returned entities.
    pub build_out_max_entities: usize,
}

/// The resolution engine's operation surface.
pub trait ResolutionSdk {
    /// Adds (or replaces) a record from its JSON attributes.
    fn add_record(&self, key: &RecordKey, record_json: &str) -> Result<(), SdkError>;

    /// Deletes a record; deleting an unknown record is a no-op.
    fn delete_record(&self, key: &RecordKey) -> Result<(), SdkError>;

    /// Finds a path between two entities.
    fn find_path(&self, request: &FindPathRequest, flags: &FlagSet) -> Result<String, SdkError>;

    /// Finds paths among a set of entities, with optional build-out.
    fn find_network(
        &self,
        request: &FindNetworkRequest,
        flags: &FlagSet,
    ) -> Result<String, SdkError>;

    /// Retrieves one resolved entity.
    fn get_entity(&self, entity: &EntityRef, flags: &FlagSet) -> Result<String, SdkError>;

    /// Retrieves one record as loaded.
    fn get_record(&self, key: &RecordKey, flags: &FlagSet) -> Result<String, SdkError>;

    /// Searches entities by JSON attributes.
    fn search_by_attributes(&self, attributes_json: &str, flags: &FlagSet)
        -> Result<String, SdkError>;

    /// Explains why two entities did or did not resolve together.
    fn why_entities(
        &self,
        first: EntityId,
        second: EntityId,
        flags: &FlagSet,
    ) -> Result<String, SdkError>;

    /// Explains how an entity came to be resolved.
    fn how_entity(&self, entity: EntityId, flags: &FlagSet) -> Result<String, SdkError>;

    /// Starts a JSON entity export.
    fn export_json_entity_report(&self, flags: &FlagSet) -> Result<ExportHandle, SdkError>;

    /// Fetches the next export line; `None` once exhausted.
    fn fetch_next(&self, handle: ExportHandle) -> Result<Option<String>, SdkError>;

    /// Releases an export handle.
    ///
    /// Closing an unknown or already-closed handle fails with
    /// [`SdkError::NotFound`].
    fn close_export(&self, handle: ExportHandle) -> Result<(), SdkError>;

    /// Id of the active default configuration.
    fn default_config_id(&self) -> Result<i64, SdkError>;

    /// Swaps the default configuration if `current` is still the active one.
    fn replace_default_config_id(&self, current: i64, replacement: i64) -> Result<(), SdkError>;

    /// Tears the environment down; every later call fails with
    /// [`SdkError::EnvironmentDestroyed`].
    fn destroy(&self) -> Result<(), SdkError>;
}

/// Loads fixture records into the engine and snapshots their resolution.
pub trait FixtureLoader {
    /// Registers data source codes in the active configuration.
    fn configure_data_sources(&self, codes: &[&str]) -> Result<(), SdkError>;

    /// Loads a JSON-Lines file of records for `data_source` and drains
    /// pending redo work, returning each loaded record's JSON by key.
    fn load_records(
        &self,
        data_source: &str,
        path: &Path,
        encoding: &str,
    ) -> Result<BTreeMap<RecordKey, String>, SdkError>;

    /// Processes pending redo work; returns how many items were processed.
    fn drain_redo(&self) -> Result<usize, SdkError>;

    /// Snapshots the entity each of `keys` currently resolves to.
    fn entity_lookup(&self, keys: &[RecordKey]) -> Result<RecordEntityLookup, SdkError>;
}
