//! Typed views of the engine's path and network result JSON.
//!
//! Only the fields the oracle reasons about are modeled; everything else in
//! the engine's output is ignored by serde.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{OracleError, OracleResult};
use crate::record::{EntityId, RecordKey};

/// One discovered path: `ENTITY_PATHS[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityPath {
    #[serde(rename = "START_ENTITY_ID", default, skip_serializing_if = "Option::is_none")]
    pub start_entity_id: Option<EntityId>,

    #[serde(rename = "END_ENTITY_ID", default, skip_serializing_if = "Option::is_none")]
    pub end_entity_id: Option<EntityId>,

    /// Ordered entity chain; empty when no path connects the endpoints.
    #[serde(rename = "ENTITIES", default)]
    pub entities: Vec<EntityId>,
}

/// Resolved-entity detail: `ENTITIES[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDetail {
    #[serde(rename = "RESOLVED_ENTITY")]
    pub resolved_entity: ResolvedEntity,
}

/// `ENTITIES[i].RESOLVED_ENTITY`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEntity {
    #[serde(rename = "ENTITY_ID")]
    pub entity_id: EntityId,

    #[serde(rename = "RECORDS", default, skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<RecordKey>,
}

/// Result of a find-path call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathResponse {
    #[serde(rename = "ENTITY_PATHS", default)]
    pub entity_paths: Vec<EntityPath>,

    /// Relationship metadata, present only when matching info was requested.
    #[serde(rename = "ENTITY_PATH_LINKS", default, skip_serializing_if = "Option::is_none")]
    pub path_links: Option<serde_json::Value>,

    #[serde(rename = "ENTITIES", default)]
    pub entities: Vec<EntityDetail>,
}

impl PathResponse {
    /// Parses find-path output.
    pub fn parse(json: &str) -> OracleResult<Self> {
        serde_json::from_str(json).map_err(|e| OracleError::ResponseParse {
            operation: "find-path",
            message: e.to_string(),
        })
    }

    /// The entity chain of the first path, or an empty chain.
    #[must_use]
    pub fn chain(&self) -> &[EntityId] {
        self.entity_paths
            .first()
            .map(|p| p.entities.as_slice())
            .unwrap_or(&[])
    }

    /// Ids of every entity detail returned.
    #[must_use]
    pub fn detail_ids(&self) -> BTreeSet<EntityId> {
        detail_ids(&self.entities)
    }
}

/// Result of a find-network call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkResponse {
    #[serde(rename = "ENTITY_PATHS", default)]
    pub entity_paths: Vec<EntityPath>,

    /// Relationship metadata, present only when matching info was requested.
    #[serde(rename = "ENTITY_NETWORK_LINKS", default, skip_serializing_if = "Option::is_none")]
    pub network_links: Option<serde_json::Value>,

    #[serde(rename = "ENTITIES", default)]
    pub entities: Vec<EntityDetail>,
}

impl NetworkResponse {
    /// Parses find-network output.
    pub fn parse(json: &str) -> OracleResult<Self> {
        serde_json::from_str(json).map_err(|e| OracleError::ResponseParse {
            operation: "find-network",
            message: e.to_string(),
        })
    }

    /// Ids of every entity detail returned.
    #[must_use]
    pub fn detail_ids(&self) -> BTreeSet<EntityId> {
        detail_ids(&self.entities)
    }
}

fn detail_ids(details: &[EntityDetail]) -> BTreeSet<EntityId> {
    details.iter().map(|d| d.resolved_entity.entity_id).collect()
}
