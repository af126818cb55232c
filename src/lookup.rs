//! Record/entity lookup snapshot.
//!
//! Built once after all fixture records for a test class have been loaded
//! and redo work has been drained. Never mutated afterwards; re-resolution
//! invalidates it, so a new snapshot must be taken instead.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{OracleError, OracleResult};
use crate::record::{EntityId, RecordKey};

static NO_RECORDS: BTreeSet<RecordKey> = BTreeSet::new();

/// Immutable bidirectional mapping between records and the entities they
/// currently resolve to.
///
/// Every record maps to exactly one entity; an entity may own several
/// records (a merged entity).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordEntityLookup {
    by_record: BTreeMap<RecordKey, EntityId>,
    by_entity: BTreeMap<EntityId, BTreeSet<RecordKey>>,
}

impl RecordEntityLookup {
    /// Builds the snapshot and derives the inverse mapping.
    #[must_use]
    pub fn build(records: BTreeMap<RecordKey, EntityId>) -> Self {
        let mut by_entity: BTreeMap<EntityId, BTreeSet<RecordKey>> = BTreeMap::new();
        for (key, id) in &records {
            by_entity.entry(*id).or_default().insert(key.clone());
        }
        Self {
            by_record: records,
            by_entity,
        }
    }

    /// The entity a record resolves to.
    #[must_use]
    pub fn entity_id_of(&self, key: &RecordKey) -> Option<EntityId> {
        self.by_record.get(key).copied()
    }

    /// Like [`Self::entity_id_of`], but an unknown key is a harness error.
    pub fn require_entity_id(&self, key: &RecordKey) -> OracleResult<EntityId> {
        self.entity_id_of(key).ok_or_else(|| OracleError::UnknownRecord { key: key.clone() })
    }

    /// Entity ids for a set of records; fails on the first unknown key.
    pub fn entity_ids_of<'a, I>(&self, keys: I) -> OracleResult<BTreeSet<EntityId>>
    where
        I: IntoIterator<Item = &'a RecordKey>,
    {
        keys.into_iter().map(|k| self.require_entity_id(k)).collect()
    }

    /// Records owned by an entity (empty when the entity is unknown).
    #[must_use]
    pub fn records_of(&self, id: EntityId) -> &BTreeSet<RecordKey> {
        self.by_entity.get(&id).unwrap_or(&NO_RECORDS)
    }

    /// Distinct data source codes among an entity's records.
    #[must_use]
    pub fn data_sources_of(&self, id: EntityId) -> BTreeSet<&str> {
        self.records_of(id).iter().map(RecordKey::data_source).collect()
    }

    /// Number of records in the snapshot.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.by_record.len()
    }

    /// Number of distinct entities in the snapshot.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.by_entity.len()
    }

    /// Iterates `(record, entity)` pairs in record order.
    pub fn iter(&self) -> impl Iterator<Item = (&RecordKey, EntityId)> {
        self.by_record.iter().map(|(k, id)| (k, *id))
    }
}

impl FromIterator<(RecordKey, EntityId)> for RecordEntityLookup {
    fn from_iter<T: IntoIterator<Item = (RecordKey, EntityId)>>(iter: T) -> Self {
        Self::build(iter.into_iter().collect())
    }
}
