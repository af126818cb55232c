//! Record and entity identifiers.
//!
//! A [`RecordKey`] is the stable, human-assigned identity of a fixture record.
//! An [`EntityId`] is whatever the engine assigned at resolution time and is
//! only meaningful within one fixture-load session.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Engine-assigned entity identifier.
///
/// Not stable across re-resolution. Ordering is numeric, which is what the
/// canonical pair key relies on.
///
/// # Examples
///
/// ```
/// use er_oracle::EntityId;
///
/// assert!(EntityId::new(3) < EntityId::new(12));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(i64);

impl EntityId {
    /// Wraps a raw engine identifier.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw engine identifier.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for EntityId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl From<EntityId> for i64 {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// Identity of a single input record: `(data source code, record id)`.
///
/// Both parts are normalized on construction: the data source code is trimmed
/// and upper-cased, the record id is trimmed. Two keys that differ only in
/// that respect are the same key.
///
/// # Examples
///
/// ```
/// use er_oracle::RecordKey;
///
/// let a = RecordKey::new(" passenger", "ABC123 ");
/// let b = RecordKey::new("PASSENGER", "ABC123");
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), "PASSENGER:ABC123");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "RawRecordKey", into = "RawRecordKey")]
pub struct RecordKey {
    data_source: String,
    record_id: String,
}

impl RecordKey {
    /// Creates a normalized record key.
    #[must_use]
    pub fn new(data_source: impl AsRef<str>, record_id: impl AsRef<str>) -> Self {
        Self {
            data_source: normalize_data_source(data_source.as_ref()),
            record_id: record_id.as_ref().trim().to_string(),
        }
    }

    /// The normalized data source code.
    #[must_use]
    pub fn data_source(&self) -> &str {
        &self.data_source
    }

    /// The normalized record id.
    #[must_use]
    pub fn record_id(&self) -> &str {
        &self.record_id
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.data_source, self.record_id)
    }
}

/// Normalizes a data source code the way record keys store it.
#[must_use]
pub fn normalize_data_source(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Wire shape used by the engine's JSON (`DATA_SOURCE` / `RECORD_ID`).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawRecordKey {
    #[serde(rename = "DATA_SOURCE")]
    data_source: String,
    #[serde(rename = "RECORD_ID")]
    record_id: String,
}

impl From<RawRecordKey> for RecordKey {
    fn from(raw: RawRecordKey) -> Self {
        Self::new(raw.data_source, raw.record_id)
    }
}

impl From<RecordKey> for RawRecordKey {
    fn from(key: RecordKey) -> Self {
        Self {
            data_source: key.data_source,
            record_id: key.record_id,
        }
    }
}

/// How a request names an entity: directly, or through one of its records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    /// By engine-assigned entity id.
    Entity(EntityId),
    /// By the record that resolves to the entity.
    Record(RecordKey),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity(id) => write!(f, "entity:{id}"),
            Self::Record(key) => write!(f, "record:{key}"),
        }
    }
}

impl From<EntityId> for EntityRef {
    fn from(id: EntityId) -> Self {
        Self::Entity(id)
    }
}

impl From<RecordKey> for EntityRef {
    fn from(key: RecordKey) -> Self {
        Self::Record(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_key_normalizes() {
        let key = RecordKey::new("  employee ", "\tDEF890 ");
        assert_eq!(key.data_source(), "EMPLOYEE");
        assert_eq!(key.record_id(), "DEF890");
    }

    #[test]
    fn test_record_id_keeps_case() {
        let lower = RecordKey::new("VIP", "abc");
        let upper = RecordKey::new("VIP", "ABC");
        assert_ne!(lower, upper);
    }

    #[test]
    fn test_record_key_ordering_is_structural() {
        let a = RecordKey::new("EMPLOYEE", "Z");
        let b = RecordKey::new("PASSENGER", "A");
        assert!(a < b);
    }

    #[test]
    fn test_record_key_serde_uses_engine_field_names() {
        let key: RecordKey =
            serde_json::from_str(r#"{"DATA_SOURCE":"passenger","RECORD_ID":"ABC123"}"#).unwrap();
        assert_eq!(key, RecordKey::new("PASSENGER", "ABC123"));
        let json = serde_json::to_string(&key).unwrap();
        assert!(json.contains("\"DATA_SOURCE\":\"PASSENGER\""));
    }

    #[test]
    fn test_entity_ref_display() {
        assert_eq!(EntityRef::Entity(EntityId::new(7)).to_string(), "entity:7");
        assert_eq!(
            EntityRef::Record(RecordKey::new("VIP", "1")).to_string(),
            "record:VIP:1"
        );
    }
}
