//! Parsing of fixture record attributes.

use serde_json::{Map, Value};

use crate::error::SdkError;
use crate::record::{normalize_data_source, RecordKey};

const RECORD_ID: &str = "RECORD_ID";
const DATA_SOURCE: &str = "DATA_SOURCE";
const ENTITY_KEY: &str = "ENTITY_KEY";
const RELATIONSHIPS: &str = "RELATIONSHIPS";
const REL_ANCHOR_DOMAIN: &str = "REL_ANCHOR_DOMAIN";
const REL_ANCHOR_KEY: &str = "REL_ANCHOR_KEY";
const REL_POINTER_DOMAIN: &str = "REL_POINTER_DOMAIN";
const REL_POINTER_KEY: &str = "REL_POINTER_KEY";

/// A relationship anchor: `(domain, key)`, normalized.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AnchorRef {
    /// Relationship domain, upper-cased.
    pub domain: String,
    /// Key within the domain.
    pub key: String,
}

impl AnchorRef {
    /// Creates a normalized anchor reference.
    #[must_use]
    pub fn new(domain: &str, key: &str) -> Self {
        Self {
            domain: domain.trim().to_ascii_uppercase(),
            key: key.trim().to_string(),
        }
    }
}

/// A parsed fixture record.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureRecord {
    pub key: RecordKey,
    /// Records sharing this key resolve to one entity.
    pub entity_key: Option<String>,
    pub anchors: Vec<AnchorRef>,
    pub pointers: Vec<AnchorRef>,
    /// Every attribute as loaded, including the reserved ones.
    pub attributes: Map<String, Value>,
}

impl FixtureRecord {
    /// Parses a record of `data_source` from its JSON text, taking the
    /// record id from the JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::BadInput`] for malformed JSON, a missing
    /// `RECORD_ID`, a conflicting `DATA_SOURCE`, or a half-specified
    /// relationship.
    pub fn parse_line(data_source: &str, json: &str) -> Result<Self, SdkError> {
        let attributes = parse_object(json)?;
        let record_id = attributes
            .get(RECORD_ID)
            .and_then(scalar_text)
            .ok_or_else(|| SdkError::bad_input(format!("record is missing {RECORD_ID}")))?;
        Self::from_attributes(RecordKey::new(data_source, record_id), attributes)
    }

    /// Parses a record whose key is supplied by the caller.
    ///
    /// # Errors
    ///
    /// As [`FixtureRecord::parse_line`]; a `RECORD_ID` in the JSON that
    /// disagrees with `key` is also rejected.
    pub fn parse_keyed(key: &RecordKey, json: &str) -> Result<Self, SdkError> {
        let attributes = parse_object(json)?;
        if let Some(id) = attributes.get(RECORD_ID).and_then(scalar_text) {
            if id.trim() != key.record_id() {
                return Err(SdkError::bad_input(format!(
                    "{RECORD_ID} {id} does not match record {key}"
                )));
            }
        }
        Self::from_attributes(key.clone(), attributes)
    }

    fn from_attributes(key: RecordKey, attributes: Map<String, Value>) -> Result<Self, SdkError> {
        if let Some(ds) = attributes.get(DATA_SOURCE).and_then(scalar_text) {
            if normalize_data_source(&ds) != key.data_source() {
                return Err(SdkError::bad_input(format!(
                    "{DATA_SOURCE} {ds} does not match record {key}"
                )));
            }
        }

        let entity_key = attributes
            .get(ENTITY_KEY)
            .and_then(scalar_text)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        let mut anchors = Vec::new();
        let mut pointers = Vec::new();
        collect_relationships(&attributes, &mut anchors, &mut pointers)?;
        if let Some(rels) = attributes.get(RELATIONSHIPS) {
            let Value::Array(items) = rels else {
                return Err(SdkError::bad_input(format!("{RELATIONSHIPS} must be an array")));
            };
            for item in items {
                let Value::Object(rel) = item else {
                    return Err(SdkError::bad_input(format!(
                        "{RELATIONSHIPS} entries must be objects"
                    )));
                };
                collect_relationships(rel, &mut anchors, &mut pointers)?;
            }
        }

        Ok(Self {
            key,
            entity_key,
            anchors,
            pointers,
            attributes,
        })
    }

    /// Display name derived from common name attributes.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        for field in ["NAME_FULL", "NAME_ORG", "PRIMARY_NAME_FULL"] {
            if let Some(name) = self.attributes.get(field).and_then(scalar_text) {
                return Some(name);
            }
        }
        let parts: Vec<String> = ["NAME_FIRST", "NAME_LAST"]
            .iter()
            .filter_map(|f| self.attributes.get(*f).and_then(scalar_text))
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }

    /// Case-insensitive match of every `(name, value)` criterion.
    #[must_use]
    pub fn matches(&self, criteria: &Map<String, Value>) -> bool {
        criteria.iter().all(|(name, wanted)| {
            let Some(wanted) = scalar_text(wanted) else {
                return false;
            };
            self.attributes
                .get(name)
                .and_then(scalar_text)
                .is_some_and(|have| have.trim().eq_ignore_ascii_case(wanted.trim()))
        })
    }
}

pub(crate) fn parse_object(json: &str) -> Result<Map<String, Value>, SdkError> {
    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(SdkError::bad_input("expected a JSON object")),
        Err(e) => Err(SdkError::bad_input(format!("malformed JSON: {e}"))),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn collect_relationships(
    attrs: &Map<String, Value>,
    anchors: &mut Vec<AnchorRef>,
    pointers: &mut Vec<AnchorRef>,
) -> Result<(), SdkError> {
    if let Some(anchor) = pair(attrs, REL_ANCHOR_DOMAIN, REL_ANCHOR_KEY)? {
        anchors.push(anchor);
    }
    if let Some(pointer) = pair(attrs, REL_POINTER_DOMAIN, REL_POINTER_KEY)? {
        pointers.push(pointer);
    }
    Ok(())
}

fn pair(
    attrs: &Map<String, Value>,
    domain_field: &str,
    key_field: &str,
) -> Result<Option<AnchorRef>, SdkError> {
    let domain = attrs.get(domain_field).and_then(scalar_text);
    let key = attrs.get(key_field).and_then(scalar_text);
    match (domain, key) {
        (None, None) => Ok(None),
        (Some(domain), Some(key)) => Ok(Some(AnchorRef::new(&domain, &key))),
        _ => Err(SdkError::bad_input(format!(
            "{domain_field} and {key_field} must be given together"
        ))),
    }
}
