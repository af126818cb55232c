//! Engine flags and flag sets.
//!
//! Flags are opaque to the oracle: a [`FlagSet`] is passed to the engine
//! unchanged, and validators only ask whether a particular named flag is a
//! member. Flag metadata comes from an explicit registration table
//! ([`FlagRegistry`]) rather than from scanning declared constants, and the
//! shared flag-set variant tables are built once per process and never
//! mutated.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// A single named engine flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Flag {
    name: &'static str,
    value: u64,
}

impl Flag {
    /// Declares a flag.
    #[must_use]
    pub const fn new(name: &'static str, value: u64) -> Self {
        Self { name, value }
    }

    /// Flag name, e.g. `SZ_FIND_PATH_STRICT_AVOID`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Bit value passed to the engine.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.value
    }
}

pub const SZ_EXPORT_INCLUDE_MULTI_RECORD_ENTITIES: Flag =
    Flag::new("SZ_EXPORT_INCLUDE_MULTI_RECORD_ENTITIES", 1 << 0);
pub const SZ_EXPORT_INCLUDE_SINGLE_RECORD_ENTITIES: Flag =
    Flag::new("SZ_EXPORT_INCLUDE_SINGLE_RECORD_ENTITIES", 1 << 5);
pub const SZ_ENTITY_INCLUDE_DISCLOSED_RELATIONS: Flag =
    Flag::new("SZ_ENTITY_INCLUDE_DISCLOSED_RELATIONS", 1 << 9);
pub const SZ_ENTITY_INCLUDE_ENTITY_NAME: Flag = Flag::new("SZ_ENTITY_INCLUDE_ENTITY_NAME", 1 << 12);
pub const SZ_ENTITY_INCLUDE_RECORD_SUMMARY: Flag =
    Flag::new("SZ_ENTITY_INCLUDE_RECORD_SUMMARY", 1 << 13);
pub const SZ_ENTITY_INCLUDE_RECORD_DATA: Flag = Flag::new("SZ_ENTITY_INCLUDE_RECORD_DATA", 1 << 14);
pub const SZ_ENTITY_INCLUDE_RECORD_MATCHING_INFO: Flag =
    Flag::new("SZ_ENTITY_INCLUDE_RECORD_MATCHING_INFO", 1 << 15);
pub const SZ_FIND_PATH_STRICT_AVOID: Flag = Flag::new("SZ_FIND_PATH_STRICT_AVOID", 1 << 25);
pub const SZ_INCLUDE_FEATURE_SCORES: Flag = Flag::new("SZ_INCLUDE_FEATURE_SCORES", 1 << 26);
pub const SZ_SEARCH_INCLUDE_STATS: Flag = Flag::new("SZ_SEARCH_INCLUDE_STATS", 1 << 27);
pub const SZ_FIND_PATH_INCLUDE_MATCHING_INFO: Flag =
    Flag::new("SZ_FIND_PATH_INCLUDE_MATCHING_INFO", 1 << 30);
pub const SZ_FIND_NETWORK_INCLUDE_MATCHING_INFO: Flag =
    Flag::new("SZ_FIND_NETWORK_INCLUDE_MATCHING_INFO", 1 << 33);
pub const SZ_INCLUDE_MATCH_KEY_DETAILS: Flag = Flag::new("SZ_INCLUDE_MATCH_KEY_DETAILS", 1 << 34);

/// Declarative table backing [`FlagRegistry::builtin`].
pub const BUILTIN_FLAGS: &[Flag] = &[
    SZ_EXPORT_INCLUDE_MULTI_RECORD_ENTITIES,
    SZ_EXPORT_INCLUDE_SINGLE_RECORD_ENTITIES,
    SZ_ENTITY_INCLUDE_DISCLOSED_RELATIONS,
    SZ_ENTITY_INCLUDE_ENTITY_NAME,
    SZ_ENTITY_INCLUDE_RECORD_SUMMARY,
    SZ_ENTITY_INCLUDE_RECORD_DATA,
    SZ_ENTITY_INCLUDE_RECORD_MATCHING_INFO,
    SZ_FIND_PATH_STRICT_AVOID,
    SZ_INCLUDE_FEATURE_SCORES,
    SZ_SEARCH_INCLUDE_STATS,
    SZ_FIND_PATH_INCLUDE_MATCHING_INFO,
    SZ_FIND_NETWORK_INCLUDE_MATCHING_INFO,
    SZ_INCLUDE_MATCH_KEY_DETAILS,
];

/// Immutable set of named flags plus their combined bit value.
///
/// The bits are always derived from the member names, so two sets with the
/// same names compare equal. Serialized as a sorted list of names and
/// resolved against [`FlagRegistry::builtin`] when read back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "Vec<String>", try_from = "Vec<String>")]
pub struct FlagSet {
    names: BTreeSet<String>,
    bits: u64,
}

impl FlagSet {
    /// The empty flag set.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Builds a flag set from declared flags.
    #[must_use]
    pub fn of(flags: &[Flag]) -> Self {
        Self {
            names: flags.iter().map(|f| f.name.to_string()).collect(),
            bits: flags.iter().fold(0, |acc, f| acc | f.value),
        }
    }

    /// Returns a copy with `flag` added.
    #[must_use]
    pub fn with(&self, flag: Flag) -> Self {
        let mut names = self.names.clone();
        names.insert(flag.name.to_string());
        Self {
            names,
            bits: self.bits | flag.value,
        }
    }

    /// Returns a copy with `flag` removed.
    #[must_use]
    pub fn without(&self, flag: Flag) -> Self {
        let mut names = self.names.clone();
        names.remove(flag.name);
        Self {
            names,
            bits: self.bits & !flag.value,
        }
    }

    /// Membership test by flag.
    #[must_use]
    pub fn contains(&self, flag: Flag) -> bool {
        self.names.contains(flag.name)
    }

    /// Membership test by name.
    #[must_use]
    pub fn contains_name(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Combined bit value passed to the engine.
    #[must_use]
    pub const fn bits(&self) -> u64 {
        self.bits
    }

    /// Member names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Returns true if no flag is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl From<FlagSet> for Vec<String> {
    fn from(set: FlagSet) -> Self {
        set.names.into_iter().collect()
    }
}

impl TryFrom<Vec<String>> for FlagSet {
    type Error = ConfigError;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        FlagRegistry::builtin().flag_set(&names)
    }
}

impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.names.is_empty() {
            return write!(f, "<none>");
        }
        let joined: Vec<&str> = self.names().collect();
        write!(f, "{}", joined.join(" | "))
    }
}

/// One entry of a declarative flag table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagEntry {
    pub name: String,
    pub value: u64,
}

/// A difference between the registry and externally supplied metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagDiscrepancy {
    /// Registered here but absent from the metadata.
    Missing { name: String },
    /// Present in the metadata but not registered here.
    Unregistered { name: String },
    /// Registered under a different value.
    ValueMismatch {
        name: String,
        registered: u64,
        reported: u64,
    },
}

impl fmt::Display for FlagDiscrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { name } => write!(f, "{name} missing from metadata"),
            Self::Unregistered { name } => write!(f, "{name} reported but not registered"),
            Self::ValueMismatch {
                name,
                registered,
                reported,
            } => write!(f, "{name}: registered {registered}, reported {reported}"),
        }
    }
}

fn flag_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^SZ_[A-Z0-9_]+$").expect("flag name pattern is valid"))
}

/// Name to value registration table for engine flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagRegistry {
    by_name: BTreeMap<String, u64>,
}

impl FlagRegistry {
    /// The process-wide registry built from [`BUILTIN_FLAGS`].
    #[must_use]
    pub fn builtin() -> &'static Self {
        static BUILTIN: OnceLock<FlagRegistry> = OnceLock::new();
        BUILTIN.get_or_init(|| Self {
            by_name: BUILTIN_FLAGS
                .iter()
                .map(|f| (f.name.to_string(), f.value))
                .collect(),
        })
    }

    /// Builds a registry from entries, rejecting malformed or duplicate names.
    pub fn from_entries(entries: Vec<FlagEntry>) -> Result<Self, ConfigError> {
        let mut by_name = BTreeMap::new();
        for entry in entries {
            if !flag_name_pattern().is_match(&entry.name) {
                return Err(ConfigError::InvalidFlagName { name: entry.name });
            }
            if by_name.insert(entry.name.clone(), entry.value).is_some() {
                return Err(ConfigError::DuplicateFlag { name: entry.name });
            }
        }
        Ok(Self { by_name })
    }

    /// Builds a registry from a JSON array of `{"name": .., "value": ..}`.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let entries: Vec<FlagEntry> =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse {
                source_name: "flag registry",
                message: e.to_string(),
            })?;
        Self::from_entries(entries)
    }

    /// Value registered for `name`.
    #[must_use]
    pub fn value_of(&self, name: &str) -> Option<u64> {
        self.by_name.get(name).copied()
    }

    /// Number of registered flags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Builds a flag set from registered names.
    pub fn flag_set<S: AsRef<str>>(&self, names: &[S]) -> Result<FlagSet, ConfigError> {
        let mut set = FlagSet::none();
        for name in names {
            let name = name.as_ref();
            let value = self
                .value_of(name)
                .ok_or_else(|| ConfigError::UnknownFlag {
                    name: name.to_string(),
                })?;
            set.names.insert(name.to_string());
            set.bits |= value;
        }
        Ok(set)
    }

    /// Compares the registry with engine-reported metadata.
    ///
    /// `metadata_json` is an object mapping flag names to values. An empty
    /// result means both sides agree.
    pub fn cross_check(&self, metadata_json: &str) -> Result<Vec<FlagDiscrepancy>, ConfigError> {
        let reported: BTreeMap<String, u64> =
            serde_json::from_str(metadata_json).map_err(|e| ConfigError::Parse {
                source_name: "flag metadata",
                message: e.to_string(),
            })?;

        let mut out = Vec::new();
        for (name, &registered) in &self.by_name {
            match reported.get(name) {
                None => out.push(FlagDiscrepancy::Missing { name: name.clone() }),
                Some(&value) if value != registered => out.push(FlagDiscrepancy::ValueMismatch {
                    name: name.clone(),
                    registered,
                    reported: value,
                }),
                Some(_) => {}
            }
        }
        for name in reported.keys() {
            if !self.by_name.contains_key(name) {
                out.push(FlagDiscrepancy::Unregistered { name: name.clone() });
            }
        }
        Ok(out)
    }
}

/// Default flags for path and network finding.
#[must_use]
pub fn find_default_flags() -> FlagSet {
    FlagSet::of(&[SZ_ENTITY_INCLUDE_ENTITY_NAME, SZ_ENTITY_INCLUDE_RECORD_SUMMARY])
}

/// Shared flag-set variants for path finding cases.
///
/// Strict avoidance is deliberately absent: whether a case is strict is part
/// of its expectation, so the matrix adds or removes that flag per case.
pub fn path_flag_variants() -> &'static [FlagSet] {
    static VARIANTS: OnceLock<Vec<FlagSet>> = OnceLock::new();
    VARIANTS.get_or_init(|| {
        let base = find_default_flags();
        vec![
            base.clone(),
            base.with(SZ_FIND_PATH_INCLUDE_MATCHING_INFO),
            FlagSet::none(),
            FlagSet::of(&[SZ_FIND_PATH_INCLUDE_MATCHING_INFO]),
            base.with(SZ_ENTITY_INCLUDE_RECORD_DATA)
                .with(SZ_FIND_PATH_INCLUDE_MATCHING_INFO),
        ]
    })
}

/// Shared flag-set variants for network finding cases.
pub fn network_flag_variants() -> &'static [FlagSet] {
    static VARIANTS: OnceLock<Vec<FlagSet>> = OnceLock::new();
    VARIANTS.get_or_init(|| {
        let base = find_default_flags();
        vec![
            base.clone(),
            base.with(SZ_FIND_NETWORK_INCLUDE_MATCHING_INFO),
            FlagSet::none(),
            FlagSet::of(&[SZ_FIND_NETWORK_INCLUDE_MATCHING_INFO]),
        ]
    })
}
