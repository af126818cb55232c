//! Shared fixture for integration tests.
//!
//! Relationship graph (entity per record unless noted):
//!
//! ```text
//! ABC123 ── MNO345 ── DEF890(+VIP XYZ234)
//!    │                   │
//! GHI456 ─────────── PQR678          JKL777 (isolated)
//! ```

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use er_oracle::{FixtureFile, InMemoryFixture, OracleConfig, OracleDriver, RecordKey};
use tempfile::TempDir;

pub const PASSENGERS: &str = r#"{"RECORD_ID":"ABC123","NAME_FULL":"Joe Schmoe","RELATIONSHIPS":[{"REL_POINTER_DOMAIN":"VIP","REL_POINTER_KEY":"MNO345"},{"REL_POINTER_DOMAIN":"PAX","REL_POINTER_KEY":"GHI456"}]}
{"RECORD_ID":"GHI456","NAME_FULL":"Sam Sly","REL_ANCHOR_DOMAIN":"PAX","REL_ANCHOR_KEY":"GHI456"}
{"RECORD_ID":"JKL777","NAME_FULL":"Lone Wolf"}
"#;

pub const EMPLOYEES: &str = r#"{"RECORD_ID":"DEF890","NAME_FULL":"Jane Doe","ENTITY_KEY":"JANE","RELATIONSHIPS":[{"REL_POINTER_DOMAIN":"VIP","REL_POINTER_KEY":"MNO345"},{"REL_POINTER_DOMAIN":"EMP","REL_POINTER_KEY":"PQR678"}]}
{"RECORD_ID":"PQR678","NAME_FULL":"Pat Quinn","RELATIONSHIPS":[{"REL_ANCHOR_DOMAIN":"EMP","REL_ANCHOR_KEY":"PQR678"},{"REL_POINTER_DOMAIN":"PAX","REL_POINTER_KEY":"GHI456"}]}
"#;

pub const VIPS: &str = r#"{"RECORD_ID":"MNO345","NAME_FULL":"Joseph Schmoe","REL_ANCHOR_DOMAIN":"VIP","REL_ANCHOR_KEY":"MNO345"}
{"RECORD_ID":"XYZ234","NAME_FULL":"Jane M Doe","ENTITY_KEY":"JANE"}
"#;

pub const DATA_SOURCES: [&str; 3] = ["PASSENGER", "EMPLOYEE", "VIP"];

pub fn passenger(id: &str) -> RecordKey {
    RecordKey::new("PASSENGER", id)
}

pub fn employee(id: &str) -> RecordKey {
    RecordKey::new("EMPLOYEE", id)
}

pub fn vip(id: &str) -> RecordKey {
    RecordKey::new("VIP", id)
}

/// Writes the fixture files and returns them with the directory guard.
pub fn fixture_files() -> (TempDir, Vec<FixtureFile>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let files = [
        ("PASSENGER", "passengers.jsonl", PASSENGERS),
        ("EMPLOYEE", "employees.jsonl", EMPLOYEES),
        ("VIP", "vips.jsonl", VIPS),
    ]
    .into_iter()
    .map(|(ds, name, body)| {
        let path = dir.path().join(name);
        write(&path, body);
        FixtureFile::utf8(ds, path)
    })
    .collect();
    (dir, files)
}

fn write(path: &Path, body: &str) {
    fs::write(path, body).expect("write fixture file");
}

/// A driver over a freshly loaded fixture.
pub fn loaded_driver(engine: &InMemoryFixture, config: OracleConfig) -> OracleDriver<'_, InMemoryFixture> {
    let (_dir, files) = fixture_files();
    let mut driver = OracleDriver::new(engine, config);
    driver
        .load_fixture(&DATA_SOURCES, &files)
        .expect("fixture loads");
    driver
}
