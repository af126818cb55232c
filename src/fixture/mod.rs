//! In-memory reference engine.
//!
//! [`InMemoryFixture`] implements both [`ResolutionSdk`](crate::sdk::ResolutionSdk)
//! and [`FixtureLoader`](crate::sdk::FixtureLoader) over plain maps. It does
//! no fuzzy matching: records resolve together only when they declare the
//! same `ENTITY_KEY`, and entities relate only through disclosed
//! `REL_ANCHOR_*` / `REL_POINTER_*` attributes. That is enough to exercise
//! every oracle path deterministically.
//!
//! ## Record attributes
//!
//! | attribute | meaning |
//! |-----------|---------|
//! | `RECORD_ID` | required record identifier |
//! | `DATA_SOURCE` | optional; must match the loading data source |
//! | `ENTITY_KEY` | records sharing a key resolve to one entity |
//! | `REL_ANCHOR_DOMAIN` + `REL_ANCHOR_KEY` | this record is a relationship anchor |
//! | `REL_POINTER_DOMAIN` + `REL_POINTER_KEY` | this record points at an anchor |
//! | `RELATIONSHIPS` | array of objects carrying any of the `REL_*` pairs |
//!
//! Pointers whose anchor is not loaded yet wait in a redo queue until
//! [`FixtureLoader::drain_redo`](crate::sdk::FixtureLoader::drain_redo)
//! finds the anchor.

mod graph;
mod memory;
mod record;

pub use memory::InMemoryFixture;
pub use record::{AnchorRef, FixtureRecord};
