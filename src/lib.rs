//! # er-oracle - Test Oracle for Entity-Resolution SDKs
//!
//! er-oracle decides whether an entity-resolution engine's path and network
//! results are correct. It drives the engine against fixture data, then
//! checks the returned JSON structurally: the right entities, in the right
//! order, with the right metadata, and nothing extra.
//!
//! ## Core Concepts
//!
//! - **RecordKey / EntityId**: stable record identity vs. the engine's current cluster id
//! - **RecordEntityLookup**: snapshot translating records to entities after a fixture load
//! - **CanonicalPairKey**: direction-independent key for an unordered entity pair
//! - **ExpectedPathSpec / ExpectedNetworkSpec**: what a search should return, in record terms
//! - **Validators**: pure functions collecting every mismatch into one failure
//! - **OracleDriver**: expands scenario matrices and runs them case by case
//!
//! ## Usage
//!
//! ```rust,ignore
//! use er_oracle::{path_cases, ExpectedPathSpec, OracleConfig, OracleDriver, PathScenario, RecordKey};
//!
//! let mut driver = OracleDriver::new(&engine, OracleConfig::from_env()?);
//! driver.load_fixture(&["PASSENGER", "EMPLOYEE", "VIP"], &files)?;
//!
//! let spec = ExpectedPathSpec::builder(
//!         RecordKey::new("PASSENGER", "ABC123"),
//!         RecordKey::new("EMPLOYEE", "DEF890"),
//!     )
//!     .max_degrees(2)
//!     .path([
//!         RecordKey::new("PASSENGER", "ABC123"),
//!         RecordKey::new("VIP", "MNO345"),
//!         RecordKey::new("EMPLOYEE", "DEF890"),
//!     ])
//!     .build()?;
//!
//! let cases = path_cases(driver.lookup(), &[PathScenario::new("two hops", spec)])?;
//! let report = driver.run(&cases);
//! assert!(report.is_success());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Identity and lookup
pub mod canonical;
pub mod lookup;
pub mod record;

// Expectations, parameters and flags
pub mod combinatorics;
pub mod expected;
pub mod flags;

// Results and validation
pub mod response;
pub mod validate;

// Engine boundary
pub mod export;
pub mod fixture;
pub mod sdk;

// Orchestration and ambient concerns
pub mod config;
pub mod driver;
pub mod error;
pub mod logging;

// Re-export primary types at crate root for convenience
pub use canonical::CanonicalPairKey;
pub use combinatorics::{boolean_variants, generate_combinations, Circular};
pub use config::{ConfigError, OracleConfig};
pub use driver::{
    network_cases, path_cases, Expectation, FixtureFile, NetworkScenario, Operation,
    OracleDriver, PathScenario, RunReport, TestCase, Verdict,
};
pub use error::{OracleError, OracleResult, SdkError, SdkErrorKind};
pub use expected::{ExpectedNetworkSpec, ExpectedPath, ExpectedPathSpec};
pub use export::ExportGuard;
pub use fixture::InMemoryFixture;
pub use flags::{Flag, FlagRegistry, FlagSet};
pub use logging::init_logging;
pub use lookup::RecordEntityLookup;
pub use record::{EntityId, EntityRef, RecordKey};
pub use sdk::{ExportHandle, FindNetworkRequest, FindPathRequest, FixtureLoader, ResolutionSdk};
pub use validate::{validate_network, validate_path, Check, Mismatch, ValidationFailure};
