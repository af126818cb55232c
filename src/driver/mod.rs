//! Test oracle driver.
//!
//! The driver obtains a fixture lookup from the loader, expands scenarios
//! into [`TestCase`]s, invokes the operation under test, hands the result to
//! the matching validator and records a [`Verdict`] per case.

mod case;
mod matrix;
mod runner;

pub use case::{Expectation, Operation, TestCase};
pub use matrix::{
    network_cases, network_cases_with, path_cases, path_cases_with, IdentifierForm,
    NetworkScenario, PathScenario,
};
pub use runner::{CaseReport, FailureCategory, FixtureFile, OracleDriver, RunReport, Verdict};
