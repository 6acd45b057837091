//! Runtime engine for applying compiled programs.
//!
//! The VM evaluates a program's expressions against a source tree and
//! builds a fresh result tree, collecting messages as diagnostics.

mod apply;
mod error;
mod eval;
mod output;
mod rules;
mod vm;

#[cfg(test)]
mod rules_tests;

pub use error::{RuntimeError, TransformError};
pub use output::TransformOutput;
pub use rules::{Finding, RuleReport, SVRL_NAMESPACE, Validation, location};
pub use vm::{FuelLimits, VM, VMBuilder};
