#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Runtime for compiled xmlview programs.
//!
//! This crate applies stylesheets and rule schemas produced by
//! `xmlview-compiler` to parsed documents, producing result trees and
//! validation reports.

pub mod engine;

// Re-export commonly used items at crate root
pub use engine::{
    Finding, FuelLimits, RuleReport, RuntimeError, SVRL_NAMESPACE, TransformError,
    TransformOutput, VM, VMBuilder, Validation,
};
