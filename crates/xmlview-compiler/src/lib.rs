//! xmlview compiler: turns transform programs into executable form.
//!
//! Two program kinds are supported:
//! - `stylesheet` - structural stylesheets (an XSLT 1.0 subset)
//! - `rules` - rule schemas (an ISO Schematron subset)
//!
//! Both share `diagnostics` for error reporting and `ir` for the expression
//! table the VM evaluates.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

mod builder;
pub mod diagnostics;
pub mod ir;
pub mod rules;
pub mod stylesheet;

/// Result type for compile passes that produce both output and diagnostics.
///
/// Warnings travel with the output. Any error fails the pass and the
/// diagnostics move into the outer `Error`.
pub type PassResult<T> = std::result::Result<(T, Diagnostics), Error>;

pub use diagnostics::{Diagnostics, DiagnosticsPrinter, Severity, Span};
pub use ir::{ExprId, ExpressionTable};
pub use rules::{RuleSchema, compile_rules};
pub use stylesheet::{Stylesheet, check_stylesheet, compile_stylesheet};

/// Errors that can occur while compiling a program.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("stylesheet compilation failed with {} errors", .0.error_count())]
    Stylesheet(Diagnostics),

    #[error("rule schema compilation failed with {} errors", .0.error_count())]
    RuleSchema(Diagnostics),
}

impl Error {
    pub fn diagnostics(&self) -> &Diagnostics {
        match self {
            Error::Stylesheet(d) | Error::RuleSchema(d) => d,
        }
    }

    pub fn into_diagnostics(self) -> Diagnostics {
        match self {
            Error::Stylesheet(d) | Error::RuleSchema(d) => d,
        }
    }
}

/// Result type for compile operations.
pub type Result<T> = std::result::Result<T, Error>;
