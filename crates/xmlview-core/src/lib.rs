#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core building blocks for xmlview.
//!
//! - [`document`]: parsed trees and owned node handles
//! - [`copy`]: deep copies between trees
//! - [`ingest`]: string and file ingestion
//! - [`query`]: XPath evaluation with namespaces and extension functions
//! - [`result`]: raw results produced by queries and extensions
//! - [`serialize`] / [`markup`]: turning nodes back into markup

mod colors;
pub mod copy;
pub mod document;
pub mod ingest;
pub mod markup;
pub mod query;
pub mod result;
pub mod serialize;

#[cfg(test)]
mod markup_tests;

pub use colors::Colors;
pub use document::{Document, NodeKind, NodeRef, ParserOptions};
pub use ingest::{IngestError, parse_file, parse_str};
pub use query::{BoundExtension, Extensions, Namespaces, QueryError, evaluate};
pub use result::{Item, RawResult};
pub use serialize::Method;
