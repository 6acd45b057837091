#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Typed, lazily evaluated views over XML documents.
//!
//! A [`Schema`] names a set of [`Field`]s, each backed by a query or a
//! transform program. Binding a document element to a schema yields an
//! [`Instance`]; every field evaluates on first read and stays cached.
//!
//! # Example
//!
//! ```
//! use xmlview_lib::{Field, Instance, Schema};
//!
//! let schema = Schema::builder("numbers")
//!     .field("all", Field::integers("/numbers/num"))
//!     .field("first", Field::integer("/numbers/num[1]"))
//!     .prepare()
//!     .unwrap();
//!
//! let numbers = Instance::from_str(&schema, "<numbers><num>3</num><num>7</num></numbers>").unwrap();
//! assert_eq!(numbers.get("first").unwrap().as_integer(), Some(3));
//! assert_eq!(numbers.get("all").unwrap().as_list().map(|l| l.len()), Some(2));
//! ```

mod accessor;
pub mod coerce;
pub mod decl;
pub mod error;
pub mod extension;
pub mod field;
pub mod instance;
pub mod options;
pub mod registry;
pub mod schema;
pub mod value;

#[cfg(test)]
mod decl_tests;
#[cfg(test)]
mod instance_tests;

pub use accessor::FieldAccessor;
pub use coerce::Coercion;
pub use error::{ConfigError, Error, FieldError, Result};
pub use extension::{ExtensionDecl, ExtensionFn, ExtensionRegistry};
pub use field::{Field, FieldKind, ProgramSource, Target};
pub use instance::Instance;
pub use options::{Meta, Options, StructuralSchema};
pub use registry::Registry;
pub use schema::{Schema, SchemaBuilder};
pub use value::Value;

// Re-export commonly used items at crate root
pub use xmlview_core::{Item, Namespaces, NodeRef, ParserOptions, RawResult};
pub use xmlview_vm::{TransformError, TransformOutput, Validation};
