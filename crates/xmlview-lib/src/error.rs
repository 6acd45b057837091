//! Error types for schema declaration and field evaluation.

use xmlview_compiler::Diagnostics;
use xmlview_core::{IngestError, QueryError};
use xmlview_vm::TransformError;

/// Invalid schema declarations. Raised while preparing or registering a
/// schema and never recovered.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown schema option `{0}`")]
    UnknownOption(String),

    #[error("invalid schema options: {0}")]
    InvalidMeta(String),

    #[error("`{0}` and `{1}` are mutually exclusive")]
    ConflictingOptions(&'static str, &'static str),

    #[error("field `{field}` of `{schema}` clashes with the field of the same name in `{ancestor}`")]
    FieldCollision {
        field: String,
        schema: String,
        ancestor: String,
    },

    #[error("field `{field}` is declared twice in `{schema}`")]
    DuplicateField { field: String, schema: String },

    #[error("`{schema}` declares more than one root field")]
    DuplicateRootField { schema: String },

    #[error(
        "extension `{name}` has no namespace and `{schema}` does not define a default extension namespace"
    )]
    ExtensionNamespace { name: String, schema: String },

    #[error("field `{field}`: {message}")]
    InvalidField { field: String, message: String },

    #[error("schema `{0}` is not registered")]
    UnknownSchema(String),

    #[error("unresolved schema references: {}", .0.join(", "))]
    DanglingReferences(Vec<String>),

    #[error("cannot read `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid schema declaration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures local to one field of one instance.
///
/// A failed evaluation leaves the field uninitialized; the next access runs
/// it again.
#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    #[error("{field}: {message}")]
    MissingResult { field: String, message: String },

    #[error("{field}: query `{query}` matched more than one node")]
    MultipleResults { field: String, query: String },

    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error("{field}: cannot parse {value:?} as {target}")]
    Parse {
        field: String,
        value: String,
        target: &'static str,
    },

    #[error("{field}: could not parse datetime {value:?}")]
    DateTime { field: String, value: String },

    #[error("{schema}.{field} is immutable")]
    ImmutableField { schema: String, field: String },

    #[error("{field}: target schema `{target}` is not resolved")]
    UnresolvedTarget { field: String, target: String },

    #[error("document does not satisfy the structural schema: {0}")]
    SchemaValidation(String),

    #[error("{field}: {source}")]
    Transform {
        field: String,
        #[source]
        source: TransformError,
    },

    #[error("{field}: {source}")]
    Query {
        field: String,
        #[source]
        source: QueryError,
    },

    #[error("{field}: program failed to compile")]
    Compile { field: String, diagnostics: Diagnostics },

    #[error("{schema} has no field named `{field}`")]
    UnknownField { schema: String, field: String },

    #[error("{0} is read while it is being evaluated")]
    CyclicEvaluation(String),
}

impl FieldError {
    /// Name of the field the error belongs to, when there is one.
    pub fn field(&self) -> Option<&str> {
        match self {
            FieldError::MissingResult { field, .. }
            | FieldError::MultipleResults { field, .. }
            | FieldError::Validation { field, .. }
            | FieldError::Parse { field, .. }
            | FieldError::DateTime { field, .. }
            | FieldError::ImmutableField { field, .. }
            | FieldError::UnresolvedTarget { field, .. }
            | FieldError::Transform { field, .. }
            | FieldError::Query { field, .. }
            | FieldError::Compile { field, .. }
            | FieldError::UnknownField { field, .. } => Some(field),
            FieldError::CyclicEvaluation(field) => Some(field),
            FieldError::SchemaValidation(_) => None,
        }
    }

    /// Cardinality errors, which callers may treat as absence.
    pub fn is_cardinality(&self) -> bool {
        matches!(
            self,
            FieldError::MissingResult { .. } | FieldError::MultipleResults { .. }
        )
    }
}

/// Errors from building instances out of documents.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;
