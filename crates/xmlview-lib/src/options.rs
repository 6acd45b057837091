//! Schema metadata and its merge across an inheritance chain.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::Deserialize;
use xmlview_compiler::rules::{RuleSchema, compile_rules};
use xmlview_core::{Namespaces, NodeRef, ParserOptions};
use xmlview_vm::VM;

use crate::error::ConfigError;

/// Option keys accepted in a metadata block.
pub const KNOWN_OPTIONS: &[&str] = &[
    "namespaces",
    "extension_namespace_uri",
    "parser_options",
    "structural_schema",
    "structural_schema_source",
];

/// Validation applied to the root element of every new instance.
pub trait StructuralSchema: Send + Sync + fmt::Debug {
    /// `Err` carries a human-readable reason.
    fn validate(&self, root: &NodeRef) -> Result<(), String>;
}

/// A rule schema read from disk, compiled on first validation.
pub struct RuleStructuralSchema {
    path: PathBuf,
    parser_options: ParserOptions,
    compiled: OnceCell<RuleSchema>,
}

impl RuleStructuralSchema {
    pub fn new(path: impl Into<PathBuf>, parser_options: ParserOptions) -> Self {
        Self {
            path: path.into(),
            parser_options,
            compiled: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn rules(&self) -> Result<&RuleSchema, String> {
        self.compiled.get_or_try_init(|| {
            let source = std::fs::read_to_string(&self.path)
                .map_err(|e| format!("cannot read `{}`: {e}", self.path.display()))?;
            let (rules, _) = compile_rules(&source, self.parser_options, None).map_err(|e| {
                let diagnostics = e.into_diagnostics();
                match diagnostics.first_error() {
                    Some(first) => format!("`{}`: {}", self.path.display(), first.message),
                    None => format!("`{}` failed to compile", self.path.display()),
                }
            })?;
            tracing::debug!(path = %self.path.display(), "compiled structural schema");
            Ok(rules)
        })
    }
}

impl StructuralSchema for RuleStructuralSchema {
    fn validate(&self, root: &NodeRef) -> Result<(), String> {
        let rules = self.rules()?;
        let validation = VM::default()
            .validate(rules, root)
            .map_err(|e| e.to_string())?;
        if validation.is_valid() {
            return Ok(());
        }
        let failed: Vec<_> = validation
            .report
            .failed_asserts()
            .map(|f| format!("{} ({})", f.message, f.location))
            .collect();
        Err(failed.join("; "))
    }
}

impl fmt::Debug for RuleStructuralSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleStructuralSchema")
            .field("path", &self.path)
            .field("compiled", &self.compiled.get().is_some())
            .finish()
    }
}

/// Metadata block of one schema declaration. Every key is optional and
/// applies on top of the inherited options.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Meta {
    pub namespaces: Option<Namespaces>,
    pub extension_namespace_uri: Option<String>,
    pub parser_options: Option<ParserOptions>,
    #[serde(skip)]
    pub structural_schema: Option<Arc<dyn StructuralSchema>>,
    /// Path of a rule schema validating the root.
    pub structural_schema_source: Option<PathBuf>,
}

impl Meta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON metadata object.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ConfigError> {
        if let Some(object) = value.as_object()
            && let Some(unknown) = object
                .keys()
                .find(|k| !KNOWN_OPTIONS.contains(&k.as_str()))
        {
            return Err(ConfigError::UnknownOption(unknown.clone()));
        }
        if value.get("structural_schema").is_some() {
            return Err(ConfigError::InvalidMeta(
                "`structural_schema` can only be set in code; use `structural_schema_source`"
                    .to_string(),
            ));
        }
        serde_json::from_value(value.clone()).map_err(|e| ConfigError::InvalidMeta(e.to_string()))
    }

    pub fn namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces
            .get_or_insert_with(Namespaces::new)
            .insert(prefix.into(), uri.into());
        self
    }

    pub fn extension_namespace_uri(mut self, uri: impl Into<String>) -> Self {
        self.extension_namespace_uri = Some(uri.into());
        self
    }

    pub fn parser_options(mut self, options: ParserOptions) -> Self {
        self.parser_options = Some(options);
        self
    }

    pub fn structural_schema(mut self, schema: Arc<dyn StructuralSchema>) -> Self {
        self.structural_schema = Some(schema);
        self
    }

    pub fn structural_schema_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.structural_schema_source = Some(path.into());
        self
    }
}

/// Options of a prepared schema, after merging every ancestor.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub namespaces: Namespaces,
    pub extension_namespace_uri: Option<String>,
    pub parser_options: ParserOptions,
    pub structural_schema: Option<Arc<dyn StructuralSchema>>,
}

impl Options {
    /// Apply `meta` over inherited options.
    ///
    /// Namespaces override per prefix; every other key replaces the inherited
    /// value wholesale.
    pub fn merge(parent: &Options, meta: &Meta) -> Result<Options, ConfigError> {
        let mut merged = parent.clone();
        if let Some(namespaces) = &meta.namespaces {
            for (prefix, uri) in namespaces {
                merged.namespaces.insert(prefix.clone(), uri.clone());
            }
        }
        if let Some(uri) = &meta.extension_namespace_uri {
            merged.extension_namespace_uri = Some(uri.clone());
        }
        if let Some(options) = meta.parser_options {
            merged.parser_options = options;
        }
        match (&meta.structural_schema, &meta.structural_schema_source) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::ConflictingOptions(
                    "structural_schema",
                    "structural_schema_source",
                ));
            }
            (Some(schema), None) => merged.structural_schema = Some(schema.clone()),
            (None, Some(path)) => {
                merged.structural_schema = Some(Arc::new(RuleStructuralSchema::new(
                    path,
                    merged.parser_options,
                )));
            }
            (None, None) => {}
        }
        Ok(merged)
    }

    /// Schema namespaces with `extra` layered on top.
    pub fn namespaces_with(&self, extra: &Namespaces) -> Namespaces {
        let mut namespaces = self.namespaces.clone();
        for (prefix, uri) in extra {
            namespaces.insert(prefix.clone(), uri.clone());
        }
        namespaces
    }
}
