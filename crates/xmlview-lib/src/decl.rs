//! JSON schema declarations.
//!
//! A schema file declares a group and an ordered list of schemas:
//!
//! ```json
//! {
//!   "group": "feeds",
//!   "schemas": [
//!     {
//!       "name": "feed",
//!       "meta": { "namespaces": { "atom": "http://www.w3.org/2005/Atom" } },
//!       "fields": {
//!         "title": { "type": "text", "query": "/atom:feed/atom:title" },
//!         "entries": { "type": "embedded_list", "target": "entry", "query": "atom:entry" }
//!       }
//!     },
//!     { "name": "entry", "fields": { "id": { "type": "text", "query": "atom:id" } } }
//!   ]
//! }
//! ```
//!
//! Schemas register in order, so a field may name a schema declared later
//! in the file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;
use xmlview_core::{Namespaces, ParserOptions};

use crate::coerce::Coercion;
use crate::error::ConfigError;
use crate::field::{Field, ProgramSource, Target};
use crate::options::Meta;
use crate::registry::Registry;
use crate::schema::{DEFAULT_GROUP, Schema};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaFile {
    #[serde(default)]
    pub group: Option<String>,
    pub schemas: Vec<SchemaDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDecl {
    pub name: String,
    /// `name` in the same group, or `group.name`.
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
    #[serde(default)]
    pub fields: IndexMap<String, FieldDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldDecl {
    Root(RootDecl),
    Element(ElementDecl),
    Node(QueryDecl),
    Nodes(QueryDecl),
    Text(QueryDecl),
    Texts(QueryDecl),
    Integer(QueryDecl),
    Integers(QueryDecl),
    Float(QueryDecl),
    Floats(QueryDecl),
    Datetime(QueryDecl),
    Datetimes(QueryDecl),
    Boolean(QueryDecl),
    Booleans(QueryDecl),
    Html(QueryDecl),
    HtmlList(QueryDecl),
    InnerHtml(QueryDecl),
    InnerHtmlList(QueryDecl),
    Transform(ProgramDecl),
    Rules(ProgramDecl),
    Embedded(EmbeddedDecl),
    EmbeddedList(EmbeddedDecl),
    EmbeddedTransform(EmbeddedProgramDecl),
    EmbeddedRules(EmbeddedProgramDecl),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RootDecl {}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElementDecl {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub mutable: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryDecl {
    pub query: String,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub extra_namespaces: Namespaces,
    #[serde(default)]
    pub mutable: bool,
    #[serde(default)]
    pub ignore_extra_nodes: bool,
    #[serde(default)]
    pub none_values: Vec<String>,
    #[serde(default)]
    pub true_values: Option<Vec<String>>,
    #[serde(default)]
    pub false_values: Option<Vec<String>>,
    #[serde(default)]
    pub strip_namespaces: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgramDecl {
    #[serde(default)]
    pub source: Option<String>,
    /// Relative paths are resolved against the schema file's directory.
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub mutable: bool,
    #[serde(default)]
    pub parser_options: Option<ParserOptions>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddedDecl {
    pub target: String,
    pub query: String,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub extra_namespaces: Namespaces,
    #[serde(default)]
    pub mutable: bool,
    #[serde(default)]
    pub ignore_extra_nodes: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddedProgramDecl {
    pub target: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub mutable: bool,
    #[serde(default)]
    pub parser_options: Option<ParserOptions>,
}

impl EmbeddedProgramDecl {
    fn split(self) -> Result<(Target, ProgramDecl), String> {
        Ok((
            parse_target(&self.target)?,
            ProgramDecl {
                source: self.source,
                file: self.file,
                phase: self.phase,
                required: self.required,
                mutable: self.mutable,
                parser_options: self.parser_options,
            },
        ))
    }
}

fn parse_target(target: &str) -> Result<Target, String> {
    let target = target.trim();
    if target.is_empty() {
        return Err("embedded fields need a target".to_string());
    }
    Ok(Target::parse(target))
}

impl SchemaFile {
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&source)
    }

    /// Prepare and register every schema in declaration order.
    ///
    /// `base_dir` anchors relative program and structural schema paths.
    pub fn register(
        self,
        registry: &Registry,
        base_dir: Option<&Path>,
    ) -> Result<Vec<Arc<Schema>>, ConfigError> {
        let group = self.group.unwrap_or_else(|| DEFAULT_GROUP.to_string());
        let mut registered = Vec::with_capacity(self.schemas.len());
        for decl in self.schemas {
            let schema = decl.prepare(&group, registry, base_dir)?;
            registered.push(registry.register(schema));
        }
        Ok(registered)
    }
}

/// Read a schema file and register its schemas.
pub fn load(path: &Path, registry: &Registry) -> Result<Vec<Arc<Schema>>, ConfigError> {
    let file = SchemaFile::read(path)?;
    file.register(registry, path.parent())
}

fn anchored(path: PathBuf, base_dir: Option<&Path>) -> PathBuf {
    match base_dir {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path,
    }
}

impl SchemaDecl {
    fn prepare(
        self,
        group: &str,
        registry: &Registry,
        base_dir: Option<&Path>,
    ) -> Result<Arc<Schema>, ConfigError> {
        let mut builder = Schema::builder(&self.name).group(group);
        if let Some(parent) = &self.extends {
            let parent = registry
                .lookup(parent, group)
                .ok_or_else(|| ConfigError::UnknownSchema(parent.clone()))?;
            builder = builder.extends(&parent);
        }
        if let Some(meta) = &self.meta {
            let mut meta = Meta::from_json(meta)?;
            meta.structural_schema_source = meta
                .structural_schema_source
                .map(|path| anchored(path, base_dir));
            builder = builder.meta(meta);
        }
        for (name, decl) in self.fields {
            let field = decl.into_field(&name, base_dir)?;
            builder = builder.field(name, field);
        }
        builder.prepare()
    }
}

impl FieldDecl {
    pub fn into_field(self, name: &str, base_dir: Option<&Path>) -> Result<Field, ConfigError> {
        let (field, required, mutable) = match self {
            FieldDecl::Root(RootDecl {}) => (Field::root(), None, false),
            FieldDecl::Element(decl) => (Field::element(), decl.required, decl.mutable),
            FieldDecl::Node(decl) => decl.into_field(name, Coercion::Node, false)?,
            FieldDecl::Nodes(decl) => decl.into_field(name, Coercion::Node, true)?,
            FieldDecl::Text(decl) => decl.into_field(name, Coercion::Text, false)?,
            FieldDecl::Texts(decl) => decl.into_field(name, Coercion::Text, true)?,
            FieldDecl::Integer(decl) => decl.into_field(name, Coercion::Integer, false)?,
            FieldDecl::Integers(decl) => decl.into_field(name, Coercion::Integer, true)?,
            FieldDecl::Float(decl) => decl.into_field(name, Coercion::Float, false)?,
            FieldDecl::Floats(decl) => decl.into_field(name, Coercion::Float, true)?,
            FieldDecl::Datetime(decl) => decl.into_field(name, Coercion::DateTime, false)?,
            FieldDecl::Datetimes(decl) => decl.into_field(name, Coercion::DateTime, true)?,
            FieldDecl::Boolean(decl) => decl.into_field(name, Coercion::boolean(), false)?,
            FieldDecl::Booleans(decl) => decl.into_field(name, Coercion::boolean(), true)?,
            FieldDecl::Html(decl) => decl.into_field(name, Coercion::html(), false)?,
            FieldDecl::HtmlList(decl) => decl.into_field(name, Coercion::html(), true)?,
            FieldDecl::InnerHtml(decl) => decl.into_field(name, Coercion::inner_html(), false)?,
            FieldDecl::InnerHtmlList(decl) => decl.into_field(name, Coercion::inner_html(), true)?,
            FieldDecl::Transform(decl) => {
                let (required, mutable) = (decl.required, decl.mutable);
                let field = decl.into_field(name, base_dir, Field::transform)?;
                (field, required, mutable)
            }
            FieldDecl::Rules(decl) => {
                let (required, mutable) = (decl.required, decl.mutable);
                let field = decl.into_field(name, base_dir, Field::rules)?;
                (field, required, mutable)
            }
            FieldDecl::Embedded(decl) => decl.into_field(name, false)?,
            FieldDecl::EmbeddedList(decl) => decl.into_field(name, true)?,
            FieldDecl::EmbeddedTransform(decl) => {
                let (target, program) = decl.split().map_err(|m| invalid(name, &m))?;
                let (required, mutable) = (program.required, program.mutable);
                let field = program
                    .into_field(name, base_dir, |source| Field::embedded_transform(target, source))?;
                (field, required, mutable)
            }
            FieldDecl::EmbeddedRules(decl) => {
                let (target, program) = decl.split().map_err(|m| invalid(name, &m))?;
                let (required, mutable) = (program.required, program.mutable);
                let field = program
                    .into_field(name, base_dir, |source| Field::embedded_rules(target, source))?;
                (field, required, mutable)
            }
        };
        let field = match required {
            Some(required) => field.required(required),
            None => field,
        };
        Ok(if mutable { field.mutable() } else { field })
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidField {
        field: field.to_string(),
        message: message.to_string(),
    }
}

impl QueryDecl {
    fn into_field(
        self,
        name: &str,
        coercion: Coercion,
        list: bool,
    ) -> Result<(Field, Option<bool>, bool), ConfigError> {
        let boolean = matches!(coercion, Coercion::Boolean { .. });
        let markup = matches!(coercion, Coercion::Html { .. } | Coercion::InnerHtml { .. });
        if !boolean && (self.true_values.is_some() || self.false_values.is_some()) {
            return Err(invalid(name, "`true_values` and `false_values` apply to boolean fields only"));
        }
        if !markup && self.strip_namespaces.is_some() {
            return Err(invalid(name, "`strip_namespaces` applies to markup fields only"));
        }
        if !self.none_values.is_empty() && !coercion.is_textual() {
            return Err(invalid(name, "`none_values` applies to text fields only"));
        }
        if list && self.ignore_extra_nodes {
            return Err(invalid(name, "`ignore_extra_nodes` applies to single-valued fields only"));
        }

        let mut field = if list {
            Field::query_list(self.query, coercion)
        } else {
            Field::query(self.query, coercion)
        };
        if let Some(default) = self.default {
            field = field.default(default);
        }
        for (prefix, uri) in self.extra_namespaces {
            field = field.extra_namespace(prefix, uri);
        }
        if self.ignore_extra_nodes {
            field = field.ignore_extra_nodes();
        }
        if !self.none_values.is_empty() {
            field = field.none_values(self.none_values);
        }
        if boolean {
            let true_values = self.true_values.unwrap_or_else(|| vec!["true".to_string()]);
            let false_values = self.false_values.unwrap_or_else(|| vec!["false".to_string()]);
            field = field.boolean_values(true_values, false_values);
        }
        if let Some(uris) = self.strip_namespaces {
            field = field.strip_namespaces(uris);
        }
        Ok((field, self.required, self.mutable))
    }
}

impl ProgramDecl {
    fn into_field<F>(self, name: &str, base_dir: Option<&Path>, make: F) -> Result<Field, ConfigError>
    where
        F: FnOnce(ProgramSource) -> Field,
    {
        let source = match (self.source, self.file) {
            (Some(source), None) => ProgramSource::Inline(source),
            (None, Some(path)) => ProgramSource::File(anchored(path, base_dir)),
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingOptions("source", "file")),
            (None, None) => return Err(invalid(name, "a program needs `source` or `file`")),
        };
        let mut field = make(source);
        if let Some(phase) = self.phase {
            field = field.phase(phase);
        }
        if let Some(options) = self.parser_options {
            field = field.parser_options(options);
        }
        Ok(field)
    }
}

impl EmbeddedDecl {
    fn into_field(self, name: &str, list: bool) -> Result<(Field, Option<bool>, bool), ConfigError> {
        let target = parse_target(&self.target).map_err(|m| invalid(name, &m))?;
        if list && self.ignore_extra_nodes {
            return Err(invalid(name, "`ignore_extra_nodes` applies to single-valued fields only"));
        }
        let mut field = if list {
            Field::embedded_list(target, self.query)
        } else {
            Field::embedded(target, self.query)
        };
        for (prefix, uri) in self.extra_namespaces {
            field = field.extra_namespace(prefix, uri);
        }
        if self.ignore_extra_nodes {
            field = field.ignore_extra_nodes();
        }
        Ok((field, self.required, self.mutable))
    }
}
