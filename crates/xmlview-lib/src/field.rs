//! Field definitions.
//!
//! A [`Field`] describes one named slot of a schema: where its value comes
//! from, how the raw result is coerced, and the cardinality and presence
//! rules applied before the value is cached on an instance.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::OnceCell;
use xmlview_compiler::diagnostics::DiagnosticKind;
use xmlview_compiler::rules::{RuleSchema, compile_rules};
use xmlview_compiler::stylesheet::{Stylesheet, compile_stylesheet};
use xmlview_compiler::Diagnostics;
use xmlview_core::{Namespaces, ParserOptions};

use crate::coerce::Coercion;
use crate::error::FieldError;
use crate::extension::{ExtensionDecl, ExtensionRegistry};
use crate::schema::Schema;

/// Marker naming the schema that declares the field.
pub const SELF_TARGET: &str = "self";

static CREATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Where a program's text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramSource {
    Inline(String),
    File(PathBuf),
}

impl ProgramSource {
    pub fn inline(source: impl Into<String>) -> Self {
        ProgramSource::Inline(source.into())
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        ProgramSource::File(path.into())
    }

    fn read(&self) -> std::io::Result<String> {
        match self {
            ProgramSource::Inline(source) => Ok(source.clone()),
            ProgramSource::File(path) => std::fs::read_to_string(path),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramKind {
    /// A structural stylesheet.
    Stylesheet,
    /// A rule schema, producing a validation report.
    Rules,
}

/// A compiled program, shared by every instance of the schema.
#[derive(Debug)]
pub enum Program {
    Stylesheet(Stylesheet),
    Rules(RuleSchema),
}

/// A program bound to a field, compiled on first use.
pub struct ProgramSpec {
    pub kind: ProgramKind,
    pub source: ProgramSource,
    /// Rule schema phase; `None` uses the schema's default phase.
    pub phase: Option<String>,
    compiled: OnceCell<Arc<Program>>,
}

impl ProgramSpec {
    fn new(kind: ProgramKind, source: ProgramSource) -> Self {
        Self {
            kind,
            source,
            phase: None,
            compiled: OnceCell::new(),
        }
    }

    /// The compiled program, compiling it on first call.
    pub fn program(&self, field: &str, options: ParserOptions) -> Result<Arc<Program>, FieldError> {
        self.compiled
            .get_or_try_init(|| self.compile(field, options).map(Arc::new))
            .cloned()
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }

    fn compile(&self, field: &str, options: ParserOptions) -> Result<Program, FieldError> {
        let source = self.source.read().map_err(|e| {
            let mut diagnostics = Diagnostics::new();
            diagnostics
                .report(DiagnosticKind::NotWellFormed, None)
                .message(format!("cannot read program: {e}"))
                .emit();
            FieldError::Compile {
                field: field.to_string(),
                diagnostics,
            }
        })?;
        let compiled = match self.kind {
            ProgramKind::Stylesheet => compile_stylesheet(&source, options)
                .map(|(stylesheet, warnings)| (Program::Stylesheet(stylesheet), warnings)),
            ProgramKind::Rules => compile_rules(&source, options, self.phase.as_deref())
                .map(|(rules, warnings)| (Program::Rules(rules), warnings)),
        };
        match compiled {
            Ok((program, warnings)) => {
                for warning in warnings.iter() {
                    tracing::warn!(field, "{}", warning.message);
                }
                tracing::debug!(field, kind = ?self.kind, "compiled program");
                Ok(program)
            }
            Err(e) => Err(FieldError::Compile {
                field: field.to_string(),
                diagnostics: e.into_diagnostics(),
            }),
        }
    }

    /// A copy with an empty cache.
    fn fresh(&self) -> Self {
        Self {
            kind: self.kind,
            source: self.source.clone(),
            phase: self.phase.clone(),
            compiled: OnceCell::new(),
        }
    }
}

impl fmt::Debug for ProgramSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramSpec")
            .field("kind", &self.kind)
            .field("source", &self.source)
            .field("phase", &self.phase)
            .field("compiled", &self.is_compiled())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub query: String,
    pub coercion: Coercion,
    /// Produce every match instead of a single value.
    pub list: bool,
    /// Take the first of several matches instead of failing.
    pub ignore_extra_nodes: bool,
    /// Matched text that reads as null.
    pub none_values: Vec<String>,
}

impl QuerySpec {
    fn new(query: impl Into<String>, coercion: Coercion, list: bool) -> Self {
        Self {
            query: query.into(),
            coercion,
            list,
            ignore_extra_nodes: false,
            none_values: Vec::new(),
        }
    }
}

/// A reference to the schema an embedded field produces.
#[derive(Clone)]
pub enum Target {
    /// The schema declaring (or inheriting) the field.
    SelfRef,
    /// A schema in the declaring schema's group.
    Name(String),
    Qualified { group: String, name: String },
    Schema(Arc<Schema>),
}

impl Target {
    /// `self`, `name` or `group.name`.
    pub fn parse(target: &str) -> Self {
        if target == SELF_TARGET {
            return Target::SelfRef;
        }
        match target.split_once('.') {
            Some((group, name)) => Target::Qualified {
                group: group.to_string(),
                name: name.to_string(),
            },
            None => Target::Name(target.to_string()),
        }
    }
}

impl From<&str> for Target {
    fn from(target: &str) -> Self {
        Target::parse(target)
    }
}

impl From<&Arc<Schema>> for Target {
    fn from(schema: &Arc<Schema>) -> Self {
        Target::Schema(schema.clone())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::SelfRef => f.write_str(SELF_TARGET),
            Target::Name(name) => f.write_str(name),
            Target::Qualified { group, name } => write!(f, "{group}.{name}"),
            Target::Schema(schema) => write!(f, "{}", schema.key()),
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Target({self})")
    }
}

/// The target of an embedded field, filled in once the schema is known.
pub struct TargetSlot {
    pub target: Target,
    resolved: OnceCell<Arc<Schema>>,
}

impl TargetSlot {
    fn new(target: Target) -> Self {
        let resolved = OnceCell::new();
        if let Target::Schema(schema) = &target {
            let _ = resolved.set(schema.clone());
        }
        Self { target, resolved }
    }

    pub fn resolved(&self) -> Option<&Arc<Schema>> {
        self.resolved.get()
    }

    /// First resolution wins.
    pub(crate) fn resolve(&self, schema: Arc<Schema>) {
        let _ = self.resolved.set(schema);
    }

    /// Named targets that still wait for a schema.
    pub(crate) fn is_pending(&self) -> bool {
        !matches!(self.target, Target::SelfRef) && self.resolved.get().is_none()
    }

    fn fresh(&self) -> Self {
        Self {
            target: self.target.clone(),
            resolved: self.resolved.clone(),
        }
    }
}

impl fmt::Debug for TargetSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetSlot")
            .field("target", &self.target)
            .field("resolved", &self.resolved.get().is_some())
            .finish()
    }
}

#[derive(Debug)]
pub enum FieldKind {
    /// The bound document element every other field queries.
    Root,
    /// A plain element slot, assigned by the caller.
    Element,
    Query(QuerySpec),
    Transform(ProgramSpec),
    /// Instances of another schema, one per matched element.
    Embedded { target: TargetSlot, query: QuerySpec },
    /// An instance of another schema over a program's result tree.
    EmbeddedTransform {
        target: TargetSlot,
        program: ProgramSpec,
    },
}

impl FieldKind {
    fn fresh(&self) -> Self {
        match self {
            FieldKind::Root => FieldKind::Root,
            FieldKind::Element => FieldKind::Element,
            FieldKind::Query(query) => FieldKind::Query(query.clone()),
            FieldKind::Transform(program) => FieldKind::Transform(program.fresh()),
            FieldKind::Embedded { target, query } => FieldKind::Embedded {
                target: target.fresh(),
                query: query.clone(),
            },
            FieldKind::EmbeddedTransform { target, program } => FieldKind::EmbeddedTransform {
                target: target.fresh(),
                program: program.fresh(),
            },
        }
    }

    fn query_mut(&mut self) -> Option<&mut QuerySpec> {
        match self {
            FieldKind::Query(query) | FieldKind::Embedded { query, .. } => Some(query),
            _ => None,
        }
    }

    fn program_mut(&mut self) -> Option<&mut ProgramSpec> {
        match self {
            FieldKind::Transform(program) | FieldKind::EmbeddedTransform { program, .. } => {
                Some(program)
            }
            _ => None,
        }
    }
}

/// One named slot of a schema.
#[derive(Debug)]
pub struct Field {
    pub(crate) name: String,
    pub kind: FieldKind,
    pub required: bool,
    /// Literal coerced through the field's pipeline when nothing matches.
    pub default: Option<String>,
    pub extra_namespaces: Namespaces,
    pub(crate) extension_decls: Vec<ExtensionDecl>,
    /// Field extensions with their namespaces resolved, set when prepared.
    pub(crate) extensions: ExtensionRegistry,
    /// A second non-null assignment fails.
    pub immutable: bool,
    /// Parser options for this field's program, over the schema's.
    pub parser_options: Option<ParserOptions>,
    creation: u64,
}

impl Field {
    pub fn new(kind: FieldKind) -> Self {
        let required = !matches!(kind, FieldKind::Root | FieldKind::Element);
        Self {
            name: String::new(),
            kind,
            required,
            default: None,
            extra_namespaces: Namespaces::new(),
            extension_decls: Vec::new(),
            extensions: ExtensionRegistry::new(),
            immutable: true,
            parser_options: None,
            creation: CREATION_COUNTER.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn root() -> Self {
        Self::new(FieldKind::Root)
    }

    pub fn element() -> Self {
        Self::new(FieldKind::Element)
    }

    pub fn query(query: impl Into<String>, coercion: Coercion) -> Self {
        Self::new(FieldKind::Query(QuerySpec::new(query, coercion, false)))
    }

    pub fn query_list(query: impl Into<String>, coercion: Coercion) -> Self {
        Self::new(FieldKind::Query(QuerySpec::new(query, coercion, true)))
    }

    pub fn node(query: impl Into<String>) -> Self {
        Self::query(query, Coercion::Node)
    }

    pub fn nodes(query: impl Into<String>) -> Self {
        Self::query_list(query, Coercion::Node)
    }

    pub fn text(query: impl Into<String>) -> Self {
        Self::query(query, Coercion::Text)
    }

    pub fn texts(query: impl Into<String>) -> Self {
        Self::query_list(query, Coercion::Text)
    }

    pub fn integer(query: impl Into<String>) -> Self {
        Self::query(query, Coercion::Integer)
    }

    pub fn integers(query: impl Into<String>) -> Self {
        Self::query_list(query, Coercion::Integer)
    }

    pub fn float(query: impl Into<String>) -> Self {
        Self::query(query, Coercion::Float)
    }

    pub fn floats(query: impl Into<String>) -> Self {
        Self::query_list(query, Coercion::Float)
    }

    pub fn datetime(query: impl Into<String>) -> Self {
        Self::query(query, Coercion::DateTime)
    }

    pub fn datetimes(query: impl Into<String>) -> Self {
        Self::query_list(query, Coercion::DateTime)
    }

    pub fn boolean(query: impl Into<String>) -> Self {
        Self::query(query, Coercion::boolean())
    }

    pub fn booleans(query: impl Into<String>) -> Self {
        Self::query_list(query, Coercion::boolean())
    }

    pub fn html(query: impl Into<String>) -> Self {
        Self::query(query, Coercion::html())
    }

    pub fn html_list(query: impl Into<String>) -> Self {
        Self::query_list(query, Coercion::html())
    }

    pub fn inner_html(query: impl Into<String>) -> Self {
        Self::query(query, Coercion::inner_html())
    }

    pub fn inner_html_list(query: impl Into<String>) -> Self {
        Self::query_list(query, Coercion::inner_html())
    }

    pub fn transform(source: ProgramSource) -> Self {
        Self::new(FieldKind::Transform(ProgramSpec::new(
            ProgramKind::Stylesheet,
            source,
        )))
    }

    pub fn rules(source: ProgramSource) -> Self {
        Self::new(FieldKind::Transform(ProgramSpec::new(ProgramKind::Rules, source)))
    }

    pub fn embedded(target: impl Into<Target>, query: impl Into<String>) -> Self {
        Self::new(FieldKind::Embedded {
            target: TargetSlot::new(target.into()),
            query: QuerySpec::new(query, Coercion::Node, false),
        })
    }

    pub fn embedded_list(target: impl Into<Target>, query: impl Into<String>) -> Self {
        Self::new(FieldKind::Embedded {
            target: TargetSlot::new(target.into()),
            query: QuerySpec::new(query, Coercion::Node, true),
        })
    }

    pub fn embedded_transform(target: impl Into<Target>, source: ProgramSource) -> Self {
        Self::new(FieldKind::EmbeddedTransform {
            target: TargetSlot::new(target.into()),
            program: ProgramSpec::new(ProgramKind::Stylesheet, source),
        })
    }

    pub fn embedded_rules(target: impl Into<Target>, source: ProgramSource) -> Self {
        Self::new(FieldKind::EmbeddedTransform {
            target: TargetSlot::new(target.into()),
            program: ProgramSpec::new(ProgramKind::Rules, source),
        })
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn extra_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.extra_namespaces.insert(prefix.into(), uri.into());
        self
    }

    /// An extension visible only to this field's query or program.
    pub fn extension(mut self, extension: ExtensionDecl) -> Self {
        self.extension_decls.push(extension);
        self
    }

    /// Allow reassignment after initialization.
    pub fn mutable(mut self) -> Self {
        self.immutable = false;
        self
    }

    pub fn parser_options(mut self, options: ParserOptions) -> Self {
        self.parser_options = Some(options);
        self
    }

    /// Take the first match when several nodes match. Query fields only.
    pub fn ignore_extra_nodes(mut self) -> Self {
        if let Some(query) = self.kind.query_mut() {
            query.ignore_extra_nodes = true;
        }
        self
    }

    /// Matched strings read as null. Query fields only.
    pub fn none_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(query) = self.kind.query_mut() {
            query.none_values = values.into_iter().map(Into::into).collect();
        }
        self
    }

    /// Literal sets for boolean fields. Ignored by other coercions.
    pub fn boolean_values<T, F>(mut self, true_values: T, false_values: F) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        if let Some(query) = self.kind.query_mut()
            && let Coercion::Boolean {
                true_values: t,
                false_values: f,
            } = &mut query.coercion
        {
            *t = true_values.into_iter().map(Into::into).collect();
            *f = false_values.into_iter().map(Into::into).collect();
        }
        self
    }

    /// Namespace declarations removed from markup. Ignored by other coercions.
    pub fn strip_namespaces<I, S>(mut self, uris: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(query) = self.kind.query_mut()
            && let Coercion::Html { strip_namespaces } | Coercion::InnerHtml { strip_namespaces } =
                &mut query.coercion
        {
            *strip_namespaces = uris.into_iter().map(Into::into).collect();
        }
        self
    }

    /// Rule schema phase. Program fields only.
    pub fn phase(mut self, phase: impl Into<String>) -> Self {
        if let Some(program) = self.kind.program_mut() {
            program.phase = Some(phase.into());
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_root(&self) -> bool {
        matches!(self.kind, FieldKind::Root)
    }

    pub fn creation_order(&self) -> u64 {
        self.creation
    }

    pub fn query_spec(&self) -> Option<&QuerySpec> {
        match &self.kind {
            FieldKind::Query(query) | FieldKind::Embedded { query, .. } => Some(query),
            _ => None,
        }
    }

    pub fn program_spec(&self) -> Option<&ProgramSpec> {
        match &self.kind {
            FieldKind::Transform(program) | FieldKind::EmbeddedTransform { program, .. } => {
                Some(program)
            }
            _ => None,
        }
    }

    pub fn target(&self) -> Option<&TargetSlot> {
        match &self.kind {
            FieldKind::Embedded { target, .. } | FieldKind::EmbeddedTransform { target, .. } => {
                Some(target)
            }
            _ => None,
        }
    }

    /// Text shown in messages: the query, or the program kind.
    pub fn describe(&self) -> String {
        match &self.kind {
            FieldKind::Root => "root".to_string(),
            FieldKind::Element => "element".to_string(),
            FieldKind::Query(query) | FieldKind::Embedded { query, .. } => query.query.clone(),
            FieldKind::Transform(program) | FieldKind::EmbeddedTransform { program, .. } => {
                match program.kind {
                    ProgramKind::Stylesheet => "stylesheet".to_string(),
                    ProgramKind::Rules => "rule schema".to_string(),
                }
            }
        }
    }

    pub(crate) fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Copy for a descendant schema. Compiled programs are not shared.
    pub(crate) fn inherit(&self) -> Self {
        Self {
            name: self.name.clone(),
            kind: self.kind.fresh(),
            required: self.required,
            default: self.default.clone(),
            extra_namespaces: self.extra_namespaces.clone(),
            extension_decls: self.extension_decls.clone(),
            extensions: self.extensions.clone(),
            immutable: self.immutable,
            parser_options: self.parser_options,
            creation: self.creation,
        }
    }
}
