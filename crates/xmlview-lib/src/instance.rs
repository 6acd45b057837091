//! Instances: one schema bound to one document element.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use xmlview_core::{Extensions, Namespaces, NodeRef, QueryError, RawResult, evaluate};
use xmlview_vm::VM;

use crate::error::{FieldError, Result};
use crate::extension::ExtensionRegistry;
use crate::field::{Field, Program};
use crate::schema::Schema;
use crate::value::Value;

#[derive(Default)]
pub(crate) struct Slot {
    pub(crate) value: Option<Rc<Value>>,
    pub(crate) initialized: bool,
    pub(crate) evaluating: bool,
}

struct Inner {
    schema: Arc<Schema>,
    root: NodeRef,
    slots: RefCell<Vec<Slot>>,
}

/// A lazily evaluated view of a document element.
///
/// Clones share the field cache. Instances never modify the tree they are
/// bound to.
#[derive(Clone)]
pub struct Instance {
    inner: Rc<Inner>,
}

impl Instance {
    /// Bind `node` to `schema`. A document node binds its document element.
    pub fn new(schema: &Arc<Schema>, node: NodeRef) -> std::result::Result<Self, FieldError> {
        let root_name = schema.root_field();
        let root = if node.is_root() {
            node.document().root_element()
        } else {
            node.as_element()
        }
        .ok_or_else(|| FieldError::Validation {
            field: root_name.to_string(),
            message: "expected a document or an element".to_string(),
        })?;

        let slots = (0..schema.field_count()).map(|_| Slot::default()).collect();
        let instance = Self {
            inner: Rc::new(Inner {
                schema: schema.clone(),
                root: root.clone(),
                slots: RefCell::new(slots),
            }),
        };
        instance.set(root_name, Value::Node(root))?;
        tracing::trace!(schema = %schema.key(), "bound instance");
        Ok(instance)
    }

    /// Parse `source` with the schema's parser options and bind its root.
    pub fn from_str(schema: &Arc<Schema>, source: &str) -> Result<Self> {
        let doc = xmlview_core::parse_str(source, schema.options().parser_options)?;
        Ok(Self::new(schema, doc.root())?)
    }

    pub fn from_file(schema: &Arc<Schema>, path: impl AsRef<Path>) -> Result<Self> {
        let doc = xmlview_core::parse_file(path, schema.options().parser_options)?;
        Ok(Self::new(schema, doc.root())?)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.inner.schema
    }

    /// The bound element.
    pub fn root(&self) -> &NodeRef {
        &self.inner.root
    }

    /// Field value, evaluated on first read and cached afterwards.
    pub fn get(&self, name: &str) -> std::result::Result<Rc<Value>, FieldError> {
        self.accessor(name)?.get(self)
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> std::result::Result<(), FieldError> {
        self.accessor(name)?.set(self, value.into())
    }

    /// Whether the field holds a non-null value that was evaluated or assigned.
    pub fn is_initialized(&self, name: &str) -> bool {
        self.schema()
            .fields()
            .position(|f| f.name() == name)
            .is_some_and(|index| self.with_slot(index, |slot| slot.initialized))
    }

    /// Evaluate an ad-hoc query against the bound element.
    ///
    /// `namespaces` and `extensions` apply on top of the schema's.
    pub fn xpath(
        &self,
        query: &str,
        namespaces: &Namespaces,
        extensions: &ExtensionRegistry,
    ) -> std::result::Result<RawResult, QueryError> {
        let namespaces = self.schema().options().namespaces_with(namespaces);
        evaluate(self.root(), query, &namespaces, &self.bind(extensions))
    }

    /// Apply a transform field with stylesheet parameters. The result is not cached.
    pub fn transform<K, V>(
        &self,
        name: &str,
        params: impl IntoIterator<Item = (K, V)>,
    ) -> std::result::Result<Value, FieldError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let field = self.field(name)?;
        if field.program_spec().is_none() {
            return Err(FieldError::Validation {
                field: name.to_string(),
                message: "not a transform field".to_string(),
            });
        }
        let params: Vec<(String, String)> = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.run_program(field, &params)
    }

    /// Every field except the root, as a JSON object.
    pub fn to_json(&self) -> std::result::Result<serde_json::Value, FieldError> {
        let mut object = serde_json::Map::new();
        for field in self.schema().fields().filter(|f| !f.is_root()) {
            let value = self.get(field.name())?;
            object.insert(field.name().to_string(), value.to_json()?);
        }
        Ok(serde_json::Value::Object(object))
    }

    pub(crate) fn with_slot<R>(&self, index: usize, f: impl FnOnce(&mut Slot) -> R) -> R {
        f(&mut self.inner.slots.borrow_mut()[index])
    }

    pub(crate) fn run_query(
        &self,
        field: &Field,
        query: &str,
    ) -> std::result::Result<RawResult, FieldError> {
        let namespaces = self.schema().options().namespaces_with(&field.extra_namespaces);
        evaluate(self.root(), query, &namespaces, &self.bind(&field.extensions)).map_err(|source| {
            FieldError::Query {
                field: field.name().to_string(),
                source,
            }
        })
    }

    pub(crate) fn run_program(
        &self,
        field: &Field,
        params: &[(String, String)],
    ) -> std::result::Result<Value, FieldError> {
        let Some(spec) = field.program_spec() else {
            return Ok(Value::Null);
        };
        let parser_options = field
            .parser_options
            .unwrap_or(self.schema().options().parser_options);
        let program = spec.program(field.name(), parser_options)?;
        let vm = VM::builder()
            .params(params.iter().cloned())
            .extensions(self.bind(&field.extensions))
            .build();
        let result = match program.as_ref() {
            Program::Stylesheet(stylesheet) => vm.apply(stylesheet, self.root()).map(Value::Output),
            Program::Rules(rules) => vm.validate(rules, self.root()).map(Value::Validation),
        };
        result.map_err(|source| FieldError::Transform {
            field: field.name().to_string(),
            source,
        })
    }

    /// Schema extensions and `local` ones, bound to this instance.
    fn bind(&self, local: &ExtensionRegistry) -> Extensions {
        let mut bound = Extensions::new();
        if local.is_empty() {
            self.schema().extensions().bind(self, &mut bound);
        } else {
            self.schema().extensions().layered(local).bind(self, &mut bound);
        }
        bound
    }

    fn field(&self, name: &str) -> std::result::Result<&Arc<Field>, FieldError> {
        self.schema()
            .field(name)
            .ok_or_else(|| self.unknown_field(name))
    }

    fn accessor(
        &self,
        name: &str,
    ) -> std::result::Result<&dyn crate::accessor::FieldAccessor, FieldError> {
        self.schema()
            .accessor(name)
            .ok_or_else(|| self.unknown_field(name))
    }

    fn unknown_field(&self, name: &str) -> FieldError {
        FieldError::UnknownField {
            schema: self.schema().key(),
            field: name.to_string(),
        }
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(self.schema(), other.schema()) && self.root() == other.root()
    }
}

impl Eq for Instance {}

impl Hash for Instance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(self.schema()).hash(state);
        self.root().hash(state);
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("schema", &self.schema().key())
            .field("root", self.root())
            .finish()
    }
}
