//! Schema declaration and preparation.
//!
//! A [`SchemaBuilder`] collects fields, extensions and metadata. Preparing
//! it merges everything inherited from the parent schema and produces an
//! immutable [`Schema`], shared behind an `Arc`.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::accessor::{FieldAccessor, accessor_for};
use crate::error::ConfigError;
use crate::extension::{ExtensionDecl, ExtensionRegistry};
use crate::field::Field;
use crate::options::{Meta, Options};
use crate::registry::Registry;

/// Group used when neither the builder nor a parent names one.
pub const DEFAULT_GROUP: &str = "default";

/// Name of the synthesized root field.
pub const ROOT_FIELD: &str = "root";

pub struct SchemaBuilder {
    name: String,
    group: Option<String>,
    parent: Option<Arc<Schema>>,
    meta: Meta,
    fields: Vec<(String, Field)>,
    extensions: Vec<ExtensionDecl>,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: None,
            parent: None,
            meta: Meta::default(),
            fields: Vec::new(),
            extensions: Vec::new(),
        }
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn extends(mut self, parent: &Arc<Schema>) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    pub fn meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.push((name.into(), field));
        self
    }

    pub fn extension(mut self, extension: ExtensionDecl) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Prepare and register in the process-wide registry.
    pub fn register(self) -> Result<Arc<Schema>, ConfigError> {
        let schema = self.prepare()?;
        Ok(Registry::global().register(schema))
    }

    /// Merge the declaration with its ancestors.
    pub fn prepare(self) -> Result<Arc<Schema>, ConfigError> {
        let group = self
            .group
            .or_else(|| self.parent.as_ref().map(|p| p.group.clone()))
            .unwrap_or_else(|| DEFAULT_GROUP.to_string());
        let key = format!("{group}.{}", self.name);

        let inherited = self.parent.as_ref().map(|p| &p.options);
        let options = Options::merge(inherited.unwrap_or(&Options::default()), &self.meta)?;
        let default_ns = options.extension_namespace_uri.as_deref();

        let mut local_extensions = ExtensionRegistry::new();
        for decl in &self.extensions {
            local_extensions.register(
                decl.namespace.as_deref(),
                &decl.name,
                decl.function.clone(),
                default_ns,
                &key,
            )?;
        }
        let extensions = match &self.parent {
            Some(parent) => parent.extensions.layered(&local_extensions),
            None => local_extensions,
        };

        let mut local: Vec<(String, Field)> = Vec::with_capacity(self.fields.len());
        for (name, field) in self.fields {
            if local.iter().any(|(n, _)| *n == name) {
                return Err(ConfigError::DuplicateField {
                    field: name,
                    schema: key,
                });
            }
            if let Some(parent) = &self.parent
                && parent.fields.contains_key(&name)
            {
                return Err(ConfigError::FieldCollision {
                    ancestor: parent.declaring_schema(&name).key(),
                    field: name,
                    schema: key,
                });
            }
            local.push((name, field));
        }
        local.sort_by_key(|(_, field)| field.creation_order());

        let local_roots = local.iter().filter(|(_, f)| f.is_root()).count();
        let inherited_root = self.parent.as_ref().map(|p| p.root_field.clone());
        if local_roots > 1 || (local_roots == 1 && inherited_root.is_some()) {
            return Err(ConfigError::DuplicateRootField { schema: key });
        }

        let mut merged: Vec<Field> = Vec::new();
        let root_field = match (&inherited_root, local.iter().find(|(_, f)| f.is_root())) {
            (Some(root), _) => root.clone(),
            (None, Some((name, _))) => name.clone(),
            (None, None) => {
                if local.iter().any(|(n, _)| n == ROOT_FIELD) {
                    return Err(ConfigError::InvalidField {
                        field: ROOT_FIELD.to_string(),
                        message: "name is reserved for the root field".to_string(),
                    });
                }
                merged.push(Field::root().named(ROOT_FIELD));
                ROOT_FIELD.to_string()
            }
        };
        if let Some(parent) = &self.parent {
            merged.extend(parent.fields.values().map(|f| f.inherit()));
        }
        for (name, field) in local {
            let mut field = field.named(&name);
            for decl in &field.extension_decls {
                field.extensions.register(
                    decl.namespace.as_deref(),
                    &decl.name,
                    decl.function.clone(),
                    default_ns,
                    &key,
                )?;
            }
            merged.push(field);
        }
        // The root field always comes first.
        if let Some(pos) = merged.iter().position(|f| f.name == root_field)
            && pos != 0
        {
            let root = merged.remove(pos);
            merged.insert(0, root);
        }

        let mut fields = IndexMap::with_capacity(merged.len());
        let mut accessors: IndexMap<String, Box<dyn FieldAccessor>> =
            IndexMap::with_capacity(merged.len());
        for (index, field) in merged.into_iter().enumerate() {
            let field = Arc::new(field);
            accessors.insert(field.name.clone(), accessor_for(index, field.clone()));
            fields.insert(field.name.clone(), field);
        }

        tracing::debug!(schema = %key, fields = fields.len(), extensions = extensions.len(), "prepared schema");

        Ok(Arc::new(Schema {
            name: self.name,
            group,
            parent: self.parent,
            options,
            fields,
            accessors,
            root_field,
            extensions,
        }))
    }
}

/// A prepared schema. Immutable, shared by every instance.
pub struct Schema {
    name: String,
    group: String,
    parent: Option<Arc<Schema>>,
    options: Options,
    fields: IndexMap<String, Arc<Field>>,
    accessors: IndexMap<String, Box<dyn FieldAccessor>>,
    root_field: String,
    extensions: ExtensionRegistry,
}

impl Schema {
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// `group.name`, as used in messages and registry keys.
    pub fn key(&self) -> String {
        format!("{}.{}", self.group, self.name)
    }

    pub fn parent(&self) -> Option<&Arc<Schema>> {
        self.parent.as_ref()
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Every field, inherited first.
    pub fn fields(&self) -> impl Iterator<Item = &Arc<Field>> {
        self.fields.values()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn field(&self, name: &str) -> Option<&Arc<Field>> {
        self.fields.get(name)
    }

    pub fn root_field(&self) -> &str {
        &self.root_field
    }

    /// Merged extensions: local entries over inherited ones.
    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    pub(crate) fn accessor(&self, name: &str) -> Option<&dyn FieldAccessor> {
        self.accessors.get(name).map(|a| a.as_ref())
    }

    pub(crate) fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Whether `self` is `other` or one of its descendants.
    pub fn extends(&self, other: &Schema) -> bool {
        let mut current = Some(self);
        while let Some(schema) = current {
            if std::ptr::eq(schema, other) {
                return true;
            }
            current = schema.parent.as_deref();
        }
        false
    }

    /// The topmost ancestor declaring `field`.
    fn declaring_schema(&self, field: &str) -> &Schema {
        match &self.parent {
            Some(parent) if parent.fields.contains_key(field) => parent.declaring_schema(field),
            _ => self,
        }
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("key", &self.key())
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("root_field", &self.root_field)
            .field("extensions", &self.extensions)
            .finish()
    }
}
