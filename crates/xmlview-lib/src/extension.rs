//! Extension functions exposed to queries and transforms.
//!
//! Schemas hold unbound functions taking the instance and the call's context
//! node ahead of the arguments. At evaluation time every entry is wrapped in a closure over the
//! evaluating instance, producing the bound set the query engine consumes.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;
use xmlview_core::{BoundExtension, Extensions, NodeRef, RawResult};

use crate::error::ConfigError;
use crate::instance::Instance;

/// An extension body. Receives the instance it runs for, the context node of
/// the call (`None` on attributes) and the call's arguments.
pub type ExtensionFn =
    Arc<dyn Fn(&Instance, Option<&NodeRef>, &[RawResult]) -> Result<RawResult, String> + Send + Sync>;

/// An extension as declared, before its namespace is known.
#[derive(Clone)]
pub struct ExtensionDecl {
    pub name: String,
    /// Explicit namespace; otherwise the schema's default extension namespace.
    pub namespace: Option<String>,
    pub function: ExtensionFn,
}

impl ExtensionDecl {
    pub fn new<F>(name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&Instance, Option<&NodeRef>, &[RawResult]) -> Result<RawResult, String>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            namespace: None,
            function: Arc::new(function),
        }
    }

    pub fn namespace(mut self, uri: impl Into<String>) -> Self {
        self.namespace = Some(uri.into());
        self
    }
}

impl fmt::Debug for ExtensionDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionDecl")
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

/// Extensions keyed by (namespace URI, local name).
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    entries: IndexMap<(String, String), ExtensionFn>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `function` under `namespace`, or `default_namespace` when absent.
    ///
    /// `schema` only names the owner in the error.
    pub fn register(
        &mut self,
        namespace: Option<&str>,
        name: &str,
        function: ExtensionFn,
        default_namespace: Option<&str>,
        schema: &str,
    ) -> Result<(), ConfigError> {
        let Some(uri) = namespace.or(default_namespace) else {
            return Err(ConfigError::ExtensionNamespace {
                name: name.to_string(),
                schema: schema.to_string(),
            });
        };
        self.entries
            .insert((uri.to_string(), name.to_string()), function);
        Ok(())
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<&ExtensionFn> {
        self.entries
            .get(&(namespace.to_string(), name.to_string()))
    }

    pub fn contains(&self, namespace: &str, name: &str) -> bool {
        self.get(namespace, name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.keys().map(|(ns, name)| (ns.as_str(), name.as_str()))
    }

    /// Entries of `local` shadow entries of `self` with the same key.
    pub fn layered(&self, local: &ExtensionRegistry) -> ExtensionRegistry {
        let mut merged = self.clone();
        for (key, function) in &local.entries {
            merged.entries.insert(key.clone(), function.clone());
        }
        merged
    }

    /// Bind every entry to `instance`.
    pub fn bind(&self, instance: &Instance, into: &mut Extensions) {
        for ((uri, name), function) in &self.entries {
            let instance = instance.clone();
            let function = function.clone();
            let bound: BoundExtension = Rc::new(move |node: Option<&NodeRef>, args: &[RawResult]| {
                function(&instance, node, args)
            });
            into.insert(uri.clone(), name.clone(), bound);
        }
    }
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}
