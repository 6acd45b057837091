//! XPath evaluation with namespace bindings and extension functions.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use sxd_xpath::context::Evaluation;
use sxd_xpath::function::{self, Function};
use sxd_xpath::nodeset::{Node, Nodeset};
use sxd_xpath::{Context, Factory, Value, XPath};

use crate::document::{Document, NodeRef};
use crate::result::{Item, RawResult};

/// Prefix to namespace URI.
pub type Namespaces = IndexMap<String, String>;

/// An extension callable, already bound to whatever state it reads.
///
/// Receives the context node of the call, `None` for attribute and namespace
/// contexts, and the evaluated arguments.
pub type BoundExtension = Rc<dyn Fn(Option<&NodeRef>, &[RawResult]) -> Result<RawResult, String>>;

/// Extension functions keyed by `(namespace URI, local name)`.
#[derive(Clone, Default)]
pub struct Extensions {
    entries: IndexMap<(String, String), BoundExtension>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a callable, replacing any previous entry for the same key.
    pub fn insert(&mut self, uri: impl Into<String>, name: impl Into<String>, callable: BoundExtension) {
        self.entries.insert((uri.into(), name.into()), callable);
    }

    pub fn get(&self, uri: &str, name: &str) -> Option<&BoundExtension> {
        self.entries.get(&(uri.to_string(), name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(String, String), &BoundExtension)> {
        self.entries.iter()
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.entries.keys().map(|(uri, name)| format!("{{{uri}}}{name}")))
            .finish()
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum QueryError {
    #[error("invalid query {query:?}: {message}")]
    Compile { query: String, message: String },
    #[error("query {query:?} failed: {message}")]
    Execution { query: String, message: String },
    #[error("context node is not part of its document")]
    DetachedNode,
}

/// Compile a query, reporting syntax errors.
pub fn compile(query: &str) -> Result<XPath, QueryError> {
    let compiled = Factory::new().build(query).map_err(|e| QueryError::Compile {
        query: query.to_string(),
        message: format!("{e:?}"),
    })?;
    compiled.ok_or_else(|| QueryError::Compile {
        query: query.to_string(),
        message: "empty query".to_string(),
    })
}

/// Evaluate `query` with `context` as the context node.
pub fn evaluate(
    context: &NodeRef,
    query: &str,
    namespaces: &Namespaces,
    extensions: &Extensions,
) -> Result<RawResult, QueryError> {
    let xpath = compile(query)?;
    let node = context.node().ok_or(QueryError::DetachedNode)?;
    let doc = context.document();
    let ctx = build_context(doc, namespaces, extensions);
    let value = xpath.evaluate(&ctx, node).map_err(|e| QueryError::Execution {
        query: query.to_string(),
        message: format!("{e:?}"),
    })?;
    Ok(to_raw(doc, value))
}

/// Evaluation context with namespaces and extensions installed.
pub fn build_context<'d>(doc: &Document, namespaces: &Namespaces, extensions: &Extensions) -> Context<'d> {
    let mut ctx = Context::new();
    for (prefix, uri) in namespaces {
        if !prefix.is_empty() {
            ctx.set_namespace(prefix, uri);
        }
    }
    for ((uri, name), callable) in extensions.iter() {
        ctx.set_function(
            (uri.as_str(), name.as_str()),
            ExtensionCall {
                doc: doc.clone(),
                callable: callable.clone(),
            },
        );
    }
    ctx
}

pub fn to_raw(doc: &Document, value: Value<'_>) -> RawResult {
    match value {
        Value::Boolean(b) => RawResult::Scalar(Item::Boolean(b)),
        Value::Number(n) => RawResult::Scalar(Item::Number(n)),
        Value::String(s) => RawResult::Scalar(Item::Text(s)),
        Value::Nodeset(nodes) => RawResult::Sequence(
            nodes
                .document_order()
                .into_iter()
                .map(|node| node_item(doc, node))
                .collect(),
        ),
    }
}

pub fn node_item(doc: &Document, node: Node<'_>) -> Item {
    match NodeRef::from_node(doc, node) {
        Some(node_ref) => Item::Node(node_ref),
        None => Item::Text(node.string_value()),
    }
}

/// Convert a result back into an XPath value living in the tree of `anchor`.
///
/// Nodes of other documents degrade to their string value.
pub fn from_raw<'d>(doc: &Document, anchor: Node<'d>, raw: RawResult) -> Result<Value<'d>, String> {
    let root = tree_root(anchor);
    let mut nodes = Nodeset::new();
    match raw {
        RawResult::Null => Ok(Value::Nodeset(nodes)),
        RawResult::Scalar(item) => match resolve_item(doc, root, &item) {
            Some(node) => {
                nodes.add(node);
                Ok(Value::Nodeset(nodes))
            }
            None => Ok(scalar_value(item)),
        },
        RawResult::Sequence(items) => {
            for item in &items {
                match resolve_item(doc, root, item) {
                    Some(node) => nodes.add(node),
                    None if items.len() == 1 => return Ok(scalar_value(item.clone())),
                    None => return Err("sequence mixes nodes and values".to_string()),
                }
            }
            Ok(Value::Nodeset(nodes))
        }
    }
}

fn scalar_value<'d>(item: Item) -> Value<'d> {
    match item {
        Item::Boolean(b) => Value::Boolean(b),
        Item::Number(n) => Value::Number(n),
        other => Value::String(other.string_value()),
    }
}

fn tree_root(node: Node<'_>) -> Node<'_> {
    let mut current = node;
    while let Some(parent) = current.parent() {
        current = parent;
    }
    current
}

fn resolve_item<'d>(doc: &Document, root: Node<'d>, item: &Item) -> Option<Node<'d>> {
    let node_ref = item.as_node()?;
    if !node_ref.document().same(doc) {
        return None;
    }
    node_ref.resolve_from(root)
}

struct ExtensionCall {
    doc: Document,
    callable: BoundExtension,
}

impl ExtensionCall {
    /// Handle for `node` when it lives in this call's document.
    fn context_node(&self, node: Node<'_>) -> Option<NodeRef> {
        if tree_root(node) != Node::Root(self.doc.dom().root()) {
            return None;
        }
        NodeRef::from_node(&self.doc, node)
    }
}

impl Function for ExtensionCall {
    fn evaluate<'c, 'd>(
        &self,
        context: &Evaluation<'c, 'd>,
        args: Vec<Value<'d>>,
    ) -> Result<Value<'d>, function::Error> {
        let args: Vec<RawResult> = args.into_iter().map(|a| to_raw(&self.doc, a)).collect();
        let node = self.context_node(context.node);
        let result = (self.callable)(node.as_ref(), &args).map_err(function::Error::Other)?;
        from_raw(&self.doc, context.node, result).map_err(function::Error::Other)
    }
}
