//! Expression evaluation shared by every program kind.

use std::collections::{HashMap, HashSet};

use sxd_xpath::nodeset::Node;
use sxd_xpath::{Context, Value, XPath};
use xmlview_compiler::diagnostics::{DiagnosticKind, Diagnostics, Span};
use xmlview_compiler::ir::{ExprId, ExpressionTable};
use xmlview_core::{Document, Extensions, Namespaces};

use super::error::RuntimeError;
use super::vm::FuelLimits;

pub(crate) struct Evaluator<'p, 'd> {
    expressions: &'p ExpressionTable,
    compiled: Vec<XPath>,
    context: Context<'d>,
    /// Variables in scope, innermost last.
    scopes: Vec<(String, Value<'d>)>,
    root: Node<'d>,
    /// Root plus every element, in document order.
    candidates: Option<Vec<Node<'d>>>,
    matches: HashMap<ExprId, HashSet<Node<'d>>>,
    exec_fuel: u32,
    depth: u32,
    limits: FuelLimits,
    pub(crate) diagnostics: Diagnostics,
}

impl<'p, 'd> Evaluator<'p, 'd> {
    pub(crate) fn new(
        expressions: &'p ExpressionTable,
        namespaces: &Namespaces,
        extensions: &Extensions,
        doc: &Document,
        root: Node<'d>,
        limits: FuelLimits,
    ) -> Result<Self, RuntimeError> {
        let mut compiled = Vec::with_capacity(expressions.len());
        for (_, expression) in expressions.iter() {
            let xpath = xmlview_core::query::compile(&expression.source).map_err(|e| {
                RuntimeError::Evaluation {
                    message: e.to_string(),
                    span: expression.span,
                }
            })?;
            compiled.push(xpath);
        }
        Ok(Self {
            expressions,
            compiled,
            context: xmlview_core::query::build_context(doc, namespaces, extensions),
            scopes: Vec::new(),
            root,
            candidates: None,
            matches: HashMap::new(),
            exec_fuel: limits.get_exec_fuel(),
            depth: 0,
            limits,
            diagnostics: Diagnostics::new(),
        })
    }

    pub(crate) fn root(&self) -> Node<'d> {
        self.root
    }

    pub(crate) fn span(&self, id: ExprId) -> Option<Span> {
        self.expressions.get(id).span
    }

    pub(crate) fn source(&self, id: ExprId) -> &'p str {
        &self.expressions.get(id).source
    }

    /// Spend one step of fuel.
    pub(crate) fn tick(&mut self) -> Result<(), RuntimeError> {
        if self.exec_fuel == 0 {
            return Err(RuntimeError::ExecFuelExhausted(self.limits.get_exec_fuel()));
        }
        self.exec_fuel -= 1;
        Ok(())
    }

    pub(crate) fn enter(&mut self) -> Result<(), RuntimeError> {
        if self.depth >= self.limits.get_recursion_limit() {
            return Err(RuntimeError::RecursionLimitExceeded(
                self.limits.get_recursion_limit(),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub(crate) fn bind(&mut self, name: &str, value: Value<'d>) {
        self.scopes.push((name.to_string(), value));
    }

    pub(crate) fn scope_mark(&self) -> usize {
        self.scopes.len()
    }

    pub(crate) fn restore(&mut self, mark: usize) {
        self.scopes.truncate(mark);
    }

    pub(crate) fn evaluate(&mut self, id: ExprId, node: Node<'d>) -> Result<Value<'d>, RuntimeError> {
        self.tick()?;
        for (name, value) in &self.scopes {
            self.context.set_variable(name.as_str(), value.clone());
        }
        self.compiled[id.index()]
            .evaluate(&self.context, node)
            .map_err(|e| RuntimeError::Evaluation {
                message: format!("query `{}` failed: {e:?}", self.source(id)),
                span: self.span(id),
            })
    }

    pub(crate) fn string(&mut self, id: ExprId, node: Node<'d>) -> Result<String, RuntimeError> {
        Ok(self.evaluate(id, node)?.into_string())
    }

    pub(crate) fn boolean(&mut self, id: ExprId, node: Node<'d>) -> Result<bool, RuntimeError> {
        Ok(self.evaluate(id, node)?.boolean())
    }

    /// Evaluate an expression that must select nodes.
    pub(crate) fn nodes(&mut self, id: ExprId, node: Node<'d>) -> Result<Vec<Node<'d>>, RuntimeError> {
        match self.evaluate(id, node)? {
            Value::Nodeset(nodes) => Ok(nodes.document_order()),
            other => Err(RuntimeError::Evaluation {
                message: format!(
                    "`{}` must select nodes, got {:?}",
                    self.source(id),
                    other.into_string()
                ),
                span: self.span(id),
            }),
        }
    }

    /// Whether `node` matches the pattern `id`.
    ///
    /// A node matches when some context (the root or any element) selects it.
    pub(crate) fn matches(&mut self, id: ExprId, node: Node<'d>) -> Result<bool, RuntimeError> {
        if let Some(set) = self.matches.get(&id) {
            return Ok(set.contains(&node));
        }
        let contexts = if self.source(id).starts_with('/') {
            vec![self.root]
        } else {
            self.candidates().to_vec()
        };
        let mut set = HashSet::new();
        for context in contexts {
            if let Value::Nodeset(nodes) = self.evaluate(id, context)? {
                set.extend(nodes.document_order());
            }
        }
        let found = set.contains(&node);
        self.matches.insert(id, set);
        Ok(found)
    }

    /// Root, then every element and its attributes, in document order.
    pub(crate) fn rule_contexts(&mut self) -> Vec<Node<'d>> {
        let mut nodes = Vec::new();
        for &node in self.candidates() {
            nodes.push(node);
            if let Node::Element(e) = node {
                nodes.extend(e.attributes().into_iter().map(Node::Attribute));
            }
        }
        nodes
    }

    fn candidates(&mut self) -> &[Node<'d>] {
        let root = self.root;
        self.candidates.get_or_insert_with(|| {
            let mut out = vec![root];
            collect_elements(root, &mut out);
            out
        })
    }

    pub(crate) fn message(&mut self, text: &str, span: Option<Span>) {
        self.diagnostics
            .report(DiagnosticKind::Message, span)
            .message(text)
            .emit();
    }
}

fn collect_elements<'d>(node: Node<'d>, out: &mut Vec<Node<'d>>) {
    for child in node.children() {
        if let Node::Element(_) = child {
            out.push(child);
            collect_elements(child, out);
        }
    }
}
