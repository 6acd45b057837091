//! Entry points for running compiled programs.

use indexmap::IndexMap;
use sxd_document::Package;
use sxd_xpath::nodeset::Node;
use xmlview_compiler::Diagnostics;
use xmlview_compiler::diagnostics::DiagnosticKind;
use xmlview_compiler::rules::RuleSchema;
use xmlview_compiler::stylesheet::Stylesheet;
use xmlview_core::{Document, Extensions, Method, NodeRef, ParserOptions};

use super::apply::Apply;
use super::error::{RuntimeError, TransformError};
use super::eval::Evaluator;
use super::output::{OutputBuilder, TransformOutput};
use super::rules::{Validate, Validation};

/// Runtime limits for program execution.
#[derive(Clone, Copy, Debug)]
pub struct FuelLimits {
    /// Maximum total steps (default: 1,000,000).
    pub(crate) exec_fuel: u32,
    /// Maximum template nesting (default: 1,024).
    pub(crate) recursion_limit: u32,
}

impl Default for FuelLimits {
    fn default() -> Self {
        Self {
            exec_fuel: 1_000_000,
            recursion_limit: 1024,
        }
    }
}

impl FuelLimits {
    /// Create new fuel limits with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the execution fuel limit.
    pub fn exec_fuel(mut self, fuel: u32) -> Self {
        self.exec_fuel = fuel;
        self
    }

    /// Set the recursion limit.
    pub fn recursion_limit(mut self, limit: u32) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn get_exec_fuel(&self) -> u32 {
        self.exec_fuel
    }
    pub fn get_recursion_limit(&self) -> u32 {
        self.recursion_limit
    }
}

/// Applies compiled programs to documents.
///
/// A VM carries everything bound per run (extensions, parameters, limits);
/// the programs themselves are shared and never mutated.
#[derive(Clone, Debug, Default)]
pub struct VM {
    limits: FuelLimits,
    params: IndexMap<String, String>,
    extensions: Extensions,
}

/// Builder for VM instances.
#[derive(Default)]
pub struct VMBuilder {
    limits: FuelLimits,
    params: IndexMap<String, String>,
    extensions: Extensions,
}

impl VMBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fuel limits.
    pub fn limits(mut self, limits: FuelLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the execution fuel limit.
    pub fn exec_fuel(mut self, fuel: u32) -> Self {
        self.limits = self.limits.exec_fuel(fuel);
        self
    }

    /// Set the recursion limit.
    pub fn recursion_limit(mut self, limit: u32) -> Self {
        self.limits = self.limits.recursion_limit(limit);
        self
    }

    /// Set a top-level stylesheet parameter, passed as a string.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Extension functions visible to every expression of the run.
    pub fn extensions(mut self, extensions: Extensions) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn build(self) -> VM {
        VM {
            limits: self.limits,
            params: self.params,
            extensions: self.extensions,
        }
    }
}

impl VM {
    pub fn builder() -> VMBuilder {
        VMBuilder::new()
    }

    pub fn limits(&self) -> FuelLimits {
        self.limits
    }

    /// Apply a stylesheet with `input` as the source tree.
    ///
    /// An element input is treated as the document element of its own tree.
    pub fn apply(&self, stylesheet: &Stylesheet, input: &NodeRef) -> Result<TransformOutput, TransformError> {
        let input_doc = source_document(input)?;
        let dom = input_doc.dom();
        let root = Node::Root(dom.root());

        let package = Package::new();
        let (text, diagnostics) = {
            let mut out = OutputBuilder::new(package.as_document(), stylesheet.output);
            let mut eval = Evaluator::new(
                &stylesheet.expressions,
                &stylesheet.namespaces,
                &self.extensions,
                &input_doc,
                root,
                self.limits,
            )
            .map_err(|e| TransformError::from_runtime(e, Diagnostics::new()))?;

            let result = Apply::new(stylesheet, &mut eval, &mut out).run(&self.params);
            let diagnostics = std::mem::take(&mut eval.diagnostics);
            if let Err(e) = result {
                tracing::debug!(error = %e, "stylesheet failed");
                return Err(TransformError::from_runtime(e, diagnostics));
            }
            (out.finish(), diagnostics)
        };

        tracing::debug!(
            templates = stylesheet.templates.len(),
            diagnostics = diagnostics.len(),
            "applied stylesheet"
        );
        Ok(TransformOutput {
            document: Document::from_package(package, ParserOptions::default()),
            method: stylesheet.output,
            text,
            diagnostics,
        })
    }

    /// Check `input` against a rule schema, producing SVRL and a report.
    pub fn validate(&self, schema: &RuleSchema, input: &NodeRef) -> Result<Validation, TransformError> {
        let input_doc = source_document(input)?;
        let dom = input_doc.dom();
        let root = Node::Root(dom.root());

        let package = Package::new();
        let (report, diagnostics) = {
            let mut out = OutputBuilder::new(package.as_document(), Method::Xml);
            let mut eval = Evaluator::new(
                &schema.expressions,
                &schema.namespaces,
                &self.extensions,
                &input_doc,
                root,
                self.limits,
            )
            .map_err(|e| TransformError::from_runtime(e, Diagnostics::new()))?;

            let result = Validate::new(schema, &mut eval, &mut out).run();
            let diagnostics = std::mem::take(&mut eval.diagnostics);
            match result {
                Ok(report) => (report, diagnostics),
                Err(e) => return Err(TransformError::from_runtime(e, diagnostics)),
            }
        };

        Ok(Validation {
            report,
            output: TransformOutput {
                document: Document::from_package(package, ParserOptions::default()),
                method: Method::Xml,
                text: String::new(),
                diagnostics,
            },
        })
    }
}

fn source_document(input: &NodeRef) -> Result<Document, TransformError> {
    Document::from_subtree(input).ok_or_else(|| {
        let mut diagnostics = Diagnostics::new();
        diagnostics
            .report(DiagnosticKind::EvaluationFailed, None)
            .message("input must be a document or an element")
            .emit();
        TransformError::new(diagnostics)
    })
}
