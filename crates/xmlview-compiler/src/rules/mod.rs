//! Rule schemas: a subset of ISO Schematron.
//!
//! A schema holds patterns of rules. Each rule selects context nodes and runs
//! `assert` (fails when false) and `report` (fires when true) checks against
//! them. Phases pick which patterns are active.

#[cfg(test)]
mod tests;

use indexmap::IndexMap;
use sxd_document::dom;
use xmlview_core::{Namespaces, ParserOptions};

use crate::builder::{Builder, is_in, qualified_name, text_content};
use crate::diagnostics::{DiagnosticKind, Span};
use crate::ir::{ExprId, ExpressionTable};
use crate::{Error, PassResult};

pub const SCHEMATRON_NAMESPACE: &str = "http://purl.oclc.org/dsdl/schematron";
/// Pre-ISO namespace, still common in the wild.
pub const SCHEMATRON_1_5_NAMESPACE: &str = "http://www.ascc.net/xml/schematron";

/// Phase name selecting every pattern.
pub const ALL_PHASES: &str = "#ALL";

#[derive(Debug, Clone)]
pub struct RuleSchema {
    pub title: Option<String>,
    pub namespaces: Namespaces,
    /// Phase id to the ids of its active patterns.
    pub phases: IndexMap<String, Vec<String>>,
    /// The phase this schema was compiled for, if any.
    pub phase: Option<String>,
    pub patterns: Vec<RulePattern>,
    /// Indices into `patterns` that run.
    pub active: Vec<usize>,
    /// Schema-level `let` bindings.
    pub lets: Vec<(String, ExprId)>,
    pub expressions: ExpressionTable,
}

impl RuleSchema {
    pub fn active_patterns(&self) -> impl Iterator<Item = &RulePattern> {
        self.active.iter().map(|&i| &self.patterns[i])
    }
}

#[derive(Debug, Clone)]
pub struct RulePattern {
    pub id: Option<String>,
    pub title: Option<String>,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub context: ExprId,
    pub lets: Vec<(String, ExprId)>,
    pub checks: Vec<Check>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    /// Fails when the test is false.
    Assert,
    /// Fires when the test is true.
    Report,
}

#[derive(Debug, Clone)]
pub struct Check {
    pub kind: CheckKind,
    pub test: ExprId,
    pub id: Option<String>,
    pub role: Option<String>,
    pub message: Vec<MessagePart>,
}

#[derive(Debug, Clone)]
pub enum MessagePart {
    Text(String),
    ValueOf(ExprId),
    /// Name of the node selected by the path, or of the context node.
    Name(Option<ExprId>),
}

/// Compile a rule schema for `phase` (`None` uses the schema's default phase).
pub fn compile_rules(
    source: &str,
    options: ParserOptions,
    phase: Option<&str>,
) -> PassResult<RuleSchema> {
    let mut builder = Builder::new(source);
    let doc = match xmlview_core::parse_str(source, options) {
        Ok(doc) => doc,
        Err(e) => {
            builder
                .diagnostics
                .report(DiagnosticKind::NotWellFormed, Some(Span::empty(0)))
                .message(e.to_string())
                .emit();
            return Err(Error::RuleSchema(builder.diagnostics));
        }
    };
    let dom = doc.dom();
    let root = dom.root().children().into_iter().find_map(|c| match c {
        dom::ChildOfRoot::Element(e) => Some(e),
        _ => None,
    });

    let mut compiler = RulesCompiler {
        builder,
        namespace: SCHEMATRON_NAMESPACE,
        title: None,
        phases: IndexMap::new(),
        phase_spans: IndexMap::new(),
        default_phase: None,
        patterns: Vec::new(),
        lets: Vec::new(),
    };

    match root {
        Some(root) if root.name().local_part() == "schema" && is_rules_element(root) => {
            if is_in(root, SCHEMATRON_1_5_NAMESPACE) {
                compiler.namespace = SCHEMATRON_1_5_NAMESPACE;
            }
            compiler.schema(root);
        }
        _ => {
            compiler
                .builder
                .diagnostics
                .report(DiagnosticKind::NotARuleSchema, Some(Span::empty(0)))
                .emit();
        }
    }

    compiler.finish(phase)
}

fn is_rules_element(element: dom::Element<'_>) -> bool {
    is_in(element, SCHEMATRON_NAMESPACE) || is_in(element, SCHEMATRON_1_5_NAMESPACE)
}

struct RulesCompiler<'s> {
    builder: Builder<'s>,
    namespace: &'static str,
    title: Option<String>,
    phases: IndexMap<String, Vec<String>>,
    phase_spans: IndexMap<String, Option<Span>>,
    default_phase: Option<(String, Option<Span>)>,
    patterns: Vec<RulePattern>,
    lets: Vec<(String, ExprId)>,
}

impl RulesCompiler<'_> {
    fn finish(mut self, phase: Option<&str>) -> PassResult<RuleSchema> {
        let requested = match phase {
            Some(p) => Some((p.to_string(), None)),
            None => self.default_phase.take(),
        };
        let active = self.resolve_phase(requested.as_ref());

        let Builder {
            diagnostics,
            expressions,
            namespaces,
            ..
        } = self.builder;
        if diagnostics.has_errors() {
            return Err(Error::RuleSchema(diagnostics));
        }

        tracing::debug!(
            patterns = self.patterns.len(),
            active = active.len(),
            "compiled rule schema"
        );
        let schema = RuleSchema {
            title: self.title,
            namespaces,
            phases: self.phases,
            phase: requested.map(|(p, _)| p).filter(|p| p != ALL_PHASES),
            patterns: self.patterns,
            active,
            lets: self.lets,
            expressions,
        };
        Ok((schema, diagnostics))
    }

    fn resolve_phase(&mut self, requested: Option<&(String, Option<Span>)>) -> Vec<usize> {
        let all: Vec<usize> = (0..self.patterns.len()).collect();
        let Some((phase, span)) = requested else {
            return all;
        };
        if phase == ALL_PHASES {
            return all;
        }
        let Some(ids) = self.phases.get(phase) else {
            self.builder
                .diagnostics
                .report(DiagnosticKind::UndefinedPhase, *span)
                .message(phase)
                .emit();
            return Vec::new();
        };
        let mut active = Vec::new();
        for id in ids {
            match self
                .patterns
                .iter()
                .position(|p| p.id.as_deref() == Some(id.as_str()))
            {
                Some(index) => active.push(index),
                None => {
                    let span = self.phase_spans.get(phase).copied().flatten();
                    self.builder
                        .diagnostics
                        .report(DiagnosticKind::UndefinedPattern, span)
                        .message(id)
                        .emit();
                }
            }
        }
        active.sort_unstable();
        active
    }

    fn is_own(&self, element: dom::Element<'_>) -> bool {
        is_in(element, self.namespace)
    }

    fn schema(&mut self, root: dom::Element<'_>) {
        let tag = self.builder.enter(root);
        if let Some(default) = root.attribute_value("defaultPhase") {
            let span = self.builder.attr_span(tag, "defaultPhase");
            self.default_phase = Some((default.to_string(), span));
        }
        for child in root.children() {
            let dom::ChildOfElement::Element(element) = child else {
                continue;
            };
            let tag = self.builder.enter(element);
            if !self.is_own(element) {
                continue;
            }
            match element.name().local_part() {
                "title" => self.title = Some(text_content(element).trim().to_string()),
                "ns" => {
                    let prefix = self.builder.required(element, tag, "prefix");
                    let uri = self.builder.required(element, tag, "uri");
                    if let (Some(prefix), Some(uri)) = (prefix, uri) {
                        self.builder
                            .namespaces
                            .insert(prefix.to_string(), uri.to_string());
                    }
                }
                "phase" => self.phase(element, tag),
                "pattern" => self.pattern(element, tag),
                "let" => {
                    if let Some(binding) = self.let_binding(element, tag) {
                        self.lets.push(binding);
                    }
                }
                "p" | "diagnostics" | "include" => {
                    let name = qualified_name(element);
                    self.builder
                        .diagnostics
                        .report(DiagnosticKind::IgnoredElement, tag)
                        .message(&name)
                        .emit();
                }
                _ => {
                    let name = qualified_name(element);
                    self.builder
                        .diagnostics
                        .report(DiagnosticKind::MisplacedInstruction, tag)
                        .message(&name)
                        .emit();
                }
            }
        }
    }

    fn phase(&mut self, element: dom::Element<'_>, tag: Option<Span>) {
        let Some(id) = self.builder.required(element, tag, "id").map(str::to_string) else {
            return;
        };
        let mut active = Vec::new();
        for child in element.children() {
            let dom::ChildOfElement::Element(e) = child else {
                continue;
            };
            let tag = self.builder.enter(e);
            if self.is_own(e) && e.name().local_part() == "active" {
                if let Some(pattern) = self.builder.required(e, tag, "pattern") {
                    active.push(pattern.to_string());
                }
            }
        }
        self.phase_spans.insert(id.clone(), tag);
        self.phases.insert(id, active);
    }

    fn pattern(&mut self, element: dom::Element<'_>, _tag: Option<Span>) {
        let mut pattern = RulePattern {
            id: element.attribute_value("id").map(str::to_string),
            title: None,
            rules: Vec::new(),
        };
        for child in element.children() {
            let dom::ChildOfElement::Element(e) = child else {
                continue;
            };
            let tag = self.builder.enter(e);
            if !self.is_own(e) {
                continue;
            }
            match e.name().local_part() {
                "title" => pattern.title = Some(text_content(e).trim().to_string()),
                "rule" => {
                    if let Some(rule) = self.rule(e, tag) {
                        pattern.rules.push(rule);
                    }
                }
                "p" | "let" => {}
                _ => {
                    let name = qualified_name(e);
                    self.builder
                        .diagnostics
                        .report(DiagnosticKind::MisplacedInstruction, tag)
                        .message(&name)
                        .emit();
                }
            }
        }
        self.patterns.push(pattern);
    }

    fn rule(&mut self, element: dom::Element<'_>, tag: Option<Span>) -> Option<Rule> {
        let context = self.builder.expression_attr(element, tag, "context");
        let mut lets = Vec::new();
        let mut checks = Vec::new();
        for child in element.children() {
            let dom::ChildOfElement::Element(e) = child else {
                continue;
            };
            let tag = self.builder.enter(e);
            if !self.is_own(e) {
                continue;
            }
            match e.name().local_part() {
                "assert" | "report" => {
                    let kind = if e.name().local_part() == "assert" {
                        CheckKind::Assert
                    } else {
                        CheckKind::Report
                    };
                    let test = self.builder.expression_attr(e, tag, "test");
                    let message = self.message(e);
                    if let Some(test) = test {
                        checks.push(Check {
                            kind,
                            test,
                            id: e.attribute_value("id").map(str::to_string),
                            role: e.attribute_value("role").map(str::to_string),
                            message,
                        });
                    }
                }
                "let" => {
                    if let Some(binding) = self.let_binding(e, tag) {
                        lets.push(binding);
                    }
                }
                _ => {
                    let name = qualified_name(e);
                    self.builder
                        .diagnostics
                        .report(DiagnosticKind::MisplacedInstruction, tag)
                        .message(&name)
                        .emit();
                }
            }
        }
        Some(Rule {
            context: context?,
            lets,
            checks,
        })
    }

    fn let_binding(&mut self, element: dom::Element<'_>, tag: Option<Span>) -> Option<(String, ExprId)> {
        let name = self.builder.required(element, tag, "name")?.to_string();
        let value = self.builder.expression_attr(element, tag, "value")?;
        Some((name, value))
    }

    fn message(&mut self, element: dom::Element<'_>) -> Vec<MessagePart> {
        let mut parts = Vec::new();
        for child in element.children() {
            match child {
                dom::ChildOfElement::Text(t) => parts.push(MessagePart::Text(t.text().to_string())),
                dom::ChildOfElement::Element(e) => {
                    let tag = self.builder.enter(e);
                    match (self.is_own(e), e.name().local_part()) {
                        (true, "value-of") => {
                            if let Some(select) = self.builder.expression_attr(e, tag, "select") {
                                parts.push(MessagePart::ValueOf(select));
                            }
                        }
                        (true, "name") => {
                            let path = self.builder.optional_expression_attr(e, tag, "path");
                            parts.push(MessagePart::Name(path));
                        }
                        _ => parts.push(MessagePart::Text(text_content(e))),
                    }
                }
                _ => {}
            }
        }
        parts
    }
}
