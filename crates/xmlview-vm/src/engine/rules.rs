//! Rule schema execution and SVRL reporting.

use sxd_xpath::Value;
use sxd_xpath::nodeset::Node;
use xmlview_compiler::rules::{
    Check, CheckKind, MessagePart, Rule, RuleSchema, SCHEMATRON_1_5_NAMESPACE, SCHEMATRON_NAMESPACE,
};

use super::error::RuntimeError;
use super::eval::Evaluator;
use super::output::{OutputBuilder, TransformOutput};

pub const SVRL_NAMESPACE: &str = "http://purl.oclc.org/dsdl/svrl";

/// Outcome of checking a document against a rule schema.
#[derive(Debug, Clone)]
pub struct Validation {
    pub report: RuleReport,
    /// The SVRL document.
    pub output: TransformOutput,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.report.is_valid()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleReport {
    pub title: Option<String>,
    pub phase: Option<String>,
    /// Number of (node, rule) firings.
    pub fired_rules: usize,
    pub findings: Vec<Finding>,
}

impl RuleReport {
    /// No assertion failed. Successful reports do not affect validity.
    pub fn is_valid(&self) -> bool {
        self.failed_asserts().next().is_none()
    }

    pub fn failed_asserts(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.kind == CheckKind::Assert)
    }

    pub fn successful_reports(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.kind == CheckKind::Report)
    }
}

/// A failed `assert` or a fired `report`.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub kind: CheckKind,
    pub pattern: Option<String>,
    /// Context expression of the rule that fired.
    pub context: String,
    pub test: String,
    /// Location path of the checked node.
    pub location: String,
    pub id: Option<String>,
    pub role: Option<String>,
    pub message: String,
}

pub(crate) struct Validate<'p, 'd, 'o, 'v> {
    schema: &'p RuleSchema,
    eval: &'v mut Evaluator<'p, 'd>,
    out: &'v mut OutputBuilder<'o>,
    report: RuleReport,
}

impl<'p, 'd, 'o, 'v> Validate<'p, 'd, 'o, 'v> {
    pub(crate) fn new(
        schema: &'p RuleSchema,
        eval: &'v mut Evaluator<'p, 'd>,
        out: &'v mut OutputBuilder<'o>,
    ) -> Self {
        Self {
            schema,
            eval,
            out,
            report: RuleReport {
                title: schema.title.clone(),
                phase: schema.phase.clone(),
                ..RuleReport::default()
            },
        }
    }

    pub(crate) fn run(mut self) -> Result<RuleReport, RuntimeError> {
        let schema = self.schema;
        let root = self.eval.root();
        for (name, expr) in &schema.lets {
            let value = self.eval.evaluate(*expr, root)?;
            self.eval.bind(name, value);
        }

        self.start("schematron-output")?;
        if let Some(title) = &schema.title {
            self.attribute("title", title)?;
        }
        if let Some(phase) = &schema.phase {
            self.attribute("phase", phase)?;
        }
        for (prefix, uri) in &schema.namespaces {
            if prefix.is_empty() || prefix == "xml" || is_rules_namespace(uri) {
                continue;
            }
            self.start("ns-prefix-in-attribute-values")?;
            self.attribute("uri", uri)?;
            self.attribute("prefix", prefix)?;
            self.out.end_element();
        }

        let nodes = self.eval.rule_contexts();
        for pattern in schema.active_patterns() {
            self.start("active-pattern")?;
            if let Some(id) = &pattern.id {
                self.attribute("id", id)?;
            }
            if let Some(title) = &pattern.title {
                self.attribute("name", title)?;
            }
            self.out.end_element();

            for &node in &nodes {
                self.eval.tick()?;
                // only the first matching rule of a pattern fires
                let mut fired = None;
                for rule in &pattern.rules {
                    if self.eval.matches(rule.context, node)? {
                        fired = Some(rule);
                        break;
                    }
                }
                if let Some(rule) = fired {
                    self.fire(pattern.id.as_deref(), rule, node)?;
                }
            }
        }
        self.out.end_element();

        tracing::debug!(
            fired = self.report.fired_rules,
            findings = self.report.findings.len(),
            "validated document"
        );
        Ok(self.report)
    }

    fn fire(&mut self, pattern: Option<&str>, rule: &'p Rule, node: Node<'d>) -> Result<(), RuntimeError> {
        self.report.fired_rules += 1;
        let context = self.eval.source(rule.context);
        self.start("fired-rule")?;
        self.attribute("context", context)?;
        self.out.end_element();

        let mark = self.eval.scope_mark();
        let result = self.checks(pattern, rule, node);
        self.eval.restore(mark);
        result
    }

    fn checks(&mut self, pattern: Option<&str>, rule: &'p Rule, node: Node<'d>) -> Result<(), RuntimeError> {
        for (name, expr) in &rule.lets {
            let value = self.eval.evaluate(*expr, node)?;
            self.eval.bind(name, value);
        }
        for check in &rule.checks {
            let passed = self.eval.boolean(check.test, node)?;
            let triggered = match check.kind {
                CheckKind::Assert => !passed,
                CheckKind::Report => passed,
            };
            if triggered {
                self.finding(pattern, rule, check, node)?;
            }
        }
        Ok(())
    }

    fn finding(
        &mut self,
        pattern: Option<&str>,
        rule: &'p Rule,
        check: &'p Check,
        node: Node<'d>,
    ) -> Result<(), RuntimeError> {
        let message = self.message(&check.message, node)?;
        let finding = Finding {
            kind: check.kind,
            pattern: pattern.map(str::to_string),
            context: self.eval.source(rule.context).to_string(),
            test: self.eval.source(check.test).to_string(),
            location: location(node),
            id: check.id.clone(),
            role: check.role.clone(),
            message,
        };

        let element = match check.kind {
            CheckKind::Assert => "failed-assert",
            CheckKind::Report => "successful-report",
        };
        self.start(element)?;
        self.attribute("test", &finding.test)?;
        if let Some(id) = &finding.id {
            self.attribute("id", id)?;
        }
        if let Some(role) = &finding.role {
            self.attribute("role", role)?;
        }
        self.attribute("location", &finding.location)?;
        self.start("text")?;
        self.out.text(&finding.message);
        self.out.end_element();
        self.out.end_element();

        self.report.findings.push(finding);
        Ok(())
    }

    fn message(&mut self, parts: &'p [MessagePart], node: Node<'d>) -> Result<String, RuntimeError> {
        let mut text = String::new();
        for part in parts {
            match part {
                MessagePart::Text(t) => text.push_str(t),
                MessagePart::ValueOf(expr) => text.push_str(&self.eval.string(*expr, node)?),
                MessagePart::Name(None) => text.push_str(&node_name(node)),
                MessagePart::Name(Some(expr)) => {
                    if let Value::Nodeset(nodes) = self.eval.evaluate(*expr, node)?
                        && let Some(first) = nodes.document_order().first()
                    {
                        text.push_str(&node_name(*first));
                    }
                }
            }
        }
        Ok(text.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    fn start(&mut self, local: &str) -> Result<(), RuntimeError> {
        self.out
            .start_element(Some(SVRL_NAMESPACE), local, Some("svrl"))
            .map_err(output_error)
    }

    fn attribute(&mut self, local: &str, value: &str) -> Result<(), RuntimeError> {
        self.out
            .attribute(None, local, None, value)
            .map_err(output_error)
    }
}

fn is_rules_namespace(uri: &str) -> bool {
    uri == SCHEMATRON_NAMESPACE || uri == SCHEMATRON_1_5_NAMESPACE
}

fn output_error(message: String) -> RuntimeError {
    RuntimeError::Output {
        message,
        span: None,
    }
}

fn node_name(node: Node<'_>) -> String {
    match node {
        Node::Element(e) => qualified(e.preferred_prefix(), e.name().local_part()),
        Node::Attribute(a) => qualified(a.preferred_prefix(), a.name().local_part()),
        Node::ProcessingInstruction(pi) => pi.target().to_string(),
        _ => String::new(),
    }
}

fn qualified(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}:{local}"),
        None => local.to_string(),
    }
}

/// XPath-like location of a node, with positions among same-named siblings.
pub fn location(node: Node<'_>) -> String {
    match node {
        Node::Root(_) => "/".to_string(),
        Node::Element(e) => {
            let parent = node.parent().map(location).unwrap_or_default();
            let name = e.name();
            let position = node
                .parent()
                .map(|p| {
                    p.children()
                        .into_iter()
                        .filter(|c| matches!(c, Node::Element(s) if s.name() == name))
                        .position(|c| c == node)
                        .map_or(1, |i| i + 1)
                })
                .unwrap_or(1);
            join(&parent, &format!("{}[{position}]", node_name(node)))
        }
        Node::Attribute(_) => {
            let parent = node.parent().map(location).unwrap_or_default();
            join(&parent, &format!("@{}", node_name(node)))
        }
        other => {
            let parent = other.parent().map(location).unwrap_or_default();
            let step = match other {
                Node::Text(_) => "text()",
                Node::Comment(_) => "comment()",
                _ => "node()",
            };
            join(&parent, step)
        }
    }
}

fn join(parent: &str, step: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{step}")
    } else {
        format!("{parent}/{step}")
    }
}
