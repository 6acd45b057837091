//! Structural stylesheets: a subset of XSLT 1.0.
//!
//! Supported instructions: `apply-templates`, `call-template`, `value-of`,
//! `copy-of`, `copy`, `for-each`, `if`, `choose`, `text`, `element`,
//! `attribute`, `comment`, `variable`, `message`, plus literal result
//! elements with attribute value templates.

mod pattern;


use indexmap::IndexMap;
use sxd_document::dom;
use xmlview_core::{Method, Namespaces, ParserOptions};

use crate::builder::{Builder, is_in, text_content};
use crate::diagnostics::{DiagnosticKind, Diagnostics, Span};
use crate::ir::{Avt, ExprId, ExpressionTable, ResultName};
use crate::{Error, PassResult};

pub use pattern::{default_priority, split_alternatives};

pub const XSLT_NAMESPACE: &str = "http://www.w3.org/1999/XSL/Transform";

/// A compiled stylesheet. Immutable and shareable across threads.
#[derive(Debug, Clone)]
pub struct Stylesheet {
    pub namespaces: Namespaces,
    pub output: Method,
    /// Top-level parameters and variables, in document order.
    pub globals: Vec<Binding>,
    pub templates: Vec<Template>,
    /// Named template lookup.
    pub named: IndexMap<String, usize>,
    pub expressions: ExpressionTable,
}

impl Stylesheet {
    pub fn template(&self, name: &str) -> Option<&Template> {
        self.named.get(name).map(|&i| &self.templates[i])
    }

    /// Names of top-level parameters callers may set.
    pub fn parameters(&self) -> impl Iterator<Item = &str> {
        self.globals
            .iter()
            .filter(|b| b.is_param)
            .map(|b| b.name.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Template {
    pub name: Option<String>,
    pub mode: Option<String>,
    pub patterns: Vec<Pattern>,
    pub params: Vec<Binding>,
    pub body: Vec<Instruction>,
    pub span: Option<Span>,
}

/// One `|`-separated alternative of a match pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub expr: ExprId,
    pub priority: f64,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub value: BindingValue,
    pub is_param: bool,
}

#[derive(Debug, Clone)]
pub enum BindingValue {
    Select(ExprId),
    /// Content evaluated into a result tree fragment, used by its string value.
    Content(Vec<Instruction>),
    Empty,
}

#[derive(Debug, Clone)]
pub enum Instruction {
    Text(String),
    ValueOf(ExprId),
    CopyOf(ExprId),
    Copy(Vec<Instruction>),
    ApplyTemplates {
        select: Option<ExprId>,
        mode: Option<String>,
        params: Vec<Binding>,
    },
    CallTemplate {
        name: String,
        params: Vec<Binding>,
    },
    ForEach {
        select: ExprId,
        body: Vec<Instruction>,
    },
    If {
        test: ExprId,
        body: Vec<Instruction>,
    },
    Choose {
        branches: Vec<(ExprId, Vec<Instruction>)>,
        otherwise: Vec<Instruction>,
    },
    Element {
        name: Avt,
        namespace: Option<Avt>,
        body: Vec<Instruction>,
    },
    Attribute {
        name: Avt,
        namespace: Option<Avt>,
        body: Vec<Instruction>,
    },
    Comment(Vec<Instruction>),
    Variable(Binding),
    Message {
        body: Vec<Instruction>,
        terminate: bool,
        span: Option<Span>,
    },
    LiteralElement {
        name: ResultName,
        attributes: Vec<(ResultName, Avt)>,
        body: Vec<Instruction>,
    },
}

/// Compile stylesheet source text.
///
/// Warnings are returned alongside the stylesheet; any error fails the pass.
pub fn compile_stylesheet(source: &str, options: ParserOptions) -> PassResult<Stylesheet> {
    let mut builder = Builder::new(source);
    let doc = match xmlview_core::parse_str(source, options) {
        Ok(doc) => doc,
        Err(e) => {
            builder
                .diagnostics
                .report(DiagnosticKind::NotWellFormed, Some(Span::empty(0)))
                .message(e.to_string())
                .emit();
            return Err(Error::Stylesheet(builder.diagnostics));
        }
    };
    let dom = doc.dom();
    let root = dom.root().children().into_iter().find_map(|c| match c {
        dom::ChildOfRoot::Element(e) => Some(e),
        _ => None,
    });

    let mut compiler = StylesheetCompiler {
        builder,
        output: Method::Xml,
        globals: Vec::new(),
        templates: Vec::new(),
        named: IndexMap::new(),
        calls: Vec::new(),
    };

    match root {
        Some(root)
            if is_in(root, XSLT_NAMESPACE)
                && matches!(root.name().local_part(), "stylesheet" | "transform") =>
        {
            compiler.top_level(root)
        }
        _ => {
            compiler
                .builder
                .diagnostics
                .report(DiagnosticKind::NotAStylesheet, Some(Span::empty(0)))
                .emit();
        }
    }

    compiler.finish()
}

struct StylesheetCompiler<'s> {
    builder: Builder<'s>,
    output: Method,
    globals: Vec<Binding>,
    templates: Vec<Template>,
    named: IndexMap<String, usize>,
    /// `call-template` targets, checked once every template is known.
    calls: Vec<(String, Option<Span>)>,
}

impl StylesheetCompiler<'_> {
    fn finish(mut self) -> PassResult<Stylesheet> {
        for (name, span) in std::mem::take(&mut self.calls) {
            if !self.named.contains_key(&name) {
                self.builder
                    .diagnostics
                    .report(DiagnosticKind::UndefinedTemplate, span)
                    .message(&name)
                    .emit();
            }
        }

        let Builder {
            diagnostics,
            expressions,
            namespaces,
            ..
        } = self.builder;
        if diagnostics.has_errors() {
            return Err(Error::Stylesheet(diagnostics));
        }

        tracing::debug!(
            templates = self.templates.len(),
            expressions = expressions.len(),
            "compiled stylesheet"
        );
        let stylesheet = Stylesheet {
            namespaces,
            output: self.output,
            globals: self.globals,
            templates: self.templates,
            named: self.named,
            expressions,
        };
        Ok((stylesheet, diagnostics))
    }

    fn report(&mut self, kind: DiagnosticKind, span: Option<Span>, detail: &str) {
        self.builder
            .diagnostics
            .report(kind, span)
            .message(detail)
            .emit();
    }

    fn top_level(&mut self, root: dom::Element<'_>) {
        self.builder.enter(root);
        for child in root.children() {
            let dom::ChildOfElement::Element(element) = child else {
                continue;
            };
            let tag = self.builder.enter(element);
            if !is_in(element, XSLT_NAMESPACE) {
                continue;
            }
            match element.name().local_part() {
                "template" => self.template(element, tag),
                "param" | "variable" => {
                    if let Some(binding) = self.binding(element, tag) {
                        self.globals.push(binding);
                    }
                }
                "output" => self.output_method(element, tag),
                "strip-space" | "preserve-space" | "decimal-format" | "namespace-alias" => {
                    let name = format!("xsl:{}", element.name().local_part());
                    self.report(DiagnosticKind::IgnoredElement, tag, &name);
                }
                "import" | "include" | "key" | "attribute-set" => {
                    let name = format!("xsl:{}", element.name().local_part());
                    self.report(DiagnosticKind::UnsupportedInstruction, tag, &name);
                }
                other => {
                    let name = format!("xsl:{other}");
                    self.report(DiagnosticKind::MisplacedInstruction, tag, &name);
                }
            }
        }
    }

    fn output_method(&mut self, element: dom::Element<'_>, tag: Option<Span>) {
        let Some(method) = element.attribute_value("method") else {
            return;
        };
        match Method::from_name(method) {
            Some(m) => self.output = m,
            None => {
                let span = self.builder.attr_span(tag, "method");
                self.report(
                    DiagnosticKind::InvalidAttributeValue,
                    span,
                    &format!("output method `{method}`"),
                );
            }
        }
    }

    fn template(&mut self, element: dom::Element<'_>, tag: Option<Span>) {
        let name = element.attribute_value("name").map(str::to_string);
        let mode = element.attribute_value("mode").map(str::to_string);

        let explicit_priority = match element.attribute_value("priority") {
            Some(value) => match value.trim().parse::<f64>() {
                Ok(p) => Some(p),
                Err(_) => {
                    let span = self.builder.attr_span(tag, "priority");
                    self.report(
                        DiagnosticKind::InvalidAttributeValue,
                        span,
                        &format!("priority `{value}`"),
                    );
                    None
                }
            },
            None => None,
        };

        let mut patterns = Vec::new();
        match element.attribute_value("match") {
            Some(source) => {
                let span = self.builder.attr_span(tag, "match");
                for alternative in split_alternatives(source) {
                    if let Some(expr) = self.builder.expression(alternative, span) {
                        patterns.push(Pattern {
                            expr,
                            priority: explicit_priority
                                .unwrap_or_else(|| default_priority(alternative)),
                        });
                    }
                }
            }
            None if name.is_none() => {
                self.report(DiagnosticKind::MissingAttribute, tag, "match");
            }
            None => {}
        }

        let (params, body) = self.parameterized_body(element);
        let index = self.templates.len();
        if let Some(name) = &name {
            if let Some(&first) = self.named.get(name) {
                let first_span = self.templates[first].span;
                self.builder
                    .diagnostics
                    .report(DiagnosticKind::DuplicateTemplate, tag)
                    .message(name)
                    .related_to("first defined here", first_span)
                    .emit();
            } else {
                self.named.insert(name.clone(), index);
            }
        }
        self.templates.push(Template {
            name,
            mode,
            patterns,
            params,
            body,
            span: tag,
        });
    }

    /// Leading `xsl:param` children, then the instruction body.
    fn parameterized_body(&mut self, element: dom::Element<'_>) -> (Vec<Binding>, Vec<Instruction>) {
        let mut params = Vec::new();
        let mut body = Vec::new();
        let mut in_params = true;
        for child in element.children() {
            if let dom::ChildOfElement::Element(e) = child
                && in_params
                && is_in(e, XSLT_NAMESPACE)
                && e.name().local_part() == "param"
            {
                let tag = self.builder.enter(e);
                if let Some(binding) = self.binding(e, tag) {
                    params.push(binding);
                }
                continue;
            }
            if !is_blank(&child) {
                in_params = false;
            }
            self.child(child, &mut body);
        }
        (params, body)
    }

    fn body(&mut self, element: dom::Element<'_>) -> Vec<Instruction> {
        let mut body = Vec::new();
        for child in element.children() {
            self.child(child, &mut body);
        }
        body
    }

    fn child(&mut self, child: dom::ChildOfElement<'_>, body: &mut Vec<Instruction>) {
        match child {
            dom::ChildOfElement::Text(t) => {
                if !t.text().trim().is_empty() {
                    body.push(Instruction::Text(t.text().to_string()));
                }
            }
            dom::ChildOfElement::Element(e) => {
                if let Some(instruction) = self.instruction(e) {
                    body.push(instruction);
                }
            }
            _ => {}
        }
    }

    fn instruction(&mut self, element: dom::Element<'_>) -> Option<Instruction> {
        let tag = self.builder.enter(element);
        if !is_in(element, XSLT_NAMESPACE) {
            return Some(self.literal_element(element, tag));
        }

        let local = element.name().local_part();
        let instruction = match local {
            "apply-templates" => {
                let select = self.builder.optional_expression_attr(element, tag, "select");
                let mode = element.attribute_value("mode").map(str::to_string);
                let params = self.with_params(element);
                Instruction::ApplyTemplates {
                    select,
                    mode,
                    params,
                }
            }
            "call-template" => {
                let name = self.builder.required(element, tag, "name")?.to_string();
                let span = self.builder.attr_span(tag, "name");
                self.calls.push((name.clone(), span));
                let params = self.with_params(element);
                Instruction::CallTemplate { name, params }
            }
            "value-of" => Instruction::ValueOf(self.builder.expression_attr(element, tag, "select")?),
            "copy-of" => Instruction::CopyOf(self.builder.expression_attr(element, tag, "select")?),
            "copy" => Instruction::Copy(self.body(element)),
            "for-each" => {
                let select = self.builder.expression_attr(element, tag, "select");
                let body = self.body(element);
                Instruction::ForEach {
                    select: select?,
                    body,
                }
            }
            "if" => {
                let test = self.builder.expression_attr(element, tag, "test");
                let body = self.body(element);
                Instruction::If { test: test?, body }
            }
            "choose" => self.choose(element),
            "text" => Instruction::Text(text_content(element)),
            "element" | "attribute" => {
                let name = self.builder.required(element, tag, "name").map(str::to_string);
                let name_span = self.builder.attr_span(tag, "name");
                let name = name.map(|n| self.builder.avt(&n, name_span));
                let namespace = element.attribute_value("namespace").map(|ns| {
                    let span = self.builder.attr_span(tag, "namespace");
                    self.builder.avt(ns, span)
                });
                let body = self.body(element);
                let name = name?;
                if local == "element" {
                    Instruction::Element {
                        name,
                        namespace,
                        body,
                    }
                } else {
                    Instruction::Attribute {
                        name,
                        namespace,
                        body,
                    }
                }
            }
            "comment" => Instruction::Comment(self.body(element)),
            "variable" => Instruction::Variable(self.binding(element, tag)?),
            "message" => {
                let terminate = match element.attribute_value("terminate") {
                    None | Some("no") => false,
                    Some("yes") => true,
                    Some(other) => {
                        let span = self.builder.attr_span(tag, "terminate");
                        self.report(
                            DiagnosticKind::InvalidAttributeValue,
                            span,
                            &format!("terminate `{other}`, expected `yes` or `no`"),
                        );
                        false
                    }
                };
                Instruction::Message {
                    body: self.body(element),
                    terminate,
                    span: tag,
                }
            }
            "number" | "sort" | "fallback" | "processing-instruction" | "apply-imports" => {
                self.report(DiagnosticKind::UnsupportedInstruction, tag, &format!("xsl:{local}"));
                return None;
            }
            "param" | "with-param" | "when" | "otherwise" | "template" | "output"
            | "stylesheet" | "transform" => {
                self.report(DiagnosticKind::MisplacedInstruction, tag, &format!("xsl:{local}"));
                return None;
            }
            other => {
                self.report(DiagnosticKind::UnknownInstruction, tag, &format!("xsl:{other}"));
                return None;
            }
        };
        Some(instruction)
    }

    fn choose(&mut self, element: dom::Element<'_>) -> Instruction {
        let mut branches = Vec::new();
        let mut otherwise = Vec::new();
        for child in element.children() {
            let dom::ChildOfElement::Element(e) = child else {
                continue;
            };
            let tag = self.builder.enter(e);
            match (is_in(e, XSLT_NAMESPACE), e.name().local_part()) {
                (true, "when") => {
                    let test = self.builder.expression_attr(e, tag, "test");
                    let body = self.body(e);
                    if let Some(test) = test {
                        branches.push((test, body));
                    }
                }
                (true, "otherwise") => otherwise = self.body(e),
                _ => {
                    let name = crate::builder::qualified_name(e);
                    self.report(DiagnosticKind::MisplacedInstruction, tag, &name);
                }
            }
        }
        Instruction::Choose {
            branches,
            otherwise,
        }
    }

    fn with_params(&mut self, element: dom::Element<'_>) -> Vec<Binding> {
        let mut params = Vec::new();
        for child in element.children() {
            let dom::ChildOfElement::Element(e) = child else {
                continue;
            };
            let tag = self.builder.enter(e);
            match (is_in(e, XSLT_NAMESPACE), e.name().local_part()) {
                (true, "with-param") => {
                    if let Some(binding) = self.binding(e, tag) {
                        params.push(binding);
                    }
                }
                (true, "sort") => {
                    self.report(DiagnosticKind::UnsupportedInstruction, tag, "xsl:sort");
                }
                _ => {
                    let name = crate::builder::qualified_name(e);
                    self.report(DiagnosticKind::MisplacedInstruction, tag, &name);
                }
            }
        }
        params
    }

    fn binding(&mut self, element: dom::Element<'_>, tag: Option<Span>) -> Option<Binding> {
        let name = self.builder.required(element, tag, "name")?.to_string();
        let is_param = element.name().local_part() == "param";
        let value = if element.attribute_value("select").is_some() {
            BindingValue::Select(self.builder.expression_attr(element, tag, "select")?)
        } else {
            let body = self.body(element);
            if body.is_empty() {
                BindingValue::Empty
            } else {
                BindingValue::Content(body)
            }
        };
        Some(Binding {
            name,
            value,
            is_param,
        })
    }

    fn literal_element(&mut self, element: dom::Element<'_>, tag: Option<Span>) -> Instruction {
        let qname = element.name();
        let name = ResultName {
            prefix: element.preferred_prefix().map(str::to_string),
            local: qname.local_part().to_string(),
            namespace: qname.namespace_uri().map(str::to_string),
        };
        let mut attributes = Vec::new();
        for attribute in element.attributes() {
            let attr_name = attribute.name();
            if attr_name.namespace_uri() == Some(XSLT_NAMESPACE) {
                continue;
            }
            let span = self.builder.attr_span(tag, attr_name.local_part());
            let value = self.builder.avt(attribute.value(), span);
            attributes.push((
                ResultName {
                    prefix: attribute.preferred_prefix().map(str::to_string),
                    local: attr_name.local_part().to_string(),
                    namespace: attr_name.namespace_uri().map(str::to_string),
                },
                value,
            ));
        }
        Instruction::LiteralElement {
            name,
            attributes,
            body: self.body(element),
        }
    }
}

fn is_blank(child: &dom::ChildOfElement<'_>) -> bool {
    match child {
        dom::ChildOfElement::Text(t) => t.text().trim().is_empty(),
        dom::ChildOfElement::Comment(_) | dom::ChildOfElement::ProcessingInstruction(_) => true,
        dom::ChildOfElement::Element(_) => false,
    }
}

/// Compile diagnostics for stylesheets that are expected to fail.
pub fn check_stylesheet(source: &str) -> Diagnostics {
    match compile_stylesheet(source, ParserOptions::default()) {
        Ok((_, warnings)) => warnings,
        Err(e) => e.into_diagnostics(),
    }
}
