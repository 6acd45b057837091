//! State shared by the stylesheet and rule-schema compilers.

use sxd_document::dom;
use xmlview_core::Namespaces;

use crate::diagnostics::{DiagnosticKind, Diagnostics, Locator, Span};
use crate::ir::{Avt, AvtPart, ExprId, ExpressionTable};

pub(crate) struct Builder<'s> {
    pub(crate) locator: Locator<'s>,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) expressions: ExpressionTable,
    pub(crate) namespaces: Namespaces,
}

impl<'s> Builder<'s> {
    pub(crate) fn new(source: &'s str) -> Self {
        Self {
            locator: Locator::new(source),
            diagnostics: Diagnostics::new(),
            expressions: ExpressionTable::default(),
            namespaces: Namespaces::new(),
        }
    }

    /// Locate an element's start tag and record the namespaces it sees.
    ///
    /// Call in document order.
    pub(crate) fn enter(&mut self, element: dom::Element<'_>) -> Option<Span> {
        for namespace in element.namespaces_in_scope() {
            self.namespaces
                .entry(namespace.prefix().to_string())
                .or_insert_with(|| namespace.uri().to_string());
        }
        self.locator.element(&qualified_name(element))
    }

    /// Span of an attribute value, falling back to the whole tag.
    pub(crate) fn attr_span(&self, tag: Option<Span>, name: &str) -> Option<Span> {
        tag.and_then(|t| self.locator.attribute(t, name)).or(tag)
    }

    pub(crate) fn required<'d>(
        &mut self,
        element: dom::Element<'d>,
        tag: Option<Span>,
        name: &str,
    ) -> Option<&'d str> {
        let value = element.attribute_value(name);
        if value.is_none() {
            self.diagnostics
                .report(DiagnosticKind::MissingAttribute, tag)
                .message(name)
                .emit();
        }
        value
    }

    pub(crate) fn expression(&mut self, source: &str, span: Option<Span>) -> Option<ExprId> {
        match xmlview_core::query::compile(source) {
            Ok(_) => Some(self.expressions.add(source, span)),
            Err(_) => {
                self.diagnostics
                    .report(DiagnosticKind::InvalidExpression, span)
                    .message(format!("`{source}`"))
                    .emit();
                None
            }
        }
    }

    /// Required attribute holding an expression.
    pub(crate) fn expression_attr(
        &mut self,
        element: dom::Element<'_>,
        tag: Option<Span>,
        name: &str,
    ) -> Option<ExprId> {
        let source = self.required(element, tag, name)?;
        let span = self.attr_span(tag, name);
        self.expression(source, span)
    }

    pub(crate) fn optional_expression_attr(
        &mut self,
        element: dom::Element<'_>,
        tag: Option<Span>,
        name: &str,
    ) -> Option<ExprId> {
        let source = element.attribute_value(name)?;
        let span = self.attr_span(tag, name);
        self.expression(source, span)
    }

    /// Parse an attribute value template.
    pub(crate) fn avt(&mut self, value: &str, span: Option<Span>) -> Avt {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = value.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut expr = String::new();
                    let mut quote: Option<char> = None;
                    let mut closed = false;
                    for c in chars.by_ref() {
                        match quote {
                            Some(q) if c == q => quote = None,
                            Some(_) => {}
                            None if c == '"' || c == '\'' => quote = Some(c),
                            None if c == '}' => {
                                closed = true;
                                break;
                            }
                            None => {}
                        }
                        expr.push(c);
                    }
                    if !closed {
                        self.diagnostics
                            .report(DiagnosticKind::InvalidAttributeValue, span)
                            .message(format!("unclosed `{{` in `{value}`"))
                            .emit();
                        return Avt(parts);
                    }
                    if !literal.is_empty() {
                        parts.push(AvtPart::Literal(std::mem::take(&mut literal)));
                    }
                    if let Some(id) = self.expression(&expr, span) {
                        parts.push(AvtPart::Expr(id));
                    }
                }
                '}' => {
                    self.diagnostics
                        .report(DiagnosticKind::InvalidAttributeValue, span)
                        .message(format!("unmatched `}}` in `{value}`"))
                        .emit();
                    literal.push('}');
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            parts.push(AvtPart::Literal(literal));
        }
        Avt(parts)
    }
}

/// The element name as written in the source.
pub(crate) fn qualified_name(element: dom::Element<'_>) -> String {
    let local = element.name().local_part();
    match element.preferred_prefix() {
        Some(prefix) => format!("{prefix}:{local}"),
        None => local.to_string(),
    }
}

pub(crate) fn is_in(element: dom::Element<'_>, namespace: &str) -> bool {
    element.name().namespace_uri() == Some(namespace)
}

/// Concatenated descendant text.
pub(crate) fn text_content(element: dom::Element<'_>) -> String {
    let mut out = String::new();
    for child in element.children() {
        match child {
            dom::ChildOfElement::Text(t) => out.push_str(t.text()),
            dom::ChildOfElement::Element(e) => out.push_str(&text_content(e)),
            _ => {}
        }
    }
    out
}
