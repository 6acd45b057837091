//! Pieces shared by every compiled program.
//!
//! Programs keep XPath expressions as source text plus a span. Compiled
//! `sxd-xpath` objects are not thread-safe, so each run compiles the table
//! once and indexes into it by [`ExprId`].

use crate::diagnostics::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(u32);

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub source: String,
    pub span: Option<Span>,
}

/// Every expression a program evaluates, syntax-checked at compile time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpressionTable {
    entries: Vec<Expression>,
}

impl ExpressionTable {
    pub(crate) fn add(&mut self, source: &str, span: Option<Span>) -> ExprId {
        let id = ExprId(self.entries.len() as u32);
        self.entries.push(Expression {
            source: source.to_string(),
            span,
        });
        id
    }

    pub fn get(&self, id: ExprId) -> &Expression {
        &self.entries[id.index()]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ExprId, &Expression)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (ExprId(i as u32), e))
    }
}

/// Attribute value template: literal text interleaved with `{expr}` parts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Avt(pub Vec<AvtPart>);

#[derive(Debug, Clone, PartialEq)]
pub enum AvtPart {
    Literal(String),
    Expr(ExprId),
}

impl Avt {
    /// The value when the template has no expressions.
    pub fn as_literal(&self) -> Option<&str> {
        match self.0.as_slice() {
            [] => Some(""),
            [AvtPart::Literal(s)] => Some(s),
            _ => None,
        }
    }
}

/// Expanded name of a literal result element or attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultName {
    pub prefix: Option<String>,
    pub local: String,
    pub namespace: Option<String>,
}
