//! Coercion of raw query results into field values.
//!
//! Every text-like coercion goes through the item's text first, so defaults
//! and assigned strings follow the same path as query results.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use xmlview_core::markup::{XHTML_NAMESPACE, inner_markup, strip_namespace_declaration};
use xmlview_core::serialize::{self, Options};
use xmlview_core::{Item, Method};

use crate::error::FieldError;
use crate::value::Value;

/// How one result item becomes a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Coercion {
    /// Nodes as handles, scalars as they are.
    Node,
    Text,
    Integer,
    Float,
    DateTime,
    Boolean {
        true_values: Vec<String>,
        false_values: Vec<String>,
    },
    /// Markup serialized with the html method.
    Html { strip_namespaces: Vec<String> },
    /// Like `Html`, without the surrounding tag.
    InnerHtml { strip_namespaces: Vec<String> },
}

impl Coercion {
    pub fn boolean() -> Self {
        Coercion::Boolean {
            true_values: vec!["true".to_string()],
            false_values: vec!["false".to_string()],
        }
    }

    pub fn html() -> Self {
        Coercion::Html {
            strip_namespaces: vec![XHTML_NAMESPACE.to_string()],
        }
    }

    pub fn inner_html() -> Self {
        Coercion::InnerHtml {
            strip_namespaces: vec![XHTML_NAMESPACE.to_string()],
        }
    }

    /// Whether matched text can be mapped to null.
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            Coercion::Text
                | Coercion::Integer
                | Coercion::Float
                | Coercion::DateTime
                | Coercion::Boolean { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Coercion::Node => "node",
            Coercion::Text => "text",
            Coercion::Integer => "integer",
            Coercion::Float => "float",
            Coercion::DateTime => "datetime",
            Coercion::Boolean { .. } => "boolean",
            Coercion::Html { .. } => "html",
            Coercion::InnerHtml { .. } => "inner_html",
        }
    }
}

/// Coerce one result item.
///
/// Textual coercions map any of `none_values` to null before parsing.
pub(crate) fn coerce_item(
    field: &str,
    coercion: &Coercion,
    none_values: &[String],
    item: &Item,
) -> Result<Value, FieldError> {
    match coercion {
        Coercion::Node => Ok(match item {
            Item::Node(node) => Value::Node(node.clone()),
            Item::Text(s) => Value::Text(s.clone()),
            Item::Number(n) => Value::Float(*n),
            Item::Boolean(b) => Value::Boolean(*b),
        }),
        Coercion::Html { strip_namespaces } => Ok(Value::Markup(markup(item, strip_namespaces))),
        Coercion::InnerHtml { strip_namespaces } => {
            Ok(Value::Markup(inner_markup(&markup(item, strip_namespaces))))
        }
        _ => {
            let text = item.to_text();
            if none_values.contains(&text) {
                return Ok(Value::Null);
            }
            coerce_text(field, coercion, &text)
        }
    }
}

/// Coerce a literal string, as used for defaults and assignments.
pub(crate) fn coerce_text(field: &str, coercion: &Coercion, text: &str) -> Result<Value, FieldError> {
    match coercion {
        Coercion::Node | Coercion::Text => Ok(Value::Text(text.to_string())),
        Coercion::Integer => parse_integer(text)
            .map(Value::Integer)
            .ok_or_else(|| parse_error(field, text, "integer")),
        Coercion::Float => text
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| parse_error(field, text, "float")),
        Coercion::DateTime => parse_datetime(text)
            .map(Value::DateTime)
            .ok_or_else(|| FieldError::DateTime {
                field: field.to_string(),
                value: text.to_string(),
            }),
        Coercion::Boolean {
            true_values,
            false_values,
        } => {
            if true_values.iter().any(|v| v == text) {
                Ok(Value::Boolean(true))
            } else if false_values.iter().any(|v| v == text) {
                Ok(Value::Boolean(false))
            } else {
                Err(FieldError::Validation {
                    field: field.to_string(),
                    message: format!("value {text:?} is not one of the true or false values"),
                })
            }
        }
        Coercion::Html { strip_namespaces } => Ok(Value::Markup(strip_declarations(
            text.to_string(),
            strip_namespaces,
        ))),
        Coercion::InnerHtml { strip_namespaces } => Ok(Value::Markup(inner_markup(
            &strip_declarations(text.to_string(), strip_namespaces),
        ))),
    }
}

/// Check that an assigned value already has the coerced type.
pub(crate) fn accepts(coercion: &Coercion, value: &Value) -> bool {
    match (coercion, value) {
        (_, Value::Null) => true,
        (Coercion::Node, _) => true,
        (Coercion::Text, Value::Text(_)) => true,
        (Coercion::Integer, Value::Integer(_)) => true,
        (Coercion::Float, Value::Float(_)) => true,
        (Coercion::DateTime, Value::DateTime(_)) => true,
        (Coercion::Boolean { .. }, Value::Boolean(_)) => true,
        (Coercion::Html { .. } | Coercion::InnerHtml { .. }, Value::Markup(_)) => true,
        _ => false,
    }
}

fn parse_error(field: &str, value: &str, target: &'static str) -> FieldError {
    FieldError::Parse {
        field: field.to_string(),
        value: value.to_string(),
        target,
    }
}

/// Integer text, or float text without a fractional part.
pub fn parse_integer(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(n) = text.parse::<i64>() {
        return Some(n);
    }
    let float = text.parse::<f64>().ok()?;
    if float.is_finite() && float.fract() == 0.0 && float.abs() < i64::MAX as f64 {
        Some(float as i64)
    } else {
        None
    }
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%:z"];

/// Parse common timestamp layouts. Offset-aware values become naive UTC.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.naive_utc());
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Some(dt.naive_utc());
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn markup(item: &Item, strip_namespaces: &[String]) -> String {
    match item {
        Item::Node(node) => {
            let options = strip_namespaces
                .iter()
                .fold(Options::new(Method::Html), |o, uri| o.omit_namespace(uri.as_str()));
            strip_declarations(serialize::serialize(node, &options), strip_namespaces)
        }
        other => strip_declarations(other.to_text(), strip_namespaces),
    }
}

fn strip_declarations(markup: String, namespaces: &[String]) -> String {
    namespaces
        .iter()
        .fold(markup, |m, uri| strip_namespace_declaration(&m, uri))
}
