//! Field values after coercion.

use chrono::NaiveDateTime;
use serde_json::json;
use xmlview_core::{Method, NodeRef};
use xmlview_vm::{TransformOutput, Validation};

use crate::error::FieldError;
use crate::instance::Instance;

/// Timestamp layout used when values are rendered as text.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A coerced field value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Node(NodeRef),
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// Naive timestamp; offset-aware inputs are normalized to UTC.
    DateTime(NaiveDateTime),
    /// Serialized markup.
    Markup(String),
    /// An embedded view over a sub-tree.
    Instance(Instance),
    /// Result of a structural transform.
    Output(TransformOutput),
    /// Result of a rule schema.
    Validation(Validation),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Node(_) => "node",
            Value::Text(_) => "text",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Boolean(_) => "boolean",
            Value::DateTime(_) => "datetime",
            Value::Markup(_) => "markup",
            Value::Instance(_) => "instance",
            Value::Output(_) => "transform output",
            Value::Validation(_) => "validation",
            Value::List(_) => "list",
        }
    }

    pub fn as_node(&self) -> Option<&NodeRef> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Text and markup values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Markup(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Value::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn as_output(&self) -> Option<&TransformOutput> {
        match self {
            Value::Output(output) => Some(output),
            _ => None,
        }
    }

    pub fn as_validation(&self) -> Option<&Validation> {
        match self {
            Value::Validation(validation) => Some(validation),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// JSON rendering. Embedded instances are forced field by field.
    pub fn to_json(&self) -> Result<serde_json::Value, FieldError> {
        Ok(match self {
            Value::Null => serde_json::Value::Null,
            Value::Node(node) => json!(node.to_markup(Method::Xml)),
            Value::Text(s) | Value::Markup(s) => json!(s),
            Value::Integer(n) => json!(n),
            Value::Float(n) => json!(n),
            Value::Boolean(b) => json!(b),
            Value::DateTime(dt) => json!(dt.format(DATETIME_FORMAT).to_string()),
            Value::Instance(instance) => instance.to_json()?,
            Value::Output(output) => json!(output.render()),
            Value::Validation(validation) => {
                let findings: Vec<_> = validation
                    .report
                    .findings
                    .iter()
                    .map(|f| {
                        json!({
                            "kind": format!("{:?}", f.kind).to_lowercase(),
                            "location": f.location,
                            "test": f.test,
                            "message": f.message,
                        })
                    })
                    .collect();
                json!({ "valid": validation.is_valid(), "findings": findings })
            }
            Value::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(Value::to_json)
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<NodeRef> for Value {
    fn from(node: NodeRef) -> Self {
        Value::Node(node)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}
