//! Raw query results, before any field coercion.

use serde::ser::{Serialize, SerializeSeq, Serializer};

use crate::document::NodeRef;
use crate::serialize::Method;

/// One member of a query result.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Node(NodeRef),
    /// Strings, plus attribute and namespace nodes (by value).
    Text(String),
    Number(f64),
    Boolean(bool),
}

impl Item {
    /// Text view of the item: an element's leading text, otherwise its value.
    pub fn to_text(&self) -> String {
        match self {
            Item::Node(node) => node.text().unwrap_or_default(),
            Item::Text(s) => s.clone(),
            Item::Number(n) => format_number(*n),
            Item::Boolean(b) => b.to_string(),
        }
    }

    /// XPath string-value of the item.
    pub fn string_value(&self) -> String {
        match self {
            Item::Node(node) => node.string_value(),
            other => other.to_text(),
        }
    }

    pub fn as_node(&self) -> Option<&NodeRef> {
        match self {
            Item::Node(node) => Some(node),
            _ => None,
        }
    }
}

impl From<NodeRef> for Item {
    fn from(node: NodeRef) -> Self {
        Item::Node(node)
    }
}

impl From<String> for Item {
    fn from(s: String) -> Self {
        Item::Text(s)
    }
}

impl From<&str> for Item {
    fn from(s: &str) -> Self {
        Item::Text(s.to_string())
    }
}

impl From<f64> for Item {
    fn from(n: f64) -> Self {
        Item::Number(n)
    }
}

impl From<bool> for Item {
    fn from(b: bool) -> Self {
        Item::Boolean(b)
    }
}

/// Result of evaluating a query or an extension call.
///
/// Node-sets are always sequences, even when they hold a single node.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RawResult {
    #[default]
    Null,
    Scalar(Item),
    Sequence(Vec<Item>),
}

impl RawResult {
    pub fn is_null(&self) -> bool {
        matches!(self, RawResult::Null)
    }

    /// Number of matched items (a scalar counts as one).
    pub fn count(&self) -> usize {
        match self {
            RawResult::Null => 0,
            RawResult::Scalar(_) => 1,
            RawResult::Sequence(items) => items.len(),
        }
    }

    pub fn first(&self) -> Option<&Item> {
        match self {
            RawResult::Null => None,
            RawResult::Scalar(item) => Some(item),
            RawResult::Sequence(items) => items.first(),
        }
    }

    pub fn into_items(self) -> Vec<Item> {
        match self {
            RawResult::Null => Vec::new(),
            RawResult::Scalar(item) => vec![item],
            RawResult::Sequence(items) => items,
        }
    }

    /// XPath `string()` of the result.
    pub fn string_value(&self) -> String {
        self.first().map(Item::string_value).unwrap_or_default()
    }
}

impl From<Item> for RawResult {
    fn from(item: Item) -> Self {
        RawResult::Scalar(item)
    }
}

impl From<Vec<Item>> for RawResult {
    fn from(items: Vec<Item>) -> Self {
        RawResult::Sequence(items)
    }
}

/// Format a number the way XPath `string()` does.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl Serialize for Item {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Item::Node(node) => serializer.serialize_str(&node.to_markup(Method::Xml)),
            Item::Text(s) => serializer.serialize_str(s),
            Item::Number(n) => serializer.serialize_f64(*n),
            Item::Boolean(b) => serializer.serialize_bool(*b),
        }
    }
}

impl Serialize for RawResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RawResult::Null => serializer.serialize_none(),
            RawResult::Scalar(item) => item.serialize(serializer),
            RawResult::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}
