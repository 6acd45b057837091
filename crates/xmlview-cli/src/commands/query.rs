use std::path::PathBuf;

use serde_json::{Value, json};
use xmlview_core::{Colors, Extensions, Item, Method, Namespaces, evaluate};

use super::input::{fail, load_document};
use super::json;

pub struct QueryArgs {
    pub file: PathBuf,
    pub query: String,
    pub namespaces: Vec<(String, String)>,
    pub compact: bool,
    pub color: bool,
}

pub fn run(args: QueryArgs) {
    let doc = load_document(&args.file).unwrap_or_else(|e| fail(e));
    let namespaces: Namespaces = args.namespaces.into_iter().collect();

    let result = evaluate(&doc.root(), &args.query, &namespaces, &Extensions::new())
        .unwrap_or_else(|e| fail(e));
    let items: Vec<Value> = result.into_items().iter().map(item_json).collect();

    let output = json::format(&Value::Array(items), !args.compact, Colors::new(args.color));
    println!("{output}");
}

/// Nodes print as markup, scalars as JSON scalars.
pub fn item_json(item: &Item) -> Value {
    match item {
        Item::Node(node) => json!(node.to_markup(Method::Xml)),
        Item::Text(s) => json!(s),
        Item::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => json!(*n as i64),
        Item::Number(n) => serde_json::Number::from_f64(*n).map_or(Value::Null, Value::Number),
        Item::Boolean(b) => json!(b),
    }
}
