//! JSON rendering for command output, byte-compatible with `serde_json`
//! when colors are off.

use serde_json::Value;
use xmlview_core::Colors;

pub fn format(value: &Value, pretty: bool, colors: Colors) -> String {
    let mut out = String::new();
    format_value(&mut out, value, &colors, pretty, 0);
    out
}

fn format_value(out: &mut String, value: &Value, c: &Colors, pretty: bool, indent: usize) {
    match value {
        Value::Null => c.paint(out, c.muted, "null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => c.paint(out, c.string, &escape(s)),
        Value::Array(items) => format_array(out, items, c, pretty, indent),
        Value::Object(fields) => format_object(out, fields, c, pretty, indent),
    }
}

fn format_array(out: &mut String, items: &[Value], c: &Colors, pretty: bool, indent: usize) {
    punct(out, '[', c);
    if items.is_empty() {
        punct(out, ']', c);
        return;
    }
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            punct(out, ',', c);
        }
        newline(out, pretty, indent + 2);
        format_value(out, item, c, pretty, indent + 2);
    }
    newline(out, pretty, indent);
    punct(out, ']', c);
}

fn format_object(
    out: &mut String,
    fields: &serde_json::Map<String, Value>,
    c: &Colors,
    pretty: bool,
    indent: usize,
) {
    punct(out, '{', c);
    if fields.is_empty() {
        punct(out, '}', c);
        return;
    }
    for (i, (key, value)) in fields.iter().enumerate() {
        if i > 0 {
            punct(out, ',', c);
        }
        newline(out, pretty, indent + 2);
        c.paint(out, c.key, &escape(key));
        punct(out, ':', c);
        if pretty {
            out.push(' ');
        }
        format_value(out, value, c, pretty, indent + 2);
    }
    newline(out, pretty, indent);
    punct(out, '}', c);
}

fn punct(out: &mut String, ch: char, c: &Colors) {
    c.paint(out, c.muted, ch.encode_utf8(&mut [0; 4]));
}

fn newline(out: &mut String, pretty: bool, indent: usize) {
    if pretty {
        out.push('\n');
        out.push_str(&" ".repeat(indent));
    }
}

fn escape(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}
