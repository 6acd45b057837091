//! String-level post-processing of serialized markup.

use std::sync::LazyLock;

use regex::Regex;

use crate::serialize::VOID_ELEMENTS;

pub const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// One pattern per void element: `<br ...></br>`.
static OPEN_CLOSE_PAIRS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    VOID_ELEMENTS
        .iter()
        .filter(|name| **name != "isindex")
        .map(|name| {
            let pattern = format!("<({name})([^/>]*?)></{name}>");
            (*name, Regex::new(&pattern).expect("void element pattern is valid"))
        })
        .collect()
});

/// Remove every declaration of `uri`, default (` xmlns="uri"`) or prefixed.
pub fn strip_namespace_declaration(markup: &str, uri: &str) -> String {
    let pattern = format!(r#"\s+xmlns(?::[\w.\-]+)?="{}""#, regex::escape(uri));
    match Regex::new(&pattern) {
        Ok(re) => re.replace_all(markup, "").into_owned(),
        Err(_) => markup.replace(&format!(" xmlns=\"{uri}\""), ""),
    }
}

/// Contents of the outermost element of `markup`, normalized.
///
/// The surrounding tag is removed when the markup starts with an open tag
/// and ends with the matching close tag. Open/close pairs of void elements
/// collapse to self-closing form, and surrounding whitespace is trimmed.
pub fn inner_markup(markup: &str) -> String {
    let inner = strip_outer_tag(markup).unwrap_or(markup);
    let mut collapsed = inner.to_string();
    for (_, pattern) in OPEN_CLOSE_PAIRS.iter() {
        if pattern.is_match(&collapsed) {
            collapsed = pattern.replace_all(&collapsed, "<$1$2/>").into_owned();
        }
    }
    collapsed.trim().to_string()
}

fn strip_outer_tag(markup: &str) -> Option<&str> {
    let rest = markup.strip_prefix('<')?;
    let name_end = rest.find(|c: char| c == '>' || c.is_whitespace())?;
    let name = &rest[..name_end];
    let close = format!("</{name}>");
    let body_start = 1 + name_end + rest[name_end..].find('>')? + 1;
    let body_end = markup.len().checked_sub(close.len())?;
    if !markup.ends_with(&close) || body_end < body_start {
        return None;
    }
    Some(&markup[body_start..body_end])
}
