//! Markup serialization for nodes.
//!
//! Namespace declarations are emitted where a name first needs them, so a
//! sub-tree serialized on its own is self-contained.

use std::fmt::Write as _;

use sxd_document::QName;
use sxd_xpath::nodeset::Node;

use crate::document::NodeRef;

/// Elements that never take a closing tag under the html method.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "basefont", "br", "col", "frame", "hr", "img", "input", "isindex", "link",
    "meta", "param",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    #[default]
    Xml,
    Html,
    Text,
}

impl Method {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "xml" => Some(Self::Xml),
            "html" => Some(Self::Html),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Options {
    pub method: Method,
    /// Namespace URIs whose declarations are never written.
    pub omit_namespaces: Vec<String>,
}

impl Options {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            omit_namespaces: Vec::new(),
        }
    }

    pub fn omit_namespace(mut self, uri: impl Into<String>) -> Self {
        self.omit_namespaces.push(uri.into());
        self
    }
}

pub fn serialize(node: &NodeRef, options: &Options) -> String {
    let Some(node) = node.node() else {
        return String::new();
    };
    if options.method == Method::Text {
        return node.string_value();
    }
    let mut writer = Writer {
        options,
        out: String::new(),
        scope: Vec::new(),
    };
    writer.node(node);
    writer.out
}

struct Binding {
    prefix: Option<String>,
    uri: String,
}

struct Writer<'o> {
    options: &'o Options,
    out: String,
    scope: Vec<Binding>,
}

impl Writer<'_> {
    fn node(&mut self, node: Node<'_>) {
        match node {
            Node::Root(_) => {
                for child in node.children() {
                    self.node(child);
                }
            }
            Node::Element(_) => self.element(node),
            Node::Text(t) => escape_text(&mut self.out, t.text()),
            Node::Comment(c) => {
                let _ = write!(self.out, "<!--{}-->", c.text());
            }
            Node::ProcessingInstruction(pi) => match pi.value() {
                Some(value) => {
                    let _ = write!(self.out, "<?{} {}?>", pi.target(), value);
                }
                None => {
                    let _ = write!(self.out, "<?{}?>", pi.target());
                }
            },
            Node::Attribute(a) => escape_text(&mut self.out, a.value()),
            _ => {}
        }
    }

    fn element(&mut self, node: Node<'_>) {
        let Node::Element(element) = node else {
            return;
        };
        let depth = self.scope.len();
        let mut declarations = String::new();

        let name = element.name();
        let prefix = match name.namespace_uri() {
            Some(uri) => {
                let prefix = element.preferred_prefix().map(str::to_string);
                self.bind(prefix.clone(), uri, &mut declarations);
                prefix
            }
            None => {
                if self.lookup(None).is_some_and(|uri| !uri.is_empty()) {
                    self.scope.push(Binding {
                        prefix: None,
                        uri: String::new(),
                    });
                    declarations.push_str(" xmlns=\"\"");
                }
                None
            }
        };

        let mut attributes = String::new();
        for attribute in element.attributes() {
            let attr_name = attribute.name();
            attributes.push(' ');
            if let Some(uri) = attr_name.namespace_uri() {
                let prefix = self.attribute_prefix(attribute.preferred_prefix(), uri);
                self.bind(Some(prefix.clone()), uri, &mut declarations);
                attributes.push_str(&prefix);
                attributes.push(':');
            }
            attributes.push_str(attr_name.local_part());
            attributes.push_str("=\"");
            escape_attribute(&mut attributes, attribute.value());
            attributes.push('"');
        }

        let qualified = qualified_name(prefix.as_deref(), &name);
        let _ = write!(self.out, "<{qualified}{declarations}{attributes}");

        let children = node.children();
        let html = self.options.method == Method::Html;
        if html && name.namespace_uri().is_none() && is_void(name.local_part()) {
            self.out.push('>');
        } else if children.is_empty() && !html {
            self.out.push_str("/>");
        } else {
            self.out.push('>');
            for child in children {
                self.node(child);
            }
            let _ = write!(self.out, "</{qualified}>");
        }
        self.scope.truncate(depth);
    }

    fn lookup(&self, prefix: Option<&str>) -> Option<&str> {
        self.scope
            .iter()
            .rev()
            .find(|b| b.prefix.as_deref() == prefix)
            .map(|b| b.uri.as_str())
    }

    fn bind(&mut self, prefix: Option<String>, uri: &str, declarations: &mut String) {
        if self.lookup(prefix.as_deref()) == Some(uri) {
            return;
        }
        if !self.options.omit_namespaces.iter().any(|o| o == uri) {
            match &prefix {
                Some(p) => {
                    let _ = write!(declarations, " xmlns:{p}=\"");
                }
                None => declarations.push_str(" xmlns=\""),
            }
            escape_attribute(declarations, uri);
            declarations.push('"');
        }
        self.scope.push(Binding {
            prefix,
            uri: uri.to_string(),
        });
    }

    fn attribute_prefix(&self, preferred: Option<&str>, uri: &str) -> String {
        if let Some(p) = preferred {
            return p.to_string();
        }
        let bound = self
            .scope
            .iter()
            .rev()
            .find(|b| b.uri == uri && b.prefix.is_some())
            .and_then(|b| b.prefix.clone());
        if let Some(p) = bound {
            return p;
        }
        let mut index = 0;
        loop {
            let candidate = format!("ns{index}");
            if self.lookup(Some(&candidate)).is_none() {
                return candidate;
            }
            index += 1;
        }
    }
}

fn qualified_name(prefix: Option<&str>, name: &QName<'_>) -> String {
    match prefix {
        Some(p) => format!("{p}:{}", name.local_part()),
        None => name.local_part().to_string(),
    }
}

fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

pub fn escape_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

pub fn escape_attribute(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            c => out.push(c),
        }
    }
}
