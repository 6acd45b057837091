//! Result tree construction.

use std::fmt;

use sxd_document::{QName, dom};
use sxd_xpath::nodeset::Node;
use xmlview_compiler::Diagnostics;
use xmlview_core::copy::{copy_attribute, copy_node};
use xmlview_core::{Document, Method, NodeRef};

/// The product of applying a program.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    /// Result tree; holds no element when the program produced only text.
    pub document: Document,
    pub method: Method,
    /// Text written outside any element, in order.
    pub text: String,
    /// Warnings and messages reported during the run.
    pub diagnostics: Diagnostics,
}

impl TransformOutput {
    pub fn root_element(&self) -> Option<NodeRef> {
        self.document.root_element()
    }

    /// No element and no text.
    pub fn is_empty(&self) -> bool {
        self.root_element().is_none() && self.text.trim().is_empty()
    }

    /// Serialize with the program's output method.
    pub fn render(&self) -> String {
        match (self.method, self.root_element()) {
            (Method::Text, _) | (_, None) => self.text.clone(),
            (method, Some(root)) => {
                let mut out = root.to_markup(method);
                out.push_str(self.text.trim());
                out
            }
        }
    }
}

impl fmt::Display for TransformOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Builds the result tree one event at a time.
///
/// While a capture is open every event only contributes its text, which is
/// how attribute values, comments, messages and variable contents are built.
pub(crate) struct OutputBuilder<'o> {
    doc: dom::Document<'o>,
    open: Vec<OpenElement<'o>>,
    captures: Vec<String>,
    loose_text: String,
    text_only: bool,
}

struct OpenElement<'o> {
    element: dom::Element<'o>,
    has_children: bool,
}

enum Parent<'o> {
    Root(dom::Root<'o>),
    Element(dom::Element<'o>),
}

impl<'o> OutputBuilder<'o> {
    pub(crate) fn new(doc: dom::Document<'o>, method: Method) -> Self {
        Self {
            doc,
            open: Vec::new(),
            captures: Vec::new(),
            loose_text: String::new(),
            text_only: method == Method::Text,
        }
    }

    fn capturing(&self) -> bool {
        self.text_only || !self.captures.is_empty()
    }

    pub(crate) fn begin_capture(&mut self) {
        self.captures.push(String::new());
    }

    pub(crate) fn end_capture(&mut self) -> String {
        self.captures.pop().unwrap_or_default()
    }

    fn parent(&mut self) -> Parent<'o> {
        match self.open.last_mut() {
            Some(open) => {
                open.has_children = true;
                Parent::Element(open.element)
            }
            None => Parent::Root(self.doc.root()),
        }
    }

    fn append_element(&mut self, element: dom::Element<'o>) -> Result<(), String> {
        match self.parent() {
            Parent::Element(parent) => parent.append_child(element),
            Parent::Root(root) => {
                let has_element = root
                    .children()
                    .iter()
                    .any(|c| matches!(c, dom::ChildOfRoot::Element(_)));
                if has_element {
                    return Err("result has more than one top-level element".to_string());
                }
                root.append_child(element);
            }
        }
        Ok(())
    }

    pub(crate) fn start_element(
        &mut self,
        namespace: Option<&str>,
        local: &str,
        prefix: Option<&str>,
    ) -> Result<(), String> {
        if self.capturing() {
            return Ok(());
        }
        let element = self
            .doc
            .create_element(QName::with_namespace_uri(namespace, local));
        if namespace.is_some() {
            element.set_preferred_prefix(prefix);
        }
        self.append_element(element)?;
        self.open.push(OpenElement {
            element,
            has_children: false,
        });
        Ok(())
    }

    /// Open a copy of `element` without its attributes or children.
    pub(crate) fn start_copy(&mut self, element: dom::Element<'_>) -> Result<(), String> {
        if self.capturing() {
            return Ok(());
        }
        let name = element.name();
        let copy = self
            .doc
            .create_element(QName::with_namespace_uri(name.namespace_uri(), name.local_part()));
        copy.set_preferred_prefix(element.preferred_prefix());
        self.append_element(copy)?;
        self.open.push(OpenElement {
            element: copy,
            has_children: false,
        });
        Ok(())
    }

    pub(crate) fn end_element(&mut self) {
        if !self.capturing() {
            self.open.pop();
        }
    }

    pub(crate) fn text(&mut self, text: &str) {
        if let Some(capture) = self.captures.last_mut() {
            capture.push_str(text);
            return;
        }
        if text.is_empty() {
            return;
        }
        if self.text_only {
            self.loose_text.push_str(text);
            return;
        }
        match self.parent() {
            Parent::Element(parent) => parent.append_child(self.doc.create_text(text)),
            Parent::Root(_) => self.loose_text.push_str(text),
        }
    }

    pub(crate) fn attribute(
        &mut self,
        namespace: Option<&str>,
        local: &str,
        prefix: Option<&str>,
        value: &str,
    ) -> Result<(), String> {
        if self.capturing() {
            return Ok(());
        }
        let Some(open) = self.open.last() else {
            return Err(format!("attribute `{local}` created outside an element"));
        };
        if open.has_children {
            return Err(format!("attribute `{local}` created after element content"));
        }
        let attribute = open
            .element
            .set_attribute_value(QName::with_namespace_uri(namespace, local), value);
        if namespace.is_some() {
            attribute.set_preferred_prefix(prefix);
        }
        Ok(())
    }

    pub(crate) fn comment(&mut self, text: &str) {
        if self.capturing() {
            return;
        }
        let comment = self.doc.create_comment(text);
        match self.parent() {
            Parent::Element(parent) => parent.append_child(comment),
            Parent::Root(root) => root.append_child(comment),
        }
    }

    /// Deep-copy an input node into the result.
    pub(crate) fn copy(&mut self, node: Node<'_>) -> Result<(), String> {
        if self.capturing() {
            if !matches!(node, Node::Attribute(_) | Node::Comment(_) | Node::ProcessingInstruction(_)) {
                self.text(&node.string_value());
            }
            return Ok(());
        }
        match node {
            Node::Root(_) => {
                for child in node.children() {
                    self.copy(child)?;
                }
            }
            Node::Attribute(attribute) => {
                let Some(open) = self.open.last() else {
                    return Err("attribute copied outside an element".to_string());
                };
                if open.has_children {
                    return Err("attribute copied after element content".to_string());
                }
                copy_attribute(open.element, attribute);
            }
            Node::Text(t) => self.text(t.text()),
            Node::Element(_) => {
                if let Some(dom::ChildOfElement::Element(copy)) = copy_node(self.doc, node) {
                    self.append_element(copy)?;
                }
            }
            Node::Comment(c) => self.comment(c.text()),
            Node::ProcessingInstruction(_) | Node::Namespace(_) => {
                if let Some(copy) = copy_node(self.doc, node)
                    && let Parent::Element(parent) = self.parent()
                {
                    parent.append_child(copy);
                }
            }
        }
        Ok(())
    }

    /// Text written outside any element.
    pub(crate) fn finish(self) -> String {
        self.loose_text
    }
}
