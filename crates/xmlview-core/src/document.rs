//! Parsed trees and owned node handles.
//!
//! `sxd-document` nodes borrow their package, so they cannot outlive a single
//! call. `NodeRef` is the owned counterpart: a shared handle to the package
//! plus the child-index path from the document root. Paths are stable because
//! a `Document` is never mutated after it is built.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use sxd_document::Package;
use sxd_document::dom;
use sxd_xpath::nodeset::Node;

use crate::serialize::{self, Method};

/// Post-parse processing applied to every tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParserOptions {
    /// Drop whitespace-only text between elements.
    pub remove_blank_text: bool,
    pub remove_comments: bool,
    pub remove_pis: bool,
}

impl ParserOptions {
    pub fn is_noop(&self) -> bool {
        !self.remove_blank_text && !self.remove_comments && !self.remove_pis
    }
}

/// A parsed, immutable tree. Clones share the underlying package.
#[derive(Clone)]
pub struct Document {
    package: Rc<Package>,
}

impl Document {
    /// Wrap a freshly built package, applying `options` first.
    pub fn from_package(package: Package, options: ParserOptions) -> Self {
        if !options.is_noop() {
            let doc = package.as_document();
            for child in doc.root().children() {
                match child {
                    dom::ChildOfRoot::Element(e) => clean_element(e, options),
                    dom::ChildOfRoot::Comment(c) if options.remove_comments => {
                        doc.root().remove_child(c)
                    }
                    dom::ChildOfRoot::ProcessingInstruction(pi) if options.remove_pis => {
                        doc.root().remove_child(pi)
                    }
                    _ => {}
                }
            }
        }
        Self {
            package: Rc::new(package),
        }
    }

    pub fn dom(&self) -> dom::Document<'_> {
        self.package.as_document()
    }

    pub fn root(&self) -> NodeRef {
        NodeRef {
            doc: self.clone(),
            path: Rc::from(Vec::new()),
        }
    }

    /// The document element, if the tree has one.
    pub fn root_element(&self) -> Option<NodeRef> {
        self.root().children().into_iter().find(NodeRef::is_element)
    }

    /// Whether both handles point at the same package.
    pub fn same(&self, other: &Document) -> bool {
        Rc::ptr_eq(&self.package, &other.package)
    }

    fn id(&self) -> usize {
        Rc::as_ptr(&self.package) as usize
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Document({:#x})", self.id())
    }
}

fn clean_element(element: dom::Element<'_>, options: ParserOptions) {
    let children = element.children();
    let has_elements = children
        .iter()
        .any(|c| matches!(c, dom::ChildOfElement::Element(_)));
    for child in children {
        match child {
            dom::ChildOfElement::Element(e) => clean_element(e, options),
            dom::ChildOfElement::Text(t)
                if options.remove_blank_text && has_elements && t.text().trim().is_empty() =>
            {
                element.remove_child(t)
            }
            dom::ChildOfElement::Comment(c) if options.remove_comments => element.remove_child(c),
            dom::ChildOfElement::ProcessingInstruction(pi) if options.remove_pis => {
                element.remove_child(pi)
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Element,
    Text,
    Comment,
    ProcessingInstruction,
}

/// Owned handle to a node of a [`Document`].
///
/// Attribute and namespace nodes have no handle; queries surface them as
/// text items instead.
#[derive(Clone)]
pub struct NodeRef {
    doc: Document,
    path: Rc<[u32]>,
}

impl NodeRef {
    /// Build a handle for a borrowed node of `doc`.
    ///
    /// Returns `None` for attribute and namespace nodes.
    pub fn from_node(doc: &Document, node: Node<'_>) -> Option<Self> {
        let mut path = Vec::new();
        let mut current = node;
        loop {
            match current {
                Node::Root(_) => break,
                Node::Attribute(_) | Node::Namespace(_) => return None,
                _ => {}
            }
            let parent = current.parent()?;
            let index = parent.children().iter().position(|c| *c == current)?;
            path.push(index as u32);
            current = parent;
        }
        path.reverse();
        Some(Self {
            doc: doc.clone(),
            path: Rc::from(path),
        })
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Resolve the handle against its package.
    pub fn node(&self) -> Option<Node<'_>> {
        self.resolve_from(Node::Root(self.doc.dom().root()))
    }

    /// Follow this handle's path from `root`, a borrowed root of the same tree.
    pub fn resolve_from<'d>(&self, root: Node<'d>) -> Option<Node<'d>> {
        let mut node = root;
        for &index in self.path.iter() {
            node = node.children().get(index as usize).copied()?;
        }
        Some(node)
    }

    pub fn kind(&self) -> Option<NodeKind> {
        Some(match self.node()? {
            Node::Root(_) => NodeKind::Root,
            Node::Element(_) => NodeKind::Element,
            Node::Text(_) => NodeKind::Text,
            Node::Comment(_) => NodeKind::Comment,
            Node::ProcessingInstruction(_) => NodeKind::ProcessingInstruction,
            _ => return None,
        })
    }

    pub fn is_element(&self) -> bool {
        self.kind() == Some(NodeKind::Element)
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// The element itself, or the document element when this is the root.
    pub fn as_element(&self) -> Option<NodeRef> {
        match self.kind()? {
            NodeKind::Element => Some(self.clone()),
            NodeKind::Root => self.doc.root_element(),
            _ => None,
        }
    }

    /// Local name of an element node.
    pub fn local_name(&self) -> Option<String> {
        match self.node()? {
            Node::Element(e) => Some(e.name().local_part().to_string()),
            _ => None,
        }
    }

    /// Namespace URI of an element node.
    pub fn namespace_uri(&self) -> Option<String> {
        match self.node()? {
            Node::Element(e) => e.name().namespace_uri().map(str::to_string),
            _ => None,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        match self.node()? {
            Node::Element(e) => e.attribute_value(name).map(str::to_string),
            _ => None,
        }
    }

    /// Text before the first non-text child of an element.
    ///
    /// Non-element nodes yield their string value.
    pub fn text(&self) -> Option<String> {
        match self.node()? {
            Node::Element(e) => {
                let mut text = String::new();
                for child in e.children() {
                    match child {
                        dom::ChildOfElement::Text(t) => text.push_str(t.text()),
                        _ => break,
                    }
                }
                Some(text)
            }
            other => Some(other.string_value()),
        }
    }

    /// Concatenated descendant text.
    pub fn string_value(&self) -> String {
        self.node().map(|n| n.string_value()).unwrap_or_default()
    }

    pub fn parent(&self) -> Option<NodeRef> {
        let (_, parent) = self.path.split_last()?;
        Some(Self {
            doc: self.doc.clone(),
            path: Rc::from(parent),
        })
    }

    pub fn children(&self) -> Vec<NodeRef> {
        let count = self.node().map(|n| n.children().len()).unwrap_or(0);
        (0..count as u32)
            .map(|index| {
                let mut path = self.path.to_vec();
                path.push(index);
                Self {
                    doc: self.doc.clone(),
                    path: Rc::from(path),
                }
            })
            .collect()
    }

    pub fn element_children(&self) -> Vec<NodeRef> {
        self.children().into_iter().filter(NodeRef::is_element).collect()
    }

    /// Serialize this node with the given method.
    pub fn to_markup(&self, method: Method) -> String {
        serialize::serialize(self, &serialize::Options::new(method))
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.doc.same(&other.doc) && self.path == other.path
    }
}

impl Eq for NodeRef {}

impl Hash for NodeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.doc.id().hash(state);
        self.path.hash(state);
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.local_name() {
            Some(name) => write!(f, "<{name}>@{:?}", self.path),
            None => write!(f, "{:?}@{:?}", self.kind(), self.path),
        }
    }
}
