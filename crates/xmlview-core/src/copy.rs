//! Copying nodes between packages.

use sxd_document::{Package, QName, dom};
use sxd_xpath::nodeset::Node;

use crate::document::{Document, NodeRef, ParserOptions};

/// Deep-copy `node` into `target`, detached.
///
/// Roots, attributes and namespace nodes have no child form and yield `None`.
pub fn copy_node<'o>(target: dom::Document<'o>, node: Node<'_>) -> Option<dom::ChildOfElement<'o>> {
    Some(match node {
        Node::Element(e) => copy_element(target, e).into(),
        Node::Text(t) => target.create_text(t.text()).into(),
        Node::Comment(c) => target.create_comment(c.text()).into(),
        Node::ProcessingInstruction(pi) => target
            .create_processing_instruction(pi.target(), pi.value())
            .into(),
        Node::Root(_) | Node::Attribute(_) | Node::Namespace(_) => return None,
    })
}

/// Deep-copy an element with its attributes and in-scope prefixes.
pub fn copy_element<'o>(target: dom::Document<'o>, element: dom::Element<'_>) -> dom::Element<'o> {
    let copy = shallow_element(target, element);
    for child in element.children() {
        let node: Node<'_> = child.into();
        if let Some(child) = copy_node(target, node) {
            copy.append_child(child);
        }
    }
    copy
}

/// Copy an element's name, namespace declarations and attributes, without children.
pub fn shallow_element<'o>(target: dom::Document<'o>, element: dom::Element<'_>) -> dom::Element<'o> {
    let name = element.name();
    let copy = target.create_element(QName::with_namespace_uri(
        name.namespace_uri(),
        name.local_part(),
    ));
    copy.set_preferred_prefix(element.preferred_prefix());
    for namespace in element.namespaces_in_scope() {
        if namespace.prefix() != "xml" {
            copy.register_prefix(namespace.prefix(), namespace.uri());
        }
    }
    for attribute in element.attributes() {
        copy_attribute(copy, attribute);
    }
    copy
}

pub fn copy_attribute<'o>(target: dom::Element<'o>, attribute: dom::Attribute<'_>) {
    let name = attribute.name();
    let copy = target.set_attribute_value(
        QName::with_namespace_uri(name.namespace_uri(), name.local_part()),
        attribute.value(),
    );
    copy.set_preferred_prefix(attribute.preferred_prefix());
}

impl Document {
    /// A standalone document whose root element is a copy of `node`.
    ///
    /// The root handle copies its whole document. Non-element nodes yield `None`.
    pub fn from_subtree(node: &NodeRef) -> Option<Document> {
        if node.is_root() {
            return Some(node.document().clone());
        }
        let Node::Element(element) = node.node()? else {
            return None;
        };
        let package = Package::new();
        {
            let target = package.as_document();
            let copy = copy_element(target, element);
            target.root().append_child(copy);
        }
        Some(Document::from_package(package, ParserOptions::default()))
    }
}
