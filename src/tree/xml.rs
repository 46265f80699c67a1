//! roxmltree-backed document tree
//!
//! Content documents inside an EPUB are XHTML, so a parsed XML tree is
//! enough to encode and resolve CFIs outside of a browser.

use roxmltree::{Document, Node, ParsingOptions};

use super::{DocumentTree, NodeKind};
use crate::cfi::xpath;
use crate::error::Result;

/// Parse an XHTML content document. DOCTYPE declarations are allowed since
/// most EPUB chapters carry one.
pub fn parse_xhtml(text: &str) -> Result<Document<'_>> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Ok(Document::parse_with_options(text, options)?)
}

/// [`DocumentTree`] over a borrowed `roxmltree::Document`
#[derive(Clone, Copy)]
pub struct XmlTree<'a, 'input> {
    doc: &'a Document<'input>,
}

impl<'a, 'input> XmlTree<'a, 'input> {
    pub fn new(doc: &'a Document<'input>) -> Self {
        Self { doc }
    }

    pub fn document(&self) -> &'a Document<'input> {
        self.doc
    }
}

impl<'a, 'input: 'a> DocumentTree for XmlTree<'a, 'input> {
    type Node = Node<'a, 'input>;

    fn document_element(&self) -> Option<Self::Node> {
        Some(self.doc.root_element())
    }

    fn parent(&self, node: Self::Node) -> Option<Self::Node> {
        node.parent().filter(|parent| !parent.is_root())
    }

    fn children(&self, node: Self::Node) -> Vec<Self::Node> {
        node.children().collect()
    }

    fn kind(&self, node: Self::Node) -> NodeKind {
        if node.is_element() {
            NodeKind::Element
        } else if node.is_text() {
            NodeKind::Text
        } else {
            NodeKind::Other
        }
    }

    fn attribute(&self, node: Self::Node, name: &str) -> Option<&str> {
        node.attribute(name)
    }

    fn tag_name(&self, node: Self::Node) -> Option<&str> {
        if node.is_element() {
            Some(node.tag_name().name())
        } else {
            None
        }
    }

    fn text(&self, node: Self::Node) -> Option<&str> {
        if node.is_text() {
            node.text()
        } else {
            None
        }
    }

    fn previous_sibling(&self, node: Self::Node) -> Option<Self::Node> {
        self.parent(node)?;
        node.prev_sibling()
    }

    fn next_sibling(&self, node: Self::Node) -> Option<Self::Node> {
        self.parent(node)?;
        node.next_sibling()
    }

    fn descendants(&self) -> Vec<Self::Node> {
        self.doc.root_element().descendants().collect()
    }

    fn get_element_by_id(&self, id: &str) -> Option<Self::Node> {
        self.doc
            .descendants()
            .find(|node| node.is_element() && node.attribute("id") == Some(id))
    }

    fn evaluate_xpath(&self, expr: &str) -> Result<Option<Self::Node>> {
        xpath::evaluate(self, expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_doctype() {
        let text = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>t</title></head><body/></html>"#;
        let doc = parse_xhtml(text).unwrap();
        let tree = XmlTree::new(&doc);
        let html = tree.document_element().unwrap();
        assert_eq!(tree.tag_name(html), Some("html"));
        assert_eq!(tree.element_children(html).len(), 2);
    }

    #[test]
    fn test_parse_error_is_reported() {
        assert!(parse_xhtml("<html><body></html>").is_err());
    }

    #[test]
    fn test_text_only_on_text_nodes() {
        let doc = parse_xhtml("<html><body><p>abc</p></body></html>").unwrap();
        let tree = XmlTree::new(&doc);
        let p = tree.descendants().into_iter().find(|n| tree.tag_name(*n) == Some("p")).unwrap();
        assert_eq!(tree.text(p), None);
        assert_eq!(tree.text(tree.children(p)[0]), Some("abc"));
    }
}
