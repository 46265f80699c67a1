//! Document tree capability
//!
//! The CFI engine never touches a concrete DOM. Everything it needs from a
//! content document goes through [`DocumentTree`], so the same engine runs
//! against a parsed XHTML chapter, a browser binding or a test fixture.

mod xml;

pub use xml::{parse_xhtml, XmlTree};

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::error::{CfiError, Result};

/// Node kind as seen by the addressing scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Element,
    Text,
    /// Comments, processing instructions and anything else. These are
    /// never addressed and break runs of adjacent text.
    Other,
}

/// Read-only view over a content document.
///
/// `parent` must return `None` for the document element: CFI paths stop
/// below the document node.
pub trait DocumentTree {
    /// Cheap node handle
    type Node: Copy + Eq + Debug;

    /// The root element (`<html>` for XHTML chapters)
    fn document_element(&self) -> Option<Self::Node>;

    fn parent(&self, node: Self::Node) -> Option<Self::Node>;

    /// All child nodes in document order
    fn children(&self, node: Self::Node) -> Vec<Self::Node>;

    fn kind(&self, node: Self::Node) -> NodeKind;

    fn attribute(&self, node: Self::Node, name: &str) -> Option<&str>;

    fn tag_name(&self, node: Self::Node) -> Option<&str>;

    /// Character data of a text node
    fn text(&self, node: Self::Node) -> Option<&str>;

    fn id(&self, node: Self::Node) -> Option<&str> {
        match self.kind(node) {
            NodeKind::Element => self.attribute(node, "id"),
            _ => None,
        }
    }

    fn has_class(&self, node: Self::Node, class: &str) -> bool {
        self.attribute(node, "class")
            .map(|classes| classes.split_ascii_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    fn element_children(&self, node: Self::Node) -> Vec<Self::Node> {
        self.children(node)
            .into_iter()
            .filter(|child| self.kind(*child) == NodeKind::Element)
            .collect()
    }

    fn previous_sibling(&self, node: Self::Node) -> Option<Self::Node> {
        let siblings = self.children(self.parent(node)?);
        let position = siblings.iter().position(|n| *n == node)?;
        position.checked_sub(1).map(|i| siblings[i])
    }

    fn next_sibling(&self, node: Self::Node) -> Option<Self::Node> {
        let siblings = self.children(self.parent(node)?);
        let position = siblings.iter().position(|n| *n == node)?;
        siblings.get(position + 1).copied()
    }

    /// Length of the node's text content in UTF-16 code units, the unit
    /// DOM ranges and CFI character offsets are measured in.
    fn text_length(&self, node: Self::Node) -> usize {
        match self.kind(node) {
            NodeKind::Text => self.text(node).map(utf16_len).unwrap_or(0),
            NodeKind::Element => self
                .children(node)
                .into_iter()
                .map(|child| self.text_length(child))
                .sum(),
            NodeKind::Other => 0,
        }
    }

    /// Largest valid boundary offset inside `node`: characters for text,
    /// child count for everything else.
    fn boundary_length(&self, node: Self::Node) -> usize {
        match self.kind(node) {
            NodeKind::Text => self.text_length(node),
            _ => self.children(node).len(),
        }
    }

    /// Pre-order walk from the document element
    fn descendants(&self) -> Vec<Self::Node> {
        let mut out = Vec::new();
        let mut stack: Vec<Self::Node> = self.document_element().into_iter().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).into_iter().rev());
        }
        out
    }

    fn get_element_by_id(&self, id: &str) -> Option<Self::Node> {
        self.descendants()
            .into_iter()
            .find(|node| self.id(*node) == Some(id))
    }

    /// Evaluate an expression produced by
    /// [`steps_to_xpath`](crate::cfi::steps_to_xpath), returning the first
    /// matching node. Trees without XPath support keep the default.
    fn evaluate_xpath(&self, _expr: &str) -> Result<Option<Self::Node>> {
        Err(CfiError::XPathUnsupported)
    }
}

/// Length of a string in UTF-16 code units
pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// A position inside a node: a character offset for text, a child offset
/// for elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary<N> {
    pub container: N,
    pub offset: usize,
}

impl<N: Copy + Eq + Debug> Boundary<N> {
    pub fn new(container: N, offset: usize) -> Self {
        Self { container, offset }
    }

    /// Build a boundary only if `offset` fits inside `container`
    pub fn checked<T>(tree: &T, container: N, offset: usize) -> Option<Self>
    where
        T: DocumentTree<Node = N> + ?Sized,
    {
        if offset <= tree.boundary_length(container) {
            Some(Self::new(container, offset))
        } else {
            None
        }
    }
}

/// A concrete range between two boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomRange<N> {
    pub start: Boundary<N>,
    pub end: Boundary<N>,
}

impl<N: Copy + Eq + Debug> DomRange<N> {
    pub fn new(start: Boundary<N>, end: Boundary<N>) -> Self {
        Self { start, end }
    }

    /// A collapsed range at a single position
    pub fn caret(at: Boundary<N>) -> Self {
        Self { start: at, end: at }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}
