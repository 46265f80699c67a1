//! Ignore filter
//!
//! Readers inject wrapper elements (highlight spans, search marks) into
//! live chapters. Those wrappers must be invisible to CFIs, otherwise a
//! highlight would shift every address behind it. An [`IgnoreFilter`]
//! names such elements; encode and decode of one address must use the same
//! filter.

use std::fmt;

use crate::tree::{DocumentTree, NodeKind};

/// Predicate over elements excluded from the addressing scheme
pub struct IgnoreFilter<'a, N> {
    test: Box<dyn Fn(N) -> bool + 'a>,
}

impl<'a, N: Copy> IgnoreFilter<'a, N> {
    /// Ignore every node the callback accepts
    pub fn from_fn(test: impl Fn(N) -> bool + 'a) -> Self {
        Self {
            test: Box::new(test),
        }
    }

    /// Ignore elements carrying `class`
    pub fn class<T>(tree: &'a T, class: impl Into<String>) -> Self
    where
        T: DocumentTree<Node = N>,
    {
        let class = class.into();
        Self::from_fn(move |node| tree.has_class(node, &class))
    }

    /// Raw predicate, without the element check
    pub fn matches(&self, node: N) -> bool {
        (self.test)(node)
    }
}

impl<N> fmt::Debug for IgnoreFilter<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IgnoreFilter").finish_non_exhaustive()
    }
}

/// Only elements can be ignored
pub(crate) fn is_ignored<T: DocumentTree + ?Sized>(
    tree: &T,
    node: T::Node,
    ignore: Option<&IgnoreFilter<'_, T::Node>>,
) -> bool {
    match ignore {
        Some(filter) => tree.kind(node) == NodeKind::Element && filter.matches(node),
        None => false,
    }
}

/// True when any element of the document is ignored. Filtering is skipped
/// entirely for documents without injected content.
pub(crate) fn any_ignored<T: DocumentTree + ?Sized>(
    tree: &T,
    ignore: Option<&IgnoreFilter<'_, T::Node>>,
) -> bool {
    ignore.is_some()
        && tree
            .descendants()
            .into_iter()
            .any(|node| is_ignored(tree, node, ignore))
}

/// Map a node onto the node that represents it in the addressing scheme.
///
/// - an ignored element is skipped (`None`)
/// - a text node inside an ignored element is merged into a text sibling
///   of that element (previous first, then next); without one the text
///   node is kept and its ignored parent is skipped one level up
/// - anything else maps to itself
pub fn filter<T: DocumentTree + ?Sized>(
    tree: &T,
    node: T::Node,
    ignore: &IgnoreFilter<'_, T::Node>,
) -> Option<T::Node> {
    match tree.kind(node) {
        NodeKind::Text => {
            let Some(parent) = tree.parent(node) else {
                return Some(node);
            };
            if !is_ignored(tree, parent, Some(ignore)) {
                return Some(node);
            }
            let is_text = |sibling: &T::Node| tree.kind(*sibling) == NodeKind::Text;
            let sibling = tree
                .previous_sibling(parent)
                .filter(is_text)
                .or_else(|| tree.next_sibling(parent).filter(is_text));
            Some(sibling.unwrap_or(node))
        }
        _ if is_ignored(tree, node, Some(ignore)) => None,
        _ => Some(node),
    }
}
