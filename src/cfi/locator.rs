//! CFI resolution
//!
//! Turns steps back into concrete nodes and a CFI into a [`DomRange`].
//! Resolution never fails hard: a missing container yields `None`, and an
//! offset that no longer fits its text node (content drifted since the CFI
//! was generated) is recovered by [`fix_miss`].

use super::ignore::{any_ignored, IgnoreFilter};
use super::indexer::{normalized_map, step_candidates, text_descendants};
use super::types::{Cfi, Step};
use super::xpath::steps_to_xpath;
use crate::error::CfiError;
use crate::tree::{Boundary, DocumentTree, DomRange, NodeKind};

type Ignore<'f, 'a, N> = Option<&'f IgnoreFilter<'a, N>>;

/// Resolve steps to a node. Uses the tree's XPath support when no filter is
/// active, and walks the tree otherwise.
pub fn find_node<T: DocumentTree + ?Sized>(
    tree: &T,
    steps: &[Step],
    ignore: Ignore<'_, '_, T::Node>,
) -> Option<T::Node> {
    if ignore.is_none() {
        match tree.evaluate_xpath(&steps_to_xpath(steps)) {
            Ok(found) => return found,
            Err(CfiError::XPathUnsupported) => {}
            Err(err) => tracing::debug!("XPath fast path failed, walking instead: {}", err),
        }
    }
    walk_to_node(tree, steps, ignore)
}

/// Walk the steps top-down from the document element. Element steps with
/// an id assertion resolve by id first since positions may have drifted.
pub fn walk_to_node<T: DocumentTree + ?Sized>(
    tree: &T,
    steps: &[Step],
    ignore: Ignore<'_, '_, T::Node>,
) -> Option<T::Node> {
    let mut container = tree.document_element()?;

    for step in steps {
        let by_id = match (&step.id, step.is_element()) {
            (Some(id), true) => tree.get_element_by_id(id),
            _ => None,
        };
        let next = by_id.or_else(|| {
            step_candidates(tree, container, step, ignore)
                .first()
                .copied()
        });

        match next {
            Some(node) => container = node,
            None => {
                tracing::debug!("No node for step {} below {:?}", step, container);
                return None;
            }
        }
    }

    Some(container)
}

/// Recover from an offset that does not fit the resolved text node.
///
/// Re-resolves the parent of the last step and walks every child sharing
/// the last step's normalized index, consuming the offset child by child
/// until it fits. Returns an in-bounds boundary whenever the parent exists:
/// an offset past the whole run is clamped to its end.
pub fn fix_miss<T: DocumentTree + ?Sized>(
    tree: &T,
    steps: &[Step],
    offset: usize,
    ignore: Ignore<'_, '_, T::Node>,
) -> Option<Boundary<T::Node>> {
    let (last, parent_steps) = steps.split_last()?;

    if last.is_element() {
        let node = find_node(tree, steps, ignore)?;
        return Some(Boundary::new(node, offset.min(tree.boundary_length(node))));
    }

    let container = find_node(tree, parent_steps, ignore)?;
    let children = tree.children(container);
    let map = normalized_map(tree, &children, NodeKind::Text, ignore);
    let target = Some(last.index());

    let mut remaining = offset;
    let mut last_candidate = None;

    for (child, entry) in children.iter().zip(&map) {
        if *entry != target {
            continue;
        }
        let length = tree.text_length(*child);
        if remaining > length {
            remaining -= length;
            last_candidate = Some(*child);
            continue;
        }
        tracing::debug!(
            "Recovered drifted offset {} as {} in {:?}",
            offset,
            remaining,
            child
        );
        return Some(boundary_inside(tree, *child, remaining));
    }

    match last_candidate {
        Some(child) => {
            tracing::debug!("Offset {} past end of text run, clamping", offset);
            Some(boundary_inside(tree, child, tree.text_length(child)))
        }
        None => Some(Boundary::new(
            container,
            offset.min(tree.boundary_length(container)),
        )),
    }
}

/// Boundary at character `offset` of `node`'s text content. Elements
/// resolve into the text descendant holding that character.
fn boundary_inside<T: DocumentTree + ?Sized>(
    tree: &T,
    node: T::Node,
    offset: usize,
) -> Boundary<T::Node> {
    if tree.kind(node) != NodeKind::Element {
        return Boundary::new(node, offset.min(tree.boundary_length(node)));
    }

    let texts = text_descendants(tree, node);
    let mut remaining = offset;
    for text in &texts {
        let length = tree.text_length(*text);
        if remaining <= length {
            return Boundary::new(*text, remaining);
        }
        remaining -= length;
    }

    match texts.last() {
        Some(text) => Boundary::new(*text, tree.text_length(*text)),
        None => Boundary::new(node, 0),
    }
}

/// Resolve a CFI to a concrete range. Returns `None` when the start cannot
/// be found; an unresolvable end collapses the range onto its start.
///
/// The filter only applies when the document actually contains ignored
/// elements.
pub fn to_range<T: DocumentTree + ?Sized>(
    tree: &T,
    cfi: &Cfi,
    ignore: Ignore<'_, '_, T::Node>,
) -> Option<DomRange<T::Node>> {
    let ignore = if any_ignored(tree, ignore) { ignore } else { None };

    let (start_steps, start_terminal) = cfi.start_point();
    let start = find_node(tree, &start_steps, ignore).and_then(|container| {
        resolve_boundary(tree, &start_steps, container, start_terminal.offset, ignore)
    });
    let Some(start) = start else {
        tracing::warn!("No start container found for {}", cfi);
        return None;
    };

    let end = if cfi.is_range() {
        let (end_steps, end_terminal) = cfi.end_point();
        find_node(tree, &end_steps, ignore)
            .and_then(|container| {
                resolve_boundary(tree, &end_steps, container, end_terminal.offset, ignore)
            })
            .unwrap_or_else(|| {
                tracing::warn!("No end container found for {}, collapsing to start", cfi);
                start
            })
    } else {
        start
    };

    Some(DomRange::new(start, end))
}

/// Place `offset` in `container`, falling back to [`fix_miss`] when it does
/// not fit or a text step landed on something other than text.
fn resolve_boundary<T: DocumentTree + ?Sized>(
    tree: &T,
    steps: &[Step],
    container: T::Node,
    offset: Option<usize>,
    ignore: Ignore<'_, '_, T::Node>,
) -> Option<Boundary<T::Node>> {
    let offset = offset.unwrap_or(0);
    let expects_text = steps.last().is_some_and(Step::is_text);

    if !expects_text || tree.kind(container) == NodeKind::Text {
        if let Some(boundary) = Boundary::checked(tree, container, offset) {
            return Some(boundary);
        }
    }

    tracing::debug!("Offset {} misses {:?}, recovering", offset, container);
    fix_miss(tree, steps, offset, ignore)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfi::parser::parse;
    use crate::tree::{parse_xhtml, XmlTree};

    const CHAPTER: &str = r#"<html xmlns="http://www.w3.org/1999/xhtml"><head><title>Chapter</title></head><body><section id="s1"><p>Call me Ishmael.</p><p id="p2">Some years ago<em>never mind</em> how long</p></section></body></html>"#;

    /// Same tree without XPath support
    struct Plain<'a, 'i>(XmlTree<'a, 'i>);

    impl<'a, 'i: 'a> DocumentTree for Plain<'a, 'i> {
        type Node = roxmltree::Node<'a, 'i>;

        fn document_element(&self) -> Option<Self::Node> {
            self.0.document_element()
        }

        fn parent(&self, node: Self::Node) -> Option<Self::Node> {
            self.0.parent(node)
        }

        fn children(&self, node: Self::Node) -> Vec<Self::Node> {
            self.0.children(node)
        }

        fn kind(&self, node: Self::Node) -> NodeKind {
            self.0.kind(node)
        }

        fn attribute(&self, node: Self::Node, name: &str) -> Option<&str> {
            self.0.attribute(node, name)
        }

        fn tag_name(&self, node: Self::Node) -> Option<&str> {
            self.0.tag_name(node)
        }

        fn text(&self, node: Self::Node) -> Option<&str> {
            self.0.text(node)
        }
    }

    #[test]
    fn test_resolve_point() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        let tree = XmlTree::new(&doc);
        let cfi = parse("epubcfi(/6/4!/4/2[s1]/4[p2]/1:5)");

        let range = to_range(&tree, &cfi, None).unwrap();
        assert!(range.is_collapsed());
        assert_eq!(tree.text(range.start.container), Some("Some years ago"));
        assert_eq!(range.start.offset, 5);
    }

    #[test]
    fn test_resolve_range() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        let tree = XmlTree::new(&doc);
        let cfi = parse("epubcfi(/6/4!/4/2[s1]/4[p2],/1:5,/3:4)");

        let range = to_range(&tree, &cfi, None).unwrap();
        assert_eq!(tree.text(range.start.container), Some("Some years ago"));
        assert_eq!(range.start.offset, 5);
        assert_eq!(tree.text(range.end.container), Some(" how long"));
        assert_eq!(range.end.offset, 4);
    }

    #[test]
    fn test_missing_container_is_none() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        let tree = XmlTree::new(&doc);
        let cfi = parse("epubcfi(/6/4!/4/2[s1]/8/1:0)");
        assert!(to_range(&tree, &cfi, None).is_none());
        assert!(to_range(&Plain(tree), &cfi, None).is_none());
    }

    #[test]
    fn test_missing_end_collapses_to_start() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        let tree = XmlTree::new(&doc);
        let cfi = parse("epubcfi(/6/4!/4/2[s1]/4[p2],/1:5,/9:1)");
        let range = to_range(&tree, &cfi, None).unwrap();
        assert!(range.is_collapsed());
    }

    #[test]
    fn test_walk_matches_xpath() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        let tree = XmlTree::new(&doc);
        let plain = Plain(tree);

        for text in [
            "epubcfi(/6/4!/4/2/4/3)",
            "epubcfi(/6/4!/4/2/4/2/1)",
            "epubcfi(/6/4!/4/2/2)",
            "epubcfi(/6/4!/2/2/1)",
        ] {
            let steps = parse(text).path.steps;
            let fast = find_node(&tree, &steps, None);
            let walked = find_node(&plain, &steps, None);
            assert!(fast.is_some(), "{}", text);
            assert_eq!(fast, walked, "{}", text);
        }
    }

    #[test]
    fn test_walk_prefers_id_over_position() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        let tree = Plain(XmlTree::new(&doc));
        // position says first paragraph, id says the second
        let steps = parse("epubcfi(/6/4!/4/2/2[p2]/1)").path.steps;
        let node = walk_to_node(&tree, &steps, None).unwrap();
        assert_eq!(tree.text(node), Some("Some years ago"));
    }

    #[test]
    fn test_drift_is_clamped_in_bounds() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        let tree = XmlTree::new(&doc);
        let cfi = parse("epubcfi(/6/4!/4/2[s1]/2/1:40)");

        let range = to_range(&tree, &cfi, None).unwrap();
        let container = range.start.container;
        assert_eq!(tree.text(container), Some("Call me Ishmael."));
        assert!(range.start.offset <= tree.text_length(container));
        assert_eq!(range.start.offset, 16);
    }

    #[test]
    fn test_drift_across_injected_wrapper() {
        // the CFI was generated before the highlight existed
        let doc = parse_xhtml(
            r#"<html><body><p>Call me <span class="hl">Ishmael</span>. Some years ago</p></body></html>"#,
        )
        .unwrap();
        let tree = XmlTree::new(&doc);
        let ignore = IgnoreFilter::class(&tree, "hl");
        let cfi = parse("epubcfi(/6/2!/2/2/1:20)");

        let range = to_range(&tree, &cfi, Some(&ignore)).unwrap();
        assert_eq!(tree.text(range.start.container), Some(". Some years ago"));
        assert_eq!(range.start.offset, 5);
    }

    #[test]
    fn test_fix_miss_enters_ignored_element() {
        let doc = parse_xhtml(
            r#"<html><body><p>ab<span class="hl">cd<b>ef</b></span>gh</p></body></html>"#,
        )
        .unwrap();
        let tree = XmlTree::new(&doc);
        let ignore = IgnoreFilter::class(&tree, "hl");
        let steps = parse("epubcfi(/6/2!/2/2/1)").path.steps;

        let boundary = fix_miss(&tree, &steps, 5, Some(&ignore)).unwrap();
        assert_eq!(tree.text(boundary.container), Some("ef"));
        assert_eq!(boundary.offset, 1);

        let boundary = fix_miss(&tree, &steps, 7, Some(&ignore)).unwrap();
        assert_eq!(tree.text(boundary.container), Some("gh"));
        assert_eq!(boundary.offset, 1);

        assert!(fix_miss(&tree, &[], 3, None).is_none());
    }

    #[test]
    fn test_unused_filter_is_dropped() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        let tree = XmlTree::new(&doc);
        let ignore = IgnoreFilter::class(&tree, "hl");
        let cfi = parse("epubcfi(/6/4!/4/2[s1]/4[p2]/3:2)");

        let with = to_range(&tree, &cfi, Some(&ignore)).unwrap();
        let without = to_range(&tree, &cfi, None).unwrap();
        assert_eq!(with, without);
    }
}
