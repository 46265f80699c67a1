//! Tree indexing
//!
//! Computes the sibling indices CFI steps are made of, both for encoding
//! (node -> steps) and for decoding (step -> candidate children).
//!
//! With an ignore filter active, sibling lists are normalized first:
//! ignored elements count as text, and every run of adjacent text-like
//! children shares one index. Re-serialized markup may split or join text
//! nodes differently than the live document did, and normalizing makes the
//! same position map to the same index either way. Character offsets are
//! then measured from the start of the run (see [`patch_offset`]).

use super::ignore::{filter, is_ignored, IgnoreFilter};
use super::types::{Segment, Step, StepType};
use crate::error::{CfiError, Result};
use crate::tree::{DocumentTree, NodeKind};

type Ignore<'f, 'a, N> = Option<&'f IgnoreFilter<'a, N>>;

/// Step for `node` using raw same-kind sibling positions
pub fn step<T: DocumentTree + ?Sized>(tree: &T, node: T::Node) -> Option<Step> {
    let index = position(tree, node)?;
    Some(step_for(tree, node, index))
}

/// Step for `node` as seen through the ignore filter. `None` when the node
/// is ignored and contributes no step.
pub fn filtered_step<T: DocumentTree + ?Sized>(
    tree: &T,
    node: T::Node,
    ignore: &IgnoreFilter<'_, T::Node>,
) -> Option<Step> {
    let node = filter(tree, node, ignore)?;
    let index = filtered_position(tree, node, Some(ignore))?;
    Some(step_for(tree, node, index))
}

fn step_for<T: DocumentTree + ?Sized>(tree: &T, node: T::Node, index: usize) -> Step {
    match tree.kind(node) {
        NodeKind::Text => Step::text(index),
        _ => Step {
            step_type: StepType::Element(index),
            id: tree.id(node).filter(|id| !id.is_empty()).map(str::to_string),
        },
    }
}

/// Ordinal of `node` among its parent's children of the same kind
pub fn position<T: DocumentTree + ?Sized>(tree: &T, node: T::Node) -> Option<usize> {
    let parent = tree.parent(node)?;
    let siblings = match tree.kind(node) {
        NodeKind::Element => tree.element_children(parent),
        NodeKind::Text => text_nodes(tree, parent, None),
        NodeKind::Other => return None,
    };
    siblings.iter().position(|sibling| *sibling == node)
}

/// Normalized index of `node` among its siblings
pub fn filtered_position<T: DocumentTree + ?Sized>(
    tree: &T,
    node: T::Node,
    ignore: Ignore<'_, '_, T::Node>,
) -> Option<usize> {
    let parent = tree.parent(node)?;
    match tree.kind(node) {
        NodeKind::Element => {
            // elements inside an ignored wrapper are counted in the wrapper's parent
            let mut container = parent;
            while is_ignored(tree, container, ignore) {
                container = tree.parent(container)?;
            }
            element_children_through(tree, container, ignore)
                .iter()
                .position(|child| *child == node)
        }
        NodeKind::Text => {
            // text inside an ignored wrapper takes the wrapper's slot
            let (anchor, container) = if is_ignored(tree, parent, ignore) {
                (parent, tree.parent(parent)?)
            } else {
                (node, parent)
            };
            let children = tree.children(container);
            let map = normalized_map(tree, &children, NodeKind::Text, ignore);
            let index = children.iter().position(|child| *child == anchor)?;
            map[index]
        }
        NodeKind::Other => None,
    }
}

/// Normalized index of each child for steps of `kind`, `None` for children
/// that cannot be addressed by such a step.
pub fn normalized_map<T: DocumentTree + ?Sized>(
    tree: &T,
    children: &[T::Node],
    kind: NodeKind,
    ignore: Ignore<'_, '_, T::Node>,
) -> Vec<Option<usize>> {
    let mut output = Vec::with_capacity(children.len());
    let mut prev_index: Option<usize> = None;
    let mut prev_kind: Option<NodeKind> = None;

    for child in children {
        let mut current = tree.kind(*child);
        if is_ignored(tree, *child, ignore) {
            current = NodeKind::Text;
        }

        let entry = if kind == NodeKind::Text
            && current == NodeKind::Text
            && prev_kind == Some(NodeKind::Text)
        {
            // joins the run started by the previous child
            prev_index
        } else if current == kind {
            let next = prev_index.map_or(0, |index| index + 1);
            prev_index = Some(next);
            Some(next)
        } else {
            None
        };

        output.push(entry);
        prev_kind = Some(current);
    }

    output
}

/// Element children of `container`, with every ignored element replaced by
/// its own element children
pub fn element_children_through<T: DocumentTree + ?Sized>(
    tree: &T,
    container: T::Node,
    ignore: Ignore<'_, '_, T::Node>,
) -> Vec<T::Node> {
    let mut out = Vec::new();
    for child in tree.element_children(container) {
        if is_ignored(tree, child, ignore) {
            out.extend(element_children_through(tree, child, ignore));
        } else {
            out.push(child);
        }
    }
    out
}

/// Text children of `container`, plus ignored elements when filtering
pub fn text_nodes<T: DocumentTree + ?Sized>(
    tree: &T,
    container: T::Node,
    ignore: Ignore<'_, '_, T::Node>,
) -> Vec<T::Node> {
    tree.children(container)
        .into_iter()
        .filter(|child| tree.kind(*child) == NodeKind::Text || is_ignored(tree, *child, ignore))
        .collect()
}

/// Text nodes below `node` in document order
pub fn text_descendants<T: DocumentTree + ?Sized>(tree: &T, node: T::Node) -> Vec<T::Node> {
    let mut out = Vec::new();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        match tree.kind(current) {
            NodeKind::Text => out.push(current),
            NodeKind::Element => stack.extend(tree.children(current).into_iter().rev()),
            NodeKind::Other => {}
        }
    }
    out
}

/// Children of `container` addressed by `step`, in document order.
///
/// Without a filter this is at most one node: the n-th element or n-th
/// text child. With a filter, element steps count through ignored wrappers
/// and text steps yield every child sharing the step's normalized index,
/// i.e. a whole text run.
pub fn step_candidates<T: DocumentTree + ?Sized>(
    tree: &T,
    container: T::Node,
    step: &Step,
    ignore: Ignore<'_, '_, T::Node>,
) -> Vec<T::Node> {
    let (kind, index) = match step.step_type {
        StepType::Element(index) => (NodeKind::Element, index),
        StepType::Text(index) => (NodeKind::Text, index),
    };

    if ignore.is_none() {
        let siblings = match kind {
            NodeKind::Element => tree.element_children(container),
            _ => text_nodes(tree, container, None),
        };
        return siblings.get(index).copied().into_iter().collect();
    }

    if kind == NodeKind::Element {
        return element_children_through(tree, container, ignore)
            .get(index)
            .copied()
            .into_iter()
            .collect();
    }

    let children = tree.children(container);
    let map = normalized_map(tree, &children, kind, ignore);
    children
        .into_iter()
        .zip(map)
        .filter(|(_, entry)| *entry == Some(index))
        .map(|(child, _)| child)
        .collect()
}

/// Build the step path from the document element down to `node`.
///
/// With an offset, the path always ends in a text step.
pub fn path_to<T: DocumentTree + ?Sized>(
    tree: &T,
    node: T::Node,
    offset: Option<usize>,
    ignore: Ignore<'_, '_, T::Node>,
) -> Segment {
    let mut segment = Segment::default();
    let mut current = node;

    while let Some(parent) = tree.parent(current) {
        let next = match ignore {
            Some(ignore) => filtered_step(tree, current, ignore),
            None => step(tree, current),
        };
        if let Some(next) = next {
            segment.steps.push(next);
        }
        current = parent;
    }
    segment.steps.reverse();

    if let Some(offset) = offset {
        segment.terminal.offset = Some(offset);
        if !segment.steps.last().is_some_and(Step::is_text) {
            segment.steps.push(Step::text(0));
        }
    }

    segment
}

/// Convert an offset inside `anchor` into an offset from the start of its
/// normalized text run, adding the length of preceding text nodes and
/// ignored elements.
pub fn patch_offset<T: DocumentTree + ?Sized>(
    tree: &T,
    anchor: T::Node,
    offset: usize,
    ignore: &IgnoreFilter<'_, T::Node>,
) -> Result<usize> {
    if tree.kind(anchor) != NodeKind::Text {
        return Err(CfiError::NotTextNode);
    }

    let mut current = anchor;
    let mut total = offset;

    if let Some(parent) = tree.parent(anchor) {
        if is_ignored(tree, parent, Some(ignore)) {
            current = parent;
        }
    }

    while let Some(previous) = tree.previous_sibling(current) {
        match tree.kind(previous) {
            NodeKind::Text => total += tree.text_length(previous),
            NodeKind::Element if is_ignored(tree, previous, Some(ignore)) => {
                total += tree.text_length(previous)
            }
            _ => break,
        }
        current = previous;
    }

    Ok(total)
}
