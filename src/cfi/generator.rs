//! CFI Generator
//!
//! Generates CFIs from document positions and text selections, either by
//! walking a [`DocumentTree`] or programmatically through [`CfiBuilder`].

use super::comparator::equal_step;
use super::ignore::{any_ignored, IgnoreFilter};
use super::indexer::{patch_offset, path_to};
use super::types::*;
use crate::tree::{Boundary, DocumentTree, DomRange, NodeKind};

type Ignore<'f, 'a, N> = Option<&'f IgnoreFilter<'a, N>>;

/// Build the base component for a spine item: `/6/4[id]` for the item at
/// `pos` of the spine element at `spine_node_index` in the package.
pub fn generate_chapter_component(spine_node_index: usize, pos: usize, id: Option<&str>) -> String {
    let mut segment = Segment::with_steps(vec![Step::element(spine_node_index)]);
    segment.push(match id {
        Some(id) if !id.is_empty() => Step::element_with_id(pos, id),
        _ => Step::element(pos),
    });
    segment.to_string()
}

/// CFI for a concrete range. A collapsed range yields a point; otherwise
/// the shared leading steps become `path` and the two ends are stored
/// relative to it.
pub fn from_range<T: DocumentTree + ?Sized>(
    tree: &T,
    range: &DomRange<T::Node>,
    base: Segment,
    ignore: Ignore<'_, '_, T::Node>,
) -> Cfi {
    let ignore = if any_ignored(tree, ignore) { ignore } else { None };

    let start = segment_for(tree, range.start, ignore);
    if range.is_collapsed() {
        return Cfi::new(base, start);
    }
    let end = segment_for(tree, range.end, ignore);

    let mut shared = Vec::new();
    let mut same_position = false;
    for (i, (a, b)) in start.steps.iter().zip(&end.steps).enumerate() {
        if !equal_step(a, b) {
            break;
        }
        if i + 1 < start.steps.len() {
            shared.push(a.clone());
        } else {
            same_position = end.steps.len() == start.steps.len() && start.terminal == end.terminal;
        }
    }

    if same_position {
        tracing::debug!("Range ends are equivalent, demoting to a point");
        return Cfi::new(base, start);
    }

    let shared_len = shared.len();
    let relative = |segment: Segment| Segment {
        steps: segment.steps[shared_len..].to_vec(),
        terminal: segment.terminal,
    };

    Cfi::with_range(
        base,
        Segment::with_steps(shared),
        CfiRange {
            start: relative(start),
            end: relative(end),
        },
    )
}

/// Point CFI addressing a whole node
pub fn from_node<T: DocumentTree + ?Sized>(
    tree: &T,
    node: T::Node,
    base: Segment,
    ignore: Ignore<'_, '_, T::Node>,
) -> Cfi {
    let ignore = if any_ignored(tree, ignore) { ignore } else { None };
    Cfi::new(base, path_to(tree, node, None, ignore))
}

/// Segment for one range boundary. Offsets into text are measured from the
/// start of the normalized run when filtering.
fn segment_for<T: DocumentTree + ?Sized>(
    tree: &T,
    boundary: Boundary<T::Node>,
    ignore: Ignore<'_, '_, T::Node>,
) -> Segment {
    let mut offset = boundary.offset;
    if let Some(filter) = ignore {
        if tree.kind(boundary.container) == NodeKind::Text {
            if let Ok(patched) = patch_offset(tree, boundary.container, offset, filter) {
                offset = patched;
            }
        }
    }
    path_to(tree, boundary.container, Some(offset), ignore)
}

/// Builder for constructing CFIs programmatically.
///
/// Steps go into the package part until [`indirection`](Self::indirection)
/// is called, and into the content document part afterwards. Indices are
/// 0-based; the builder derives the even/odd wire numbers.
#[derive(Debug, Clone, Default)]
pub struct CfiBuilder {
    base: Segment,
    path: Segment,
    indirected: bool,
}

impl CfiBuilder {
    /// Create a new CFI builder
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, step: Step) -> Self {
        if self.indirected {
            self.path.push(step);
        } else {
            self.base.push(step);
        }
        self
    }

    /// Add the package spine step (/6 in EPUB 3)
    pub fn package_step(self) -> Self {
        self.push(Step::element(2))
    }

    /// Add a spine item step: index 0 -> /2, index 1 -> /4, etc.
    pub fn spine_item(self, index: usize) -> Self {
        self.push(Step::element(index))
    }

    /// Add a spine item step with ID assertion
    pub fn spine_item_with_id(self, index: usize, id: impl Into<String>) -> Self {
        self.push(Step::element_with_id(index, id))
    }

    /// Enter the content document
    pub fn indirection(mut self) -> Self {
        self.indirected = true;
        self
    }

    /// Add an element step within the content document
    pub fn element(self, index: usize) -> Self {
        self.push(Step::element(index))
    }

    /// Add an element step with ID assertion
    pub fn element_with_id(self, index: usize, id: impl Into<String>) -> Self {
        self.push(Step::element_with_id(index, id))
    }

    /// Add a text node step: first text -> /1, second text -> /3, etc.
    pub fn text_node(self, index: usize) -> Self {
        self.push(Step::text(index))
    }

    /// Set the character offset within a text node
    pub fn character_offset(mut self, offset: usize) -> Self {
        self.current().terminal.offset = Some(offset);
        self
    }

    /// Attach a raw text location assertion such as `prefix,suffix`
    pub fn assertion(mut self, assertion: impl Into<String>) -> Self {
        self.current().terminal.assertion = Some(assertion.into());
        self
    }

    fn current(&mut self) -> &mut Segment {
        if self.indirected {
            &mut self.path
        } else {
            &mut self.base
        }
    }

    /// Build the final CFI
    pub fn build(self) -> Cfi {
        Cfi::new(self.base, self.path)
    }
}
