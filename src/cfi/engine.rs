//! CFI engine
//!
//! Binds a [`DocumentTree`] and an optional [`IgnoreFilter`] so callers
//! encode and decode with the same filter, which is what makes a CFI
//! generated in a highlighted chapter resolve back to the same text.

use super::generator;
use super::ignore::IgnoreFilter;
use super::indexer;
use super::locator;
use super::parser::parse;
use super::types::{Cfi, Segment, Step};
use crate::error::{CfiError, Result};
use crate::tree::{Boundary, DocumentTree, DomRange};

/// Anything a CFI can be built from
#[derive(Debug, Clone)]
pub enum CfiSource<'s, N> {
    /// A CFI string; must carry the `epubcfi(...)` wrapper
    Str(&'s str),
    Range(DomRange<N>),
    Node(N),
    Cfi(Cfi),
}

/// Encoder and resolver over one content document
pub struct CfiEngine<'a, T: DocumentTree + ?Sized> {
    tree: &'a T,
    ignore: Option<IgnoreFilter<'a, T::Node>>,
}

impl<'a, T: DocumentTree + ?Sized> CfiEngine<'a, T> {
    pub fn new(tree: &'a T) -> Self {
        Self { tree, ignore: None }
    }

    /// Exclude the elements matched by `filter` from all addressing
    pub fn with_ignore(mut self, filter: IgnoreFilter<'a, T::Node>) -> Self {
        self.ignore = Some(filter);
        self
    }

    /// Exclude elements carrying `class`, e.g. injected highlight spans
    pub fn with_ignore_class(self, class: impl Into<String>) -> Self {
        let tree = self.tree;
        let class = class.into();
        self.with_ignore(IgnoreFilter::from_fn(move |node: T::Node| tree.has_class(node, &class)))
    }

    pub fn tree(&self) -> &'a T {
        self.tree
    }

    fn ignore(&self) -> Option<&IgnoreFilter<'a, T::Node>> {
        self.ignore.as_ref()
    }

    pub fn parse(&self, text: &str) -> Cfi {
        parse(text)
    }

    /// Step path from the document element to `node`
    pub fn path_to(&self, node: T::Node, offset: Option<usize>) -> Segment {
        indexer::path_to(self.tree, node, offset, self.ignore())
    }

    pub fn from_range(&self, range: &DomRange<T::Node>, base: Segment) -> Cfi {
        generator::from_range(self.tree, range, base, self.ignore())
    }

    pub fn from_node(&self, node: T::Node, base: Segment) -> Cfi {
        generator::from_node(self.tree, node, base, self.ignore())
    }

    pub fn to_range(&self, cfi: &Cfi) -> Option<DomRange<T::Node>> {
        locator::to_range(self.tree, cfi, self.ignore())
    }

    pub fn find_node(&self, steps: &[Step]) -> Option<T::Node> {
        locator::find_node(self.tree, steps, self.ignore())
    }

    pub fn fix_miss(&self, steps: &[Step], offset: usize) -> Option<Boundary<T::Node>> {
        locator::fix_miss(self.tree, steps, offset, self.ignore())
    }

    /// Build a CFI from any supported source. Strings without the
    /// `epubcfi(...)` wrapper are rejected; `base` is ignored for strings
    /// and existing CFIs.
    pub fn from_source(&self, source: CfiSource<'_, T::Node>, base: Segment) -> Result<Cfi> {
        match source {
            CfiSource::Str(text) if Cfi::is_cfi_string(text) => Ok(parse(text)),
            CfiSource::Str(text) => Err(CfiError::InvalidSource(text.to_string())),
            CfiSource::Range(range) => Ok(self.from_range(&range, base)),
            CfiSource::Node(node) => Ok(self.from_node(node, base)),
            CfiSource::Cfi(cfi) => Ok(cfi),
        }
    }
}
