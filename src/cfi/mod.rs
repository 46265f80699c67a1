//! CFI (Canonical Fragment Identifier) module for EPUB
//!
//! This module provides parsing, generation, comparison and resolution of
//! EPUB CFI strings.
//!
//! # Overview
//!
//! EPUB CFI is a standardized way to reference specific locations within EPUB publications.
//! It uses a path-based syntax similar to XPath but designed specifically for EPUBs.
//!
//! # Example CFI
//!
//! ```text
//! epubcfi(/6/4[chapter1]!/4/2/1:42)
//!         │  │          │ │ │ │ └── character offset 42
//!         │  │          │ │ │ └──── text node (odd = text)
//!         │  │          │ │ └────── element index
//!         │  │          │ └──────── element index (body)
//!         │  │          └────────── indirection (into content doc)
//!         │  └───────────────────── spine item with ID
//!         └──────────────────────── spine element
//! ```
//!
//! # Usage
//!
//! ```
//! use epub_cfi::cfi::{is_before, parse, CfiBuilder, CfiEngine};
//! use epub_cfi::tree::{parse_xhtml, XmlTree};
//!
//! // Parse a CFI string
//! let a = parse("epubcfi(/6/4!/4/2/1:10)");
//! let b = parse("epubcfi(/6/4!/4/2/1:20)");
//! assert!(is_before(&a, &b));
//!
//! // Build a CFI programmatically
//! let cfi = CfiBuilder::new()
//!     .package_step()
//!     .spine_item(1)
//!     .indirection()
//!     .element(1)
//!     .element(0)
//!     .text_node(0)
//!     .character_offset(10)
//!     .build();
//! assert_eq!(cfi, a);
//!
//! // Resolve against a content document
//! let doc = parse_xhtml("<html><head/><body><p>Call me Ishmael.</p></body></html>").unwrap();
//! let tree = XmlTree::new(&doc);
//! let engine = CfiEngine::new(&tree).with_ignore_class("highlight");
//! let range = engine.to_range(&a).unwrap();
//! assert_eq!(range.start.offset, 10);
//! ```

mod comparator;
mod engine;
mod generator;
mod ignore;
mod indexer;
mod locator;
mod parser;
mod types;
pub(crate) mod xpath;

// Re-export main types
pub use types::{Cfi, CfiRange, Segment, Step, StepType, Terminal, TextAssertion};

// Re-export parser functions
pub use parser::{parse, parse_component, parse_step, parse_terminal, try_parse};

// Re-export generator
pub use generator::{from_node, from_range, generate_chapter_component, CfiBuilder};

// Re-export comparator functions
pub use comparator::{
    compare, compare_cfi_strings, equal_step, is_after, is_before, is_in_range, sort_cfis,
};

pub use engine::{CfiEngine, CfiSource};
pub use ignore::{filter, IgnoreFilter};
pub use indexer::{normalized_map, patch_offset, path_to, position, step, text_descendants};
pub use locator::{find_node, fix_miss, to_range, walk_to_node};
pub use xpath::steps_to_xpath;
