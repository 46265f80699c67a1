//! EPUB CFI Library
//!
//! Parses, serializes, orders and resolves EPUB Canonical Fragment
//! Identifiers. The `epub-cfi` binary in main.rs is a thin CLI over it.
//!
//! # Modules
//!
//! - `cfi`: CFI model, grammar, comparator, encoder and resolver
//! - `tree`: Document tree capability and the roxmltree-backed implementation
//! - `config`: Environment configuration for the binary
//! - `error`: Crate-wide error type

pub mod cfi;
pub mod config;
pub mod error;
pub mod tree;

pub use cfi::{parse, Cfi, CfiEngine};
pub use error::{CfiError, Result};
