//! Error types for the CFI engine
//!
//! Parsing and resolution never fail: malformed strings yield a sentinel
//! CFI and unresolvable locations yield `None`. The errors below cover
//! contract violations and malformed content documents.

use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, CfiError>;

/// CFI engine error type
#[derive(Error, Debug)]
pub enum CfiError {
    #[error("Not a valid argument for a CFI: {0}")]
    InvalidSource(String),

    #[error("Anchor must be a text node")]
    NotTextNode,

    #[error("XPath evaluation is not supported by this tree")]
    XPathUnsupported,

    #[error("Invalid XPath expression: {0}")]
    InvalidXPath(String),

    #[error("XML parsing error: {0}")]
    Xml(#[from] roxmltree::Error),
}
