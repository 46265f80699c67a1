//! CFI (Canonical Fragment Identifier) types for EPUB
//!
//! EPUB CFI is a standardized way to reference specific locations within EPUB publications.
//! Format: epubcfi(/6/4[chap01ref]!/4/2/22/3:268)
//!
//! The wire form encodes the step kind in the parity of each integer
//! (even = element, odd = text). In memory the kind is explicit and the
//! index is the normalized 0-based sibling position; parity is only
//! re-derived when serializing.
//!
//! Reference: <https://idpf.org/epub/linking/cfi/epub-cfi.html>

use serde::{Deserialize, Serialize};
use std::fmt;

/// A complete EPUB CFI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cfi {
    /// Package document part, before the `!` indirection
    pub base: Segment,
    /// Content document part. For ranges this is the common prefix.
    pub path: Segment,
    /// Range ends relative to `path`, if this CFI is a range
    pub range: Option<CfiRange>,
    /// Spine position taken from the second base step, -1 when invalid
    pub spine_pos: i64,
}

/// The two sides of a range CFI, relative to the shared path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfiRange {
    pub start: Segment,
    pub end: Segment,
}

/// A path through the tree plus its terminal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub steps: Vec<Step>,
    pub terminal: Terminal,
}

/// A single step in a CFI path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub step_type: StepType,
    /// Optional ID assertion `[id]`
    pub id: Option<String>,
}

/// Kind of node a step addresses, with its normalized sibling index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "index", rename_all = "lowercase")]
pub enum StepType {
    Element(usize),
    Text(usize),
}

/// Character offset and optional text location assertion ending a path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terminal {
    pub offset: Option<usize>,
    /// Raw assertion text, not verified against the document
    pub assertion: Option<String>,
}

/// Decoded form of a terminal assertion: `[prefix,suffix;key=value]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextAssertion {
    /// Text before the location
    pub prefix: Option<String>,
    /// Text after the location
    pub suffix: Option<String>,
    /// Additional parameters
    pub parameters: Vec<(String, String)>,
}

impl Cfi {
    /// The sentinel returned for unusable input
    pub fn invalid() -> Self {
        Self {
            base: Segment::default(),
            path: Segment::default(),
            range: None,
            spine_pos: -1,
        }
    }

    /// Create a point CFI; the spine position is taken from `base`
    pub fn new(base: Segment, path: Segment) -> Self {
        let spine_pos = spine_pos_of(&base);
        Self {
            base,
            path,
            range: None,
            spine_pos,
        }
    }

    /// Create a range CFI from a shared path and the two relative ends
    pub fn with_range(base: Segment, path: Segment, range: CfiRange) -> Self {
        let mut cfi = Self::new(base, path);
        cfi.range = Some(range);
        cfi
    }

    /// Check if this CFI represents a range (text selection)
    pub fn is_range(&self) -> bool {
        self.range.is_some()
    }

    /// False for the sentinel produced from malformed input
    pub fn is_valid(&self) -> bool {
        self.spine_pos >= 0
    }

    /// Spine position as an index, if valid
    pub fn spine_index(&self) -> Option<usize> {
        usize::try_from(self.spine_pos).ok()
    }

    pub fn start(&self) -> Option<&Segment> {
        self.range.as_ref().map(|r| &r.start)
    }

    pub fn end(&self) -> Option<&Segment> {
        self.range.as_ref().map(|r| &r.end)
    }

    /// Full steps and terminal of the start point (the only point for
    /// non-range CFIs)
    pub fn start_point(&self) -> (Vec<Step>, &Terminal) {
        match &self.range {
            Some(range) => (join_steps(&self.path.steps, &range.start.steps), &range.start.terminal),
            None => (self.path.steps.clone(), &self.path.terminal),
        }
    }

    /// Full steps and terminal of the end point
    pub fn end_point(&self) -> (Vec<Step>, &Terminal) {
        match &self.range {
            Some(range) => (join_steps(&self.path.steps, &range.end.steps), &range.end.terminal),
            None => (self.path.steps.clone(), &self.path.terminal),
        }
    }

    /// Turn a range into a point by keeping one side. No-op for points.
    pub fn collapse(&mut self, to_start: bool) {
        let Some(range) = self.range.take() else {
            return;
        };
        let side = if to_start { range.start } else { range.end };
        self.path.steps.extend(side.steps);
        self.path.terminal = side.terminal;
    }

    /// Cheap syntactic check for the `epubcfi(...)` wrapper
    pub fn is_cfi_string(text: &str) -> bool {
        text.starts_with("epubcfi(") && text.ends_with(')')
    }
}

impl Default for Cfi {
    fn default() -> Self {
        Self::invalid()
    }
}

/// `base.steps[1].index`, or -1 when the base has no spine step
pub(crate) fn spine_pos_of(base: &Segment) -> i64 {
    base.steps
        .get(1)
        .and_then(|step| i64::try_from(step.index()).ok())
        .unwrap_or(-1)
}

fn join_steps(prefix: &[Step], rest: &[Step]) -> Vec<Step> {
    prefix.iter().chain(rest).cloned().collect()
}

impl Segment {
    /// Create a segment with steps and no terminal
    pub fn with_steps(steps: Vec<Step>) -> Self {
        Self {
            steps,
            terminal: Terminal::default(),
        }
    }

    /// Add a step to the segment
    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// Set the character offset
    pub fn set_offset(&mut self, offset: usize) {
        self.terminal.offset = Some(offset);
    }
}

impl Step {
    /// Create an element step
    pub fn element(index: usize) -> Self {
        Self {
            step_type: StepType::Element(index),
            id: None,
        }
    }

    /// Create an element step with ID assertion
    pub fn element_with_id(index: usize, id: impl Into<String>) -> Self {
        Self {
            step_type: StepType::Element(index),
            id: Some(id.into()),
        }
    }

    /// Create a text step
    pub fn text(index: usize) -> Self {
        Self {
            step_type: StepType::Text(index),
            id: None,
        }
    }

    /// Decode a raw wire integer: even is an element, odd is text
    pub fn from_token(token: usize) -> Option<Self> {
        let step_type = if token % 2 == 0 {
            StepType::Element((token / 2).checked_sub(1)?)
        } else {
            StepType::Text((token - 1) / 2)
        };
        Some(Self {
            step_type,
            id: None,
        })
    }

    /// The raw wire integer for this step
    pub fn token(&self) -> usize {
        match self.step_type {
            StepType::Element(index) => (index + 1) * 2,
            StepType::Text(index) => index * 2 + 1,
        }
    }

    pub fn index(&self) -> usize {
        match self.step_type {
            StepType::Element(index) | StepType::Text(index) => index,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.step_type, StepType::Text(_))
    }

    pub fn is_element(&self) -> bool {
        matches!(self.step_type, StepType::Element(_))
    }
}

impl Terminal {
    pub fn at(offset: usize) -> Self {
        Self {
            offset: Some(offset),
            assertion: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.offset.is_none() && self.assertion.is_none()
    }

    /// Split the raw assertion into prefix, suffix and parameters
    pub fn text_assertion(&self) -> Option<TextAssertion> {
        self.assertion.as_deref().map(TextAssertion::parse)
    }
}

impl TextAssertion {
    /// Parse `prefix,suffix;key=value`. Without a comma the whole text is
    /// taken as the prefix.
    pub fn parse(content: &str) -> Self {
        let (body, params) = match content.find(';') {
            Some(semi_pos) => (&content[..semi_pos], parse_parameters(&content[semi_pos + 1..])),
            None => (content, Vec::new()),
        };

        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        match body.find(',') {
            Some(comma_pos) => Self {
                prefix: non_empty(&body[..comma_pos]),
                suffix: non_empty(&body[comma_pos + 1..]),
                parameters: params,
            },
            None => Self {
                prefix: non_empty(body),
                suffix: None,
                parameters: params,
            },
        }
    }
}

/// Parse parameters from a string like "key1=value1;key2=value2"
fn parse_parameters(s: &str) -> Vec<(String, String)> {
    s.split(';')
        .filter_map(|part| {
            let mut kv = part.splitn(2, '=');
            let key = kv.next()?.trim();
            let value = kv.next()?.trim();
            if key.is_empty() {
                None
            } else {
                Some((key.to_string(), value.to_string()))
            }
        })
        .collect()
}

/// Escape CFI special characters with `^` inside brackets
fn write_escaped(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    for ch in text.chars() {
        if matches!(ch, '^' | '[' | ']' | '(' | ')' | ',' | ';' | '=') {
            write!(f, "^")?;
        }
        write!(f, "{}", ch)?;
    }
    Ok(())
}

// Display implementations for serialization

impl fmt::Display for Cfi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epubcfi({}!{}", self.base, self.path)?;
        if let Some(ref range) = self.range {
            write!(f, ",{},{}", range.start, range.end)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/")?;
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", step)?;
        }
        write!(f, "{}", self.terminal)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())?;
        if let Some(ref id) = self.id {
            write!(f, "[")?;
            write_escaped(f, id)?;
            write!(f, "]")?;
        }
        Ok(())
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        write!(f, ":")?;
        if let Some(offset) = self.offset {
            write!(f, "{}", offset)?;
        }
        if let Some(ref assertion) = self.assertion {
            write!(f, "[")?;
            write_escaped(f, assertion)?;
            write!(f, "]")?;
        }
        Ok(())
    }
}
