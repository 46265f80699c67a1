//! XPath fast path
//!
//! Without an ignore filter a step list maps directly onto a positional
//! XPath expression, which trees with native XPath support can evaluate in
//! one call. [`evaluate`] implements exactly the expressions produced by
//! [`steps_to_xpath`] for trees without an engine of their own.

use super::types::{Step, StepType};
use crate::error::{CfiError, Result};
use crate::tree::{DocumentTree, NodeKind};

const ROOT: &str = "./*";

/// Build `./*/*[2]/text()[1]`-style expressions from steps. Steps with an
/// id assertion check both position and id.
pub fn steps_to_xpath(steps: &[Step]) -> String {
    let mut xpath = String::from(ROOT);
    for step in steps {
        let position = step.index() + 1;
        xpath.push('/');
        match (&step.id, step.step_type) {
            (Some(id), _) => {
                let quote = if id.contains('\'') { '"' } else { '\'' };
                xpath.push_str(&format!(
                    "*[position()={} and @id={}{}{}]",
                    position, quote, id, quote
                ));
            }
            (None, StepType::Text(_)) => xpath.push_str(&format!("text()[{}]", position)),
            (None, StepType::Element(_)) => xpath.push_str(&format!("*[{}]", position)),
        }
    }
    xpath
}

#[derive(Debug, PartialEq, Eq)]
enum XPathStep<'a> {
    Element(usize),
    ElementWithId(usize, &'a str),
    Text(usize),
}

fn parse_expr(expr: &str) -> Result<Vec<XPathStep<'_>>> {
    let invalid = || CfiError::InvalidXPath(expr.to_string());
    let mut rest = expr.strip_prefix(ROOT).ok_or_else(invalid)?;
    let mut steps = Vec::new();

    while !rest.is_empty() {
        rest = rest.strip_prefix('/').ok_or_else(invalid)?;
        let (step, tail) = parse_step(rest).ok_or_else(invalid)?;
        steps.push(step);
        rest = tail;
    }

    Ok(steps)
}

fn parse_step(input: &str) -> Option<(XPathStep<'_>, &str)> {
    if let Some(rest) = input.strip_prefix("text()[") {
        let (position, rest) = parse_position(rest)?;
        return Some((XPathStep::Text(position), rest.strip_prefix(']')?));
    }
    if let Some(rest) = input.strip_prefix("*[position()=") {
        let (position, rest) = parse_position(rest)?;
        let rest = rest.strip_prefix(" and @id=")?;
        let quote = rest.chars().next().filter(|c| *c == '\'' || *c == '"')?;
        let rest = &rest[1..];
        let close = rest.find(quote)?;
        let id = &rest[..close];
        let rest = rest[close + 1..].strip_prefix(']')?;
        return Some((XPathStep::ElementWithId(position, id), rest));
    }
    let rest = input.strip_prefix("*[")?;
    let (position, rest) = parse_position(rest)?;
    Some((XPathStep::Element(position), rest.strip_prefix(']')?))
}

fn parse_position(input: &str) -> Option<(usize, &str)> {
    let end = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let position = input[..end].parse().ok()?;
    Some((position, &input[end..]))
}

/// Evaluate an expression from [`steps_to_xpath`] against `tree`
pub fn evaluate<T: DocumentTree + ?Sized>(tree: &T, expr: &str) -> Result<Option<T::Node>> {
    let steps = parse_expr(expr)?;
    let Some(mut node) = tree.document_element() else {
        return Ok(None);
    };

    for step in steps {
        let found = match step {
            XPathStep::Element(position) => nth(tree.element_children(node), position),
            XPathStep::ElementWithId(position, id) => {
                nth(tree.element_children(node), position).filter(|n| tree.id(*n) == Some(id))
            }
            XPathStep::Text(position) => {
                let texts = tree
                    .children(node)
                    .into_iter()
                    .filter(|child| tree.kind(*child) == NodeKind::Text)
                    .collect();
                nth(texts, position)
            }
        };
        match found {
            Some(next) => node = next,
            None => return Ok(None),
        }
    }

    Ok(Some(node))
}

/// XPath positions are 1-based
fn nth<N: Copy>(nodes: Vec<N>, position: usize) -> Option<N> {
    nodes.get(position.checked_sub(1)?).copied()
}
