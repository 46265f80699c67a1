//! CFI Parser
//!
//! Parses EPUB CFI strings into structured [`Cfi`] values.
//!
//! Grammar (informal):
//! ```text
//! cfi         = ["epubcfi("] component "!" path-or-range [")"]
//! path-or-range = component | component "," component "," component
//! component   = {"/" step} [":" terminal]
//! step        = integer ["[" id "]"]
//! terminal    = [integer] ["[" assertion "]"]
//! ```
//!
//! Parsing never fails. Step tokens without a leading integer are dropped,
//! and a base without a spine step yields `spine_pos == -1`. CFIs found in
//! the wild are often slightly off-grammar, and sorting or resolving a
//! large batch must not stop on one bad entry.

use super::types::*;

const PREFIX: &str = "epubcfi(";

/// Parse a CFI string into a Cfi struct
pub fn parse(input: &str) -> Cfi {
    let input = input.trim();
    let body = if Cfi::is_cfi_string(input) {
        &input[PREFIX.len()..input.len() - 1]
    } else {
        input
    };

    if body.is_empty() {
        return Cfi::invalid();
    }

    let indirection = split_top_level(body, '!');
    let base = parse_component(indirection[0]);

    let content = indirection.get(1).copied().unwrap_or("");
    let parts = split_top_level(content, ',');
    let path = parse_component(parts[0]);
    let range = if parts.len() == 3 {
        Some(CfiRange {
            start: parse_component(parts[1]),
            end: parse_component(parts[2]),
        })
    } else {
        None
    };

    let spine_pos = spine_pos_of(&base);
    if spine_pos < 0 {
        tracing::debug!("CFI without spine step: {}", input);
    }

    Cfi {
        base,
        path,
        range,
        spine_pos,
    }
}

/// Parse a CFI string, returning `None` for the invalid sentinel
pub fn try_parse(input: &str) -> Option<Cfi> {
    Some(parse(input)).filter(Cfi::is_valid)
}

/// Parse a single path component like `/4/2[para]/1:12`
pub fn parse_component(component: &str) -> Segment {
    let parts = split_top_level(component, ':');
    let terminal = parts
        .get(1)
        .map(|text| parse_terminal(text))
        .unwrap_or_default();

    let mut tokens = split_top_level(parts[0], '/');
    if tokens.first() == Some(&"") {
        tokens.remove(0);
    }

    let steps = tokens.into_iter().filter_map(parse_step).collect();
    Segment { steps, terminal }
}

/// Parse one step token such as `4[chap01ref]`. Returns `None` for tokens
/// that carry no step integer.
pub fn parse_step(token: &str) -> Option<Step> {
    let number = leading_integer(token)?;
    let mut step = Step::from_token(number)?;
    step.id = bracket_content(token);
    Some(step)
}

/// Parse the text after `:`, e.g. `12[yyy,zzz]`
pub fn parse_terminal(text: &str) -> Terminal {
    let head = match find_unescaped(text, '[') {
        Some(pos) => &text[..pos],
        None => text,
    };
    Terminal {
        offset: leading_integer(head),
        assertion: bracket_content(text),
    }
}

/// Leading decimal digits of a token, after leading whitespace
fn leading_integer(token: &str) -> Option<usize> {
    let token = token.trim_start();
    let end = token
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(token.len());
    if end == 0 {
        return None;
    }
    token[..end].parse().ok()
}

/// Split on `delim`, skipping delimiters inside `[...]` and after `^`
fn split_top_level(input: &str, delim: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_brackets = false;
    let mut escaped = false;

    for (i, ch) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '^' => escaped = true,
            '[' => in_brackets = true,
            ']' => in_brackets = false,
            c if c == delim && !in_brackets => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

fn find_unescaped(input: &str, target: char) -> Option<usize> {
    let mut escaped = false;
    for (i, ch) in input.char_indices() {
        if escaped {
            escaped = false;
        } else if ch == '^' {
            escaped = true;
        } else if ch == target {
            return Some(i);
        }
    }
    None
}

/// Unescaped text inside the first bracket pair, `None` when absent or empty
fn bracket_content(token: &str) -> Option<String> {
    let open = find_unescaped(token, '[')?;
    let mut result = String::new();
    let mut escaped = false;

    for ch in token[open + 1..].chars() {
        if escaped {
            result.push(ch);
            escaped = false;
        } else if ch == '^' {
            escaped = true;
        } else if ch == ']' {
            return (!result.is_empty()).then_some(result);
        } else {
            result.push(ch);
        }
    }

    // unclosed bracket
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_point_cfi() {
        let cfi = parse("epubcfi(/6/4[chap01ref]!/4/2/2/1:3)");
        assert_eq!(cfi.spine_pos, 1);
        assert_eq!(cfi.base.steps.len(), 2);
        assert_eq!(cfi.base.steps[1].id.as_deref(), Some("chap01ref"));
        assert_eq!(cfi.path.terminal.offset, Some(3));
        assert_eq!(cfi.path.steps.len(), 4);
        let last = cfi.path.steps.last().unwrap();
        assert_eq!(last.step_type, StepType::Text(0));
        assert!(!cfi.is_range());
    }

    #[test]
    fn test_parse_range_cfi() {
        let cfi = parse("epubcfi(/6/4[chap01ref]!/4/2,/2/1:1,/3:4)");
        assert!(cfi.is_range());
        assert_eq!(cfi.path.steps.len(), 2);
        let start = cfi.start().unwrap();
        assert_eq!(start.steps, vec![Step::element(0), Step::text(0)]);
        assert_eq!(start.terminal.offset, Some(1));
        let end = cfi.end().unwrap();
        assert_eq!(end.steps, vec![Step::text(1)]);
        assert_eq!(end.terminal.offset, Some(4));
    }

    #[test]
    fn test_parse_without_wrapper() {
        let wrapped = parse("epubcfi(/6/4!/4/2/1:42)");
        let bare = parse("/6/4!/4/2/1:42");
        assert_eq!(wrapped, bare);
    }

    #[test]
    fn test_malformed_steps_are_dropped() {
        let cfi = parse("epubcfi(/6/4!/4/x/2/[id]/1:5)");
        assert_eq!(
            cfi.path.steps,
            vec![Step::element(1), Step::element(0), Step::text(0)]
        );
        assert_eq!(cfi.path.terminal.offset, Some(5));
    }

    #[test]
    fn test_leading_integer_with_trailing_garbage() {
        let step = parse_step("4abc").unwrap();
        assert_eq!(step.step_type, StepType::Element(1));
        assert!(parse_step("abc").is_none());
        assert!(parse_step("").is_none());
        assert!(parse_step("0").is_none());
    }

    #[test]
    fn test_missing_spine_step_yields_sentinel() {
        let cfi = parse("epubcfi(/6!/4/2)");
        assert_eq!(cfi.spine_pos, -1);
        assert_eq!(cfi.path.steps.len(), 2);
        assert!(try_parse("epubcfi(/6!/4/2)").is_none());
    }

    #[test]
    fn test_garbage_never_panics() {
        for input in ["", "garbage", "epubcfi()", "epubcfi(!)", ",,", "epubcfi(/6/4!/4[unclosed)", "::::", "/[/]/"] {
            let cfi = parse(input);
            assert!(cfi.spine_pos >= -1);
        }
        assert_eq!(parse("garbage").spine_pos, -1);
    }

    #[test]
    fn test_terminal_with_assertion() {
        let cfi = parse("epubcfi(/6/4!/4/2/1:42[hello,world])");
        let terminal = &cfi.path.terminal;
        assert_eq!(terminal.offset, Some(42));
        assert_eq!(terminal.assertion.as_deref(), Some("hello,world"));
        let assertion = terminal.text_assertion().unwrap();
        assert_eq!(assertion.prefix.as_deref(), Some("hello"));
        assert_eq!(assertion.suffix.as_deref(), Some("world"));
    }

    #[test]
    fn test_escaped_bracket_in_id() {
        let cfi = parse("epubcfi(/6/4[test^]value]!/4)");
        assert_eq!(cfi.base.steps[1].id.as_deref(), Some("test]value"));
        assert_eq!(cfi.spine_pos, 1);
    }

    #[test]
    fn test_delimiters_inside_brackets() {
        let cfi = parse("epubcfi(/6/4[a/b!c,d:e]!/4/1:2)");
        assert_eq!(cfi.base.steps[1].id.as_deref(), Some("a/b!c,d:e"));
        assert!(!cfi.is_range());
        assert_eq!(cfi.path.terminal.offset, Some(2));
    }

    #[test]
    fn test_two_comma_parts_is_not_a_range() {
        let cfi = parse("epubcfi(/6/4!/4/2,/1:0)");
        assert!(!cfi.is_range());
        assert_eq!(cfi.path.steps.len(), 2);
    }

    #[test]
    fn test_roundtrip() {
        for original in [
            "epubcfi(/6/4[chap01ref]!/4/2/2/1:3)",
            "epubcfi(/6/4[chap01ref]!/4/2,/2/1:1,/3:4)",
            "epubcfi(/6/14[chap05ref]!/4[body01]/10/2/1:3[2^[1^]])",
            "epubcfi(/6/4!/4/2/1:42[hello^,world])",
        ] {
            let cfi = parse(original);
            assert_eq!(cfi.to_string(), original);
            assert_eq!(parse(&cfi.to_string()), cfi);
        }
    }

    #[test]
    fn test_empty_shared_path_roundtrip() {
        let cfi = parse("epubcfi(/6/4!/,/4/2/1:1,/6/1:2)");
        assert!(cfi.is_range());
        assert!(cfi.path.steps.is_empty());
        assert_eq!(cfi.to_string(), "epubcfi(/6/4!/,/4/2/1:1,/6/1:2)");
    }

    fn arb_step() -> impl Strategy<Value = Step> {
        (
            any::<bool>(),
            0usize..40,
            proptest::option::of("[a-z][a-z0-9_/!:,\\[\\]^-]{0,8}"),
        )
            .prop_map(|(is_text, index, id)| {
                let mut step = if is_text {
                    Step::text(index)
                } else {
                    Step::element(index)
                };
                step.id = id;
                step
            })
    }

    fn arb_terminal() -> impl Strategy<Value = Terminal> {
        (
            proptest::option::of(0usize..5000),
            proptest::option::of("[a-z ,;=()\\[\\]^]{1,10}"),
        )
            .prop_map(|(offset, assertion)| Terminal { offset, assertion })
    }

    fn arb_segment(max_steps: usize) -> impl Strategy<Value = Segment> {
        (proptest::collection::vec(arb_step(), 0..max_steps), arb_terminal())
            .prop_map(|(steps, terminal)| Segment { steps, terminal })
    }

    fn arb_cfi() -> impl Strategy<Value = Cfi> {
        (
            0usize..30,
            proptest::option::of("[a-z0-9]{1,6}"),
            arb_segment(6),
            proptest::option::of((arb_segment(4), arb_segment(4))),
        )
            .prop_map(|(spine, id, path, range)| {
                let mut spine_step = Step::element(spine);
                spine_step.id = id;
                let base = Segment::with_steps(vec![Step::element(2), spine_step]);
                match range {
                    Some((start, end)) => Cfi::with_range(base, path, CfiRange { start, end }),
                    None => Cfi::new(base, path),
                }
            })
    }

    proptest! {
        #[test]
        fn prop_parse_inverts_display(cfi in arb_cfi()) {
            let text = cfi.to_string();
            prop_assert_eq!(parse(&text), cfi);
        }

        #[test]
        fn prop_parse_never_panics(input in "\\PC{0,40}") {
            let cfi = parse(&input);
            prop_assert!(cfi.spine_pos >= -1);
        }
    }
}
