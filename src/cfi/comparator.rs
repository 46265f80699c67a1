//! CFI Comparison and Ordering
//!
//! Implements comparison logic for CFIs to enable sorting annotations
//! and determining reading progress order.
//!
//! Order: spine position, then the start steps element-wise by index (a
//! path that runs out first sorts first), then the terminal offset. A range
//! compares as its start point.
//!
//! Steps compare by their kind-relative index, not by wire token, so an
//! element and a text node with the same index tie at that level. In mixed
//! content this is not always document order: in `<p><em>xy</em>zw</p>`
//! the text `zw` (`/1`) sorts before anything inside the `em` (`/2/1`)
//! even though it follows it. Sort within one text run or one element
//! when exact reading order matters.

use std::cmp::Ordering;

use super::parser::parse;
use super::types::*;

/// Compare two CFIs by document position
pub fn compare(a: &Cfi, b: &Cfi) -> Ordering {
    let spine = a.spine_pos.cmp(&b.spine_pos);
    if spine != Ordering::Equal {
        return spine;
    }

    let (steps_a, terminal_a) = a.start_point();
    let (steps_b, terminal_b) = b.start_point();

    let step_cmp = compare_steps(&steps_a, &steps_b);
    if step_cmp != Ordering::Equal {
        return step_cmp;
    }

    // a missing offset counts as the start of the node
    terminal_a
        .offset
        .unwrap_or(0)
        .cmp(&terminal_b.offset.unwrap_or(0))
}

/// Compare two sequences of CFI steps by index
fn compare_steps(a: &[Step], b: &[Step]) -> Ordering {
    for (step_a, step_b) in a.iter().zip(b.iter()) {
        let cmp = step_a.index().cmp(&step_b.index());
        if cmp != Ordering::Equal {
            return cmp;
        }
    }

    // An ancestor sorts before its descendants
    a.len().cmp(&b.len())
}

/// Steps are equal when kind, index and id assertion all match
pub fn equal_step(a: &Step, b: &Step) -> bool {
    a.step_type == b.step_type && a.id == b.id
}

/// Determine if CFI `a` comes before CFI `b` in reading order
pub fn is_before(a: &Cfi, b: &Cfi) -> bool {
    compare(a, b) == Ordering::Less
}

/// Determine if CFI `a` comes after CFI `b` in reading order
pub fn is_after(a: &Cfi, b: &Cfi) -> bool {
    compare(a, b) == Ordering::Greater
}

/// Check if a CFI falls within a range (inclusive)
pub fn is_in_range(cfi: &Cfi, start: &Cfi, end: &Cfi) -> bool {
    compare(cfi, start) != Ordering::Less && compare(cfi, end) != Ordering::Greater
}

/// Compare two CFI strings, returning their ordering. Malformed strings
/// parse to the invalid sentinel and sort first.
pub fn compare_cfi_strings(a: &str, b: &str) -> Ordering {
    compare(&parse(a), &parse(b))
}

/// Sort CFIs into reading order. The sort is stable, so entries at the same
/// position keep their input order.
pub fn sort_cfis(cfis: &mut [Cfi]) {
    cfis.sort_by(compare);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_element_and_text_with_same_index_tie() {
        // `zw` after `<em>xy</em>` still sorts before text inside the em
        let after_em = parse("epubcfi(/6/4!/4/2/1:1)");
        let inside_em = parse("epubcfi(/6/4!/4/2/2/1:1)");
        assert_eq!(compare(&after_em, &inside_em), Ordering::Less);
    }

    #[test]
    fn test_cfi_ordering_same_chapter() {
        let a = parse("epubcfi(/6/4!/4/2/1:3)");
        let b = parse("epubcfi(/6/4!/4/2/1:7)");

        assert_eq!(compare(&a, &b), Ordering::Less);
        assert_eq!(compare(&b, &a), Ordering::Greater);
        assert!(is_before(&a, &b));
        assert!(is_after(&b, &a));
    }

    #[test]
    fn test_spine_position_wins() {
        let a = parse("epubcfi(/6/2[a]!/4/2:0)");
        let b = parse("epubcfi(/6/4[b]!/2/2:0)");
        assert_eq!(compare(&a, &b), Ordering::Less);
    }

    #[test]
    fn test_cfi_ordering_different_elements() {
        let a = parse("epubcfi(/6/4!/4/2)");
        let b = parse("epubcfi(/6/4!/4/4)");
        assert_eq!(compare(&a, &b), Ordering::Less);
    }

    #[test]
    fn test_cfi_ordering_nested_depth() {
        let a = parse("epubcfi(/6/4!/4/2)");
        let b = parse("epubcfi(/6/4!/4/2/1)");

        // Deeper path comes after shallower path
        assert_eq!(compare(&a, &b), Ordering::Less);
        assert_eq!(compare(&b, &a), Ordering::Greater);
    }

    #[test]
    fn test_cfi_equality() {
        let a = parse("epubcfi(/6/4!/4/2/1:42)");
        let b = parse("epubcfi(/6/4!/4/2/1:42)");
        assert_eq!(compare(&a, &b), Ordering::Equal);
    }

    #[test]
    fn test_range_compares_as_start() {
        let range = parse("epubcfi(/6/4!/4/2,/2/1:1,/3:4)");
        let start = parse("epubcfi(/6/4!/4/2/2/1:1)");
        assert_eq!(compare(&range, &start), Ordering::Equal);

        let later = parse("epubcfi(/6/4!/4/2/3:0)");
        assert_eq!(compare(&range, &later), Ordering::Less);
    }

    #[test]
    fn test_range_roundtrip_compares_equal() {
        let x = parse("epubcfi(/6/4[chap01ref]!/4/2,/2/1:1,/3:4)");
        let y = parse(&x.to_string());
        assert_eq!(compare(&x, &y), Ordering::Equal);
    }

    #[test]
    fn test_invalid_sorts_first() {
        let invalid = parse("not a cfi");
        let valid = parse("epubcfi(/6/2!/4/2)");
        assert_eq!(compare(&invalid, &valid), Ordering::Less);
    }

    #[test]
    fn test_cfi_in_range() {
        let start = parse("epubcfi(/6/4!/4/2/1:0)");
        let end = parse("epubcfi(/6/4!/4/2/1:100)");
        let middle = parse("epubcfi(/6/4!/4/2/1:50)");
        let outside = parse("epubcfi(/6/4!/4/2/1:150)");

        assert!(is_in_range(&middle, &start, &end));
        assert!(is_in_range(&start, &start, &end));
        assert!(!is_in_range(&outside, &start, &end));
    }

    #[test]
    fn test_sort_cfis() {
        let mut cfis = vec![
            parse("epubcfi(/6/8!/4/2/1:50)"),
            parse("epubcfi(/6/4!/4/2/1:10)"),
            parse("epubcfi(/6/6!/4/2/1:30)"),
            parse("epubcfi(/6/4!/4/2/1:5)"),
        ];

        sort_cfis(&mut cfis);

        assert_eq!(cfis[0].to_string(), "epubcfi(/6/4!/4/2/1:5)");
        assert_eq!(cfis[1].to_string(), "epubcfi(/6/4!/4/2/1:10)");
        assert_eq!(cfis[2].to_string(), "epubcfi(/6/6!/4/2/1:30)");
        assert_eq!(cfis[3].to_string(), "epubcfi(/6/8!/4/2/1:50)");
    }

    #[test]
    fn test_compare_cfi_strings() {
        assert_eq!(
            compare_cfi_strings("epubcfi(/6/4!/4/2/1:10)", "epubcfi(/6/4!/4/2/1:20)"),
            Ordering::Less
        );
        assert_eq!(
            compare_cfi_strings("invalid", "epubcfi(/6/4!/4/2)"),
            Ordering::Less
        );
    }

    #[test]
    fn test_equal_step() {
        assert!(equal_step(&Step::element(1), &Step::element(1)));
        assert!(!equal_step(&Step::element(1), &Step::text(1)));
        assert!(!equal_step(
            &Step::element_with_id(1, "a"),
            &Step::element(1)
        ));
    }

    fn arb_cfi_string() -> impl Strategy<Value = String> {
        (
            1usize..4,
            proptest::collection::vec(1usize..8, 1..5),
            proptest::option::of(0usize..20),
        )
            .prop_map(|(spine, tokens, offset)| {
                let mut text = format!("epubcfi(/6/{}!", spine * 2);
                for token in tokens {
                    text.push_str(&format!("/{}", token));
                }
                if let Some(offset) = offset {
                    text.push_str(&format!(":{}", offset));
                }
                text.push(')');
                text
            })
    }

    proptest! {
        #[test]
        fn prop_compare_is_antisymmetric(a in arb_cfi_string(), b in arb_cfi_string()) {
            let (a, b) = (parse(&a), parse(&b));
            prop_assert_eq!(compare(&a, &b), compare(&b, &a).reverse());
        }

        #[test]
        fn prop_compare_is_reflexive(a in arb_cfi_string()) {
            let a = parse(&a);
            prop_assert_eq!(compare(&a, &a), Ordering::Equal);
        }
    }
}
