use termrat::combinator::{forward_ref, left, list, or, right, transform};
use termrat::lexeme::{pattern, text};
use termrat::{parse, parse_prefix, Source, TermRef, Value};

fn int_term() -> TermRef<()> {
    transform(pattern(r"\d+").unwrap(), |v| {
        Value::Int(v.as_str().unwrap().parse().unwrap())
    })
}

/// A self-referential grammar wrapping `Int` in any number of parens,
/// built through a `ForwardRef` so the definition can close over itself.
fn nested_parens() -> TermRef<()> {
    or(int_term(), right(text("("), left(forward_ref(nested_parens), text(")"))))
}

/// The driver's explicit work-stack must unwind 100 levels of nesting
/// without exhausting the host stack — the thing an ordinary recursive
/// parser would do naturally, and a trampolined one must do deliberately.
#[test]
fn nested_parens_unwind_a_hundred_levels_without_stack_overflow() {
    let depth = 100;
    let mut source = String::new();
    source.push_str(&"(".repeat(depth));
    source.push('1');
    source.push_str(&")".repeat(depth));

    let ans = parse(nested_parens(), Source::Text(source.as_bytes())).unwrap();
    assert_eq!(ans, Value::Int(1));
}

/// Regression: a `List` whose inner term matches the empty string every
/// time must not loop forever. The no-progress rule excludes the
/// zero-width iteration and stops, so the result is an empty list
/// consuming nothing.
#[test]
fn list_of_an_empty_matching_term_stops_immediately() {
    let term = list(text(""));
    let ans = parse_prefix(term, Source::Text(b"abc")).unwrap();
    assert_eq!(ans.0, Value::List(Vec::new()));
    assert_eq!(ans.1, 0);
}
