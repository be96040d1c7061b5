use std::rc::Rc;

use termrat::combinator::{or, reduce_left, right, seq};
use termrat::lexeme::{any_char, backtrack, pattern, start, tag, text};
use termrat::{parse, tokenize_and_parse, ImplementationError, Source, TokenSyntax, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Tag {
    Number,
    Operator,
    Space,
}

fn calc_tokens() -> TokenSyntax<Tag> {
    TokenSyntax::new()
        .skip(Tag::Space, r"\s+")
        .unwrap()
        .rule(Tag::Number, r"\d+")
        .unwrap()
        .char_set(Tag::Operator, "+-")
        .unwrap()
}

fn tok(tag: Tag, s: &str) -> Value<Tag> {
    Value::Token(termrat::Token {
        tag,
        content: Rc::new(Value::Str(Rc::from(s))),
        start: 0,
        end: 0,
    })
}

/// Scenario 6: tokenize `"1 + 2 - 3"` against a `Number`/`Operator`
/// syntax with skipped `Space`, then left-fold the token stream the same
/// way a character-source grammar would, matching operators by their
/// dedicated tag (§4.7) rather than by content.
#[test]
fn token_round_trip_left_folds_three_numbers() {
    let syntax = calc_tokens();
    let term = reduce_left(tag(Tag::Number), vec![tag(Tag::Operator)], tag(Tag::Number), None);
    let ans = tokenize_and_parse(&syntax, term, "1 + 2 - 3").unwrap();

    // Value's Token equality compares tag and content only, so the bogus
    // start/end positions in `tok` don't affect the comparison.
    let inner = Value::Tuple(vec![tok(Tag::Number, "1"), tok(Tag::Operator, "+"), tok(Tag::Number, "2")]);
    let expected = Value::Tuple(vec![inner, tok(Tag::Operator, "-"), tok(Tag::Number, "3")]);
    assert_eq!(ans, expected);
}

#[test]
fn skip_rules_are_matched_but_never_emitted() {
    let syntax = calc_tokens();
    let code = termrat::Code::from("1 2   3");
    let tokens = syntax.tokenize(&code).unwrap();
    assert_eq!(tokens.len(), 3);
    for (token, expected) in tokens.iter().zip(["1", "2", "3"]) {
        assert_eq!(token.tag, Tag::Number);
        assert_eq!(&**token.content, &Value::Str(Rc::from(expected)));
    }
}

/// A nullable lexer pattern is rejected eagerly, before any tokenization
/// is attempted — it would otherwise loop forever at the same position.
#[test]
fn nullable_pattern_is_rejected_at_construction() {
    let err = TokenSyntax::<Tag>::new().rule(Tag::Space, r"\s*");
    assert!(matches!(err, Err(ImplementationError { .. })));
}

/// Grounded in the "use Backtrack to recognize indentation" strategy: an
/// indent only fires right after a newline or at the very start of input.
/// `Backtrack` rewinds one position, so `Backtrack() >> Newline` looks at
/// the previous character and then re-consumes exactly one character,
/// landing back where it started — a zero-width look-behind.
#[test]
fn backtrack_recognizes_indentation_at_line_starts() {
    let startline = or(right(backtrack::<Tag>(), any_char("\n\r")), start());
    let indent = right(startline, pattern::<Tag>(r"[ \t]+").unwrap());
    let word = pattern::<Tag>(r"\w+").unwrap();
    let newline = text::<Tag>("\n");
    let line = seq((indent, word, newline));
    let two_lines = seq((line.clone(), line));

    let ans = parse(two_lines, Source::Text(b"  foo\n    bar\n")).unwrap();
    match ans {
        Value::Tuple(lines) => assert_eq!(lines.len(), 2),
        other => panic!("expected a tuple of two lines, got {:?}", other),
    }
}
