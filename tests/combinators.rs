use std::rc::Rc;

use termrat::combinator::{alt, and, bind, expect, left, opt, or, require, right, some, transform};
use termrat::lexeme::{any_char, end, pattern, text};
use termrat::{parse, parse_prefix, Source, StructBuilder, TermRef, Value};

fn int_term() -> TermRef<()> {
    transform(pattern(r"\d+").unwrap(), |v| {
        Value::Int(v.as_str().unwrap().parse().unwrap())
    })
}

#[test]
fn left_sequence_yields_first_value() {
    let term = left(text("foo"), text("bar"));
    let ans = parse(term, Source::Text(b"foobar")).unwrap();
    assert_eq!(ans.as_str(), Some("foo"));
}

#[test]
fn right_sequence_yields_second_value() {
    let term = right(text("foo"), text("bar"));
    let ans = parse(term, Source::Text(b"foobar")).unwrap();
    assert_eq!(ans.as_str(), Some("bar"));
}

#[test]
fn or_falls_back_to_second_branch() {
    let term = or(text("cat"), text("dog"));
    assert_eq!(parse(term.clone(), Source::Text(b"dog")).unwrap().as_str(), Some("dog"));
    assert!(parse(term, Source::Text(b"fish")).is_err());
}

#[test]
fn and_requires_both_but_yields_the_first() {
    let digits = pattern(r"\d+").unwrap();
    let at_least_three = require(digits.clone(), |v| v.as_str().unwrap().len() >= 3);
    let term = and(digits, at_least_three);
    let ans = parse_prefix(term, Source::Text(b"1234abc")).unwrap();
    assert_eq!(ans.0.as_str(), Some("1234"));
    assert_eq!(ans.1, 4);
}

#[test]
fn opt_falls_back_without_consuming() {
    let term = left(opt(text("maybe")), end::<()>());
    let ans = parse(term, Source::Text(b"")).unwrap();
    assert_eq!(ans, Value::Unit);
}

#[test]
fn expect_is_zero_width_lookahead() {
    let term = left(expect(text("a")), text("a"));
    let ans = parse(term, Source::Text(b"a")).unwrap();
    assert_eq!(ans, Value::Unit);
}

#[test]
fn some_requires_at_least_one_match() {
    let term = some(any_char("abc"));
    assert!(parse_prefix(term.clone(), Source::Text(b"")).is_err());
    let ans = parse_prefix(term, Source::Text(b"aabcx")).unwrap();
    match ans.0 {
        Value::List(items) => assert_eq!(items.len(), 4),
        other => panic!("expected a list, got {:?}", other),
    }
}

#[test]
fn alt_collects_items_separated_by_a_separator() {
    let term = alt(int_term(), text(","));
    let ans = parse(term, Source::Text(b"1,2,3")).unwrap();
    match ans {
        Value::List(items) => {
            assert_eq!(items, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        }
        other => panic!("expected a list, got {:?}", other),
    }
}

#[test]
fn alt_on_no_items_yields_an_empty_list() {
    let term = alt(int_term(), text(","));
    let ans = parse_prefix(term, Source::Text(b"abc")).unwrap();
    assert_eq!(ans.0, Value::List(Vec::new()));
    assert_eq!(ans.1, 0);
}

#[test]
fn bind_parses_a_term_chosen_by_the_first_result() {
    let length_prefixed = bind(int_term(), |v| {
        let n = match v {
            Value::Int(n) => n as usize,
            _ => unreachable!(),
        };
        let chars: Rc<str> = Rc::from("x".repeat(n));
        text(chars)
    });
    let ans = parse(length_prefixed, Source::Text(b"3xxx")).unwrap();
    assert_eq!(ans.as_str(), Some("xxx"));
}

#[test]
fn simple_struct_assembles_fields_in_order() {
    let pair = StructBuilder::new("Pair")
        .field("left", int_term())
        .field("sep", text(","))
        .field("right", int_term())
        .build()
        .unwrap();
    let ans = parse(pair, Source::Text(b"10,20")).unwrap();
    match ans {
        Value::Struct(s) => {
            assert_eq!(s.get("left"), Some(&Value::Int(10)));
            assert_eq!(s.get("sep"), Some(&Value::Str(Rc::from(","))));
            assert_eq!(s.get("right"), Some(&Value::Int(20)));
        }
        other => panic!("expected a struct, got {:?}", other),
    }
}
