use std::rc::Rc;

use termrat::combinator::{list, or, seq};
use termrat::lexeme::literal;
use termrat::{parse, Source, Token, Value};

/// Wraps plain values as a token stream with a trivial `()` tag — the
/// generalization of "parse directly against a sequence of values" (not
/// lexed text) onto this engine's token-source abstraction.
fn values_as_tokens(values: Vec<Value<()>>) -> Vec<Token<()>> {
    values
        .into_iter()
        .map(|v| Token {
            tag: (),
            content: Rc::new(v),
            start: 0,
            end: 0,
        })
        .collect()
}

/// A source that is itself a list of numbers, parsed pairwise by `Literal`
/// alternatives — no lexer involved at all.
#[test]
fn a_list_of_numbers_parses_as_literal_pairs() {
    let odd = or(literal(Value::Int(1)), literal(Value::Int(3)));
    let even = or(literal(Value::Int(2)), literal(Value::Int(4)));
    let pair = seq((odd, even));
    let pairs = list(pair);

    let source = values_as_tokens(vec![1i64, 2, 3, 4, 3, 2].into_iter().map(Value::Int).collect());
    let ans = parse(pairs, Source::Tokens(&source)).unwrap();

    match ans {
        Value::List(items) => {
            assert_eq!(items.len(), 3);
            for (item, (a, b)) in items.iter().zip([(1i64, 2i64), (3, 4), (3, 2)]) {
                match item {
                    Value::Tuple(pair) => {
                        assert_eq!(pair[0].as_token().unwrap().content.as_ref(), &Value::Int(a));
                        assert_eq!(pair[1].as_token().unwrap().content.as_ref(), &Value::Int(b));
                    }
                    other => panic!("expected a tuple, got {:?}", other),
                }
            }
        }
        other => panic!("expected a list, got {:?}", other),
    }
}

/// A mixed-type source: each slot matches a different `Literal`, and a
/// source item whose value differs anywhere in the sequence fails the
/// whole parse rather than partially succeeding.
#[test]
fn a_mixed_type_source_matches_each_slot_independently() {
    let body = seq((
        literal(Value::List(vec![Value::Int(0), Value::Int(0), Value::Int(0)])),
        literal(Value::List(Vec::new())),
        literal(Value::Int(15)),
        literal(Value::Str(Rc::from("ok bye"))),
        literal(Value::Unit),
    ));

    let good = values_as_tokens(vec![
        Value::List(vec![Value::Int(0), Value::Int(0), Value::Int(0)]),
        Value::List(Vec::new()),
        Value::Int(15),
        Value::Str(Rc::from("ok bye")),
        Value::Unit,
    ]);
    assert!(parse(body.clone(), Source::Tokens(&good)).is_ok());

    let bad = values_as_tokens(vec![
        Value::List(vec![Value::Int(0), Value::Int(0), Value::Int(1)]),
        Value::List(Vec::new()),
        Value::Int(15),
        Value::Str(Rc::from("ok bye")),
        Value::Unit,
    ]);
    assert!(parse(body, Source::Tokens(&bad)).is_err());
}
