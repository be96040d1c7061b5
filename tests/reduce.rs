use std::rc::Rc;

use termrat::combinator::{forward_ref, left, or, reduce_left, right, seq, transform};
use termrat::lexeme::{end, pattern, text};
use termrat::{parse, AssocKind, Source, StructBuilder, TermRef, Value};

fn int_term() -> TermRef<()> {
    transform(pattern(r"\d+").unwrap(), |v| {
        Value::Int(v.as_str().unwrap().parse().unwrap())
    })
}

/// `ReduceLeft(Int, '+', Int)` on `"1+2+3+4"` folds left, so the deepest
/// leaf is the first atom: `(((1,'+',2),'+',3),'+',4)`.
#[test]
fn left_assoc_sum_nests_toward_the_first_atom() {
    let add = reduce_left(int_term(), vec![text("+")], int_term(), None);
    let ans = parse(add, Source::Text(b"1+2+3+4")).unwrap();

    let inner = Value::Tuple(vec![Value::Int(1), Value::Str(Rc::from("+")), Value::Int(2)]);
    let inner2 = Value::Tuple(vec![inner, Value::Str(Rc::from("+")), Value::Int(3)]);
    let expected = Value::Tuple(vec![inner2, Value::Str(Rc::from("+")), Value::Int(4)]);
    assert_eq!(ans, expected);
}

/// `ReduceRight(Int, '->', Int)` on `"1->2->3->4"` folds right, nesting
/// toward the last atom.
#[test]
fn right_assoc_arrow_nests_toward_the_last_atom() {
    use termrat::combinator::reduce_right;
    let arrow = reduce_right(int_term(), vec![text("->")], int_term(), None);
    let ans = parse(arrow, Source::Text(b"1->2->3->4")).unwrap();

    let inner = Value::Tuple(vec![Value::Int(3), Value::Str(Rc::from("->")), Value::Int(4)]);
    let inner2 = Value::Tuple(vec![Value::Int(2), Value::Str(Rc::from("->")), inner]);
    let expected = Value::Tuple(vec![Value::Int(1), Value::Str(Rc::from("->")), inner2]);
    assert_eq!(ans, expected);
}

/// A hand-built arithmetic grammar (factor/term/expr) grounded in the
/// classic ReduceLeft-without-the-precedence-compiler shape: `Term` binds
/// tighter than `Expr`, and parens recurse through a forward reference.
fn factor() -> TermRef<()> {
    let parens = right(text("("), left(forward_ref(expr), text(")")));
    let negate = transform(seq((text("-"), forward_ref(factor))), |v| match v {
        Value::Tuple(mut items) => {
            let right = items.pop().unwrap();
            Value::Tuple(vec![Value::Str(Rc::from("-")), right])
        }
        other => other,
    });
    or(or(int_term(), parens), negate)
}

fn term() -> TermRef<()> {
    or(
        reduce_left(factor(), vec![or(text("*"), text("/"))], factor(), None),
        factor(),
    )
}

fn expr() -> TermRef<()> {
    or(
        reduce_left(term(), vec![or(text("+"), text("-"))], term(), None),
        term(),
    )
}

#[test]
fn arithmetic_grammar_respects_term_over_factor_precedence() {
    let ans = parse(left(expr(), end()), Source::Text(b"1+2*3")).unwrap();
    let product = Value::Tuple(vec![Value::Int(2), Value::Str(Rc::from("*")), Value::Int(3)]);
    let expected = Value::Tuple(vec![Value::Int(1), Value::Str(Rc::from("+")), product]);
    assert_eq!(ans, expected);
}

#[test]
fn arithmetic_grammar_handles_parens_and_negation() {
    let ans = parse(left(expr(), end()), Source::Text(b"(1+2)*-3")).unwrap();
    let sum = Value::Tuple(vec![Value::Int(1), Value::Str(Rc::from("+")), Value::Int(2)]);
    let negated = Value::Tuple(vec![Value::Str(Rc::from("-")), Value::Int(3)]);
    let expected = Value::Tuple(vec![sum, Value::Str(Rc::from("*")), negated]);
    assert_eq!(ans, expected);
}

/// `StructBuilder::left_assoc`/`right_assoc` compile to a cached
/// `ReduceLeft`/`ReduceRight` delegate whose `build` reassembles a struct
/// instead of a bare tuple.
#[test]
fn left_assoc_struct_delegate_folds_left() {
    let chain = StructBuilder::new("Chain")
        .field("left", int_term())
        .field("operator", text("+"))
        .field("right", int_term())
        .left_assoc()
        .build()
        .unwrap();
    let ans = parse(chain, Source::Text(b"1+2+3")).unwrap();
    match ans {
        Value::Struct(outer) => {
            assert_eq!(outer.get("operator"), Some(&Value::Str(Rc::from("+"))));
            assert_eq!(outer.get("right"), Some(&Value::Int(3)));
            match outer.get("left") {
                Some(Value::Struct(inner)) => {
                    assert_eq!(inner.get("left"), Some(&Value::Int(1)));
                    assert_eq!(inner.get("right"), Some(&Value::Int(2)));
                }
                other => panic!("expected a nested Chain struct, got {:?}", other),
            }
        }
        other => panic!("expected a struct, got {:?}", other),
    }
}

/// The shallow field-override `replace` operation: fields named in the
/// override list change, everything else is copied untouched.
#[test]
fn struct_replace_overrides_only_named_fields() {
    let foobar = StructBuilder::new("Foobar")
        .field("foo", text("foo"))
        .field("sep", text(":"))
        .field("bar", text("bar"))
        .build()
        .unwrap();
    let raw = parse(foobar, Source::Text(b"foo:bar")).unwrap();
    let raw = match raw {
        Value::Struct(s) => s,
        other => panic!("expected a struct, got {:?}", other),
    };
    assert_eq!(raw.get("foo"), Some(&Value::Str(Rc::from("foo"))));

    let cooked = raw.replace(&[
        ("foo", Value::Str(Rc::from("FOO"))),
        ("bar", Value::Str(Rc::from("BAR"))),
    ]);
    assert_eq!(cooked.name, "Foobar");
    assert_eq!(cooked.get("foo"), Some(&Value::Str(Rc::from("FOO"))));
    assert_eq!(cooked.get("sep"), Some(&Value::Str(Rc::from(":"))));
    assert_eq!(cooked.get("bar"), Some(&Value::Str(Rc::from("BAR"))));
}

#[test]
fn assoc_kind_reports_its_own_direction() {
    assert_eq!(AssocKind::Left, AssocKind::Left);
    assert_ne!(AssocKind::Left, AssocKind::Right);
}
