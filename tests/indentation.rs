use std::rc::Rc;

use termrat::combinator::{bind, expect, left, list, opt, or, require, right, transform};
use termrat::lexeme::{pattern, text};
use termrat::{parse, Source, StructBuilder, TermRef, Value};

fn word() -> TermRef<()> {
    pattern(r"\w+").unwrap()
}

fn int_term() -> TermRef<()> {
    transform(pattern(r"\d+").unwrap(), |v| {
        Value::Int(v.as_str().unwrap().parse().unwrap())
    })
}

fn indent_pattern() -> TermRef<()> {
    pattern(r" *").unwrap()
}

fn command() -> TermRef<()> {
    StructBuilder::new("Command")
        .field("message", right(text("print "), left(word(), text("\n"))))
        .build()
        .unwrap()
}

/// `Loop`'s body is itself a nested, more-indented block — a struct field
/// whose term depends on the indentation level of the *current* line, so
/// it's built fresh for each `indent` rather than a single static term.
fn loop_stmt(indent: Rc<str>) -> TermRef<()> {
    StructBuilder::new("Loop")
        .field("count", right(text("loop "), left(int_term(), text(" times\n"))))
        .field("body", opt(block(indent)))
        .build()
        .unwrap()
}

fn statement(indent: Rc<str>) -> TermRef<()> {
    right(text(indent.clone()), or(command(), loop_stmt(indent)))
}

/// `Block(current)` requires the next line's indentation to be strictly
/// deeper than `current`, then commits to that exact indentation for every
/// statement in the block — mirroring the "careful body" strategy where a
/// shallower or unindented line simply ends the block rather than being
/// swallowed by it.
fn block(current: Rc<str>) -> TermRef<()> {
    let deeper = require(expect(indent_pattern()), move |v| {
        v.as_str().unwrap().len() > current.len()
    });
    bind(deeper, |v| {
        let indent: Rc<str> = Rc::from(v.as_str().unwrap());
        list(statement(indent))
    })
}

fn program() -> TermRef<()> {
    right(text("\n"), left(block(Rc::from("")), indent_pattern()))
}

fn cmd(message: &str) -> Value<()> {
    Value::Struct(Rc::new(termrat::StructValue {
        name: "Command",
        fields: vec![("message", Value::Str(Rc::from(message)))],
    }))
}

fn loopv(count: i64, body: Option<Vec<Value<()>>>) -> Value<()> {
    let body_value = match body {
        Some(items) => Value::List(items),
        None => Value::Unit,
    };
    Value::Struct(Rc::new(termrat::StructValue {
        name: "Loop",
        fields: vec![("count", Value::Int(count)), ("body", body_value)],
    }))
}

// Every statement shares one base indent (2 spaces) so `Block("")`'s
// "strictly deeper than current" check has something to bite on at the
// top level too, exactly as the original relies on its enclosing test
// method's own source indentation to give the top level a non-empty,
// uniform margin.
#[test]
fn careful_body_stops_a_loop_at_the_first_unindented_line() {
    let source = "\n\
  print alfa\n\
  loop 10 times\n\
  print bravo\n\
  print charlie\n";
    let ans = parse(program(), Source::Text(source.as_bytes())).unwrap();
    let expected = Value::List(vec![cmd("alfa"), loopv(10, None), cmd("bravo"), cmd("charlie")]);
    assert_eq!(ans, expected);
}

#[test]
fn careful_body_accepts_a_properly_nested_loop() {
    let source = "\n\
  print alfa\n\
  loop 5 times\n\
    print bravo\n\
    print charlie\n\
  print delta\n";
    let ans = parse(program(), Source::Text(source.as_bytes())).unwrap();
    let expected = Value::List(vec![
        cmd("alfa"),
        loopv(5, Some(vec![cmd("bravo"), cmd("charlie")])),
        cmd("delta"),
    ]);
    assert_eq!(ans, expected);
}

/// The flip side of the "careful body" strategy: it doesn't recover from a
/// body that isn't indented at all, it simply fails to consume it. `"print
/// bar"` sits at the loop's own indent rather than strictly deeper, so the
/// loop's body comes back empty and the outer statement list stops right
/// there — leaving it and the following line unconsumed, which the
/// implicit `Left(term, End)` wrapper turns into a parse failure.
#[test]
fn careful_body_rejects_a_loop_whose_body_is_not_indented() {
    let source = "\n\
  print foo\n\
  loop 20 times\n\
print bar\n\
  print baz\n";
    assert!(parse(program(), Source::Text(source.as_bytes())).is_err());
}
