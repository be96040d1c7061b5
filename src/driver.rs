use std::collections::HashMap;
use std::rc::Rc;

use crate::error::ParseError;
use crate::precedence::PrecedenceSpec;
use crate::reduce::ReduceSpec;
use crate::source::Source;
use crate::struct_def::{AssocKind, StructDescriptor};
use crate::term::{char_in_set, unwrap_forward, Term, TermRef};
use crate::util::{Code, Log};
use crate::value::{StructValue, Value};
use crate::TagImpl;

/// The result of parsing a term from a position: either a value and the
/// position just past what was consumed, or a failure (§4.1's
/// `ParseResult`/`ParseFailure`).
#[derive(Clone)]
pub enum Outcome<Tag: TagImpl> {
    Success(Value<Tag>, usize),
    Fail,
}

/// What a suspension yields on one step of the trampoline: either a
/// sub-request for `(term, pos)` that must be resolved before it can make
/// progress, or its own final outcome.
enum Step<Tag: TagImpl> {
    Request(TermRef<Tag>, usize),
    Final(Outcome<Tag>),
}

type MemoKey = (usize, usize);

fn term_key<Tag: TagImpl>(term: &TermRef<Tag>) -> usize {
    Rc::as_ptr(term) as *const () as usize
}

/// Executes a grammar term against a [`Source`] using the memoizing,
/// explicit-stack trampoline described in §4.1. Each `Parser` owns its own
/// memo table and work stack; a `Term` graph (all `Rc`) may be shared
/// freely across independently-constructed parsers (§5).
pub struct Parser<'s, Tag: TagImpl> {
    source: Source<'s, Tag>,
    code: Option<Code<'s>>,
    memo: HashMap<MemoKey, Outcome<Tag>>,
    stack: Vec<Frame<Tag>>,
    /// High-water mark of every memo entry written, success or failure —
    /// the teacher's `max_parsed_point` — used as a diagnostic when a
    /// parse fails outright.
    high_water: usize,
    log: Log<()>,
}

struct Frame<Tag: TagImpl> {
    key: MemoKey,
    suspension: Suspension<Tag>,
}

impl<'s, Tag: TagImpl> Parser<'s, Tag> {
    pub fn new(source: Source<'s, Tag>) -> Self {
        let code = match &source {
            Source::Text(bytes) => Some(Code::new(bytes)),
            Source::Tokens(_) => None,
        };
        Self {
            source,
            code,
            memo: HashMap::new(),
            stack: Vec::new(),
            high_water: 0,
            log: Log::None,
        }
    }

    pub fn with_log(mut self, log: Log<()>) -> Self {
        self.log = log;
        self
    }

    pub fn source_len(&self) -> usize {
        self.source.len()
    }

    /// Runs `term` from `pos` to completion, driving the work stack until
    /// empty. This is the only place recursion would otherwise occur in a
    /// naive implementation; here it is an explicit loop so grammars
    /// nested arbitrarily deep never exhaust the host stack.
    pub fn run(&mut self, term: TermRef<Tag>, pos: usize) -> Outcome<Tag> {
        let mut ans = self.start(term, pos);
        while !self.stack.is_empty() {
            let step = {
                let frame = self.stack.last_mut().unwrap();
                self.log.announce(Log::Step(()), || {
                    format!("[step] key={:?} pos={}", frame.key, frame.key.1)
                });
                frame.suspension.advance(ans.take())
            };
            match step {
                Step::Request(next_term, next_pos) => {
                    ans = self.start(next_term, next_pos);
                }
                Step::Final(outcome) => {
                    let frame = self.stack.pop().unwrap();
                    self.high_water = self.high_water.max(frame.key.1);
                    self.memo.insert(frame.key, outcome.clone());
                    ans = Some(outcome);
                }
            }
        }
        ans.expect("trampoline ended with no result")
    }

    /// Resolves a `(term, pos)` request: a memo hit returns immediately; a
    /// miss seeds the memo with a tentative failure (the guard that tames
    /// self-referential left recursion — see §4.1 and §9) and pushes a new
    /// frame, returning `None` to signal the caller must keep driving.
    fn start(&mut self, term: TermRef<Tag>, pos: usize) -> Option<Outcome<Tag>> {
        let term = unwrap_forward(term);
        let key = (term_key(&term), pos);
        if let Some(cached) = self.memo.get(&key) {
            return Some(cached.clone());
        }
        self.memo.insert(key, Outcome::Fail);
        let suspension = self.make_suspension(&term, pos);
        self.stack.push(Frame { key, suspension });
        None
    }

    fn make_suspension(&self, term: &Term<Tag>, pos: usize) -> Suspension<Tag> {
        match term {
            Term::Nothing => Suspension::Immediate(Some(Outcome::Success(Value::Unit, pos))),
            Term::Return(v) => Suspension::Immediate(Some(Outcome::Success(v.clone(), pos))),
            Term::Literal(v) => Suspension::Immediate(Some(self.match_literal(v, pos))),
            Term::LiteralText(s) => Suspension::Immediate(Some(self.match_literal_text(s, pos))),
            Term::Pattern(re) => Suspension::Immediate(Some(self.match_pattern(re, pos))),
            Term::AnyChar(set) => Suspension::Immediate(Some(self.match_any_char(set, pos))),
            Term::Any => Suspension::Immediate(Some(self.match_any(pos))),
            Term::Where(pred) => Suspension::Immediate(Some(self.match_where(pred, pos))),
            Term::Start => {
                let outcome = if pos == 0 {
                    Outcome::Success(Value::Unit, pos)
                } else {
                    Outcome::Fail
                };
                Suspension::Immediate(Some(outcome))
            }
            Term::End => {
                let outcome = if pos == self.source.len() {
                    Outcome::Success(Value::Unit, pos)
                } else {
                    Outcome::Fail
                };
                Suspension::Immediate(Some(outcome))
            }
            Term::Backtrack => {
                let outcome = if pos > 0 {
                    Outcome::Success(Value::Unit, pos - 1)
                } else {
                    Outcome::Fail
                };
                Suspension::Immediate(Some(outcome))
            }
            Term::Tag(t) => Suspension::Immediate(Some(self.match_tag(*t, pos))),
            Term::Expect(t) => Suspension::Expect(ExpectState {
                inner: t.clone(),
                pos,
                requested: false,
            }),
            Term::Opt(t) => Suspension::Opt(OptState {
                inner: t.clone(),
                pos,
                requested: false,
            }),
            Term::Left(a, b) => Suspension::Seq(SeqState::new(vec![a.clone(), b.clone()], None, pos, SeqKind::First)),
            Term::Right(a, b) => Suspension::Seq(SeqState::new(vec![a.clone(), b.clone()], None, pos, SeqKind::Last)),
            Term::Tuple(items) => Suspension::Seq(SeqState::new((**items).clone(), None, pos, SeqKind::Tuple)),
            Term::Or(a, b) => Suspension::Or(OrState {
                a: a.clone(),
                b: b.clone(),
                pos,
                stage: OrStage::TryingA,
            }),
            Term::And(a, b) => Suspension::And(AndState {
                a: a.clone(),
                b: b.clone(),
                pos,
                stage: AndStage::TryingA,
                a_result: None,
            }),
            Term::Transform(t, f) => Suspension::Transform(TransformState {
                inner: t.clone(),
                pos,
                f: f.clone(),
                requested: false,
            }),
            Term::Bind(t, f) => Suspension::Bind(BindState {
                inner: t.clone(),
                pos,
                f: f.clone(),
                stage: BindStage::ParsingInner,
            }),
            Term::Require(t, pred) => Suspension::Require(RequireState {
                inner: t.clone(),
                pos,
                pred: pred.clone(),
                requested: false,
            }),
            Term::List(t) => Suspension::Repeat(RepeatState::new(t.clone(), pos, false)),
            Term::Some(t) => Suspension::Repeat(RepeatState::new(t.clone(), pos, true)),
            Term::Alt(item, sep) => Suspension::Alt(AltState::new(item.clone(), sep.clone(), pos)),
            Term::Struct(desc) => self.make_struct_suspension(desc, pos),
            Term::ReduceLeft(spec) => Suspension::ReduceLeft(ReduceLeftState::new(spec.clone(), pos)),
            Term::ReduceRight(spec) => Suspension::ReduceRight(ReduceRightState::new(spec.clone(), pos)),
            Term::OperatorPrecedence(spec) => self.make_precedence_suspension(spec, pos),
            Term::ForwardRef(_) => unreachable!("ForwardRef is unwrapped before make_suspension"),
            Term::PrefixFold(op, inner) => Suspension::PrefixFold(PrefixFoldState::new(op.clone(), inner.clone(), pos)),
            Term::PostfixFold(inner, op) => Suspension::PostfixFold(PostfixFoldState::new(inner.clone(), op.clone(), pos)),
        }
    }

    fn make_struct_suspension(&self, desc: &Rc<StructDescriptor<Tag>>, pos: usize) -> Suspension<Tag> {
        if desc.assoc.is_some() {
            let delegate = desc.assoc_delegate();
            return self.make_suspension(&delegate, pos);
        }
        let items: Vec<TermRef<Tag>> = desc.fields.iter().map(|(_, t)| t.clone()).collect();
        let names: Vec<&'static str> = desc.fields.iter().map(|(n, _)| *n).collect();
        Suspension::Seq(SeqState::new(
            items,
            Some(names),
            pos,
            SeqKind::Struct(desc.name),
        ))
    }

    fn make_precedence_suspension(&self, spec: &Rc<PrecedenceSpec<Tag>>, pos: usize) -> Suspension<Tag> {
        let compiled = spec.compiled();
        self.make_suspension(&compiled, pos)
    }

    fn match_literal(&self, value: &Value<Tag>, pos: usize) -> Outcome<Tag> {
        match &self.source {
            Source::Tokens(tokens) => match tokens.get(pos) {
                Some(token) if *token.content == *value => {
                    Outcome::Success(Value::Token(token.clone()), pos + 1)
                }
                _ => Outcome::Fail,
            },
            Source::Text(_) => Outcome::Fail,
        }
    }

    fn match_literal_text(&self, literal: &Rc<str>, pos: usize) -> Outcome<Tag> {
        match &self.source {
            Source::Text(bytes) => {
                let needle = literal.as_bytes();
                if bytes[pos..].starts_with(needle) {
                    Outcome::Success(Value::Str(literal.clone()), pos + needle.len())
                } else {
                    Outcome::Fail
                }
            }
            Source::Tokens(tokens) => match tokens.get(pos) {
                Some(token) if matches!(&*token.content, Value::Str(s) if s == literal) => {
                    Outcome::Success(Value::Token(token.clone()), pos + 1)
                }
                _ => Outcome::Fail,
            },
        }
    }

    fn match_pattern(&self, regex: &regex::bytes::Regex, pos: usize) -> Outcome<Tag> {
        match &self.source {
            Source::Text(bytes) => match regex.find(&bytes[pos..]) {
                Some(m) if m.start() == 0 => {
                    let text = String::from_utf8_lossy(&bytes[pos..pos + m.end()]).into_owned();
                    Outcome::Success(Value::Str(Rc::from(text)), pos + m.end())
                }
                _ => Outcome::Fail,
            },
            Source::Tokens(_) => Outcome::Fail,
        }
    }

    fn match_any_char(&self, set: &str, pos: usize) -> Outcome<Tag> {
        match &self.source {
            Source::Text(bytes) => match bytes.get(pos) {
                Some(b) if char_in_set(set, *b) => {
                    Outcome::Success(Value::Str(Rc::from((*b as char).to_string())), pos + 1)
                }
                _ => Outcome::Fail,
            },
            Source::Tokens(_) => Outcome::Fail,
        }
    }

    fn match_any(&self, pos: usize) -> Outcome<Tag> {
        match &self.source {
            Source::Text(bytes) => match bytes.get(pos) {
                Some(b) => Outcome::Success(Value::Str(Rc::from((*b as char).to_string())), pos + 1),
                None => Outcome::Fail,
            },
            Source::Tokens(tokens) => match tokens.get(pos) {
                Some(token) => Outcome::Success(Value::Token(token.clone()), pos + 1),
                None => Outcome::Fail,
            },
        }
    }

    fn match_where(&self, pred: &Rc<dyn Fn(&Value<Tag>) -> bool>, pos: usize) -> Outcome<Tag> {
        match &self.source {
            Source::Text(bytes) => match bytes.get(pos) {
                Some(b) => {
                    let v = Value::Str(Rc::from((*b as char).to_string()));
                    if pred(&v) {
                        Outcome::Success(v, pos + 1)
                    } else {
                        Outcome::Fail
                    }
                }
                None => Outcome::Fail,
            },
            Source::Tokens(tokens) => match tokens.get(pos) {
                Some(token) => {
                    if pred(&token.content) {
                        Outcome::Success((*token.content).clone(), pos + 1)
                    } else {
                        Outcome::Fail
                    }
                }
                None => Outcome::Fail,
            },
        }
    }

    fn match_tag(&self, tag: Tag, pos: usize) -> Outcome<Tag> {
        match &self.source {
            Source::Tokens(tokens) => match tokens.get(pos) {
                Some(token) if token.tag == tag => {
                    Outcome::Success(Value::Token(token.clone()), pos + 1)
                }
                _ => Outcome::Fail,
            },
            Source::Text(_) => Outcome::Fail,
        }
    }

    /// Builds a `ParseError` for a failed top-level parse, reporting the
    /// high-water mark of every memo entry attempted as the diagnostic
    /// position, with a line/column when the source is text.
    fn failure_error(&self) -> ParseError {
        match &self.code {
            Some(code) => {
                let position = code.obtain_position(self.high_water);
                ParseError::with_position(
                    self.high_water,
                    position,
                    "failed to match".to_string(),
                )
            }
            None => ParseError::new(self.high_water, "failed to match".to_string()),
        }
    }
}

/// Parses `term` against the entirety of `source`, requiring it to consume
/// every element (`Left(term, End)`).
pub fn parse<'s, Tag: TagImpl>(
    term: TermRef<Tag>,
    source: Source<'s, Tag>,
) -> Result<Value<Tag>, ParseError> {
    let whole = crate::term::left(term, crate::term::end());
    let mut parser = Parser::new(source);
    match parser.run(whole, 0) {
        Outcome::Success(v, _) => Ok(v),
        Outcome::Fail => Err(parser.failure_error()),
    }
}

/// Parses as much of a prefix of `source` as `term` matches, without
/// requiring the rest of the input to be consumed.
pub fn parse_prefix<'s, Tag: TagImpl>(
    term: TermRef<Tag>,
    source: Source<'s, Tag>,
) -> Result<(Value<Tag>, usize), ParseError> {
    let mut parser = Parser::new(source);
    match parser.run(term, 0) {
        Outcome::Success(v, pos) => Ok((v, pos)),
        Outcome::Fail => Err(parser.failure_error()),
    }
}

// ---------------------------------------------------------------------
// Suspensions: one explicit state machine per compound term kind, each
// advanced by feeding back the previous sub-request's outcome. Leaf terms
// need no state at all and resolve on the very first `advance` call
// regardless of input (`Suspension::Immediate`).
// ---------------------------------------------------------------------

enum Suspension<Tag: TagImpl> {
    Immediate(Option<Outcome<Tag>>),
    Expect(ExpectState<Tag>),
    Opt(OptState<Tag>),
    Seq(SeqState<Tag>),
    Or(OrState<Tag>),
    And(AndState<Tag>),
    Transform(TransformState<Tag>),
    Bind(BindState<Tag>),
    Require(RequireState<Tag>),
    Repeat(RepeatState<Tag>),
    Alt(AltState<Tag>),
    ReduceLeft(ReduceLeftState<Tag>),
    ReduceRight(ReduceRightState<Tag>),
    PrefixFold(PrefixFoldState<Tag>),
    PostfixFold(PostfixFoldState<Tag>),
}

impl<Tag: TagImpl> Suspension<Tag> {
    fn advance(&mut self, input: Option<Outcome<Tag>>) -> Step<Tag> {
        match self {
            Suspension::Immediate(outcome) => {
                Step::Final(outcome.take().expect("Immediate suspension stepped twice"))
            }
            Suspension::Expect(s) => s.advance(input),
            Suspension::Opt(s) => s.advance(input),
            Suspension::Seq(s) => s.advance(input),
            Suspension::Or(s) => s.advance(input),
            Suspension::And(s) => s.advance(input),
            Suspension::Transform(s) => s.advance(input),
            Suspension::Bind(s) => s.advance(input),
            Suspension::Require(s) => s.advance(input),
            Suspension::Repeat(s) => s.advance(input),
            Suspension::Alt(s) => s.advance(input),
            Suspension::ReduceLeft(s) => s.advance(input),
            Suspension::ReduceRight(s) => s.advance(input),
            Suspension::PrefixFold(s) => s.advance(input),
            Suspension::PostfixFold(s) => s.advance(input),
        }
    }
}

struct ExpectState<Tag: TagImpl> {
    inner: TermRef<Tag>,
    pos: usize,
    requested: bool,
}

impl<Tag: TagImpl> ExpectState<Tag> {
    fn advance(&mut self, input: Option<Outcome<Tag>>) -> Step<Tag> {
        if !self.requested {
            self.requested = true;
            return Step::Request(self.inner.clone(), self.pos);
        }
        match input.expect("Expect stepped without a result") {
            Outcome::Success(v, _) => Step::Final(Outcome::Success(v, self.pos)),
            Outcome::Fail => Step::Final(Outcome::Fail),
        }
    }
}

struct OptState<Tag: TagImpl> {
    inner: TermRef<Tag>,
    pos: usize,
    requested: bool,
}

impl<Tag: TagImpl> OptState<Tag> {
    fn advance(&mut self, input: Option<Outcome<Tag>>) -> Step<Tag> {
        if !self.requested {
            self.requested = true;
            return Step::Request(self.inner.clone(), self.pos);
        }
        match input.expect("Opt stepped without a result") {
            Outcome::Success(v, p) => Step::Final(Outcome::Success(v, p)),
            Outcome::Fail => Step::Final(Outcome::Success(Value::Unit, self.pos)),
        }
    }
}

#[derive(Clone, Copy)]
enum SeqKind {
    First,
    Last,
    Tuple,
    Struct(&'static str),
}

struct SeqState<Tag: TagImpl> {
    items: Vec<TermRef<Tag>>,
    field_names: Option<Vec<&'static str>>,
    idx: usize,
    values: Vec<Value<Tag>>,
    cur_pos: usize,
    kind: SeqKind,
}

impl<Tag: TagImpl> SeqState<Tag> {
    fn new(items: Vec<TermRef<Tag>>, field_names: Option<Vec<&'static str>>, pos: usize, kind: SeqKind) -> Self {
        Self {
            items,
            field_names,
            idx: 0,
            values: Vec::new(),
            cur_pos: pos,
            kind,
        }
    }

    fn finalize(&mut self) -> Value<Tag> {
        match self.kind {
            SeqKind::First => self.values[0].clone(),
            SeqKind::Last => self.values.last().unwrap().clone(),
            SeqKind::Tuple => Value::Tuple(std::mem::take(&mut self.values)),
            SeqKind::Struct(name) => {
                let names = self.field_names.take().unwrap_or_default();
                let values = std::mem::take(&mut self.values);
                Value::Struct(Rc::new(StructValue {
                    name,
                    fields: names.into_iter().zip(values).collect(),
                }))
            }
        }
    }

    fn advance(&mut self, input: Option<Outcome<Tag>>) -> Step<Tag> {
        match input {
            None => {
                if self.items.is_empty() {
                    let v = self.finalize();
                    Step::Final(Outcome::Success(v, self.cur_pos))
                } else {
                    Step::Request(self.items[0].clone(), self.cur_pos)
                }
            }
            Some(Outcome::Fail) => Step::Final(Outcome::Fail),
            Some(Outcome::Success(v, p)) => {
                self.values.push(v);
                self.cur_pos = p;
                self.idx += 1;
                if self.idx == self.items.len() {
                    let v = self.finalize();
                    Step::Final(Outcome::Success(v, self.cur_pos))
                } else {
                    Step::Request(self.items[self.idx].clone(), self.cur_pos)
                }
            }
        }
    }
}

enum OrStage {
    TryingA,
    TryingB,
}

struct OrState<Tag: TagImpl> {
    a: TermRef<Tag>,
    b: TermRef<Tag>,
    pos: usize,
    stage: OrStage,
}

impl<Tag: TagImpl> OrState<Tag> {
    fn advance(&mut self, input: Option<Outcome<Tag>>) -> Step<Tag> {
        match (&self.stage, input) {
            (OrStage::TryingA, None) => Step::Request(self.a.clone(), self.pos),
            (OrStage::TryingA, Some(Outcome::Success(v, p))) => Step::Final(Outcome::Success(v, p)),
            (OrStage::TryingA, Some(Outcome::Fail)) => {
                self.stage = OrStage::TryingB;
                Step::Request(self.b.clone(), self.pos)
            }
            (OrStage::TryingB, Some(outcome)) => Step::Final(outcome),
            (OrStage::TryingB, None) => unreachable!("Or entered TryingB without a request"),
        }
    }
}

enum AndStage {
    TryingA,
    TryingB,
}

struct AndState<Tag: TagImpl> {
    a: TermRef<Tag>,
    b: TermRef<Tag>,
    pos: usize,
    stage: AndStage,
    a_result: Option<(Value<Tag>, usize)>,
}

impl<Tag: TagImpl> AndState<Tag> {
    fn advance(&mut self, input: Option<Outcome<Tag>>) -> Step<Tag> {
        match (&self.stage, input) {
            (AndStage::TryingA, None) => Step::Request(self.a.clone(), self.pos),
            (AndStage::TryingA, Some(Outcome::Fail)) => Step::Final(Outcome::Fail),
            (AndStage::TryingA, Some(Outcome::Success(v, p))) => {
                self.a_result = Some((v, p));
                self.stage = AndStage::TryingB;
                Step::Request(self.b.clone(), self.pos)
            }
            (AndStage::TryingB, Some(Outcome::Fail)) => Step::Final(Outcome::Fail),
            (AndStage::TryingB, Some(Outcome::Success(_, _))) => {
                let (v, p) = self.a_result.take().unwrap();
                Step::Final(Outcome::Success(v, p))
            }
            (AndStage::TryingB, None) => unreachable!("And entered TryingB without a request"),
        }
    }
}

struct TransformState<Tag: TagImpl> {
    inner: TermRef<Tag>,
    pos: usize,
    f: Rc<dyn Fn(Value<Tag>) -> Value<Tag>>,
    requested: bool,
}

impl<Tag: TagImpl> TransformState<Tag> {
    fn advance(&mut self, input: Option<Outcome<Tag>>) -> Step<Tag> {
        if !self.requested {
            self.requested = true;
            return Step::Request(self.inner.clone(), self.pos);
        }
        match input.expect("Transform stepped without a result") {
            Outcome::Success(v, p) => Step::Final(Outcome::Success((self.f)(v), p)),
            Outcome::Fail => Step::Final(Outcome::Fail),
        }
    }
}

struct BindState<Tag: TagImpl> {
    inner: TermRef<Tag>,
    pos: usize,
    f: Rc<dyn Fn(Value<Tag>) -> TermRef<Tag>>,
    stage: BindStage,
}

enum BindStage {
    ParsingInner,
    ParsingBound,
}

impl<Tag: TagImpl> BindState<Tag> {
    fn advance(&mut self, input: Option<Outcome<Tag>>) -> Step<Tag> {
        match (&self.stage, input) {
            (BindStage::ParsingInner, None) => Step::Request(self.inner.clone(), self.pos),
            (BindStage::ParsingInner, Some(Outcome::Fail)) => Step::Final(Outcome::Fail),
            (BindStage::ParsingInner, Some(Outcome::Success(v, p))) => {
                let next = (self.f)(v);
                self.stage = BindStage::ParsingBound;
                Step::Request(next, p)
            }
            (BindStage::ParsingBound, Some(outcome)) => Step::Final(outcome),
            (BindStage::ParsingBound, None) => unreachable!("Bind entered ParsingBound without a request"),
        }
    }
}

struct RequireState<Tag: TagImpl> {
    inner: TermRef<Tag>,
    pos: usize,
    pred: Rc<dyn Fn(&Value<Tag>) -> bool>,
    requested: bool,
}

impl<Tag: TagImpl> RequireState<Tag> {
    fn advance(&mut self, input: Option<Outcome<Tag>>) -> Step<Tag> {
        if !self.requested {
            self.requested = true;
            return Step::Request(self.inner.clone(), self.pos);
        }
        match input.expect("Require stepped without a result") {
            Outcome::Success(v, p) => {
                if (self.pred)(&v) {
                    Step::Final(Outcome::Success(v, p))
                } else {
                    Step::Final(Outcome::Fail)
                }
            }
            Outcome::Fail => Step::Final(Outcome::Fail),
        }
    }
}

/// Shared by `List`/`Some`: repeats `inner`, stopping the first time an
/// iteration succeeds without advancing the position — that iteration's
/// value is *not* included (so `List("")` yields `[]`, never an infinite
/// loop of empty matches).
struct RepeatState<Tag: TagImpl> {
    inner: TermRef<Tag>,
    cur_pos: usize,
    acc: Vec<Value<Tag>>,
    require_one: bool,
}

impl<Tag: TagImpl> RepeatState<Tag> {
    fn new(inner: TermRef<Tag>, pos: usize, require_one: bool) -> Self {
        Self {
            inner,
            cur_pos: pos,
            acc: Vec::new(),
            require_one,
        }
    }

    fn finish(&mut self) -> Step<Tag> {
        if self.require_one && self.acc.is_empty() {
            Step::Final(Outcome::Fail)
        } else {
            Step::Final(Outcome::Success(Value::List(std::mem::take(&mut self.acc)), self.cur_pos))
        }
    }

    fn advance(&mut self, input: Option<Outcome<Tag>>) -> Step<Tag> {
        match input {
            None => Step::Request(self.inner.clone(), self.cur_pos),
            Some(Outcome::Fail) => self.finish(),
            Some(Outcome::Success(v, p)) => {
                if p == self.cur_pos {
                    self.finish()
                } else {
                    self.acc.push(v);
                    self.cur_pos = p;
                    Step::Request(self.inner.clone(), self.cur_pos)
                }
            }
        }
    }
}

enum AltStage {
    FirstItem,
    Sep,
    Item,
}

/// `Alt(item, sep)`: zero or more `item` separated by `sep`, yielding the
/// `item` values only. The very first `item` attempt may fail without
/// consequence (an empty `Alt` is not itself a failure); subsequent
/// `(sep, item)` pairs back out as a unit if either half fails, and stop
/// (without being included) if the pair together makes no progress.
struct AltState<Tag: TagImpl> {
    item: TermRef<Tag>,
    sep: TermRef<Tag>,
    acc: Vec<Value<Tag>>,
    cur_pos: usize,
    stage: AltStage,
    sep_pos: usize,
}

impl<Tag: TagImpl> AltState<Tag> {
    fn new(item: TermRef<Tag>, sep: TermRef<Tag>, pos: usize) -> Self {
        Self {
            item,
            sep,
            acc: Vec::new(),
            cur_pos: pos,
            stage: AltStage::FirstItem,
            sep_pos: pos,
        }
    }

    fn advance(&mut self, input: Option<Outcome<Tag>>) -> Step<Tag> {
        match (&self.stage, input) {
            (AltStage::FirstItem, None) => Step::Request(self.item.clone(), self.cur_pos),
            (AltStage::FirstItem, Some(Outcome::Fail)) => {
                Step::Final(Outcome::Success(Value::List(Vec::new()), self.cur_pos))
            }
            (AltStage::FirstItem, Some(Outcome::Success(v, p))) => {
                self.acc.push(v);
                self.cur_pos = p;
                self.stage = AltStage::Sep;
                Step::Request(self.sep.clone(), self.cur_pos)
            }
            (AltStage::Sep, Some(Outcome::Fail)) => {
                Step::Final(Outcome::Success(Value::List(std::mem::take(&mut self.acc)), self.cur_pos))
            }
            (AltStage::Sep, Some(Outcome::Success(_, p))) => {
                self.sep_pos = p;
                self.stage = AltStage::Item;
                Step::Request(self.item.clone(), self.sep_pos)
            }
            (AltStage::Item, Some(Outcome::Fail)) => {
                Step::Final(Outcome::Success(Value::List(std::mem::take(&mut self.acc)), self.cur_pos))
            }
            (AltStage::Item, Some(Outcome::Success(v, p))) => {
                if p == self.cur_pos {
                    Step::Final(Outcome::Success(Value::List(std::mem::take(&mut self.acc)), self.cur_pos))
                } else {
                    self.acc.push(v);
                    self.cur_pos = p;
                    self.stage = AltStage::Sep;
                    Step::Request(self.sep.clone(), self.cur_pos)
                }
            }
            (_, None) => unreachable!("Alt requested a step with no pending sub-request"),
        }
    }
}

enum ReduceLeftStage {
    First,
    Middle(usize),
    Last,
}

/// `ReduceLeft(first, middle, last, build)`: parses `first` to seed the
/// accumulator, then repeatedly tries `middle...` then `last`, folding
/// left each time the whole iteration succeeds *and* advances the
/// position — the same no-progress guard as `List`, applied to the
/// iteration as a whole so it can't loop on epsilon operators.
struct ReduceLeftState<Tag: TagImpl> {
    spec: Rc<ReduceSpec<Tag>>,
    stage: ReduceLeftStage,
    acc: Option<Value<Tag>>,
    cur_pos: usize,
    op_values: Vec<Value<Tag>>,
}

impl<Tag: TagImpl> ReduceLeftState<Tag> {
    fn new(spec: Rc<ReduceSpec<Tag>>, pos: usize) -> Self {
        Self {
            spec,
            stage: ReduceLeftStage::First,
            acc: None,
            cur_pos: pos,
            op_values: Vec::new(),
        }
    }

    fn start_iteration(&mut self) -> Step<Tag> {
        self.op_values.clear();
        if self.spec.middle.is_empty() {
            self.stage = ReduceLeftStage::Last;
            Step::Request(self.spec.last.clone(), self.cur_pos)
        } else {
            self.stage = ReduceLeftStage::Middle(0);
            Step::Request(self.spec.middle[0].clone(), self.cur_pos)
        }
    }

    fn advance(&mut self, input: Option<Outcome<Tag>>) -> Step<Tag> {
        match (&self.stage, input) {
            (ReduceLeftStage::First, None) => Step::Request(self.spec.first.clone(), self.cur_pos),
            (ReduceLeftStage::First, Some(Outcome::Fail)) => Step::Final(Outcome::Fail),
            (ReduceLeftStage::First, Some(Outcome::Success(v, p))) => {
                self.acc = Some(v);
                self.cur_pos = p;
                self.start_iteration()
            }
            (ReduceLeftStage::Middle(i), Some(Outcome::Fail)) => {
                let _ = i;
                Step::Final(Outcome::Success(self.acc.take().unwrap(), self.cur_pos))
            }
            (ReduceLeftStage::Middle(i), Some(Outcome::Success(v, p))) => {
                let i = *i;
                self.op_values.push(v);
                if i + 1 < self.spec.middle.len() {
                    self.stage = ReduceLeftStage::Middle(i + 1);
                    Step::Request(self.spec.middle[i + 1].clone(), p)
                } else {
                    self.stage = ReduceLeftStage::Last;
                    Step::Request(self.spec.last.clone(), p)
                }
            }
            (ReduceLeftStage::Last, Some(Outcome::Fail)) => {
                Step::Final(Outcome::Success(self.acc.take().unwrap(), self.cur_pos))
            }
            (ReduceLeftStage::Last, Some(Outcome::Success(v, p))) => {
                if p == self.cur_pos {
                    Step::Final(Outcome::Success(self.acc.take().unwrap(), self.cur_pos))
                } else {
                    let ops = std::mem::take(&mut self.op_values);
                    let left = self.acc.take().unwrap();
                    self.acc = Some(self.spec.combine(left, ops, v));
                    self.cur_pos = p;
                    self.start_iteration()
                }
            }
            (_, None) => unreachable!("ReduceLeft requested a step with no pending sub-request"),
        }
    }
}

enum ReduceRightStage {
    TryFirst,
    TryMiddle(usize),
    TryLast,
}

/// `ReduceRight(first, middle, last, build)`: greedily accumulates a list
/// of `(first, middle...)` prefixes, falling back to `last` — from the
/// position before whichever prefix attempt failed to extend it — once no
/// further prefix can be parsed, then folds right across the accumulated
/// prefixes onto `last`'s value. Applies the same no-progress guard as
/// `ReduceLeft` to each prefix attempt.
struct ReduceRightState<Tag: TagImpl> {
    spec: Rc<ReduceSpec<Tag>>,
    stage: ReduceRightStage,
    cur_pos: usize,
    pending_left: Option<Value<Tag>>,
    pending_ops: Vec<Value<Tag>>,
    prefixes: Vec<(Value<Tag>, Vec<Value<Tag>>)>,
}

impl<Tag: TagImpl> ReduceRightState<Tag> {
    fn new(spec: Rc<ReduceSpec<Tag>>, pos: usize) -> Self {
        Self {
            spec,
            stage: ReduceRightStage::TryFirst,
            cur_pos: pos,
            pending_left: None,
            pending_ops: Vec::new(),
            prefixes: Vec::new(),
        }
    }

    fn advance(&mut self, input: Option<Outcome<Tag>>) -> Step<Tag> {
        match (&self.stage, input) {
            (ReduceRightStage::TryFirst, None) => Step::Request(self.spec.first.clone(), self.cur_pos),
            (ReduceRightStage::TryFirst, Some(Outcome::Fail)) => {
                self.stage = ReduceRightStage::TryLast;
                Step::Request(self.spec.last.clone(), self.cur_pos)
            }
            (ReduceRightStage::TryFirst, Some(Outcome::Success(v, p))) => {
                self.pending_left = Some(v);
                self.pending_ops.clear();
                if self.spec.middle.is_empty() {
                    if p == self.cur_pos {
                        self.stage = ReduceRightStage::TryLast;
                        Step::Request(self.spec.last.clone(), self.cur_pos)
                    } else {
                        self.prefixes.push((self.pending_left.take().unwrap(), Vec::new()));
                        self.cur_pos = p;
                        self.stage = ReduceRightStage::TryFirst;
                        Step::Request(self.spec.first.clone(), self.cur_pos)
                    }
                } else {
                    self.stage = ReduceRightStage::TryMiddle(0);
                    Step::Request(self.spec.middle[0].clone(), p)
                }
            }
            (ReduceRightStage::TryMiddle(_), Some(Outcome::Fail)) => {
                self.pending_left = None;
                self.stage = ReduceRightStage::TryLast;
                Step::Request(self.spec.last.clone(), self.cur_pos)
            }
            (ReduceRightStage::TryMiddle(i), Some(Outcome::Success(v, p))) => {
                let i = *i;
                self.pending_ops.push(v);
                if i + 1 < self.spec.middle.len() {
                    self.stage = ReduceRightStage::TryMiddle(i + 1);
                    Step::Request(self.spec.middle[i + 1].clone(), p)
                } else if p == self.cur_pos {
                    self.pending_left = None;
                    self.stage = ReduceRightStage::TryLast;
                    Step::Request(self.spec.last.clone(), self.cur_pos)
                } else {
                    let left = self.pending_left.take().unwrap();
                    let ops = std::mem::take(&mut self.pending_ops);
                    self.prefixes.push((left, ops));
                    self.cur_pos = p;
                    self.stage = ReduceRightStage::TryFirst;
                    Step::Request(self.spec.first.clone(), self.cur_pos)
                }
            }
            (ReduceRightStage::TryLast, Some(Outcome::Fail)) => Step::Final(Outcome::Fail),
            (ReduceRightStage::TryLast, Some(Outcome::Success(v, p))) => {
                let mut acc = v;
                for (left, ops) in self.prefixes.drain(..).rev() {
                    acc = self.spec.combine(left, ops, acc);
                }
                Step::Final(Outcome::Success(acc, p))
            }
            (_, None) => unreachable!("ReduceRight requested a step with no pending sub-request"),
        }
    }
}

enum PrefixFoldStage {
    CollectingOp,
    ParsingInner,
}

/// Internal to the precedence compiler: `(op)* inner`, folding right. An
/// op that matches without advancing the position is excluded and the
/// loop stops immediately — so `Prefix("")` contributes no application at
/// all, matching the plain `inner` parse (§4.5, and the regression this
/// guards against: `OperatorPrecedence(Int, Prefix(""))` on `"123"` must
/// yield the bare int, not an infinite loop).
struct PrefixFoldState<Tag: TagImpl> {
    op: TermRef<Tag>,
    inner: TermRef<Tag>,
    cur_pos: usize,
    ops: Vec<Value<Tag>>,
    stage: PrefixFoldStage,
}

impl<Tag: TagImpl> PrefixFoldState<Tag> {
    fn new(op: TermRef<Tag>, inner: TermRef<Tag>, pos: usize) -> Self {
        Self {
            op,
            inner,
            cur_pos: pos,
            ops: Vec::new(),
            stage: PrefixFoldStage::CollectingOp,
        }
    }

    fn advance(&mut self, input: Option<Outcome<Tag>>) -> Step<Tag> {
        match (&self.stage, input) {
            (PrefixFoldStage::CollectingOp, None) => Step::Request(self.op.clone(), self.cur_pos),
            (PrefixFoldStage::CollectingOp, Some(Outcome::Fail)) => {
                self.stage = PrefixFoldStage::ParsingInner;
                Step::Request(self.inner.clone(), self.cur_pos)
            }
            (PrefixFoldStage::CollectingOp, Some(Outcome::Success(v, p))) => {
                if p == self.cur_pos {
                    self.stage = PrefixFoldStage::ParsingInner;
                    Step::Request(self.inner.clone(), self.cur_pos)
                } else {
                    self.ops.push(v);
                    self.cur_pos = p;
                    Step::Request(self.op.clone(), self.cur_pos)
                }
            }
            (PrefixFoldStage::ParsingInner, Some(Outcome::Fail)) => Step::Final(Outcome::Fail),
            (PrefixFoldStage::ParsingInner, Some(Outcome::Success(v, p))) => {
                let folded = self.ops.drain(..).rev().fold(v, |acc, op| {
                    Value::Operation(Rc::new(crate::value::Operation {
                        operator: op,
                        left: None,
                        right: Some(acc),
                    }))
                });
                Step::Final(Outcome::Success(folded, p))
            }
            (_, None) => unreachable!("PrefixFold requested a step with no pending sub-request"),
        }
    }
}

enum PostfixFoldStage {
    ParsingInner,
    CollectingOp,
}

/// Internal to the precedence compiler: `inner (op)*`, folding left, by
/// the same no-progress guard as `PrefixFold`.
struct PostfixFoldState<Tag: TagImpl> {
    inner: TermRef<Tag>,
    op: TermRef<Tag>,
    cur_pos: usize,
    base: Option<Value<Tag>>,
    stage: PostfixFoldStage,
}

impl<Tag: TagImpl> PostfixFoldState<Tag> {
    fn new(inner: TermRef<Tag>, op: TermRef<Tag>, pos: usize) -> Self {
        Self {
            inner,
            op,
            cur_pos: pos,
            base: None,
            stage: PostfixFoldStage::ParsingInner,
        }
    }

    fn advance(&mut self, input: Option<Outcome<Tag>>) -> Step<Tag> {
        match (&self.stage, input) {
            (PostfixFoldStage::ParsingInner, None) => Step::Request(self.inner.clone(), self.cur_pos),
            (PostfixFoldStage::ParsingInner, Some(Outcome::Fail)) => Step::Final(Outcome::Fail),
            (PostfixFoldStage::ParsingInner, Some(Outcome::Success(v, p))) => {
                self.base = Some(v);
                self.cur_pos = p;
                self.stage = PostfixFoldStage::CollectingOp;
                Step::Request(self.op.clone(), self.cur_pos)
            }
            (PostfixFoldStage::CollectingOp, Some(Outcome::Fail)) => {
                Step::Final(Outcome::Success(self.base.take().unwrap(), self.cur_pos))
            }
            (PostfixFoldStage::CollectingOp, Some(Outcome::Success(v, p))) => {
                if p == self.cur_pos {
                    Step::Final(Outcome::Success(self.base.take().unwrap(), self.cur_pos))
                } else {
                    let acc = self.base.take().unwrap();
                    self.base = Some(Value::Operation(Rc::new(crate::value::Operation {
                        operator: v,
                        left: Some(acc),
                        right: None,
                    })));
                    self.cur_pos = p;
                    Step::Request(self.op.clone(), self.cur_pos)
                }
            }
            (_, None) => unreachable!("PostfixFold requested a step with no pending sub-request"),
        }
    }
}
