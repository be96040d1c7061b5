use std::ops::{BitAnd, BitOr, Not, Shl, Shr};
use std::rc::Rc;

use regex::bytes::Regex;

use crate::error::ImplementationError;
use crate::forward::ForwardCell;
use crate::precedence::PrecedenceSpec;
use crate::reduce::ReduceSpec;
use crate::struct_def::StructDescriptor;
use crate::value::Value;
use crate::TagImpl;

/// The closed term algebra every combinator compiles into. Built once per
/// grammar and shared by `Rc`; the driver keys memoization and
/// `ForwardRef` resolution off each node's pointer identity (§3), so terms
/// are never compared structurally — two independently-built "same
/// looking" terms are different nodes.
pub enum Term<Tag: TagImpl> {
    /// The absent term: succeeds without consuming, yielding [`Value::Unit`].
    Nothing,
    /// Succeeds without consuming, yielding the given value verbatim.
    Return(Value<Tag>),
    /// Token-source literal: succeeds iff the token at `pos` has content
    /// structurally equal to this value.
    Literal(Value<Tag>),
    /// Char-source (or token-source, by content) literal text match.
    LiteralText(Rc<str>),
    /// Anchored regex match against a character source.
    Pattern(Rc<Regex>),
    /// One element from a fixed character set.
    AnyChar(Rc<str>),
    /// One element of any tag/content.
    Any,
    /// One element satisfying a predicate over its value.
    Where(Rc<dyn Fn(&Value<Tag>) -> bool>),
    /// Succeeds with no consumption iff `pos == 0`.
    Start,
    /// Succeeds with no consumption iff `pos` is the end of input.
    End,
    /// Rewinds one position and succeeds, for look-behind composition.
    Backtrack,
    /// Token-source tag match.
    Tag(Tag),
    /// Parses `t`, then rewinds to the position before it (lookahead).
    Expect(TermRef<Tag>),
    /// Parses `t`; on failure, succeeds with [`Value::Unit`] at the
    /// original position instead of propagating the failure.
    Opt(TermRef<Tag>),
    /// Parses `a` then `b` in sequence, yielding `a`'s value.
    Left(TermRef<Tag>, TermRef<Tag>),
    /// Parses `a` then `b` in sequence, yielding `b`'s value.
    Right(TermRef<Tag>, TermRef<Tag>),
    /// Ordered choice: `a`, falling back to `b` from the same position.
    Or(TermRef<Tag>, TermRef<Tag>),
    /// Both `a` and `b` must parse from the same starting position; yields
    /// `a`'s value and `a`'s consumed length (`b`'s advance is discarded).
    And(TermRef<Tag>, TermRef<Tag>),
    /// Parses `t`, then maps its value through a pure function.
    Transform(TermRef<Tag>, Rc<dyn Fn(Value<Tag>) -> Value<Tag>>),
    /// Parses `t`, then parses the term built from `t`'s value — the
    /// data-dependent-grammar primitive.
    Bind(TermRef<Tag>, Rc<dyn Fn(Value<Tag>) -> TermRef<Tag>>),
    /// Parses `t`; fails unless a predicate holds of the resulting value.
    Require(TermRef<Tag>, Rc<dyn Fn(&Value<Tag>) -> bool>),
    /// Zero or more `t`, terminating (without including the non-advancing
    /// attempt) the first time an iteration succeeds without consuming.
    List(TermRef<Tag>),
    /// One or more `t`, by the same termination rule as `List`.
    Some(TermRef<Tag>),
    /// Zero or more `item` separated by `sep`; yields the `item` values only.
    Alt(TermRef<Tag>, TermRef<Tag>),
    /// A fixed sequence of terms, yielding their values as a tuple.
    Tuple(Rc<Vec<TermRef<Tag>>>),
    /// A named product assembled field by field, or an associativity
    /// delegate compiled lazily into `ReduceLeft`/`ReduceRight`.
    Struct(Rc<StructDescriptor<Tag>>),
    /// Left-associative infix fold.
    ReduceLeft(Rc<ReduceSpec<Tag>>),
    /// Right-associative infix fold.
    ReduceRight(Rc<ReduceSpec<Tag>>),
    /// An operator-precedence table, compiled lazily into layered
    /// `Or`/`ReduceLeft`/`ReduceRight`/fold terms on first use.
    OperatorPrecedence(Rc<PrecedenceSpec<Tag>>),
    /// A lazily-resolved reference to a term, for self-referential
    /// grammars. Resolved once; memoized by the resolved term's identity.
    ForwardRef(Rc<ForwardCell<Tag>>),
    /// Internal to the precedence compiler: `(op)* inner`, folding right,
    /// each application producing `Operation(op, None, acc)`.
    PrefixFold(TermRef<Tag>, TermRef<Tag>),
    /// Internal to the precedence compiler: `inner (op)*`, folding left,
    /// each application producing `Operation(op, Some(acc), None)`.
    PostfixFold(TermRef<Tag>, TermRef<Tag>),
}

pub type TermRef<Tag> = Rc<Term<Tag>>;

pub fn nothing<Tag: TagImpl>() -> TermRef<Tag> {
    Rc::new(Term::Nothing)
}

/// The term an absent slot in a sequence/tuple literal compiles to — never
/// [`Term::Nothing`] and never `literal(Value::Unit)`, preserving the
/// asymmetry noted in §6: a skipped slot always succeeds vacuously, while
/// `Literal(Unit)` would require an actual unit-content token to match.
pub fn absent<Tag: TagImpl>() -> TermRef<Tag> {
    Rc::new(Term::Return(Value::Unit))
}

pub fn ret<Tag: TagImpl>(value: Value<Tag>) -> TermRef<Tag> {
    Rc::new(Term::Return(value))
}

pub fn literal<Tag: TagImpl>(value: Value<Tag>) -> TermRef<Tag> {
    Rc::new(Term::Literal(value))
}

pub fn text<Tag: TagImpl>(s: impl Into<Rc<str>>) -> TermRef<Tag> {
    Rc::new(Term::LiteralText(s.into()))
}

pub fn pattern<Tag: TagImpl>(re: &str) -> Result<TermRef<Tag>, ImplementationError> {
    let compiled = Regex::new(re).map_err(|e| {
        ImplementationError::new("Pattern", format!("invalid regular expression: {e}"))
    })?;
    Ok(Rc::new(Term::Pattern(Rc::new(compiled))))
}

pub fn any_char<Tag: TagImpl>(chars: impl Into<Rc<str>>) -> TermRef<Tag> {
    Rc::new(Term::AnyChar(chars.into()))
}

pub fn any<Tag: TagImpl>() -> TermRef<Tag> {
    Rc::new(Term::Any)
}

pub fn where_<Tag: TagImpl>(pred: impl Fn(&Value<Tag>) -> bool + 'static) -> TermRef<Tag> {
    Rc::new(Term::Where(Rc::new(pred)))
}

pub fn start<Tag: TagImpl>() -> TermRef<Tag> {
    Rc::new(Term::Start)
}

pub fn end<Tag: TagImpl>() -> TermRef<Tag> {
    Rc::new(Term::End)
}

pub fn backtrack<Tag: TagImpl>() -> TermRef<Tag> {
    Rc::new(Term::Backtrack)
}

pub fn tag<Tag: TagImpl>(t: Tag) -> TermRef<Tag> {
    Rc::new(Term::Tag(t))
}

pub fn expect<Tag: TagImpl>(t: TermRef<Tag>) -> TermRef<Tag> {
    Rc::new(Term::Expect(t))
}

pub fn opt<Tag: TagImpl>(t: TermRef<Tag>) -> TermRef<Tag> {
    Rc::new(Term::Opt(t))
}

pub fn left<Tag: TagImpl>(a: TermRef<Tag>, b: TermRef<Tag>) -> TermRef<Tag> {
    Rc::new(Term::Left(a, b))
}

pub fn right<Tag: TagImpl>(a: TermRef<Tag>, b: TermRef<Tag>) -> TermRef<Tag> {
    Rc::new(Term::Right(a, b))
}

pub fn or<Tag: TagImpl>(a: TermRef<Tag>, b: TermRef<Tag>) -> TermRef<Tag> {
    Rc::new(Term::Or(a, b))
}

pub fn and<Tag: TagImpl>(a: TermRef<Tag>, b: TermRef<Tag>) -> TermRef<Tag> {
    Rc::new(Term::And(a, b))
}

pub fn transform<Tag: TagImpl>(
    t: TermRef<Tag>,
    f: impl Fn(Value<Tag>) -> Value<Tag> + 'static,
) -> TermRef<Tag> {
    Rc::new(Term::Transform(t, Rc::new(f)))
}

pub fn bind<Tag: TagImpl>(
    t: TermRef<Tag>,
    f: impl Fn(Value<Tag>) -> TermRef<Tag> + 'static,
) -> TermRef<Tag> {
    Rc::new(Term::Bind(t, Rc::new(f)))
}

pub fn require<Tag: TagImpl>(
    t: TermRef<Tag>,
    pred: impl Fn(&Value<Tag>) -> bool + 'static,
) -> TermRef<Tag> {
    Rc::new(Term::Require(t, Rc::new(pred)))
}

pub fn list<Tag: TagImpl>(t: TermRef<Tag>) -> TermRef<Tag> {
    Rc::new(Term::List(t))
}

pub fn some<Tag: TagImpl>(t: TermRef<Tag>) -> TermRef<Tag> {
    Rc::new(Term::Some(t))
}

pub fn alt<Tag: TagImpl>(item: TermRef<Tag>, sep: TermRef<Tag>) -> TermRef<Tag> {
    Rc::new(Term::Alt(item, sep))
}

pub fn tuple<Tag: TagImpl>(items: Vec<TermRef<Tag>>) -> TermRef<Tag> {
    Rc::new(Term::Tuple(Rc::new(items)))
}

/// Builds a `Term::ForwardRef` around a thunk resolved at most once, on
/// first use by the driver. Lets a grammar reference a term that doesn't
/// exist yet in the host language — e.g. a recursive-descent expression
/// grammar closing over itself.
pub fn forward_ref<Tag: TagImpl>(
    f: impl FnOnce() -> TermRef<Tag> + 'static,
) -> TermRef<Tag> {
    Rc::new(Term::ForwardRef(Rc::new(ForwardCell::new(f))))
}

/// Follows a chain of `ForwardRef`s down to the first concrete term,
/// resolving each cell along the way. A grammar with a `ForwardRef` whose
/// thunk resolves to another unresolved `ForwardRef` is legal; the chain
/// is walked fully before the driver keys a memo entry.
pub fn unwrap_forward<Tag: TagImpl>(mut term: TermRef<Tag>) -> TermRef<Tag> {
    loop {
        let next = match &*term {
            Term::ForwardRef(cell) => cell.resolve(),
            _ => return term,
        };
        term = next;
    }
}

pub(crate) fn or_all<Tag: TagImpl>(mut ops: Vec<TermRef<Tag>>) -> TermRef<Tag> {
    let mut iter = ops.drain(..);
    let first = iter
        .next()
        .expect("operator-precedence row needs at least one operator");
    iter.fold(first, |acc, next| or(acc, next))
}

/// Ergonomic wrapper carrying the shorthand operators (`|`, `&`, `<<`,
/// `>>`, `~`) that spec §6 calls for. Rust's orphan rules forbid
/// implementing foreign operator traits directly on a bare `Rc<Term<Tag>>`
/// (both the trait and `Rc` are foreign), so this thin newtype is the
/// vehicle instead — `Deref`s to the underlying `TermRef` for everything
/// else.
#[derive(Clone)]
pub struct T<Tag: TagImpl>(pub TermRef<Tag>);

impl<Tag: TagImpl> From<TermRef<Tag>> for T<Tag> {
    fn from(t: TermRef<Tag>) -> Self {
        T(t)
    }
}

impl<Tag: TagImpl> std::ops::Deref for T<Tag> {
    type Target = TermRef<Tag>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<Tag: TagImpl> BitOr for T<Tag> {
    type Output = T<Tag>;
    fn bitor(self, rhs: Self) -> Self::Output {
        T(or(self.0, rhs.0))
    }
}

impl<Tag: TagImpl> BitAnd for T<Tag> {
    type Output = T<Tag>;
    fn bitand(self, rhs: Self) -> Self::Output {
        T(and(self.0, rhs.0))
    }
}

impl<Tag: TagImpl> Shl for T<Tag> {
    type Output = T<Tag>;
    fn shl(self, rhs: Self) -> Self::Output {
        T(left(self.0, rhs.0))
    }
}

impl<Tag: TagImpl> Shr for T<Tag> {
    type Output = T<Tag>;
    fn shr(self, rhs: Self) -> Self::Output {
        T(right(self.0, rhs.0))
    }
}

impl<Tag: TagImpl> Not for T<Tag> {
    type Output = T<Tag>;
    fn not(self) -> Self::Output {
        T(opt(self.0))
    }
}

/// Fixed-arity tuples of terms compile to `Term::Tuple`, matching spec §6's
/// "tuple literals represent Tuple sequences when used as terms".
pub trait IntoTermSeq<Tag: TagImpl> {
    fn into_term_seq(self) -> Vec<TermRef<Tag>>;
}

macro_rules! impl_into_term_seq {
    ($($idx:tt : $name:ident),+) => {
        impl<Tag: TagImpl> IntoTermSeq<Tag> for ($($name,)+)
        where
            $($name: Into<TermRef<Tag>>,)+
        {
            fn into_term_seq(self) -> Vec<TermRef<Tag>> {
                vec![$(self.$idx.into()),+]
            }
        }
    };
}

impl_into_term_seq!(0: A, 1: B);
impl_into_term_seq!(0: A, 1: B, 2: C);
impl_into_term_seq!(0: A, 1: B, 2: C, 3: D);
impl_into_term_seq!(0: A, 1: B, 2: C, 3: D, 4: E);
impl_into_term_seq!(0: A, 1: B, 2: C, 3: D, 4: E, 5: F);

pub fn seq<Tag: TagImpl, S: IntoTermSeq<Tag>>(items: S) -> TermRef<Tag> {
    tuple(items.into_term_seq())
}

pub(crate) fn char_in_set(set: &str, byte: u8) -> bool {
    set.as_bytes().contains(&byte)
}
