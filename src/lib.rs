//! A memoizing, trampolined parser-combinator engine.
//!
//! A grammar is a term graph (§3): primitives and combinators compose into
//! an immutable [`term::Term`] tree, shared by `Rc` and executed by
//! [`driver::Parser`] against either a character source or a pre-tokenized
//! source. The driver never recurses through the grammar itself — every
//! compound term is an explicit state machine advanced by an outer loop
//! (§4.1) — so grammars nested arbitrarily deep never exhaust the host
//! stack, and repeated sub-parses at the same `(term, position)` pair are
//! served from a memo table rather than re-run.
//!
//! ```
//! use termrat::lexeme::pattern;
//! use termrat::combinator::left;
//! use termrat::lexeme::end;
//! use termrat::{parse, Source, TermRef};
//!
//! let digits: TermRef<()> = pattern("[0-9]+").unwrap();
//! let term = left(digits, end());
//! let value = parse(term, Source::Text(b"123")).unwrap();
//! assert_eq!(value.as_str(), Some("123"));
//! ```

mod driver;
mod error;
mod forward;
mod lexer;
mod precedence;
mod reduce;
mod source;
mod struct_def;
mod term;
mod util;
mod value;

use std::fmt::Debug;
use std::hash::Hash;

pub use driver::{parse, parse_prefix, Outcome, Parser};
pub use error::{ImplementationError, ParseError};
pub use lexer::TokenSyntax;
pub use precedence::{operator_precedence, PrecedenceSpec, Row};
pub use reduce::{operation_build, reduce_left, reduce_right, BuildFn, ReduceSpec};
pub use source::Source;
pub use struct_def::{AssocKind, StructBuilder, StructDescriptor};
pub use term::{Term, TermRef, T};
pub use util::{Code, Log, Position};
pub use value::{Operation, StructValue, Token, Value};

/// A term's runtime tag type: the bare minimum a driver needs to key memo
/// entries, compare token tags (`Term::Tag`), and be stored in a `Term`
/// graph shared across threads-free `Rc` structure (§3). Blanket-implemented
/// for every eligible type — there is nothing to opt into beyond the bounds
/// themselves. A unit tag `()` is the idiom for a token source carrying no
/// real tagging of its own, just a sequence of values (§3, §7).
pub trait TagImpl: Copy + Eq + Hash + Debug + 'static {}

impl<T: Copy + Eq + Hash + Debug + 'static> TagImpl for T {}

/// The individual grammar primitives (§4.2): literals, patterns, character
/// classes, and the handful of positional/lookbehind atoms.
pub mod lexeme {
    pub use crate::term::{
        absent, any, any_char, backtrack, end, literal, nothing, pattern, ret, start, tag, text,
        where_, Term,
    };
}

/// The combining forms built on top of the primitives (§4.3, §4.4): sequence,
/// choice, repetition, transformation, and the data-dependent forms.
pub mod combinator {
    pub use crate::term::{
        alt, and, bind, expect, forward_ref, left, list, opt, or, require, right, seq, some,
        transform, tuple, unwrap_forward, IntoTermSeq,
    };
    pub use crate::reduce::{reduce_left, reduce_right};
    pub use crate::struct_def::StructBuilder;
}

/// Tokenizes `text` with `syntax`, then parses the resulting token stream
/// with `term`, requiring every token to be consumed. A convenience
/// combining [`TokenSyntax::tokenize`] and [`parse`] for the common
/// lex-then-parse pipeline (§4.7).
pub fn tokenize_and_parse<Tag: TagImpl>(
    syntax: &TokenSyntax<Tag>,
    term: TermRef<Tag>,
    text: &str,
) -> Result<Value<Tag>, ParseError> {
    let code = Code::from(text);
    let tokens = syntax.tokenize(&code)?;
    parse(term, Source::Tokens(&tokens))
}
