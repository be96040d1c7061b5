use std::rc::Rc;

use once_cell::unsync::OnceCell;

use crate::error::ImplementationError;
use crate::reduce::{operation_build, ReduceSpec};
use crate::term::{or_all, Term, TermRef};
use crate::TagImpl;

/// One row of an operator-precedence table, in tightest-to-loosest
/// declaration order (§4.5). Each row wraps the term built by the
/// previous row (or the atom, for the first row).
pub enum Row<Tag: TagImpl> {
    Prefix(Vec<TermRef<Tag>>),
    Postfix(Vec<TermRef<Tag>>),
    InfixLeft(Vec<TermRef<Tag>>),
    InfixRight(Vec<TermRef<Tag>>),
}

/// Backing spec for `Term::OperatorPrecedence`: compiles `atom` and `rows`
/// into a layered grammar the first time the driver visits this term,
/// caching the result exactly like a struct's associativity delegate.
pub struct PrecedenceSpec<Tag: TagImpl> {
    atom: TermRef<Tag>,
    rows: Vec<Row<Tag>>,
    compiled: OnceCell<TermRef<Tag>>,
}

impl<Tag: TagImpl> PrecedenceSpec<Tag> {
    pub fn compiled(self: &Rc<Self>) -> TermRef<Tag> {
        self.compiled
            .get_or_init(|| compile_rows(self.atom.clone(), &self.rows))
            .clone()
    }
}

fn compile_rows<Tag: TagImpl>(atom: TermRef<Tag>, rows: &[Row<Tag>]) -> TermRef<Tag> {
    let mut level = atom;
    for row in rows {
        level = match row {
            Row::Prefix(ops) => {
                let op = or_all(ops.clone());
                Rc::new(Term::PrefixFold(op, level))
            }
            Row::Postfix(ops) => {
                let op = or_all(ops.clone());
                Rc::new(Term::PostfixFold(level, op))
            }
            Row::InfixLeft(ops) => {
                let op = or_all(ops.clone());
                let spec = Rc::new(ReduceSpec {
                    first: level.clone(),
                    middle: Rc::new(vec![op]),
                    last: level,
                    build: Some(operation_build()),
                });
                Rc::new(Term::ReduceLeft(spec))
            }
            Row::InfixRight(ops) => {
                let op = or_all(ops.clone());
                let spec = Rc::new(ReduceSpec {
                    first: level.clone(),
                    middle: Rc::new(vec![op]),
                    last: level,
                    build: Some(operation_build()),
                });
                Rc::new(Term::ReduceRight(spec))
            }
        };
    }
    level
}

/// Builds an `OperatorPrecedence` term. `atom` is the innermost level (what
/// the tightest row wraps); `rows` run tightest-binding first. Compilation
/// itself is eager-safe even when `atom` contains an unresolved
/// `ForwardRef` back to this very table, since forward references aren't
/// followed until the driver actually parses with them.
pub fn operator_precedence<Tag: TagImpl>(
    atom: TermRef<Tag>,
    rows: Vec<Row<Tag>>,
) -> Result<TermRef<Tag>, ImplementationError> {
    if rows.is_empty() {
        return Err(ImplementationError::new(
            "OperatorPrecedence",
            "table has no rows".to_string(),
        ));
    }
    for row in &rows {
        let ops_empty = match row {
            Row::Prefix(ops) | Row::Postfix(ops) | Row::InfixLeft(ops) | Row::InfixRight(ops) => {
                ops.is_empty()
            }
        };
        if ops_empty {
            return Err(ImplementationError::new(
                "OperatorPrecedence",
                "a row has no operators".to_string(),
            ));
        }
    }
    Ok(Rc::new(Term::OperatorPrecedence(Rc::new(PrecedenceSpec {
        atom,
        rows,
        compiled: OnceCell::new(),
    }))))
}
