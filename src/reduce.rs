use std::rc::Rc;

use crate::term::TermRef;
use crate::value::Value;
use crate::TagImpl;

/// Combines a fold's accumulator, the values produced by the middle terms
/// of one iteration, and the newly-parsed value into the next accumulator.
pub type BuildFn<Tag> = Rc<dyn Fn(Value<Tag>, Vec<Value<Tag>>, Value<Tag>) -> Value<Tag>>;

/// Shared spec for `Term::ReduceLeft`/`Term::ReduceRight`: a `first` term
/// seeding the accumulator, zero or more `middle` terms parsed between
/// each fold step (the "operator shape"), a `last` term producing each
/// fold's right-hand operand, and an optional custom `build`.
pub struct ReduceSpec<Tag: TagImpl> {
    pub first: TermRef<Tag>,
    pub middle: Rc<Vec<TermRef<Tag>>>,
    pub last: TermRef<Tag>,
    pub build: Option<BuildFn<Tag>>,
}

impl<Tag: TagImpl> ReduceSpec<Tag> {
    /// Default combine: `(left, op, right)` when there is exactly one
    /// middle term (the common infix-operator case), `(left, (ops...), right)`
    /// otherwise.
    pub fn combine(&self, left: Value<Tag>, ops: Vec<Value<Tag>>, right: Value<Tag>) -> Value<Tag> {
        match &self.build {
            Some(build) => build(left, ops, right),
            None => {
                let op_value = if ops.len() == 1 {
                    ops.into_iter().next().unwrap()
                } else {
                    Value::Tuple(ops)
                };
                Value::Tuple(vec![left, op_value, right])
            }
        }
    }
}

pub fn reduce_left<Tag: TagImpl>(
    first: TermRef<Tag>,
    middle: Vec<TermRef<Tag>>,
    last: TermRef<Tag>,
    build: Option<BuildFn<Tag>>,
) -> TermRef<Tag> {
    Rc::new(crate::term::Term::ReduceLeft(Rc::new(ReduceSpec {
        first,
        middle: Rc::new(middle),
        last,
        build,
    })))
}

pub fn reduce_right<Tag: TagImpl>(
    first: TermRef<Tag>,
    middle: Vec<TermRef<Tag>>,
    last: TermRef<Tag>,
    build: Option<BuildFn<Tag>>,
) -> TermRef<Tag> {
    Rc::new(crate::term::Term::ReduceRight(Rc::new(ReduceSpec {
        first,
        middle: Rc::new(middle),
        last,
        build,
    })))
}

/// The default binary-operator build used by the precedence compiler's
/// infix rows: `Operation { operator, left: Some(l), right: Some(r) }`.
pub fn operation_build<Tag: TagImpl>() -> BuildFn<Tag> {
    Rc::new(|left, ops, right| {
        let operator = ops.into_iter().next().unwrap_or(Value::Unit);
        Value::Operation(Rc::new(crate::value::Operation {
            operator,
            left: Some(left),
            right: Some(right),
        }))
    })
}
