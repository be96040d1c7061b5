use std::any::Any;
use std::fmt::Debug;
use std::rc::Rc;

use crate::TagImpl;

/// A single lexed or user-supplied token: a tag plus its content.
///
/// `content` is a `Value` rather than a raw string so a token source can
/// carry arbitrary pre-tokenized payloads (ints, nested lists, ...) as well
/// as ordinary lexed text — the same token shape serves both the lexer's
/// output and a directly-supplied sequence of values (§3's "an indexable
/// sequence of objects exposing a content attribute and a runtime tag").
#[derive(Debug, Clone)]
pub struct Token<Tag: TagImpl> {
    pub tag: Tag,
    pub content: Rc<Value<Tag>>,
    pub start: usize,
    pub end: usize,
}

impl<Tag: TagImpl> PartialEq for Token<Tag> {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag
    }
}

/// A named product value produced by the struct assembler.
#[derive(Debug, Clone)]
pub struct StructValue<Tag: TagImpl> {
    pub name: &'static str,
    pub fields: Vec<(&'static str, Value<Tag>)>,
}

impl<Tag: TagImpl> StructValue<Tag> {
    pub fn get(&self, field: &str) -> Option<&Value<Tag>> {
        self.fields.iter().find(|(n, _)| *n == field).map(|(_, v)| v)
    }

    /// Shallow field-override copy (§4.6's `replace`): fields named in
    /// `overrides` take the new value, everything else is untouched.
    pub fn replace(&self, overrides: &[(&'static str, Value<Tag>)]) -> StructValue<Tag> {
        let fields = self
            .fields
            .iter()
            .map(|(name, value)| {
                match overrides.iter().find(|(n, _)| n == name) {
                    Some((_, new_value)) => (*name, new_value.clone()),
                    None => (*name, value.clone()),
                }
            })
            .collect();
        StructValue {
            name: self.name,
            fields,
        }
    }
}

/// The operator-precedence compiler's output node. `left`/`right` are
/// `None` for prefix/postfix applications respectively (§4.5).
#[derive(Debug, Clone)]
pub struct Operation<Tag: TagImpl> {
    pub operator: Value<Tag>,
    pub left: Option<Value<Tag>>,
    pub right: Option<Value<Tag>>,
}

/// The dynamically-shaped value every term produces. Stands in for the
/// original engine's untyped objects: the built-in shapes cover what the
/// core combinators themselves build, and `Dyn` is the escape hatch for
/// whatever a `Transform`/`Bind`/reducer `build` closure returns that
/// doesn't fit them.
#[derive(Clone)]
pub enum Value<Tag: TagImpl> {
    /// The "no value" sentinel: what `Nothing`, `Return(Unit)`, and a
    /// missed `Opt` all yield.
    Unit,
    Bool(bool),
    Int(i64),
    Str(Rc<str>),
    Token(Token<Tag>),
    Tuple(Vec<Value<Tag>>),
    List(Vec<Value<Tag>>),
    Struct(Rc<StructValue<Tag>>),
    Operation(Rc<Operation<Tag>>),
    Dyn(Rc<dyn Any>),
}

impl<Tag: TagImpl> Value<Tag> {
    pub fn dyn_value<T: Any>(value: T) -> Self {
        Value::Dyn(Rc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Dyn(v) => v.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_token(&self) -> Option<&Token<Tag>> {
        match self {
            Value::Token(t) => Some(t),
            _ => None,
        }
    }
}

impl<Tag: TagImpl> Debug for Value<Tag> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Unit => write!(f, "Unit"),
            Value::Bool(b) => write!(f, "Bool({:?})", b),
            Value::Int(n) => write!(f, "Int({:?})", n),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::Token(t) => write!(f, "Token({:?})", t),
            Value::Tuple(items) => write!(f, "Tuple({:?})", items),
            Value::List(items) => write!(f, "List({:?})", items),
            Value::Struct(s) => write!(f, "Struct({:?})", s),
            Value::Operation(o) => write!(f, "Operation({:?})", o),
            Value::Dyn(_) => write!(f, "Dyn(..)"),
        }
    }
}

/// Structural equality where it is meaningful (used by `Term::Literal` to
/// compare a term's literal value against a token's content); `Dyn` values
/// fall back to pointer identity since `dyn Any` carries no `PartialEq`.
impl<Tag: TagImpl> PartialEq for Value<Tag> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Token(a), Value::Token(b)) => a.tag == b.tag && a.content == b.content,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Struct(a), Value::Struct(b)) => Rc::ptr_eq(a, b) || a.fields == b.fields,
            (Value::Operation(a), Value::Operation(b)) => {
                Rc::ptr_eq(a, b) || (a.operator == b.operator && a.left == b.left && a.right == b.right)
            }
            (Value::Dyn(a), Value::Dyn(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}
