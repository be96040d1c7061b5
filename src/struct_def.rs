use std::rc::Rc;

use once_cell::unsync::OnceCell;

use crate::error::ImplementationError;
use crate::reduce::ReduceSpec;
use crate::term::{Term, TermRef};
use crate::value::{StructValue, Value};
use crate::TagImpl;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssocKind {
    Left,
    Right,
}

/// A named product type: an ordered `(field_name, field_term)` list parsed
/// sequentially and materialized into a [`StructValue`], or — when `assoc`
/// is set — a `LeftAssoc`/`RightAssoc` descriptor whose first/middle/last
/// fields compile lazily into a cached `ReduceLeft`/`ReduceRight` delegate
/// the first time the driver needs it (mirroring the teacher's per-struct
/// delegate cache in its assoc-struct parsing path).
pub struct StructDescriptor<Tag: TagImpl> {
    pub name: &'static str,
    pub fields: Vec<(&'static str, TermRef<Tag>)>,
    pub assoc: Option<AssocKind>,
    delegate: OnceCell<TermRef<Tag>>,
}

impl<Tag: TagImpl> StructDescriptor<Tag> {
    /// Returns the compiled `ReduceLeft`/`ReduceRight` delegate for an
    /// associativity struct, building and caching it on first use. Panics
    /// if called on a plain (non-assoc) descriptor — callers check
    /// `self.assoc` first.
    pub fn assoc_delegate(self: &Rc<Self>) -> TermRef<Tag> {
        let kind = self.assoc.expect("assoc_delegate called on a plain struct");
        self.delegate
            .get_or_init(|| {
                let first = self.fields[0].1.clone();
                let last = self.fields[self.fields.len() - 1].1.clone();
                let middle: Vec<TermRef<Tag>> = self.fields[1..self.fields.len() - 1]
                    .iter()
                    .map(|(_, t)| t.clone())
                    .collect();
                let name = self.name;
                let field_names: Vec<&'static str> =
                    self.fields.iter().map(|(n, _)| *n).collect();
                let build = Rc::new(move |left: Value<Tag>, ops: Vec<Value<Tag>>, right: Value<Tag>| {
                    let mut values = Vec::with_capacity(field_names.len());
                    values.push(left);
                    values.extend(ops);
                    values.push(right);
                    Value::Struct(Rc::new(StructValue {
                        name,
                        fields: field_names.iter().copied().zip(values).collect(),
                    }))
                });
                let spec = Rc::new(ReduceSpec {
                    first,
                    middle: Rc::new(middle),
                    last,
                    build: Some(build),
                });
                match kind {
                    AssocKind::Left => Rc::new(Term::ReduceLeft(spec)),
                    AssocKind::Right => Rc::new(Term::ReduceRight(spec)),
                }
            })
            .clone()
    }
}

pub struct StructBuilder<Tag: TagImpl> {
    name: &'static str,
    fields: Vec<(&'static str, TermRef<Tag>)>,
    assoc: Option<AssocKind>,
}

impl<Tag: TagImpl> StructBuilder<Tag> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: Vec::new(),
            assoc: None,
        }
    }

    pub fn field(mut self, name: &'static str, term: TermRef<Tag>) -> Self {
        self.fields.push((name, term));
        self
    }

    pub fn left_assoc(mut self) -> Self {
        self.assoc = Some(AssocKind::Left);
        self
    }

    pub fn right_assoc(mut self) -> Self {
        self.assoc = Some(AssocKind::Right);
        self
    }

    pub fn build(self) -> Result<TermRef<Tag>, ImplementationError> {
        if self.fields.is_empty() {
            return Err(ImplementationError::new(
                "Struct",
                format!("struct `{}` has no fields", self.name),
            ));
        }
        if self.assoc.is_some() && self.fields.len() < 2 {
            return Err(ImplementationError::new(
                "Struct",
                format!(
                    "associativity struct `{}` needs at least a first and a last field",
                    self.name
                ),
            ));
        }
        Ok(Rc::new(Term::Struct(Rc::new(StructDescriptor {
            name: self.name,
            fields: self.fields,
            assoc: self.assoc,
            delegate: OnceCell::new(),
        }))))
    }
}
