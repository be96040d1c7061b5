use std::cell::RefCell;

use once_cell::unsync::OnceCell;

use crate::term::TermRef;
use crate::TagImpl;

/// Backing cell for `Term::ForwardRef`. Holds a thunk until the driver
/// first needs this term, resolves it exactly once, and memoizes the
/// result by the resolved term's own pointer identity from then on.
pub struct ForwardCell<Tag: TagImpl> {
    thunk: RefCell<Option<Box<dyn FnOnce() -> TermRef<Tag>>>>,
    resolved: OnceCell<TermRef<Tag>>,
}

impl<Tag: TagImpl> ForwardCell<Tag> {
    pub fn new(f: impl FnOnce() -> TermRef<Tag> + 'static) -> Self {
        Self {
            thunk: RefCell::new(Some(Box::new(f))),
            resolved: OnceCell::new(),
        }
    }

    pub fn resolve(&self) -> TermRef<Tag> {
        if let Some(term) = self.resolved.get() {
            return term.clone();
        }
        let thunk = self
            .thunk
            .borrow_mut()
            .take()
            .expect("ForwardRef resolved re-entrantly before its thunk returned");
        let term = thunk();
        // `get_or_init` isn't usable here since building `term` may itself
        // have recursed into `resolve` (a self-referential grammar) and
        // raced to set the cell first; either writer's value is correct
        // since both come from the same thunk having already run to
        // completion once the `take()` above fired.
        let _ = self.resolved.set(term.clone());
        term
    }
}
