use crate::value::Token;
use crate::TagImpl;

/// The input a [`crate::driver::Parser`] runs against. Chosen once per
/// parser; every primitive matcher in the driver dispatches on it (§4.1's
/// "input dispatch"): a character source uses byte-slice equality for
/// literal text, a token source compares token content or tag.
pub enum Source<'s, Tag: TagImpl> {
    Text(&'s [u8]),
    Tokens(&'s [Token<Tag>]),
}

impl<'s, Tag: TagImpl> Source<'s, Tag> {
    pub fn len(&self) -> usize {
        match self {
            Source::Text(bytes) => bytes.len(),
            Source::Tokens(tokens) => tokens.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
