use std::rc::Rc;

use regex::bytes::Regex;

use crate::error::{ImplementationError, ParseError};
use crate::term::char_in_set;
use crate::util::Code;
use crate::value::{Token, Value};
use crate::TagImpl;

enum Matcher {
    Text(Rc<str>),
    Pattern(Rc<Regex>),
    CharSet(Rc<str>),
}

struct LexEntry<Tag: TagImpl> {
    tag: Tag,
    matcher: Matcher,
    skip: bool,
}

/// An ordered `(tag, rule)` table turning raw text into a token stream
/// (§4.7). Rules are tried in declaration order at each position; the
/// first one that matches wins — this is *not* longest-match. `Skip`
/// rules are matched and consumed like any other, but never appear in the
/// output stream.
pub struct TokenSyntax<Tag: TagImpl> {
    entries: Vec<LexEntry<Tag>>,
}

impl<Tag: TagImpl> TokenSyntax<Tag> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Adds a regex-pattern rule. Rejects a pattern that matches the empty
    /// string, mirroring the teacher's `Pattern::new` validation — an
    /// epsilon-matching lexer rule would otherwise loop tokenizing forever
    /// at the same position.
    pub fn rule(mut self, tag: Tag, pattern: &str) -> Result<Self, ImplementationError> {
        let regex = Regex::new(pattern)
            .map_err(|e| ImplementationError::new("TokenSyntax", format!("invalid regex: {e}")))?;
        if regex.is_match(b"") {
            return Err(ImplementationError::new(
                "TokenSyntax",
                format!("pattern '{pattern}' must not match the empty string"),
            ));
        }
        self.entries.push(LexEntry {
            tag,
            matcher: Matcher::Pattern(Rc::new(regex)),
            skip: false,
        });
        Ok(self)
    }

    /// Adds a literal-text rule.
    pub fn text(mut self, tag: Tag, literal: impl Into<Rc<str>>) -> Result<Self, ImplementationError> {
        let literal = literal.into();
        if literal.is_empty() {
            return Err(ImplementationError::new(
                "TokenSyntax",
                "literal text rule must not be empty".to_string(),
            ));
        }
        self.entries.push(LexEntry {
            tag,
            matcher: Matcher::Text(literal),
            skip: false,
        });
        Ok(self)
    }

    /// Adds a one-of-these-characters rule.
    pub fn char_set(mut self, tag: Tag, chars: impl Into<Rc<str>>) -> Result<Self, ImplementationError> {
        let chars = chars.into();
        if chars.is_empty() {
            return Err(ImplementationError::new(
                "TokenSyntax",
                "char-set rule must not be empty".to_string(),
            ));
        }
        self.entries.push(LexEntry {
            tag,
            matcher: Matcher::CharSet(chars),
            skip: false,
        });
        Ok(self)
    }

    /// Adds a regex-pattern rule whose matches are discarded from the
    /// output stream (whitespace, comments, ...).
    pub fn skip(mut self, tag: Tag, pattern: &str) -> Result<Self, ImplementationError> {
        let regex = Regex::new(pattern)
            .map_err(|e| ImplementationError::new("TokenSyntax", format!("invalid regex: {e}")))?;
        if regex.is_match(b"") {
            return Err(ImplementationError::new(
                "TokenSyntax",
                format!("skip pattern '{pattern}' must not match the empty string"),
            ));
        }
        self.entries.push(LexEntry {
            tag,
            matcher: Matcher::Pattern(Rc::new(regex)),
            skip: true,
        });
        Ok(self)
    }

    fn try_match(&self, entry: &LexEntry<Tag>, code: &Code, pos: usize) -> Option<usize> {
        match &entry.matcher {
            Matcher::Text(literal) => {
                let bytes = literal.as_bytes();
                if code.value[pos..].starts_with(bytes) {
                    Some(pos + bytes.len())
                } else {
                    None
                }
            }
            Matcher::Pattern(regex) => {
                let m = regex.find(&code.value[pos..])?;
                if m.start() != 0 || m.end() == 0 {
                    None
                } else {
                    Some(pos + m.end())
                }
            }
            Matcher::CharSet(chars) => {
                let byte = *code.value.get(pos)?;
                if char_in_set(chars, byte) {
                    Some(pos + 1)
                } else {
                    None
                }
            }
        }
    }

    /// Tokenizes `code` from position 0 to its end. Fails with a
    /// `ParseError` at the first position no rule matches.
    pub fn tokenize(&self, code: &Code) -> Result<Vec<Token<Tag>>, ParseError> {
        let mut tokens = Vec::new();
        let mut pos = 0usize;
        let len = code.len();
        'outer: while pos < len {
            for entry in &self.entries {
                if let Some(end) = self.try_match(entry, code, pos) {
                    if !entry.skip {
                        let text = String::from_utf8_lossy(&code.value[pos..end]).into_owned();
                        tokens.push(Token {
                            tag: entry.tag,
                            content: Rc::new(Value::Str(Rc::from(text))),
                            start: pos,
                            end,
                        });
                    }
                    pos = end;
                    continue 'outer;
                }
            }
            let position = code.obtain_position(pos);
            return Err(ParseError::with_position(
                pos,
                position,
                "no lexer rule matched".to_string(),
            ));
        }
        Ok(tokens)
    }
}

impl<Tag: TagImpl> Default for TokenSyntax<Tag> {
    fn default() -> Self {
        Self::new()
    }
}
