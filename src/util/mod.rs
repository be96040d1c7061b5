//! Small utilities shared across the crate: byte-offset-to-line/column
//! reporting (grounded in the teacher's `util::code`/`util::position`
//! pair) and a debug-only step logger for the driver.

mod code;
mod log;
mod position;

use once_cell::unsync::OnceCell;

pub use log::Log;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
/// Line and column of a byte offset into a [`Code`] buffer. Both are 1-based.
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// A wrapper around the raw input bytes that lazily computes line-break
/// offsets the first time a diagnostic needs them.
pub struct Code<'c> {
    pub value: &'c [u8],
    line_breaks: OnceCell<Vec<usize>>,
}
