use std::fmt::{Display, Formatter};

/// A debug-only trace message, ordered by verbosity. Entirely compiled out
/// in release builds; the driver and lexer call [`Log::announce`] on the
/// hot path regardless so debug and release builds share control flow.
#[derive(Debug, Clone, Copy)]
pub enum Log<T> {
    None,
    Default(T),
    Step(T),
    Verbose(T),
}

impl<T: Display> Display for Log<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Log::None => Ok(()),
            Log::Default(s) | Log::Step(s) | Log::Verbose(s) => write!(f, "{}", s),
        }
    }
}

impl<T> Log<T> {
    pub fn order(&self) -> u8 {
        match self {
            Log::None => 0,
            Log::Default(_) => 1,
            Log::Step(_) => 2,
            Log::Verbose(_) => 3,
        }
    }
}

impl Log<()> {
    /// Prints `message` when `self`'s configured verbosity admits `at_least`.
    /// A no-op call in release builds (the `println!` is compiled out).
    pub fn announce(&self, at_least: Log<()>, message: impl Fn() -> String) {
        #[cfg(debug_assertions)]
        if self.order() >= at_least.order() {
            println!("{}", message());
        }
        #[cfg(not(debug_assertions))]
        {
            let _ = at_least;
            let _ = message;
        }
    }
}
