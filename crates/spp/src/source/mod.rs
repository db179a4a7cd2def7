//! Character sources and the pull-based cursor abstraction
//!
//! Everything the preprocessor reads comes through [`CharStream`]: the raw
//! input, included files and expanded macro bodies are all [`Source`] values
//! stacked on a [`SourceStack`], with a [`Lookahead`] window on top for the
//! scanner.

mod cursor;
mod lookahead;
mod stack;

pub use cursor::Source;
pub use lookahead::Lookahead;
pub use stack::SourceStack;

use crate::common::{Location, PreprocessResult};

/// Pull-based character cursor.
///
/// `peek` never advances; each `advance` consumes exactly one character and
/// ticks the location. EOF is `None`, never a sentinel character.
pub trait CharStream {
    fn peek(&mut self) -> PreprocessResult<Option<char>>;
    fn advance(&mut self) -> PreprocessResult<()>;
    fn location(&self) -> &Location;

    /// Peek-then-advance convenience.
    fn bump(&mut self) -> PreprocessResult<Option<char>> {
        let ch = self.peek()?;
        if ch.is_some() {
            self.advance()?;
        }
        Ok(ch)
    }
}

/// First character of an identifier per the script identifier grammar.
pub fn is_ident_start(ch: char) -> bool {
    ch == '_' || ch.is_ascii_alphabetic()
}

/// Continuation character of an identifier.
pub fn is_ident_continue(ch: char) -> bool {
    ch == '_' || ch.is_ascii_alphanumeric()
}
