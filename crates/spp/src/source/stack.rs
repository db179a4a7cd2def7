//! Stack of nested character sources

use super::{CharStream, Source};
use crate::common::{Location, PreprocessResult};

/// A stack of sources that behaves as one source.
///
/// The top entry is the active one; an exhausted top is popped transparently
/// so output resumes from exactly where the parent left off. This is what
/// stitches included files and macro expansions back into the surrounding
/// text with no markers in the output.
pub struct SourceStack<'src> {
    entries: Vec<Source<'src>>,
    /// Location reported once every entry has drained.
    end_loc: Location,
}

impl<'src> SourceStack<'src> {
    pub fn new(root: Source<'src>) -> Self {
        let end_loc = root.location().clone();
        Self {
            entries: vec![root],
            end_loc,
        }
    }

    /// Push a source; it becomes the active one.
    pub fn push(&mut self, source: Source<'src>) {
        self.entries.push(source);
    }

    /// Pop exhausted entries until a readable one is on top or the stack is
    /// empty (overall EOF).
    fn settle(&mut self) -> PreprocessResult<()> {
        while let Some(top) = self.entries.last_mut() {
            if top.peek()?.is_some() {
                return Ok(());
            }
            self.end_loc = top.location().clone();
            self.entries.pop();
        }
        Ok(())
    }

    /// Whether the active source holds macro-expansion output.
    ///
    /// Meaningful after a `peek`, which settles the stack.
    pub fn top_is_expansion(&self) -> bool {
        self.entries.last().is_some_and(Source::is_expansion)
    }
}

impl CharStream for SourceStack<'_> {
    fn peek(&mut self) -> PreprocessResult<Option<char>> {
        self.settle()?;
        match self.entries.last_mut() {
            Some(top) => top.peek(),
            None => Ok(None),
        }
    }

    fn advance(&mut self) -> PreprocessResult<()> {
        self.settle()?;
        match self.entries.last_mut() {
            Some(top) => top.advance(),
            None => Ok(()),
        }
    }

    fn location(&self) -> &Location {
        match self.entries.last() {
            Some(top) => top.location(),
            None => &self.end_loc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(stack: &mut SourceStack<'_>) -> String {
        let mut out = String::new();
        while let Some(ch) = stack.bump().unwrap() {
            out.push(ch);
        }
        out
    }

    #[test]
    fn test_single_source() {
        let mut stack = SourceStack::new(Source::str("abc", "t"));
        assert_eq!(drain(&mut stack), "abc");
        assert_eq!(stack.peek().unwrap(), None);
    }

    #[test]
    fn test_pushed_source_read_first() {
        let mut stack = SourceStack::new(Source::str("world", "t"));
        stack.push(Source::buffer(
            String::from("hello "),
            Location::start_of("b"),
        ));
        assert_eq!(drain(&mut stack), "hello world");
    }

    #[test]
    fn test_empty_source_popped_transparently() {
        let mut stack = SourceStack::new(Source::str("x", "t"));
        stack.push(Source::buffer(String::new(), Location::start_of("b")));
        assert_eq!(stack.peek().unwrap(), Some('x'));
        assert!(!stack.top_is_expansion());
    }

    #[test]
    fn test_expansion_tag_visible_after_peek() {
        let mut stack = SourceStack::new(Source::str("x", "t"));
        stack.push(Source::expansion(String::from("y"), Location::start_of("m")));
        stack.peek().unwrap();
        assert!(stack.top_is_expansion());
        stack.advance().unwrap();
        stack.peek().unwrap();
        assert!(!stack.top_is_expansion());
    }
}
