//! Source positions for diagnostics and macro definition records

use std::fmt;

/// Position of the cursor within one character source.
///
/// Mutated in place as characters are consumed; immutable snapshots are
/// cloned into errors and macro definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub source_name: String,
    pub line: u32,
    pub column: u32,
}

impl Location {
    /// Position at the start of a named source.
    pub fn start_of(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            line: 1,
            column: 0,
        }
    }

    /// Advance past one consumed character.
    ///
    /// `\n` starts a new line; NUL does not move the column.
    pub fn advance(&mut self, ch: char) {
        if ch == '\n' {
            self.line += 1;
            self.column = 0;
        } else if ch != '\0' {
            self.column += 1;
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source_name, self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_tracks_lines_and_columns() {
        let mut loc = Location::start_of("test.spp");
        loc.advance('a');
        loc.advance('b');
        assert_eq!((loc.line, loc.column), (1, 2));
        loc.advance('\n');
        assert_eq!((loc.line, loc.column), (2, 0));
        loc.advance('x');
        assert_eq!((loc.line, loc.column), (2, 1));
    }

    #[test]
    fn test_nul_does_not_move() {
        let mut loc = Location::start_of("test.spp");
        loc.advance('\0');
        assert_eq!((loc.line, loc.column), (1, 0));
    }

    #[test]
    fn test_display() {
        let mut loc = Location::start_of("a.spp");
        loc.advance('\n');
        assert_eq!(loc.to_string(), "a.spp:2:0");
    }
}
