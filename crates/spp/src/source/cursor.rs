//! Concrete character source variants

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use super::CharStream;
use crate::common::{Location, PreprocessResult};

/// One character source.
///
/// The variants cover borrowed in-memory text, borrowed byte ranges, files
/// read incrementally, owned replay buffers and macro-expansion output. The
/// expansion tag is what lets the scanner suppress re-expansion of text a
/// macro already produced.
pub enum Source<'src> {
    Str(StrCursor<'src>),
    Range(RangeCursor<'src>),
    File(FileCursor),
    Buffer(BufferCursor),
    Expansion(BufferCursor),
}

impl<'src> Source<'src> {
    /// Source over borrowed text.
    pub fn str(text: &'src str, name: impl Into<String>) -> Self {
        Self::Str(StrCursor {
            text,
            pos: 0,
            loc: Location::start_of(name),
        })
    }

    /// Source over a borrowed byte range, decoded as UTF-8 on the fly.
    pub fn bytes(bytes: &'src [u8], name: impl Into<String>) -> Self {
        Self::Range(RangeCursor {
            bytes,
            pos: 0,
            loc: Location::start_of(name),
        })
    }

    /// Source reading a file one character at a time.
    pub fn file(path: impl AsRef<Path>) -> io::Result<Source<'static>> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Ok(Source::File(FileCursor {
            reader: BufReader::new(file),
            pending: None,
            at_eof: false,
            loc: Location::start_of(path.display().to_string()),
        }))
    }

    /// Owned text replayed at the given location (lit captures, re-buffered
    /// lookahead).
    pub fn buffer(text: String, at: Location) -> Source<'static> {
        Source::Buffer(BufferCursor { text, pos: 0, loc: at })
    }

    /// Owned macro-expansion output, tagged as expansion-origin.
    pub fn expansion(text: String, at: Location) -> Source<'static> {
        Source::Expansion(BufferCursor { text, pos: 0, loc: at })
    }

    /// True for sources holding already-expanded macro output.
    pub fn is_expansion(&self) -> bool {
        matches!(self, Self::Expansion(_))
    }
}

impl CharStream for Source<'_> {
    fn peek(&mut self) -> PreprocessResult<Option<char>> {
        match self {
            Self::Str(c) => Ok(c.peek()),
            Self::Range(c) => c.peek(),
            Self::File(c) => c.peek(),
            Self::Buffer(c) | Self::Expansion(c) => Ok(c.peek()),
        }
    }

    fn advance(&mut self) -> PreprocessResult<()> {
        match self {
            Self::Str(c) => {
                c.advance();
                Ok(())
            }
            Self::Range(c) => c.advance(),
            Self::File(c) => c.advance(),
            Self::Buffer(c) | Self::Expansion(c) => {
                c.advance();
                Ok(())
            }
        }
    }

    fn location(&self) -> &Location {
        match self {
            Self::Str(c) => &c.loc,
            Self::Range(c) => &c.loc,
            Self::File(c) => &c.loc,
            Self::Buffer(c) | Self::Expansion(c) => &c.loc,
        }
    }
}

/// Cursor over borrowed text.
pub struct StrCursor<'src> {
    text: &'src str,
    pos: usize,
    loc: Location,
}

impl StrCursor<'_> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.peek() {
            self.pos += ch.len_utf8();
            self.loc.advance(ch);
        }
    }
}

/// Cursor over a borrowed byte range (begin/end, not NUL-terminated).
pub struct RangeCursor<'src> {
    bytes: &'src [u8],
    pos: usize,
    loc: Location,
}

impl RangeCursor<'_> {
    fn decode(&self) -> PreprocessResult<Option<char>> {
        let rest = &self.bytes[self.pos..];
        if rest.is_empty() {
            return Ok(None);
        }
        let width = utf8_width(rest[0]).ok_or_else(invalid_utf8)?;
        let chunk = rest.get(..width).ok_or_else(invalid_utf8)?;
        let text = std::str::from_utf8(chunk).map_err(|_| invalid_utf8())?;
        Ok(text.chars().next())
    }

    fn peek(&mut self) -> PreprocessResult<Option<char>> {
        self.decode()
    }

    fn advance(&mut self) -> PreprocessResult<()> {
        if let Some(ch) = self.decode()? {
            self.pos += ch.len_utf8();
            self.loc.advance(ch);
        }
        Ok(())
    }
}

/// Cursor reading a file incrementally, one decoded character of lookahead.
pub struct FileCursor {
    reader: BufReader<File>,
    pending: Option<char>,
    at_eof: bool,
    loc: Location,
}

impl FileCursor {
    fn fill(&mut self) -> PreprocessResult<()> {
        if self.pending.is_some() || self.at_eof {
            return Ok(());
        }
        let mut buf = [0u8; 4];
        if self.reader.read(&mut buf[..1])? == 0 {
            self.at_eof = true;
            return Ok(());
        }
        let width = utf8_width(buf[0]).ok_or_else(invalid_utf8)?;
        if width > 1 {
            self.reader.read_exact(&mut buf[1..width])?;
        }
        let text = std::str::from_utf8(&buf[..width]).map_err(|_| invalid_utf8())?;
        self.pending = text.chars().next();
        Ok(())
    }

    fn peek(&mut self) -> PreprocessResult<Option<char>> {
        self.fill()?;
        Ok(self.pending)
    }

    fn advance(&mut self) -> PreprocessResult<()> {
        self.fill()?;
        if let Some(ch) = self.pending.take() {
            self.loc.advance(ch);
        }
        Ok(())
    }
}

/// Cursor over owned text.
pub struct BufferCursor {
    text: String,
    pos: usize,
    loc: Location,
}

impl BufferCursor {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.peek() {
            self.pos += ch.len_utf8();
            self.loc.advance(ch);
        }
    }
}

/// Byte length of a UTF-8 sequence given its leading byte.
fn utf8_width(leading: u8) -> Option<usize> {
    match leading {
        0x00..=0x7F => Some(1),
        0xC0..=0xDF => Some(2),
        0xE0..=0xEF => Some(3),
        0xF0..=0xF7 => Some(4),
        _ => None,
    }
}

fn invalid_utf8() -> crate::common::PreprocessError {
    io::Error::new(io::ErrorKind::InvalidData, "invalid UTF-8 in input").into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_str_cursor() {
        let mut src = Source::str("ab", "t");
        assert_eq!(src.peek().unwrap(), Some('a'));
        assert_eq!(src.peek().unwrap(), Some('a'));
        src.advance().unwrap();
        assert_eq!(src.bump().unwrap(), Some('b'));
        assert_eq!(src.peek().unwrap(), None);
    }

    #[test]
    fn test_range_cursor_utf8() {
        let bytes = "aé".as_bytes();
        let mut src = Source::bytes(bytes, "t");
        assert_eq!(src.bump().unwrap(), Some('a'));
        assert_eq!(src.bump().unwrap(), Some('é'));
        assert_eq!(src.bump().unwrap(), None);
    }

    #[test]
    fn test_location_ticks_on_advance_only() {
        let mut src = Source::str("a\nb", "t");
        src.peek().unwrap();
        assert_eq!(src.location().column, 0);
        src.advance().unwrap();
        src.advance().unwrap();
        assert_eq!(src.location().line, 2);
    }

    #[test]
    fn test_expansion_tag() {
        let at = Location::start_of("t");
        assert!(Source::expansion(String::from("x"), at.clone()).is_expansion());
        assert!(!Source::buffer(String::from("x"), at).is_expansion());
    }
}
