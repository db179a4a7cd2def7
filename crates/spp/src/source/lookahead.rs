//! Bounded lookahead window over the source stack

use std::collections::VecDeque;

use super::{is_ident_continue, is_ident_start, CharStream, Source, SourceStack};
use crate::common::{Location, PreprocessError, PreprocessResult};

/// FIFO window over a [`SourceStack`] giving bounded lookahead, un-consume
/// (push-front) and the literal/identifier/comment read helpers the scanner
/// needs.
///
/// Invariant: characters pulled from the stack and not yet handed to the
/// consumer live in the FIFO; nothing is ever pushed back into the stack
/// itself. Each entry keeps its own expansion-origin flag, since one window
/// may span the boundary between an expansion source and the text below it.
pub struct Lookahead<'src> {
    stack: SourceStack<'src>,
    fifo: VecDeque<(char, bool)>,
}

impl<'src> Lookahead<'src> {
    pub fn new(root: Source<'src>) -> Self {
        Self {
            stack: SourceStack::new(root),
            fifo: VecDeque::new(),
        }
    }

    /// Pull characters until `n` are buffered or the input ends. Returns the
    /// number actually buffered.
    pub fn fill(&mut self, n: usize) -> PreprocessResult<usize> {
        while self.fifo.len() < n {
            self.stack.peek()?;
            let from_expansion = self.stack.top_is_expansion();
            let Some(ch) = self.stack.bump()? else {
                break;
            };
            self.fifo.push_back((ch, from_expansion));
        }
        Ok(self.fifo.len())
    }

    /// Character `n` positions ahead of the cursor, without consuming.
    pub fn peek_at(&mut self, n: usize) -> PreprocessResult<Option<char>> {
        self.fill(n + 1)?;
        Ok(self.fifo.get(n).map(|&(ch, _)| ch))
    }

    /// Compare upcoming characters against a literal without consuming.
    pub fn starts_with(&mut self, literal: &str) -> PreprocessResult<bool> {
        for (n, expected) in literal.chars().enumerate() {
            if self.peek_at(n)? != Some(expected) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Un-consume one character; it will be returned before anything else.
    /// The character shares the origin of whatever the cursor sits on.
    pub fn push_front(&mut self, ch: char) {
        let from_expansion = self.fifo.front().is_some_and(|&(_, e)| e);
        self.fifo.push_front((ch, from_expansion));
    }

    /// Push a source under the lookahead window.
    ///
    /// Buffered characters logically follow the pushed source's text, so a
    /// non-empty FIFO is first re-buffered as a source of its own below the
    /// new one.
    pub fn push_source(&mut self, source: Source<'src>) {
        if !self.fifo.is_empty() {
            let rest: String = self.fifo.drain(..).map(|(ch, _)| ch).collect();
            self.stack
                .push(Source::buffer(rest, self.stack.location().clone()));
        }
        self.stack.push(source);
    }

    /// Whether the next character comes from macro-expansion output.
    pub fn in_expansion(&mut self) -> PreprocessResult<bool> {
        if let Some(&(_, from_expansion)) = self.fifo.front() {
            return Ok(from_expansion);
        }
        self.stack.peek()?;
        Ok(self.stack.top_is_expansion())
    }

    /// Consume a maximal identifier run; empty if the cursor is not at an
    /// identifier start.
    pub fn read_identifier(&mut self) -> PreprocessResult<String> {
        let mut name = String::new();
        if let Some(ch) = self.peek()? {
            if !is_ident_start(ch) {
                return Ok(name);
            }
        }
        while let Some(ch) = self.peek()? {
            if !is_ident_continue(ch) {
                break;
            }
            name.push(ch);
            self.advance()?;
        }
        Ok(name)
    }

    /// Consume a `"..."` literal including both quotes, honoring `\"` and
    /// `\\` escapes, and return the matched run.
    pub fn read_string_literal(&mut self) -> PreprocessResult<String> {
        self.read_quoted('"', "unterminated string literal")
    }

    /// Consume a `'...'` literal including both quotes.
    pub fn read_char_literal(&mut self) -> PreprocessResult<String> {
        self.read_quoted('\'', "unterminated character literal")
    }

    fn read_quoted(&mut self, quote: char, eof_message: &str) -> PreprocessResult<String> {
        let at = self.location().clone();
        let mut text = String::new();
        match self.bump()? {
            Some(ch) if ch == quote => text.push(ch),
            _ => return Err(PreprocessError::unexpected_eof(eof_message, at)),
        }
        loop {
            match self.bump()? {
                None => return Err(PreprocessError::unexpected_eof(eof_message, at)),
                Some('\\') => {
                    text.push('\\');
                    match self.bump()? {
                        Some(escaped) => text.push(escaped),
                        None => {
                            return Err(PreprocessError::unexpected_eof(eof_message, at));
                        }
                    }
                }
                Some(ch) => {
                    text.push(ch);
                    if ch == quote {
                        return Ok(text);
                    }
                }
            }
        }
    }

    /// Consume a `//` comment up to (not including) the newline.
    pub fn read_line_comment(&mut self) -> PreprocessResult<String> {
        let mut text = String::new();
        while let Some(ch) = self.peek()? {
            if ch == '\n' {
                break;
            }
            text.push(ch);
            self.advance()?;
        }
        Ok(text)
    }

    /// Consume a `/* ... */` comment including both delimiters.
    pub fn read_block_comment(&mut self) -> PreprocessResult<String> {
        let at = self.location().clone();
        let mut text = String::new();
        for _ in 0..2 {
            match self.bump()? {
                Some(ch) => text.push(ch),
                None => {
                    return Err(PreprocessError::unexpected_eof("unterminated comment", at));
                }
            }
        }
        loop {
            match self.bump()? {
                None => {
                    return Err(PreprocessError::unexpected_eof("unterminated comment", at));
                }
                Some(ch) => {
                    text.push(ch);
                    if ch == '/' && text.ends_with("*/") {
                        return Ok(text);
                    }
                }
            }
        }
    }
}

impl CharStream for Lookahead<'_> {
    fn peek(&mut self) -> PreprocessResult<Option<char>> {
        if let Some(&(ch, _)) = self.fifo.front() {
            return Ok(Some(ch));
        }
        self.stack.peek()
    }

    fn advance(&mut self) -> PreprocessResult<()> {
        if self.fifo.pop_front().is_some() {
            return Ok(());
        }
        self.stack.advance()
    }

    fn location(&self) -> &Location {
        self.stack.location()
    }
}
