//! Error types and diagnostic reporting

use std::collections::HashMap;

use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use thiserror::Error;

use super::Location;

/// Preprocessing error with the triggering source location.
///
/// Every variant aborts the whole pass; the engine performs no recovery or
/// resynchronization after the first error.
#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("invalid identifier at {at}: {message}")]
    InvalidIdentifier { message: String, at: Location },

    #[error("invalid macro definition at {at}: {message}")]
    InvalidMacroDefinition { message: String, at: Location },

    #[error("macro '{name}' redefined at {at} (first defined at {first})")]
    MacroAlreadyDefined {
        name: String,
        at: Location,
        first: Location,
    },

    #[error("macro '{name}' expects {expected} argument(s), found {found} at {at}")]
    ParameterCountMismatch {
        name: String,
        expected: usize,
        found: usize,
        at: Location,
    },

    #[error("unknown preprocessor command '#{name}' at {at}")]
    UnknownPreprocessorCommand { name: String, at: Location },

    #[error("invalid #include at {at}: {message}")]
    InvalidInclude { message: String, at: Location },

    #[error("cannot find include file '{spec}' at {at}")]
    MissingInclude { spec: String, at: Location },

    #[error("unmatched '#{directive}' at {at}")]
    UnmatchedPreprocessorDirective { directive: String, at: Location },

    #[error("unexpected end of file at {at}: {message}")]
    UnexpectedEndOfFile { message: String, at: Location },

    #[error("expression error at {at}: {message}")]
    ExpressionSyntax { message: String, at: Location },

    #[error("embedded code block '{lang}' at {at} but no executor is configured")]
    EmbeddedCodeNotSupported { lang: String, at: Location },

    #[error("embedded code error at {at}: {message}")]
    EmbeddedCodeSyntax { message: String, at: Location },

    #[error("#error at {at}: {message}")]
    ErrorDirective { message: String, at: Location },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PreprocessError {
    pub fn invalid_identifier(message: impl Into<String>, at: Location) -> Self {
        Self::InvalidIdentifier {
            message: message.into(),
            at,
        }
    }

    pub fn invalid_macro_definition(message: impl Into<String>, at: Location) -> Self {
        Self::InvalidMacroDefinition {
            message: message.into(),
            at,
        }
    }

    pub fn unknown_command(name: impl Into<String>, at: Location) -> Self {
        Self::UnknownPreprocessorCommand {
            name: name.into(),
            at,
        }
    }

    pub fn invalid_include(message: impl Into<String>, at: Location) -> Self {
        Self::InvalidInclude {
            message: message.into(),
            at,
        }
    }

    pub fn unmatched(directive: impl Into<String>, at: Location) -> Self {
        Self::UnmatchedPreprocessorDirective {
            directive: directive.into(),
            at,
        }
    }

    pub fn unexpected_eof(message: impl Into<String>, at: Location) -> Self {
        Self::UnexpectedEndOfFile {
            message: message.into(),
            at,
        }
    }

    pub fn expression_syntax(message: impl Into<String>, at: Location) -> Self {
        Self::ExpressionSyntax {
            message: message.into(),
            at,
        }
    }

    /// Location the error was raised at, if the variant carries one.
    pub fn location(&self) -> Option<&Location> {
        match self {
            Self::InvalidIdentifier { at, .. }
            | Self::InvalidMacroDefinition { at, .. }
            | Self::MacroAlreadyDefined { at, .. }
            | Self::ParameterCountMismatch { at, .. }
            | Self::UnknownPreprocessorCommand { at, .. }
            | Self::InvalidInclude { at, .. }
            | Self::MissingInclude { at, .. }
            | Self::UnmatchedPreprocessorDirective { at, .. }
            | Self::UnexpectedEndOfFile { at, .. }
            | Self::ExpressionSyntax { at, .. }
            | Self::EmbeddedCodeNotSupported { at, .. }
            | Self::EmbeddedCodeSyntax { at, .. }
            | Self::ErrorDirective { at, .. } => Some(at),
            Self::Io(_) => None,
        }
    }
}

pub type PreprocessResult<T> = Result<T, PreprocessError>;

/// Diagnostic reporter for pretty error output
pub struct DiagnosticReporter {
    files: SimpleFiles<String, String>,
    ids: HashMap<String, usize>,
    writer: StandardStream,
    config: term::Config,
}

impl DiagnosticReporter {
    pub fn new() -> Self {
        Self {
            files: SimpleFiles::new(),
            ids: HashMap::new(),
            writer: StandardStream::stderr(ColorChoice::Auto),
            config: term::Config::default(),
        }
    }

    /// Register a source file so errors located in it get an annotated snippet.
    pub fn add_file(&mut self, name: impl Into<String>, source: impl Into<String>) -> usize {
        let name = name.into();
        let file_id = self.files.add(name.clone(), source.into());
        self.ids.insert(name, file_id);
        file_id
    }

    pub fn report(&self, error: &PreprocessError) {
        let diagnostic = self.to_diagnostic(error);
        let _ = term::emit(
            &mut self.writer.lock(),
            &self.config,
            &self.files,
            &diagnostic,
        );
    }

    fn to_diagnostic(&self, error: &PreprocessError) -> Diagnostic<usize> {
        if let Some(at) = error.location() {
            if let Some(&file_id) = self.ids.get(&at.source_name) {
                if let Ok(file) = self.files.get(file_id) {
                    let offset = byte_offset(file.source(), at.line, at.column);
                    return Diagnostic::error()
                        .with_message("preprocessing error")
                        .with_labels(vec![
                            Label::primary(file_id, offset..offset + 1)
                                .with_message(error.to_string()),
                        ]);
                }
            }
        }
        Diagnostic::error().with_message(error.to_string())
    }
}

impl Default for DiagnosticReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Byte offset of a line/column position, following the same advance rule
/// as [`Location`].
fn byte_offset(source: &str, line: u32, column: u32) -> usize {
    let mut cur = Location::start_of("");
    for (offset, ch) in source.char_indices() {
        if cur.line == line && cur.column == column {
            return offset;
        }
        cur.advance(ch);
    }
    source.len().saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_offset_first_line() {
        assert_eq!(byte_offset("abc\ndef", 1, 2), 2);
    }

    #[test]
    fn test_byte_offset_second_line() {
        assert_eq!(byte_offset("abc\ndef", 2, 1), 5);
    }

    #[test]
    fn test_error_location() {
        let at = Location::start_of("x.spp");
        let err = PreprocessError::unknown_command("frobnicate", at.clone());
        assert_eq!(err.location(), Some(&at));
        assert!(err.to_string().contains("frobnicate"));
    }
}
