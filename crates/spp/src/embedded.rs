//! Embedded foreign-code execution

use thiserror::Error;

use crate::common::Location;

/// Failure inside an embedded code block; the engine attaches the block
/// location.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ExecError {
    message: String,
}

impl ExecError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Executes a `#embedded(lang) ... #end` block and returns its textual
/// output, which the engine splices back into the stream.
pub trait EmbeddedCodeExecutor {
    fn execute(&mut self, lang: &str, code: &str, at: &Location) -> Result<String, ExecError>;
}

/// Executor that swallows every block.
///
/// Callers that want `#embedded` to be ignored must install this explicitly;
/// with no executor configured the directive is fatal.
#[derive(Debug, Default)]
pub struct NoopExecutor;

impl EmbeddedCodeExecutor for NoopExecutor {
    fn execute(&mut self, _lang: &str, _code: &str, _at: &Location) -> Result<String, ExecError> {
        Ok(String::new())
    }
}
