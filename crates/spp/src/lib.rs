//! SPP - Streaming macro preprocessor for script sources
//!
//! A pull-based preprocessor: the consumer asks for one output character at
//! a time and the engine lexes, expands macros, evaluates conditionals and
//! splices includes lazily behind that request.
//!
//! ## Architecture
//!
//! The crate is organized into:
//! - **Source** (`source/`): Character sources, the source stack and lookahead
//! - **Macros** (`macros/`): Macro table, definition parsing and expansion
//! - **Cond** (`cond/`): Conditional-compilation branch tracking
//! - **Eval** (`eval/`): The `#if`/`#eval` expression mini-language
//! - **Engine** (`engine/`): Directive dispatch and the scanner loop
//! - **Common** (`common/`): Shared infrastructure (errors, locations)

pub mod common;
pub mod cond;
pub mod embedded;
pub mod engine;
pub mod eval;
pub mod include;
pub mod macros;
pub mod source;

// Re-exports for convenience
pub use common::{DiagnosticReporter, Location, PreprocessError, PreprocessResult};
pub use embedded::{EmbeddedCodeExecutor, ExecError, NoopExecutor};
pub use engine::{preprocess, Preprocessor};
pub use eval::{DefaultEvaluator, EvalError, ExpressionEvaluator};
pub use include::{FileIncludeResolver, IncludeError, IncludeResolver};
pub use source::{CharStream, Source};
