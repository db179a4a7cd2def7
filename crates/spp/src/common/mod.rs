//! Common infrastructure shared across the preprocessor modules

mod error;
mod location;

pub use error::{DiagnosticReporter, PreprocessError, PreprocessResult};
pub use location::Location;
