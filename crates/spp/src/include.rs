//! Include resolution

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::common::Location;
use crate::source::Source;

/// Failure to resolve an include spec; the engine attaches the directive
/// location.
#[derive(Error, Debug)]
pub enum IncludeError {
    #[error("cannot find include file '{spec}'")]
    Missing { spec: String },

    #[error("{message}")]
    Invalid { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolves an include spec to a new character source.
///
/// `angled` distinguishes `#include <spec>` (search paths only) from
/// `#include "spec"` (relative to the including file first). `Ok(None)`
/// means the resolver is configured to ignore a missing include and the
/// directive becomes a no-op.
pub trait IncludeResolver {
    fn resolve(
        &mut self,
        spec: &str,
        from: &Location,
        angled: bool,
    ) -> Result<Option<Source<'static>>, IncludeError>;
}

/// Filesystem resolver over a list of search paths.
#[derive(Debug, Default)]
pub struct FileIncludeResolver {
    search_paths: Vec<PathBuf>,
    ignore_missing: bool,
}

impl FileIncludeResolver {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self {
            search_paths,
            ignore_missing: false,
        }
    }

    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.push(path.into());
    }

    /// Turn missing includes into no-ops instead of errors.
    pub fn ignore_missing(mut self, ignore: bool) -> Self {
        self.ignore_missing = ignore;
        self
    }
}

impl IncludeResolver for FileIncludeResolver {
    fn resolve(
        &mut self,
        spec: &str,
        from: &Location,
        angled: bool,
    ) -> Result<Option<Source<'static>>, IncludeError> {
        let mut candidates = Vec::new();
        if !angled {
            // "..." searches relative to the including file first
            if let Some(dir) = Path::new(&from.source_name).parent() {
                candidates.push(dir.join(spec));
            }
        }
        candidates.extend(self.search_paths.iter().map(|path| path.join(spec)));

        for candidate in candidates {
            if candidate.is_file() {
                return Ok(Some(Source::file(&candidate)?));
            }
        }
        if self.ignore_missing {
            Ok(None)
        } else {
            Err(IncludeError::Missing { spec: spec.into() })
        }
    }
}
