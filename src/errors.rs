//! Fatal error types for the digestion pipeline.
//!
//! Only conditions that abort a whole run live here. Recoverable conditions
//! (malformed JSON, cache load/save failures, invalid tag patterns) are
//! absorbed where they occur and surface as diagnostics, never as values of
//! this type.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Terminal failure of a pipeline run.
///
/// A run produces either a sorted report or exactly one of these; a partial
/// tree scan is never reported as a complete one.
#[derive(Debug)]
#[non_exhaustive]
pub enum PipelineError {
    /// Directory traversal failed (permission, broken path, I/O).
    Walk(ignore::Error),
    /// Traversal was abandoned because the run was canceled while the
    /// walker was blocked emitting a path.
    WalkCanceled,
    /// A regular file could not be read.
    Read { path: PathBuf, source: io::Error },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Walk(err) => write!(f, "directory walk failed: {err}"),
            Self::WalkCanceled => write!(f, "walk canceled"),
            Self::Read { path, source } => {
                write!(f, "failed to read '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Walk(err) => Some(err),
            Self::Read { source, .. } => Some(source),
            _ => None,
        }
    }
}
