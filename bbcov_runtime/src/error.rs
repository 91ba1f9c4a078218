use std::{fmt, io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A store line that could not be used.
///
/// Never fatal during a merge. When it stops parsing, entries read before
/// `line` are kept and the remainder of the file is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {reason}")]
pub struct StoreParseInconsistency {
    /// One-based line number of the offending line.
    pub line: usize,
    pub reason: ParseStopReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseStopReason {
    /// No separator, or only one, so the line has no two payload tokens.
    MissingTokens,
    /// Block line whose index is not a non-negative integer.
    InvalidIndex(String),
    /// Block index above [`crate::flags::MAX_BLOCK_INDEX`]. Only that line is
    /// skipped; parsing continues.
    IndexOutOfRange(String),
}

impl fmt::Display for ParseStopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseStopReason::MissingTokens => write!(f, "expected two tokens after the marker"),
            ParseStopReason::InvalidIndex(token) => write!(f, "invalid block index {token:?}"),
            ParseStopReason::IndexOutOfRange(token) => {
                write!(f, "block index {token} above the supported maximum")
            }
        }
    }
}
