use std::{fmt, io, path::PathBuf};

use bbcov_runtime::StoreError;
use thiserror::Error;

/// Structural defect in a build layout. Nothing is emitted when one is found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildIntegrityError {
    #[error("empty source file path")]
    EmptyFilePath,
    #[error("source file path {file:?} contains a line break")]
    FilePathLineBreak { file: String },
    #[error("source file path {file:?} names a directory")]
    FilePathIsDirectory { file: String },
    #[error("empty function name in {file:?}")]
    EmptyFunctionName { file: String },
    #[error("function name {function:?} in {file:?} contains a line break")]
    FunctionNameLineBreak { file: String, function: String },
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Integrity(#[from] BuildIntegrityError),
    #[error("layout parse error: {0}")]
    Layout(String),
    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type BuildResult<T> = Result<T, BuildError>;

impl BuildError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn layout(details: impl fmt::Display) -> Self {
        Self::Layout(details.to_string())
    }
}

impl From<serde_json::Error> for BuildError {
    fn from(err: serde_json::Error) -> Self {
        BuildError::layout(err)
    }
}

impl From<StoreError> for BuildError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Io { path, source } => BuildError::Io { path, source },
        }
    }
}
