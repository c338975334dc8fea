use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Environment operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterOp {
    Reset,
    Step,
    CloneState,
    RestoreState,
    Close,
}

impl fmt::Display for AdapterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AdapterOp::Reset => "reset",
            AdapterOp::Step => "step",
            AdapterOp::CloneState => "clone-state",
            AdapterOp::RestoreState => "restore-state",
            AdapterOp::Close => "close",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("environment {op} failed")]
pub struct AdapterError {
    pub op: AdapterOp,
    #[source]
    pub source: anyhow::Error,
}

/// Tags a backend failure with the operation that produced it.
pub trait AdapterContext<T> {
    fn adapter(self, op: AdapterOp) -> Result<T, AdapterError>;
}

impl<T> AdapterContext<T> for anyhow::Result<T> {
    fn adapter(self, op: AdapterOp) -> Result<T, AdapterError> {
        self.map_err(|source| AdapterError { op, source })
    }
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("i/o error at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode image {path}")]
    Image {
        path: PathBuf,
        #[source]
        source: png::EncodingError,
    },
    #[error("failed to write trajectory table {path}")]
    Table {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("frame {path} has {actual} bytes, expected {expected}")]
    FrameSize {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },
}

impl PersistenceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PersistenceError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("agent failed")]
    Agent(#[source] anyhow::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
}
