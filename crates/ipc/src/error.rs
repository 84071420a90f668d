//! Transport error types

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Process-level and file-level failures of a single exchange
///
/// All variants are terminal for the exchange that produced them. Retrying is
/// left to the caller.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Engine executable not found: {}", path.display())]
    ExecutableNotFound { path: PathBuf },

    #[error("Engine did not exit within {}ms", after.as_millis())]
    Timeout { after: Duration },

    #[error("Engine failed ({status}): {stderr}")]
    BackendFailure { status: ExitStatus, stderr: String },

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Command line must be a single line: {0:?}")]
    InvalidCommand(String),
}

impl TransportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the engine ran past its time budget
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
