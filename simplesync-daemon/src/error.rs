use std::path::PathBuf;

use thiserror::Error;

use simplesync_remote::RemoteError;

/// Error surface for the watcher, reactor and lifecycle.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),
}

impl DaemonError {
    /// Whether the error came from failing to start the remote shell.
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            DaemonError::Remote(RemoteError::Spawn { .. } | RemoteError::ExitedEarly { .. })
        )
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
