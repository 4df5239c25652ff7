//! Error types for simplesync-remote.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from starting or driving the external ssh and rsync processes.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The remote shell could not be started at all. Fatal for the run.
    #[error("failed to start remote shell {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The remote shell exited before its pid could be read.
    #[error("remote shell {program} exited immediately after start")]
    ExitedEarly { program: PathBuf },

    /// The mirror tool could not be started or waited on.
    #[error("failed to run mirror tool {program}: {source}")]
    Mirror {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
