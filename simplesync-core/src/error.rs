//! Error types for simplesync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while resolving startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file was named explicitly but does not exist.
    #[error("settings file not found at {path}")]
    NotFound { path: PathBuf },

    /// The settings file exists but could not be read or deserialized.
    #[error("failed to parse settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: config::ConfigError,
    },

    /// Neither `--remote-user`, the environment, nor the password database
    /// yielded a user name.
    #[error("cannot determine remote user; pass --remote-user or set $USER")]
    UnknownUser,

    /// A field of the sync target failed validation.
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
