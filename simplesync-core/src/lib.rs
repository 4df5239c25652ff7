//! simplesync core library: sync targets, exclusions and settings loading.
//!
//! - [`types`]: newtypes and the immutable startup configuration
//! - [`error`]: [`ConfigError`]
//! - [`settings`]: reading the exclusion lists and tool overrides from disk

pub mod error;
pub mod settings;
pub mod types;

pub use error::ConfigError;
pub use settings::{Settings, DEFAULT_SETTINGS_FILE};
pub use types::{ExclusionSet, RemoteHost, RemoteUser, SyncTarget, ToolSettings};
