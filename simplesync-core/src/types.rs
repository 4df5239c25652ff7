//! Domain types for a sync run.
//!
//! Everything here is resolved once at startup and never mutated afterwards.
//! Local paths use `PathBuf`; the remote path stays a `String` because it is
//! interpreted by the remote host, not by this machine.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Login name used on the remote host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteUser(pub String);

impl fmt::Display for RemoteUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RemoteUser {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RemoteUser {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl RemoteUser {
    /// The current OS user: `$USER`, then `$LOGNAME`, then the password
    /// database entry for the effective uid.
    pub fn current() -> Result<Self, ConfigError> {
        Self::resolve(|key| std::env::var(key).ok())
    }

    fn resolve(env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        ["USER", "LOGNAME"]
            .into_iter()
            .filter_map(|key| env(key))
            .find(|value| !value.trim().is_empty())
            .or_else(login_name)
            .map(Self)
            .ok_or(ConfigError::UnknownUser)
    }
}

#[cfg(unix)]
fn login_name() -> Option<String> {
    // SAFETY: getpwuid returns null or a pointer into libc-owned storage that
    // stays valid until the next passwd lookup; the name is copied out first.
    unsafe {
        let entry = libc::getpwuid(libc::geteuid());
        if entry.is_null() || (*entry).pw_name.is_null() {
            return None;
        }
        std::ffi::CStr::from_ptr((*entry).pw_name)
            .to_str()
            .ok()
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
    }
}

#[cfg(not(unix))]
fn login_name() -> Option<String> {
    None
}

/// Host name or address of the remote machine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteHost(pub String);

impl fmt::Display for RemoteHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RemoteHost {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RemoteHost {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// SyncTarget
// ---------------------------------------------------------------------------

/// Where to mirror from and to, plus the per-run flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    pub remote_user: RemoteUser,
    pub remote_host: RemoteHost,
    pub remote_port: u16,
    pub remote_path: String,
    pub local_path: PathBuf,
    pub verbose: bool,
    /// Ask the mirror tool to report what it would do without transferring.
    pub dry_run: bool,
}

impl SyncTarget {
    /// Build a target, rejecting values the remote shell could never use.
    pub fn new(
        remote_user: RemoteUser,
        remote_host: RemoteHost,
        remote_port: u16,
        remote_path: impl Into<String>,
        local_path: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let target = Self {
            remote_user,
            remote_host,
            remote_port,
            remote_path: remote_path.into(),
            local_path: local_path.into(),
            verbose: false,
            dry_run: false,
        };
        target.validate()?;
        Ok(target)
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// `user@host:remote_path`, the mirror tool's destination argument.
    pub fn destination(&self) -> String {
        format!(
            "{}@{}:{}",
            self.remote_user, self.remote_host, self.remote_path
        )
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    fn validate(&self) -> Result<(), ConfigError> {
        // A leading dash would be read as an option by the remote shell.
        for (field, value) in [
            ("remote user", &self.remote_user.0),
            ("remote host", &self.remote_host.0),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(field, "must not be empty"));
            }
            if value.starts_with('-') {
                return Err(invalid(field, "must not start with '-'"));
            }
        }
        if self.remote_port == 0 {
            return Err(invalid("remote port", "must be between 1 and 65535"));
        }
        if self.remote_path.trim().is_empty() {
            return Err(invalid("remote path", "must not be empty"));
        }
        if self.local_path.as_os_str().is_empty() {
            return Err(invalid("local path", "must not be empty"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// ExclusionSet
// ---------------------------------------------------------------------------

/// Directory and file patterns that are never transferred nor deleted remotely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    dirs: Vec<String>,
    files: Vec<String>,
}

impl ExclusionSet {
    /// Entries are trimmed and blank entries dropped; order is kept.
    pub fn new<D, F>(dirs: D, files: F) -> Self
    where
        D: IntoIterator,
        D::Item: AsRef<str>,
        F: IntoIterator,
        F::Item: AsRef<str>,
    {
        Self {
            dirs: clean(dirs),
            files: clean(files),
        }
    }

    pub fn dirs(&self) -> &[String] {
        &self.dirs
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.dirs.len() + self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn clean<I>(items: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    items
        .into_iter()
        .map(|item| item.as_ref().trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// ToolSettings
// ---------------------------------------------------------------------------

/// Default control-socket template; ssh expands `~` and the `%` tokens.
pub const DEFAULT_CONTROL_PATH: &str = "~/.ssh/%r@%h:%p_%l";

/// External programs and the multiplexing socket template they share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSettings {
    pub ssh_program: PathBuf,
    pub rsync_program: PathBuf,
    pub control_path: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ssh_program: PathBuf::from("ssh"),
            rsync_program: PathBuf::from("rsync"),
            control_path: DEFAULT_CONTROL_PATH.to_string(),
        }
    }
}
