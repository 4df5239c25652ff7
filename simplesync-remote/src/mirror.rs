//! One-directional mirror passes over the multiplexed remote shell.
//!
//! The command is assembled as an argument vector and executed without a
//! local shell. The only string that still needs quoting is the `-e` remote
//! shell command, which rsync splits itself.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::process::Command;

use simplesync_core::{ExclusionSet, SyncTarget, ToolSettings};

use crate::error::RemoteError;
use crate::session::RemoteSession;

/// Outcome of one mirror pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorReport {
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    /// `None` when the tool was ended by a signal.
    pub exit_code: Option<i32>,
    pub success: bool,
}

/// Builds and runs the mirror command for a fixed target and exclusion set.
#[derive(Debug, Clone)]
pub struct MirrorInvoker {
    program: PathBuf,
    ssh_program: PathBuf,
    remote_port: u16,
    local_path: PathBuf,
    destination: String,
    verbose: bool,
    dry_run: bool,
    exclude_args: Vec<String>,
}

impl MirrorInvoker {
    pub fn new(target: &SyncTarget, exclusions: &ExclusionSet, tools: &ToolSettings) -> Self {
        let exclude_args = exclusions
            .dirs()
            .iter()
            .chain(exclusions.files())
            .map(|pattern| format!("--exclude={pattern}"))
            .collect();

        Self {
            program: tools.rsync_program.clone(),
            ssh_program: tools.ssh_program.clone(),
            remote_port: target.remote_port,
            local_path: target.local_path.clone(),
            destination: target.destination(),
            verbose: target.verbose,
            dry_run: target.dry_run,
            exclude_args,
        }
    }

    /// Exclusion flags, directories first. Fixed for the invoker's lifetime.
    pub fn exclude_args(&self) -> &[String] {
        &self.exclude_args
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Value of `-e`: the same ssh, port and control socket as the session.
    pub fn remote_shell_command(&self, control_path: &str) -> String {
        let words = [
            self.ssh_program.to_string_lossy().into_owned(),
            "-p".to_string(),
            self.remote_port.to_string(),
            "-o".to_string(),
            "LogLevel=error".to_string(),
            "-o".to_string(),
            format!("ControlPath={control_path}"),
        ];
        words
            .iter()
            .map(|word| quote_rsync_word(word))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Full argument vector for one pass, without the program name.
    pub fn command_args(&self, control_path: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-azrP".into(), "--no-motd".into()];
        if self.verbose {
            args.push("--verbose".into());
        }
        args.extend(
            ["-i", "--out-format=%i %n%L", "--delete"]
                .into_iter()
                .map(OsString::from),
        );
        if self.dry_run {
            args.push("--dry-run".into());
        }
        args.push("-e".into());
        args.push(self.remote_shell_command(control_path).into());
        args.extend(self.exclude_args.iter().map(OsString::from));
        args.push(self.local_path.clone().into_os_string());
        args.push(self.destination.clone().into());
        args
    }

    /// Human-readable form of the command, for verbose output.
    pub fn render_command(&self, control_path: &str) -> String {
        std::iter::once(self.program.clone().into_os_string())
            .chain(self.command_args(control_path))
            .map(|arg| quote_rsync_word(&arg.to_string_lossy()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run one pass against `session` and wait for the tool to exit.
    ///
    /// A non-zero exit is reported in the [`MirrorReport`], not as an error.
    pub async fn run(&self, session: &RemoteSession) -> Result<MirrorReport, RemoteError> {
        let control_path = session.control_path();
        if self.verbose {
            tracing::info!(
                command = %self.render_command(control_path),
                "running mirror pass",
            );
        }

        let started_at = Utc::now();
        let started = Instant::now();
        let status = Command::new(&self.program)
            .args(self.command_args(control_path))
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|source| RemoteError::Mirror {
                program: self.program.clone(),
                source,
            })?;

        Ok(MirrorReport {
            started_at,
            duration: started.elapsed(),
            exit_code: status.code(),
            success: status.success(),
        })
    }
}

/// Quote one word of an rsync `-e` command.
///
/// rsync splits on spaces and honours single quotes, where a doubled quote
/// stands for a literal one. Backslashes have no special meaning.
pub fn quote_rsync_word(word: &str) -> String {
    if !word.is_empty() && !word.contains([' ', '\'', '"']) {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', "''"))
}
