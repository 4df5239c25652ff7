//! Command-line arguments and their resolution into a sync target.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;

use simplesync_core::{
    settings, RemoteHost, RemoteUser, Settings, SyncTarget, DEFAULT_SETTINGS_FILE,
};
use simplesync_daemon::{init_tracing, start_blocking, LogFormat, RunMode};

/// Exit status when `--once` ran but the mirror pass failed.
const PASS_FAILED: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "simplesync",
    version,
    about = "Mirror a local directory to a remote host whenever it changes",
    long_about = None,
)]
pub struct SyncArgs {
    /// Remote user. Defaults to the current local user.
    #[arg(short = 'u', long, visible_alias = "remoteuser")]
    pub remote_user: Option<String>,

    /// Remote server host name or IP.
    #[arg(short = 's', long, visible_alias = "remoteserver")]
    pub remote_server: String,

    /// Remote SSH port.
    #[arg(short = 'p', long, visible_alias = "remoteport", default_value_t = 22)]
    pub remote_port: u16,

    /// Destination path on the remote server.
    #[arg(short = 'r', long, visible_alias = "remotepath")]
    pub remote_path: String,

    /// Local directory to mirror. Defaults to the current directory.
    #[arg(short = 'l', long, visible_alias = "localpath")]
    pub local_path: Option<PathBuf>,

    /// Print change events and every mirror command.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Settings file with ignored_dirs / ignored_files [default: simplesync.cfg].
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Run the initial pass only, then exit.
    #[arg(long)]
    pub once: bool,

    /// Let the mirror tool report changes without transferring anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit log lines as JSON.
    #[arg(long)]
    pub log_json: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<ExitCode> {
        let format = if self.log_json {
            LogFormat::Json
        } else {
            LogFormat::Text
        };
        init_tracing(self.verbose, format);

        let settings = self.load_settings()?;
        let target = self.target()?;
        let mode = if self.once {
            RunMode::Once
        } else {
            RunMode::Watch
        };

        let host = target.remote_host.clone();
        let report = match start_blocking(target, settings, mode) {
            Ok(report) => report,
            Err(err) => {
                if err.is_connection_failure() {
                    tracing::error!(%host, "failed to establish SSH connection");
                }
                return Err(err).context("sync failed");
            }
        };
        if self.once && !report.all_passes_succeeded() {
            return Ok(ExitCode::from(PASS_FAILED));
        }
        Ok(ExitCode::SUCCESS)
    }

    fn load_settings(&self) -> Result<Settings> {
        if let Some(path) = &self.config {
            return settings::load(path)
                .with_context(|| format!("failed to load settings from {}", path.display()));
        }

        let path = PathBuf::from(DEFAULT_SETTINGS_FILE);
        let loaded = settings::load_optional(&path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?;
        Ok(loaded.unwrap_or_else(|| {
            tracing::warn!(
                path = %path.display(),
                "settings file not found; syncing without exclusions",
            );
            Settings::default()
        }))
    }

    fn target(&self) -> Result<SyncTarget> {
        let user = match &self.remote_user {
            Some(user) => RemoteUser::from(user.as_str()),
            None => RemoteUser::current()?,
        };
        let local = match &self.local_path {
            Some(path) => path.clone(),
            None => std::env::current_dir().context("could not determine current directory")?,
        };
        if !local.exists() {
            bail!("local path {} does not exist", local.display());
        }

        let target = SyncTarget::new(
            user,
            RemoteHost::from(self.remote_server.as_str()),
            self.remote_port,
            self.remote_path.as_str(),
            local,
        )?;
        Ok(target
            .with_verbose(self.verbose)
            .with_dry_run(self.dry_run))
    }
}
