//! simplesync: mirror a local directory to a remote host on every change.
//!
//! # Usage
//!
//! ```text
//! simplesync -s <host> -r <remote-path> [-u <user>] [-p <port>] [-l <local-path>]
//!            [-v] [-c <settings-file>] [--once] [--dry-run] [--log-json]
//! ```
//!
//! Exit status: 0 after a signal-triggered stop or a clean `--once` pass,
//! 1 on configuration or connection failure, 2 when a `--once` pass failed.

mod args;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use args::SyncArgs;

fn main() -> Result<ExitCode> {
    SyncArgs::parse().run()
}
