//! Stand-in `ssh` and `rsync` programs for process-level tests.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use simplesync_core::{RemoteHost, RemoteUser, SyncTarget, ToolSettings};

/// Marker line the fake rsync writes after each invocation's arguments.
pub const END_OF_RUN: &str = "--end-of-run--";

pub struct FakeTools {
    pub tools: ToolSettings,
    pub pids: PathBuf,
    pub log: PathBuf,
}

pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    let mut perms = fs::metadata(&path).expect("script metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod script");
    path
}

/// Fake ssh records its pid and idles; fake rsync logs one argument per line.
pub fn fake_tools(dir: &Path, rsync_exit: i32) -> FakeTools {
    let pids = dir.join("ssh.pids");
    let log = dir.join("rsync.log");
    let ssh = write_script(
        dir,
        "fake-ssh",
        &format!("echo $$ >> '{}'\nexec sleep 30", pids.display()),
    );
    let rsync = write_script(
        dir,
        "fake-rsync",
        &format!(
            "for a in \"$@\"; do printf '%s\\n' \"$a\"; done >> '{log}'\necho '{END_OF_RUN}' >> '{log}'\nexit {rsync_exit}",
            log = log.display(),
        ),
    );
    FakeTools {
        tools: ToolSettings {
            ssh_program: ssh,
            rsync_program: rsync,
            control_path: dir.join("ctl-%r@%h:%p").display().to_string(),
        },
        pids,
        log,
    }
}

pub fn target(local: &Path) -> SyncTarget {
    SyncTarget::new(
        RemoteUser::from("alice"),
        RemoteHost::from("10.0.0.5"),
        2222,
        "/home/alice/proj",
        local,
    )
    .expect("target")
}

pub fn read_pids(path: &Path) -> Vec<u32> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}

/// Argument lists of every recorded fake-rsync run, oldest first.
pub fn read_runs(path: &Path) -> Vec<Vec<String>> {
    let content = fs::read_to_string(path).unwrap_or_default();
    let mut runs = Vec::new();
    let mut current = Vec::new();
    for line in content.lines() {
        if line == END_OF_RUN {
            runs.push(std::mem::take(&mut current));
        } else {
            current.push(line.to_string());
        }
    }
    runs
}

pub fn process_exists(pid: u32) -> bool {
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn kill_hard(pid: u32) {
    let status = Command::new("kill")
        .args(["-9", &pid.to_string()])
        .status()
        .expect("run kill");
    assert!(status.success(), "kill -9 {pid} failed");
}

pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    condition()
}
