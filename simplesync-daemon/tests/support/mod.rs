//! Stand-in tools that append to one shared timeline file.
//!
//! Timeline lines: `ssh <pid>` when a remote shell starts, `rsync-start` and
//! `rsync-end` around each mirror pass.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use simplesync_core::{ExclusionSet, RemoteHost, RemoteUser, Settings, SyncTarget, ToolSettings};

pub struct Sandbox {
    _dir: tempfile::TempDir,
    pub local: PathBuf,
    pub timeline: PathBuf,
    pub settings: Settings,
}

impl Sandbox {
    /// `rsync_exit` is the fake mirror tool's exit status; `pass_ms` how
    /// long each pass takes between its start and end lines. Every pass first
    /// idles briefly so a freshly spawned fake ssh has logged its pid.
    pub fn new(rsync_exit: i32, pass_ms: u64) -> Self {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let root = fs::canonicalize(dir.path()).expect("canonical tempdir");
        let local = root.join("local");
        let tools_dir = root.join("tools");
        fs::create_dir_all(&local).expect("mkdir local");
        fs::create_dir_all(&tools_dir).expect("mkdir tools");
        let timeline = tools_dir.join("timeline.log");

        let ssh = write_script(
            &tools_dir,
            "fake-ssh",
            &format!("echo \"ssh $$\" >> '{}'\nexec sleep 30", timeline.display()),
        );
        let sleep = format!("{}.{:03}", pass_ms / 1000, pass_ms % 1000);
        let rsync = write_script(
            &tools_dir,
            "fake-rsync",
            &format!(
                "sleep 0.2\necho rsync-start >> '{t}'\nsleep {sleep}\necho rsync-end >> '{t}'\nexit {rsync_exit}",
                t = timeline.display(),
            ),
        );

        Self {
            _dir: dir,
            local,
            timeline,
            settings: Settings {
                exclusions: ExclusionSet::new([".git", "node_modules"], ["*.log"]),
                tools: ToolSettings {
                    ssh_program: ssh,
                    rsync_program: rsync,
                    control_path: tools_dir.join("ctl-%r@%h:%p").display().to_string(),
                },
            },
        }
    }

    pub fn target(&self) -> SyncTarget {
        SyncTarget::new(
            RemoteUser::from("alice"),
            RemoteHost::from("10.0.0.5"),
            2222,
            "/home/alice/proj",
            &self.local,
        )
        .expect("target")
        .with_verbose(true)
    }

    pub fn lines(&self) -> Vec<String> {
        fs::read_to_string(&self.timeline)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn completed_passes(&self) -> usize {
        self.lines().iter().filter(|l| *l == "rsync-end").count()
    }

    pub fn ssh_pids(&self) -> Vec<u32> {
        self.lines()
            .iter()
            .filter_map(|l| l.strip_prefix("ssh "))
            .filter_map(|pid| pid.trim().parse().ok())
            .collect()
    }

    pub fn touch(&self, name: &str) {
        fs::write(self.local.join(name), b"change").expect("write local file");
    }
}

pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    let mut perms = fs::metadata(&path).expect("script metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod script");
    path
}

/// True once `pid` has exited, whether or not it has been reaped yet.
pub fn process_dead(pid: u32) -> bool {
    match Command::new("ps")
        .args(["-o", "stat=", "-p", &pid.to_string()])
        .output()
    {
        Ok(output) => {
            let stat = String::from_utf8_lossy(&output.stdout);
            !output.status.success() || stat.trim().is_empty() || stat.trim().starts_with('Z')
        }
        Err(_) => false,
    }
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
