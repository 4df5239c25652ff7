//! Remote-shell session supervision.
//!
//! One long-lived `ssh -T` process holds the multiplexing master socket that
//! every mirror pass reuses. The process is started in its own session so a
//! terminal interrupt does not reach it; it is reaped explicitly through
//! [`SessionManager::terminate`].

use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, ChildStdin, Command};

use simplesync_core::{SyncTarget, ToolSettings};

use crate::error::RemoteError;

/// How long a terminated session may take to exit before it is killed.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// One running remote-shell process.
#[derive(Debug)]
pub struct RemoteSession {
    child: Child,
    // Held open so the shell never reads EOF and exits on its own.
    stdin: Option<ChildStdin>,
    pid: u32,
    generation: u64,
    control_path: String,
}

impl RemoteSession {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// 1 for the first session of a run, incremented on every replacement.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Control-socket template this session's master listens on.
    pub fn control_path(&self) -> &str {
        &self.control_path
    }

    fn is_alive(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                tracing::debug!(
                    pid = self.pid,
                    generation = self.generation,
                    status = %status,
                    "remote shell has exited",
                );
                false
            }
            Err(err) => {
                tracing::warn!(pid = self.pid, error = %err, "could not poll remote shell");
                false
            }
        }
    }

    /// Ask the process to exit, wait for it, and kill it if it lingers.
    async fn shutdown(mut self) {
        drop(self.stdin.take());

        if let Ok(Some(status)) = self.child.try_wait() {
            tracing::debug!(pid = self.pid, status = %status, "remote shell already reaped");
            return;
        }

        if let Err(err) = send_terminate(self.pid) {
            tracing::debug!(pid = self.pid, error = %err, "terminate request failed, killing");
            if let Err(err) = self.child.kill().await {
                tracing::warn!(pid = self.pid, error = %err, "failed to kill remote shell");
            }
            return;
        }

        match tokio::time::timeout(TERMINATE_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(pid = self.pid, status = %status, "remote shell reaped");
            }
            Ok(Err(err)) => {
                tracing::warn!(pid = self.pid, error = %err, "failed to reap remote shell");
            }
            Err(_) => {
                tracing::warn!(pid = self.pid, "remote shell ignored terminate, killing");
                if let Err(err) = self.child.kill().await {
                    tracing::warn!(pid = self.pid, error = %err, "failed to kill remote shell");
                }
            }
        }
    }
}

/// Owns the single authoritative [`RemoteSession`] of a run.
#[derive(Debug)]
pub struct SessionManager {
    target: SyncTarget,
    tools: ToolSettings,
    current: Option<RemoteSession>,
    generation: u64,
}

impl SessionManager {
    pub fn new(target: SyncTarget, tools: ToolSettings) -> Self {
        Self {
            target,
            tools,
            current: None,
            generation: 0,
        }
    }

    /// Arguments passed to the remote shell, without the program name.
    pub fn remote_shell_args(&self) -> Vec<String> {
        vec![
            "-T".to_string(),
            "-l".to_string(),
            self.target.remote_user.0.clone(),
            "-p".to_string(),
            self.target.remote_port.to_string(),
            "-o".to_string(),
            "LogLevel=error".to_string(),
            "-o".to_string(),
            "ControlMaster=auto".to_string(),
            "-o".to_string(),
            format!("ControlPath={}", self.tools.control_path),
            self.target.remote_host.0.clone(),
        ]
    }

    /// Start a new remote shell, reaping any previous one first.
    ///
    /// A spawn failure is returned as [`RemoteError::Spawn`]; callers treat it
    /// as fatal.
    pub async fn establish(&mut self) -> Result<&RemoteSession, RemoteError> {
        if let Some(previous) = self.current.take() {
            previous.shutdown().await;
        }
        self.spawn()
    }

    /// Whether the current remote shell is still running.
    pub fn is_healthy(&mut self) -> bool {
        self.current
            .as_mut()
            .map(|session| session.is_alive())
            .unwrap_or(false)
    }

    /// Return the live session, re-establishing it first if it has died.
    pub async fn ensure_healthy(&mut self) -> Result<&RemoteSession, RemoteError> {
        match self.current.take() {
            Some(mut session) => {
                if session.is_alive() {
                    return Ok(&*self.current.insert(session));
                }
                tracing::warn!(
                    pid = session.pid,
                    generation = session.generation,
                    "remote session died, restarting",
                );
                session.shutdown().await;
            }
            None => tracing::info!("no remote session yet, establishing"),
        }
        self.spawn()
    }

    /// Best-effort shutdown of the current session. Never fails.
    pub async fn terminate(&mut self) {
        if let Some(session) = self.current.take() {
            tracing::info!(
                pid = session.pid,
                generation = session.generation,
                "terminating remote session",
            );
            session.shutdown().await;
        }
    }

    pub fn current(&self) -> Option<&RemoteSession> {
        self.current.as_ref()
    }

    /// Number of remote shells started over the manager's lifetime.
    pub fn sessions_started(&self) -> u64 {
        self.generation
    }

    fn spawn(&mut self) -> Result<&RemoteSession, RemoteError> {
        let program = &self.tools.ssh_program;
        let mut command = Command::new(program);
        command
            .args(self.remote_shell_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        #[cfg(unix)]
        detach_from_terminal(&mut command);

        let mut child = command.spawn().map_err(|source| RemoteError::Spawn {
            program: program.clone(),
            source,
        })?;
        let pid = child.id().ok_or_else(|| RemoteError::ExitedEarly {
            program: program.clone(),
        })?;
        let stdin = child.stdin.take();

        self.generation += 1;
        tracing::info!(
            pid,
            generation = self.generation,
            user = %self.target.remote_user,
            host = %self.target.remote_host,
            port = self.target.remote_port,
            "remote session established",
        );

        let session = RemoteSession {
            child,
            stdin,
            pid,
            generation: self.generation,
            control_path: self.tools.control_path.clone(),
        };
        Ok(&*self.current.insert(session))
    }
}

/// Run the shell in a new session: no controlling terminal, own process
/// group, so terminal signals and password prompts never reach it.
#[cfg(unix)]
fn detach_from_terminal(command: &mut Command) {
    // SAFETY: setsid(2) is async-signal-safe and touches no parent memory.
    unsafe {
        command.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(unix)]
fn send_terminate(pid: u32) -> std::io::Result<()> {
    let pid = libc::pid_t::try_from(pid).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "pid out of range")
    })?;
    // SAFETY: kill(2) has no memory-safety preconditions; `pid` is our own
    // unreaped child, so it cannot have been recycled.
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn send_terminate(_pid: u32) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "graceful terminate is unix-only",
    ))
}
