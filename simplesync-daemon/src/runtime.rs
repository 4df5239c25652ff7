//! Lifecycle controller: connect, reconcile once, watch, stop.
//!
//! ```text
//! INIT → CONNECTING → SYNCING-INITIAL → WATCHING → STOPPING → STOPPED
//! ```
//!
//! Everything runs on one current-thread runtime so there is exactly one
//! thread of control dispatching events and starting passes.

use std::fmt;
use std::future::Future;

use simplesync_core::{Settings, SyncTarget};
use simplesync_remote::{MirrorInvoker, SessionManager};

use crate::error::{io_err, DaemonError};
use crate::feed::ChangeFeed;
use crate::reactor::ChangeReactor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Init,
    Connecting,
    SyncingInitial,
    Watching,
    Stopping,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Init => "init",
            LifecycleState::Connecting => "connecting",
            LifecycleState::SyncingInitial => "syncing-initial",
            LifecycleState::Watching => "watching",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Whether to keep watching after the initial pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Watch,
    Once,
}

/// What happened during a run, in order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunReport {
    pub states: Vec<LifecycleState>,
    pub passes: u64,
    pub failed_passes: u64,
    pub sessions_started: u64,
}

impl RunReport {
    pub fn all_passes_succeeded(&self) -> bool {
        self.failed_passes == 0
    }
}

/// Interrupt and terminate signals, registered up front so none is missed
/// while connecting or running the initial pass.
pub struct ShutdownSignal {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignal {
    #[cfg(unix)]
    pub fn install() -> Result<Self, DaemonError> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt()).map_err(|e| io_err("SIGINT handler", e))?,
            terminate: signal(SignalKind::terminate()).map_err(|e| io_err("SIGTERM handler", e))?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> Result<Self, DaemonError> {
        Ok(Self {})
    }

    /// Resolve on the first interrupt or terminate signal.
    #[cfg(unix)]
    pub async fn recv(mut self) {
        tokio::select! {
            _ = self.interrupt.recv() => tracing::debug!("received SIGINT"),
            _ = self.terminate.recv() => tracing::debug!("received SIGTERM"),
        }
        tracing::info!("sync stopped by user");
    }

    #[cfg(not(unix))]
    pub async fn recv(self) {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "ctrl-c handler failed");
        }
        tracing::info!("sync stopped by user");
    }
}

/// Build a current-thread runtime and block on [`run`].
pub fn start_blocking(
    target: SyncTarget,
    settings: Settings,
    mode: RunMode,
) -> Result<RunReport, DaemonError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(target, settings, mode))
}

/// Run until a signal arrives, or for a single pass in [`RunMode::Once`].
pub async fn run(
    target: SyncTarget,
    settings: Settings,
    mode: RunMode,
) -> Result<RunReport, DaemonError> {
    match mode {
        RunMode::Watch => {
            let signal = ShutdownSignal::install()?;
            run_until(target, settings, signal.recv()).await
        }
        RunMode::Once => run_once(target, settings).await,
    }
}

/// Full lifecycle, stopping when `shutdown` resolves.
pub async fn run_until<F>(
    target: SyncTarget,
    settings: Settings,
    shutdown: F,
) -> Result<RunReport, DaemonError>
where
    F: Future<Output = ()>,
{
    let mut lifecycle = Lifecycle::start();
    let mut reactor = connect(&mut lifecycle, &target, &settings).await?;

    lifecycle.enter(LifecycleState::SyncingInitial);
    let outcome = async {
        reactor.on_start().await?;
        let mut feed = ChangeFeed::subscribe(target.local_path())?;
        lifecycle.enter(LifecycleState::Watching);
        let dispatched = reactor.dispatch(feed.receiver(), shutdown).await;
        // The feed must be stopped before the session is terminated.
        lifecycle.enter(LifecycleState::Stopping);
        feed.stop();
        dispatched
    }
    .await;

    finish(lifecycle, reactor, outcome).await
}

/// Connect, run the initial pass, and stop.
pub async fn run_once(target: SyncTarget, settings: Settings) -> Result<RunReport, DaemonError> {
    let mut lifecycle = Lifecycle::start();
    let mut reactor = connect(&mut lifecycle, &target, &settings).await?;

    lifecycle.enter(LifecycleState::SyncingInitial);
    let outcome = reactor.on_start().await;

    finish(lifecycle, reactor, outcome).await
}

struct Lifecycle {
    states: Vec<LifecycleState>,
}

impl Lifecycle {
    fn start() -> Self {
        tracing::debug!(state = %LifecycleState::Init, "lifecycle");
        Self {
            states: vec![LifecycleState::Init],
        }
    }

    fn enter(&mut self, state: LifecycleState) {
        if self.states.last() == Some(&state) {
            return;
        }
        tracing::debug!(state = %state, "lifecycle");
        self.states.push(state);
    }
}

async fn connect(
    lifecycle: &mut Lifecycle,
    target: &SyncTarget,
    settings: &Settings,
) -> Result<ChangeReactor, DaemonError> {
    lifecycle.enter(LifecycleState::Connecting);
    let mut session = SessionManager::new(target.clone(), settings.tools.clone());
    session.establish().await?;

    let mirror = MirrorInvoker::new(target, &settings.exclusions, &settings.tools);
    tracing::debug!(
        excludes = mirror.exclude_args().len(),
        destination = mirror.destination(),
        "mirror invoker ready",
    );
    Ok(ChangeReactor::new(session, mirror, target.verbose))
}

async fn finish(
    mut lifecycle: Lifecycle,
    mut reactor: ChangeReactor,
    outcome: Result<(), DaemonError>,
) -> Result<RunReport, DaemonError> {
    lifecycle.enter(LifecycleState::Stopping);
    reactor.terminate_session().await;
    lifecycle.enter(LifecycleState::Stopped);
    outcome?;

    let stats = reactor.stats();
    let report = RunReport {
        states: lifecycle.states,
        passes: stats.passes,
        failed_passes: stats.failed,
        sessions_started: reactor.sessions_started(),
    };
    tracing::info!(
        passes = report.passes,
        failed = report.failed_passes,
        sessions = report.sessions_started,
        "sync stopped",
    );
    Ok(report)
}
