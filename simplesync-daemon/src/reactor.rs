//! Change reactor: every change event becomes one full mirror pass.
//!
//! Passes are strictly serialized. While a pass runs, new events wait in the
//! feed's channel and are handled afterwards in arrival order.

use std::future::Future;

use tokio::sync::mpsc;

use simplesync_remote::{MirrorInvoker, SessionManager};

use crate::error::DaemonError;
use crate::feed::ChangeEvent;

/// Pass counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub passes: u64,
    pub failed: u64,
}

pub struct ChangeReactor {
    session: SessionManager,
    mirror: MirrorInvoker,
    verbose: bool,
    stats: PassStats,
}

impl ChangeReactor {
    pub fn new(session: SessionManager, mirror: MirrorInvoker, verbose: bool) -> Self {
        Self {
            session,
            mirror,
            verbose,
            stats: PassStats::default(),
        }
    }

    /// Initial reconciliation pass, run before any event is subscribed.
    pub async fn on_start(&mut self) -> Result<(), DaemonError> {
        if self.verbose {
            tracing::info!("sync on start");
        }
        self.sync_pass().await
    }

    /// React to one change event, whatever its kind or path.
    pub async fn on_change(&mut self, event: &ChangeEvent) -> Result<(), DaemonError> {
        if self.verbose {
            tracing::info!("{} has been {}", event.display_paths(), event.kind);
        }
        self.sync_pass().await
    }

    /// Handle events one at a time until `shutdown` resolves or the channel
    /// closes. Shutdown is only observed between passes.
    pub async fn dispatch<F>(
        &mut self,
        events: &mut mpsc::UnboundedReceiver<ChangeEvent>,
        shutdown: F,
    ) -> Result<(), DaemonError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                event = events.recv() => {
                    let Some(event) = event else { break };
                    self.on_change(&event).await?;
                }
            }
        }
        Ok(())
    }

    pub fn stats(&self) -> PassStats {
        self.stats
    }

    pub fn sessions_started(&self) -> u64 {
        self.session.sessions_started()
    }

    /// Ask the remote session to exit. Best effort.
    pub async fn terminate_session(&mut self) {
        self.session.terminate().await;
    }

    // A failed or unstartable mirror pass is logged and otherwise ignored; the
    // next event retries. Only a remote shell that cannot be spawned is fatal.
    async fn sync_pass(&mut self) -> Result<(), DaemonError> {
        let session = self.session.ensure_healthy().await?;
        self.stats.passes += 1;
        let pass = self.stats.passes;

        match self.mirror.run(session).await {
            Ok(report) if report.success => {
                tracing::info!(
                    pass,
                    duration_ms = report.duration.as_millis() as u64,
                    "mirror pass completed",
                );
            }
            Ok(report) => {
                self.stats.failed += 1;
                tracing::warn!(
                    pass,
                    exit_code = ?report.exit_code,
                    started_at = %report.started_at.to_rfc3339(),
                    duration_ms = report.duration.as_millis() as u64,
                    "mirror pass failed; will retry on next change",
                );
            }
            Err(err) => {
                self.stats.failed += 1;
                tracing::warn!(pass, error = %err, "mirror pass could not run");
            }
        }
        Ok(())
    }
}
