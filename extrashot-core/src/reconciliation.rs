//! Periodic convergence of local state onto the remote controller.
//!
//! Each cycle reads the source list, the viewer status and the output status
//! concurrently. A failing read is logged and leaves its piece of state as it
//! was; the other reads still apply. Remote answers overwrite local state.

use crate::command_stream::CommandStream;
use crate::session_controller::SessionController;
use crate::shared::Shared;
use crate::source_catalog::SourceCatalog;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub const POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Which reads of one cycle were applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    pub sources: bool,
    pub viewer: bool,
    pub output: bool,
}

#[derive(Clone)]
pub struct Reconciler {
    catalog: SourceCatalog,
    sessions: SessionController,
}

impl Reconciler {
    pub fn new(catalog: SourceCatalog, sessions: SessionController) -> Self {
        Self { catalog, sessions }
    }

    pub async fn tick(&self) -> TickReport {
        let (sources, viewer, output) = tokio::join!(
            self.catalog.poll(),
            self.sessions.poll_viewer(),
            self.sessions.poll_output()
        );
        if let Err(err) = &sources {
            tracing::warn!("source poll failed: {}", err);
        }
        if let Err(err) = &viewer {
            tracing::warn!("viewer status poll failed: {}", err);
        }
        if let Err(err) = &output {
            tracing::warn!("output status poll failed: {}", err);
        }
        TickReport {
            sources: sources.is_ok(),
            viewer: viewer.is_ok(),
            output: output.is_ok(),
        }
    }

    /// Status-only read used right after a user action.
    pub async fn poll_status(&self) -> TickReport {
        let (viewer, output) =
            tokio::join!(self.sessions.poll_viewer(), self.sessions.poll_output());
        if let Err(err) = &viewer {
            tracing::debug!("viewer status refresh failed: {}", err);
        }
        if let Err(err) = &output {
            tracing::debug!("output status refresh failed: {}", err);
        }
        TickReport {
            sources: false,
            viewer: viewer.is_ok(),
            output: output.is_ok(),
        }
    }
}

pub struct ReconciliationLoop {
    reconciler: Reconciler,
    interval: Duration,
    liveness: CancellationToken,
    stream: Shared<Option<CommandStream>>,
}

impl ReconciliationLoop {
    pub fn new(reconciler: Reconciler, interval: Duration, liveness: CancellationToken) -> Self {
        Self {
            reconciler,
            interval,
            liveness,
            stream: Shared::new(None),
        }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Runs a cycle immediately and then every `interval`. A cycle that
    /// outlasts the interval delays the next one; cycles never overlap.
    pub fn start(&self) {
        if self.liveness.is_cancelled() {
            tracing::debug!("reconciliation not started, session is gone");
            return;
        }
        if self.is_running() {
            return;
        }
        let reconciler = self.reconciler.clone();
        let stream = CommandStream::spawn(
            "reconciliation",
            self.liveness.child_token(),
            self.interval,
            MissedTickBehavior::Skip,
            move || {
                let reconciler = reconciler.clone();
                async move {
                    let report = reconciler.tick().await;
                    tracing::trace!("reconciliation cycle {:?}", report);
                    ControlFlow::Continue(())
                }
            },
        );
        self.stream.with(|slot| *slot = Some(stream));
    }

    /// Synchronous; no cycle starts after this returns.
    pub fn stop(&self) {
        if let Some(mut stream) = self.stream.with(Option::take) {
            stream.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.stream
            .with(|slot| slot.as_ref().is_some_and(|stream| !stream.is_finished()))
    }
}

impl Drop for ReconciliationLoop {
    fn drop(&mut self) {
        self.stop();
    }
}
