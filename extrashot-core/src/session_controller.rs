//! Viewer and output session state machines.
//!
//! Start-vs-switch is decided from the locally known state at the moment of
//! the operator action. A stale local flag can produce an inapplicable call;
//! the controller rejects it and the error is returned, never swallowed.

use crate::control_service::SharedControlService;
use crate::error::{ControlError, ControlResult};
use crate::session_state::{
    CaptureDevice, OutputConfig, OutputSession, OutputStatus, ViewerOptions, ViewerSession,
    ViewerStatus,
};
use crate::shared::Shared;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceAction {
    Started,
    Switched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    AlreadyStopped,
}

/// Lets the PTZ dispatcher ask whether commands may be emitted.
pub trait SessionGate: Send + Sync {
    fn commands_enabled(&self) -> bool;
}

/// `*_action` counts issued user actions, `*_applied` is the newest one whose
/// completion was written. A completion is dropped only when a newer action
/// already succeeded; a failed newer action supersedes nothing.
#[derive(Default)]
struct Sessions {
    viewer: ViewerSession,
    output: OutputSession,
    viewer_action: u64,
    viewer_applied: u64,
    output_action: u64,
    output_applied: u64,
}

#[derive(Clone)]
pub struct SessionController {
    service: SharedControlService,
    liveness: CancellationToken,
    viewer_options: ViewerOptions,
    sessions: Shared<Sessions>,
}

impl SessionController {
    pub fn new(
        service: SharedControlService,
        liveness: CancellationToken,
        viewer_options: ViewerOptions,
    ) -> Self {
        Self {
            service,
            liveness,
            viewer_options,
            sessions: Shared::new(Sessions::default()),
        }
    }

    pub fn viewer(&self) -> ViewerSession {
        self.sessions.with(|sessions| sessions.viewer.clone())
    }

    pub fn output(&self) -> OutputSession {
        self.sessions.with(|sessions| sessions.output.clone())
    }

    /// The output start control is disabled while the output is running.
    pub fn can_start_output(&self) -> bool {
        !self.liveness.is_cancelled() && !self.output().is_running()
    }

    pub async fn select_source(&self, source: &str) -> ControlResult<SourceAction> {
        let source = source.trim();
        if source.is_empty() {
            return Err(ControlError::validation("source is required"));
        }
        self.ensure_alive()?;
        let (running, action_id) = self.sessions.with(|sessions| {
            sessions.viewer_action += 1;
            (sessions.viewer.is_running(), sessions.viewer_action)
        });

        let action = if running {
            tracing::info!("switching viewer to {}", source);
            self.service
                .viewer_switch(source, &self.viewer_options)
                .await?;
            SourceAction::Switched
        } else {
            tracing::info!("starting viewer on {}", source);
            self.service
                .viewer_start(source, &self.viewer_options)
                .await?;
            SourceAction::Started
        };

        self.apply_viewer_action(action_id, || ViewerSession::running(source))?;
        Ok(action)
    }

    pub async fn stop_viewer(&self) -> ControlResult<StopOutcome> {
        self.ensure_alive()?;
        let pending = self.sessions.with(|sessions| {
            if !sessions.viewer.is_running() {
                return None;
            }
            sessions.viewer_action += 1;
            Some(sessions.viewer_action)
        });
        let Some(action_id) = pending else {
            tracing::debug!("viewer already stopped");
            return Ok(StopOutcome::AlreadyStopped);
        };

        tracing::info!("stopping viewer");
        self.service.viewer_stop().await?;
        self.apply_viewer_action(action_id, ViewerSession::default)?;
        Ok(StopOutcome::Stopped)
    }

    pub async fn start_output(&self, config: OutputConfig) -> ControlResult<()> {
        self.ensure_alive()?;
        if self.output().is_running() {
            return Err(ControlError::OutputAlreadyRunning);
        }
        config.validate()?;
        let action_id = self.sessions.with(|sessions| {
            sessions.output_action += 1;
            sessions.output_action
        });

        tracing::info!(
            "starting output {} from {} at {}@{}",
            config.name,
            config.device,
            config.resolution(),
            config.fps
        );
        self.service.output_start(&config).await?;
        self.apply_output_action(action_id, || OutputSession::started(&config))
    }

    pub async fn stop_output(&self) -> ControlResult<StopOutcome> {
        self.ensure_alive()?;
        let pending = self.sessions.with(|sessions| {
            if !sessions.output.is_running() {
                return None;
            }
            sessions.output_action += 1;
            Some(sessions.output_action)
        });
        let Some(action_id) = pending else {
            return Ok(StopOutcome::AlreadyStopped);
        };

        tracing::info!("stopping output");
        self.service.output_stop().await?;
        self.apply_output_action(action_id, OutputSession::default)?;
        Ok(StopOutcome::Stopped)
    }

    /// Camera devices usable for output, primary capture nodes only.
    pub async fn capture_devices(&self) -> ControlResult<Vec<CaptureDevice>> {
        let list = self.service.output_devices().await?;
        Ok(list
            .devices
            .into_iter()
            .filter(CaptureDevice::is_primary_camera)
            .collect())
    }

    /// Reads the viewer status and lets it overwrite local state.
    pub async fn poll_viewer(&self) -> ControlResult<()> {
        let status = self.service.viewer_status().await?;
        self.apply_viewer_status(&status)
    }

    pub async fn poll_output(&self) -> ControlResult<()> {
        let status = self.service.output_status().await?;
        self.apply_output_status(&status)
    }

    pub fn apply_viewer_status(&self, status: &ViewerStatus) -> ControlResult<()> {
        self.ensure_alive()?;
        self.sessions
            .with(|sessions| sessions.viewer.merge_status(status));
        Ok(())
    }

    pub fn apply_output_status(&self, status: &OutputStatus) -> ControlResult<()> {
        self.ensure_alive()?;
        self.sessions
            .with(|sessions| sessions.output.merge_status(status));
        Ok(())
    }

    fn apply_viewer_action(
        &self,
        action_id: u64,
        next: impl FnOnce() -> ViewerSession,
    ) -> ControlResult<()> {
        self.ensure_alive()?;
        self.sessions.with(|sessions| {
            if action_id > sessions.viewer_applied {
                sessions.viewer_applied = action_id;
                sessions.viewer = next();
            } else {
                tracing::debug!("viewer action {} superseded", action_id);
            }
        });
        Ok(())
    }

    fn apply_output_action(
        &self,
        action_id: u64,
        next: impl FnOnce() -> OutputSession,
    ) -> ControlResult<()> {
        self.ensure_alive()?;
        self.sessions.with(|sessions| {
            if action_id > sessions.output_applied {
                sessions.output_applied = action_id;
                sessions.output = next();
            } else {
                tracing::debug!("output action {} superseded", action_id);
            }
        });
        Ok(())
    }

    fn ensure_alive(&self) -> ControlResult<()> {
        if self.liveness.is_cancelled() {
            return Err(ControlError::TornDown);
        }
        Ok(())
    }
}

impl SessionGate for SessionController {
    /// PTZ belongs to the viewer session.
    fn commands_enabled(&self) -> bool {
        !self.liveness.is_cancelled() && self.viewer().is_running()
    }
}
