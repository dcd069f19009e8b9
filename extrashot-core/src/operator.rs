//! One authenticated operator session and everything that runs on its behalf.
//!
//! The session owns a single `CancellationToken`. Teardown cancels it, which
//! stops every timer and makes every in-flight completion a no-op.

use crate::alert::{Alert, AlertReceiver};
use crate::control_service::SharedControlService;
use crate::credentials::CredentialChangeForm;
use crate::error::{ControlError, ControlResult};
use crate::options::ControllerOptions;
use crate::ptz_dispatcher::ContinuousCommandDispatcher;
use crate::reconciliation::{Reconciler, ReconciliationLoop};
use crate::session_controller::{SessionController, SourceAction, StopOutcome};
use crate::session_state::OutputConfig;
use crate::shared::Shared;
use crate::source::Source;
use crate::source_catalog::SourceCatalog;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub struct OperatorSession {
    service: SharedControlService,
    options: ControllerOptions,
    username: Option<String>,
    liveness: CancellationToken,
    catalog: SourceCatalog,
    sessions: SessionController,
    dispatcher: ContinuousCommandDispatcher,
    reconciliation: ReconciliationLoop,
    alerts: Shared<AlertReceiver>,
}

impl OperatorSession {
    /// Builds an inactive session; nothing runs until `activate`.
    pub fn new(
        service: SharedControlService,
        options: ControllerOptions,
        username: Option<String>,
    ) -> Self {
        let liveness = CancellationToken::new();
        let catalog = SourceCatalog::new(service.clone(), liveness.clone());
        let sessions =
            SessionController::new(service.clone(), liveness.clone(), options.viewer.clone());
        let (alert_tx, alert_rx) = mpsc::unbounded_channel();
        let dispatcher = ContinuousCommandDispatcher::new(
            service.clone(),
            Arc::new(sessions.clone()),
            liveness.clone(),
            alert_tx,
            options.motion_tick,
            options.speed_factor,
        );
        let reconciliation = ReconciliationLoop::new(
            Reconciler::new(catalog.clone(), sessions.clone()),
            options.poll_interval,
            liveness.clone(),
        );
        Self {
            service,
            options,
            username,
            liveness,
            catalog,
            sessions,
            dispatcher,
            reconciliation,
            alerts: Shared::new(alert_rx),
        }
    }

    pub async fn login(
        service: SharedControlService,
        options: ControllerOptions,
        username: &str,
        password: &str,
    ) -> ControlResult<Self> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(ControlError::validation("username and password are required"));
        }
        service.login(username.trim(), password).await?;
        tracing::info!("logged in as {}", username.trim());
        let session = Self::new(service, options, Some(username.trim().to_string()));
        session.activate();
        Ok(session)
    }

    /// Picks up an existing authenticated session, if the controller reports one.
    pub async fn resume(
        service: SharedControlService,
        options: ControllerOptions,
    ) -> ControlResult<Option<Self>> {
        let status = service.auth_status().await?;
        if !status.authenticated {
            return Ok(None);
        }
        tracing::info!(
            "resuming session of {}",
            status.username.as_deref().unwrap_or("unknown user")
        );
        let session = Self::new(service, options, status.username);
        session.activate();
        Ok(Some(session))
    }

    /// Starts reconciliation; the first cycle runs immediately.
    pub fn activate(&self) {
        self.reconciliation.start();
    }

    pub fn is_active(&self) -> bool {
        !self.liveness.is_cancelled()
    }

    /// Idempotent and synchronous.
    pub fn teardown(&self) {
        if self.liveness.is_cancelled() {
            return;
        }
        tracing::info!("tearing down operator session");
        self.liveness.cancel();
        self.dispatcher.teardown();
        self.reconciliation.stop();
    }

    /// Local state is torn down even when the remote logout fails.
    pub async fn logout(&self) {
        self.teardown();
        if let Err(err) = self.service.logout().await {
            tracing::warn!("logout failed: {}", err);
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }

    pub fn catalog(&self) -> &SourceCatalog {
        &self.catalog
    }

    pub fn sessions(&self) -> &SessionController {
        &self.sessions
    }

    pub fn dispatcher(&self) -> &ContinuousCommandDispatcher {
        &self.dispatcher
    }

    pub fn sources(&self) -> Vec<Source> {
        self.catalog.list()
    }

    pub async fn refresh_sources(&self, timeout_secs: Option<u64>) -> ControlResult<Vec<Source>> {
        self.catalog
            .refresh(timeout_secs.unwrap_or(self.options.refresh_timeout_secs))
            .await
    }

    pub async fn select_source(&self, source: &str) -> ControlResult<SourceAction> {
        let action = self.sessions.select_source(source).await?;
        self.reconciliation.reconciler().poll_status().await;
        Ok(action)
    }

    pub async fn stop_viewer(&self) -> ControlResult<StopOutcome> {
        let outcome = self.sessions.stop_viewer().await?;
        if outcome == StopOutcome::Stopped {
            self.reconciliation.reconciler().poll_status().await;
        }
        Ok(outcome)
    }

    /// Default output configuration with the first usable camera selected.
    pub async fn output_config(&self) -> ControlResult<OutputConfig> {
        let devices = self.sessions.capture_devices().await?;
        Ok(OutputConfig::default().with_first_device(&devices))
    }

    pub async fn start_output(&self, config: OutputConfig) -> ControlResult<()> {
        self.sessions.start_output(config).await?;
        self.reconciliation.reconciler().poll_status().await;
        Ok(())
    }

    /// Starts the output on the first usable camera. The local checks run
    /// first, so a disabled start makes no remote call at all.
    pub async fn start_default_output(&self, name: Option<String>) -> ControlResult<()> {
        if !self.is_active() {
            return Err(ControlError::TornDown);
        }
        if self.sessions.output().is_running() {
            return Err(ControlError::OutputAlreadyRunning);
        }
        let mut config = self.output_config().await?;
        if let Some(name) = name {
            config.name = name;
        }
        self.start_output(config).await
    }

    pub async fn stop_output(&self) -> ControlResult<StopOutcome> {
        let outcome = self.sessions.stop_output().await?;
        if outcome == StopOutcome::Stopped {
            self.reconciliation.reconciler().poll_status().await;
        }
        Ok(outcome)
    }

    pub async fn change_credentials(&self, form: CredentialChangeForm) -> ControlResult<()> {
        let change = form.validate()?;
        if !self.is_active() {
            return Err(ControlError::TornDown);
        }
        self.service.change_credentials(&change).await?;
        tracing::info!("credentials changed");
        Ok(())
    }

    pub async fn health(&self) -> ControlResult<serde_json::Value> {
        Ok(self.service.health().await?)
    }

    pub fn try_recv_alert(&self) -> Option<Alert> {
        self.alerts.with(|alerts| alerts.try_recv().ok())
    }
}

impl Drop for OperatorSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    mod success {
        use super::super::*;
        use crate::control_service::MockControlService;
        use crate::credentials::AuthStatus;
        use crate::ptz::Direction;
        use crate::ptz_dispatcher::Dispatch;
        use crate::session_state::{OutputStatus, ViewerStatus};
        use crate::source::{Source, SourceList};
        use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
        use std::time::Duration;

        fn quiet_polls(service: &mut MockControlService) {
            service
                .expect_list_sources()
                .returning(|| Ok(SourceList::default()));
            service
                .expect_output_status()
                .returning(|| Ok(OutputStatus::default()));
        }

        #[tokio::test(start_paused = true)]
        async fn login_runs_first_cycle_immediately() {
            let mut service = MockControlService::new();
            service
                .expect_login()
                .withf(|username, password| username == "admin" && password == "admin")
                .times(1)
                .returning(|_, _| Ok(()));
            service.expect_list_sources().returning(|| {
                Ok(SourceList {
                    sources: vec![Source::new("CAM-A", Some("10.0.0.5".to_string()))],
                })
            });
            service
                .expect_viewer_status()
                .returning(|| Ok(ViewerStatus::default()));
            service
                .expect_output_status()
                .returning(|| Ok(OutputStatus::default()));

            let session =
                OperatorSession::login(Arc::new(service), ControllerOptions::default(), " admin ", "admin")
                    .await
                    .unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;

            assert_eq!(session.username(), Some("admin"));
            assert_eq!(session.sources()[0].name, "CAM-A");
        }

        #[tokio::test]
        async fn resume_without_authentication_yields_nothing() {
            let mut service = MockControlService::new();
            service
                .expect_auth_status()
                .returning(|| Ok(AuthStatus::default()));

            let session = OperatorSession::resume(Arc::new(service), ControllerOptions::default())
                .await
                .unwrap();

            assert!(session.is_none());
        }

        #[tokio::test(start_paused = true)]
        async fn selecting_a_source_is_followed_by_a_status_read() {
            let viewer_running = Arc::new(AtomicBool::new(false));
            let reads = Arc::new(AtomicUsize::new(0));
            let mut service = MockControlService::new();
            quiet_polls(&mut service);
            let started = viewer_running.clone();
            service
                .expect_viewer_start()
                .times(1)
                .returning(move |_, _| {
                    started.store(true, Ordering::SeqCst);
                    Ok(())
                });
            let running = viewer_running.clone();
            let counter = reads.clone();
            service.expect_viewer_status().returning(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(ViewerStatus {
                    running: running.load(Ordering::SeqCst),
                    source: Some("CAM-A".to_string()),
                })
            });
            let session = OperatorSession::new(Arc::new(service), ControllerOptions::default(), None);

            let action = session.select_source("CAM-A").await.unwrap();

            assert_eq!(action, SourceAction::Started);
            assert_eq!(reads.load(Ordering::SeqCst), 1);
            assert_eq!(session.sessions().viewer().current_source(), Some("CAM-A"));
        }

        #[tokio::test(start_paused = true)]
        async fn failing_motion_tick_reaches_the_alert_channel() {
            let mut service = MockControlService::new();
            quiet_polls(&mut service);
            service.expect_viewer_status().returning(|| {
                Ok(ViewerStatus {
                    running: true,
                    source: Some("CAM-A".to_string()),
                })
            });
            service.expect_ptz_move().returning(|_| {
                Err(crate::error::ServiceError::Remote {
                    status: 500,
                    message: "PTZ not available".to_string(),
                })
            });
            service.expect_ptz_stop().returning(|| Ok(()));
            let session = OperatorSession::new(Arc::new(service), ControllerOptions::default(), None);
            session.reconciliation.reconciler().tick().await;

            assert_eq!(session.dispatcher().press(Direction::Up).await, Dispatch::Sent);
            tokio::time::sleep(Duration::from_millis(10)).await;
            session.dispatcher().release().await.unwrap();

            let alert = session.try_recv_alert().unwrap();
            assert_eq!(alert.to_string(), "ptz move: PTZ not available");
        }

        #[tokio::test(start_paused = true)]
        async fn logout_tears_down_even_when_remote_fails() {
            let mut service = MockControlService::new();
            quiet_polls(&mut service);
            service
                .expect_viewer_status()
                .returning(|| Ok(ViewerStatus::default()));
            service.expect_logout().times(1).returning(|| {
                Err(crate::error::ServiceError::Transport("offline".to_string()))
            });
            let session = OperatorSession::new(Arc::new(service), ControllerOptions::default(), None);
            session.activate();

            session.logout().await;

            assert!(!session.is_active());
        }
    }

    mod failure {
        use super::super::*;
        use crate::control_service::MockControlService;
        use crate::ptz::Direction;
        use crate::ptz_dispatcher::Dispatch;
        use crate::session_state::{OutputStatus, ViewerStatus};
        use crate::source::SourceList;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::time::Duration;

        #[tokio::test(start_paused = true)]
        async fn nothing_runs_after_teardown() {
            let reads = Arc::new(AtomicUsize::new(0));
            let counter = reads.clone();
            let mut service = MockControlService::new();
            service.expect_list_sources().returning(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(SourceList::default())
            });
            service.expect_viewer_status().returning(|| {
                Ok(ViewerStatus {
                    running: true,
                    source: Some("CAM-A".to_string()),
                })
            });
            service
                .expect_output_status()
                .returning(|| Ok(OutputStatus::default()));
            let moves = Arc::new(AtomicUsize::new(0));
            let move_counter = moves.clone();
            service.expect_ptz_move().returning(move |_| {
                move_counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            service.expect_ptz_stop().never();
            let session = OperatorSession::new(Arc::new(service), ControllerOptions::default(), None);
            session.activate();
            tokio::time::sleep(Duration::from_millis(10)).await;
            session.dispatcher().press(Direction::Left).await;
            tokio::time::sleep(Duration::from_millis(150)).await;

            session.teardown();
            session.teardown();
            tokio::time::sleep(Duration::from_secs(30)).await;

            assert_eq!(reads.load(Ordering::SeqCst), 1);
            assert_eq!(moves.load(Ordering::SeqCst), 2);
            assert_eq!(session.dispatcher().press(Direction::Left).await, Dispatch::Disabled);
            assert_eq!(session.select_source("CAM-B").await, Err(ControlError::TornDown));
        }

        #[tokio::test]
        async fn invalid_credential_change_never_reaches_the_controller() {
            let mut service = MockControlService::new();
            service.expect_change_credentials().never();
            let session = OperatorSession::new(Arc::new(service), ControllerOptions::default(), None);

            let result = session
                .change_credentials(CredentialChangeForm {
                    current_password: "admin".to_string(),
                    new_password: "abc".to_string(),
                    confirm_password: "abc".to_string(),
                    ..Default::default()
                })
                .await;

            assert_eq!(
                result,
                Err(ControlError::Validation(
                    "Password must be at least 4 characters".to_string()
                ))
            );
        }

        #[tokio::test]
        async fn running_output_rejects_start_without_device_lookup() {
            let mut service = MockControlService::new();
            service.expect_output_devices().never();
            service.expect_output_start().never();
            let session = OperatorSession::new(Arc::new(service), ControllerOptions::default(), None);
            session
                .sessions()
                .apply_output_status(&OutputStatus {
                    running: true,
                    ..OutputStatus::default()
                })
                .unwrap();

            assert_eq!(
                session.start_default_output(None).await,
                Err(ControlError::OutputAlreadyRunning)
            );
        }

        #[tokio::test]
        async fn empty_login_is_rejected_locally() {
            let mut service = MockControlService::new();
            service.expect_login().never();

            let result =
                OperatorSession::login(Arc::new(service), ControllerOptions::default(), "", "secret").await;

            assert!(matches!(result, Err(ControlError::Validation(_))));
        }
    }
}
