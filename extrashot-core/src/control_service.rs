//! Request/response surface of the remote controller consumed by the core.

use crate::credentials::{AuthStatus, CredentialChange};
use crate::error::ServiceError;
use crate::ptz::{Exposure, MotionIntent, WhiteBalance};
use crate::session_state::{DeviceList, OutputConfig, OutputStatus, ViewerOptions, ViewerStatus};
use crate::source::{ExtraIpList, SourceList};
use async_trait::async_trait;
use mockall::automock;
use std::sync::Arc;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// No call is retried by the implementation; callers decide.
#[automock]
#[async_trait]
pub trait ControlService: Send + Sync + 'static {
    async fn auth_status(&self) -> ServiceResult<AuthStatus>;
    async fn login(&self, username: &str, password: &str) -> ServiceResult<()>;
    async fn logout(&self) -> ServiceResult<()>;
    async fn change_credentials(&self, change: &CredentialChange) -> ServiceResult<()>;
    async fn health(&self) -> ServiceResult<serde_json::Value>;

    async fn list_sources(&self) -> ServiceResult<SourceList>;
    async fn refresh_sources(&self, timeout_secs: u64) -> ServiceResult<SourceList>;
    async fn extra_ips(&self) -> ServiceResult<ExtraIpList>;
    async fn set_extra_ips(&self, ips: Vec<String>) -> ServiceResult<ExtraIpList>;
    async fn add_extra_ip(&self, ip: &str) -> ServiceResult<ExtraIpList>;
    async fn remove_extra_ip(&self, ip: &str) -> ServiceResult<ExtraIpList>;

    async fn viewer_start(&self, source: &str, options: &ViewerOptions) -> ServiceResult<()>;
    async fn viewer_switch(&self, source: &str, options: &ViewerOptions) -> ServiceResult<()>;
    async fn viewer_stop(&self) -> ServiceResult<()>;
    async fn viewer_status(&self) -> ServiceResult<ViewerStatus>;

    async fn ptz_move(&self, intent: MotionIntent) -> ServiceResult<()>;
    async fn ptz_stop(&self) -> ServiceResult<()>;
    async fn ptz_zoom(&self, speed: f32) -> ServiceResult<()>;
    async fn ptz_recall_preset(&self, preset: u8, speed: f32) -> ServiceResult<()>;
    async fn ptz_store_preset(&self, preset: u8) -> ServiceResult<()>;
    async fn ptz_auto_focus(&self) -> ServiceResult<()>;
    async fn ptz_white_balance(&self, mode: WhiteBalance) -> ServiceResult<()>;
    async fn ptz_exposure(&self, exposure: Exposure) -> ServiceResult<()>;

    async fn output_start(&self, config: &OutputConfig) -> ServiceResult<()>;
    async fn output_stop(&self) -> ServiceResult<()>;
    async fn output_status(&self) -> ServiceResult<OutputStatus>;
    async fn output_devices(&self) -> ServiceResult<DeviceList>;
}

pub type SharedControlService = Arc<dyn ControlService>;

/// Human confirmation for irreversible operations.
#[automock]
#[async_trait]
pub trait ConfirmPrompt: Send + Sync {
    async fn confirm(&self, question: &str) -> bool;
}
