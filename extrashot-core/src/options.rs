use crate::ptz::SpeedFactor;
use crate::ptz_dispatcher::MOTION_TICK;
use crate::reconciliation::POLL_INTERVAL;
use crate::session_state::ViewerOptions;
use crate::source_catalog::DEFAULT_REFRESH_TIMEOUT_SECS;
use std::time::Duration;

/// Tunables of one operator session.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerOptions {
    pub poll_interval: Duration,
    pub motion_tick: Duration,
    pub refresh_timeout_secs: u64,
    pub speed_factor: SpeedFactor,
    pub viewer: ViewerOptions,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            motion_tick: MOTION_TICK,
            refresh_timeout_secs: DEFAULT_REFRESH_TIMEOUT_SECS,
            speed_factor: SpeedFactor::default(),
            viewer: ViewerOptions::default(),
        }
    }
}
