//! Turns press/release input into timed PTZ command streams.
//!
//! Every command checks the session gate before it reaches the network, so a
//! stopped viewer never produces remote errors for routine input.

use crate::alert::{Alert, AlertSender};
use crate::command_stream::CommandStream;
use crate::control_service::{ConfirmPrompt, SharedControlService};
use crate::error::ControlResult;
use crate::ptz::{
    Direction, Exposure, MotionIntent, PRESET_RECALL_SPEED, Preset, SpeedFactor, WhiteBalance,
    ZoomDirection, ZoomIntent,
};
use crate::session_controller::SessionGate;
use crate::shared::Shared;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub const MOTION_TICK: Duration = Duration::from_millis(100);

/// What happened to an operator input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Sent,
    /// The owning session is not running; nothing was sent.
    Disabled,
    /// Redundant input for the current state, e.g. a second release signal.
    Ignored,
    /// The operator declined the confirmation.
    Declined,
}

struct ActiveMotion {
    direction: Direction,
    stream: CommandStream,
}

pub struct ContinuousCommandDispatcher {
    service: SharedControlService,
    gate: Arc<dyn SessionGate>,
    liveness: CancellationToken,
    alerts: AlertSender,
    tick: Duration,
    speed: Shared<SpeedFactor>,
    motion: Shared<Option<ActiveMotion>>,
    zoom: Shared<Option<ZoomDirection>>,
    // Serialises press/release so a stop can never overtake a later press.
    motion_order: Mutex<()>,
    zoom_order: Mutex<()>,
}

impl ContinuousCommandDispatcher {
    pub fn new(
        service: SharedControlService,
        gate: Arc<dyn SessionGate>,
        liveness: CancellationToken,
        alerts: AlertSender,
        tick: Duration,
        speed: SpeedFactor,
    ) -> Self {
        Self {
            service,
            gate,
            liveness,
            alerts,
            tick,
            speed: Shared::new(speed),
            motion: Shared::new(None),
            zoom: Shared::new(None),
            motion_order: Mutex::new(()),
            zoom_order: Mutex::new(()),
        }
    }

    pub fn speed_factor(&self) -> SpeedFactor {
        self.speed.snapshot()
    }

    /// Applies to the next press; an active stream keeps the intent it started with.
    pub fn set_speed_factor(&self, value: f32) -> SpeedFactor {
        let factor = SpeedFactor::new(value);
        self.speed.with(|speed| *speed = factor);
        factor
    }

    pub fn enabled(&self) -> bool {
        !self.liveness.is_cancelled() && self.gate.commands_enabled()
    }

    pub fn motion_active(&self) -> bool {
        self.motion.with(|motion| motion.is_some())
    }

    pub fn zoom_active(&self) -> bool {
        self.zoom.with(|zoom| zoom.is_some())
    }

    /// Idle -> Active: one move now, then the same move every tick.
    /// Pressing another direction while active replaces the stream without a stop.
    pub async fn press(&self, direction: Direction) -> Dispatch {
        if !self.enabled() {
            return Dispatch::Disabled;
        }
        let _order = self.motion_order.lock().await;
        let previous = self.motion.with(|motion| {
            let unchanged = motion
                .as_ref()
                .is_some_and(|active| active.direction == direction);
            (!unchanged).then(|| motion.take())
        });
        let Some(previous) = previous else {
            return Dispatch::Ignored;
        };
        if let Some(previous) = previous {
            previous.stream.stop().await;
        }
        if !self.enabled() {
            return Dispatch::Disabled;
        }

        let intent = direction.intent().scaled(self.speed_factor());
        tracing::debug!(
            "motion {} pan={:.2} tilt={:.2}",
            direction,
            intent.pan_speed,
            intent.tilt_speed
        );
        let stream = self.spawn_motion(intent);
        self.motion
            .with(|motion| *motion = Some(ActiveMotion { direction, stream }));
        Dispatch::Sent
    }

    /// Active -> Idle. Any number of release signals may arrive for one
    /// physical release; only the first one sends the stop.
    pub async fn release(&self) -> ControlResult<Dispatch> {
        let _order = self.motion_order.lock().await;
        let Some(active) = self.motion.with(Option::take) else {
            return Ok(Dispatch::Ignored);
        };
        active.stream.stop().await;
        if !self.enabled() {
            return Ok(Dispatch::Disabled);
        }
        tracing::debug!("motion {} released", active.direction);
        self.service.ptz_stop().await?;
        Ok(Dispatch::Sent)
    }

    /// The device sustains the zoom itself, so there is no repeating tick.
    pub async fn zoom_press(&self, direction: ZoomDirection) -> ControlResult<Dispatch> {
        if !self.enabled() {
            return Ok(Dispatch::Disabled);
        }
        let _order = self.zoom_order.lock().await;
        let previous = self.zoom.with(|zoom| zoom.replace(direction));
        if previous == Some(direction) {
            return Ok(Dispatch::Ignored);
        }
        let intent = ZoomIntent::toward(direction, self.speed_factor());
        tracing::debug!("zoom {} speed={:.2}", direction, intent.speed);
        if let Err(err) = self.service.ptz_zoom(intent.speed).await {
            // the device keeps whatever zoom it had before this press
            self.zoom.with(|zoom| *zoom = previous);
            return Err(err.into());
        }
        Ok(Dispatch::Sent)
    }

    pub async fn zoom_release(&self) -> ControlResult<Dispatch> {
        let _order = self.zoom_order.lock().await;
        if self.zoom.with(Option::take).is_none() {
            return Ok(Dispatch::Ignored);
        }
        if !self.enabled() {
            return Ok(Dispatch::Disabled);
        }
        self.service.ptz_zoom(ZoomIntent::IDLE.speed).await?;
        Ok(Dispatch::Sent)
    }

    pub async fn recall_preset(&self, preset: Preset) -> ControlResult<Dispatch> {
        if !self.enabled() {
            return Ok(Dispatch::Disabled);
        }
        tracing::info!("recalling preset {}", preset.number());
        self.service
            .ptz_recall_preset(preset.number(), PRESET_RECALL_SPEED)
            .await?;
        Ok(Dispatch::Sent)
    }

    /// Overwrites the stored pose, so it only happens after confirmation.
    pub async fn store_preset(
        &self,
        preset: Preset,
        prompt: &dyn ConfirmPrompt,
    ) -> ControlResult<Dispatch> {
        if !self.enabled() {
            return Ok(Dispatch::Disabled);
        }
        let question = format!("Store current position as Preset {}?", preset.number());
        if !prompt.confirm(&question).await {
            return Ok(Dispatch::Declined);
        }
        if !self.enabled() {
            return Ok(Dispatch::Disabled);
        }
        tracing::info!("storing preset {}", preset.number());
        self.service.ptz_store_preset(preset.number()).await?;
        Ok(Dispatch::Sent)
    }

    pub async fn auto_focus(&self) -> ControlResult<Dispatch> {
        if !self.enabled() {
            return Ok(Dispatch::Disabled);
        }
        self.service.ptz_auto_focus().await?;
        Ok(Dispatch::Sent)
    }

    pub async fn white_balance(&self, mode: WhiteBalance) -> ControlResult<Dispatch> {
        if !self.enabled() {
            return Ok(Dispatch::Disabled);
        }
        self.service.ptz_white_balance(mode).await?;
        Ok(Dispatch::Sent)
    }

    pub async fn exposure(&self, exposure: Exposure) -> ControlResult<Dispatch> {
        if !self.enabled() {
            return Ok(Dispatch::Disabled);
        }
        self.service.ptz_exposure(exposure).await?;
        Ok(Dispatch::Sent)
    }

    /// Synchronous cancellation of the motion stream and the zoom flag.
    pub fn teardown(&self) {
        if let Some(mut active) = self.motion.with(Option::take) {
            active.stream.cancel();
        }
        self.zoom.with(|zoom| *zoom = None);
    }

    fn spawn_motion(&self, intent: MotionIntent) -> CommandStream {
        let service = self.service.clone();
        let gate = self.gate.clone();
        let alerts = self.alerts.clone();
        CommandStream::spawn(
            "ptz motion",
            self.liveness.child_token(),
            self.tick,
            MissedTickBehavior::Delay,
            move || {
                let service = service.clone();
                let gate = gate.clone();
                let alerts = alerts.clone();
                async move {
                    if !gate.commands_enabled() {
                        tracing::debug!("viewer stopped, ending motion stream");
                        return ControlFlow::Break(());
                    }
                    if let Err(err) = service.ptz_move(intent).await {
                        tracing::warn!("ptz move failed: {}", err);
                        let _ = alerts.send(Alert::new("ptz move", err));
                    }
                    ControlFlow::Continue(())
                }
            },
        )
    }
}

impl Drop for ContinuousCommandDispatcher {
    fn drop(&mut self) {
        self.teardown();
    }
}
