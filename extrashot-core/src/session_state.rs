//! Local view of the viewer and output sessions, and the wire shapes that feed it.

use crate::error::{ControlError, ControlResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Stopped,
    Running,
}

/// "Currently watching a given source."
///
/// `Stopped` never carries a source. `Running` normally carries the selected
/// source, but the "running implies a source" rule is relaxed for one case: the
/// controller reports a running viewer without naming its source and nothing
/// was selected locally. `current_source` is then `None` and callers must treat
/// the source as unknown.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewerSession {
    state: SessionState,
    current_source: Option<String>,
}

impl ViewerSession {
    pub fn running(source: impl Into<String>) -> Self {
        Self {
            state: SessionState::Running,
            current_source: Some(source.into()),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    pub fn current_source(&self) -> Option<&str> {
        self.current_source.as_deref()
    }

    /// Remote truth overwrites the local fields.
    pub(crate) fn merge_status(&mut self, status: &ViewerStatus) {
        if !status.running {
            *self = ViewerSession::default();
            return;
        }
        let source = match &status.source {
            Some(source) => Some(source.clone()),
            None if self.is_running() => self.current_source.take(),
            None => None,
        };
        self.state = SessionState::Running;
        self.current_source = source;
    }
}

/// "Currently transmitting a captured feed as a source."
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutputSession {
    state: SessionState,
    name: Option<String>,
    device: Option<String>,
    resolution: Option<String>,
}

impl OutputSession {
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    pub fn name(&self) -> Option<&str> {
        self.running_field(&self.name)
    }

    pub fn device(&self) -> Option<&str> {
        self.running_field(&self.device)
    }

    pub fn resolution(&self) -> Option<&str> {
        self.running_field(&self.resolution)
    }

    fn running_field<'a>(&self, field: &'a Option<String>) -> Option<&'a str> {
        if self.is_running() {
            field.as_deref()
        } else {
            None
        }
    }

    pub(crate) fn started(config: &OutputConfig) -> Self {
        Self {
            state: SessionState::Running,
            name: Some(config.name.clone()),
            device: Some(config.device.clone()),
            resolution: Some(config.resolution()),
        }
    }

    pub(crate) fn merge_status(&mut self, status: &OutputStatus) {
        if !status.running {
            *self = OutputSession::default();
            return;
        }
        *self = Self {
            state: SessionState::Running,
            name: status.name.clone(),
            device: status.device.clone(),
            resolution: status.resolution.clone(),
        };
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ViewerStatus {
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OutputStatus {
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
}

/// Options sent with `viewer.start` and `viewer.switch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewerOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<String>,
    pub audio: bool,
    pub fullscreen: bool,
    pub resolution: String,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            backup: None,
            audio: false,
            fullscreen: true,
            resolution: "1920x1080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureKind {
    V4l2,
    Libcamera,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CaptureDevice {
    pub path: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CaptureKind,
}

impl CaptureDevice {
    /// Cameras only, and for V4L2 nodes only the primary (even-numbered) one.
    pub fn is_primary_camera(&self) -> bool {
        let is_camera = ["Webcam", "Camera", "USB"]
            .iter()
            .any(|needle| self.name.contains(needle))
            || self.kind == CaptureKind::Libcamera;
        is_camera && video_node_number(&self.path).is_none_or(|number| number % 2 == 0)
    }
}

fn video_node_number(path: &str) -> Option<u32> {
    let (_, tail) = path.rsplit_once("video")?;
    if tail.is_empty() || !tail.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    tail.parse().ok()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DeviceList {
    #[serde(default)]
    pub devices: Vec<CaptureDevice>,
}

pub const OUTPUT_FPS_CHOICES: [u32; 5] = [24, 25, 30, 50, 60];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputConfig {
    pub name: String,
    pub device: String,
    #[serde(rename = "type")]
    pub kind: CaptureKind,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            name: "Pi Camera".to_string(),
            device: String::new(),
            kind: CaptureKind::V4l2,
            width: 1920,
            height: 1080,
            fps: 30,
            groups: None,
        }
    }
}

impl OutputConfig {
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Selects the first device when none has been chosen yet.
    pub fn with_first_device(mut self, devices: &[CaptureDevice]) -> Self {
        if self.device.is_empty() {
            if let Some(first) = devices.first() {
                self.device = first.path.clone();
                self.kind = first.kind;
            }
        }
        self
    }

    pub fn validate(&self) -> ControlResult<()> {
        if self.device.trim().is_empty() {
            return Err(ControlError::validation("select a camera device"));
        }
        if self.name.trim().is_empty() {
            return Err(ControlError::validation("stream name is required"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ControlError::validation("resolution must be non-zero"));
        }
        if !OUTPUT_FPS_CHOICES.contains(&self.fps) {
            return Err(ControlError::validation(format!(
                "fps must be one of {OUTPUT_FPS_CHOICES:?}"
            )));
        }
        Ok(())
    }
}
