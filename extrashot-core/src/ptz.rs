//! Pan-tilt-zoom intents and the values they are built from.

use crate::error::{ControlError, ControlResult};
use strum::{Display, EnumIter, EnumString};

pub const PTZ_AXIS_MIN: f32 = -1.0;
pub const PTZ_AXIS_MAX: f32 = 1.0;
pub const PRESET_MIN: u8 = 1;
pub const PRESET_MAX: u8 = 6;
pub const PRESET_RECALL_SPEED: f32 = 1.0;

/// Multiplier applied to every motion and zoom intent before transmission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedFactor(f32);

impl SpeedFactor {
    pub const MIN: f32 = 0.1;
    pub const MAX: f32 = 1.0;
    pub const DEFAULT: f32 = 0.5;

    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self(Self::DEFAULT);
        }
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    pub fn percent(self) -> u32 {
        (self.0 * 100.0).round() as u32
    }
}

impl Default for SpeedFactor {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionIntent {
    pub pan_speed: f32,
    pub tilt_speed: f32,
}

impl MotionIntent {
    pub fn new(pan_speed: f32, tilt_speed: f32) -> Self {
        Self {
            pan_speed: clamp_axis(pan_speed),
            tilt_speed: clamp_axis(tilt_speed),
        }
    }

    pub fn scaled(self, factor: SpeedFactor) -> Self {
        Self::new(self.pan_speed * factor.value(), self.tilt_speed * factor.value())
    }
}

fn clamp_axis(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(PTZ_AXIS_MIN, PTZ_AXIS_MAX)
}

/// Directional pad of the pan/tilt head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    UpLeft,
    UpRight,
    DownLeft,
    DownRight,
}

impl Direction {
    pub fn intent(self) -> MotionIntent {
        match self {
            Direction::Up => MotionIntent::new(0.0, 1.0),
            Direction::Down => MotionIntent::new(0.0, -1.0),
            Direction::Left => MotionIntent::new(-1.0, 0.0),
            Direction::Right => MotionIntent::new(1.0, 0.0),
            Direction::UpLeft => MotionIntent::new(-0.5, 0.5),
            Direction::UpRight => MotionIntent::new(0.5, 0.5),
            Direction::DownLeft => MotionIntent::new(-0.5, -0.5),
            Direction::DownRight => MotionIntent::new(0.5, -0.5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ZoomDirection {
    In,
    Out,
}

/// Zoom speed in `{-1, 0, 1}` before scaling; `0` stops the zoom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomIntent {
    pub speed: f32,
}

impl ZoomIntent {
    pub const IDLE: ZoomIntent = ZoomIntent { speed: 0.0 };

    pub fn toward(direction: ZoomDirection, factor: SpeedFactor) -> Self {
        let sign = match direction {
            ZoomDirection::In => 1.0,
            ZoomDirection::Out => -1.0,
        };
        Self {
            speed: sign * factor.value(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Preset(u8);

impl Preset {
    pub fn new(number: u8) -> ControlResult<Self> {
        if !(PRESET_MIN..=PRESET_MAX).contains(&number) {
            return Err(ControlError::validation(format!(
                "preset must be between {PRESET_MIN} and {PRESET_MAX}"
            )));
        }
        Ok(Self(number))
    }

    pub fn number(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Preset {
    type Error = ControlError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Preset::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WhiteBalance {
    Auto,
    Indoor,
    Outdoor,
    OneShot,
    Manual { red: f32, blue: f32 },
}

impl WhiteBalance {
    pub fn mode(&self) -> &'static str {
        match self {
            WhiteBalance::Auto => "auto",
            WhiteBalance::Indoor => "indoor",
            WhiteBalance::Outdoor => "outdoor",
            WhiteBalance::OneShot => "oneshot",
            WhiteBalance::Manual { .. } => "manual",
        }
    }

    pub fn gains(&self) -> Option<(f32, f32)> {
        match self {
            WhiteBalance::Manual { red, blue } => Some((*red, *blue)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Exposure {
    Auto,
    Manual { level: f32 },
}
