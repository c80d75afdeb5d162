use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Roll/pitch/yaw in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl Orientation {
    pub fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { roll, pitch, yaw }
    }
}

/// One accepted orientation reading and the monotonic instant it was parsed.
///
/// Fields are private so a sample cannot be edited after construction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrientationSample {
    orientation: Orientation,
    acquired_at: Instant,
}

impl OrientationSample {
    pub fn new(roll: f64, pitch: f64, yaw: f64, acquired_at: Instant) -> Self {
        Self {
            orientation: Orientation::new(roll, pitch, yaw),
            acquired_at,
        }
    }

    pub fn roll(&self) -> f64 {
        self.orientation.roll
    }

    pub fn pitch(&self) -> f64 {
        self.orientation.pitch
    }

    pub fn yaw(&self) -> f64 {
        self.orientation.yaw
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn acquired_at(&self) -> Instant {
        self.acquired_at
    }
}

/// A single text line read from the sensor, line terminator removed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawPacket(String);

impl RawPacket {
    pub fn new(line: impl Into<String>) -> Self {
        RawPacket(line.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RawPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How long ago the displayed orientation was actually measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FreshnessLevel {
    Live,
    Stale,
    Old,
}

impl fmt::Display for FreshnessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FreshnessLevel::Live => "LIVE",
            FreshnessLevel::Stale => "STALE",
            FreshnessLevel::Old => "OLD",
        };
        f.write_str(label)
    }
}

/// Where the current orientation comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Reading packets from the channel.
    Live,
    /// Driven by the demo signal.
    Simulated,
    /// No usable channel yet; resolved to `Simulated` on the next tick.
    Disconnected,
}

/// Connection status of the link as seen by a display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelState {
    Disconnected,
    Connected,
    Simulated,
}
