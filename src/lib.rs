// Real-time serial IMU
// Keeps only the newest orientation packet from a serial sensor and bounds
// receive-buffer backlog so the displayed state never lags the device.

pub mod channel;
pub mod config;
pub mod controller;
pub mod demo;
pub mod error;
pub mod freshness;
pub mod governor;
pub mod live_status;
pub mod parser;
pub mod selector;
pub mod types;

pub use channel::{Channel, ScriptedChannel, SerialChannel};
pub use controller::{ControllerSettings, ModeController, OrientationState, Snapshot, TickOutcome};
pub use error::{ChannelError, ParseError};
pub use freshness::FreshnessTracker;
pub use governor::{BufferGovernor, BufferPolicy, FlushDecision};
pub use types::{ChannelState, FreshnessLevel, Mode, Orientation, OrientationSample, RawPacket};
