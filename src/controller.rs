use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::channel::Channel;
use crate::demo::DemoSignal;
use crate::error::{ChannelError, ParseError};
use crate::freshness::FreshnessTracker;
use crate::governor::{flush_input, BufferGovernor, BufferPolicy, GovernOutcome};
use crate::parser::parse_packet_at;
use crate::selector::select_latest;
use crate::types::{ChannelState, FreshnessLevel, Mode, Orientation, OrientationSample};

/// Accepted samples between periodic debug prints.
const REPORT_EVERY: u64 = 50;

/// The orientation currently shown, plus when it was last measured.
///
/// Only accepted samples, the demo signal and explicit resets change it. No
/// smoothing: every accepted sample replaces the previous one outright.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OrientationState {
    current: Orientation,
    last_accepted: Option<Instant>,
}

impl OrientationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn orientation(&self) -> Orientation {
        self.current
    }

    pub fn last_accepted(&self) -> Option<Instant> {
        self.last_accepted
    }

    pub fn accept(&mut self, sample: &OrientationSample) {
        self.current = sample.orientation();
        self.last_accepted = Some(sample.acquired_at());
    }

    /// Zero the angles. The acceptance time is left alone.
    pub fn reset(&mut self) {
        self.current = Orientation::default();
    }

    fn apply_simulated(&mut self, orientation: Orientation) {
        self.current = orientation;
    }
}

/// Tunables for the live polling path.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControllerSettings {
    pub policy: BufferPolicy,
    pub read_timeout: Duration,
    pub freshness: FreshnessTracker,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        ControllerSettings {
            policy: BufferPolicy::default(),
            read_timeout: Duration::from_millis(10),
            freshness: FreshnessTracker::default(),
        }
    }
}

/// Running counters for diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickStats {
    pub accepted: u64,
    pub rejected: u64,
    /// Packets dropped because a newer one arrived in the same tick.
    pub skipped_packets: u64,
    pub flushes: u64,
    pub flushed_lines: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TickOutcome {
    Accepted { discarded: usize },
    Rejected(ParseError),
    NoData,
    Simulated,
}

/// Read-only view handed to displays between ticks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Snapshot {
    pub orientation: Orientation,
    pub freshness: FreshnessLevel,
    pub mode: Mode,
    pub channel_state: ChannelState,
    pub pending_bytes: Option<usize>,
    pub stats: TickStats,
}

/// Chooses between the live channel and the demo signal and runs one poll
/// cycle per tick. Owns all mutable pipeline state.
pub struct ModeController<C: Channel> {
    channel: Option<C>,
    mode: Mode,
    state: OrientationState,
    governor: BufferGovernor,
    freshness: FreshnessTracker,
    read_timeout: Duration,
    demo: DemoSignal,
    stats: TickStats,
}

impl<C: Channel> ModeController<C> {
    /// Start in `Live` on an open channel, clearing whatever it buffered
    /// before we started listening.
    pub fn live(mut channel: C, settings: ControllerSettings) -> Self {
        match flush_input(&mut channel, &settings.policy) {
            Ok(_) => log::info!("Real-time buffer management enabled"),
            Err(e) => log::warn!("Initial buffer clear failed: {}", e),
        }

        Self::build(Some(channel), Mode::Live, settings)
    }

    /// Start with no channel. The first tick moves to `Simulated`.
    pub fn disconnected(settings: ControllerSettings) -> Self {
        Self::build(None, Mode::Disconnected, settings)
    }

    /// Start from the result of opening a channel, falling back to
    /// `Simulated` if that failed.
    pub fn open(channel: Result<C, ChannelError>, settings: ControllerSettings) -> Self {
        match channel {
            Ok(channel) => Self::live(channel, settings),
            Err(e) => {
                log::warn!("Serial connection failed: {}", e);
                let mut controller = Self::disconnected(settings);
                controller.set_mode(Mode::Simulated);
                controller
            }
        }
    }

    fn build(channel: Option<C>, mode: Mode, settings: ControllerSettings) -> Self {
        ModeController {
            channel,
            mode,
            state: OrientationState::new(),
            governor: BufferGovernor::new(settings.policy),
            freshness: settings.freshness,
            read_timeout: settings.read_timeout,
            demo: DemoSignal::new(),
            stats: TickStats::default(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn channel(&self) -> Option<&C> {
        self.channel.as_ref()
    }

    pub fn state(&self) -> &OrientationState {
        &self.state
    }

    pub fn orientation(&self) -> Orientation {
        self.state.orientation()
    }

    pub fn stats(&self) -> TickStats {
        self.stats
    }

    pub fn freshness(&self, now: Instant) -> FreshnessLevel {
        self.freshness.classify(now, self.state.last_accepted())
    }

    pub fn channel_state(&self) -> ChannelState {
        match (self.mode, &self.channel) {
            (Mode::Simulated, _) => ChannelState::Simulated,
            (_, Some(channel)) if channel.is_open() => ChannelState::Connected,
            _ => ChannelState::Disconnected,
        }
    }

    /// Unread bytes on the channel, if there is one and it answers.
    pub fn pending_bytes(&self) -> Option<usize> {
        self.channel
            .as_ref()
            .and_then(|channel| channel.pending_byte_count().ok())
    }

    pub fn snapshot(&self, now: Instant) -> Snapshot {
        Snapshot {
            orientation: self.orientation(),
            freshness: self.freshness(now),
            mode: self.mode,
            channel_state: self.channel_state(),
            pending_bytes: self.pending_bytes(),
            stats: self.stats,
        }
    }

    /// One poll cycle. Never fails: transport and parse problems leave the
    /// orientation unchanged and show up later as staleness.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        match self.mode {
            Mode::Live => self.poll_live(now),
            Mode::Simulated => self.simulate(),
            Mode::Disconnected => {
                self.set_mode(Mode::Simulated);
                self.simulate()
            }
        }
    }

    fn simulate(&mut self) -> TickOutcome {
        let orientation = self.demo.step();
        self.state.apply_simulated(orientation);
        TickOutcome::Simulated
    }

    fn poll_live(&mut self, now: Instant) -> TickOutcome {
        let channel = match self.channel.as_mut() {
            Some(channel) => channel,
            None => {
                self.set_mode(Mode::Disconnected);
                return TickOutcome::NoData;
            }
        };

        if let GovernOutcome::Flushed { discarded, .. } = self.governor.govern(now, channel) {
            self.stats.flushes += 1;
            self.stats.flushed_lines += discarded as u64;
        }

        let selection = select_latest(channel, self.read_timeout);
        let Some(packet) = selection.packet else {
            return TickOutcome::NoData;
        };

        if selection.discarded > 0 {
            log::debug!(
                "Skipped {} old packets - using latest",
                selection.discarded
            );
            self.stats.skipped_packets += selection.discarded as u64;
        }

        match parse_packet_at(&packet, now) {
            Ok(sample) => {
                self.state.accept(&sample);
                self.stats.accepted += 1;
                if self.stats.accepted % REPORT_EVERY == 0 {
                    log::debug!(
                        "Real-time data #{}: Roll={:.1} Pitch={:.1} Yaw={:.1}",
                        self.stats.accepted,
                        sample.roll(),
                        sample.pitch(),
                        sample.yaw()
                    );
                }
                TickOutcome::Accepted {
                    discarded: selection.discarded,
                }
            }
            Err(e) => {
                log::warn!("Parse error: {:?} ({})", packet.as_str(), e);
                self.stats.rejected += 1;
                TickOutcome::Rejected(e)
            }
        }
    }

    /// Zero the orientation in any mode.
    pub fn reset(&mut self) {
        self.state.reset();
        log::info!("Reset orientation");
    }

    /// Switch between live data and the demo signal.
    ///
    /// Without a channel there is nothing to go live on, so the mode stays
    /// `Simulated`.
    pub fn toggle_simulated(&mut self) -> Mode {
        let next = match self.mode {
            Mode::Live => Mode::Simulated,
            Mode::Simulated | Mode::Disconnected if self.channel.is_some() => Mode::Live,
            Mode::Simulated | Mode::Disconnected => {
                log::warn!("No serial connection, staying in demo mode");
                Mode::Simulated
            }
        };
        self.set_mode(next);
        self.mode
    }

    /// Flush the channel outside the periodic schedule. Only acts in `Live`.
    pub fn manual_flush(&mut self) -> Option<usize> {
        if self.mode != Mode::Live {
            return None;
        }
        let channel = self.channel.as_mut()?;
        match flush_input(channel, self.governor.policy()) {
            Ok(discarded) => {
                log::info!("Manual buffer clear");
                self.stats.flushes += 1;
                self.stats.flushed_lines += discarded as u64;
                Some(discarded)
            }
            Err(e) => {
                log::warn!("Manual buffer clear failed: {}", e);
                None
            }
        }
    }

    pub fn shutdown(&mut self) {
        if let Some(channel) = self.channel.as_mut() {
            channel.close();
        }
    }

    fn set_mode(&mut self, mode: Mode) {
        if self.mode == mode {
            return;
        }
        log::info!("Mode: {:?} -> {:?}", self.mode, mode);
        self.mode = mode;
    }
}
