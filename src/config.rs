use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::controller::ControllerSettings;
use crate::freshness::FreshnessTracker;
use crate::governor::BufferPolicy;

/// Process configuration. Times are in seconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub port: String,
    pub baud_rate: u32,
    pub clear_interval_secs: f64,
    pub max_pending_bytes: usize,
    pub drain_safety_limit: usize,
    pub read_timeout_secs: f64,
    pub drain_read_timeout_secs: f64,
    /// ≈40 Hz
    pub tick_interval_secs: f64,
    /// Wait after opening for the board to finish its reset.
    pub settle_secs: f64,
    pub live_within_secs: f64,
    pub stale_within_secs: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: "/dev/ttyACM0".to_string(),
            baud_rate: 115_200,
            clear_interval_secs: 0.05,
            max_pending_bytes: 100,
            drain_safety_limit: 50,
            read_timeout_secs: 0.01,
            drain_read_timeout_secs: 0.001,
            tick_interval_secs: 0.025,
            settle_secs: 2.0,
            live_within_secs: 0.5,
            stale_within_secs: 2.0,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.port.is_empty() {
            bail!("port must not be empty");
        }
        if self.baud_rate == 0 {
            bail!("baud_rate must be positive");
        }
        for (name, value) in [
            ("clear_interval_secs", self.clear_interval_secs),
            ("read_timeout_secs", self.read_timeout_secs),
            ("drain_read_timeout_secs", self.drain_read_timeout_secs),
            ("settle_secs", self.settle_secs),
            ("live_within_secs", self.live_within_secs),
            ("stale_within_secs", self.stale_within_secs),
        ] {
            secs(name, value)?;
        }
        if secs("tick_interval_secs", self.tick_interval_secs)?.is_zero() {
            bail!("tick_interval_secs must be greater than zero");
        }
        if self.stale_within_secs <= self.live_within_secs {
            bail!(
                "stale_within_secs ({}) must exceed live_within_secs ({})",
                self.stale_within_secs,
                self.live_within_secs
            );
        }
        Ok(())
    }

    pub fn buffer_policy(&self) -> Result<BufferPolicy> {
        Ok(BufferPolicy {
            clear_interval: secs("clear_interval_secs", self.clear_interval_secs)?,
            max_pending_bytes: self.max_pending_bytes,
            drain_safety_limit: self.drain_safety_limit,
            drain_read_timeout: secs("drain_read_timeout_secs", self.drain_read_timeout_secs)?,
        })
    }

    pub fn controller_settings(&self) -> Result<ControllerSettings> {
        Ok(ControllerSettings {
            policy: self.buffer_policy()?,
            read_timeout: self.read_timeout()?,
            freshness: FreshnessTracker::new(
                secs("live_within_secs", self.live_within_secs)?,
                secs("stale_within_secs", self.stale_within_secs)?,
            ),
        })
    }

    pub fn read_timeout(&self) -> Result<Duration> {
        secs("read_timeout_secs", self.read_timeout_secs)
    }

    pub fn tick_interval(&self) -> Result<Duration> {
        secs("tick_interval_secs", self.tick_interval_secs)
    }

    pub fn settle_time(&self) -> Result<Duration> {
        secs("settle_secs", self.settle_secs)
    }
}

fn secs(name: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .with_context(|| format!("{} must be a finite, non-negative number of seconds, got {}", name, value))
}
