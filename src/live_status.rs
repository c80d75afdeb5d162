use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::controller::{Snapshot, TickStats};
use crate::types::{ChannelState, FreshnessLevel, Mode};

/// Status written for external displays, refreshed by the binary.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LiveStatus {
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub mode: Mode,
    pub channel_state: ChannelState,
    /// Absent in simulated mode, where freshness is meaningless.
    pub freshness: Option<FreshnessLevel>,
    pub buffer_bytes: usize,
    pub stats: TickStats,
}

impl LiveStatus {
    pub fn from_snapshot(snapshot: &Snapshot, uptime_seconds: u64) -> Self {
        let freshness = match snapshot.mode {
            Mode::Live => Some(snapshot.freshness),
            Mode::Simulated | Mode::Disconnected => None,
        };

        LiveStatus {
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_seconds,
            roll: snapshot.orientation.roll,
            pitch: snapshot.orientation.pitch,
            yaw: snapshot.orientation.yaw,
            mode: snapshot.mode,
            channel_state: snapshot.channel_state,
            freshness,
            buffer_bytes: snapshot.pending_bytes.unwrap_or(0),
            stats: snapshot.stats,
        }
    }

    /// One-line summary for the console.
    pub fn summary(&self) -> String {
        let source = match self.freshness {
            Some(level) => format!("REAL-TIME {}", level),
            None => "DEMO".to_string(),
        };
        format!(
            "{}: Roll={:.1} Pitch={:.1} Yaw={:.1} | Buffer: {} bytes | Packets: {}",
            source, self.roll, self.pitch, self.yaw, self.buffer_bytes, self.stats.accepted
        )
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Orientation;

    fn snapshot(mode: Mode) -> Snapshot {
        Snapshot {
            orientation: Orientation::new(1.5, -2.5, 90.0),
            freshness: FreshnessLevel::Stale,
            mode,
            channel_state: ChannelState::Connected,
            pending_bytes: Some(42),
            stats: TickStats {
                accepted: 7,
                ..TickStats::default()
            },
        }
    }

    #[test]
    fn test_summary_live() {
        let status = LiveStatus::from_snapshot(&snapshot(Mode::Live), 3);
        assert_eq!(
            status.summary(),
            "REAL-TIME STALE: Roll=1.5 Pitch=-2.5 Yaw=90.0 | Buffer: 42 bytes | Packets: 7"
        );
    }

    #[test]
    fn test_simulated_has_no_freshness() {
        let status = LiveStatus::from_snapshot(&snapshot(Mode::Simulated), 3);
        assert_eq!(status.freshness, None);
        assert!(status.summary().starts_with("DEMO:"));
    }

    #[test]
    fn test_json_shape() {
        let status = LiveStatus::from_snapshot(&snapshot(Mode::Live), 3);
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["freshness"], "STALE");
        assert_eq!(value["buffer_bytes"], 42);
        assert_eq!(value["stats"]["accepted"], 7);

        let back: LiveStatus = serde_json::from_value(value).unwrap();
        assert_eq!(back, status);
    }
}
