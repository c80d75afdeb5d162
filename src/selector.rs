use std::time::Duration;

use crate::channel::Channel;
use crate::types::RawPacket;

/// Result of draining the channel once.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub packet: Option<RawPacket>,
    /// Non-empty lines that were superseded by a newer one.
    pub discarded: usize,
}

/// Read every complete line currently available and keep only the newest.
///
/// Stops early on a read timeout or transport error, keeping whatever
/// candidate was already captured.
pub fn select_latest<C: Channel + ?Sized>(channel: &mut C, read_timeout: Duration) -> Selection {
    let mut selection = Selection::default();

    loop {
        match channel.pending_byte_count() {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                log::debug!("Pending count failed mid-drain: {}", e);
                break;
            }
        }

        let line = match channel.read_line(read_timeout) {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::debug!("Read aborted drain: {}", e);
                break;
            }
        };

        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if selection.packet.is_some() {
            selection.discarded += 1;
        }
        selection.packet = Some(RawPacket::new(text));
    }

    selection
}
