use std::time::Instant;

use crate::error::ParseError;
use crate::types::{OrientationSample, RawPacket};

/// Wire order of the three angle fields.
///
/// The sensor sends pitch first even though displays list roll first; the
/// mapping is kept as the firmware emits it.
const FIELD_ORDER: [&str; 3] = ["pitch", "roll", "yaw"];

/// Parse a `pitch,roll,yaw` line, stamping it with the current instant.
pub fn parse_packet(packet: &RawPacket) -> Result<OrientationSample, ParseError> {
    parse_packet_at(packet, Instant::now())
}

/// Parse a `pitch,roll,yaw` line acquired at `acquired_at`.
///
/// Fields past the third are ignored. Values are not range checked.
pub fn parse_packet_at(
    packet: &RawPacket,
    acquired_at: Instant,
) -> Result<OrientationSample, ParseError> {
    let fields: Vec<&str> = packet.as_str().split(',').collect();
    if fields.len() < FIELD_ORDER.len() {
        return Err(ParseError::MalformedFieldCount {
            found: fields.len(),
        });
    }

    let mut values = [0.0f64; 3];
    for (slot, (name, raw)) in values.iter_mut().zip(FIELD_ORDER.into_iter().zip(&fields)) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|_| ParseError::MalformedNumeric {
                field: name,
                value: raw.to_string(),
            })?;
    }

    let [pitch, roll, yaw] = values;
    Ok(OrientationSample::new(roll, pitch, yaw, acquired_at))
}
