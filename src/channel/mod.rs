//! Byte channel the sensor is attached to.
//!
//! The pipeline only needs a handful of primitives from the transport: how
//! many bytes are waiting, a line read bounded by a timeout, and an input
//! reset. Everything else about the link (baud rate, framing) belongs to the
//! concrete adapter.

pub mod scripted;
pub mod serial;

use std::time::Duration;

use crate::error::ChannelError;

pub use scripted::ScriptedChannel;
pub use serial::SerialChannel;

/// Longest line the adapters will buffer while waiting for a terminator.
pub const MAX_LINE_BYTES: usize = 1024;

pub trait Channel {
    fn is_open(&self) -> bool;

    /// Unread bytes currently available, including any partial line already
    /// pulled off the transport.
    fn pending_byte_count(&self) -> Result<usize, ChannelError>;

    /// Ask the transport to drop everything in its receive buffer.
    fn reset_input_buffer(&mut self) -> Result<(), ChannelError>;

    /// Read one line, waiting at most `timeout` for more bytes.
    ///
    /// Returns `Ok(None)` if no complete line arrived in time.
    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, ChannelError>;

    fn close(&mut self);
}

/// Turn the bytes of one line (terminator included) into text.
pub(crate) fn decode_line(mut bytes: Vec<u8>) -> Result<String, ChannelError> {
    while matches!(bytes.last(), Some(b'\n' | b'\r')) {
        bytes.pop();
    }
    String::from_utf8(bytes).map_err(|_| ChannelError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_strips_crlf() {
        let line = decode_line(b"1.0,2.0,3.0\r\n".to_vec()).unwrap();
        assert_eq!(line, "1.0,2.0,3.0");
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        let result = decode_line(vec![0xff, 0xfe, b'\n']);
        assert!(matches!(result, Err(ChannelError::Decode)));
    }
}
