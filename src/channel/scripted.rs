use std::cell::Cell;
use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use super::{decode_line, Channel};
use crate::error::ChannelError;

/// In-memory channel fed by the caller.
///
/// Bytes pushed in are returned line by line; a trailing fragment without a
/// newline behaves like a read timeout. Used for dry runs and tests.
#[derive(Debug)]
pub struct ScriptedChannel {
    buffer: VecDeque<u8>,
    open: bool,
    advisory_reset: bool,
    fail_read_in: Option<usize>,
    fail_next_reset: bool,
    fail_pending: Cell<usize>,
    calls: Cell<usize>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        ScriptedChannel {
            buffer: VecDeque::new(),
            open: true,
            advisory_reset: false,
            fail_read_in: None,
            fail_next_reset: false,
            fail_pending: Cell::new(0),
            calls: Cell::new(0),
        }
    }

    /// Make `reset_input_buffer` a no-op, like transports where the reset is
    /// only a hint.
    pub fn with_advisory_reset(mut self) -> Self {
        self.advisory_reset = true;
        self
    }

    pub fn push_line(&mut self, line: &str) {
        self.buffer.extend(line.as_bytes());
        self.buffer.push_back(b'\n');
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend(bytes);
    }

    pub fn fail_next_read(&mut self) {
        self.fail_read_in = Some(0);
    }

    /// Let `reads` more reads succeed, then fail the one after.
    pub fn fail_read_after(&mut self, reads: usize) {
        self.fail_read_in = Some(reads);
    }

    pub fn fail_next_reset(&mut self) {
        self.fail_next_reset = true;
    }

    /// Fail the next `count` pending-byte queries.
    pub fn fail_pending_count(&mut self, count: usize) {
        self.fail_pending.set(count);
    }

    /// Number of trait method calls seen so far.
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    /// Complete lines still waiting to be read.
    pub fn buffered_lines(&self) -> usize {
        self.buffer.iter().filter(|&&b| b == b'\n').count()
    }

    fn record_call(&self) {
        self.calls.set(self.calls.get() + 1);
    }
}

impl Default for ScriptedChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Channel for ScriptedChannel {
    fn is_open(&self) -> bool {
        self.record_call();
        self.open
    }

    fn pending_byte_count(&self) -> Result<usize, ChannelError> {
        self.record_call();
        if !self.open {
            return Err(ChannelError::Closed);
        }
        let failures = self.fail_pending.get();
        if failures > 0 {
            self.fail_pending.set(failures - 1);
            return Err(io::Error::new(io::ErrorKind::Other, "scripted pending-count failure").into());
        }
        Ok(self.buffer.len())
    }

    fn reset_input_buffer(&mut self) -> Result<(), ChannelError> {
        self.record_call();
        if !self.open {
            return Err(ChannelError::Closed);
        }
        if self.fail_next_reset {
            self.fail_next_reset = false;
            return Err(io::Error::new(io::ErrorKind::Other, "scripted reset failure").into());
        }
        if !self.advisory_reset {
            self.buffer.clear();
        }
        Ok(())
    }

    fn read_line(&mut self, _timeout: Duration) -> Result<Option<String>, ChannelError> {
        self.record_call();
        if !self.open {
            return Err(ChannelError::Closed);
        }
        match self.fail_read_in {
            Some(0) => {
                self.fail_read_in = None;
                return Err(
                    io::Error::new(io::ErrorKind::BrokenPipe, "scripted read failure").into(),
                );
            }
            Some(n) => self.fail_read_in = Some(n - 1),
            None => {}
        }

        match self.buffer.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                let line: Vec<u8> = self.buffer.drain(..=pos).collect();
                decode_line(line).map(Some)
            }
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        self.record_call();
        self.open = false;
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(10);

    #[test]
    fn test_lines_come_back_in_order() {
        let mut channel = ScriptedChannel::new();
        channel.push_line("a");
        channel.push_line("b");

        assert_eq!(channel.read_line(TIMEOUT).unwrap().as_deref(), Some("a"));
        assert_eq!(channel.read_line(TIMEOUT).unwrap().as_deref(), Some("b"));
        assert_eq!(channel.read_line(TIMEOUT).unwrap(), None);
    }

    #[test]
    fn test_partial_line_waits_for_terminator() {
        let mut channel = ScriptedChannel::new();
        channel.push_bytes(b"1.0,2.");
        assert_eq!(channel.read_line(TIMEOUT).unwrap(), None);
        assert_eq!(channel.pending_byte_count().unwrap(), 6);

        channel.push_bytes(b"0,3.0\n");
        assert_eq!(
            channel.read_line(TIMEOUT).unwrap().as_deref(),
            Some("1.0,2.0,3.0")
        );
    }

    #[test]
    fn test_advisory_reset_keeps_data() {
        let mut channel = ScriptedChannel::new().with_advisory_reset();
        channel.push_line("x");
        channel.reset_input_buffer().unwrap();
        assert_eq!(channel.buffered_lines(), 1);
    }

    #[test]
    fn test_closed_channel_errors() {
        let mut channel = ScriptedChannel::new();
        channel.close();
        assert!(!channel.is_open());
        assert!(matches!(
            channel.read_line(TIMEOUT),
            Err(ChannelError::Closed)
        ));
    }
}
