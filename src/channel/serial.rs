use std::io::{self, Read};
use std::time::Duration;

use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};

use super::{decode_line, Channel, MAX_LINE_BYTES};
use crate::error::ChannelError;

/// Serial port adapter (8N1) for an IMU streaming `pitch,roll,yaw` lines.
pub struct SerialChannel {
    path: String,
    port: Option<Box<dyn SerialPort>>,
    partial: Vec<u8>,
    /// Dropping the rest of an overlong line up to its terminator.
    discarding: bool,
    current_timeout: Duration,
}

impl SerialChannel {
    pub fn open(path: &str, baud_rate: u32, read_timeout: Duration) -> Result<Self, ChannelError> {
        log::info!("Connecting to {} at {} baud", path, baud_rate);

        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(read_timeout)
            .open()
            .map_err(|source| ChannelError::TransportOpen {
                path: path.to_string(),
                source,
            })?;

        log::info!("Connected to {}", path);
        Ok(Self::from_port(path, port))
    }

    /// Wrap a port that is already open and configured.
    pub fn from_port(path: &str, port: Box<dyn SerialPort>) -> Self {
        let current_timeout = port.timeout();
        SerialChannel {
            path: path.to_string(),
            port: Some(port),
            partial: Vec::with_capacity(MAX_LINE_BYTES),
            discarding: false,
            current_timeout,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Channel for SerialChannel {
    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn pending_byte_count(&self) -> Result<usize, ChannelError> {
        let port = self.port.as_ref().ok_or(ChannelError::Closed)?;
        let waiting = port.bytes_to_read()? as usize;
        Ok(waiting + self.partial.len())
    }

    fn reset_input_buffer(&mut self) -> Result<(), ChannelError> {
        let port = self.port.as_mut().ok_or(ChannelError::Closed)?;
        port.clear(ClearBuffer::Input)?;
        self.partial.clear();
        self.discarding = false;
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, ChannelError> {
        let port = self.port.as_mut().ok_or(ChannelError::Closed)?;
        if self.current_timeout != timeout {
            port.set_timeout(timeout)?;
            self.current_timeout = timeout;
        }

        let mut chunk = [0u8; 256];
        loop {
            if let Some(pos) = self.partial.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.partial.drain(..=pos).collect();
                if std::mem::take(&mut self.discarding) {
                    // Tail of a line already reported as too long
                    continue;
                }
                if pos > MAX_LINE_BYTES {
                    return Err(ChannelError::LineTooLong {
                        limit: MAX_LINE_BYTES,
                    });
                }
                return decode_line(line).map(Some);
            }

            if self.partial.len() > MAX_LINE_BYTES {
                self.partial.clear();
                self.discarding = true;
                return Err(ChannelError::LineTooLong {
                    limit: MAX_LINE_BYTES,
                });
            }

            match port.read(&mut chunk) {
                Ok(0) => return Ok(None),
                Ok(n) => self.partial.extend_from_slice(&chunk[..n]),
                // Incomplete line stays buffered until its terminator arrives
                Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(None),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            self.partial.clear();
            self.discarding = false;
            log::info!("Closed {}", self.path);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serialport::TTYPort;
    use std::io::Write;

    const TIMEOUT: Duration = Duration::from_millis(100);

    /// Channel on the slave end of a pseudo-terminal, plus the master end to feed it.
    fn pty_channel() -> (SerialChannel, TTYPort) {
        let (master, slave) = TTYPort::pair().expect("pty pair");
        (SerialChannel::from_port("pty", Box::new(slave)), master)
    }

    #[test]
    fn test_reads_lines_and_strips_crlf() {
        let (mut channel, mut device) = pty_channel();
        device.write_all(b"1.0,2.0,3.0\r\n4.0,5.0,6.0\n").unwrap();

        assert_eq!(
            channel.read_line(TIMEOUT).unwrap().as_deref(),
            Some("1.0,2.0,3.0")
        );
        assert_eq!(
            channel.read_line(TIMEOUT).unwrap().as_deref(),
            Some("4.0,5.0,6.0")
        );
        assert_eq!(channel.read_line(TIMEOUT).unwrap(), None);
    }

    #[test]
    fn test_partial_line_survives_timeout() {
        let (mut channel, mut device) = pty_channel();
        device.write_all(b"1.0,2.").unwrap();

        assert_eq!(channel.read_line(TIMEOUT).unwrap(), None);
        assert_eq!(channel.pending_byte_count().unwrap(), 6);

        device.write_all(b"0,3.0\n").unwrap();
        assert_eq!(
            channel.read_line(TIMEOUT).unwrap().as_deref(),
            Some("1.0,2.0,3.0")
        );
        assert_eq!(channel.pending_byte_count().unwrap(), 0);
    }

    #[test]
    fn test_reset_drops_partial_line() {
        let (mut channel, mut device) = pty_channel();
        device.write_all(b"9.9,9.").unwrap();
        assert_eq!(channel.read_line(TIMEOUT).unwrap(), None);

        channel.reset_input_buffer().unwrap();
        assert_eq!(channel.pending_byte_count().unwrap(), 0);

        device.write_all(b"4,5,6\n").unwrap();
        assert_eq!(channel.read_line(TIMEOUT).unwrap().as_deref(), Some("4,5,6"));
    }

    #[test]
    fn test_overlong_line_in_one_write_is_dropped() {
        let (mut channel, mut device) = pty_channel();
        let mut bytes = vec![b'7'; 1200];
        bytes.extend_from_slice(b",1,2,3\n1.0,2.0,3.0\n");
        device.write_all(&bytes).unwrap();

        assert!(matches!(
            channel.read_line(TIMEOUT),
            Err(ChannelError::LineTooLong { limit: MAX_LINE_BYTES })
        ));
        assert_eq!(
            channel.read_line(TIMEOUT).unwrap().as_deref(),
            Some("1.0,2.0,3.0")
        );
    }

    #[test]
    fn test_overlong_line_tail_is_not_returned() {
        let (mut channel, mut device) = pty_channel();
        device.write_all(&[b'9'; 1030]).unwrap();

        assert!(matches!(
            channel.read_line(TIMEOUT),
            Err(ChannelError::LineTooLong { .. })
        ));

        // The rest of the same line looks like a valid packet on its own
        device.write_all(b"99999999,1.0,2.0,3.0\n4.0,5.0,6.0\n").unwrap();
        assert_eq!(
            channel.read_line(TIMEOUT).unwrap().as_deref(),
            Some("4.0,5.0,6.0")
        );
        assert_eq!(channel.read_line(TIMEOUT).unwrap(), None);
    }

    #[test]
    fn test_line_at_limit_is_kept() {
        let (mut channel, mut device) = pty_channel();
        let mut bytes = vec![b'1'; MAX_LINE_BYTES];
        bytes.push(b'\n');
        device.write_all(&bytes).unwrap();

        let line = channel.read_line(TIMEOUT).unwrap().unwrap();
        assert_eq!(line.len(), MAX_LINE_BYTES);
    }

    #[test]
    fn test_closed_channel_errors() {
        let (mut channel, _device) = pty_channel();
        channel.close();
        assert!(!channel.is_open());
        assert!(matches!(
            channel.pending_byte_count(),
            Err(ChannelError::Closed)
        ));
    }
}
