//! Serial I/O adapter.
//!
//! [`SerialPort`] is the capability the session needs from the host: byte-
//! granular blocking reads with a configurable timeout, writes, discarding
//! buffered input, and native DTR/RTS control for direct-mode reset. It is
//! injected into the session rather than looked up from a process-wide
//! singleton, so tests can swap in [`MockSerialPort`] and drive a session
//! deterministically against a simulated radio.

use crate::error::Error;
use std::io::{Read, Write};
use std::time::Duration;

/// The serial capability a session depends on.
pub trait SerialPort {
    /// Reads exactly one byte, blocking up to the adapter's configured
    /// timeout. Returns [`Error::Timeout`] if none arrives in time.
    fn recv_byte(&mut self) -> Result<u8, Error>;

    /// Writes all of `bytes`.
    fn send(&mut self, bytes: &[u8]) -> Result<(), Error>;

    /// Discards any buffered inbound bytes.
    fn drain(&mut self) -> Result<(), Error>;

    /// Sets the DTR and RTS lines, used to reset a target wired directly to
    /// the host (direct mode only).
    fn set_dtr_rts(&mut self, asserted: bool) -> Result<(), Error>;
}

/// A [`SerialPort`] backed by a real host serial device.
pub struct RealSerialPort {
    port: Box<dyn serialport::SerialPort>,
}

impl RealSerialPort {
    /// Opens `device` at `baud`, with a 1000 ms read timeout (wireless-grade
    /// latency; see the session's boot sequence).
    pub fn open(device: &str, baud: u32) -> Result<Self, Error> {
        let port = serialport::new(device, baud)
            .timeout(Duration::from_millis(1000))
            .open()
            .map_err(|_| Error::Config("failed to open serial device"))?;
        Ok(RealSerialPort { port })
    }
}

impl SerialPort for RealSerialPort {
    fn recv_byte(&mut self) -> Result<u8, Error> {
        let mut buf = [0u8; 1];
        match self.port.read_exact(&mut buf) {
            Ok(()) => Ok(buf[0]),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Err(Error::Timeout),
            Err(_) => Err(Error::Timeout),
        }
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.port
            .write_all(bytes)
            .map_err(|_| Error::Unusable)
    }

    fn drain(&mut self) -> Result<(), Error> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(|_| Error::Unusable)
    }

    fn set_dtr_rts(&mut self, asserted: bool) -> Result<(), Error> {
        self.port
            .write_data_terminal_ready(asserted)
            .map_err(|_| Error::Unusable)?;
        self.port
            .write_request_to_send(asserted)
            .map_err(|_| Error::Unusable)
    }
}

/// An in-memory [`SerialPort`] for deterministic tests: an inbound byte
/// queue the test pushes bytes onto, and an outbound buffer the test
/// inspects.
#[derive(Debug, Default)]
pub struct MockSerialPort {
    inbound: std::collections::VecDeque<u8>,
    pub outbound: Vec<u8>,
    pub dtr_rts: Option<bool>,
}

impl MockSerialPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues bytes for a future `recv_byte` to return.
    pub fn push_inbound(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes);
    }
}

impl SerialPort for MockSerialPort {
    fn recv_byte(&mut self) -> Result<u8, Error> {
        self.inbound.pop_front().ok_or(Error::Timeout)
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.outbound.extend_from_slice(bytes);
        Ok(())
    }

    fn drain(&mut self) -> Result<(), Error> {
        self.inbound.clear();
        Ok(())
    }

    fn set_dtr_rts(&mut self, asserted: bool) -> Result<(), Error> {
        self.dtr_rts = Some(asserted);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_round_trips_bytes() {
        let mut port = MockSerialPort::new();
        port.push_inbound(&[1, 2, 3]);
        assert_eq!(port.recv_byte().unwrap(), 1);
        assert_eq!(port.recv_byte().unwrap(), 2);
        assert_eq!(port.recv_byte().unwrap(), 3);
        assert_eq!(port.recv_byte(), Err(Error::Timeout));
    }

    #[test]
    fn mock_captures_outbound() {
        let mut port = MockSerialPort::new();
        port.send(&[0x7e, 0x00]).unwrap();
        assert_eq!(port.outbound, vec![0x7e, 0x00]);
    }

    #[test]
    fn mock_tracks_dtr_rts() {
        let mut port = MockSerialPort::new();
        port.set_dtr_rts(true).unwrap();
        assert_eq!(port.dtr_rts, Some(true));
    }
}
