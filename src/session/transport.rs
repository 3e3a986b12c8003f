//! Reliable byte-stream transport: chunking, the stop-and-wait application
//! header, and the bounded inbound reassembly buffer.

use crate::error::Error;
use std::collections::VecDeque;

/// Stop-and-wait retry budget for both sending a chunk and receiving one.
pub const STREAM_RETRIES: u32 = 16;

pub const PACKET_ACK: u8 = 0;
pub const PACKET_REQUEST: u8 = 1;

/// Application subtype for outgoing (host-to-target) stream data.
pub const SUBTYPE_FIRMWARE_DELIVER: u8 = 23;
/// Application subtype for incoming (target-to-host) stream data.
pub const SUBTYPE_FIRMWARE_REPLY: u8 = 24;

/// Capacity of the inbound reassembly ring buffer.
pub const IN_BUFFER_CAPACITY: usize = 256;

/// A decoded application-level stream frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    Ack { seq: u8 },
    Request { seq: u8, subtype: u8, data: Vec<u8> },
}

/// Parses the application payload carried inside a transmit/receive frame:
/// `[0x01 | seq | subtype | data...]` for a request, `[0x00 | seq]` for an
/// ack.
pub fn parse_stream_frame(bytes: &[u8]) -> Option<StreamFrame> {
    let (&packet_type, rest) = bytes.split_first()?;
    match packet_type {
        PACKET_ACK => {
            let &seq = rest.first()?;
            Some(StreamFrame::Ack { seq })
        }
        PACKET_REQUEST => {
            let (&seq, rest) = rest.split_first()?;
            let (&subtype, data) = rest.split_first()?;
            Some(StreamFrame::Request {
                seq,
                subtype,
                data: data.to_vec(),
            })
        }
        _ => None,
    }
}

/// Builds the application payload for an outgoing data chunk.
pub fn build_request(seq: u8, subtype: u8, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(3 + data.len());
    out.push(PACKET_REQUEST);
    out.push(seq);
    out.push(subtype);
    out.extend_from_slice(data);
    out
}

/// Builds the application payload for an ack of `seq`.
pub fn build_ack(seq: u8) -> Vec<u8> {
    vec![PACKET_ACK, seq]
}

/// Cycles a sequence byte through `1..=255`, skipping the reserved value
/// `0`.
pub fn next_seq(current: u8) -> u8 {
    current.wrapping_add(1).max(1)
}

/// A bounded ring buffer for bytes received while no caller is waiting on
/// them. Overflow is a distinct, explicit error rather than silent
/// wraparound.
#[derive(Debug, Default)]
pub struct RingBuffer {
    buf: VecDeque<u8>,
}

impl RingBuffer {
    pub fn new() -> Self {
        RingBuffer {
            buf: VecDeque::with_capacity(IN_BUFFER_CAPACITY),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Appends `bytes`, failing with [`Error::Unusable`] if doing so would
    /// exceed [`IN_BUFFER_CAPACITY`]. Partial pushes do not occur: either
    /// all of `bytes` fits, or none of it is stored.
    pub fn push(&mut self, bytes: &[u8]) -> Result<(), Error> {
        if self.buf.len() + bytes.len() > IN_BUFFER_CAPACITY {
            return Err(Error::Unusable);
        }
        self.buf.extend(bytes);
        Ok(())
    }

    /// Pops up to `out.len()` bytes into `out`, returning the count
    /// written.
    pub fn pop_into(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.buf.len());
        for slot in out.iter_mut().take(n) {
            *slot = self.buf.pop_front().unwrap();
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_skips_zero() {
        assert_eq!(next_seq(0), 1);
        assert_eq!(next_seq(254), 255);
        assert_eq!(next_seq(255), 1);
    }

    #[test]
    fn parses_ack_and_request() {
        assert_eq!(
            parse_stream_frame(&[0x00, 0x05]),
            Some(StreamFrame::Ack { seq: 5 })
        );
        assert_eq!(
            parse_stream_frame(&[0x01, 0x04, 0x18, b'A', b'B']),
            Some(StreamFrame::Request {
                seq: 4,
                subtype: 0x18,
                data: vec![b'A', b'B'],
            })
        );
    }

    #[test]
    fn rejects_short_frames() {
        assert_eq!(parse_stream_frame(&[]), None);
        assert_eq!(parse_stream_frame(&[0x00]), None);
        assert_eq!(parse_stream_frame(&[0x01, 0x04]), None);
    }

    #[test]
    fn ring_buffer_overflow_is_explicit() {
        let mut rb = RingBuffer::new();
        let chunk = vec![0u8; IN_BUFFER_CAPACITY];
        rb.push(&chunk).unwrap();
        assert_eq!(rb.push(&[1]), Err(Error::Unusable));
    }

    #[test]
    fn ring_buffer_fifo_order() {
        let mut rb = RingBuffer::new();
        rb.push(&[1, 2, 3]).unwrap();
        let mut out = [0u8; 2];
        assert_eq!(rb.pop_into(&mut out), 2);
        assert_eq!(out, [1, 2]);
        assert_eq!(rb.len(), 1);
    }
}
