//! Wireless API frame codec: escaping, checksum, and the request builder.
//!
//! On the wire, a frame looks like:
//!
//! ```text
//! 0x7E | len_hi | len_lo | payload[len] | checksum
//! ```
//!
//! `0x7E` is the start delimiter. Everything after it — the length bytes,
//! the payload, and the checksum — is escaped: `0x7E`, `0x7D`, `0x11`, and
//! `0x13` are each replaced by `0x7D` followed by the byte XORed with
//! `0x20`. `len` is big-endian and counts unescaped payload bytes only (not
//! the checksum). The checksum is `0xFF` minus the sum of the unescaped
//! payload bytes, modulo 256; a frame is valid when `1 + sum(payload ++
//! [checksum])` is `0` modulo 256.
//!
//! [`FrameDecoder`] is a pure state machine: it consumes raw (escaped) wire
//! bytes one at a time and hands back a [`DecodedFrame`] once a complete,
//! checksum-valid frame has been assembled. It performs no I/O, which keeps
//! it trivially testable by feeding it bytes captured from a real session.

use crate::bytes::ByteWriter;
use crate::error::Error;

/// Start-of-frame delimiter. Encountered anywhere in an in-progress frame,
/// it restarts decoding from scratch.
pub const DELIM: u8 = 0x7e;
const ESCAPE: u8 = 0x7d;
const XOR: u8 = 0x20;

/// Maximum size of an unescaped frame (length bytes + payload + checksum)
/// the decoder will assemble before giving up and resynchronising.
const MAX_FRAME: usize = 256;

fn needs_escape(b: u8) -> bool {
    matches!(b, 0x7e | 0x7d | 0x11 | 0x13)
}

/// Appends `byte` to `out`, escaping it if required.
fn put_escaped(out: &mut Vec<u8>, byte: u8) {
    if needs_escape(byte) {
        out.push(ESCAPE);
        out.push(byte ^ XOR);
    } else {
        out.push(byte);
    }
}

/// Computes the checksum for a sequence of unescaped payload bytes:
/// `0xFF - (sum of bytes mod 256)`.
pub fn checksum(payload: &[u8]) -> u8 {
    0xffu8.wrapping_sub(payload.iter().fold(0u8, |acc, &b| acc.wrapping_add(b)))
}

/// A frame ready to be emitted.
///
/// Mirrors the variable-arity request the wireless API accepts: most fields
/// are optional and simply omitted from the payload when absent, matching
/// the shape of a local AT command (no address, no packet header) up to a
/// full stream data frame (address, sequence, subtype, and data all
/// present).
#[derive(Debug, Default, Clone)]
pub struct FrameRequest<'a> {
    /// Wireless API frame type (e.g. `0x10` Transmit Request, `0x08` Local
    /// AT Command).
    pub api_type: u8,
    /// API sequence byte correlating a command/transmit request with its
    /// response. Absent for frames with no response (e.g. Create Source
    /// Route).
    pub tx_seq: Option<u8>,
    /// Destination long+short address (8+2 bytes). Omitted for local
    /// commands, which address no remote device.
    pub address: Option<&'a [u8; 10]>,
    /// Receive/apply-changes option byte, carried directly after the
    /// address for remote AT commands.
    pub api_option: Option<u8>,
    /// First pre-payload byte (broadcast radius for transmit requests).
    pub pre_payload1: Option<u8>,
    /// Second pre-payload byte (transmit options).
    pub pre_payload2: Option<u8>,
    /// Application packet-type byte (ack = 0, request = 1).
    pub packet_type: Option<u8>,
    /// Application stream sequence byte.
    pub seq: Option<u8>,
    /// Application subtype byte (firmware deliver/reply).
    pub app_type: Option<u8>,
    /// Trailing application data.
    pub data: &'a [u8],
}

impl<'a> FrameRequest<'a> {
    /// Encodes this request into a complete, escaped, checksummed wire
    /// frame, appending it to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), Error> {
        // Assembled through a bounds-checked ByteWriter rather than a
        // growable Vec: a request that doesn't fit returns Error::Framing
        // from the write itself instead of needing a separate length check
        // after the fact.
        let mut payload_buf = [0u8; MAX_FRAME - 3];
        let payload_len = {
            let mut w = ByteWriter::new(&mut payload_buf);
            w.write_u8(self.api_type)?;
            if let Some(seq) = self.tx_seq {
                w.write_u8(seq)?;
            }
            if let Some(addr) = self.address {
                w.write_slice(addr)?;
            }
            if let Some(opt) = self.api_option {
                w.write_u8(opt)?;
            }
            if let Some(b) = self.pre_payload1 {
                w.write_u8(b)?;
            }
            if let Some(b) = self.pre_payload2 {
                w.write_u8(b)?;
            }
            if let Some(b) = self.packet_type {
                w.write_u8(b)?;
            }
            if let Some(b) = self.seq {
                w.write_u8(b)?;
            }
            if let Some(b) = self.app_type {
                w.write_u8(b)?;
            }
            w.write_slice(self.data)?;
            (MAX_FRAME - 3) - w.space_left()
        };
        let payload = &payload_buf[..payload_len];

        let cksum = checksum(payload);

        out.push(DELIM);
        // Length is carried as two literal bytes; only the payload and the
        // checksum that follow are escaped.
        out.extend_from_slice(&(payload_len as u16).to_be_bytes());
        for &b in payload {
            put_escaped(out, b);
        }
        put_escaped(out, cksum);

        Ok(())
    }
}

/// A complete, checksum-valid frame handed back by [`FrameDecoder`].
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Unescaped payload bytes, starting with the frame type byte (i.e.
    /// `payload[0]` is the API frame type, `payload[1..]` is the body).
    pub payload: Vec<u8>,
}

impl DecodedFrame {
    /// The wireless API frame type, e.g. `0x88`, `0x97`, `0xa1`.
    pub fn frame_type(&self) -> u8 {
        self.payload[0]
    }

    /// The frame body, excluding the frame type byte.
    pub fn body(&self) -> &[u8] {
        &self.payload[1..]
    }
}

#[derive(Debug)]
enum State {
    AwaitDelim,
    /// Reading the two literal (unescaped) length bytes.
    Length { buf: Vec<u8> },
    /// Reading `frame_size` escaped payload+checksum bytes.
    Body {
        frame_size: usize,
        buf: Vec<u8>,
        escaped: bool,
    },
}

/// Streaming decoder: feed it raw wire bytes one at a time via [`push`].
///
/// [`push`]: FrameDecoder::push
pub struct FrameDecoder {
    state: State,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        FrameDecoder {
            state: State::AwaitDelim,
        }
    }

    /// Feeds a single raw byte to the decoder.
    ///
    /// Returns `Ok(Some(frame))` once a checksum-valid frame has been
    /// assembled, `Ok(None)` while still accumulating one, and
    /// `Err(Error::Framing)` for a checksum mismatch or an overlong frame —
    /// in both cases the decoder has already resynchronised and is ready to
    /// accept further bytes.
    pub fn push(&mut self, byte: u8) -> Result<Option<DecodedFrame>, Error> {
        if byte == DELIM {
            self.state = State::Length { buf: Vec::new() };
            return Ok(None);
        }

        match &mut self.state {
            State::AwaitDelim => Ok(None),

            State::Length { buf } => {
                buf.push(byte);
                if buf.len() < 2 {
                    return Ok(None);
                }
                let len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
                let frame_size = len + 1; // + checksum byte
                if frame_size > MAX_FRAME {
                    self.state = State::AwaitDelim;
                    return Err(Error::Framing);
                }
                self.state = State::Body {
                    frame_size,
                    buf: Vec::with_capacity(frame_size),
                    escaped: false,
                };
                Ok(None)
            }

            State::Body {
                frame_size,
                buf,
                escaped,
            } => {
                let byte = if *escaped {
                    *escaped = false;
                    byte ^ XOR
                } else if byte == ESCAPE {
                    *escaped = true;
                    return Ok(None);
                } else {
                    byte
                };

                buf.push(byte);
                if buf.len() < *frame_size {
                    return Ok(None);
                }

                let valid = buf.iter().fold(1u8, |acc, &b| acc.wrapping_add(b)) == 0;
                let result = if valid {
                    let payload = buf[..buf.len() - 1].to_vec();
                    Ok(Some(DecodedFrame { payload }))
                } else {
                    Err(Error::Framing)
                };
                self.state = State::AwaitDelim;
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(decoder: &mut FrameDecoder, bytes: &[u8]) -> Vec<Result<DecodedFrame, Error>> {
        let mut out = Vec::new();
        for &b in bytes {
            match decoder.push(b) {
                Ok(Some(frame)) => out.push(Ok(frame)),
                Ok(None) => {}
                Err(e) => out.push(Err(e)),
            }
        }
        out
    }

    #[test]
    fn roundtrip_simple_payload() {
        let req = FrameRequest {
            api_type: 0x10,
            data: b"Hi",
            ..Default::default()
        };
        let mut wire = Vec::new();
        req.encode(&mut wire).unwrap();

        assert_eq!(wire[0], DELIM);
        assert_eq!(wire.iter().filter(|&&b| b == DELIM).count(), 1);

        let mut decoder = FrameDecoder::new();
        let frames = feed(&mut decoder, &wire);
        assert_eq!(frames.len(), 1);
        let frame = frames[0].as_ref().unwrap();
        assert_eq!(frame.payload, vec![0x10, b'H', b'i']);
    }

    #[test]
    fn s1_encode_transmit_request() {
        let addr = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0xff, 0xfe];
        let req = FrameRequest {
            api_type: 0x10,
            tx_seq: Some(7),
            address: Some(&addr),
            pre_payload1: Some(0),
            pre_payload2: Some(0),
            packet_type: Some(1),
            seq: Some(7),
            app_type: Some(0x17),
            data: b"Hi",
            ..Default::default()
        };
        let mut wire = Vec::new();
        req.encode(&mut wire).unwrap();

        // Unescaped payload is 19 bytes: 0x10 07 <addr x10> 00 00 01 07 17 48 69.
        // addr[1] is 0x11, itself one of the reserved bytes, so it is escaped
        // on the wire as 7d 31 — the wire is one byte longer than the
        // unescaped payload length.
        assert_eq!(wire[0], DELIM);
        assert_eq!(wire[1], 0x00);
        assert_eq!(wire[2], 0x13); // 19 unescaped payload bytes

        #[rustfmt::skip]
        let expected_wire: Vec<u8> = vec![
            DELIM, 0x00, 0x13,
            0x10, 0x07,
            0x00, 0x7d, 0x31, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0xff, 0xfe,
            0x00, 0x00, 0x01, 0x07, 0x17,
            0x48, 0x69,
            0x3f,
        ];
        assert_eq!(wire, expected_wire);

        let mut decoder = FrameDecoder::new();
        let frame = feed(&mut decoder, &wire).remove(0).unwrap();
        let mut expected_payload = vec![0x10, 0x07];
        expected_payload.extend_from_slice(&addr);
        expected_payload.extend_from_slice(&[0x00, 0x00, 0x01, 0x07, 0x17]);
        expected_payload.extend_from_slice(b"Hi");
        assert_eq!(frame.payload, expected_payload);
    }

    #[test]
    fn checksum_invariant() {
        let req = FrameRequest {
            api_type: 0x08,
            data: &[1, 2, 3, 4, 5],
            ..Default::default()
        };
        let mut wire = Vec::new();
        req.encode(&mut wire).unwrap();
        let mut decoder = FrameDecoder::new();
        assert!(feed(&mut decoder, &wire)[0].is_ok());
    }

    #[test]
    fn bad_checksum_is_dropped_and_decoder_resyncs() {
        let req = FrameRequest {
            api_type: 0x08,
            data: &[1, 2, 3],
            ..Default::default()
        };
        let mut wire = Vec::new();
        req.encode(&mut wire).unwrap();
        *wire.last_mut().unwrap() ^= 0xff;

        let mut decoder = FrameDecoder::new();
        let results = feed(&mut decoder, &wire);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0], Err(Error::Framing));

        // decoder is usable again afterwards
        let mut wire2 = Vec::new();
        FrameRequest {
            api_type: 0x08,
            data: &[9],
            ..Default::default()
        }
        .encode(&mut wire2)
        .unwrap();
        let results2 = feed(&mut decoder, &wire2);
        assert_eq!(results2.len(), 1);
        assert!(results2[0].is_ok());
    }

    #[test]
    fn mid_frame_delim_restarts() {
        let req = FrameRequest {
            api_type: 0x08,
            data: &[1, 2, 3],
            ..Default::default()
        };
        let mut wire = Vec::new();
        req.encode(&mut wire).unwrap();

        let mut garbage = vec![DELIM, 0x00, 0x02, 0x01];
        garbage.extend_from_slice(&wire);

        let mut decoder = FrameDecoder::new();
        let results = feed(&mut decoder, &garbage);
        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
    }

    #[test]
    fn escapes_reserved_bytes() {
        let req = FrameRequest {
            api_type: 0x08,
            data: &[0x7e, 0x7d, 0x11, 0x13],
            ..Default::default()
        };
        let mut wire = Vec::new();
        req.encode(&mut wire).unwrap();
        // every reserved byte in the payload became a 2-byte escape sequence
        assert_eq!(wire.iter().filter(|&&b| b == DELIM).count(), 1);

        let mut decoder = FrameDecoder::new();
        let frame = feed(&mut decoder, &wire).remove(0).unwrap();
        assert_eq!(frame.payload, vec![0x08, 0x7e, 0x7d, 0x11, 0x13]);
    }
}
