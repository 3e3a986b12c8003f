//! Session: the single-threaded, synchronous bridge between a host-side
//! bootloader client and a target reachable only through the wireless
//! gateway (or, in direct mode, wired straight to the host).
//!
//! A `Session` exclusively owns one [`SerialPort`] and is the sole
//! demultiplexer for everything arriving on it — stream data, command
//! responses, and route-record indications all funnel through
//! [`Session::poll_once`]. The session is not safe for concurrent use;
//! callers must serialise their own access.

pub mod command;
mod poll;
pub mod transport;

use crate::address::RemoteAddress;
use crate::error::Error;
use crate::frame::{FrameDecoder, FrameRequest};
use crate::route::RouteCache;
use crate::serial::SerialPort;
use crate::session::poll::DispatchEvent;
use crate::session::transport::{RingBuffer, StreamFrame};
use crate::stats::{Group, GroupReport, Stats};
use log::{info, warn};
use std::time::{Duration, Instant};

/// Duration the reset line is held low before release, per the boot
/// sequence.
const RESET_ASSERT_DURATION: Duration = Duration::from_millis(250);
/// Duration to wait after releasing reset before the target is assumed
/// ready.
const RESET_RELEASE_DURATION: Duration = Duration::from_millis(50);

/// Wire frame type used for an outbound gateway-mode stream frame
/// ("Transmit Request").
const FRAME_TRANSMIT_REQUEST: u8 = 0x10;
/// Wire frame type used for an outbound direct-mode stream frame
/// ("Receive Packet" — the host impersonates the remote radio).
const FRAME_RECEIVE_PACKET: u8 = 0x90;

/// An open bridge session. See the module documentation for the concurrency
/// model.
pub struct Session<S: SerialPort> {
    serial: S,
    direct_mode: bool,
    reset_pin: u8,
    address: RemoteAddress,
    out_seq: u8,
    in_seq: u8,
    api_seq: u8,
    unusable: bool,
    in_buffer: RingBuffer,
    route: RouteCache,
    stats: Stats,
    decoder: FrameDecoder,
}

impl<S: SerialPort> Session<S> {
    fn new(serial: S, target_long: Option<[u8; 8]>, reset_pin: u8) -> Self {
        Session {
            serial,
            direct_mode: target_long.is_none(),
            reset_pin,
            address: RemoteAddress::new(target_long.unwrap_or([0; 8])),
            out_seq: 0,
            in_seq: 0,
            api_seq: 0,
            unusable: false,
            in_buffer: RingBuffer::new(),
            route: RouteCache::new(),
            stats: Stats::new(),
            decoder: FrameDecoder::new(),
        }
    }

    /// Opens a session atop an already-connected serial adapter: configures
    /// the radios (gateway mode only), pulses the target's reset line, and
    /// confirms reachability with a single STK500 `GET_SYNC`.
    pub fn open(serial: S, target_long: Option<[u8; 8]>, reset_pin: u8) -> Result<Self, Error> {
        let mut session = Self::new(serial, target_long, reset_pin);
        session.boot()?;
        Ok(session)
    }

    fn boot(&mut self) -> Result<(), Error> {
        if !self.direct_mode {
            info!("configuring gateway radios");
            self.local_command(*b"AP", Some(2))?;
            self.local_command(*b"AR", Some(0))?;
            self.remote_command(*b"D6", Some(0))?;
        }

        self.set_reset(true)?;
        std::thread::sleep(RESET_ASSERT_DURATION);
        self.set_reset(false)?;
        std::thread::sleep(RESET_RELEASE_DURATION);

        crate::stk500::get_sync(self)
    }

    /// Closes the session: best-effort remote full reset (gateway mode
    /// only), then returns the final per-group timing summary.
    pub fn close(mut self) -> Vec<GroupReport> {
        if !self.direct_mode {
            if let Err(e) = self.remote_command(*b"FR", None) {
                warn!("best-effort full reset on close failed: {e}");
            }
        }
        self.stats.summarize()
    }

    /// Asserts (`true`) or releases (`false`) the target's reset line.
    /// Delegates to the serial adapter's native DTR/RTS in direct mode, or
    /// to a remote `D<pin>` command otherwise.
    pub fn set_reset(&mut self, asserted: bool) -> Result<(), Error> {
        if self.unusable {
            return Err(Error::Unusable);
        }
        if self.direct_mode {
            self.serial.set_dtr_rts(asserted)
        } else {
            let (mnemonic, value) = command::reset_pin_command(self.reset_pin, asserted);
            self.remote_command(mnemonic, Some(value))
        }
    }

    /// Discards buffered inbound bytes and any bytes sitting in the serial
    /// adapter's receive path, reading until the next timeout.
    pub fn drain(&mut self) -> Result<(), Error> {
        self.in_buffer = RingBuffer::new();
        self.decoder = FrameDecoder::new();
        loop {
            match self.serial.recv_byte() {
                Ok(_) => continue,
                Err(Error::Timeout) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Sends `data` over the reliable stream, chunked and acknowledged one
    /// piece at a time.
    pub fn send(&mut self, data: &[u8]) -> Result<(), Error> {
        if self.unusable {
            return Err(Error::Unusable);
        }
        let mut offset = 0;
        while offset < data.len() {
            let limit = self.route.chunk_limit();
            let end = (offset + limit).min(data.len());
            self.send_chunk(&data[offset..end])?;
            offset = end;
        }
        Ok(())
    }

    /// Fills `out` completely from the reliable stream, first from any
    /// buffered bytes, then by polling.
    pub fn recv(&mut self, out: &mut [u8]) -> Result<(), Error> {
        if self.unusable {
            return Err(Error::Unusable);
        }
        let mut filled = self.in_buffer.pop_into(out);
        if filled < out.len() {
            self.arm_receive_clock();
        }

        let mut retries_left = transport::STREAM_RETRIES;
        while filled < out.len() {
            if retries_left == 0 {
                self.unusable = true;
                return Err(Error::Timeout);
            }
            retries_left -= 1;

            match self.poll_once() {
                Ok(DispatchEvent::Stream(frame)) => {
                    let (_, consumed) = self.on_stream_frame(frame, Some(&mut out[filled..]))?;
                    filled += consumed;
                    if consumed > 0 && filled < out.len() {
                        // Still waiting on more: start the clock again for
                        // the next sequence we now expect.
                        self.arm_receive_clock();
                    }
                }
                Ok(_) => {}
                Err(Error::Timeout) => {
                    self.send_in_ack().ok();
                }
                Err(e) => {
                    self.unusable = true;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Records that we are now expecting the next inbound sequence, so the
    /// receive-group summary reflects how long the target took to deliver
    /// it.
    fn arm_receive_clock(&mut self) {
        let next = transport::next_seq(self.in_seq);
        self.record_send(Group::Receive, next);
    }

    fn send_chunk(&mut self, chunk: &[u8]) -> Result<(), Error> {
        self.out_seq = transport::next_seq(self.out_seq);
        let seq = self.out_seq;
        let payload = transport::build_request(seq, transport::SUBTYPE_FIRMWARE_DELIVER, chunk);
        let (wire, tx_seq) = self.build_stream_wire(payload)?;

        for _ in 0..transport::STREAM_RETRIES {
            self.serial.send(&wire)?;
            self.record_send(Group::Transmit, tx_seq);

            match self.poll_once() {
                Ok(DispatchEvent::Stream(frame)) => {
                    let (acked, _) = self.on_stream_frame(frame, None)?;
                    if acked == Some(seq) {
                        return Ok(());
                    }
                }
                Ok(_) => {}
                Err(Error::Timeout) => {
                    self.send_in_ack().ok();
                }
                Err(e) => {
                    self.unusable = true;
                    return Err(e);
                }
            }
        }
        self.unusable = true;
        Err(Error::Timeout)
    }

    fn send_in_ack(&mut self) -> Result<(), Error> {
        let payload = transport::build_ack(self.in_seq);
        let (wire, tx_seq) = self.build_stream_wire(payload)?;
        self.serial.send(&wire)?;
        self.record_send(Group::Transmit, tx_seq);
        Ok(())
    }

    /// Handles one decoded application-level stream frame: resolves an ack
    /// to its sequence (for the caller to check against its own pending
    /// sequence), or accepts/acks/buffers an inbound data request.
    ///
    /// Returns `(ack_seq, bytes_written_into_sink)`.
    fn on_stream_frame(
        &mut self,
        frame: StreamFrame,
        sink: Option<&mut [u8]>,
    ) -> Result<(Option<u8>, usize), Error> {
        match frame {
            StreamFrame::Ack { seq } => Ok((Some(seq), 0)),
            StreamFrame::Request { seq, subtype, data } => {
                // Inbound requests are the target's replies; only 24
                // (FIRMWARE_REPLY) carries stream data we should accept.
                if subtype != transport::SUBTYPE_FIRMWARE_REPLY {
                    return Ok((None, 0));
                }
                self.record_command_recv(Group::Receive, seq);
                let expected = transport::next_seq(self.in_seq);
                let mut consumed = 0;
                if seq == expected {
                    self.in_seq = expected;
                    consumed = self.deliver_bytes(&data, sink)?;
                    self.send_in_ack()?;
                } else if seq == self.in_seq {
                    // Retransmission of the last accepted packet: our ack
                    // was lost. Don't redeliver, just ack again.
                    self.send_in_ack()?;
                }
                Ok((None, consumed))
            }
        }
    }

    fn deliver_bytes(&mut self, data: &[u8], sink: Option<&mut [u8]>) -> Result<usize, Error> {
        let mut rest = data;
        let mut consumed = 0;
        if let Some(buf) = sink {
            let n = buf.len().min(rest.len());
            buf[..n].copy_from_slice(&rest[..n]);
            consumed = n;
            rest = &rest[n..];
        }
        if !rest.is_empty() {
            if let Err(e) = self.in_buffer.push(rest) {
                self.unusable = true;
                return Err(e);
            }
        }
        Ok(consumed)
    }

    /// Builds the wire bytes for an outbound stream frame, prepending a
    /// route-set frame first if the cache is dirty (gateway mode only).
    /// Returns the wire bytes and the API sequence used for the transmit
    /// request itself (for transmit-status correlation).
    fn build_stream_wire(&mut self, app_payload: Vec<u8>) -> Result<(Vec<u8>, u8), Error> {
        let addr = self.address.wire_bytes();
        let mut wire = Vec::new();

        if !self.direct_mode && self.route.is_dirty() {
            if let Some(route_wire) = self.route.route_set_wire_frame(&addr)? {
                wire.extend_from_slice(&route_wire);
                self.route.clear_dirty();
            }
        }

        let tx_seq = self.next_api_seq();
        let req = if self.direct_mode {
            FrameRequest {
                api_type: FRAME_RECEIVE_PACKET,
                address: Some(&addr),
                pre_payload1: Some(0),
                pre_payload2: Some(0),
                data: &app_payload,
                ..Default::default()
            }
        } else {
            FrameRequest {
                api_type: FRAME_TRANSMIT_REQUEST,
                tx_seq: Some(tx_seq),
                address: Some(&addr),
                pre_payload1: Some(0),
                pre_payload2: Some(0),
                data: &app_payload,
                ..Default::default()
            }
        };
        req.encode(&mut wire)?;
        Ok((wire, tx_seq))
    }

    fn local_command(&mut self, mnemonic: [u8; 2], value: Option<u8>) -> Result<(), Error> {
        if self.unusable {
            return Err(Error::Unusable);
        }
        if self.direct_mode {
            return Ok(());
        }

        let seq = self.next_api_seq();
        let payload = command::mnemonic_payload(mnemonic, value);
        let req = FrameRequest {
            api_type: 0x08,
            tx_seq: Some(seq),
            data: &payload,
            ..Default::default()
        };
        let mut wire = Vec::new();
        req.encode(&mut wire)?;

        for _ in 0..command::LOCAL_COMMAND_RETRIES {
            self.serial.send(&wire)?;
            self.record_send(Group::LocalCommand, seq);

            match self.poll_once() {
                Ok(DispatchEvent::LocalCommandResponse { api_seq }) if api_seq == seq => {
                    return Ok(())
                }
                Ok(_) => {}
                Err(Error::Timeout) => {}
                Err(e) => {
                    self.unusable = true;
                    return Err(e);
                }
            }
        }
        self.unusable = true;
        Err(Error::Timeout)
    }

    fn remote_command(&mut self, mnemonic: [u8; 2], value: Option<u8>) -> Result<(), Error> {
        if self.unusable {
            return Err(Error::Unusable);
        }
        if self.direct_mode {
            return Ok(());
        }

        let seq = self.next_api_seq();
        let payload = command::mnemonic_payload(mnemonic, value);
        let addr = self.address.wire_bytes();
        let req = FrameRequest {
            api_type: 0x17,
            tx_seq: Some(seq),
            address: Some(&addr),
            api_option: Some(command::REMOTE_APPLY_CHANGES),
            data: &payload,
            ..Default::default()
        };
        let mut wire = Vec::new();
        req.encode(&mut wire)?;

        for _ in 0..command::REMOTE_COMMAND_RETRIES {
            self.serial.send(&wire)?;
            self.record_send(Group::RemoteCommand, seq);

            match self.poll_once() {
                Ok(DispatchEvent::RemoteCommandResponse { api_seq, status })
                    if api_seq == seq =>
                {
                    return if status == command::RemoteStatus::Ok {
                        Ok(())
                    } else {
                        let raw: u8 = status.into();
                        Err(Error::RemoteStatus(raw))
                    };
                }
                Ok(_) => {}
                Err(Error::Timeout) => {}
                Err(e) => {
                    self.unusable = true;
                    return Err(e);
                }
            }
        }
        self.unusable = true;
        Err(Error::Timeout)
    }

    fn next_api_seq(&mut self) -> u8 {
        self.api_seq = transport::next_seq(self.api_seq);
        self.api_seq
    }

    fn record_send(&mut self, group: Group, seq: u8) {
        self.stats.record_send(group, seq, Instant::now());
    }

    fn record_command_recv(&mut self, group: Group, seq: u8) {
        self.stats.record_recv(group, seq, Instant::now());
    }
}
