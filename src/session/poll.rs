//! The poll loop: read one valid frame, dispatch by type, update session
//! state. This is the sole demultiplexer; every higher-level wait is built
//! by calling [`Session::poll_once`] in a loop.

use crate::bytes::ByteReader;
use crate::error::Error;
use crate::frame::DecodedFrame;
use crate::serial::SerialPort;
use crate::session::command::RemoteStatus;
use crate::session::transport::{parse_stream_frame, StreamFrame};
use crate::session::Session;
use crate::stats::Group;
use crate::utils::HexSlice;
use log::{debug, trace, warn};

pub const FRAME_LOCAL_COMMAND_RESPONSE: u8 = 0x88;
pub const FRAME_REMOTE_COMMAND_RESPONSE: u8 = 0x97;
pub const FRAME_TRANSMIT_STATUS: u8 = 0x8b;
pub const FRAME_ROUTE_RECORD: u8 = 0xa1;
pub const FRAME_TRANSMIT_REQUEST: u8 = 0x10;
pub const FRAME_RECEIVE_PACKET: u8 = 0x90;

/// What happened as a result of dispatching one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    LocalCommandResponse { api_seq: u8 },
    RemoteCommandResponse { api_seq: u8, status: RemoteStatus },
    TransmitStatus { api_seq: u8 },
    RouteRecord,
    Stream(StreamFrame),
    Ignored,
}

impl<S: SerialPort> Session<S> {
    /// Reads bytes from the serial adapter until one valid frame has been
    /// assembled, dispatches it, and returns the resulting event.
    ///
    /// Checksum/framing failures are logged and dropped silently; the loop
    /// keeps reading. A serial timeout (or any other serial error)
    /// propagates immediately, ending the poll.
    pub(crate) fn poll_once(&mut self) -> Result<DispatchEvent, Error> {
        loop {
            let byte = self.serial.recv_byte()?;
            match self.decoder.push(byte) {
                Ok(Some(frame)) => return Ok(self.dispatch(frame)),
                Ok(None) => continue,
                Err(e) => {
                    debug!("dropping malformed frame: {e}");
                    continue;
                }
            }
        }
    }

    fn dispatch(&mut self, frame: DecodedFrame) -> DispatchEvent {
        trace!(
            "dispatching frame type {:#04x} body {:?}",
            frame.frame_type(),
            HexSlice(frame.body())
        );
        match frame.frame_type() {
            FRAME_LOCAL_COMMAND_RESPONSE => self.dispatch_local_command_response(frame.body()),
            FRAME_REMOTE_COMMAND_RESPONSE => self.dispatch_remote_command_response(frame.body()),
            FRAME_TRANSMIT_STATUS => self.dispatch_transmit_status(frame.body()),
            FRAME_ROUTE_RECORD => self.dispatch_route_record(frame.body()),
            FRAME_TRANSMIT_REQUEST if self.direct_mode => self.dispatch_stream(frame.body(), true),
            FRAME_RECEIVE_PACKET if !self.direct_mode => {
                self.dispatch_stream(frame.body(), false)
            }
            other => {
                trace!("ignoring frame type {other:#04x}");
                DispatchEvent::Ignored
            }
        }
    }

    fn dispatch_local_command_response(&mut self, body: &[u8]) -> DispatchEvent {
        let mut r = ByteReader::new(body);
        let api_seq = match r.read_u8() {
            Ok(b) => b,
            Err(_) => return DispatchEvent::Ignored,
        };
        self.record_command_recv(Group::LocalCommand, api_seq);
        DispatchEvent::LocalCommandResponse { api_seq }
    }

    fn dispatch_remote_command_response(&mut self, body: &[u8]) -> DispatchEvent {
        let mut r = ByteReader::new(body);
        let (api_seq, status) = match (r.read_u8(), r.read_u8()) {
            (Ok(a), Ok(s)) => (a, s),
            _ => return DispatchEvent::Ignored,
        };
        self.record_command_recv(Group::RemoteCommand, api_seq);
        DispatchEvent::RemoteCommandResponse {
            api_seq,
            status: RemoteStatus::from(status),
        }
    }

    fn dispatch_transmit_status(&mut self, body: &[u8]) -> DispatchEvent {
        let mut r = ByteReader::new(body);
        let api_seq = match r.read_u8() {
            Ok(b) => b,
            Err(_) => return DispatchEvent::Ignored,
        };
        self.record_command_recv(Group::Transmit, api_seq);
        DispatchEvent::TransmitStatus { api_seq }
    }

    fn dispatch_route_record(&mut self, body: &[u8]) -> DispatchEvent {
        let mut r = ByteReader::new(body);
        let addr = match r.read_slice(10) {
            Ok(a) => a,
            Err(_) => return DispatchEvent::Ignored,
        };
        if addr[..8] != self.address.long() {
            trace!("ignoring route record from non-target sender");
            return DispatchEvent::Ignored;
        }
        self.address.set_short([addr[8], addr[9]]);

        let num = match r.read_u8() {
            Ok(n) => n as usize,
            Err(_) => return DispatchEvent::Ignored,
        };
        let mut hops = Vec::with_capacity(num);
        for _ in 0..num {
            match r.read_slice(2) {
                Ok(s) => hops.push([s[0], s[1]]),
                Err(_) => return DispatchEvent::Ignored,
            }
        }
        self.route.update(hops);
        DispatchEvent::RouteRecord
    }

    fn dispatch_stream(&mut self, body: &[u8], direct_mode: bool) -> DispatchEvent {
        let mut r = ByteReader::new(body);

        if direct_mode {
            // format A: tx_seq | address(10) | pre1 | pre2 | app bytes...
            if r.read_u8().is_err() {
                return DispatchEvent::Ignored;
            }
        }
        let addr = match r.read_slice(10) {
            Ok(a) => a,
            Err(_) => return DispatchEvent::Ignored,
        };
        if !direct_mode && addr[..8] != self.address.long() {
            trace!("ignoring stream frame from non-target sender");
            return DispatchEvent::Ignored;
        }
        self.address.set_short([addr[8], addr[9]]);

        if r.read_u8().is_err() || r.read_u8().is_err() {
            return DispatchEvent::Ignored;
        }

        match parse_stream_frame(r.read_rest()) {
            Some(frame) => DispatchEvent::Stream(frame),
            None => {
                warn!("malformed application payload in stream frame");
                DispatchEvent::Ignored
            }
        }
    }
}
