//! Thin STK500v1 adapter used once, at session open, to confirm end-to-end
//! reachability of the target bootloader.
//!
//! The STK500v1 dialog itself is out of scope; this module only implements
//! the one exchange the session needs during its boot sequence.

use crate::error::Error;
use crate::session::Session;
use crate::serial::SerialPort;

const CMD_GET_SYNC: u8 = 0x30;
const RESP_INSYNC: u8 = 0x14;
const RESP_OK: u8 = 0x10;

/// Sends a single `GET_SYNC` command and expects `INSYNC OK` in reply, with
/// no internal retry — the stream transport underneath is already
/// reliable, so a failure here means the bootloader truly isn't listening.
pub fn get_sync<S: SerialPort>(session: &mut Session<S>) -> Result<(), Error> {
    session.send(&[CMD_GET_SYNC])?;

    let mut reply = [0u8; 2];
    session.recv(&mut reply)?;

    if reply == [RESP_INSYNC, RESP_OK] {
        Ok(())
    } else {
        Err(Error::Protocol)
    }
}
