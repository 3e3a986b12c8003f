//! Error type shared by the frame codec, transport, and command channel.

use thiserror::Error;

/// Errors surfaced by the core transport.
///
/// `RemoteStatus` carries the raw status byte reported by a remote command
/// response; see [`crate::session::command::RemoteStatus`] for the decoded
/// meaning.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
#[non_exhaustive]
pub enum Error {
    /// No byte arrived within the serial adapter's configured read timeout.
    #[error("serial read timed out")]
    Timeout,

    /// A well-framed frame failed its checksum, or a length field pointed
    /// past the fixed frame buffer.
    ///
    /// This is never surfaced to the operation that triggered the poll: at
    /// this layer it is indistinguishable from line noise, so the poll loop
    /// drops the frame and keeps reading.
    #[error("frame failed checksum or length validation")]
    Framing,

    /// A well-framed response carried unexpected bytes (for example a
    /// `GET_SYNC` reply that wasn't `INSYNC OK`).
    #[error("protocol mismatch")]
    Protocol,

    /// A remote command response reported a non-zero status.
    #[error("remote command failed with status {0}")]
    RemoteStatus(u8),

    /// The session's inbound buffer overflowed, or a prior operation already
    /// declared the transport unusable. The only recovery is closing the
    /// session.
    #[error("transport is unusable")]
    Unusable,

    /// Bad port syntax, an out-of-range reset pin, or another open-time
    /// configuration problem.
    #[error("configuration error: {0}")]
    Config(&'static str),
}
