//! Local and remote configuration command channel.
//!
//! Both command kinds share the `api_seq` counter and are independent of
//! the stream sequence space used by the reliable transport.

use crate::utils::enum_with_unknown;

enum_with_unknown! {
    /// Decoded remote command status byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum RemoteStatus(u8) {
        Ok = 0,
        TransportError = 1,
        InvalidCommand = 2,
        InvalidParameter = 3,
        TransmissionFailure = 4,
    }
}

/// Retry budget for a local AT command (API 0x08/0x88).
pub const LOCAL_COMMAND_RETRIES: u32 = 5;

/// Retry budget for a remote AT command (API 0x17/0x97).
pub const REMOTE_COMMAND_RETRIES: u32 = 30;

/// "Apply changes" option bit set on every remote command request.
pub const REMOTE_APPLY_CHANGES: u8 = 0x02;

/// Builds the `data` payload (2-character mnemonic plus optional value
/// byte) shared by local and remote command requests.
pub fn mnemonic_payload(mnemonic: [u8; 2], value: Option<u8>) -> Vec<u8> {
    let mut data = Vec::with_capacity(3);
    data.extend_from_slice(&mnemonic);
    if let Some(v) = value {
        data.push(v);
    }
    data
}

/// The mnemonic for asserting or releasing the reset line on GPIO `pin`.
///
/// `pin` is rendered as its ASCII digit, e.g. pin `3` becomes mnemonic
/// `D3`. `value` is `5` to assert the pin low (reset asserted) and `4` to
/// release it high, per the radio's GPIO value encoding.
pub fn reset_pin_command(pin: u8, asserted: bool) -> ([u8; 2], u8) {
    let digit = b'0' + pin;
    ([b'D', digit], if asserted { 5 } else { 4 })
}
