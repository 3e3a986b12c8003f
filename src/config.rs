//! Resolves a port string and extended parameters into the settings a
//! session needs to open: target address (or direct mode), baud rate, and
//! reset pin.

use crate::address::{self, PortSpec};
use crate::error::Error;

/// Baud rate used in direct mode when the caller doesn't specify one: the
/// target MCU is typically clocked for a nominal 9600 line rate at double
/// speed.
pub const DEFAULT_BAUD_DIRECT: u32 = 19200;

/// Baud rate used in gateway mode when the caller doesn't specify one: the
/// local radio's factory default.
pub const DEFAULT_BAUD_GATEWAY: u32 = 9600;

/// Fully-resolved settings for opening a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOptions {
    pub device: String,
    pub target_long: Option<[u8; 8]>,
    pub baud: u32,
    pub reset_pin: u8,
}

impl OpenOptions {
    /// Resolves `port` (`<ADDR>@<device>` or `@<device>`), an optional
    /// caller-specified baud rate, and an optional `xbeeresetpin` value
    /// into a complete set of open options.
    pub fn resolve(port: &str, baud: Option<u32>, reset_pin: Option<&str>) -> Result<Self, Error> {
        let PortSpec {
            address: target_long,
            device,
        } = address::parse_port(port)?;

        let baud = baud.unwrap_or(if target_long.is_none() {
            DEFAULT_BAUD_DIRECT
        } else {
            DEFAULT_BAUD_GATEWAY
        });

        let reset_pin = match reset_pin {
            Some(v) => address::parse_reset_pin(v)?,
            None => address::DEFAULT_RESET_PIN,
        };

        Ok(OpenOptions {
            device,
            target_long,
            baud,
            reset_pin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_mode_defaults_to_9600() {
        let opts = OpenOptions::resolve("0011223344556677@/dev/ttyUSB0", None, None).unwrap();
        assert_eq!(opts.baud, DEFAULT_BAUD_GATEWAY);
        assert_eq!(opts.reset_pin, address::DEFAULT_RESET_PIN);
        assert!(opts.target_long.is_some());
    }

    #[test]
    fn direct_mode_defaults_to_19200() {
        let opts = OpenOptions::resolve("@/dev/ttyUSB0", None, None).unwrap();
        assert_eq!(opts.baud, DEFAULT_BAUD_DIRECT);
        assert!(opts.target_long.is_none());
    }

    #[test]
    fn explicit_baud_is_used_as_is() {
        let opts = OpenOptions::resolve("@/dev/ttyUSB0", Some(57600), None).unwrap();
        assert_eq!(opts.baud, 57600);
    }

    #[test]
    fn custom_reset_pin_is_parsed() {
        let opts = OpenOptions::resolve("@/dev/ttyUSB0", None, Some("5")).unwrap();
        assert_eq!(opts.reset_pin, 5);
    }

    #[test]
    fn bad_reset_pin_is_rejected() {
        assert!(OpenOptions::resolve("@/dev/ttyUSB0", None, Some("9")).is_err());
    }
}
