//! Target radio addressing and port-string parsing.

use crate::error::Error;

/// Short address meaning "unknown" — the sentinel a freshly-opened session
/// carries until a frame from the target reveals its real short address.
pub const SHORT_UNKNOWN: [u8; 2] = [0xff, 0xfe];

/// A target radio address: 8-byte long address plus 2-byte short address.
///
/// The short address is mutable — it starts at [`SHORT_UNKNOWN`] and is
/// overwritten by whatever the target last reported it as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteAddress {
    long: [u8; 8],
    short: [u8; 2],
}

impl RemoteAddress {
    /// Creates an address with the given long address and an unknown short
    /// address.
    pub fn new(long: [u8; 8]) -> Self {
        RemoteAddress {
            long,
            short: SHORT_UNKNOWN,
        }
    }

    pub fn long(&self) -> [u8; 8] {
        self.long
    }

    pub fn short(&self) -> [u8; 2] {
        self.short
    }

    /// Updates the short address, as observed in a frame from the target.
    pub fn set_short(&mut self, short: [u8; 2]) {
        self.short = short;
    }

    /// The 10-byte long+short address as carried in a wireless API frame.
    pub fn wire_bytes(&self) -> [u8; 10] {
        let mut out = [0u8; 10];
        out[..8].copy_from_slice(&self.long);
        out[8..].copy_from_slice(&self.short);
        out
    }
}

/// A parsed `<ADDR>@<serial-device>` port string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    /// `None` in direct mode (no `<ADDR>@` prefix).
    pub address: Option<[u8; 8]>,
    pub device: String,
}

/// Parses a port string of the form `<ADDR>@<serial-device>` (gateway mode)
/// or `@<serial-device>` (direct mode), where `<ADDR>` is exactly 16
/// hexadecimal digits naming the target's long address.
pub fn parse_port(spec: &str) -> Result<PortSpec, Error> {
    let (addr_part, device) = spec
        .split_once('@')
        .ok_or(Error::Config("port must contain '@'"))?;

    if device.is_empty() {
        return Err(Error::Config("missing serial device"));
    }

    if addr_part.is_empty() {
        return Ok(PortSpec {
            address: None,
            device: device.to_string(),
        });
    }

    if addr_part.len() != 16 {
        return Err(Error::Config("address must be 16 hex digits"));
    }

    let mut long = [0u8; 8];
    for (i, byte) in long.iter_mut().enumerate() {
        let hex = &addr_part[i * 2..i * 2 + 2];
        *byte = u8::from_str_radix(hex, 16).map_err(|_| Error::Config("address must be hex"))?;
    }

    Ok(PortSpec {
        address: Some(long),
        device: device.to_string(),
    })
}

/// Validates and returns the reset pin, per the `xbeeresetpin=<n>` extended
/// parameter: `n` must be in `1..=7`.
pub fn parse_reset_pin(value: &str) -> Result<u8, Error> {
    let n: u8 = value
        .parse()
        .map_err(|_| Error::Config("reset pin must be a number"))?;
    if (1..=7).contains(&n) {
        Ok(n)
    } else {
        Err(Error::Config("reset pin must be in 1..=7"))
    }
}

/// Default reset pin when `xbeeresetpin` is not given.
pub const DEFAULT_RESET_PIN: u8 = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_gateway_address() {
        let spec = parse_port("0011223344556677@/dev/ttyUSB0").unwrap();
        assert_eq!(
            spec.address,
            Some([0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77])
        );
        assert_eq!(spec.device, "/dev/ttyUSB0");
    }

    #[test]
    fn parses_direct_mode() {
        let spec = parse_port("@/dev/ttyUSB0").unwrap();
        assert_eq!(spec.address, None);
        assert_eq!(spec.device, "/dev/ttyUSB0");
    }

    #[test]
    fn rejects_missing_at() {
        assert!(parse_port("/dev/ttyUSB0").is_err());
    }

    #[test]
    fn rejects_short_address() {
        assert!(parse_port("1122@/dev/ttyUSB0").is_err());
    }

    #[test]
    fn rejects_non_hex_address() {
        assert!(parse_port("zz11223344556677@/dev/ttyUSB0").is_err());
    }

    #[test]
    fn reset_pin_range() {
        assert_eq!(parse_reset_pin("1").unwrap(), 1);
        assert_eq!(parse_reset_pin("7").unwrap(), 7);
        assert!(parse_reset_pin("0").is_err());
        assert!(parse_reset_pin("8").is_err());
        assert!(parse_reset_pin("x").is_err());
    }

    #[test]
    fn wire_bytes_layout() {
        let mut addr = RemoteAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77]);
        assert_eq!(addr.wire_bytes()[8..], SHORT_UNKNOWN);
        addr.set_short([0x12, 0x34]);
        assert_eq!(
            addr.wire_bytes(),
            [0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x12, 0x34]
        );
    }
}
