//! A bridge between an STK500v1/Optiboot bootloader client and a target
//! microcontroller reachable only through a wireless mesh gateway.
//!
//! The gateway is a pair of radios speaking an escaped, checksummed API
//! protocol ([`frame`]): one attached to the host, one wired to the
//! target's reset pin and serial port. Because the wireless link loses,
//! reorders, and fragments packets, a reliable in-order byte stream
//! ([`session::transport`]) is tunneled inside the radios' datagrams.
//!
//! [`session::Session`] ties the pieces together: it owns a [`serial::SerialPort`],
//! runs the single-threaded poll loop that demultiplexes stream data, command
//! responses, and route-record indications, and exposes the byte-stream
//! interface ([`Session::send`]/[`Session::recv`]) the bootloader adapter
//! needs.
//!
//! [`Session::send`]: session::Session::send
//! [`Session::recv`]: session::Session::recv

#[macro_use]
mod utils;
pub mod address;
pub mod bytes;
pub mod config;
mod error;
pub mod frame;
pub mod route;
pub mod serial;
pub mod session;
pub mod stats;
pub mod stk500;

pub use self::error::Error;
pub use self::session::Session;
