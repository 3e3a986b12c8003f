//! CLI entry point: opens a session against a target reachable through the
//! wireless gateway (or wired directly), confirms it's reachable, and
//! reports round-trip timing statistics on exit.

use anyhow::{Context, Result};
use clap::Parser;
use meshboot::config::OpenOptions;
use meshboot::serial::RealSerialPort;
use meshboot::Session;

/// Bridges an STK500v1/Optiboot programmer to a target reachable only
/// through a meshed radio gateway.
#[derive(Parser, Debug)]
#[command(name = "meshboot", version, about)]
struct Args {
    /// `<ADDR>@<serial-device>` (gateway mode) or `@<serial-device>` (direct
    /// mode), where `<ADDR>` is the target radio's 16-hex-digit long
    /// address.
    port: String,

    /// Serial baud rate. Defaults to 19200 in direct mode, 9600 in gateway
    /// mode.
    #[arg(long)]
    baud: Option<u32>,

    /// GPIO pin (1-7) of the remote radio strapped to the target's reset
    /// line. Defaults to 3.
    #[arg(long = "xbeeresetpin")]
    xbee_reset_pin: Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let opts = OpenOptions::resolve(&args.port, args.baud, args.xbee_reset_pin.as_deref())
        .context("invalid port configuration")?;

    let serial = RealSerialPort::open(&opts.device, opts.baud)
        .with_context(|| format!("failed to open {}", opts.device))?;

    let session = Session::open(serial, opts.target_long, opts.reset_pin)
        .context("failed to open session (reset + GET_SYNC handshake failed)")?;

    log::info!("target reachable, bootloader synced");

    let reports = session.close();
    for report in reports {
        log::info!(
            "{:?}: count={} min={:?} max={:?} mean={:?}",
            report.group,
            report.count,
            report.min,
            report.max,
            report.mean
        );
    }

    Ok(())
}
