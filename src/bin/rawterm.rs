//! Interactive raw serial terminal.
//!
//! Opens a device, applies the requested line parameters and bridges it
//! to the local terminal: a reader thread copies port bytes to stdout
//! while the main thread copies stdin lines to the port. Stdin EOF ends
//! the session; a port failure ends the process with a nonzero status.

use clap::Parser;
use rawserial::{Config, NativePort, Parity, SerialPort};
use std::io::{self, BufRead as _, Write as _};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
const DEVICE_CANDIDATES: &[&str] = &[
    "/dev/ttyAMA0",
    "/dev/ttyUSB0",
    "/dev/ttyUSB1",
    "/dev/ttyUSB2",
    "/dev/ttyUSB3",
];
#[cfg(windows)]
const DEVICE_CANDIDATES: &[&str] = &["COM1"];

#[cfg(unix)]
const FALLBACK_DEVICE: &str = "/dev/ttyUSB0";
#[cfg(windows)]
const FALLBACK_DEVICE: &str = "COM1";

#[derive(Parser, Debug)]
#[command(
    name = "rawterm",
    version,
    about = "Raw serial terminal: port to stdout, stdin to port"
)]
struct Args {
    /// Serial device to open; auto-discovered when omitted
    device: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Data bits per character (5 to 8)
    #[arg(long, value_name = "BITS")]
    data_bits: Option<u8>,

    /// Parity: none, even or odd
    #[arg(short, long)]
    parity: Option<Parity>,

    /// Stop bits (1 or 2)
    #[arg(long, value_name = "BITS")]
    stop_bits: Option<u8>,

    /// Explicit configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("rawterm: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(args.config.as_deref())?;

    let mut line = config.line.clone();
    if let Some(baud) = args.baud {
        line.baud = baud;
    }
    if let Some(bits) = args.data_bits {
        line.data_bits = bits;
    }
    if let Some(parity) = args.parity {
        line.parity = parity;
    }
    if let Some(stop) = args.stop_bits {
        line.stop_bits = stop;
    }

    let device = args
        .device
        .or(config.device)
        .unwrap_or_else(|| discover_device().to_string());

    let port = rawserial::open(&device)?;
    let before = port.baud_rate();
    port.set_mode(&line.to_mode())?;
    if let Some(read) = config.read {
        port.set_read_params(read.min_bytes, read.timeout())?;
    }
    let after = port.baud_rate();

    println!(
        "{device}: {} [driver baud in/out {}/{} -> {}/{}]",
        line.to_mode(),
        before.0,
        before.1,
        after.0,
        after.1
    );

    let port = Arc::new(port);
    {
        let port = Arc::clone(&port);
        thread::spawn(move || {
            if let Err(e) = pump_to_stdout(&port) {
                eprintln!("rawterm: read failed: {e}");
                std::process::exit(1);
            }
        });
    }

    let stdin = io::stdin();
    for input in stdin.lock().lines() {
        let mut text = input?;
        text.push('\n');
        let data = text.as_bytes();
        let mut written = 0;
        while written < data.len() {
            written += port.write_bytes(&data[written..])?;
        }
    }

    debug!(device = %device, "stdin closed, session over");
    Ok(())
}

/// Copy port bytes to stdout until the stream ends.
fn pump_to_stdout(port: &NativePort) -> rawserial::Result<()> {
    let mut stdout = io::stdout();
    let mut buf = [0u8; 512];
    loop {
        match port.read_bytes(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => {
                stdout.write_all(&buf[..n])?;
                stdout.flush()?;
            }
            Err(e) if e.is_timeout() => continue,
            Err(e) => return Err(e),
        }
    }
}

/// First existing candidate device, or the conventional fallback.
fn discover_device() -> &'static str {
    DEVICE_CANDIDATES
        .iter()
        .copied()
        .find(|path| std::path::Path::new(path).exists())
        .unwrap_or(FALLBACK_DEVICE)
}
