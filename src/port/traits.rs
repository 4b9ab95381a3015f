//! The uniform port contract and the line-parameter model.
//!
//! `Mode` carries the requested line configuration; `SerialPort` is the
//! operation set every backend implements. Backends translate `Mode` into
//! their native control structures and never leak those past this boundary.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Parity bit generation and checking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    /// No parity bit.
    #[default]
    None,
    /// Parity bit set so the number of one bits per character is even.
    Even,
    /// Parity bit set so the number of one bits per character is odd.
    Odd,
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parity::None => f.write_str("none"),
            Parity::Even => f.write_str("even"),
            Parity::Odd => f.write_str("odd"),
        }
    }
}

impl FromStr for Parity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "n" => Ok(Parity::None),
            "even" | "e" => Ok(Parity::Even),
            "odd" | "o" => Ok(Parity::Odd),
            _ => Err(Error::invalid("parity", "none, even or odd")),
        }
    }
}

/// Hardware flow control on the RTS/CTS lines.
///
/// Software (XON/XOFF) flow control is deliberately not modeled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handshake {
    /// No flow control.
    #[default]
    None,
    /// RTS/CTS hardware flow control. Unsupported on the Windows backend.
    RtsCts,
}

impl fmt::Display for Handshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handshake::None => f.write_str("none"),
            Handshake::RtsCts => f.write_str("rtscts"),
        }
    }
}

impl FromStr for Handshake {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(Handshake::None),
            "rtscts" | "rts/cts" => Ok(Handshake::RtsCts),
            _ => Err(Error::invalid("handshake", "none or rtscts")),
        }
    }
}

/// Requested serial line configuration.
///
/// Data bits and stop bits are plain integers so an out-of-range request
/// can be expressed and rejected with a parameter error instead of being
/// unrepresentable; [`Mode::validate`] is the single gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mode {
    /// Baud rate in bits per second. Must be greater than 0.
    pub baud_rate: u32,
    /// Data bits per character: 5, 6, 7 or 8.
    pub data_bits: u8,
    /// Parity mode.
    pub parity: Parity,
    /// Stop bits per character: 1 or 2.
    pub stop_bits: u8,
    /// Hardware flow control.
    pub handshake: Handshake,
}

impl Default for Mode {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            handshake: Handshake::None,
        }
    }
}

impl Mode {
    /// Check every field against its accepted domain.
    ///
    /// Returns the first violation as an [`Error::InvalidParameter`] naming
    /// the field. Backends call this before touching any device state.
    pub fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            return Err(Error::invalid("baud_rate", "greater than 0"));
        }
        if !(5..=8).contains(&self.data_bits) {
            return Err(Error::invalid("data_bits", "5, 6, 7 or 8"));
        }
        if self.stop_bits != 1 && self.stop_bits != 2 {
            return Err(Error::invalid("stop_bits", "1 or 2"));
        }
        Ok(())
    }
}

impl fmt::Display for Mode {
    /// Short `38400 8N1` style rendering for banners and logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
        };
        write!(
            f,
            "{} {}{}{}",
            self.baud_rate, self.data_bits, parity, self.stop_bits
        )?;
        if self.handshake == Handshake::RtsCts {
            f.write_str(" rtscts")?;
        }
        Ok(())
    }
}

/// Blocking raw-mode serial port operations, uniform across platforms.
///
/// All methods take `&self`: a port is shared between exactly one reader
/// and one writer thread, and each backend serializes per direction
/// internally. Configuration calls are not synchronized against in-flight
/// reads or writes; do not reconfigure a line while I/O on it is
/// outstanding unless the platform driver is known to tolerate it.
pub trait SerialPort: Send + Sync + fmt::Debug {
    /// Read bytes from the line into `buffer`, blocking per the configured
    /// read parameters.
    ///
    /// Returns the number of bytes read. `Ok(0)` means the line hung up;
    /// an expired read timeout with no data is reported as
    /// [`Error::TimedOut`] instead.
    fn read_bytes(&self, buffer: &mut [u8]) -> Result<usize>;

    /// Write bytes to the line, blocking until the driver accepts them.
    ///
    /// Returns the number of bytes written. There is no write timeout: a
    /// flow-control-stalled line blocks indefinitely.
    fn write_bytes(&self, data: &[u8]) -> Result<usize>;

    /// Apply a line configuration.
    ///
    /// All fields are validated before any device state changes; a
    /// validation failure leaves the previous configuration intact. On
    /// POSIX the control-flag write and the baud-rate change are two
    /// separate steps: if the baud step fails, the error is returned with
    /// the flag write already in effect (partial success, not rolled back).
    fn set_mode(&self, mode: &Mode) -> Result<()>;

    /// Reprogram how [`read_bytes`](Self::read_bytes) blocks.
    ///
    /// A read returns once `min_read` bytes are available or once `timeout`
    /// elapses, whichever is first. `Duration::ZERO` disables the timeout:
    /// reads then block until at least one byte arrives. Timeouts are
    /// quantized to deciseconds on POSIX (values saturate at 25.5 s and a
    /// 255-byte minimum) and to milliseconds on Windows, where `min_read`
    /// is not expressible and is ignored.
    fn set_read_params(&self, min_read: usize, timeout: Duration) -> Result<()>;

    /// Driver-reported (input, output) baud rates.
    ///
    /// Best-effort telemetry: returns `(0, 0)` if the query fails. The
    /// reported rates may differ from the requested ones when the driver
    /// snapped to a nearby supported speed.
    fn baud_rate(&self) -> (u32, u32);

    /// The device name this port was opened with.
    fn name(&self) -> &str;

    /// Release the native handle.
    ///
    /// Every operation after a successful close fails with
    /// [`Error::Closed`]; calling close a second time reports the same.
    fn close(&self) -> Result<()>;
}
