//! Raw serial line access with one uniform surface per platform.
//!
//! This library opens a serial device, takes it over into raw mode and
//! exposes byte-stream reads and writes plus line reconfiguration through
//! the [`SerialPort`] trait. The POSIX backend drives termios; the Windows
//! backend drives the comm API with overlapped I/O.
//!
//! # Modules
//!
//! - `port`: the [`SerialPort`] contract, the native backend for the
//!   target, and an in-memory mock
//! - `error`: the error taxonomy shared by every backend
//! - `config`: TOML schema and loader for the `rawterm` binary
//!
//! # Example
//!
//! ```no_run
//! use rawserial::{Mode, Parity, SerialPort};
//!
//! # fn main() -> rawserial::Result<()> {
//! let port = rawserial::open("/dev/ttyUSB0")?;
//! port.set_mode(&Mode {
//!     baud_rate: 115_200,
//!     parity: Parity::Even,
//!     ..Mode::default()
//! })?;
//! port.write_bytes(b"AT\r\n")?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod port;

// Re-export commonly used types for convenience
pub use error::{Error, Result};
pub use port::{open, Handshake, MockSerialPort, Mode, NativePort, Parity, SerialPort};

#[cfg(unix)]
pub use port::TtyPort;
#[cfg(windows)]
pub use port::ComPort;

pub use config::{Config, ConfigError, ConfigResult};
