//! Port abstraction layer.
//!
//! The [`SerialPort`] trait is the uniform surface; each target gets one
//! native implementation behind `cfg`, plus an in-memory mock for tests
//! and higher layers.

pub mod mock;
pub mod traits;

#[cfg(unix)]
pub mod posix;
#[cfg(windows)]
pub mod windows;

pub use mock::MockSerialPort;
pub use traits::{Handshake, Mode, Parity, SerialPort};

#[cfg(unix)]
pub use posix::TtyPort;
#[cfg(windows)]
pub use windows::ComPort;

/// The concrete port type for the compilation target.
#[cfg(unix)]
pub type NativePort = TtyPort;
/// The concrete port type for the compilation target.
#[cfg(windows)]
pub type NativePort = ComPort;

/// Open the named device and take it over for raw serial I/O.
///
/// The device keeps its current line parameters until [`SerialPort::set_mode`]
/// is called; reads start out blocking until at least one byte arrives.
pub fn open(name: &str) -> crate::error::Result<NativePort> {
    NativePort::open(name)
}
