//! POSIX serial port backend.
//!
//! `TtyPort` owns a raw file descriptor in raw mode. Opening follows the
//! takeover sequence of the classic serial samples: open read-write,
//! non-blocking, without becoming the controlling terminal; strip the line
//! discipline down to a raw byte stream; then restore blocking I/O for
//! steady-state reads and writes.

mod baud;
mod termios;

use crate::error::{Error, Result};
use crate::port::traits::{Mode, SerialPort};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, IntoRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// A serial device in raw mode, backed by an owned file descriptor.
///
/// One thread may read while another writes; the kernel serializes each
/// direction. Configuration methods are quick attribute round-trips and
/// must not race in-flight I/O on the same line.
pub struct TtyPort {
    fd: RawFd,
    name: String,
    closed: AtomicBool,
    /// Set when the active read policy can expire (VMIN = 0, VTIME > 0).
    /// A zero-byte read then means timeout rather than hangup.
    timed_reads: AtomicBool,
}

impl TtyPort {
    /// Open the device at `path` and put it into raw mode.
    pub fn open(path: &str) -> Result<Self> {
        let device = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(path)
            .map_err(|e| Error::Io(io::Error::new(e.kind(), format!("opening {path}: {e}"))))?;

        let port = Self::adopt(device, path.to_string())?;
        port.clear_nonblock()
            .map_err(|e| Error::setup("restoring blocking mode", e))?;

        debug!(device = %port.name, "opened serial device in raw mode");
        Ok(port)
    }

    /// Adopt an already-open device handle and force raw mode.
    ///
    /// This is the takeover half of [`open`](Self::open), usable on a
    /// handle obtained elsewhere (an inherited descriptor, a pty). The
    /// handle is consumed; if takeover fails it is closed before the error
    /// returns. The caller keeps responsibility for the handle having been
    /// opened read-write.
    pub fn take_over(device: File) -> Result<Self> {
        let name = format!("<fd {}>", device.as_raw_fd());
        Self::adopt(device, name)
    }

    fn adopt(device: File, name: String) -> Result<Self> {
        let fd = device.as_raw_fd();

        let mut attrs = termios::get_attributes(fd)
            .map_err(|e| Error::setup("before putting the device in raw mode", e))?;
        attrs.make_raw();
        termios::set_attributes(fd, &attrs)
            .map_err(|e| Error::setup("after putting the device in raw mode", e))?;

        // Takeover succeeded; the descriptor outlives the File wrapper.
        let fd = device.into_raw_fd();
        Ok(Self {
            fd,
            name,
            closed: AtomicBool::new(false),
            timed_reads: AtomicBool::new(false),
        })
    }

    fn clear_nonblock(&self) -> io::Result<()> {
        let flags = unsafe { libc::fcntl(self.fd, libc::F_GETFL) };
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        let rc = unsafe { libc::fcntl(self.fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        Ok(())
    }
}

/// Translate read parameters into (VMIN, VTIME).
///
/// Timeouts quantize to deciseconds, rounding a small nonzero timeout up
/// to one granule; both slots saturate at 255. A 0/0 request becomes
/// VMIN = 1 so an idle read waits for the first byte instead of polling.
fn read_policy(min_read: usize, timeout: Duration) -> (u8, u8) {
    let mut vmin = min_read.min(255) as u8;
    let mut vtime = (timeout.as_millis() / 100).min(255) as u8;
    if !timeout.is_zero() && vtime == 0 {
        vtime = 1;
    }
    if min_read == 0 && timeout.is_zero() {
        vmin = 1;
    }
    (vmin, vtime)
}

impl SerialPort for TtyPort {
    fn read_bytes(&self, buffer: &mut [u8]) -> Result<usize> {
        self.ensure_open()?;
        if buffer.is_empty() {
            return Ok(0);
        }

        let n = loop {
            let n = unsafe { libc::read(self.fd, buffer.as_mut_ptr().cast(), buffer.len()) };
            if n >= 0 {
                break n as usize;
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(Error::Io(err));
            }
        };

        if n == 0 && self.timed_reads.load(Ordering::SeqCst) {
            return Err(Error::TimedOut);
        }
        Ok(n)
    }

    fn write_bytes(&self, data: &[u8]) -> Result<usize> {
        self.ensure_open()?;
        loop {
            let n = unsafe { libc::write(self.fd, data.as_ptr().cast(), data.len()) };
            if n >= 0 {
                return Ok(n as usize);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(Error::Io(err));
            }
        }
    }

    fn set_mode(&self, mode: &Mode) -> Result<()> {
        mode.validate()?;
        self.ensure_open()?;

        let mut attrs = termios::get_attributes(self.fd)?;
        attrs.apply_mode(mode);
        termios::set_attributes(self.fd, &attrs)?;

        // Separate step: on failure the flag write above stays in effect.
        if let Err(e) = baud::set_speed(self.fd, mode.baud_rate) {
            warn!(
                device = %self.name,
                baud = mode.baud_rate,
                "baud rate change failed after line flags were applied"
            );
            return Err(e);
        }

        debug!(device = %self.name, %mode, "line reconfigured");
        Ok(())
    }

    fn set_read_params(&self, min_read: usize, timeout: Duration) -> Result<()> {
        self.ensure_open()?;

        let (vmin, vtime) = read_policy(min_read, timeout);
        let mut attrs = termios::get_attributes(self.fd)?;
        attrs.set_read_policy(vmin, vtime);
        termios::set_attributes(self.fd, &attrs)?;

        self.timed_reads
            .store(vmin == 0 && vtime > 0, Ordering::SeqCst);
        Ok(())
    }

    fn baud_rate(&self) -> (u32, u32) {
        if self.ensure_open().is_err() {
            return (0, 0);
        }
        match termios::get_attributes(self.fd) {
            Ok(attrs) => attrs.speeds(),
            Err(_) => (0, 0),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        debug!(device = %self.name, "closing serial device");
        if unsafe { libc::close(self.fd) } < 0 {
            return Err(Error::Io(io::Error::last_os_error()));
        }
        Ok(())
    }
}

impl AsRawFd for TtyPort {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for TtyPort {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            unsafe { libc::close(self.fd) };
        }
    }
}

impl fmt::Debug for TtyPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtyPort")
            .field("name", &self.name)
            .field("fd", &self.fd)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl io::Read for &TtyPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_bytes(buf).map_err(Into::into)
    }
}

impl io::Write for &TtyPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf).map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Read for TtyPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_bytes(buf).map_err(Into::into)
    }
}

impl io::Write for TtyPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf).map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_missing_device_reports_not_found() {
        let err = TtyPort::open("/dev/rawserial-no-such-device").unwrap_err();
        match err {
            Error::Io(e) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            other => panic!("expected an I/O error, got {other:?}"),
        }
    }

    #[test]
    fn open_failure_names_the_device() {
        let err = TtyPort::open("/dev/rawserial-no-such-device").unwrap_err();
        assert!(
            err.to_string().contains("/dev/rawserial-no-such-device"),
            "error does not name the device: {err}"
        );
    }

    #[test]
    fn read_policy_quantizes_to_deciseconds() {
        assert_eq!(read_policy(0, Duration::from_secs(2)), (0, 20));
        assert_eq!(read_policy(0, Duration::from_millis(2500)), (0, 25));
        assert_eq!(read_policy(16, Duration::from_millis(100)), (16, 1));
    }

    #[test]
    fn sub_granule_timeouts_round_up() {
        assert_eq!(read_policy(0, Duration::from_millis(50)), (0, 1));
        assert_eq!(read_policy(0, Duration::from_millis(99)), (0, 1));
    }

    #[test]
    fn zero_zero_waits_for_the_first_byte() {
        assert_eq!(read_policy(0, Duration::ZERO), (1, 0));
    }

    #[test]
    fn policy_slots_saturate() {
        assert_eq!(read_policy(1000, Duration::ZERO), (255, 0));
        assert_eq!(read_policy(0, Duration::from_secs(60)), (0, 255));
    }

    #[test]
    fn min_read_alone_keeps_blocking_semantics() {
        assert_eq!(read_policy(3, Duration::ZERO), (3, 0));
    }
}
