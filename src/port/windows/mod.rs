//! Windows serial port backend.
//!
//! `ComPort` owns an overlapped COM handle. The handle is opened with
//! `FILE_FLAG_OVERLAPPED` so that a read and a write can be in flight at
//! the same time; each direction carries its own event-backed OVERLAPPED
//! record and the submitting thread parks on `GetOverlappedResult` until
//! its own operation completes.

mod line;
mod sys;

use crate::error::{Error, Result};
use crate::port::traits::{Mode, SerialPort};
use parking_lot::Mutex;
use std::fmt;
use std::io;
use std::mem;
use std::os::windows::io::{AsRawHandle, RawHandle};
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;
use winapi::shared::minwindef::{DWORD, FALSE};
use winapi::shared::winerror::ERROR_IO_PENDING;
use winapi::um::fileapi::{ReadFile, WriteFile};
use winapi::um::handleapi::CloseHandle;
use winapi::um::winbase::{DCB, EV_RXCHAR};
use winapi::um::winnt::HANDLE;

/// A serial device opened for overlapped I/O.
///
/// One thread may read while another writes; the two directions use
/// separate completion events and never contend. Configuration methods
/// are quick control calls and must not race in-flight I/O on the same
/// line.
pub struct ComPort {
    handle: HANDLE,
    name: String,
    closed: AtomicBool,
    read_io: Mutex<sys::IoToken>,
    write_io: Mutex<sys::IoToken>,
}

// HANDLE is a raw pointer, which suppresses the auto traits. The handle
// itself is thread-agnostic, each OVERLAPPED lives behind its own mutex,
// and the closed flag makes CloseHandle run at most once.
unsafe impl Send for ComPort {}
unsafe impl Sync for ComPort {}

impl ComPort {
    /// Open the named COM device for overlapped reads and writes.
    ///
    /// Bare names like `COM3` get the `\\.\` device prefix. The driver
    /// buffers are sized, reads start in the block-until-data policy and
    /// the receive-character event is selected before the port is handed
    /// out.
    pub fn open(name: &str) -> Result<Self> {
        let k32 = sys::kernel32()
            .map_err(|e| Error::setup("resolving kernel32 entry points", e))?;

        let path = line::device_path(name);
        let handle = sys::open_device(&path)
            .map_err(|e| Error::Io(io::Error::new(e.kind(), format!("opening {name}: {e}"))))?;
        let handle = sys::OwnedHandle::new(handle);

        k32.setup_comm(handle.get(), 64, 64)
            .map_err(|e| Error::setup("configuring device buffers", e))?;

        let mut timeouts = line::build_timeouts(Duration::ZERO);
        k32.set_comm_timeouts(handle.get(), &mut timeouts)
            .map_err(|e| Error::setup("configuring read timeouts", e))?;

        k32.set_comm_mask(handle.get(), EV_RXCHAR)
            .map_err(|e| Error::setup("configuring the event mask", e))?;

        let read_io = sys::IoToken::new(k32)
            .map_err(|e| Error::setup("allocating the read event", e))?;
        let write_io = sys::IoToken::new(k32)
            .map_err(|e| Error::setup("allocating the write event", e))?;

        let port = Self {
            handle: handle.into_raw(),
            name: name.to_string(),
            closed: AtomicBool::new(false),
            read_io: Mutex::new(read_io),
            write_io: Mutex::new(write_io),
        };
        debug!(device = %port.name, "opened serial device for overlapped I/O");
        Ok(port)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        Ok(())
    }
}

impl SerialPort for ComPort {
    fn read_bytes(&self, buffer: &mut [u8]) -> Result<usize> {
        self.ensure_open()?;
        if buffer.is_empty() {
            return Ok(0);
        }

        let k32 = sys::kernel32()
            .map_err(|e| Error::setup("resolving kernel32 entry points", e))?;
        let mut token = self.read_io.lock();
        token.rearm(k32)?;

        let len = buffer.len().min(DWORD::MAX as usize) as DWORD;
        let ok = unsafe {
            ReadFile(
                self.handle,
                buffer.as_mut_ptr().cast(),
                len,
                ptr::null_mut(),
                token.overlapped_mut(),
            )
        };
        if ok == FALSE {
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(ERROR_IO_PENDING as i32) {
                return Err(Error::Io(err));
            }
        }

        // Completion state is only defined after this call, even when
        // ReadFile finished synchronously.
        let n = k32.overlapped_result(self.handle, token.overlapped_mut(), true)?;
        if n == 0 {
            return Err(Error::TimedOut);
        }
        Ok(n as usize)
    }

    fn write_bytes(&self, data: &[u8]) -> Result<usize> {
        self.ensure_open()?;
        if data.is_empty() {
            return Ok(0);
        }

        let k32 = sys::kernel32()
            .map_err(|e| Error::setup("resolving kernel32 entry points", e))?;
        let mut token = self.write_io.lock();
        token.rearm(k32)?;

        let len = data.len().min(DWORD::MAX as usize) as DWORD;
        let ok = unsafe {
            WriteFile(
                self.handle,
                data.as_ptr().cast(),
                len,
                ptr::null_mut(),
                token.overlapped_mut(),
            )
        };
        if ok == FALSE {
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(ERROR_IO_PENDING as i32) {
                return Err(Error::Io(err));
            }
        }

        let n = k32.overlapped_result(self.handle, token.overlapped_mut(), true)?;
        Ok(n as usize)
    }

    fn set_mode(&self, mode: &Mode) -> Result<()> {
        mode.validate()?;
        let mut dcb = line::build_dcb(mode)?;
        self.ensure_open()?;

        let k32 = sys::kernel32()
            .map_err(|e| Error::setup("resolving kernel32 entry points", e))?;
        k32.set_comm_state(self.handle, &mut dcb)?;

        debug!(device = %self.name, %mode, "line reconfigured");
        Ok(())
    }

    fn set_read_params(&self, _min_read: usize, timeout: Duration) -> Result<()> {
        self.ensure_open()?;

        // The timeout recipe reacts to the first byte; a byte-count floor
        // has no DCB/COMMTIMEOUTS encoding and is not honored here.
        let k32 = sys::kernel32()
            .map_err(|e| Error::setup("resolving kernel32 entry points", e))?;
        let mut timeouts = line::build_timeouts(timeout);
        k32.set_comm_timeouts(self.handle, &mut timeouts)?;

        debug!(device = %self.name, timeout_ms = timeout.as_millis() as u64, "read policy updated");
        Ok(())
    }

    fn baud_rate(&self) -> (u32, u32) {
        if self.ensure_open().is_err() {
            return (0, 0);
        }
        let Ok(k32) = sys::kernel32() else {
            return (0, 0);
        };
        let mut dcb: DCB = unsafe { mem::zeroed() };
        dcb.DCBlength = mem::size_of::<DCB>() as DWORD;
        match k32.get_comm_state(self.handle, &mut dcb) {
            // The clock is shared; both directions run at the DCB rate.
            Ok(()) => (dcb.BaudRate, dcb.BaudRate),
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
        if unsafe { CloseHandle(self.handle) } == FALSE {
            return Err(Error::Io(io::Error::last_os_error()));
        }
        Ok(())
    }
}

impl AsRawHandle for ComPort {
    fn as_raw_handle(&self) -> RawHandle {
        self.handle.cast()
    }
}

impl Drop for ComPort {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            unsafe { CloseHandle(self.handle) };
        }
    }
}

impl fmt::Debug for ComPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComPort")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl io::Read for &ComPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_bytes(buf).map_err(Into::into)
    }
}

impl io::Write for &ComPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf).map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Read for ComPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_bytes(buf).map_err(Into::into)
    }
}

impl io::Write for ComPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf).map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
