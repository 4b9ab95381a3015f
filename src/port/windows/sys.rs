//! Narrow Win32 surface for the serial backend.
//!
//! The comm and event entry points are resolved from kernel32 by name,
//! once, into a private capability object; everything above calls typed
//! wrappers and never sees a raw proc address. `CreateFileW`, `ReadFile`,
//! `WriteFile` and `CloseHandle` are linked normally.

use once_cell::sync::OnceCell;
use std::ffi::OsStr;
use std::io;
use std::mem;
use std::os::raw::c_char;
use std::os::windows::ffi::OsStrExt;
use std::ptr;
use winapi::shared::minwindef::{BOOL, DWORD, FALSE, HMODULE, TRUE};
use winapi::um::fileapi::{CreateFileW, OPEN_EXISTING};
use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
use winapi::um::libloaderapi::{GetProcAddress, LoadLibraryW};
use winapi::um::minwinbase::{LPSECURITY_ATTRIBUTES, OVERLAPPED};
use winapi::um::winbase::{COMMTIMEOUTS, DCB, FILE_FLAG_OVERLAPPED};
use winapi::um::winnt::{
    FILE_ATTRIBUTE_NORMAL, GENERIC_READ, GENERIC_WRITE, HANDLE, LPCWSTR,
};

type CommStateFn = unsafe extern "system" fn(HANDLE, *mut DCB) -> BOOL;
type CommTimeoutsFn = unsafe extern "system" fn(HANDLE, *mut COMMTIMEOUTS) -> BOOL;
type CommMaskFn = unsafe extern "system" fn(HANDLE, DWORD) -> BOOL;
type SetupCommFn = unsafe extern "system" fn(HANDLE, DWORD, DWORD) -> BOOL;
type OverlappedResultFn =
    unsafe extern "system" fn(HANDLE, *mut OVERLAPPED, *mut DWORD, BOOL) -> BOOL;
type CreateEventFn =
    unsafe extern "system" fn(LPSECURITY_ATTRIBUTES, BOOL, BOOL, LPCWSTR) -> HANDLE;
type ResetEventFn = unsafe extern "system" fn(HANDLE) -> BOOL;

/// Typed kernel32 entry points, resolved once per process.
pub(super) struct Kernel32 {
    set_comm_state: CommStateFn,
    get_comm_state: CommStateFn,
    set_comm_timeouts: CommTimeoutsFn,
    set_comm_mask: CommMaskFn,
    setup_comm: SetupCommFn,
    get_overlapped_result: OverlappedResultFn,
    create_event: CreateEventFn,
    reset_event: ResetEventFn,
}

static KERNEL32: OnceCell<Kernel32> = OnceCell::new();

/// The resolved capability object, initializing it on first use.
pub(super) fn kernel32() -> io::Result<&'static Kernel32> {
    KERNEL32.get_or_try_init(Kernel32::resolve)
}

impl Kernel32 {
    fn resolve() -> io::Result<Self> {
        let module = unsafe { LoadLibraryW(wide("kernel32.dll").as_ptr()) };
        if module.is_null() {
            return Err(io::Error::last_os_error());
        }
        // kernel32 stays mapped for the process lifetime; the pointers
        // below are valid for 'static.
        unsafe {
            Ok(Self {
                set_comm_state: resolve_proc(module, b"SetCommState\0")?,
                get_comm_state: resolve_proc(module, b"GetCommState\0")?,
                set_comm_timeouts: resolve_proc(module, b"SetCommTimeouts\0")?,
                set_comm_mask: resolve_proc(module, b"SetCommMask\0")?,
                setup_comm: resolve_proc(module, b"SetupComm\0")?,
                get_overlapped_result: resolve_proc(module, b"GetOverlappedResult\0")?,
                create_event: resolve_proc(module, b"CreateEventW\0")?,
                reset_event: resolve_proc(module, b"ResetEvent\0")?,
            })
        }
    }

    /// Install a populated DCB on the device.
    pub(super) fn set_comm_state(&self, handle: HANDLE, dcb: &mut DCB) -> io::Result<()> {
        check(unsafe { (self.set_comm_state)(handle, dcb) })
    }

    /// Read the device's current DCB. `DCBlength` must be set by the caller.
    pub(super) fn get_comm_state(&self, handle: HANDLE, dcb: &mut DCB) -> io::Result<()> {
        check(unsafe { (self.get_comm_state)(handle, dcb) })
    }

    /// Install read/write timeout parameters.
    pub(super) fn set_comm_timeouts(
        &self,
        handle: HANDLE,
        timeouts: &mut COMMTIMEOUTS,
    ) -> io::Result<()> {
        check(unsafe { (self.set_comm_timeouts)(handle, timeouts) })
    }

    /// Select which comm events the device signals.
    pub(super) fn set_comm_mask(&self, handle: HANDLE, mask: DWORD) -> io::Result<()> {
        check(unsafe { (self.set_comm_mask)(handle, mask) })
    }

    /// Size the driver's receive and transmit buffers.
    pub(super) fn setup_comm(&self, handle: HANDLE, rx: DWORD, tx: DWORD) -> io::Result<()> {
        check(unsafe { (self.setup_comm)(handle, rx, tx) })
    }

    /// Completion query for one overlapped operation; blocks on the
    /// token's event when `wait` is set. Returns the transferred count.
    pub(super) fn overlapped_result(
        &self,
        handle: HANDLE,
        overlapped: *mut OVERLAPPED,
        wait: bool,
    ) -> io::Result<DWORD> {
        let mut transferred: DWORD = 0;
        let ok = unsafe {
            (self.get_overlapped_result)(
                handle,
                overlapped,
                &mut transferred,
                if wait { TRUE } else { FALSE },
            )
        };
        check(ok)?;
        Ok(transferred)
    }

    /// New manual-reset, initially nonsignaled, unnamed event.
    pub(super) fn create_event(&self) -> io::Result<HANDLE> {
        let event = unsafe { (self.create_event)(ptr::null_mut(), TRUE, FALSE, ptr::null()) };
        if event.is_null() {
            return Err(io::Error::last_os_error());
        }
        Ok(event)
    }

    /// Return an event to the nonsignaled state.
    pub(super) fn reset_event(&self, event: HANDLE) -> io::Result<()> {
        check(unsafe { (self.reset_event)(event) })
    }
}

/// Resolve one export into a typed fn pointer.
///
/// # Safety
/// `T` must be the fn-pointer type matching the named export's actual
/// signature and `name` must be NUL-terminated.
unsafe fn resolve_proc<T>(module: HMODULE, name: &'static [u8]) -> io::Result<T> {
    debug_assert!(name.ends_with(&[0]));
    let proc = GetProcAddress(module, name.as_ptr() as *const c_char);
    if proc.is_null() {
        return Err(io::Error::last_os_error());
    }
    Ok(mem::transmute_copy(&proc))
}

fn check(ok: BOOL) -> io::Result<()> {
    if ok == FALSE {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn wide(s: &str) -> Vec<u16> {
    OsStr::new(s).encode_wide().chain(std::iter::once(0)).collect()
}

/// Open a device path for overlapped, exclusive, read-write access.
pub(super) fn open_device(path: &str) -> io::Result<HANDLE> {
    let path = wide(path);
    let handle = unsafe {
        CreateFileW(
            path.as_ptr(),
            GENERIC_READ | GENERIC_WRITE,
            0,
            ptr::null_mut(),
            OPEN_EXISTING,
            FILE_ATTRIBUTE_NORMAL | FILE_FLAG_OVERLAPPED,
            ptr::null_mut(),
        )
    };
    if handle == INVALID_HANDLE_VALUE {
        return Err(io::Error::last_os_error());
    }
    Ok(handle)
}

/// Closes the wrapped handle on drop; used to keep the open path
/// leak-free until the port takes ownership.
pub(super) struct OwnedHandle(HANDLE);

impl OwnedHandle {
    pub(super) fn new(handle: HANDLE) -> Self {
        OwnedHandle(handle)
    }

    pub(super) fn get(&self) -> HANDLE {
        self.0
    }

    pub(super) fn into_raw(self) -> HANDLE {
        let handle = self.0;
        mem::forget(self);
        handle
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        unsafe { CloseHandle(self.0) };
    }
}

// The handle is only passed to thread-safe Win32 calls.
unsafe impl Send for OwnedHandle {}

/// One in-flight asynchronous operation: an OVERLAPPED record plus the
/// manual-reset event that signals its completion. A token belongs to
/// exactly one direction of one port and is reset before every
/// operation.
pub(super) struct IoToken {
    overlapped: OVERLAPPED,
}

impl IoToken {
    pub(super) fn new(k32: &Kernel32) -> io::Result<Self> {
        let event = k32.create_event()?;
        let mut overlapped: OVERLAPPED = unsafe { mem::zeroed() };
        overlapped.hEvent = event;
        Ok(IoToken { overlapped })
    }

    /// Rearm the completion event ahead of issuing an operation.
    pub(super) fn rearm(&mut self, k32: &Kernel32) -> io::Result<()> {
        k32.reset_event(self.overlapped.hEvent)
    }

    pub(super) fn overlapped_mut(&mut self) -> *mut OVERLAPPED {
        &mut self.overlapped
    }
}

impl Drop for IoToken {
    fn drop(&mut self) {
        unsafe { CloseHandle(self.overlapped.hEvent) };
    }
}

// The token owns its event handle; the OVERLAPPED record is only handed
// to Win32 while the owning mutex is held.
unsafe impl Send for IoToken {}
