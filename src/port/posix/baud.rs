//! Baud-rate strategies for the POSIX backend.
//!
//! Linux takes any numeric rate through the `termios2` BOTHER encoding.
//! Apple platforms take it through the IOSSIOSPEED ioctl, which applies
//! on top of the standard attribute path. Everything else is limited to
//! the symbolic B-constants the driver recognizes.
//!
//! A failed speed request is surfaced as-is, with no retry and no
//! fallback to a nearby rate; retry policy belongs to the caller.

#[cfg(not(any(target_os = "macos", target_os = "ios")))]
use super::termios;
use crate::error::Result;
use std::os::unix::io::RawFd;

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "ios")))]
use crate::error::Error;

/// Request `rate` bits per second on `fd`, both directions.
#[cfg(target_os = "linux")]
pub(super) fn set_speed(fd: RawFd, rate: u32) -> Result<()> {
    let mut attrs = termios::get_attributes(fd)?;
    attrs.set_custom_speed(rate);
    termios::set_attributes(fd, &attrs)?;
    Ok(())
}

/// The IOKit arbitrary-speed request, `_IOW('T', 2, speed_t)`. Not bound
/// by the libc crate.
#[cfg(any(target_os = "macos", target_os = "ios"))]
const IOSSIOSPEED: libc::c_ulong = 0x8008_5402;

/// Request `rate` bits per second on `fd`, both directions.
///
/// IOSSIOSPEED rates do not round-trip through the attribute record, so a
/// later [`speeds`](super::termios::LineAttrs::speeds) readout may still
/// show the pre-ioctl value.
#[cfg(any(target_os = "macos", target_os = "ios"))]
pub(super) fn set_speed(fd: RawFd, rate: u32) -> Result<()> {
    let speed = rate as libc::speed_t;
    let rc = unsafe { libc::ioctl(fd, IOSSIOSPEED, &speed as *const libc::speed_t) };
    if rc == -1 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}

/// Request `rate` bits per second on `fd`, both directions.
///
/// Restricted to the symbolic speed table; anything else reports
/// `UnsupportedBaudRate` before any device state changes.
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "ios")))]
pub(super) fn set_speed(fd: RawFd, rate: u32) -> Result<()> {
    let speed = symbolic_speed(rate).ok_or(Error::UnsupportedBaudRate(rate))?;
    let mut attrs = termios::get_attributes(fd)?;
    attrs.set_symbolic_speed(speed)?;
    termios::set_attributes(fd, &attrs)?;
    Ok(())
}

/// Rates with a universally-defined B-constant.
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "ios")))]
fn symbolic_speed(rate: u32) -> Option<libc::speed_t> {
    Some(match rate {
        50 => libc::B50,
        75 => libc::B75,
        110 => libc::B110,
        134 => libc::B134,
        150 => libc::B150,
        200 => libc::B200,
        300 => libc::B300,
        600 => libc::B600,
        1200 => libc::B1200,
        1800 => libc::B1800,
        2400 => libc::B2400,
        4800 => libc::B4800,
        9600 => libc::B9600,
        19200 => libc::B19200,
        38400 => libc::B38400,
        57600 => libc::B57600,
        115200 => libc::B115200,
        230400 => libc::B230400,
        _ => return None,
    })
}

#[cfg(all(
    test,
    not(any(target_os = "linux", target_os = "macos", target_os = "ios"))
))]
mod tests {
    use super::*;

    #[test]
    fn table_covers_the_common_rates() {
        for rate in [9600u32, 19200, 38400, 57600, 115200, 230400] {
            assert!(symbolic_speed(rate).is_some(), "missing {rate}");
        }
    }

    #[test]
    fn off_table_rates_are_rejected() {
        assert!(symbolic_speed(0).is_none());
        assert!(symbolic_speed(12345).is_none());
        assert!(symbolic_speed(250_000).is_none());
    }
}

#[cfg(all(test, any(target_os = "macos", target_os = "ios")))]
mod apple_tests {
    use super::*;
    use std::os::unix::io::AsRawFd;

    #[test]
    fn speed_request_matches_the_iow_encoding() {
        // _IOW('T', 2, speed_t): write direction, payload size, 'T' group.
        let encoded: libc::c_ulong = 0x8000_0000
            | ((std::mem::size_of::<libc::speed_t>() as libc::c_ulong & 0x1fff) << 16)
            | ((b'T' as libc::c_ulong) << 8)
            | 2;
        assert_eq!(IOSSIOSPEED, encoded);
    }

    #[test]
    fn set_speed_on_a_non_tty_is_an_error() {
        let file = std::fs::File::open("/dev/null").unwrap();
        assert!(set_speed(file.as_raw_fd(), 115_200).is_err());
    }
}
