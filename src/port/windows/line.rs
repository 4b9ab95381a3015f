//! DCB and timeout construction for the Windows backend.
//!
//! Pure translation from the uniform line parameters to the native
//! records; nothing here touches a device.

use crate::error::{Error, Result};
use crate::port::traits::{Handshake, Mode, Parity};
use std::mem;
use std::time::Duration;
use winapi::shared::minwindef::{BYTE, DWORD};
use winapi::um::winbase::{
    COMMTIMEOUTS, DCB, DTR_CONTROL_ENABLE, EVENPARITY, NOPARITY, ODDPARITY, ONESTOPBIT,
    TWOSTOPBITS,
};

const MAXDWORD: DWORD = DWORD::MAX;

/// COM names without a namespace marker get the `\\.\` prefix; anything
/// already starting with a backslash passes through untouched.
pub(super) fn device_path(name: &str) -> String {
    if name.starts_with('\\') || name.is_empty() {
        name.to_string()
    } else {
        format!(r"\\.\{name}")
    }
}

/// Build the device control block for a validated mode.
///
/// Binary mode is forced on and DTR asserted. Hardware flow control is
/// not available on this backend and is rejected before any device
/// state could change.
pub(super) fn build_dcb(mode: &Mode) -> Result<DCB> {
    if mode.handshake == Handshake::RtsCts {
        return Err(Error::HandshakeUnsupported);
    }

    let mut dcb: DCB = unsafe { mem::zeroed() };
    dcb.DCBlength = mem::size_of::<DCB>() as DWORD;
    dcb.set_fBinary(1);
    dcb.set_fDtrControl(DTR_CONTROL_ENABLE);

    dcb.BaudRate = mode.baud_rate;
    dcb.ByteSize = mode.data_bits;

    match mode.parity {
        Parity::None => {
            dcb.set_fParity(0);
            dcb.Parity = NOPARITY as BYTE;
        }
        Parity::Even => {
            dcb.set_fParity(1);
            dcb.Parity = EVENPARITY as BYTE;
        }
        Parity::Odd => {
            dcb.set_fParity(1);
            dcb.Parity = ODDPARITY as BYTE;
        }
    }

    dcb.StopBits = if mode.stop_bits == 2 {
        TWOSTOPBITS as BYTE
    } else {
        ONESTOPBIT as BYTE
    };

    Ok(dcb)
}

/// Build read timeouts for the blocking-read contract.
///
/// With interval and multiplier pinned at MAXDWORD, a constant in
/// `1..MAXDWORD` makes ReadFile return buffered bytes immediately, else
/// wait for the first byte, else time out after the constant. A zero
/// `timeout` selects the maximal constant: block until data arrives.
/// Write timeouts stay zero; writes have no deadline.
pub(super) fn build_timeouts(timeout: Duration) -> COMMTIMEOUTS {
    let mut timeouts: COMMTIMEOUTS = unsafe { mem::zeroed() };
    timeouts.ReadIntervalTimeout = MAXDWORD;
    timeouts.ReadTotalTimeoutMultiplier = MAXDWORD;
    timeouts.ReadTotalTimeoutConstant = if timeout.is_zero() {
        MAXDWORD - 1
    } else {
        timeout.as_millis().clamp(1, (MAXDWORD - 2) as u128) as DWORD
    };
    timeouts
}
