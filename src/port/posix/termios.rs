//! Strongly-typed access to the native line-attribute structure.
//!
//! On Linux the attribute record is `termios2`, fetched and stored through
//! the `TCGETS2`/`TCSETS2` ioctl pair so arbitrary speeds survive the
//! round-trip. Elsewhere it is the plain `termios` record via
//! `tcgetattr`/`tcsetattr`. The native layout never leaves this module.

use crate::port::traits::{Handshake, Mode, Parity};
use std::io;
use std::mem;
use std::os::unix::io::RawFd;

#[cfg(target_os = "linux")]
type RawAttrs = libc::termios2;
#[cfg(not(target_os = "linux"))]
type RawAttrs = libc::termios;

/// Snapshot of a device's line attributes.
pub(super) struct LineAttrs {
    raw: RawAttrs,
}

/// Fetch the current attributes of `fd`.
pub(super) fn get_attributes(fd: RawFd) -> io::Result<LineAttrs> {
    let mut raw: RawAttrs = unsafe { mem::zeroed() };
    #[cfg(target_os = "linux")]
    let rc = unsafe { libc::ioctl(fd, libc::TCGETS2, &mut raw as *mut RawAttrs) };
    #[cfg(not(target_os = "linux"))]
    let rc = unsafe { libc::tcgetattr(fd, &mut raw) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(LineAttrs { raw })
}

/// Write attributes back to `fd`, taking effect immediately.
pub(super) fn set_attributes(fd: RawFd, attrs: &LineAttrs) -> io::Result<()> {
    #[cfg(target_os = "linux")]
    let rc = unsafe { libc::ioctl(fd, libc::TCSETS2, &attrs.raw as *const RawAttrs) };
    #[cfg(not(target_os = "linux"))]
    let rc = unsafe { libc::tcsetattr(fd, libc::TCSANOW, &attrs.raw) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

impl LineAttrs {
    /// Clear everything that would edit, echo, translate or signal, leaving
    /// a line that delivers bytes exactly as received. The read policy
    /// becomes wait-for-one-byte.
    pub(super) fn make_raw(&mut self) {
        self.raw.c_iflag &= !(libc::IGNBRK
            | libc::BRKINT
            | libc::IGNPAR
            | libc::PARMRK
            | libc::INPCK
            | libc::ISTRIP
            | libc::INLCR
            | libc::IGNCR
            | libc::ICRNL
            | libc::IXON
            | libc::IXOFF);
        self.raw.c_oflag &= !libc::OPOST;
        self.raw.c_lflag &=
            !(libc::ISIG | libc::ICANON | libc::ECHO | libc::ECHONL | libc::IEXTEN);
        self.raw.c_cflag &= !(libc::CSIZE | libc::PARENB);
        self.raw.c_cflag |= libc::CS8;
        self.raw.c_cc[libc::VTIME] = 0;
        self.raw.c_cc[libc::VMIN] = 1;
    }

    /// Reassign the four mode bit groups (character size, parity, stop
    /// bits, hardware flow control), preserving every other control bit as
    /// the driver last set it. The baud rate is not touched here.
    pub(super) fn apply_mode(&mut self, mode: &Mode) {
        let size = match mode.data_bits {
            5 => libc::CS5,
            6 => libc::CS6,
            7 => libc::CS7,
            _ => libc::CS8,
        };
        self.raw.c_cflag &= !libc::CSIZE;
        self.raw.c_cflag |= size;

        self.raw.c_cflag &= !(libc::PARENB | libc::PARODD);
        match mode.parity {
            Parity::None => {}
            Parity::Even => self.raw.c_cflag |= libc::PARENB,
            Parity::Odd => self.raw.c_cflag |= libc::PARENB | libc::PARODD,
        }

        self.raw.c_cflag &= !libc::CSTOPB;
        if mode.stop_bits == 2 {
            self.raw.c_cflag |= libc::CSTOPB;
        }

        self.raw.c_cflag &= !libc::CRTSCTS;
        if mode.handshake == Handshake::RtsCts {
            self.raw.c_cflag |= libc::CRTSCTS;
        }
    }

    /// Program the VMIN/VTIME read-policy slots.
    pub(super) fn set_read_policy(&mut self, vmin: u8, vtime: u8) {
        self.raw.c_cc[libc::VMIN] = vmin as libc::cc_t;
        self.raw.c_cc[libc::VTIME] = vtime as libc::cc_t;
    }

    /// Driver-reported (input, output) speeds in bits per second.
    #[cfg(target_os = "linux")]
    pub(super) fn speeds(&self) -> (u32, u32) {
        (self.raw.c_ispeed, self.raw.c_ospeed)
    }

    /// Driver-reported (input, output) speeds. Outside Linux the stored
    /// speed values are numeric rates already.
    #[cfg(not(target_os = "linux"))]
    pub(super) fn speeds(&self) -> (u32, u32) {
        let input = unsafe { libc::cfgetispeed(&self.raw) };
        let output = unsafe { libc::cfgetospeed(&self.raw) };
        (input as u32, output as u32)
    }

    /// Select the arbitrary-speed encoding and store the numeric rate in
    /// both direction fields.
    #[cfg(target_os = "linux")]
    pub(super) fn set_custom_speed(&mut self, rate: u32) {
        self.raw.c_cflag &= !libc::CBAUD;
        self.raw.c_cflag |= libc::BOTHER;
        self.raw.c_ispeed = rate;
        self.raw.c_ospeed = rate;
    }

    /// Store a symbolic speed constant in both direction fields.
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "ios")))]
    pub(super) fn set_symbolic_speed(&mut self, speed: libc::speed_t) -> io::Result<()> {
        let rc = unsafe { libc::cfsetispeed(&mut self.raw, speed) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        let rc = unsafe { libc::cfsetospeed(&mut self.raw, speed) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    impl LineAttrs {
        fn blank() -> Self {
            LineAttrs {
                raw: unsafe { mem::zeroed() },
            }
        }

        fn cflag(&self) -> libc::tcflag_t {
            self.raw.c_cflag
        }

        fn cc(&self, slot: usize) -> libc::cc_t {
            self.raw.c_cc[slot]
        }
    }

    #[test]
    fn make_raw_strips_line_discipline() {
        let mut attrs = LineAttrs::blank();
        attrs.raw.c_iflag = libc::IXON | libc::ICRNL | libc::BRKINT;
        attrs.raw.c_oflag = libc::OPOST;
        attrs.raw.c_lflag = libc::ICANON | libc::ECHO | libc::ISIG;
        attrs.raw.c_cflag = libc::CS7 | libc::PARENB;

        attrs.make_raw();

        assert_eq!(attrs.raw.c_iflag & (libc::IXON | libc::ICRNL | libc::BRKINT), 0);
        assert_eq!(attrs.raw.c_oflag & libc::OPOST, 0);
        assert_eq!(
            attrs.raw.c_lflag & (libc::ICANON | libc::ECHO | libc::ISIG),
            0
        );
        assert_eq!(attrs.cflag() & libc::CSIZE, libc::CS8);
        assert_eq!(attrs.cflag() & libc::PARENB, 0);
        assert_eq!(attrs.cc(libc::VMIN), 1);
        assert_eq!(attrs.cc(libc::VTIME), 0);
    }

    #[test]
    fn apply_mode_encodes_each_frame_shape() {
        let mut attrs = LineAttrs::blank();
        attrs.apply_mode(&Mode {
            baud_rate: 115_200,
            data_bits: 7,
            parity: Parity::Even,
            stop_bits: 2,
            handshake: Handshake::RtsCts,
        });
        assert_eq!(attrs.cflag() & libc::CSIZE, libc::CS7);
        assert_eq!(attrs.cflag() & libc::PARENB, libc::PARENB);
        assert_eq!(attrs.cflag() & libc::PARODD, 0);
        assert_eq!(attrs.cflag() & libc::CSTOPB, libc::CSTOPB);
        assert_eq!(attrs.cflag() & libc::CRTSCTS, libc::CRTSCTS);

        attrs.apply_mode(&Mode {
            baud_rate: 9600,
            data_bits: 5,
            parity: Parity::Odd,
            stop_bits: 1,
            handshake: Handshake::None,
        });
        assert_eq!(attrs.cflag() & libc::CSIZE, libc::CS5);
        assert_eq!(
            attrs.cflag() & (libc::PARENB | libc::PARODD),
            libc::PARENB | libc::PARODD
        );
        assert_eq!(attrs.cflag() & libc::CSTOPB, 0);
        assert_eq!(attrs.cflag() & libc::CRTSCTS, 0);

        attrs.apply_mode(&Mode::default());
        assert_eq!(attrs.cflag() & libc::CSIZE, libc::CS8);
        assert_eq!(attrs.cflag() & (libc::PARENB | libc::PARODD), 0);
    }

    #[test]
    fn read_policy_lands_in_the_right_slots() {
        let mut attrs = LineAttrs::blank();
        attrs.set_read_policy(3, 25);
        assert_eq!(attrs.cc(libc::VMIN), 3);
        assert_eq!(attrs.cc(libc::VTIME), 25);
    }

    proptest! {
        /// Bits outside the four reassigned groups survive any mode.
        #[test]
        fn apply_mode_preserves_unrelated_cflag_bits(
            initial in any::<u32>(),
            data_bits in 5u8..=8,
            parity_pick in 0u8..3,
            stop_bits in 1u8..=2,
            rtscts in any::<bool>(),
        ) {
            let mode = Mode {
                baud_rate: 19_200,
                data_bits,
                parity: match parity_pick {
                    0 => Parity::None,
                    1 => Parity::Even,
                    _ => Parity::Odd,
                },
                stop_bits,
                handshake: if rtscts { Handshake::RtsCts } else { Handshake::None },
            };

            let mut attrs = LineAttrs::blank();
            attrs.raw.c_cflag = initial as libc::tcflag_t;
            let before = attrs.cflag();
            attrs.apply_mode(&mode);

            let touched = libc::CSIZE | libc::PARENB | libc::PARODD | libc::CSTOPB | libc::CRTSCTS;
            prop_assert_eq!(before & !touched, attrs.cflag() & !touched);
        }
    }
}
