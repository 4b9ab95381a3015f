//! Unified error handling for port configuration and I/O.
//!
//! One error enum covers the whole surface: parameter validation, device
//! setup phases, steady-state I/O, timeouts, and use-after-close. No
//! operation panics for ordinary misconfiguration.

use std::io;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by port operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A caller-supplied line parameter is outside the accepted domain.
    ///
    /// Always raised before any device state is touched.
    #[error("invalid {field}: must be {expected}")]
    InvalidParameter {
        /// Name of the offending field.
        field: &'static str,
        /// Accepted range or set, in human-readable form.
        expected: &'static str,
    },

    /// A device setup step failed; `operation` names the phase so callers
    /// can tell takeover-time failures from steady-state ones.
    #[error("{operation}: {source}")]
    Setup {
        operation: &'static str,
        #[source]
        source: io::Error,
    },

    /// The requested rate has no symbolic speed constant on this platform.
    #[error("unsupported baud rate {0}")]
    UnsupportedBaudRate(u32),

    /// Hardware flow control requested on a backend that cannot provide it.
    #[error("only NO_HANDSHAKE is supported")]
    HandshakeUnsupported,

    /// A read deadline elapsed with zero bytes transferred.
    ///
    /// Distinct from end-of-stream: a read returning `Ok(0)` means the line
    /// hung up, while `TimedOut` means the configured read timeout expired
    /// on an idle line.
    #[error("read timed out")]
    TimedOut,

    /// The port was already closed.
    #[error("port is closed")]
    Closed,

    /// An I/O error outside any named setup phase.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Create a parameter error naming the offending field.
    pub fn invalid(field: &'static str, expected: &'static str) -> Self {
        Self::InvalidParameter { field, expected }
    }

    /// Wrap an OS error with the setup phase it occurred in.
    pub fn setup(operation: &'static str, source: io::Error) -> Self {
        Self::Setup { operation, source }
    }

    /// Whether this error is the recoverable read-timeout condition.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::TimedOut)
    }
}

/// Conversion for the `std::io::Read`/`Write` adapter impls.
impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        match err {
            Error::Io(e) => e,
            Error::TimedOut => io::Error::new(io::ErrorKind::TimedOut, Error::TimedOut),
            Error::Closed => io::Error::new(io::ErrorKind::NotConnected, Error::Closed),
            other @ Error::InvalidParameter { .. } => {
                io::Error::new(io::ErrorKind::InvalidInput, other)
            }
            other => io::Error::other(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_error_names_the_field() {
        let err = Error::invalid("data_bits", "5, 6, 7 or 8");
        assert_eq!(err.to_string(), "invalid data_bits: must be 5, 6, 7 or 8");
    }

    #[test]
    fn setup_error_names_the_phase() {
        let inner = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err = Error::setup("before putting the device in raw mode", inner);
        assert_eq!(
            err.to_string(),
            "before putting the device in raw mode: denied"
        );
    }

    #[test]
    fn handshake_message_is_exact() {
        assert_eq!(
            Error::HandshakeUnsupported.to_string(),
            "only NO_HANDSHAKE is supported"
        );
    }

    #[test]
    fn timeout_is_discriminable() {
        assert!(Error::TimedOut.is_timeout());
        assert!(!Error::Closed.is_timeout());
        assert!(!Error::invalid("baud_rate", "greater than 0").is_timeout());
    }

    #[test]
    fn io_conversion_preserves_kinds() {
        let e: io::Error = Error::TimedOut.into();
        assert_eq!(e.kind(), io::ErrorKind::TimedOut);

        let e: io::Error = Error::Closed.into();
        assert_eq!(e.kind(), io::ErrorKind::NotConnected);

        let e: io::Error = Error::invalid("stop_bits", "1 or 2").into();
        assert_eq!(e.kind(), io::ErrorKind::InvalidInput);

        let inner = io::Error::new(io::ErrorKind::NotFound, "gone");
        let e: io::Error = Error::Io(inner).into();
        assert_eq!(e.kind(), io::ErrorKind::NotFound);
    }
}
