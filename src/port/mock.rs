//! Mock serial port implementation for testing.
//!
//! Provides a `MockSerialPort` that honors the [`SerialPort`] contract
//! against in-memory queues: scripted reads, captured writes, recorded
//! configuration changes and close tracking, without any hardware.

use crate::error::{Error, Result};
use crate::port::traits::{Mode, SerialPort};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Inner state, behind a mutex for interior mutability.
#[derive(Debug, Default)]
struct MockPortState {
    /// Bytes handed out by subsequent reads.
    read_queue: VecDeque<u8>,
    /// Every write, in order.
    write_log: Vec<Vec<u8>>,
    /// Every accepted mode change, in order.
    mode_log: Vec<Mode>,
    /// Last accepted read parameters.
    read_params: (usize, Duration),
    /// What `baud_rate` reports.
    reported_baud: (u32, u32),
    closed: bool,
}

/// In-memory [`SerialPort`] for consumer tests.
///
/// The mock never blocks: a read from an exhausted queue reports the
/// timeout condition rather than waiting for data that cannot arrive.
/// Cloning shares the underlying state, so a clone can feed the queue
/// while another thread reads through the trait.
///
/// # Example
/// ```
/// use rawserial::{MockSerialPort, SerialPort};
///
/// let port = MockSerialPort::new("MOCK0");
/// port.enqueue_read(b"pong");
///
/// port.write_bytes(b"ping").unwrap();
///
/// let mut buffer = [0u8; 16];
/// let n = port.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"pong");
/// assert_eq!(port.write_log(), vec![b"ping".to_vec()]);
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    name: String,
    state: Arc<Mutex<MockPortState>>,
}

impl MockSerialPort {
    /// Create a mock port with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockPortState::default())),
        }
    }

    /// Append bytes to be returned by subsequent reads.
    pub fn enqueue_read(&self, data: &[u8]) {
        self.state.lock().read_queue.extend(data);
    }

    /// A copy of everything written so far.
    pub fn write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// Forget captured writes, keeping everything else.
    pub fn clear_write_log(&self) {
        self.state.lock().write_log.clear();
    }

    /// The most recent accepted mode, if any.
    pub fn last_mode(&self) -> Option<Mode> {
        self.state.lock().mode_log.last().copied()
    }

    /// The last accepted read parameters.
    pub fn read_params(&self) -> (usize, Duration) {
        self.state.lock().read_params
    }

    /// Override what [`SerialPort::baud_rate`] reports, simulating a driver
    /// that snapped to a nearby supported speed.
    pub fn set_reported_baud(&self, input: u32, output: u32) {
        self.state.lock().reported_baud = (input, output);
    }

    /// Bytes still queued for reading.
    pub fn remaining_read_bytes(&self) -> usize {
        self.state.lock().read_queue.len()
    }
}

impl SerialPort for MockSerialPort {
    fn read_bytes(&self, buffer: &mut [u8]) -> Result<usize> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Error::Closed);
        }

        let mut n = 0;
        for slot in buffer.iter_mut() {
            match state.read_queue.pop_front() {
                Some(byte) => {
                    *slot = byte;
                    n += 1;
                }
                None => break,
            }
        }

        if n == 0 && !buffer.is_empty() {
            return Err(Error::TimedOut);
        }
        Ok(n)
    }

    fn write_bytes(&self, data: &[u8]) -> Result<usize> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Error::Closed);
        }
        state.write_log.push(data.to_vec());
        Ok(data.len())
    }

    fn set_mode(&self, mode: &Mode) -> Result<()> {
        mode.validate()?;
        let mut state = self.state.lock();
        if state.closed {
            return Err(Error::Closed);
        }
        state.mode_log.push(*mode);
        state.reported_baud = (mode.baud_rate, mode.baud_rate);
        Ok(())
    }

    fn set_read_params(&self, min_read: usize, timeout: Duration) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Error::Closed);
        }
        state.read_params = (min_read, timeout);
        Ok(())
    }

    fn baud_rate(&self) -> (u32, u32) {
        let state = self.state.lock();
        if state.closed {
            return (0, 0);
        }
        state.reported_baud
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Error::Closed);
        }
        state.closed = true;
        Ok(())
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("queued", &state.read_queue.len())
            .field("closed", &state.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_and_read() {
        let port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"hello");

        let mut buffer = [0u8; 16];
        let n = port.read_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"hello");
    }

    #[test]
    fn partial_read_leaves_the_rest_queued() {
        let port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"hello, world!");

        let mut buffer = [0u8; 5];
        let n = port.read_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"hello");
        assert_eq!(port.remaining_read_bytes(), 8);
    }

    #[test]
    fn empty_queue_reads_time_out() {
        let port = MockSerialPort::new("MOCK0");
        let mut buffer = [0u8; 8];
        assert!(matches!(port.read_bytes(&mut buffer), Err(Error::TimedOut)));
    }

    #[test]
    fn writes_are_logged_in_order() {
        let port = MockSerialPort::new("MOCK0");
        port.write_bytes(b"first").unwrap();
        port.write_bytes(b"second").unwrap();

        let log = port.write_log();
        assert_eq!(log, vec![b"first".to_vec(), b"second".to_vec()]);
    }

    #[test]
    fn mode_changes_are_recorded_and_reflected_in_baud() {
        let port = MockSerialPort::new("MOCK0");
        assert_eq!(port.baud_rate(), (0, 0));

        let mode = Mode {
            baud_rate: 38400,
            ..Mode::default()
        };
        port.set_mode(&mode).unwrap();
        assert_eq!(port.last_mode(), Some(mode));
        assert_eq!(port.baud_rate(), (38400, 38400));
    }

    #[test]
    fn invalid_mode_is_rejected_without_recording() {
        let port = MockSerialPort::new("MOCK0");
        let bad = Mode {
            data_bits: 9,
            ..Mode::default()
        };
        assert!(matches!(
            port.set_mode(&bad),
            Err(Error::InvalidParameter { field: "data_bits", .. })
        ));
        assert_eq!(port.last_mode(), None);
    }

    #[test]
    fn read_params_are_recorded() {
        let port = MockSerialPort::new("MOCK0");
        port.set_read_params(16, Duration::from_millis(500)).unwrap();
        assert_eq!(port.read_params(), (16, Duration::from_millis(500)));
    }

    #[test]
    fn closed_port_rejects_everything() {
        let port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"stale");
        port.close().unwrap();

        let mut buffer = [0u8; 8];
        assert!(matches!(port.read_bytes(&mut buffer), Err(Error::Closed)));
        assert!(matches!(port.write_bytes(b"x"), Err(Error::Closed)));
        assert!(matches!(
            port.set_mode(&Mode::default()),
            Err(Error::Closed)
        ));
        assert!(matches!(
            port.set_read_params(0, Duration::ZERO),
            Err(Error::Closed)
        ));
        assert_eq!(port.baud_rate(), (0, 0));
    }

    #[test]
    fn double_close_reports_closed() {
        let port = MockSerialPort::new("MOCK0");
        port.close().unwrap();
        assert!(matches!(port.close(), Err(Error::Closed)));
    }

    #[test]
    fn clones_share_state_across_threads() {
        let port = MockSerialPort::new("MOCK0");
        let feeder = port.clone();

        let handle = std::thread::spawn(move || feeder.enqueue_read(b"fed"));
        handle.join().unwrap();

        let mut buffer = [0u8; 8];
        let n = port.read_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"fed");
    }
}
