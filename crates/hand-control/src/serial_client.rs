//! Request/response sequencing over a serial byte line.

use crate::{HandError, HandMetrics, Result, SerialTiming};
use hand_protocol::frame::{decode_read_response, Frame, ReadPayload};
use hand_transport::SerialLine;
use std::thread;
use tracing::{debug, info, warn};

/// Owns one serial line and runs one exchange at a time on it.
pub struct SerialRegisterClient<L: SerialLine> {
    line: Option<L>,
    timing: SerialTiming,
    debug: bool,
    metrics: Option<HandMetrics>,
}

impl<L: SerialLine> SerialRegisterClient<L> {
    pub fn new(timing: SerialTiming) -> Self {
        Self {
            line: None,
            timing,
            debug: false,
            metrics: None,
        }
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn set_metrics(&mut self, metrics: Option<HandMetrics>) {
        self.metrics = metrics;
    }

    /// Open `path` at `baudrate`, replacing any line already held.
    pub fn connect(&mut self, path: &str, baudrate: u32) -> Result<()> {
        self.disconnect()?;
        let line = L::open(path, baudrate)?;
        info!(port = path, baudrate, "serial line opened");
        self.line = Some(line);
        Ok(())
    }

    /// Adopt an already opened line.
    pub fn attach(&mut self, line: L) {
        self.line = Some(line);
    }

    /// Close the line. Calling this while disconnected is a no-op.
    pub fn disconnect(&mut self) -> Result<()> {
        if let Some(mut line) = self.line.take() {
            line.close()?;
            info!("serial line closed");
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.line.is_some()
    }

    /// Send a write frame, then discard the device's acknowledgement.
    pub fn write(&mut self, hand_id: u8, address: u16, payload: &[u8]) -> Result<()> {
        let frame = Frame::encode_write(hand_id, address, payload)?;
        let line = self.line.as_mut().ok_or(HandError::NotConnected)?;
        if self.debug {
            debug!(%frame, "tx write");
        }
        if let Err(e) = line.write_all(frame.as_bytes()) {
            count_error(&self.metrics);
            return Err(e.into());
        }
        if let Some(m) = &self.metrics {
            m.requests.inc();
        }
        let discarded = drain(line, &self.timing)?;
        if self.debug {
            debug!(discarded, "acknowledgement drained");
        }
        Ok(())
    }

    /// Send a read request for `count` bytes and decode whatever the device returned.
    ///
    /// A reply carrying fewer bytes than it declares is returned as-is; see
    /// [`ReadPayload::is_truncated`]. An empty line after the turnaround delay is a `ShortRead`.
    pub fn read(&mut self, hand_id: u8, address: u16, count: u8) -> Result<ReadPayload> {
        let frame = Frame::encode_read(hand_id, address, count);
        let line = self.line.as_mut().ok_or(HandError::NotConnected)?;
        if self.debug {
            debug!(%frame, "tx read");
        }
        // Stale bytes would be mistaken for this reply.
        let stale = line.bytes_to_read()?;
        if stale > 0 {
            let dropped = line.read_available()?.len();
            warn!(dropped, "discarding stale bytes before read");
        }
        if let Err(e) = line.write_all(frame.as_bytes()) {
            count_error(&self.metrics);
            return Err(e.into());
        }
        thread::sleep(self.timing.turnaround());
        let reply = line.read_available()?;
        if let Some(m) = &self.metrics {
            m.requests.inc();
            m.bytes_rx.inc_by(reply.len() as u64);
        }
        if self.debug {
            debug!(len = reply.len(), bytes = ?reply, "rx");
        }
        if reply.is_empty() {
            warn!(address, expected = count, "no reply to read request");
            if let Some(m) = &self.metrics {
                m.short_reads.inc();
            }
            return Err(HandError::ShortRead {
                expected: usize::from(count),
                actual: 0,
            });
        }
        Ok(decode_read_response(&reply)?)
    }
}

fn count_error(metrics: &Option<HandMetrics>) {
    if let Some(m) = metrics {
        m.transport_errors.inc();
    }
}

/// Poll the line until it is quiet or the poll budget runs out. Returns bytes discarded.
fn drain<L: SerialLine>(line: &mut L, timing: &SerialTiming) -> Result<usize> {
    let mut discarded = 0;
    for _ in 0..timing.drain_polls {
        if line.bytes_to_read()? == 0 {
            break;
        }
        discarded += line.read_available()?.len();
        thread::sleep(timing.drain_interval());
    }
    Ok(discarded)
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use hand_transport::MockLine;

    fn client(line: &MockLine) -> SerialRegisterClient<MockLine> {
        let mut c = SerialRegisterClient::new(SerialTiming::immediate());
        c.attach(line.clone());
        c
    }

    #[test]
    fn write_drains_acknowledgement() {
        let line = MockLine::new();
        line.push_reply(vec![0x90, 0xEB, 0x01, 0x04, 0x12, 0xCE, 0x05, 0x01, 0xEB]);
        let mut c = client(&line);
        c.write(1, 1486, &[0; 12]).unwrap();
        assert_eq!(line.pending_rx(), 0);
        assert_eq!(line.written().len(), 1);
    }

    #[test]
    fn read_returns_payload() {
        let line = MockLine::new();
        line.push_reply(vec![0x90, 0xEB, 0x01, 0x05, 0x11, 0xE8, 0x03, 0x2A, 0x00, 0x00]);
        let mut c = client(&line);
        let payload = c.read(1, 1000, 2).unwrap();
        assert_eq!(payload.data, vec![0x2A, 0x00]);
        assert_eq!(line.written()[0], Frame::encode_read(1, 1000, 2).into_bytes());
    }

    #[test]
    fn silent_device_is_a_short_read() {
        let line = MockLine::new();
        let mut c = client(&line);
        assert!(matches!(
            c.read(1, 1000, 1),
            Err(HandError::ShortRead { expected: 1, actual: 0 })
        ));
    }

    /// A line that never goes quiet.
    struct Chatter {
        polls: u32,
    }

    impl SerialLine for Chatter {
        fn open(_: &str, _: u32) -> hand_transport::Result<Self> {
            Ok(Self { polls: 0 })
        }

        fn write_all(&mut self, _: &[u8]) -> hand_transport::Result<()> {
            Ok(())
        }

        fn bytes_to_read(&mut self) -> hand_transport::Result<usize> {
            Ok(4)
        }

        fn read_available(&mut self) -> hand_transport::Result<Vec<u8>> {
            self.polls += 1;
            Ok(vec![0x55; 4])
        }
    }

    #[test]
    fn drain_stops_after_poll_budget() {
        let timing = SerialTiming {
            drain_polls: 5,
            ..SerialTiming::immediate()
        };
        let mut line = Chatter { polls: 0 };
        assert_eq!(drain(&mut line, &timing).unwrap(), 20);
        assert_eq!(line.polls, 5);

        let mut c = SerialRegisterClient::new(timing);
        c.attach(Chatter { polls: 0 });
        c.write(1, 1004, &[1]).unwrap();
        assert_eq!(c.line.as_ref().map(|l| l.polls), Some(5));
    }

    #[test]
    fn stale_bytes_are_discarded_before_read() {
        let line = MockLine::new();
        line.inject_rx(&[0x90, 0xEB, 0x01, 0x04, 0x12, 0xEC, 0x03, 0x01, 0x05]);
        line.push_reply(vec![0x90, 0xEB, 0x01, 0x04, 0x11, 0xE8, 0x03, 0x07, 0x00]);
        let mut c = client(&line);
        let payload = c.read(1, 1000, 1).unwrap();
        assert_eq!(payload.data, vec![0x07]);
        assert_eq!(line.pending_rx(), 0);
    }

    #[test]
    fn io_requires_connection() {
        let mut c = SerialRegisterClient::<MockLine>::new(SerialTiming::immediate());
        assert!(matches!(c.write(1, 1000, &[1]), Err(HandError::NotConnected)));
        assert!(matches!(c.read(1, 1000, 1), Err(HandError::NotConnected)));
        c.disconnect().unwrap();
        c.disconnect().unwrap();
    }
}
