use crate::{PortInfo, RegisterBus, Result, SerialLine, TransportError};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Per-call register limit enforced by the mock bus, same as a real Modbus device.
const MOCK_MAX_READ: u16 = 125;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct LineState {
    written: Vec<Vec<u8>>,
    replies: VecDeque<Vec<u8>>,
    rx: VecDeque<u8>,
    closed: bool,
}

/// A scripted in-process serial line.
///
/// Every `write_all` records the bytes and moves the next queued reply (if any) into the
/// receive buffer, which is how the device answers each request frame. Clones share state,
/// so a test can keep one handle while the controller owns another.
#[derive(Clone, Debug, Default)]
pub struct MockLine {
    state: Arc<Mutex<LineState>>,
}

impl MockLine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the bytes the "device" sends back after the next write.
    pub fn push_reply(&self, bytes: impl Into<Vec<u8>>) {
        lock(&self.state).replies.push_back(bytes.into());
    }

    /// Put bytes directly on the receive side, as if they were left over on the wire.
    pub fn inject_rx(&self, bytes: &[u8]) {
        lock(&self.state).rx.extend(bytes.iter().copied());
    }

    /// Every buffer passed to `write_all`, in order.
    pub fn written(&self) -> Vec<Vec<u8>> {
        lock(&self.state).written.clone()
    }

    /// Bytes received but not yet read.
    pub fn pending_rx(&self) -> usize {
        lock(&self.state).rx.len()
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }
}

impl SerialLine for MockLine {
    fn open(_path: &str, _baudrate: u32) -> Result<Self> {
        Ok(Self::new())
    }

    fn list() -> Result<Vec<PortInfo>> {
        Ok(vec![PortInfo {
            name: "mock0".to_string(),
            driver: "mock".to_string(),
        }])
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let mut st = lock(&self.state);
        if st.closed {
            return Err(TransportError::Closed);
        }
        st.written.push(bytes.to_vec());
        if let Some(reply) = st.replies.pop_front() {
            st.rx.extend(reply);
        }
        Ok(())
    }

    fn bytes_to_read(&mut self) -> Result<usize> {
        let st = lock(&self.state);
        if st.closed {
            return Err(TransportError::Closed);
        }
        Ok(st.rx.len())
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        let mut st = lock(&self.state);
        if st.closed {
            return Err(TransportError::Closed);
        }
        Ok(st.rx.drain(..).collect())
    }

    fn close(&mut self) -> Result<()> {
        lock(&self.state).closed = true;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct BusState {
    memory: BTreeMap<u16, u16>,
    exceptions: HashMap<u16, u8>,
    truncate: HashMap<u16, usize>,
    reads: Vec<(u16, u16)>,
    writes: Vec<(u16, Vec<u16>)>,
    open: bool,
}

/// An in-process holding-register table standing in for a Modbus-TCP device.
///
/// Registers are stored at consecutive addresses; unset registers read as zero. Faults can be
/// injected per start address: an exception code, or a response cut short to `n` registers.
#[derive(Clone, Debug)]
pub struct MockRegisterBus {
    state: Arc<Mutex<BusState>>,
}

impl Default for MockRegisterBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRegisterBus {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                open: true,
                ..BusState::default()
            })),
        }
    }

    /// Store `values` at `address`, `address + 1`, ...
    pub fn seed(&self, address: u16, values: &[u16]) {
        let mut st = lock(&self.state);
        for (i, v) in values.iter().enumerate() {
            st.memory.insert(address.wrapping_add(i as u16), *v);
        }
    }

    pub fn register(&self, address: u16) -> u16 {
        lock(&self.state).memory.get(&address).copied().unwrap_or(0)
    }

    /// Answer reads starting at `address` with a Modbus exception.
    pub fn fail_reads_at(&self, address: u16, code: u8) {
        lock(&self.state).exceptions.insert(address, code);
    }

    /// Answer reads starting at `address` with at most `len` registers.
    pub fn truncate_reads_at(&self, address: u16, len: usize) {
        lock(&self.state).truncate.insert(address, len);
    }

    /// Simulate the peer dropping the connection.
    pub fn drop_connection(&self) {
        lock(&self.state).open = false;
    }

    /// `(address, count)` of every read request, in order.
    pub fn reads(&self) -> Vec<(u16, u16)> {
        lock(&self.state).reads.clone()
    }

    /// `(address, values)` of every write request, in order.
    pub fn writes(&self) -> Vec<(u16, Vec<u16>)> {
        lock(&self.state).writes.clone()
    }
}

impl RegisterBus for MockRegisterBus {
    fn connect(_endpoint: &str, _unit_id: u8, _timeout: Option<Duration>) -> Result<Self> {
        Ok(Self::new())
    }

    fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        let mut st = lock(&self.state);
        if !st.open {
            return Err(TransportError::Closed);
        }
        st.reads.push((address, count));
        if let Some(code) = st.exceptions.get(&address) {
            return Err(TransportError::Exception {
                address,
                code: *code,
            });
        }
        if count == 0 || count > MOCK_MAX_READ {
            // Illegal data value
            return Err(TransportError::Exception { address, code: 0x03 });
        }
        let mut out: Vec<u16> = (0..count)
            .map(|i| {
                st.memory
                    .get(&address.wrapping_add(i))
                    .copied()
                    .unwrap_or(0)
            })
            .collect();
        if let Some(len) = st.truncate.get(&address) {
            out.truncate(*len);
        }
        Ok(out)
    }

    fn write_multiple_registers(&mut self, address: u16, values: &[u16]) -> Result<()> {
        let mut st = lock(&self.state);
        if !st.open {
            return Err(TransportError::Closed);
        }
        st.writes.push((address, values.to_vec()));
        for (i, v) in values.iter().enumerate() {
            st.memory.insert(address.wrapping_add(i as u16), *v);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    fn close(&mut self) -> Result<()> {
        lock(&self.state).open = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_is_released_by_the_next_write() {
        let mut line = MockLine::new();
        let probe = line.clone();
        probe.push_reply(vec![0x90, 0xEB, 0x01]);

        assert_eq!(line.bytes_to_read().unwrap(), 0);
        line.write_all(&[0xEB, 0x90]).unwrap();
        assert_eq!(line.bytes_to_read().unwrap(), 3);
        assert_eq!(line.read_available().unwrap(), vec![0x90, 0xEB, 0x01]);
        assert_eq!(probe.written(), vec![vec![0xEB, 0x90]]);
    }

    #[test]
    fn closed_line_rejects_io() {
        let mut line = MockLine::new();
        line.close().unwrap();
        line.close().unwrap();
        assert!(matches!(
            line.write_all(&[1]),
            Err(TransportError::Closed)
        ));
    }

    #[test]
    fn bus_round_trips_and_injects_faults() {
        let mut bus = MockRegisterBus::new();
        bus.write_multiple_registers(10, &[1, 2, 3]).unwrap();
        assert_eq!(bus.read_holding_registers(10, 3).unwrap(), vec![1, 2, 3]);

        bus.truncate_reads_at(10, 1);
        assert_eq!(bus.read_holding_registers(10, 3).unwrap(), vec![1]);

        bus.fail_reads_at(20, 0x02);
        assert!(matches!(
            bus.read_holding_registers(20, 1),
            Err(TransportError::Exception { address: 20, code: 0x02 })
        ));

        assert!(bus.read_holding_registers(0, 126).is_err());

        bus.drop_connection();
        assert!(!bus.is_open());
    }
}
