use crate::{HandError, HandMetrics, Result};
use hand_protocol::registers::REGISTER_ADDRESS_STRIDE;
use hand_protocol::tactile::BlockReader;
use hand_transport::RegisterBus;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Largest holding-register read a device answers in one request.
pub const MAX_REGISTERS_PER_READ: usize = 125;

/// Holding-register access over one reusable Modbus session.
pub struct ModbusRegisterClient<B: RegisterBus> {
    bus: Option<B>,
    debug: bool,
    metrics: Option<HandMetrics>,
}

impl<B: RegisterBus> Default for ModbusRegisterClient<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: RegisterBus> ModbusRegisterClient<B> {
    pub fn new() -> Self {
        Self {
            bus: None,
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

    pub fn connect(&mut self, endpoint: &str, unit_id: u8, timeout: Option<Duration>) -> Result<()> {
        self.disconnect()?;
        let bus = B::connect(endpoint, unit_id, timeout)?;
        info!(endpoint, unit_id, "modbus session opened");
        self.bus = Some(bus);
        Ok(())
    }

    pub fn attach(&mut self, bus: B) {
        self.bus = Some(bus);
    }

    /// Close the session. Calling this while disconnected is a no-op.
    pub fn disconnect(&mut self) -> Result<()> {
        if let Some(mut bus) = self.bus.take() {
            bus.close()?;
            info!("modbus session closed");
        }
        Ok(())
    }

    /// True only while the underlying session is usable.
    pub fn is_connected(&self) -> bool {
        self.bus.as_ref().is_some_and(|b| b.is_open())
    }

    fn bus(&mut self) -> Result<&mut B> {
        match self.bus.as_mut() {
            Some(bus) if bus.is_open() => Ok(bus),
            _ => Err(HandError::NotConnected),
        }
    }

    /// Read up to [`MAX_REGISTERS_PER_READ`] registers in one request.
    ///
    /// The device may answer with fewer registers than asked for; callers check the length.
    pub fn read(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        if count == 0 || usize::from(count) > MAX_REGISTERS_PER_READ {
            return Err(HandError::Validation(format!(
                "register count {count} outside 1..={MAX_REGISTERS_PER_READ}"
            )));
        }
        let debug = self.debug;
        let result = self.bus()?.read_holding_registers(address, count);
        if let Some(m) = &self.metrics {
            m.requests.inc();
        }
        match result {
            Ok(values) => {
                if debug {
                    debug!(address, count, values = ?values, "read holding registers");
                }
                Ok(values)
            }
            Err(e) => {
                error!(address, count, error = %e, "modbus read failed");
                if let Some(m) = &self.metrics {
                    m.transport_errors.inc();
                }
                Err(e.into())
            }
        }
    }

    pub fn write(&mut self, address: u16, values: &[u16]) -> Result<()> {
        let debug = self.debug;
        let result = self.bus()?.write_multiple_registers(address, values);
        if let Some(m) = &self.metrics {
            m.requests.inc();
        }
        match result {
            Ok(()) => {
                if debug {
                    debug!(address, values = ?values, "wrote registers");
                }
                Ok(())
            }
            Err(e) => {
                error!(address, error = %e, "modbus write failed");
                if let Some(m) = &self.metrics {
                    m.transport_errors.inc();
                }
                Err(e.into())
            }
        }
    }

    /// Read `count` registers, split into requests the device accepts.
    ///
    /// Each request starts `REGISTER_ADDRESS_STRIDE` address units per register after the
    /// previous one. Stops early if the device answers a request short; registers beyond the
    /// requested count are dropped.
    pub fn read_block(&mut self, address: u16, count: usize) -> Result<Vec<u16>> {
        let mut out = Vec::with_capacity(count);
        let mut next = address;
        while out.len() < count {
            let want = (count - out.len()).min(MAX_REGISTERS_PER_READ);
            let mut chunk = self.read(next, want as u16)?;
            if chunk.len() > want {
                warn!(address = next, requested = want, returned = chunk.len(), "dropping surplus registers");
                chunk.truncate(want);
            }
            let got = chunk.len();
            out.extend(chunk);
            if got < want {
                break;
            }
            if out.len() < count {
                let step = u16::try_from(want)
                    .ok()
                    .and_then(|w| w.checked_mul(REGISTER_ADDRESS_STRIDE))
                    .and_then(|s| next.checked_add(s))
                    .ok_or_else(|| {
                        HandError::Validation(format!("block at {address} runs past the address space"))
                    })?;
                next = step;
            }
        }
        Ok(out)
    }
}

impl<B: RegisterBus> BlockReader for ModbusRegisterClient<B> {
    type Error = HandError;

    fn read_block(&mut self, address: u16, count: usize) -> Result<Vec<u16>> {
        ModbusRegisterClient::read_block(self, address, count)
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use hand_transport::MockRegisterBus;

    fn client(bus: &MockRegisterBus) -> ModbusRegisterClient<MockRegisterBus> {
        let mut c = ModbusRegisterClient::new();
        c.attach(bus.clone());
        c
    }

    #[test]
    fn large_blocks_are_chunked() {
        let bus = MockRegisterBus::new();
        let mut c = client(&bus);
        let values = c.read_block(4000, 200).unwrap();
        assert_eq!(values.len(), 200);
        assert_eq!(bus.reads(), vec![(4000, 125), (4250, 75)]);
    }

    #[test]
    fn short_chunk_stops_the_block() {
        let bus = MockRegisterBus::new();
        bus.truncate_reads_at(4000, 100);
        let mut c = client(&bus);
        assert_eq!(c.read_block(4000, 200).unwrap().len(), 100);
        assert_eq!(bus.reads().len(), 1);
    }

    #[test]
    fn exception_surfaces_as_error() {
        let bus = MockRegisterBus::new();
        bus.fail_reads_at(1546, 0x02);
        let mut c = client(&bus);
        assert!(matches!(
            c.read(1546, 6),
            Err(HandError::Exception { address: 1546, code: 0x02 })
        ));
        assert!(c.is_connected());
    }

    #[test]
    fn connection_state_follows_the_session() {
        let bus = MockRegisterBus::new();
        let mut c = client(&bus);
        assert!(c.is_connected());
        bus.drop_connection();
        assert!(!c.is_connected());
        assert!(matches!(c.read(1000, 1), Err(HandError::NotConnected)));
        c.disconnect().unwrap();
        c.disconnect().unwrap();
    }

    /// Answers every read with two registers more than requested.
    struct Overlong;

    impl RegisterBus for Overlong {
        fn connect(_: &str, _: u8, _: Option<Duration>) -> hand_transport::Result<Self> {
            Ok(Self)
        }

        fn read_holding_registers(&mut self, address: u16, count: u16) -> hand_transport::Result<Vec<u16>> {
            Ok((0..count + 2).map(|i| address + i).collect())
        }

        fn write_multiple_registers(&mut self, _: u16, _: &[u16]) -> hand_transport::Result<()> {
            Ok(())
        }

        fn is_open(&self) -> bool {
            true
        }

        fn close(&mut self) -> hand_transport::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn surplus_registers_are_dropped() {
        let mut c = ModbusRegisterClient::new();
        c.attach(Overlong);
        assert_eq!(c.read_block(3000, 9).unwrap(), (3000..3009).collect::<Vec<u16>>());
        let values = c.read_block(4000, 200).unwrap();
        assert_eq!(values.len(), 200);
        assert_eq!(values[125], 4250);
    }

    #[test]
    fn oversized_single_read_rejected_before_io() {
        let bus = MockRegisterBus::new();
        let mut c = client(&bus);
        assert!(matches!(c.read(1000, 126), Err(HandError::Validation(_))));
        assert!(bus.reads().is_empty());
    }
}
