use crate::{PortInfo, Result, TransportError};
use std::time::Duration;

/// A minimal blocking byte line (RS-485 / RS-232 adapter).
pub trait SerialLine {
    /// Open a serial device by path (e.g., "/dev/ttyUSB0", "COM3").
    fn open(path: &str, baudrate: u32) -> Result<Self>
    where
        Self: Sized;

    /// Attempt to list available ports for this backend.
    fn list() -> Result<Vec<PortInfo>> {
        Err(TransportError::Unsupported("port listing not supported"))
    }

    /// Write every byte of `bytes` to the line.
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Number of received bytes waiting in the input buffer.
    fn bytes_to_read(&mut self) -> Result<usize>;

    /// Read whatever is currently buffered without waiting for more.
    fn read_available(&mut self) -> Result<Vec<u8>>;

    /// Release the underlying device. Must be safe to call more than once.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Blocking holding-register access (Modbus function 3 / function 16).
pub trait RegisterBus {
    /// Open a session to `endpoint` ("ip:port") addressing `unit_id`.
    fn connect(endpoint: &str, unit_id: u8, timeout: Option<Duration>) -> Result<Self>
    where
        Self: Sized;

    /// Read `count` holding registers starting at `address`.
    fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>>;

    /// Write `values` to consecutive holding registers starting at `address`.
    fn write_multiple_registers(&mut self, address: u16, values: &[u16]) -> Result<()>;

    /// Whether the session is still usable. Backends clear this on transport failure.
    fn is_open(&self) -> bool;

    /// Close the session. Must be safe to call more than once.
    fn close(&mut self) -> Result<()>;
}
