//! hand-transport: blocking byte-stream and register-bus abstractions
//!
//! This crate knows nothing about the hand's register map or frame format. It exposes two
//! transport traits, one for the RS-485/RS-232 byte line and one for Modbus holding-register
//! access, with feature-gated backends. The default build enables the `mock` backends so that
//! controllers and their tests compile on any host without hardware.

mod types;
pub use types::PortInfo;

mod error;
pub use error::{Result, TransportError};

mod traits;
pub use traits::{RegisterBus, SerialLine};

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockLine, MockRegisterBus};

#[cfg(feature = "serial")]
mod serial;

#[cfg(feature = "serial")]
pub use serial::SerialPortLine;

#[cfg(feature = "modbus-tcp")]
mod modbus_tcp;

#[cfg(feature = "modbus-tcp")]
pub use modbus_tcp::ModbusTcpBus;
