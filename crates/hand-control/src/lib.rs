//! hand-control: typed controllers for dexterous robotic hands
//!
//! A [`HandController`] offers the same operations over both transports: [`SerialHand`]
//! speaks the `EB 90` framed protocol on an RS-485/RS-232 line, [`ModbusHand`] uses holding
//! registers over Modbus-TCP and is the only one that can read the Gen4 tactile pads.
//! Each controller owns its transport, its hardware generation and its debug flag; nothing
//! here is process-global.

mod error;
pub use error::{HandError, Result};

mod config;
pub use config::{
    load_hand_config, parse_hand_config, HandConfig, ModbusConfig, SerialConfig, SerialTiming,
    TransportConfig, DEFAULT_BAUDRATE, DEFAULT_HAND_ID, DEFAULT_MODBUS_HOST, DEFAULT_MODBUS_PORT,
    DEFAULT_SERIAL_PORT,
};

mod metrics;
pub use metrics::{HandMetrics, MetricsHub};

mod serial_client;
pub use serial_client::SerialRegisterClient;

mod modbus_client;
pub use modbus_client::{ModbusRegisterClient, MAX_REGISTERS_PER_READ};

mod controller;
pub use controller::{HandController, PROBE_REGISTERS};

mod serial_hand;
pub use serial_hand::SerialHand;

mod modbus_hand;
pub use modbus_hand::ModbusHand;

pub use hand_protocol as protocol;
pub use hand_transport as transport;
