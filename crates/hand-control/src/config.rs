use anyhow::Context;
use hand_protocol::Generation;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[cfg(windows)]
pub const DEFAULT_SERIAL_PORT: &str = "COM3";
#[cfg(not(windows))]
pub const DEFAULT_SERIAL_PORT: &str = "/dev/ttyUSB0";
pub const DEFAULT_BAUDRATE: u32 = 115_200;
pub const DEFAULT_HAND_ID: u8 = 1;
pub const DEFAULT_MODBUS_HOST: &str = "192.168.11.210";
pub const DEFAULT_MODBUS_PORT: u16 = 6000;

/// Top-level controller configuration, usually loaded from YAML.
///
/// ```yaml
/// generation: 4
/// debug: false
/// transport:
///   kind: modbus
///   host: 192.168.11.210
///   port: 6000
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandConfig {
    pub generation: Generation,
    pub debug: bool,
    pub transport: TransportConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportConfig {
    Serial(SerialConfig),
    Modbus(ModbusConfig),
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::Serial(SerialConfig::default())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baudrate: u32,
    pub hand_id: u8,
    pub timing: SerialTiming,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_SERIAL_PORT.to_string(),
            baudrate: DEFAULT_BAUDRATE,
            hand_id: DEFAULT_HAND_ID,
            timing: SerialTiming::default(),
        }
    }
}

/// Delays around a serial exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialTiming {
    /// Wait between sending a read request and collecting the reply.
    pub turnaround_ms: u64,
    /// Pause between polls while draining the write acknowledgement.
    pub drain_interval_ms: u64,
    /// Upper bound on drain polls after a write.
    pub drain_polls: u32,
}

impl SerialTiming {
    /// No sleeping at all; for scripted lines.
    pub const fn immediate() -> Self {
        Self {
            turnaround_ms: 0,
            drain_interval_ms: 0,
            drain_polls: 20,
        }
    }

    pub fn turnaround(&self) -> Duration {
        Duration::from_millis(self.turnaround_ms)
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }
}

impl Default for SerialTiming {
    fn default() -> Self {
        Self {
            turnaround_ms: 10,
            drain_interval_ms: 10,
            drain_polls: 20,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModbusConfig {
    pub host: String,
    pub port: u16,
    pub unit_id: u8,
    pub timeout_ms: u64,
}

impl ModbusConfig {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MODBUS_HOST.to_string(),
            port: DEFAULT_MODBUS_PORT,
            unit_id: 1,
            timeout_ms: 1000,
        }
    }
}

pub fn parse_hand_config(raw: &str) -> anyhow::Result<HandConfig> {
    serde_yaml::from_str(raw).context("decoding hand config")
}

pub fn load_hand_config(path: impl AsRef<Path>) -> anyhow::Result<HandConfig> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading hand config: {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("parsing yaml: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = parse_hand_config("{}").unwrap();
        assert_eq!(cfg.generation, Generation::Gen3);
        assert!(!cfg.debug);
        match cfg.transport {
            TransportConfig::Serial(s) => {
                assert_eq!(s.baudrate, 115_200);
                assert_eq!(s.hand_id, 1);
                assert_eq!(s.timing.drain_polls, 20);
            }
            other => panic!("unexpected transport {other:?}"),
        }
    }

    #[test]
    fn modbus_section_with_partial_fields() {
        let cfg = parse_hand_config(
            "generation: 4\ntransport:\n  kind: modbus\n  host: 10.0.0.5\n",
        )
        .unwrap();
        assert_eq!(cfg.generation, Generation::Gen4);
        let TransportConfig::Modbus(m) = cfg.transport else {
            panic!("expected modbus transport");
        };
        assert_eq!(m.endpoint(), "10.0.0.5:6000");
        assert_eq!(m.timeout(), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn unknown_generation_is_rejected() {
        assert!(parse_hand_config("generation: 5").is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = load_hand_config("/nonexistent/hand.yaml").unwrap_err();
        assert!(err.to_string().contains("reading hand config"));
    }
}
