use crate::{PortInfo, Result, SerialLine, TransportError};
use serialport::{SerialPort, SerialPortType};
use std::io::{self, Read, Write};
use std::time::Duration;

/// Read timeout for a single `read_available` call. The line is polled, never waited on.
const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// A hand attached through a USB-RS485 / RS232 adapter.
pub struct SerialPortLine {
    path: String,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialPortLine {
    pub fn path(&self) -> &str {
        &self.path
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or(TransportError::Closed)
    }
}

fn map_serial_err(path: &str, e: serialport::Error) -> TransportError {
    match e.kind {
        serialport::ErrorKind::NoDevice => TransportError::PortNotFound(path.to_string()),
        _ => TransportError::Io(e.to_string()),
    }
}

impl SerialLine for SerialPortLine {
    fn open(path: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(path, baudrate)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| map_serial_err(path, e))?;
        tracing::debug!(path, baudrate, "serial line opened");
        Ok(SerialPortLine {
            path: path.to_string(),
            port: Some(port),
        })
    }

    fn list() -> Result<Vec<PortInfo>> {
        let mut out = Vec::new();
        for p in serialport::available_ports().map_err(|e| TransportError::Io(e.to_string()))? {
            let driver = match p.port_type {
                SerialPortType::UsbPort(_) => "usb-serial",
                _ => "serial",
            };
            out.push(PortInfo {
                name: p.port_name,
                driver: driver.to_string(),
            });
        }
        Ok(out)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let port = self.port()?;
        port.write_all(bytes)
            .map_err(|e| TransportError::Io(e.to_string()))?;
        port.flush().map_err(|e| TransportError::Io(e.to_string()))
    }

    fn bytes_to_read(&mut self) -> Result<usize> {
        let n = self
            .port()?
            .bytes_to_read()
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(n as usize)
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        let waiting = self.bytes_to_read()?;
        if waiting == 0 {
            return Ok(Vec::new());
        }
        let port = self.port()?;
        let mut buf = vec![0u8; waiting];
        let mut filled = 0;
        while filled < waiting {
            match port.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::Io(e.to_string())),
            }
        }
        buf.truncate(filled);
        Ok(buf)
    }

    fn close(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            tracing::debug!(path = %self.path, "serial line closed");
        }
        Ok(())
    }
}
