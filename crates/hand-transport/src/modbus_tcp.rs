use crate::{RegisterBus, Result, TransportError};
use std::net::SocketAddr;
use std::time::Duration;
use tokio_modbus::client::sync::{self, Context, Reader, Writer};
use tokio_modbus::prelude::Slave;

/// Modbus-TCP session backed by `tokio-modbus`' synchronous client.
///
/// The session is dropped on the first transport-level failure, so `is_open` reports what the
/// socket can actually do rather than whether `connect` was once called.
pub struct ModbusTcpBus {
    endpoint: SocketAddr,
    ctx: Option<Context>,
}

impl ModbusTcpBus {
    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    fn ctx(&mut self) -> Result<&mut Context> {
        self.ctx.as_mut().ok_or(TransportError::Closed)
    }

    fn transport_failed(&mut self, e: tokio_modbus::Error) -> TransportError {
        tracing::warn!(endpoint = %self.endpoint, error = %e, "modbus session lost");
        self.ctx = None;
        TransportError::Io(e.to_string())
    }
}

impl RegisterBus for ModbusTcpBus {
    fn connect(endpoint: &str, unit_id: u8, timeout: Option<Duration>) -> Result<Self> {
        let addr: SocketAddr = endpoint
            .parse()
            .map_err(|_| TransportError::InvalidEndpoint(endpoint.to_string()))?;
        let ctx = sync::tcp::connect_slave_with_timeout(addr, Slave(unit_id), timeout)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::TimedOut => TransportError::Timeout,
                _ => TransportError::Io(e.to_string()),
            })?;
        tracing::debug!(%addr, unit_id, "modbus session opened");
        Ok(Self {
            endpoint: addr,
            ctx: Some(ctx),
        })
    }

    fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        let res = self.ctx()?.read_holding_registers(address, count);
        match res {
            Ok(Ok(regs)) => Ok(regs),
            Ok(Err(code)) => Err(TransportError::Exception {
                address,
                code: u8::from(code),
            }),
            Err(e) => Err(self.transport_failed(e)),
        }
    }

    fn write_multiple_registers(&mut self, address: u16, values: &[u16]) -> Result<()> {
        let res = self.ctx()?.write_multiple_registers(address, values);
        match res {
            Ok(Ok(())) => Ok(()),
            Ok(Err(code)) => Err(TransportError::Exception {
                address,
                code: u8::from(code),
            }),
            Err(e) => Err(self.transport_failed(e)),
        }
    }

    fn is_open(&self) -> bool {
        self.ctx.is_some()
    }

    fn close(&mut self) -> Result<()> {
        if self.ctx.take().is_some() {
            tracing::debug!(endpoint = %self.endpoint, "modbus session closed");
        }
        Ok(())
    }
}
