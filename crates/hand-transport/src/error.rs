use thiserror::Error;

pub type Result<T, E = TransportError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("port not found: {0}")]
    PortNotFound(String),
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("operation not supported on this backend: {0}")]
    Unsupported(&'static str),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("timeout")]
    Timeout,
    #[error("connection closed")]
    Closed,
    #[error("modbus exception 0x{code:02X} at address {address}")]
    Exception { address: u16, code: u8 },
}
