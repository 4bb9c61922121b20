use hand_protocol::{Generation, ProtocolError, RegisterName};
use hand_transport::TransportError;
use thiserror::Error;

pub type Result<T, E = HandError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum HandError {
    #[error("register {name} is not defined for {generation}")]
    UnknownRegister {
        name: RegisterName,
        generation: Generation,
    },
    #[error("not connected")]
    NotConnected,
    #[error("transport error: {0}")]
    Transport(TransportError),
    #[error("short read: expected {expected}, got {actual}")]
    ShortRead { expected: usize, actual: usize },
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("unsupported capability: {0}")]
    UnsupportedCapability(&'static str),
    #[error("frame error: {0}")]
    Frame(ProtocolError),
    #[error("device exception 0x{code:02X} at address {address}")]
    Exception { address: u16, code: u8 },
}

impl HandError {
    /// Errors a caller may reasonably retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            HandError::Transport(_) | HandError::ShortRead { .. } | HandError::Exception { .. }
        )
    }
}

impl From<ProtocolError> for HandError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::UnknownRegister { name, generation } => {
                HandError::UnknownRegister { name, generation }
            }
            ProtocolError::Short { expected, actual }
            | ProtocolError::BlockLength { expected, actual } => {
                HandError::ShortRead { expected, actual }
            }
            ProtocolError::JointCount { .. } | ProtocolError::JointValue { .. } => {
                HandError::Validation(e.to_string())
            }
            other => HandError::Frame(other),
        }
    }
}

impl From<TransportError> for HandError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Exception { address, code } => HandError::Exception { address, code },
            other => HandError::Transport(other),
        }
    }
}
