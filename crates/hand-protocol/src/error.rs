use crate::{Generation, RegisterName};
use thiserror::Error;

pub type Result<T, E = ProtocolError> = core::result::Result<T, E>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("register {name} is not defined for {generation}")]
    UnknownRegister {
        name: RegisterName,
        generation: Generation,
    },
    #[error("unsupported hardware generation: {0}")]
    UnknownGeneration(u8),
    #[error("frame too short: {0} bytes")]
    FrameTooShort(usize),
    #[error("payload too long for one frame: {0} bytes")]
    PayloadTooLong(usize),
    #[error("expected {expected} values, got {actual}")]
    Short { expected: usize, actual: usize },
    #[error("block length mismatch: expected {expected} values, got {actual}")]
    BlockLength { expected: usize, actual: usize },
    #[error("expected {expected} joint values, got {actual}")]
    JointCount { expected: usize, actual: usize },
    #[error("joint {joint} value {value} outside protocol range")]
    JointValue { joint: crate::Joint, value: i32 },
}
