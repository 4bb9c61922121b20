//! hand-protocol: wire-level description of the hand
//!
//! Pure translation between typed requests and device bytes/registers. Nothing here performs
//! I/O: the serial frame codec produces and parses byte buffers, the register map resolves
//! symbolic names per hardware generation, and the tactile decoder reshapes flat register
//! blocks handed to it by whichever client did the reading.

mod error;
pub use error::{ProtocolError, Result};

mod types;
pub use types::{
    Generation, Joint, JointFeedback, JointVector, JOINT_COUNT, JOINT_MAX, JOINT_MIN,
    JOINT_UNCHANGED,
};

pub mod registers;
pub use registers::{
    RegisterCategory, RegisterEntry, RegisterInfo, RegisterLayout, RegisterMap, RegisterName,
    TactileShape,
};

pub mod frame;
pub use frame::{Command, Frame, ReadPayload};

mod joints;
pub use joints::{pack_joint_words, split_register_bytes, unpack_joint_words};

pub mod tactile;
pub use tactile::{
    BlockReader, FillOrder, TactileFrame, TactileFrameDecoder, TactileMatrix, TactileSite,
};
