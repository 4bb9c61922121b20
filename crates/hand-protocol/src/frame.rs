//! Serial frame codec.
//!
//! Wire layout: `EB 90 <id> <len> <cmd> <addrLo> <addrHi> [payload..] <checksum>`, where
//! `checksum` is the low byte of the sum of every byte after the two-byte header.

use crate::{ProtocolError, Result};
use core::fmt;

pub const HEADER: [u8; 2] = [0xEB, 0x90];
/// Header, id, len, cmd and the two address bytes.
pub const PREFIX_LEN: usize = 7;
/// Smallest buffer that can carry a response header.
pub const MIN_RESPONSE_LEN: usize = 7;
/// `len` counts cmd and both address bytes on top of the payload.
const LEN_OVERHEAD: usize = 3;
const MAX_PAYLOAD: usize = u8::MAX as usize - LEN_OVERHEAD;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Command {
    Read = 0x11,
    Write = 0x12,
}

impl Command {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// One complete request frame, checksum included.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Frame {
    bytes: Vec<u8>,
}

impl Frame {
    pub fn encode_write(hand_id: u8, address: u16, values: &[u8]) -> Result<Self> {
        if values.len() > MAX_PAYLOAD {
            return Err(ProtocolError::PayloadTooLong(values.len()));
        }
        Ok(Self::build(
            hand_id,
            (values.len() + LEN_OVERHEAD) as u8,
            Command::Write,
            address,
            values,
        ))
    }

    /// Read request for `count` bytes starting at `address`.
    pub fn encode_read(hand_id: u8, address: u16, count: u8) -> Self {
        Self::build(hand_id, 0x04, Command::Read, address, &[count])
    }

    fn build(hand_id: u8, len: u8, cmd: Command, address: u16, payload: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(PREFIX_LEN + payload.len() + 1);
        bytes.extend_from_slice(&HEADER);
        bytes.push(hand_id);
        bytes.push(len);
        bytes.push(cmd.code());
        bytes.extend_from_slice(&address.to_le_bytes());
        bytes.extend_from_slice(payload);
        bytes.push(checksum(&bytes[HEADER.len()..]));
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn hand_id(&self) -> u8 {
        self.bytes[2]
    }

    pub fn command(&self) -> Command {
        if self.bytes[4] == Command::Read.code() {
            Command::Read
        } else {
            Command::Write
        }
    }

    pub fn address(&self) -> u16 {
        u16::from_le_bytes([self.bytes[5], self.bytes[6]])
    }

    pub fn checksum(&self) -> u8 {
        self.bytes[self.bytes.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.bytes.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

/// Low byte of the byte sum.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Payload extracted from a read response.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReadPayload {
    pub data: Vec<u8>,
    /// Payload length the device announced in its `len` byte.
    pub declared_len: usize,
}

impl ReadPayload {
    /// The device announced more bytes than arrived.
    pub fn is_truncated(&self) -> bool {
        self.data.len() < self.declared_len
    }
}

/// Extract the payload of a read response.
///
/// The header bytes are not checked (devices have been seen answering `90 EB`), nor is the
/// trailing checksum. Buffers shorter than [`MIN_RESPONSE_LEN`] are a hard error; a buffer
/// holding fewer payload bytes than declared yields what is present and logs a warning.
pub fn decode_read_response(bytes: &[u8]) -> Result<ReadPayload> {
    if bytes.len() < MIN_RESPONSE_LEN {
        return Err(ProtocolError::FrameTooShort(bytes.len()));
    }
    let declared_len = usize::from(bytes[3]).saturating_sub(LEN_OVERHEAD);
    let available = bytes.len() - PREFIX_LEN;
    let take = declared_len.min(available);
    if take < declared_len {
        tracing::warn!(
            declared = declared_len,
            available,
            "read response shorter than declared; returning partial payload"
        );
    }
    Ok(ReadPayload {
        data: bytes[PREFIX_LEN..PREFIX_LEN + take].to_vec(),
        declared_len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn angle_write_frame_is_bit_exact() {
        let payload = crate::pack_joint_words([1000; 6]);
        let frame = Frame::encode_write(1, 1486, &payload).unwrap();
        let mut expected = vec![0xEB, 0x90, 0x01, 0x0F, 0x12, 0xCE, 0x05];
        for _ in 0..6 {
            expected.extend_from_slice(&[0xE8, 0x03]);
        }
        let sum: u32 = expected[2..].iter().map(|b| u32::from(*b)).sum();
        expected.push((sum & 0xFF) as u8);
        assert_eq!(frame.as_bytes(), expected.as_slice());
        assert_eq!(frame.address(), 1486);
        assert_eq!(frame.command(), Command::Write);
    }

    #[test]
    fn read_frame_layout() {
        let frame = Frame::encode_read(2, 1546, 12);
        assert_eq!(
            &frame.as_bytes()[..8],
            &[0xEB, 0x90, 0x02, 0x04, 0x11, 0x0A, 0x06, 0x0C]
        );
        assert_eq!(frame.len(), 9);
        assert_eq!(frame.hand_id(), 2);
        assert_eq!(frame.to_string(), "EB 90 02 04 11 0A 06 0C 33");
    }

    #[test]
    fn oversized_payload_rejected() {
        assert_eq!(
            Frame::encode_write(1, 1000, &[0u8; 253]),
            Err(ProtocolError::PayloadTooLong(253))
        );
        assert!(Frame::encode_write(1, 1000, &[0u8; 252]).is_ok());
    }

    #[test]
    fn decode_full_and_truncated_responses() {
        let full = [0x90, 0xEB, 0x01, 0x09, 0x11, 0x0A, 0x06, 1, 2, 3, 4, 5, 6, 0x00];
        let payload = decode_read_response(&full).unwrap();
        assert_eq!(payload.data, vec![1, 2, 3, 4, 5, 6]);
        assert!(!payload.is_truncated());

        let cut = &full[..10];
        let payload = decode_read_response(cut).unwrap();
        assert_eq!(payload.data, vec![1, 2, 3]);
        assert_eq!(payload.declared_len, 6);
        assert!(payload.is_truncated());
    }

    #[test]
    fn decode_rejects_headerless_buffers() {
        assert_eq!(
            decode_read_response(&[0xEB, 0x90, 0x01]),
            Err(ProtocolError::FrameTooShort(3))
        );
        assert!(decode_read_response(&[]).is_err());
    }

    proptest! {
        #[test]
        fn write_frames_carry_valid_checksum(
            id in any::<u8>(),
            addr in any::<u16>(),
            payload in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let frame = Frame::encode_write(id, addr, &payload).unwrap();
            let bytes = frame.as_bytes();
            let sum: u32 = bytes[2..bytes.len() - 1].iter().map(|b| u32::from(*b)).sum();
            prop_assert_eq!(u32::from(frame.checksum()), sum & 0xFF);
            prop_assert_eq!(usize::from(bytes[3]), payload.len() + 3);
        }

        #[test]
        fn read_frames_carry_valid_checksum(id in any::<u8>(), addr in any::<u16>(), count in any::<u8>()) {
            let frame = Frame::encode_read(id, addr, count);
            let bytes = frame.as_bytes();
            let sum: u32 = bytes[2..bytes.len() - 1].iter().map(|b| u32::from(*b)).sum();
            prop_assert_eq!(u32::from(frame.checksum()), sum & 0xFF);
        }
    }
}
