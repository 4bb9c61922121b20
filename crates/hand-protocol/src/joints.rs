use crate::{ProtocolError, Result, JOINT_COUNT};

/// Pack six words low byte first, as the serial payload expects.
pub fn pack_joint_words(words: [u16; JOINT_COUNT]) -> [u8; JOINT_COUNT * 2] {
    let mut out = [0u8; JOINT_COUNT * 2];
    for (chunk, w) in out.chunks_exact_mut(2).zip(words) {
        chunk.copy_from_slice(&w.to_le_bytes());
    }
    out
}

/// Inverse of [`pack_joint_words`]. Extra trailing bytes are ignored.
pub fn unpack_joint_words(bytes: &[u8]) -> Result<[u16; JOINT_COUNT]> {
    if bytes.len() < JOINT_COUNT * 2 {
        return Err(ProtocolError::Short {
            expected: JOINT_COUNT * 2,
            actual: bytes.len(),
        });
    }
    let mut out = [0u16; JOINT_COUNT];
    for (w, pair) in out.iter_mut().zip(bytes.chunks_exact(2)) {
        *w = u16::from_le_bytes([pair[0], pair[1]]);
    }
    Ok(out)
}

/// Split registers holding two byte-wide values each into the byte sequence, low byte first.
pub fn split_register_bytes(registers: &[u16]) -> Vec<u8> {
    registers.iter().flat_map(|r| r.to_le_bytes()).collect()
}
