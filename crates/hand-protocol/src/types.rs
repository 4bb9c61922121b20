use crate::{ProtocolError, Result};
use core::fmt;
use serde::{Deserialize, Serialize};

/// Number of actuated joints on the hand.
pub const JOINT_COUNT: usize = 6;
/// Lowest commandable angle/position/speed/force value.
pub const JOINT_MIN: i32 = 0;
/// Highest commandable angle/position/speed/force value.
pub const JOINT_MAX: i32 = 1000;
/// "Leave this joint unchanged". Encoded as 0xFFFF on the wire.
pub const JOINT_UNCHANGED: i32 = -1;

/// Hardware revision; selects the register layout.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Generation {
    #[default]
    Gen3,
    Gen4,
}

impl Generation {
    pub fn number(self) -> u8 {
        match self {
            Generation::Gen3 => 3,
            Generation::Gen4 => 4,
        }
    }

    /// Only Gen4 hands carry tactile pads.
    pub fn has_tactile(self) -> bool {
        matches!(self, Generation::Gen4)
    }
}

impl TryFrom<u8> for Generation {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            3 => Ok(Generation::Gen3),
            4 => Ok(Generation::Gen4),
            other => Err(ProtocolError::UnknownGeneration(other)),
        }
    }
}

impl From<Generation> for u8 {
    fn from(g: Generation) -> u8 {
        g.number()
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gen{}", self.number())
    }
}

/// Actuated joints in wire order.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    Pinky,
    Ring,
    Middle,
    Index,
    ThumbFlex,
    ThumbRotate,
}

impl Joint {
    pub const ALL: [Joint; JOINT_COUNT] = [
        Joint::Pinky,
        Joint::Ring,
        Joint::Middle,
        Joint::Index,
        Joint::ThumbFlex,
        Joint::ThumbRotate,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Joint::Pinky => "pinky",
            Joint::Ring => "ring",
            Joint::Middle => "middle",
            Joint::Index => "index",
            Joint::ThumbFlex => "thumb_flex",
            Joint::ThumbRotate => "thumb_rotate",
        }
    }
}

impl fmt::Display for Joint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A validated six-joint command (angle, position, speed or force).
///
/// Every value lies in `[0, 1000]` or is the `-1` "leave unchanged" sentinel. Whether a
/// transport accepts the sentinel is the caller's decision; see [`JointVector::has_sentinel`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
pub struct JointVector([i16; JOINT_COUNT]);

impl JointVector {
    pub fn new(values: [i32; JOINT_COUNT]) -> Result<Self> {
        let mut out = [0i16; JOINT_COUNT];
        for (joint, v) in Joint::ALL.iter().zip(values) {
            if v != JOINT_UNCHANGED && !(JOINT_MIN..=JOINT_MAX).contains(&v) {
                return Err(ProtocolError::JointValue {
                    joint: *joint,
                    value: v,
                });
            }
            out[joint.index()] = v as i16;
        }
        Ok(Self(out))
    }

    /// Same value on every joint.
    pub fn splat(value: i32) -> Result<Self> {
        Self::new([value; JOINT_COUNT])
    }

    pub fn fully_open() -> Self {
        Self([JOINT_MAX as i16; JOINT_COUNT])
    }

    pub fn fully_closed() -> Self {
        Self([JOINT_MIN as i16; JOINT_COUNT])
    }

    pub fn get(&self, joint: Joint) -> i16 {
        self.0[joint.index()]
    }

    pub fn values(&self) -> [i16; JOINT_COUNT] {
        self.0
    }

    pub fn has_sentinel(&self) -> bool {
        self.0.iter().any(|v| i32::from(*v) == JOINT_UNCHANGED)
    }

    /// Raw 16-bit register words; the sentinel becomes 0xFFFF.
    pub fn to_words(&self) -> [u16; JOINT_COUNT] {
        self.0.map(|v| v as u16)
    }
}

impl TryFrom<&[i32]> for JointVector {
    type Error = ProtocolError;

    fn try_from(values: &[i32]) -> Result<Self> {
        let arr: [i32; JOINT_COUNT] =
            values
                .try_into()
                .map_err(|_| ProtocolError::JointCount {
                    expected: JOINT_COUNT,
                    actual: values.len(),
                })?;
        Self::new(arr)
    }
}

impl fmt::Display for JointVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_row(f, self.0.iter())
    }
}

/// Six values read back from a joint register, exactly as the device reported them.
///
/// Words are unsigned; no sign extension is applied (the hand reports unsigned 16-bit values
/// even where the protocol nominally allows negative offsets).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct JointFeedback(pub [u16; JOINT_COUNT]);

impl JointFeedback {
    pub fn get(&self, joint: Joint) -> u16 {
        self.0[joint.index()]
    }

    pub fn as_array(&self) -> [u16; JOINT_COUNT] {
        self.0
    }
}

impl fmt::Display for JointFeedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_row(f, self.0.iter())
    }
}

fn write_row<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    it: impl Iterator<Item = T>,
) -> fmt::Result {
    for (i, v) in it.enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{v}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_from_number() {
        assert_eq!(Generation::try_from(3), Ok(Generation::Gen3));
        assert_eq!(Generation::try_from(4), Ok(Generation::Gen4));
        assert_eq!(
            Generation::try_from(5),
            Err(ProtocolError::UnknownGeneration(5))
        );
        assert!(Generation::Gen4.has_tactile());
        assert!(!Generation::Gen3.has_tactile());
    }

    #[test]
    fn joint_vector_rejects_wrong_length() {
        let five: &[i32] = &[0, 0, 0, 0, 0];
        let seven: &[i32] = &[0, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            JointVector::try_from(five),
            Err(ProtocolError::JointCount {
                expected: 6,
                actual: 5
            })
        );
        assert!(matches!(
            JointVector::try_from(seven),
            Err(ProtocolError::JointCount { actual: 7, .. })
        ));
    }

    #[test]
    fn joint_vector_range() {
        assert!(JointVector::new([0, 1000, 500, 1, 999, -1]).is_ok());
        assert_eq!(
            JointVector::new([0, 1001, 0, 0, 0, 0]),
            Err(ProtocolError::JointValue {
                joint: Joint::Ring,
                value: 1001
            })
        );
        assert!(JointVector::new([0, 0, 0, 0, 0, -2]).is_err());
    }

    #[test]
    fn sentinel_encodes_as_ffff() {
        let v = JointVector::new([-1, 1000, 0, 0, 0, 0]).unwrap();
        assert!(v.has_sentinel());
        assert_eq!(v.to_words(), [0xFFFF, 1000, 0, 0, 0, 0]);
        assert!(!JointVector::fully_open().has_sentinel());
    }

    #[test]
    fn generation_serde_as_number() {
        let g: Generation = serde_json::from_str("4").unwrap();
        assert_eq!(g, Generation::Gen4);
        assert_eq!(serde_json::to_string(&Generation::Gen3).unwrap(), "3");
        assert!(serde_json::from_str::<Generation>("2").is_err());
    }
}
