//! Generation-indexed register tables.
//!
//! Addresses are device byte addresses: a 16-bit register occupies two address units, which is
//! why a six-joint block at 1486 is followed by the next block at 1498.

use crate::{Generation, ProtocolError, Result};
use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

/// Address units spanned by one 16-bit register.
pub const REGISTER_ADDRESS_STRIDE: u16 = 2;

/// Symbolic register key. Which names exist depends on the [`Generation`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegisterName {
    HandId,
    ReduRatio,
    ClearError,
    Save,
    ResetPara,
    GestureForceClb,
    CurrentLimit,
    DefaultSpeedSet,
    DefaultForceSet,
    Voltage,
    PosSet,
    AngleSet,
    ForceSet,
    SpeedSet,
    PosAct,
    AngleAct,
    ForceAct,
    Current,
    Error,
    Status,
    Temp,
    ActionSeqCheckdata1,
    ActionSeqCheckdata2,
    ActionSeqStepnum,
    ActionSeqStep0,
    ActionSeqStep1,
    ActionSeqStep2,
    ActionSeqStep3,
    ActionSeqStep4,
    ActionSeqStep5,
    ActionSeqStep6,
    ActionSeqStep7,
    ActionSeqIndex,
    SaveActionSeq,
    ActionSeqRun,
    ActionAdjustForceSet,
    IpPart1,
    IpPart2,
    IpPart3,
    IpPart4,
    PinkyTopTac,
    PinkyTipTac,
    PinkyBaseTac,
    RingTopTac,
    RingTipTac,
    RingBaseTac,
    MiddleTopTac,
    MiddleTipTac,
    MiddleBaseTac,
    IndexTopTac,
    IndexTipTac,
    IndexBaseTac,
    ThumbTopTac,
    ThumbTipTac,
    ThumbMidTac,
    ThumbBaseTac,
    PalmTac,
}

impl RegisterName {
    pub fn as_str(self) -> &'static str {
        use RegisterName::*;
        match self {
            HandId => "HAND_ID",
            ReduRatio => "REDU_RATIO",
            ClearError => "CLEAR_ERROR",
            Save => "SAVE",
            ResetPara => "RESET_PARA",
            GestureForceClb => "GESTURE_FORCE_CLB",
            CurrentLimit => "CURRENT_LIMIT",
            DefaultSpeedSet => "DEFAULT_SPEED_SET",
            DefaultForceSet => "DEFAULT_FORCE_SET",
            Voltage => "VOLTAGE",
            PosSet => "POS_SET",
            AngleSet => "ANGLE_SET",
            ForceSet => "FORCE_SET",
            SpeedSet => "SPEED_SET",
            PosAct => "POS_ACT",
            AngleAct => "ANGLE_ACT",
            ForceAct => "FORCE_ACT",
            Current => "CURRENT",
            Error => "ERROR",
            Status => "STATUS",
            Temp => "TEMP",
            ActionSeqCheckdata1 => "ACTION_SEQ_CHECKDATA1",
            ActionSeqCheckdata2 => "ACTION_SEQ_CHECKDATA2",
            ActionSeqStepnum => "ACTION_SEQ_STEPNUM",
            ActionSeqStep0 => "ACTION_SEQ_STEP0",
            ActionSeqStep1 => "ACTION_SEQ_STEP1",
            ActionSeqStep2 => "ACTION_SEQ_STEP2",
            ActionSeqStep3 => "ACTION_SEQ_STEP3",
            ActionSeqStep4 => "ACTION_SEQ_STEP4",
            ActionSeqStep5 => "ACTION_SEQ_STEP5",
            ActionSeqStep6 => "ACTION_SEQ_STEP6",
            ActionSeqStep7 => "ACTION_SEQ_STEP7",
            ActionSeqIndex => "ACTION_SEQ_INDEX",
            SaveActionSeq => "SAVE_ACTION_SEQ",
            ActionSeqRun => "ACTION_SEQ_RUN",
            ActionAdjustForceSet => "ACTION_ADJUST_FORCE_SET",
            IpPart1 => "IP_PART1",
            IpPart2 => "IP_PART2",
            IpPart3 => "IP_PART3",
            IpPart4 => "IP_PART4",
            PinkyTopTac => "PINKY_TOP_TAC",
            PinkyTipTac => "PINKY_TIP_TAC",
            PinkyBaseTac => "PINKY_BASE_TAC",
            RingTopTac => "RING_TOP_TAC",
            RingTipTac => "RING_TIP_TAC",
            RingBaseTac => "RING_BASE_TAC",
            MiddleTopTac => "MIDDLE_TOP_TAC",
            MiddleTipTac => "MIDDLE_TIP_TAC",
            MiddleBaseTac => "MIDDLE_BASE_TAC",
            IndexTopTac => "INDEX_TOP_TAC",
            IndexTipTac => "INDEX_TIP_TAC",
            IndexBaseTac => "INDEX_BASE_TAC",
            ThumbTopTac => "THUMB_TOP_TAC",
            ThumbTipTac => "THUMB_TIP_TAC",
            ThumbMidTac => "THUMB_MID_TAC",
            ThumbBaseTac => "THUMB_BASE_TAC",
            PalmTac => "PALM_TAC",
        }
    }

    /// Functional grouping used by introspection and the verification report.
    pub fn category(self) -> RegisterCategory {
        use RegisterName::*;
        match self {
            HandId | ReduRatio | ClearError | Save | ResetPara => RegisterCategory::SystemControl,
            AngleSet | PosSet | ForceSet | SpeedSet => RegisterCategory::ActuatorCommand,
            AngleAct | PosAct | ForceAct | Current | Error | Status | Temp => {
                RegisterCategory::SensorReading
            }
            ActionSeqCheckdata1 | ActionSeqCheckdata2 | ActionSeqStepnum | ActionSeqStep0
            | ActionSeqStep1 | ActionSeqStep2 | ActionSeqStep3 | ActionSeqStep4
            | ActionSeqStep5 | ActionSeqStep6 | ActionSeqStep7 | ActionSeqIndex
            | SaveActionSeq | ActionSeqRun => RegisterCategory::ActionSequence,
            PinkyTopTac | PinkyTipTac | PinkyBaseTac | RingTopTac | RingTipTac | RingBaseTac
            | MiddleTopTac | MiddleTipTac | MiddleBaseTac | IndexTopTac | IndexTipTac
            | IndexBaseTac | ThumbTopTac | ThumbTipTac | ThumbMidTac | ThumbBaseTac
            | PalmTac => RegisterCategory::TouchSensor,
            IpPart1 | IpPart2 | IpPart3 | IpPart4 => RegisterCategory::NetworkConfig,
            GestureForceClb | CurrentLimit | DefaultSpeedSet | DefaultForceSet | Voltage
            | ActionAdjustForceSet => RegisterCategory::Other,
        }
    }
}

impl fmt::Display for RegisterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegisterName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        GEN3.iter()
            .chain(GEN4.iter())
            .map(|e| e.name)
            .find(|n| n.as_str() == wanted)
            .ok_or_else(|| format!("unknown register name: {s}"))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterCategory {
    SystemControl,
    ActuatorCommand,
    SensorReading,
    ActionSequence,
    TouchSensor,
    NetworkConfig,
    Other,
}

impl RegisterCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            RegisterCategory::SystemControl => "system_control",
            RegisterCategory::ActuatorCommand => "actuator_command",
            RegisterCategory::SensorReading => "sensor_reading",
            RegisterCategory::ActionSequence => "action_sequence",
            RegisterCategory::TouchSensor => "touch_sensor",
            RegisterCategory::NetworkConfig => "network_config",
            RegisterCategory::Other => "other",
        }
    }
}

impl fmt::Display for RegisterCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed sensor-pad geometry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TactileShape {
    pub rows: u8,
    pub cols: u8,
}

impl TactileShape {
    pub const fn new(rows: u8, cols: u8) -> Self {
        Self { rows, cols }
    }

    pub fn len(self) -> usize {
        usize::from(self.rows) * usize::from(self.cols)
    }

    pub fn is_empty(self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for TactileShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// How a register's value is laid out on each transport.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterLayout {
    /// One byte on serial, one register on Modbus.
    Scalar,
    /// An opaque run of bytes.
    Bytes(u8),
    /// Six little-endian 16-bit joint values.
    JointWords,
    /// Six single-byte joint values, packed two per Modbus register (low byte first).
    JointBytes,
    /// A tactile pad, one 16-bit register per taxel.
    Tactile(TactileShape),
}

impl RegisterLayout {
    /// Byte count for a serial read/write, if the layout fits one frame.
    pub fn serial_len(self) -> Option<u8> {
        match self {
            RegisterLayout::Scalar => Some(1),
            RegisterLayout::Bytes(n) => Some(n),
            RegisterLayout::JointWords => Some(12),
            RegisterLayout::JointBytes => Some(6),
            RegisterLayout::Tactile(_) => None,
        }
    }

    /// Number of 16-bit Modbus registers.
    pub fn register_count(self) -> usize {
        match self {
            RegisterLayout::Scalar => 1,
            RegisterLayout::Bytes(n) => usize::from(n).div_ceil(2),
            RegisterLayout::JointWords => 6,
            RegisterLayout::JointBytes => 3,
            RegisterLayout::Tactile(shape) => shape.len(),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct RegisterEntry {
    pub name: RegisterName,
    pub address: u16,
    pub layout: RegisterLayout,
}

impl RegisterEntry {
    const fn new(name: RegisterName, address: u16, layout: RegisterLayout) -> Self {
        Self {
            name,
            address,
            layout,
        }
    }

    pub fn shape(&self) -> Option<TactileShape> {
        match self.layout {
            RegisterLayout::Tactile(shape) => Some(shape),
            _ => None,
        }
    }
}

/// One row of register introspection output.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RegisterInfo {
    pub name: RegisterName,
    pub address: u16,
    pub hex_address: String,
    pub generation: Generation,
    pub category: RegisterCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<TactileShape>,
}

/// Immutable name → address table for one hardware generation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RegisterMap {
    generation: Generation,
    table: &'static [RegisterEntry],
}

impl RegisterMap {
    pub fn for_generation(generation: Generation) -> Self {
        let table: &'static [RegisterEntry] = match generation {
            Generation::Gen3 => GEN3,
            Generation::Gen4 => GEN4,
        };
        Self { generation, table }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn resolve(&self, name: RegisterName) -> Result<RegisterEntry> {
        self.table
            .iter()
            .find(|e| e.name == name)
            .copied()
            .ok_or(ProtocolError::UnknownRegister {
                name,
                generation: self.generation,
            })
    }

    pub fn address(&self, name: RegisterName) -> Result<u16> {
        self.resolve(name).map(|e| e.address)
    }

    pub fn contains(&self, name: RegisterName) -> bool {
        self.table.iter().any(|e| e.name == name)
    }

    /// Reverse lookup; only exact start addresses match.
    pub fn name_at(&self, address: u16) -> Option<RegisterName> {
        self.table
            .iter()
            .find(|e| e.address == address)
            .map(|e| e.name)
    }

    pub fn entries(&self) -> &'static [RegisterEntry] {
        self.table
    }

    pub fn names(&self) -> impl Iterator<Item = RegisterName> + 'static {
        self.table.iter().map(|e| e.name)
    }

    pub fn by_category(&self, category: RegisterCategory) -> Vec<RegisterName> {
        self.names().filter(|n| n.category() == category).collect()
    }

    pub fn info(&self) -> Vec<RegisterInfo> {
        self.table
            .iter()
            .map(|e| RegisterInfo {
                name: e.name,
                address: e.address,
                hex_address: format!("0x{:04X}", e.address),
                generation: self.generation,
                category: e.name.category(),
                shape: e.shape(),
            })
            .collect()
    }
}

/// Resolve `name` against the table for `generation`.
pub fn resolve(name: RegisterName, generation: Generation) -> Result<RegisterEntry> {
    RegisterMap::for_generation(generation).resolve(name)
}

use RegisterLayout::{Bytes, JointBytes, JointWords, Scalar, Tactile};
use RegisterName as R;

const TOP: TactileShape = TactileShape::new(3, 3);
const TIP: TactileShape = TactileShape::new(12, 8);
const BASE: TactileShape = TactileShape::new(10, 8);
const THUMB_MID: TactileShape = TactileShape::new(3, 3);
const THUMB_BASE: TactileShape = TactileShape::new(12, 8);
const PALM: TactileShape = TactileShape::new(8, 14);

static GEN3: &[RegisterEntry] = &[
    RegisterEntry::new(R::HandId, 1000, Scalar),
    RegisterEntry::new(R::ReduRatio, 1001, Scalar),
    RegisterEntry::new(R::ClearError, 1004, Scalar),
    RegisterEntry::new(R::Save, 1005, Scalar),
    RegisterEntry::new(R::ResetPara, 1006, Scalar),
    RegisterEntry::new(R::GestureForceClb, 1009, Scalar),
    RegisterEntry::new(R::CurrentLimit, 1020, JointWords),
    RegisterEntry::new(R::DefaultSpeedSet, 1032, JointWords),
    RegisterEntry::new(R::DefaultForceSet, 1044, JointWords),
    RegisterEntry::new(R::Voltage, 1472, Bytes(2)),
    RegisterEntry::new(R::PosSet, 1474, JointWords),
    RegisterEntry::new(R::AngleSet, 1486, JointWords),
    RegisterEntry::new(R::ForceSet, 1498, JointWords),
    RegisterEntry::new(R::SpeedSet, 1522, JointWords),
    RegisterEntry::new(R::PosAct, 1534, JointWords),
    RegisterEntry::new(R::AngleAct, 1546, JointWords),
    RegisterEntry::new(R::ForceAct, 1582, JointWords),
    RegisterEntry::new(R::Current, 1594, JointWords),
    RegisterEntry::new(R::Error, 1606, JointBytes),
    RegisterEntry::new(R::Status, 1612, JointBytes),
    RegisterEntry::new(R::Temp, 1618, JointBytes),
    RegisterEntry::new(R::ActionSeqCheckdata1, 2000, Scalar),
    RegisterEntry::new(R::ActionSeqCheckdata2, 2001, Scalar),
    RegisterEntry::new(R::ActionSeqStepnum, 2002, Scalar),
    RegisterEntry::new(R::ActionSeqStep0, 2016, Bytes(38)),
    RegisterEntry::new(R::ActionSeqStep1, 2054, Bytes(38)),
    RegisterEntry::new(R::ActionSeqStep2, 2092, Bytes(38)),
    RegisterEntry::new(R::ActionSeqStep3, 2130, Bytes(38)),
    RegisterEntry::new(R::ActionSeqStep4, 2168, Bytes(38)),
    RegisterEntry::new(R::ActionSeqStep5, 2206, Bytes(38)),
    RegisterEntry::new(R::ActionSeqStep6, 2244, Bytes(38)),
    RegisterEntry::new(R::ActionSeqStep7, 2282, Bytes(38)),
    RegisterEntry::new(R::ActionSeqIndex, 2320, Scalar),
    RegisterEntry::new(R::SaveActionSeq, 2321, Scalar),
    RegisterEntry::new(R::ActionSeqRun, 2322, Scalar),
    RegisterEntry::new(R::ActionAdjustForceSet, 2334, JointWords),
];

// Gen4 drops the action-sequence block, current limit and voltage, and adds network
// configuration plus the tactile pads. Each finger block is top, tip, base back to back.
static GEN4: &[RegisterEntry] = &[
    RegisterEntry::new(R::HandId, 1000, Scalar),
    RegisterEntry::new(R::ReduRatio, 1001, Scalar),
    RegisterEntry::new(R::ClearError, 1004, Scalar),
    RegisterEntry::new(R::Save, 1005, Scalar),
    RegisterEntry::new(R::ResetPara, 1006, Scalar),
    RegisterEntry::new(R::GestureForceClb, 1009, Scalar),
    RegisterEntry::new(R::DefaultSpeedSet, 1032, JointWords),
    RegisterEntry::new(R::DefaultForceSet, 1044, JointWords),
    RegisterEntry::new(R::PosSet, 1474, JointWords),
    RegisterEntry::new(R::AngleSet, 1486, JointWords),
    RegisterEntry::new(R::ForceSet, 1498, JointWords),
    RegisterEntry::new(R::SpeedSet, 1522, JointWords),
    RegisterEntry::new(R::PosAct, 1534, JointWords),
    RegisterEntry::new(R::AngleAct, 1546, JointWords),
    RegisterEntry::new(R::ForceAct, 1582, JointWords),
    RegisterEntry::new(R::Current, 1594, JointWords),
    RegisterEntry::new(R::Error, 1606, JointBytes),
    RegisterEntry::new(R::Status, 1612, JointBytes),
    RegisterEntry::new(R::Temp, 1618, JointBytes),
    RegisterEntry::new(R::IpPart1, 1700, Scalar),
    RegisterEntry::new(R::IpPart2, 1701, Scalar),
    RegisterEntry::new(R::IpPart3, 1702, Scalar),
    RegisterEntry::new(R::IpPart4, 1703, Scalar),
    RegisterEntry::new(R::PinkyTopTac, 3000, Tactile(TOP)),
    RegisterEntry::new(R::PinkyTipTac, 3018, Tactile(TIP)),
    RegisterEntry::new(R::PinkyBaseTac, 3210, Tactile(BASE)),
    RegisterEntry::new(R::RingTopTac, 3370, Tactile(TOP)),
    RegisterEntry::new(R::RingTipTac, 3388, Tactile(TIP)),
    RegisterEntry::new(R::RingBaseTac, 3580, Tactile(BASE)),
    RegisterEntry::new(R::MiddleTopTac, 3740, Tactile(TOP)),
    RegisterEntry::new(R::MiddleTipTac, 3758, Tactile(TIP)),
    RegisterEntry::new(R::MiddleBaseTac, 3950, Tactile(BASE)),
    RegisterEntry::new(R::IndexTopTac, 4110, Tactile(TOP)),
    RegisterEntry::new(R::IndexTipTac, 4128, Tactile(TIP)),
    RegisterEntry::new(R::IndexBaseTac, 4320, Tactile(BASE)),
    RegisterEntry::new(R::ThumbTopTac, 4480, Tactile(TOP)),
    RegisterEntry::new(R::ThumbTipTac, 4498, Tactile(TIP)),
    RegisterEntry::new(R::ThumbMidTac, 4690, Tactile(THUMB_MID)),
    RegisterEntry::new(R::ThumbBaseTac, 4708, Tactile(THUMB_BASE)),
    RegisterEntry::new(R::PalmTac, 4900, Tactile(PALM)),
];
