//! Tactile pad reshaping.
//!
//! Each pad is read as one flat run of 16-bit registers and folded into a matrix whose
//! orientation follows the physical wiring: most pads fill row by row, the thumb base pad is
//! mounted upside down, and the palm pad is scanned column by column.

use crate::{ProtocolError, RegisterMap, RegisterName, Result, TactileShape};
use core::fmt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// One physical sensor pad.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TactileSite {
    PinkyTop,
    PinkyTip,
    PinkyBase,
    RingTop,
    RingTip,
    RingBase,
    MiddleTop,
    MiddleTip,
    MiddleBase,
    IndexTop,
    IndexTip,
    IndexBase,
    ThumbTop,
    ThumbTip,
    ThumbMid,
    ThumbBase,
    Palm,
}

impl TactileSite {
    pub const ALL: [TactileSite; 17] = [
        TactileSite::PinkyTop,
        TactileSite::PinkyTip,
        TactileSite::PinkyBase,
        TactileSite::RingTop,
        TactileSite::RingTip,
        TactileSite::RingBase,
        TactileSite::MiddleTop,
        TactileSite::MiddleTip,
        TactileSite::MiddleBase,
        TactileSite::IndexTop,
        TactileSite::IndexTip,
        TactileSite::IndexBase,
        TactileSite::ThumbTop,
        TactileSite::ThumbTip,
        TactileSite::ThumbMid,
        TactileSite::ThumbBase,
        TactileSite::Palm,
    ];

    pub fn register(self) -> RegisterName {
        match self {
            TactileSite::PinkyTop => RegisterName::PinkyTopTac,
            TactileSite::PinkyTip => RegisterName::PinkyTipTac,
            TactileSite::PinkyBase => RegisterName::PinkyBaseTac,
            TactileSite::RingTop => RegisterName::RingTopTac,
            TactileSite::RingTip => RegisterName::RingTipTac,
            TactileSite::RingBase => RegisterName::RingBaseTac,
            TactileSite::MiddleTop => RegisterName::MiddleTopTac,
            TactileSite::MiddleTip => RegisterName::MiddleTipTac,
            TactileSite::MiddleBase => RegisterName::MiddleBaseTac,
            TactileSite::IndexTop => RegisterName::IndexTopTac,
            TactileSite::IndexTip => RegisterName::IndexTipTac,
            TactileSite::IndexBase => RegisterName::IndexBaseTac,
            TactileSite::ThumbTop => RegisterName::ThumbTopTac,
            TactileSite::ThumbTip => RegisterName::ThumbTipTac,
            TactileSite::ThumbMid => RegisterName::ThumbMidTac,
            TactileSite::ThumbBase => RegisterName::ThumbBaseTac,
            TactileSite::Palm => RegisterName::PalmTac,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TactileSite::PinkyTop => "pinky_top",
            TactileSite::PinkyTip => "pinky_tip",
            TactileSite::PinkyBase => "pinky_base",
            TactileSite::RingTop => "ring_top",
            TactileSite::RingTip => "ring_tip",
            TactileSite::RingBase => "ring_base",
            TactileSite::MiddleTop => "middle_top",
            TactileSite::MiddleTip => "middle_tip",
            TactileSite::MiddleBase => "middle_base",
            TactileSite::IndexTop => "index_top",
            TactileSite::IndexTip => "index_tip",
            TactileSite::IndexBase => "index_base",
            TactileSite::ThumbTop => "thumb_top",
            TactileSite::ThumbTip => "thumb_tip",
            TactileSite::ThumbMid => "thumb_mid",
            TactileSite::ThumbBase => "thumb_base",
            TactileSite::Palm => "palm",
        }
    }

    pub fn fill(self) -> FillOrder {
        match self {
            TactileSite::ThumbBase => FillOrder::RowMajorRotated180,
            TactileSite::Palm => FillOrder::ColumnMajor,
            _ => FillOrder::RowMajor,
        }
    }
}

impl fmt::Display for TactileSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl core::str::FromStr for TactileSite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        TactileSite::ALL
            .into_iter()
            .find(|site| site.name() == wanted)
            .ok_or_else(|| format!("unknown tactile site: {s}"))
    }
}

/// How a flat register block maps onto `(row, col)`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FillOrder {
    /// `cols` values per row, top row first.
    RowMajor,
    /// Row-major, then mirrored on both axes.
    RowMajorRotated180,
    /// `rows` values per column, left column first.
    ColumnMajor,
}

/// A 2-D pressure grid.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMatrix")]
pub struct TactileMatrix {
    rows: usize,
    cols: usize,
    data: Vec<i32>,
}

/// Wire form of [`TactileMatrix`], checked before it becomes one.
#[derive(Deserialize)]
struct RawMatrix {
    rows: usize,
    cols: usize,
    data: Vec<i32>,
}

impl TryFrom<RawMatrix> for TactileMatrix {
    type Error = ProtocolError;

    fn try_from(raw: RawMatrix) -> Result<Self> {
        let expected = raw
            .rows
            .checked_mul(raw.cols)
            .ok_or(ProtocolError::BlockLength {
                expected: usize::MAX,
                actual: raw.data.len(),
            })?;
        if expected != raw.data.len() {
            return Err(ProtocolError::BlockLength {
                expected,
                actual: raw.data.len(),
            });
        }
        Ok(TactileMatrix {
            rows: raw.rows,
            cols: raw.cols,
            data: raw.data,
        })
    }
}

impl TactileMatrix {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<i32> {
        if row < self.rows && col < self.cols {
            self.data.get(row * self.cols + col).copied()
        } else {
            None
        }
    }

    pub fn row(&self, row: usize) -> Option<&[i32]> {
        if row >= self.rows {
            return None;
        }
        let start = row.checked_mul(self.cols)?;
        self.data.get(start..start.checked_add(self.cols)?)
    }

    pub fn to_rows(&self) -> Vec<Vec<i32>> {
        self.data.chunks(self.cols.max(1)).map(<[i32]>::to_vec).collect()
    }

    /// Row-major backing storage.
    pub fn as_slice(&self) -> &[i32] {
        &self.data
    }

    pub fn max(&self) -> Option<i32> {
        self.data.iter().copied().max()
    }
}

/// Fold `values` into a `shape` matrix. The element count must match exactly.
pub fn reshape(values: &[u16], shape: TactileShape, fill: FillOrder) -> Result<TactileMatrix> {
    let expected = shape.len();
    if values.len() != expected {
        return Err(ProtocolError::BlockLength {
            expected,
            actual: values.len(),
        });
    }
    let rows = usize::from(shape.rows);
    let cols = usize::from(shape.cols);
    let data = match fill {
        FillOrder::RowMajor => values.iter().map(|v| i32::from(*v)).collect(),
        FillOrder::RowMajorRotated180 => values.iter().rev().map(|v| i32::from(*v)).collect(),
        FillOrder::ColumnMajor => {
            let mut data = Vec::with_capacity(expected);
            for r in 0..rows {
                for c in 0..cols {
                    data.push(i32::from(values[c * rows + r]));
                }
            }
            data
        }
    };
    Ok(TactileMatrix { rows, cols, data })
}

/// Source of consecutive 16-bit registers, implemented by whichever client does the I/O.
pub trait BlockReader {
    type Error: fmt::Display + From<ProtocolError>;

    /// Read `count` registers starting at `address`, in address order.
    fn read_block(&mut self, address: u16, count: usize) -> Result<Vec<u16>, Self::Error>;
}

/// Timestamped snapshot of every tactile pad.
///
/// Pads whose block could not be read or reshaped are absent from `matrices` and listed in
/// `faults` with the reason.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TactileFrame {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub matrices: BTreeMap<TactileSite, TactileMatrix>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub faults: BTreeMap<TactileSite, String>,
}

impl TactileFrame {
    pub fn get(&self, site: TactileSite) -> Option<&TactileMatrix> {
        self.matrices.get(&site)
    }

    pub fn is_complete(&self) -> bool {
        self.faults.is_empty() && self.matrices.len() == TactileSite::ALL.len()
    }
}

#[derive(Clone, Copy, Debug)]
struct PadBlock {
    site: TactileSite,
    address: u16,
    shape: TactileShape,
}

/// Reads and reshapes tactile blocks for one register map.
#[derive(Clone, Debug)]
pub struct TactileFrameDecoder {
    pads: Vec<PadBlock>,
}

impl TactileFrameDecoder {
    /// Fails with `UnknownRegister` when the map has no tactile blocks.
    pub fn new(map: &RegisterMap) -> Result<Self> {
        let mut pads = Vec::with_capacity(TactileSite::ALL.len());
        for site in TactileSite::ALL {
            let entry = map.resolve(site.register())?;
            let shape = entry.shape().ok_or(ProtocolError::UnknownRegister {
                name: entry.name,
                generation: map.generation(),
            })?;
            pads.push(PadBlock {
                site,
                address: entry.address,
                shape,
            });
        }
        Ok(Self { pads })
    }

    pub fn shape(&self, site: TactileSite) -> Option<TactileShape> {
        self.pad(site).map(|p| p.shape)
    }

    fn pad(&self, site: TactileSite) -> Option<&PadBlock> {
        self.pads.iter().find(|p| p.site == site)
    }

    pub fn decode_site<R: BlockReader>(
        &self,
        reader: &mut R,
        site: TactileSite,
    ) -> Result<TactileMatrix, R::Error> {
        // `new` resolved every site, so a miss is unreachable in practice.
        let Some(pad) = self.pad(site) else {
            return Err(ProtocolError::BlockLength {
                expected: 0,
                actual: 0,
            }
            .into());
        };
        let values = reader.read_block(pad.address, pad.shape.len())?;
        Ok(reshape(&values, pad.shape, site.fill())?)
    }

    /// Read every pad. A failing pad is logged and recorded; the rest still decode.
    pub fn decode_frame<R: BlockReader>(&self, reader: &mut R) -> TactileFrame {
        let mut matrices = BTreeMap::new();
        let mut faults = BTreeMap::new();
        for pad in &self.pads {
            match self.decode_site(reader, pad.site) {
                Ok(m) => {
                    matrices.insert(pad.site, m);
                }
                Err(e) => {
                    tracing::warn!(site = %pad.site, error = %e, "tactile pad skipped");
                    faults.insert(pad.site, e.to_string());
                }
            }
        }
        TactileFrame {
            timestamp: OffsetDateTime::now_utc(),
            matrices,
            faults,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Generation;
    use std::collections::HashMap;

    const TIP: TactileShape = TactileShape::new(12, 8);
    const PALM: TactileShape = TactileShape::new(8, 14);

    fn ramp(n: usize) -> Vec<u16> {
        (0..n as u16).collect()
    }

    #[test]
    fn row_major_fill() {
        let m = reshape(&ramp(96), TIP, FillOrder::RowMajor).unwrap();
        assert_eq!(m.row(0).unwrap(), &[0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(m.row(11).unwrap(), &[88, 89, 90, 91, 92, 93, 94, 95]);
        assert_eq!(m.row(12), None);
    }

    #[test]
    fn thumb_base_is_rotated() {
        let plain = reshape(&ramp(96), TIP, FillOrder::RowMajor).unwrap();
        let flipped = reshape(&ramp(96), TIP, FillOrder::RowMajorRotated180).unwrap();
        assert_eq!(flipped.get(0, 0), plain.get(11, 7));
        assert_eq!(flipped.get(11, 7), plain.get(0, 0));
        assert_eq!(flipped.get(3, 2), plain.get(8, 5));
        assert_eq!(flipped.row(0).unwrap(), &[95, 94, 93, 92, 91, 90, 89, 88]);
    }

    #[test]
    fn palm_fills_by_column() {
        let m = reshape(&ramp(112), PALM, FillOrder::ColumnMajor).unwrap();
        assert_eq!((m.rows(), m.cols()), (8, 14));
        assert_eq!(m.get(0, 0), Some(0));
        assert_eq!(m.get(1, 0), Some(1));
        assert_eq!(m.get(7, 0), Some(7));
        assert_eq!(m.get(0, 1), Some(8));
        assert_eq!(m.get(0, 13), Some(104));
        assert_eq!(m.get(7, 13), Some(111));
        assert_eq!(m.row(0).unwrap()[..3], [0, 8, 16]);
    }

    #[test]
    fn length_must_match_exactly() {
        let top = TactileShape::new(3, 3);
        assert_eq!(
            reshape(&ramp(3), top, FillOrder::RowMajor),
            Err(ProtocolError::BlockLength {
                expected: 9,
                actual: 3
            })
        );
        assert!(reshape(&ramp(10), top, FillOrder::RowMajor).is_err());
    }

    #[test]
    fn values_above_i16_stay_positive() {
        let m = reshape(&[0xFFFF; 9], TactileShape::new(3, 3), FillOrder::RowMajor).unwrap();
        assert_eq!(m.max(), Some(65535));
    }

    /// Serves `address` as the first value of each block; chosen addresses come back short.
    struct ScriptedReader {
        short: HashMap<u16, usize>,
        calls: usize,
    }

    impl BlockReader for ScriptedReader {
        type Error = ProtocolError;

        fn read_block(&mut self, address: u16, count: usize) -> Result<Vec<u16>> {
            self.calls += 1;
            let n = self.short.get(&address).copied().unwrap_or(count);
            Ok((0..n as u16).map(|i| address + i).collect())
        }
    }

    #[test]
    fn short_site_is_dropped_others_decode() {
        let decoder = TactileFrameDecoder::new(&RegisterMap::for_generation(Generation::Gen4)).unwrap();
        let mut reader = ScriptedReader {
            short: HashMap::from([(3000, 3)]),
            calls: 0,
        };
        let frame = decoder.decode_frame(&mut reader);
        assert_eq!(reader.calls, 17);
        assert!(frame.get(TactileSite::PinkyTop).is_none());
        assert!(frame.faults.contains_key(&TactileSite::PinkyTop));
        assert_eq!(frame.matrices.len(), 16);
        assert_eq!(frame.get(TactileSite::RingTop).unwrap().get(0, 0), Some(3370));
        assert_eq!(frame.get(TactileSite::Palm).unwrap().cols(), 14);
        assert!(!frame.is_complete());
    }

    #[test]
    fn gen3_has_no_decoder() {
        assert!(matches!(
            TactileFrameDecoder::new(&RegisterMap::for_generation(Generation::Gen3)),
            Err(ProtocolError::UnknownRegister { .. })
        ));
    }

    #[test]
    fn frame_serializes_site_keys() {
        let decoder = TactileFrameDecoder::new(&RegisterMap::for_generation(Generation::Gen4)).unwrap();
        let mut reader = ScriptedReader {
            short: HashMap::new(),
            calls: 0,
        };
        let frame = decoder.decode_frame(&mut reader);
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"thumb_base\""));
        assert!(!json.contains("faults"));
        let back: TactileFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(back.matrices, frame.matrices);
    }

    #[test]
    fn ragged_matrix_is_rejected_on_load() {
        let ok: TactileMatrix =
            serde_json::from_str(r#"{"rows":2,"cols":2,"data":[1,2,3,4]}"#).unwrap();
        assert_eq!(ok.to_rows(), vec![vec![1, 2], vec![3, 4]]);

        let err = serde_json::from_str::<TactileMatrix>(r#"{"rows":3,"cols":3,"data":[1,2,3,4]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("expected 9 values, got 4"));
        assert!(serde_json::from_str::<TactileMatrix>(
            r#"{"rows":18446744073709551615,"cols":2,"data":[]}"#
        )
        .is_err());
    }
}
