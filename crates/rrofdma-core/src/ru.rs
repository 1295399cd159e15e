//! HE resource units and the per-bandwidth RU table

use crate::error::{OfdmaError, OfdmaResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource unit size
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RuType {
    #[serde(rename = "26")]
    Ru26,
    #[serde(rename = "52")]
    Ru52,
    #[serde(rename = "106")]
    Ru106,
    #[serde(rename = "242")]
    Ru242,
    #[serde(rename = "484")]
    Ru484,
    #[serde(rename = "996")]
    Ru996,
    #[serde(rename = "2x996")]
    Ru2x996,
}

impl RuType {
    /// Number of subcarriers covered by the RU
    pub fn tones(self) -> u16 {
        match self {
            RuType::Ru26 => 26,
            RuType::Ru52 => 52,
            RuType::Ru106 => 106,
            RuType::Ru242 => 242,
            RuType::Ru484 => 484,
            RuType::Ru996 => 996,
            RuType::Ru2x996 => 1992,
        }
    }
}

impl fmt::Display for RuType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuType::Ru2x996 => write!(f, "RU_2x996_TONE"),
            other => write!(f, "RU_{}_TONE", other.tones()),
        }
    }
}

/// Number of RUs of each type per channel width, in `(width, type)` order.
///
/// 160 MHz channels have no entry of their own: they reuse the 80 MHz
/// layout on each half, plus the whole-channel 2x996-tone RU.
pub const RU_TABLE: &[(u16, RuType, usize)] = &[
    (20, RuType::Ru26, 9),
    (20, RuType::Ru52, 4),
    (20, RuType::Ru106, 2),
    (20, RuType::Ru242, 1),
    (40, RuType::Ru26, 18),
    (40, RuType::Ru52, 8),
    (40, RuType::Ru106, 4),
    (40, RuType::Ru242, 2),
    (40, RuType::Ru484, 1),
    (80, RuType::Ru26, 37),
    (80, RuType::Ru52, 16),
    (80, RuType::Ru106, 8),
    (80, RuType::Ru242, 4),
    (80, RuType::Ru484, 2),
    (80, RuType::Ru996, 1),
];

/// Number of RUs of `ru_type` in a channel of `bandwidth` MHz
pub fn ru_count(bandwidth: u16, ru_type: RuType) -> Option<usize> {
    RU_TABLE
        .iter()
        .find(|(bw, ty, _)| *bw == bandwidth && *ty == ru_type)
        .map(|(_, _, n)| *n)
}

/// Check that a channel width has RU definitions
pub fn check_bandwidth(bandwidth: u16) -> OfdmaResult<()> {
    match bandwidth {
        20 | 40 | 80 | 160 => Ok(()),
        other => Err(OfdmaError::UnsupportedBandwidth(other)),
    }
}

/// Most RUs a channel can be split into: every 26-tone RU except the
/// central ones of 80 MHz segments, which cannot be reached by splitting.
pub fn leaf_capacity(bandwidth: u16) -> usize {
    match bandwidth {
        20 => 9,
        40 => 18,
        80 => 36,
        160 => 72,
        _ => 0,
    }
}

/// Most RU allocation entries a channel supports
pub fn slot_capacity(bandwidth: u16) -> usize {
    match bandwidth {
        160 => 2 * ru_count(80, RuType::Ru26).unwrap_or(0),
        bw => ru_count(bw, RuType::Ru26).unwrap_or(0),
    }
}

/// An RU within the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuSpec {
    /// Whether the RU lies in the primary 80 MHz of a 160 MHz channel
    pub primary_80mhz: bool,
    /// RU size
    pub ru_type: RuType,
    /// 1-based index among RUs of the same type
    pub index: usize,
}

impl RuSpec {
    /// RU in the primary 80 MHz
    pub fn primary(ru_type: RuType, index: usize) -> Self {
        Self {
            primary_80mhz: true,
            ru_type,
            index,
        }
    }

    /// The whole-channel RU for `bandwidth`
    pub fn whole_channel(bandwidth: u16) -> OfdmaResult<Self> {
        let ru_type = match bandwidth {
            20 => RuType::Ru242,
            40 => RuType::Ru484,
            80 => RuType::Ru996,
            160 => RuType::Ru2x996,
            other => return Err(OfdmaError::UnsupportedBandwidth(other)),
        };
        Ok(Self::primary(ru_type, 1))
    }

    /// Split the RU into the next smaller RUs.
    ///
    /// A 242-tone RU yields its two 106-tone halves followed by its central
    /// 26-tone RU. The central 26-tone RU of an 80 MHz segment is not
    /// returned when splitting a 996-tone RU. 26-tone RUs cannot be split.
    pub fn split(&self, bandwidth: u16) -> Vec<RuSpec> {
        let segment = bandwidth.min(80);
        let child = |ru_type, index| RuSpec {
            primary_80mhz: self.primary_80mhz,
            ru_type,
            index,
        };
        let i = self.index;
        match self.ru_type {
            RuType::Ru2x996 => vec![
                RuSpec::primary(RuType::Ru996, 1),
                RuSpec {
                    primary_80mhz: false,
                    ru_type: RuType::Ru996,
                    index: 1,
                },
            ],
            RuType::Ru996 => vec![child(RuType::Ru484, 1), child(RuType::Ru484, 2)],
            RuType::Ru484 => vec![
                child(RuType::Ru242, 2 * i - 1),
                child(RuType::Ru242, 2 * i),
            ],
            RuType::Ru242 => vec![
                child(RuType::Ru106, 2 * i - 1),
                child(RuType::Ru106, 2 * i),
                child(RuType::Ru26, base_26_index(segment, i) + 5),
            ],
            RuType::Ru106 => vec![child(RuType::Ru52, 2 * i - 1), child(RuType::Ru52, 2 * i)],
            RuType::Ru52 => {
                let subchannel = (i - 1) / 4 + 1;
                let (first, second) = match (i - 1) % 4 {
                    0 => (1, 2),
                    1 => (3, 4),
                    2 => (6, 7),
                    _ => (8, 9),
                };
                let base = base_26_index(segment, subchannel);
                vec![child(RuType::Ru26, base + first), child(RuType::Ru26, base + second)]
            }
            RuType::Ru26 => Vec::new(),
        }
    }
}

/// Offset of the 26-tone indices of 20 MHz subchannel `subchannel` (1-based)
fn base_26_index(segment: u16, subchannel: usize) -> usize {
    let center = usize::from(segment == 80 && subchannel >= 3);
    9 * (subchannel - 1) + center
}

impl fmt::Display for RuSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{}{}",
            self.ru_type,
            self.index,
            if self.primary_80mhz { "" } else { " (secondary 80)" }
        )
    }
}
