//! Class-driven RU packing

use rrofdma_core::{
    check_bandwidth, ru_count, MacAddress, OfdmaError, OfdmaResult, PerStaInfo, RuSpec, RuType,
    TrafficClass, TrafficClassifier, RU_TABLE,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

use crate::strategy::PackingStrategy;

/// Budget of the mixed layout: the tones of one 20 MHz channel
const MIXED_TONE_BUDGET: usize = 242;
/// Above this many class 1 members the uniform 26-tone layout is used
const MAX_MIXED_CLASS1: usize = 7;
/// Highest 26-tone index of a 20 MHz channel
const MAX_MIXED_26_INDEX: usize = 9;

/// A station with a frame ready for the DL MU PPDU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub address: MacAddress,
    /// Size in bytes of the head-of-line frame
    pub size: u32,
    pub info: PerStaInfo,
}

/// Result of packing a batch: allocation `i` belongs to `order[i]`.
///
/// Candidates past the last allocation are not served this time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packing {
    pub allocations: Vec<RuSpec>,
    pub order: Vec<Candidate>,
}

impl Packing {
    /// Number of candidates granted an RU
    pub fn served(&self) -> usize {
        self.allocations.len().min(self.order.len())
    }
}

/// Candidates split by traffic class, each class sorted by descending size
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedBatch {
    pub class1: Vec<Candidate>,
    pub class2: Vec<Candidate>,
    pub class3: Vec<Candidate>,
}

impl ClassifiedBatch {
    /// Classify a batch
    pub fn new(batch: &[Candidate], classifier: &dyn TrafficClassifier) -> Self {
        let mut classes = Self::default();
        for candidate in batch {
            let class = classifier.class_of(&candidate.address);
            debug!(
                address = %candidate.address,
                class = class.number(),
                size = candidate.size,
                "Classified candidate"
            );
            match class {
                TrafficClass::Bursty => classes.class1.push(*candidate),
                TrafficClass::Bulk => classes.class2.push(*candidate),
                TrafficClass::Web => classes.class3.push(*candidate),
            }
        }
        for class in [&mut classes.class1, &mut classes.class2, &mut classes.class3] {
            sort_by_size(class);
        }
        classes
    }

    pub fn len(&self) -> usize {
        self.class1.len() + self.class2.len() + self.class3.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All candidates, class by class
    fn into_order(self) -> Vec<Candidate> {
        let mut order = self.class1;
        order.extend(self.class2);
        order.extend(self.class3);
        order
    }
}

/// Stable sort by descending frame size
pub fn sort_by_size(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| b.size.cmp(&a.size));
}

/// RUs of the single type giving the most RUs without exceeding `n_stations`.
///
/// 160 MHz channels use the 80 MHz layout on both halves, or the
/// whole-channel RU for a single station.
pub fn uniform_allocation(bandwidth: u16, n_stations: usize) -> OfdmaResult<Vec<RuSpec>> {
    check_bandwidth(bandwidth)?;
    if n_stations == 0 {
        return Ok(Vec::new());
    }

    for &(table_bw, ru_type, count) in RU_TABLE {
        if table_bw == bandwidth && count <= n_stations {
            return Ok(spread(ru_type, count, false));
        }
        if bandwidth == 160 && table_bw == 80 && 2 * count <= n_stations {
            return Ok(spread(ru_type, count, true));
        }
    }

    if bandwidth == 160 {
        return Ok(vec![RuSpec::primary(RuType::Ru2x996, 1)]);
    }
    Err(OfdmaError::UnsupportedBandwidth(bandwidth))
}

/// `count` RUs of `ru_type` numbered from 1, repeated on the secondary
/// 80 MHz when `both_halves` is set
fn spread(ru_type: RuType, count: usize, both_halves: bool) -> Vec<RuSpec> {
    let halves: &[bool] = if both_halves { &[true, false] } else { &[true] };
    halves
        .iter()
        .flat_map(|&primary_80mhz| {
            (1..=count).map(move |index| RuSpec {
                primary_80mhz,
                ru_type,
                index,
            })
        })
        .collect()
}

/// Packing that serves traffic classes with dedicated RU sizes.
///
/// - no class 2 member, or at most one candidate: uniform RUs for the batch
/// - more than seven class 1 members: 26-tone RUs over the whole channel
/// - otherwise: a 20 MHz layout mixing 106/52-tone RUs for class 2 with
///   26-tone RUs for classes 1 and 3
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyPacking;

impl LegacyPacking {
    fn uniform(&self, classes: ClassifiedBatch, bandwidth: u16) -> OfdmaResult<Packing> {
        let allocations = uniform_allocation(bandwidth, classes.len())?;
        Ok(Packing {
            allocations,
            order: classes.into_order(),
        })
    }

    fn overflow(&self, classes: ClassifiedBatch, bandwidth: u16) -> OfdmaResult<Packing> {
        let ClassifiedBatch {
            class1,
            mut class2,
            class3,
        } = classes;

        // class 2 only keeps as many places ahead of class 3 as class 1 has members
        let class2_tail = class2.split_off(class1.len().min(class2.len()));
        let mut order = class1;
        order.extend(class2);
        order.extend(class3);
        order.extend(class2_tail);

        let segment = bandwidth.min(80);
        let count = ru_count(segment, RuType::Ru26)
            .ok_or(OfdmaError::UnsupportedBandwidth(bandwidth))?;
        let mut allocations = spread(RuType::Ru26, count, bandwidth == 160);
        allocations.truncate(order.len());

        Ok(Packing { allocations, order })
    }

    fn mixed(&self, classes: ClassifiedBatch) -> Packing {
        let mut budget = MIXED_TONE_BUDGET - 26 * classes.class1.len();
        let mut allocated_106 = 0usize;
        let mut allocated_52 = 0usize;
        let mut allocated_26 = classes.class1.len();
        let mut class2_left = classes.class2.len();
        let mut class3_left = classes.class3.len();

        if budget >= 106 && class2_left > 0 {
            allocated_106 += 1;
            budget -= 106;
            class2_left -= 1;
        }
        while budget >= 52 && class2_left > 0 {
            budget -= 52;
            allocated_52 += 1;
            class2_left -= 1;
        }
        while budget >= 26 && class3_left > 0 {
            budget -= 26;
            allocated_26 += 1;
            class3_left -= 1;
        }
        debug!(
            allocated_106,
            allocated_52, allocated_26, "Mixed RU reservation"
        );

        let mut class1 = VecDeque::from(classes.class1);
        let mut class2 = VecDeque::from(classes.class2);
        let mut class3 = VecDeque::from(classes.class3);
        let mut packing = Packing::default();
        let mut assign = |candidate: Candidate, ru_type: RuType, index: usize| {
            packing.order.push(candidate);
            packing.allocations.push(RuSpec::primary(ru_type, index));
        };

        if let Some(first) = class2.pop_front() {
            if allocated_106 > 0 {
                assign(first, RuType::Ru106, 1);
            } else {
                assign(first, RuType::Ru52, 1);
                allocated_52 = allocated_52.saturating_sub(1);
                for index in 3..=4 {
                    match class1.pop_front().or_else(|| class3.pop_front()) {
                        Some(candidate) => assign(candidate, RuType::Ru26, index),
                        None => break,
                    }
                }
            }
        }

        if allocated_26 % 2 != 0 {
            if let Some(candidate) = class1.pop_front().or_else(|| class3.pop_front()) {
                assign(candidate, RuType::Ru26, 5);
            }
            allocated_26 -= 1;
        }

        let mut index_52 = 3;
        let mut index_26 = if allocated_52 > 0 { 8 } else { 6 };
        while allocated_52 > 0 {
            let Some(candidate) = class2.pop_front() else {
                break;
            };
            assign(candidate, RuType::Ru52, index_52);
            index_52 += 1;
            allocated_52 -= 1;
        }
        while allocated_26 > 0 && index_26 <= MAX_MIXED_26_INDEX {
            let Some(candidate) = class1.pop_front().or_else(|| class3.pop_front()) else {
                break;
            };
            assign(candidate, RuType::Ru26, index_26);
            index_26 += 1;
            allocated_26 -= 1;
        }

        packing.order.extend(class1);
        packing.order.extend(class2);
        packing.order.extend(class3);
        packing
    }
}

impl PackingStrategy for LegacyPacking {
    fn pack(
        &self,
        batch: &[Candidate],
        bandwidth: u16,
        classifier: &dyn TrafficClassifier,
    ) -> OfdmaResult<Packing> {
        check_bandwidth(bandwidth)?;
        let classes = ClassifiedBatch::new(batch, classifier);
        let (n1, n2, n3) = (
            classes.class1.len(),
            classes.class2.len(),
            classes.class3.len(),
        );
        debug!(class1 = n1, class2 = n2, class3 = n3, bandwidth, "Packing batch");

        if n2 == 0 || n1 + n2 + n3 <= 1 {
            self.uniform(classes, bandwidth)
        } else if n1 > MAX_MIXED_CLASS1 {
            self.overflow(classes, bandwidth)
        } else {
            Ok(self.mixed(classes))
        }
    }

    fn name(&self) -> &'static str {
        "legacy"
    }
}
