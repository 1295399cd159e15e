//! RU packing strategies

use rrofdma_core::{
    leaf_capacity, OfdmaResult, PackingPolicy, RuSpec, RuType, TrafficClassifier,
};
use std::sync::Arc;
use tracing::debug;

use crate::packer::{sort_by_size, Candidate, LegacyPacking, Packing};

/// Strategy for mapping a candidate batch onto RUs
pub trait PackingStrategy: Send + Sync {
    /// Pack `batch` into the RUs of a `bandwidth` MHz channel
    fn pack(
        &self,
        batch: &[Candidate],
        bandwidth: u16,
        classifier: &dyn TrafficClassifier,
    ) -> OfdmaResult<Packing>;

    /// Strategy name, for logs
    fn name(&self) -> &'static str;
}

/// Build the strategy selected by `policy`
pub fn strategy_for(policy: PackingPolicy) -> Arc<dyn PackingStrategy> {
    match policy {
        PackingPolicy::Legacy => Arc::new(LegacyPacking),
        PackingPolicy::Greedy => Arc::new(GreedyPacking),
    }
}

/// Largest-first packing that ignores traffic classes.
///
/// The channel is split down the RU tree until there is one RU per served
/// candidate, always splitting the smallest RU that can still be split.
/// Larger RUs then go to candidates with more pending bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyPacking;

impl GreedyPacking {
    /// `count` RUs covering as much of the channel as the RU tree allows
    pub fn blocks(bandwidth: u16, count: usize) -> OfdmaResult<Vec<RuSpec>> {
        let count = count.min(leaf_capacity(bandwidth));
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut blocks = vec![RuSpec::whole_channel(bandwidth)?];
        while blocks.len() < count {
            let Some(position) = Self::next_split(&blocks) else {
                break;
            };
            let room = count - blocks.len() + 1;
            let mut children = blocks[position].split(bandwidth);
            children.truncate(room);
            blocks.splice(position..=position, children);
        }

        blocks.sort_by(|a, b| b.ru_type.tones().cmp(&a.ru_type.tones()));
        Ok(blocks)
    }

    /// Position of the last block among the smallest splittable ones
    fn next_split(blocks: &[RuSpec]) -> Option<usize> {
        let smallest = blocks
            .iter()
            .filter(|ru| ru.ru_type != RuType::Ru26)
            .map(|ru| ru.ru_type.tones())
            .min()?;
        blocks
            .iter()
            .rposition(|ru| ru.ru_type != RuType::Ru26 && ru.ru_type.tones() == smallest)
    }
}

impl PackingStrategy for GreedyPacking {
    fn pack(
        &self,
        batch: &[Candidate],
        bandwidth: u16,
        _classifier: &dyn TrafficClassifier,
    ) -> OfdmaResult<Packing> {
        let mut order = batch.to_vec();
        sort_by_size(&mut order);
        let allocations = Self::blocks(bandwidth, order.len())?;
        debug!(
            candidates = order.len(),
            served = allocations.len(),
            bandwidth,
            "Greedy packing"
        );
        Ok(Packing { allocations, order })
    }

    fn name(&self) -> &'static str {
        "greedy"
    }
}
