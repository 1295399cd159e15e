//! Property-based tests for RU packing.
//!
//! Batches of random size, class mix and frame sizes are packed on every
//! supported channel width by both packing strategies, directly and through
//! full DL decisions of the scheduler.

use proptest::prelude::*;
use rrofdma_core::{
    ru_count, slot_capacity, MacAddress, PackingPolicy, PerStaInfo, QueuedFrame, RuType,
    SchedulerConfig, StaticClassifier, Tid, TrafficClass, TrafficClassTables, TxFormat,
};
use rrofdma_scheduler::{
    Candidate, GreedyPacking, LegacyPacking, OfdmaScheduler, Packing, PackingStrategy,
};
use rrofdma_sim::{Scenario, SimulatedBss, StationScenario};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const BANDWIDTHS: [u16; 4] = [20, 40, 80, 160];

/// Batch from `(class, size)` pairs; class 0 leaves the station unclassified
fn batch(stations: &[(u8, u32)]) -> (Vec<Candidate>, HashMap<MacAddress, TrafficClass>) {
    let mut candidates = Vec::new();
    let mut classes = HashMap::new();
    for (i, (class, size)) in stations.iter().enumerate() {
        let aid = i as u16 + 1;
        let address = MacAddress::from_index(u64::from(aid));
        match class {
            1 => classes.insert(address, TrafficClass::Bursty),
            2 => classes.insert(address, TrafficClass::Bulk),
            3 => classes.insert(address, TrafficClass::Web),
            _ => None,
        };
        candidates.push(Candidate {
            address,
            size: *size,
            info: PerStaInfo {
                aid,
                tid: Tid::new(0).unwrap(),
            },
        });
    }
    (candidates, classes)
}

fn stations() -> impl Strategy<Value = Vec<(u8, u32)>> {
    prop::collection::vec((0u8..4, 1u32..20_000), 1..=74)
}

fn check_packing(packing: &Packing, batch: &[Candidate], bandwidth: u16) -> Result<(), TestCaseError> {
    prop_assert!(packing.allocations.len() <= batch.len());
    prop_assert!(packing.allocations.len() <= slot_capacity(bandwidth));
    prop_assert_eq!(packing.served(), packing.allocations.len());

    // every candidate appears exactly once
    prop_assert_eq!(packing.order.len(), batch.len());
    let packed: HashSet<MacAddress> = packing.order.iter().map(|c| c.address).collect();
    let offered: HashSet<MacAddress> = batch.iter().map(|c| c.address).collect();
    prop_assert_eq!(packed, offered);

    for ru in &packing.allocations {
        prop_assert!(ru.index >= 1);
        if ru.ru_type != RuType::Ru2x996 {
            let count = ru_count(bandwidth.min(80), ru.ru_type);
            prop_assert!(count.is_some(), "{} not defined on {} MHz", ru, bandwidth);
            prop_assert!(ru.index <= count.unwrap_or(0), "{} out of range", ru);
        }
    }
    Ok(())
}

// ─── Legacy Packing ──────────────────────────────────────────────────────────

proptest! {
    /// Allocations never exceed the batch or the channel, and no candidate
    /// is lost or duplicated.
    #[test]
    fn legacy_packing_is_bounded(stations in stations(), bw_idx in 0usize..4) {
        let bandwidth = BANDWIDTHS[bw_idx];
        let (candidates, classes) = batch(&stations);

        let packing = LegacyPacking.pack(&candidates, bandwidth, &classes).unwrap();
        check_packing(&packing, &candidates, bandwidth)?;
    }

    /// Packing the same batch twice gives the same result.
    #[test]
    fn legacy_packing_is_deterministic(stations in stations(), bw_idx in 0usize..4) {
        let bandwidth = BANDWIDTHS[bw_idx];
        let (candidates, classes) = batch(&stations);

        let first = LegacyPacking.pack(&candidates, bandwidth, &classes).unwrap();
        let second = LegacyPacking.pack(&candidates, bandwidth, &classes).unwrap();
        prop_assert_eq!(first, second);
    }

    /// With no class 2 member the whole batch shares one RU size.
    #[test]
    fn legacy_packing_without_bulk_is_uniform(
        stations in prop::collection::vec((prop_oneof![Just(0u8), Just(1u8), Just(3u8)], 1u32..20_000), 1..=74),
        bw_idx in 0usize..4,
    ) {
        let bandwidth = BANDWIDTHS[bw_idx];
        let (candidates, classes) = batch(&stations);

        let packing = LegacyPacking.pack(&candidates, bandwidth, &classes).unwrap();
        prop_assert!(!packing.allocations.is_empty());
        let ru_type = packing.allocations[0].ru_type;
        prop_assert!(packing.allocations.iter().all(|ru| ru.ru_type == ru_type));
    }
}

// ─── Greedy Packing ──────────────────────────────────────────────────────────

proptest! {
    /// Greedy packing serves as many candidates as the channel allows,
    /// each on a distinct RU.
    #[test]
    fn greedy_packing_is_bounded(stations in stations(), bw_idx in 0usize..4) {
        let bandwidth = BANDWIDTHS[bw_idx];
        let (candidates, classes) = batch(&stations);

        let packing = GreedyPacking.pack(&candidates, bandwidth, &classes).unwrap();
        check_packing(&packing, &candidates, bandwidth)?;

        let distinct: HashSet<_> = packing.allocations.iter().collect();
        prop_assert_eq!(distinct.len(), packing.allocations.len());
    }

    /// Larger frames never get smaller RUs than smaller frames.
    #[test]
    fn greedy_packing_favors_large_frames(stations in stations(), bw_idx in 0usize..4) {
        let bandwidth = BANDWIDTHS[bw_idx];
        let (candidates, classes) = batch(&stations);

        let packing = GreedyPacking.pack(&candidates, bandwidth, &classes).unwrap();
        for pair in packing.order[..packing.served()].windows(2) {
            prop_assert!(pair[0].size >= pair[1].size);
        }
        for pair in packing.allocations.windows(2) {
            prop_assert!(pair[0].ru_type.tones() >= pair[1].ru_type.tones());
        }
    }
}

// ─── Degenerate Batches ──────────────────────────────────────────────────────

proptest! {
    /// A lone candidate gets the whole channel whatever its class.
    #[test]
    fn single_candidate_gets_whole_channel(
        class in 0u8..4,
        size in 1u32..20_000,
        bw_idx in 0usize..4,
    ) {
        let bandwidth = BANDWIDTHS[bw_idx];
        let (candidates, classes) = batch(&[(class, size)]);
        let expected = match bandwidth {
            20 => RuType::Ru242,
            40 => RuType::Ru484,
            80 => RuType::Ru996,
            _ => RuType::Ru2x996,
        };

        for strategy in [&LegacyPacking as &dyn PackingStrategy, &GreedyPacking] {
            let packing = strategy.pack(&candidates, bandwidth, &classes).unwrap();
            prop_assert_eq!(packing.allocations.len(), 1);
            prop_assert_eq!(packing.allocations[0].ru_type, expected);
        }
    }
}

// ─── Scheduler Decisions ─────────────────────────────────────────────────────

proptest! {
    /// A DL decision never serves more stations than configured or than
    /// the channel has RUs for.
    #[test]
    fn dl_decision_respects_max_stations(
        stations in stations(),
        n_stations in 1u8..=74,
        bw_idx in 0usize..4,
        greedy in any::<bool>(),
    ) {
        let bandwidth = BANDWIDTHS[bw_idx];
        let mut tables = TrafficClassTables::default();
        let mut scenario = Scenario {
            channel_width: bandwidth,
            ..Scenario::default()
        };
        for (i, (class, size)) in stations.iter().enumerate() {
            let aid = i as u16 + 1;
            let address = MacAddress::from_index(u64::from(aid));
            match class {
                1 => tables.class1.push(address),
                2 => tables.class2.push(address),
                3 => tables.class3.push(address),
                _ => {}
            }
            // keep every frame short enough for the narrowest RU
            scenario
                .stations
                .push(StationScenario::new(aid).with_frame(0, (*size).min(1500)));
        }
        let env = SimulatedBss::new(scenario).unwrap();

        let config = SchedulerConfig {
            n_stations,
            enable_ul_ofdma: false,
            packing: if greedy { PackingPolicy::Greedy } else { PackingPolicy::Legacy },
            ..SchedulerConfig::default()
        };
        let mut scheduler =
            OfdmaScheduler::new(config, Arc::new(StaticClassifier::new(&tables))).unwrap();
        let frame = QueuedFrame {
            receiver: MacAddress::from_index(1),
            tid: Tid::new(0).unwrap(),
            size: 100,
        };

        let format = scheduler.select_tx_format(&env, &frame).unwrap();
        prop_assert_eq!(format, TxFormat::DownlinkMultiUser);
        prop_assert!(scheduler.candidates().len() <= usize::from(n_stations));

        let info = scheduler.compute_dl_ofdma_info(&env);
        prop_assert!(!info.is_empty());
        prop_assert!(info.ru_map.len() <= usize::from(n_stations));
        prop_assert!(info.ru_map.len() <= slot_capacity(bandwidth));
        prop_assert_eq!(info.ru_map.len(), info.sta_info.len());
    }
}
