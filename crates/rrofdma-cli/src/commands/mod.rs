//! CLI commands implementation

use anyhow::{Context, Result};
use rrofdma_core::{
    check_bandwidth, leaf_capacity, slot_capacity, Aid, DlOfdmaInfo, MacAddress, OfdmaConfig,
    PackingPolicy, PerStaInfo, RuType, StationManager, Tid, TrafficClass, TxFormat, UlOfdmaInfo,
    RU_TABLE,
};
use rrofdma_scheduler::{strategy_for, Candidate, OfdmaScheduler};
use rrofdma_sim::SimulatedBss;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::info;

/// One receiver of a decision
#[derive(Debug, Serialize)]
pub struct ReceiverRow {
    pub aid: Aid,
    pub address: MacAddress,
    pub tid: u8,
    pub ru: String,
}

/// Outcome of one scheduling decision
#[derive(Debug, Serialize)]
pub struct Decision {
    pub round: u32,
    pub format: TxFormat,
    pub receivers: Vec<ReceiverRow>,
    /// L-SIG length of the solicited HE TB PPDU
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ul_length: Option<u16>,
    pub next_station: Option<Aid>,
}

impl Decision {
    fn downlink(round: u32, info: &DlOfdmaInfo, next_station: Option<Aid>) -> Self {
        let receivers = info
            .sta_info
            .iter()
            .map(|(address, sta)| ReceiverRow {
                aid: sta.aid,
                address: *address,
                tid: sta.tid.value(),
                ru: info
                    .ru_map
                    .get(&sta.aid)
                    .map_or_else(|| "-".to_string(), |ru| ru.to_string()),
            })
            .collect();
        Self {
            round,
            format: TxFormat::DownlinkMultiUser,
            receivers,
            ul_length: None,
            next_station,
        }
    }

    fn uplink(
        round: u32,
        info: &UlOfdmaInfo,
        stations: &BTreeMap<Aid, MacAddress>,
        next_station: Option<Aid>,
    ) -> Self {
        let receivers = info
            .trigger
            .users
            .iter()
            .filter_map(|user| {
                stations.get(&user.aid).map(|address| ReceiverRow {
                    aid: user.aid,
                    address: *address,
                    tid: 0,
                    ru: user.ru.to_string(),
                })
            })
            .collect();
        Self {
            round,
            format: TxFormat::UplinkMultiUser,
            receivers,
            ul_length: Some(info.trigger.ul_length),
            next_station,
        }
    }

    fn print(&self) {
        match self.format {
            TxFormat::SingleUser => println!("Round {}: {}", self.round, self.format),
            _ => {
                println!(
                    "Round {}: {} ({} receivers, next AID {})",
                    self.round,
                    self.format,
                    self.receivers.len(),
                    self.next_station
                        .map_or_else(|| "-".to_string(), |aid| aid.to_string())
                );
                if let Some(length) = self.ul_length {
                    println!("  UL length: {}", length);
                }
                if !self.receivers.is_empty() {
                    println!("  {:<6} {:<18} {:<4} {:<20}", "AID", "ADDRESS", "TID", "RU");
                    for r in &self.receivers {
                        println!(
                            "  {:<6} {:<18} {:<4} {:<20}",
                            r.aid,
                            r.address.to_string(),
                            r.tid,
                            r.ru
                        );
                    }
                }
            }
        }
    }
}

/// Run a scenario for `rounds` decisions
pub fn run(config: &OfdmaConfig, scenario: &Path, rounds: u32, json: bool) -> Result<()> {
    let mut env = SimulatedBss::from_file(scenario)
        .with_context(|| format!("Failed to load scenario {}", scenario.display()))?;
    let mut scheduler = OfdmaScheduler::from_config(config)?;

    info!(
        scenario = %scenario.display(),
        rounds,
        packing = scheduler.packing_strategy(),
        "Running scenario"
    );

    for round in 1..=rounds {
        let Some(frame) = env.next_frame() else {
            if !json {
                println!("No frames left after {} rounds", round - 1);
            }
            break;
        };

        let format = scheduler.select_tx_format(&env, &frame)?;
        let decision = match format {
            TxFormat::DownlinkMultiUser => {
                let info = scheduler.compute_dl_ofdma_info(&env);
                env.deliver(&info);
                Decision::downlink(round, &info, scheduler.start_station())
            }
            TxFormat::UplinkMultiUser => {
                let info = scheduler.compute_ul_ofdma_info(&env);
                env.drain_uplink(&info);
                Decision::uplink(
                    round,
                    &info,
                    &env.associated_stations(),
                    scheduler.start_station(),
                )
            }
            TxFormat::SingleUser => {
                env.deliver_single(&frame);
                Decision {
                    round,
                    format,
                    receivers: Vec::new(),
                    ul_length: None,
                    next_station: scheduler.start_station(),
                }
            }
        };

        if json {
            println!("{}", serde_json::to_string(&decision)?);
        } else {
            decision.print();
        }
    }

    Ok(())
}

/// Pack a synthetic batch with `counts` candidates of classes 1, 2 and 3
pub fn pack(bandwidth: u16, counts: [u16; 3], policy: PackingPolicy) -> Result<()> {
    check_bandwidth(bandwidth)?;

    let classes = [TrafficClass::Bursty, TrafficClass::Bulk, TrafficClass::Web];
    let mut batch = Vec::new();
    let mut membership = HashMap::new();
    let mut aid: Aid = 0;
    for (class, count) in classes.iter().zip(counts) {
        for i in 0..count {
            aid += 1;
            let address = MacAddress::from_index(u64::from(aid));
            membership.insert(address, *class);
            batch.push(Candidate {
                address,
                size: 100 * u32::from(count - i),
                info: PerStaInfo {
                    aid,
                    tid: Tid::new(0).context("TID 0 is valid")?,
                },
            });
        }
    }

    let strategy = strategy_for(policy);
    let packing = strategy.pack(&batch, bandwidth, &membership)?;

    println!(
        "{} packing of {} candidates on {} MHz: {} served",
        strategy.name(),
        packing.order.len(),
        bandwidth,
        packing.served()
    );
    println!(
        "{:<6} {:<6} {:<8} {:<6} {:<20}",
        "ORDER", "AID", "CLASS", "SIZE", "RU"
    );
    for (i, candidate) in packing.order.iter().enumerate() {
        let class = membership
            .get(&candidate.address)
            .map_or(0, |c: &TrafficClass| c.number());
        let ru = packing
            .allocations
            .get(i)
            .map_or_else(|| "-".to_string(), |ru| ru.to_string());
        println!(
            "{:<6} {:<6} {:<8} {:<6} {:<20}",
            i + 1,
            candidate.info.aid,
            class,
            candidate.size,
            ru
        );
    }

    Ok(())
}

/// Print the RUs of a channel width
pub fn rus(bandwidth: u16) -> Result<()> {
    check_bandwidth(bandwidth)?;

    // 160 MHz channels repeat the 80 MHz layout on both halves
    let (segment, halves) = if bandwidth == 160 { (80, 2) } else { (bandwidth, 1) };

    println!("{} MHz channel", bandwidth);
    println!("{:<16} {:<6}", "RU TYPE", "COUNT");
    for (_, ru_type, count) in RU_TABLE.iter().filter(|(bw, _, _)| *bw == segment) {
        println!("{:<16} {:<6}", ru_type.to_string(), count * halves);
    }
    if bandwidth == 160 {
        println!("{:<16} {:<6}", RuType::Ru2x996.to_string(), 1);
    }
    println!();
    println!("Allocation entries: {}", slot_capacity(bandwidth));
    println!("Reachable by splitting: {}", leaf_capacity(bandwidth));

    Ok(())
}
