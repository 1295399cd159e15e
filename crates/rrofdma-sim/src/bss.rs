//! In-memory BSS implementing the scheduler's collaborator traits

use rrofdma_core::{
    check_bandwidth, he_tb_duration, he_tb_lsig_length, AccessCategory, Aid, BlockAckReqType,
    BlockAckType, DlMuAckSequence, DlOfdmaInfo, MacAddress, MacLayer, OfdmaError, OfdmaResult,
    Phy, Preamble, QueuedFrame, RuSpec, RuType, StationManager, Tid, TriggerFrame, TxParams, TxVector,
    UlMuAckSequence, UlOfdmaInfo, WifiMode,
};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::scenario::Scenario;
use crate::timing::{he_duration, non_ht_duration};

/// Highest AID a station can be given
const MAX_AID: Aid = 2007;
/// Highest HE MCS index
const MAX_MCS: u8 = 11;

#[derive(Debug, Clone, Copy, Default)]
struct Txop {
    limit: Duration,
    remaining: Duration,
}

#[derive(Debug, Clone)]
struct SimStation {
    address: MacAddress,
    ba_tids: BTreeSet<Tid>,
    queues: BTreeMap<Tid, VecDeque<u32>>,
    buffer_status: u8,
    mode: WifiMode,
}

/// A BSS whose AP queues, agreements and timing come from a [`Scenario`]
#[derive(Debug, Clone)]
pub struct SimulatedBss {
    channel_width: u16,
    guard_interval_ns: u16,
    tx_power_level: u8,
    max_ppdu_duration: Duration,
    dl_ack_sequence: DlMuAckSequence,
    ul_ack_sequence: UlMuAckSequence,
    txops: BTreeMap<AccessCategory, Txop>,
    response: Duration,
    block_ack_tb: Duration,
    stations: BTreeMap<Aid, SimStation>,
}

impl SimulatedBss {
    /// Build the BSS, rejecting inconsistent scenarios
    pub fn new(scenario: Scenario) -> OfdmaResult<Self> {
        check_bandwidth(scenario.channel_width)?;

        let mut stations = BTreeMap::new();
        let mut addresses = HashSet::new();
        for station in &scenario.stations {
            if station.aid == 0 || station.aid > MAX_AID {
                return Err(OfdmaError::Scenario(format!(
                    "AID {} out of range 1..={}",
                    station.aid, MAX_AID
                )));
            }
            let address = station.mac_address();
            if !addresses.insert(address) {
                return Err(OfdmaError::Scenario(format!(
                    "Address {} used by more than one station",
                    address
                )));
            }
            if station.mcs > MAX_MCS || station.nss == 0 {
                return Err(OfdmaError::Scenario(format!(
                    "Invalid mode for AID {}: MCS {} with {} spatial streams",
                    station.aid, station.mcs, station.nss
                )));
            }

            let ba_tids = station
                .ba_tids
                .iter()
                .map(|tid| parse_tid(station.aid, *tid))
                .collect::<OfdmaResult<BTreeSet<_>>>()?;
            let mut queues: BTreeMap<Tid, VecDeque<u32>> = BTreeMap::new();
            for frame in &station.frames {
                let tid = parse_tid(station.aid, frame.tid)?;
                queues.entry(tid).or_default().push_back(frame.size);
            }

            let sim_station = SimStation {
                address,
                ba_tids,
                queues,
                buffer_status: station.buffer_status,
                mode: WifiMode {
                    mcs: station.mcs,
                    nss: station.nss,
                },
            };
            if stations.insert(station.aid, sim_station).is_some() {
                return Err(OfdmaError::Scenario(format!(
                    "AID {} used by more than one station",
                    station.aid
                )));
            }
        }

        let txops = scenario
            .txop
            .iter()
            .map(|t| {
                (
                    t.ac,
                    Txop {
                        limit: Duration::from_micros(t.limit_us),
                        remaining: Duration::from_micros(t.remaining_us),
                    },
                )
            })
            .collect();

        info!(
            channel_width = scenario.channel_width,
            stations = stations.len(),
            "Simulated BSS created"
        );

        Ok(Self {
            channel_width: scenario.channel_width,
            guard_interval_ns: scenario.guard_interval_ns,
            tx_power_level: scenario.tx_power_level,
            max_ppdu_duration: Duration::from_micros(scenario.max_ppdu_duration_us),
            dl_ack_sequence: scenario.dl_ack_sequence,
            ul_ack_sequence: scenario.ul_ack_sequence,
            txops,
            response: Duration::from_micros(scenario.response_us),
            block_ack_tb: Duration::from_micros(scenario.block_ack_tb_us),
            stations,
        })
    }

    /// Load a scenario file and build the BSS
    pub fn from_file(path: &Path) -> OfdmaResult<Self> {
        Self::new(Scenario::from_file(path)?)
    }

    fn station(&self, address: &MacAddress) -> Option<&SimStation> {
        self.stations.values().find(|s| s.address == *address)
    }

    fn station_mut(&mut self, address: &MacAddress) -> Option<&mut SimStation> {
        self.stations.values_mut().find(|s| s.address == *address)
    }

    /// First queued frame, looking at stations by AID and TIDs in order
    pub fn next_frame(&self) -> Option<QueuedFrame> {
        self.stations.values().find_map(|station| {
            station.queues.iter().find_map(|(tid, queue)| {
                queue.front().map(|size| QueuedFrame {
                    receiver: station.address,
                    tid: *tid,
                    size: *size,
                })
            })
        })
    }

    /// Number of frames still queued
    pub fn pending_frames(&self) -> usize {
        self.stations
            .values()
            .flat_map(|s| s.queues.values())
            .map(VecDeque::len)
            .sum()
    }

    /// Dequeue the frames carried by a DL MU PPDU; returns how many were sent
    pub fn deliver(&mut self, info: &DlOfdmaInfo) -> usize {
        let mut sent = 0;
        for (address, sta) in &info.sta_info {
            let Some(station) = self.station_mut(address) else {
                continue;
            };
            if let Some(size) = station.queues.get_mut(&sta.tid).and_then(VecDeque::pop_front) {
                debug!(%address, aid = sta.aid, tid = sta.tid.value(), size, "Delivered DL frame");
                sent += 1;
            }
        }
        sent
    }

    /// Dequeue a frame sent in a single-user PPDU
    pub fn deliver_single(&mut self, frame: &QueuedFrame) -> bool {
        self.station_mut(&frame.receiver)
            .and_then(|s| s.queues.get_mut(&frame.tid))
            .and_then(VecDeque::pop_front)
            .is_some()
    }

    /// Clear the backlog of the stations solicited by a trigger frame
    pub fn drain_uplink(&mut self, info: &UlOfdmaInfo) {
        for user in &info.trigger.users {
            if let Some(station) = self.stations.get_mut(&user.aid) {
                station.buffer_status = 0;
            }
        }
    }

    /// Queue a frame for `aid`
    pub fn enqueue(&mut self, aid: Aid, tid: Tid, size: u32) -> OfdmaResult<()> {
        let station = self
            .stations
            .get_mut(&aid)
            .ok_or_else(|| OfdmaError::Scenario(format!("No station with AID {}", aid)))?;
        station.queues.entry(tid).or_default().push_back(size);
        Ok(())
    }

    /// Remove a station from the association table
    pub fn disassociate(&mut self, aid: Aid) -> Option<MacAddress> {
        let removed = self.stations.remove(&aid).map(|s| s.address);
        if let Some(address) = removed {
            info!(aid, %address, "Station disassociated");
        }
        removed
    }

    pub fn set_buffer_status(&mut self, aid: Aid, code: u8) {
        if let Some(station) = self.stations.get_mut(&aid) {
            station.buffer_status = code;
        }
    }

    /// Set the time left in the TXOP of `ac`, creating a TXOP of that
    /// length if `ac` holds none
    pub fn set_remaining_txop(&mut self, ac: AccessCategory, remaining: Duration) {
        let txop = self.txops.entry(ac).or_default();
        txop.remaining = remaining;
        if txop.limit.is_zero() {
            txop.limit = remaining;
        }
    }
}

fn parse_tid(aid: Aid, value: u8) -> OfdmaResult<Tid> {
    Tid::new(value)
        .ok_or_else(|| OfdmaError::Scenario(format!("Invalid TID {} for AID {}", value, aid)))
}

impl Phy for SimulatedBss {
    fn channel_width(&self) -> u16 {
        self.channel_width
    }

    fn guard_interval(&self) -> Duration {
        Duration::from_nanos(u64::from(self.guard_interval_ns))
    }

    fn max_ppdu_duration(&self, _preamble: Preamble) -> Duration {
        self.max_ppdu_duration
    }

    fn tx_duration(&self, bytes: u32, tx_vector: &TxVector, sta_id: Option<Aid>) -> Duration {
        if tx_vector.preamble == Preamble::NonHt {
            let mcs = tx_vector.mode.map_or(0, |m| m.mcs);
            return non_ht_duration(bytes, mcs);
        }

        let user = sta_id
            .and_then(|aid| tx_vector.users.get(&aid))
            .or_else(|| tx_vector.users.values().next());
        match user {
            Some(user) => he_duration(
                bytes,
                tx_vector.preamble,
                user.ru.ru_type,
                user.mcs,
                user.nss,
                tx_vector.guard_interval_ns,
            ),
            None => {
                let ru_type = RuSpec::whole_channel(tx_vector.channel_width)
                    .or_else(|_| RuSpec::whole_channel(self.channel_width))
                    .map(|ru| ru.ru_type)
                    .unwrap_or(RuType::Ru242);
                let mode = tx_vector.mode.unwrap_or(WifiMode { mcs: 0, nss: 1 });
                he_duration(
                    bytes,
                    tx_vector.preamble,
                    ru_type,
                    mode.mcs,
                    mode.nss,
                    tx_vector.guard_interval_ns,
                )
            }
        }
    }
}

impl MacLayer for SimulatedBss {
    fn peek_next_frame(&self, tid: Tid, station: &MacAddress) -> Option<QueuedFrame> {
        let sim = self.station(station)?;
        let size = *sim.queues.get(&tid)?.front()?;
        Some(QueuedFrame {
            receiver: *station,
            tid,
            size,
        })
    }

    fn ba_agreement_established(&self, station: &MacAddress, tid: Tid) -> bool {
        self.station(station)
            .is_some_and(|s| s.ba_tids.contains(&tid))
    }

    fn block_ack_req_type(&self, _station: &MacAddress, _tid: Tid) -> BlockAckReqType {
        BlockAckReqType::Compressed
    }

    fn block_ack_type(&self, _station: &MacAddress, _tid: Tid) -> BlockAckType {
        BlockAckType::Compressed
    }

    fn txop_limit(&self, ac: AccessCategory) -> Duration {
        self.txops.get(&ac).map_or(Duration::ZERO, |t| t.limit)
    }

    fn remaining_txop(&self, ac: AccessCategory) -> Duration {
        self.txops.get(&ac).map_or(Duration::ZERO, |t| t.remaining)
    }

    fn dl_mu_ack_sequence(&self, _ac: AccessCategory) -> DlMuAckSequence {
        self.dl_ack_sequence
    }

    fn ul_mu_ack_sequence(&self, _ac: AccessCategory) -> UlMuAckSequence {
        self.ul_ack_sequence
    }

    fn response_duration(
        &self,
        params: &TxParams,
        _tx_vector: &TxVector,
        trigger: Option<&TriggerFrame>,
    ) -> Duration {
        if let Some(trigger) = trigger {
            return self.response + he_tb_duration(trigger.ul_length);
        }
        match params.dl_ack_sequence {
            // one BAR/BA exchange per receiver
            Some(DlMuAckSequence::SuFormat) => {
                self.response * u32::try_from(params.acks.len().max(1)).unwrap_or(u32::MAX)
            }
            _ => self.response,
        }
    }

    fn ul_length_for_block_acks(&self, _trigger: &TriggerFrame, _params: &TxParams) -> u16 {
        he_tb_lsig_length(self.block_ack_tb)
    }
}

impl StationManager for SimulatedBss {
    fn associated_stations(&self) -> BTreeMap<Aid, MacAddress> {
        self.stations
            .iter()
            .map(|(aid, s)| (*aid, s.address))
            .collect()
    }

    fn buffer_status(&self, station: &MacAddress) -> u8 {
        self.station(station).map_or(0, |s| s.buffer_status)
    }

    fn default_tx_power_level(&self) -> u8 {
        self.tx_power_level
    }

    fn data_mode(&self, station: &MacAddress) -> WifiMode {
        self.station(station)
            .map_or(WifiMode { mcs: 0, nss: 1 }, |s| s.mode)
    }

    fn control_tx_vector(&self) -> TxVector {
        TxVector::non_ht(self.channel_width, WifiMode { mcs: 0, nss: 1 })
    }
}
