//! Format decision for each transmission opportunity

use rrofdma_core::{
    check_bandwidth, he_tb_duration, he_tb_lsig_length, AccessCategory, Aid, BlockAckType,
    BufferStatus, DlMuAckSequence, MacAddress, OfdmaConfig, OfdmaError, OfdmaResult, PerStaInfo,
    QueuedFrame, RuSpec, SchedulerConfig, StaticClassifier, Tid, TrafficClassTables,
    TrafficClassifier, TriggerFrame, TriggerKind, TxFormat, TxParams, TxVector, UlMuAckSequence,
    WifiEnvironment,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::finalizer::{init_tx_vector_and_params, mu_bar_trigger};
use crate::packer::{uniform_allocation, Candidate};
use crate::selector::{select_stations, SelectionRequest};
use crate::strategy::{strategy_for, PackingStrategy};

/// HE TB PPDU duration assumed while timing the Basic trigger exchange
const UL_PLACEHOLDER_DURATION: Duration = Duration::from_millis(1);
/// Bitmap length of the Multi-STA Block Ack acknowledging a HE TB PPDU
const MULTI_STA_BITMAP_LEN: u16 = 32;

/// Round-robin OFDMA scheduler.
///
/// Every call to [`OfdmaScheduler::select_tx_format`] decides how the current
/// transmission opportunity is used. The only state carried from one call to
/// the next is the round-robin cursor and the format of the previous call;
/// everything else is rebuilt.
pub struct OfdmaScheduler {
    pub(crate) config: SchedulerConfig,
    classifier: Arc<dyn TrafficClassifier>,
    packing: Arc<dyn PackingStrategy>,
    /// AID of the station the next DL selection starts from
    pub(crate) start_station: Option<Aid>,
    /// Format returned by the last decision
    tx_format: TxFormat,
    /// Candidates in packing order, the first `ru_allocation.len()` are served
    pub(crate) candidates: Vec<Candidate>,
    /// Candidates in selection order
    pub(crate) sta_info: Vec<(MacAddress, PerStaInfo)>,
    pub(crate) ru_allocation: Vec<RuSpec>,
    /// TX vector of the last DL MU PPDU, or of the HE TB PPDU being solicited
    pub(crate) tx_vector: TxVector,
    pub(crate) tx_params: TxParams,
    pub(crate) dl_ack_sequence: Option<DlMuAckSequence>,
    ul_ack_sequence: Option<UlMuAckSequence>,
}

impl OfdmaScheduler {
    /// Create a scheduler classifying stations with `classifier`
    pub fn new(
        config: SchedulerConfig,
        classifier: Arc<dyn TrafficClassifier>,
    ) -> OfdmaResult<Self> {
        config.validate()?;
        let packing = strategy_for(config.packing);

        info!(
            n_stations = config.n_stations,
            force_dl_ofdma = config.force_dl_ofdma,
            enable_ul_ofdma = config.enable_ul_ofdma,
            ul_psdu_size = config.ul_psdu_size,
            packing = packing.name(),
            "OFDMA scheduler initialized"
        );

        Ok(Self::build(config, classifier, packing))
    }

    /// Create a scheduler from a configuration file's contents
    pub fn from_config(config: &OfdmaConfig) -> OfdmaResult<Self> {
        let classifier = StaticClassifier::new(&config.traffic_classes);
        Self::new(config.scheduler.clone(), Arc::new(classifier))
    }

    /// Scheduler with the default configuration and no traffic classes
    pub fn with_defaults() -> Self {
        let config = SchedulerConfig::default();
        let packing = strategy_for(config.packing);
        let classifier = StaticClassifier::new(&TrafficClassTables::default());
        Self::build(config, Arc::new(classifier), packing)
    }

    fn build(
        config: SchedulerConfig,
        classifier: Arc<dyn TrafficClassifier>,
        packing: Arc<dyn PackingStrategy>,
    ) -> Self {
        Self {
            config,
            classifier,
            packing,
            start_station: None,
            tx_format: TxFormat::SingleUser,
            candidates: Vec::new(),
            sta_info: Vec::new(),
            ru_allocation: Vec::new(),
            tx_vector: TxVector::default(),
            tx_params: TxParams::default(),
            dl_ack_sequence: None,
            ul_ack_sequence: None,
        }
    }

    /// Replace the packing strategy chosen by the configuration
    pub fn with_packing_strategy(mut self, packing: Arc<dyn PackingStrategy>) -> Self {
        self.packing = packing;
        self
    }

    /// Decide the format of the transmission opportunity won to send `mpdu`.
    ///
    /// After a DL OFDMA transmission, a UL OFDMA transmission is attempted
    /// first. `Err` is only returned for configuration errors; when nothing
    /// can be sent the result is [`TxFormat::SingleUser`], or an empty
    /// [`TxFormat::DownlinkMultiUser`] if DL OFDMA is forced.
    pub fn select_tx_format<E: WifiEnvironment + ?Sized>(
        &mut self,
        env: &E,
        mpdu: &QueuedFrame,
    ) -> OfdmaResult<TxFormat> {
        let primary_ac = mpdu.tid.access_category();

        if self.config.enable_ul_ofdma && self.tx_format == TxFormat::DownlinkMultiUser {
            if let Some(format) = self.try_ul_ofdma(env, primary_ac)? {
                return Ok(self.commit(format));
            }
        }

        let format = self.try_dl_ofdma(env, mpdu.tid, primary_ac)?;
        Ok(self.commit(format))
    }

    fn commit(&mut self, format: TxFormat) -> TxFormat {
        info!(
            format = %format,
            receivers = self.ru_allocation.len().min(self.candidates.len()),
            "Selected TX format"
        );
        self.tx_format = format;
        format
    }

    /// Solicit a HE TB PPDU from the stations served by the last DL MU PPDU.
    ///
    /// `None` means no station has buffered data and DL should be tried.
    fn try_ul_ofdma<E: WifiEnvironment + ?Sized>(
        &mut self,
        env: &E,
        primary_ac: AccessCategory,
    ) -> OfdmaResult<Option<TxFormat>> {
        if self.config.ul_psdu_size == 0 {
            return Err(OfdmaError::Config(
                "ul_psdu_size must be non-zero when UL OFDMA is enabled".to_string(),
            ));
        }

        let ul_ack_sequence = env.ul_mu_ack_sequence(primary_ac);
        if ul_ack_sequence != UlMuAckSequence::MultiStaBlockAck {
            return Err(OfdmaError::UnsupportedAckSequence(format!(
                "{} for UL MU acknowledgment",
                ul_ack_sequence
            )));
        }
        self.ul_ack_sequence = Some(ul_ack_sequence);

        let stations = env.associated_stations();
        let mut receivers = Vec::with_capacity(self.tx_vector.users.len());
        for aid in self.tx_vector.users.keys() {
            match stations.get(aid) {
                Some(address) => receivers.push(*address),
                None => warn!(
                    aid,
                    "Station may have left the BSS since the last DL MU transmission"
                ),
            }
        }

        let mut params = TxParams::for_ul(ul_ack_sequence);
        for address in &receivers {
            params.enable_block_ack(
                *address,
                BlockAckType::MultiSta {
                    bitmap_len: MULTI_STA_BITMAP_LEN,
                },
            );
        }

        let max_buffer_size = self.max_buffer_size(env, &receivers);
        if max_buffer_size == 0 {
            debug!("No buffered UL data reported, trying DL OFDMA");
            return Ok(None);
        }

        let mut trigger = TriggerFrame::from_tx_vector(TriggerKind::Basic, &self.tx_vector, None);
        let mut max_duration = env.max_ppdu_duration(self.tx_vector.preamble);

        if !env.txop_limit(primary_ac).is_zero() {
            trigger.ul_length = he_tb_lsig_length(UL_PLACEHOLDER_DURATION);
            let response = (env.response_duration(&params, &self.tx_vector, Some(&trigger))
                + env.tx_duration(trigger.serialized_size(), &env.control_tx_vector(), None))
            .saturating_sub(he_tb_duration(trigger.ul_length));

            match env.remaining_txop(primary_ac).checked_sub(response) {
                Some(available) => max_duration = max_duration.min(available),
                None => {
                    debug!(
                        response_us = response.as_micros() as u64,
                        "Remaining TXOP duration is not enough for UL MU exchange"
                    );
                    self.clear_candidates();
                    return Ok(Some(TxFormat::DownlinkMultiUser));
                }
            }
        }

        let first_aid = trigger.first_aid();
        let buffer_tx_time = env.tx_duration(max_buffer_size, &self.tx_vector, first_aid);
        if buffer_tx_time < max_duration {
            max_duration = buffer_tx_time;
        } else {
            let min_duration = env.tx_duration(self.config.ul_psdu_size, &self.tx_vector, first_aid);
            if max_duration < min_duration {
                debug!(
                    available_us = max_duration.as_micros() as u64,
                    "Available time is too short for the UL PSDU"
                );
                self.clear_candidates();
                return Ok(Some(TxFormat::DownlinkMultiUser));
            }
        }

        debug!(
            duration_us = max_duration.as_micros() as u64,
            max_buffer_size, "HE TB PPDU duration"
        );
        self.tx_vector.length = he_tb_lsig_length(max_duration);
        self.tx_params = params;
        Ok(Some(TxFormat::UplinkMultiUser))
    }

    /// Largest UL backlog reported by `receivers`, in bytes
    fn max_buffer_size<E: WifiEnvironment + ?Sized>(
        &self,
        env: &E,
        receivers: &[MacAddress],
    ) -> u32 {
        let mut max_buffer_size = 0u32;
        for address in receivers {
            match BufferStatus::from_code(env.buffer_status(address)) {
                BufferStatus::Unknown => {
                    debug!(%address, "Buffer status is unknown");
                    max_buffer_size = max_buffer_size.max(self.config.ul_psdu_size);
                }
                BufferStatus::Unbounded => {
                    debug!(%address, "Buffer status is not limited");
                    return u32::MAX;
                }
                BufferStatus::Bytes(bytes) => {
                    debug!(%address, bytes, "Buffer status");
                    max_buffer_size = max_buffer_size.max(bytes);
                }
            }
        }
        max_buffer_size
    }

    /// Select and pack the receivers of a DL MU PPDU
    fn try_dl_ofdma<E: WifiEnvironment + ?Sized>(
        &mut self,
        env: &E,
        current_tid: Tid,
        primary_ac: AccessCategory,
    ) -> OfdmaResult<TxFormat> {
        let bandwidth = env.channel_width();
        check_bandwidth(bandwidth)?;

        self.clear_candidates();
        self.tx_vector = TxVector::default();

        let stations = env.associated_stations();
        let Some(start) = self.reset_cursor(&stations) else {
            return Ok(self.no_receivers("No associated stations"));
        };

        // Before selecting, assume the next n_stations stations all have
        // frames to get the duration of the acknowledgment sequence
        let n_stations = usize::from(self.config.n_stations);
        let guess_rus = uniform_allocation(bandwidth, n_stations)?;
        let Some(tentative_ru) = guess_rus.first().copied() else {
            return Ok(self.no_receivers("No RU available"));
        };
        let guess: BTreeMap<MacAddress, PerStaInfo> = stations
            .range(start..)
            .chain(stations.range(..start))
            .take(n_stations)
            .map(|(aid, address)| {
                (
                    *address,
                    PerStaInfo {
                        aid: *aid,
                        tid: current_tid,
                    },
                )
            })
            .collect();

        let ack_sequence = env.dl_mu_ack_sequence(primary_ac);
        self.dl_ack_sequence = Some(ack_sequence);
        let (tx_vector, params) = init_tx_vector_and_params(
            env,
            guess
                .iter()
                .zip(&guess_rus)
                .map(|((address, info), ru)| (address, info, *ru)),
            ack_sequence,
        );

        let mut budget = None;
        if !env.txop_limit(primary_ac).is_zero() {
            let trigger = ack_sequence
                .solicits_with_trigger()
                .then(|| mu_bar_trigger(env, &tx_vector, &params, self.config.max_trigger_mcs));
            let response = env.response_duration(&params, &tx_vector, trigger.as_ref());
            match env.remaining_txop(primary_ac).checked_sub(response) {
                Some(available) => budget = Some(available),
                None => return Ok(self.no_receivers("Not enough TXOP remaining time")),
            }
        }

        let selection = select_stations(
            env,
            &stations,
            &SelectionRequest {
                start,
                primary_ac,
                current_tid,
                max_stations: n_stations,
                tentative_ru,
                budget,
            },
        );
        if selection.candidates.is_empty() {
            return Ok(self.no_receivers("No suitable frames to transmit"));
        }

        let packing = self
            .packing
            .pack(&selection.candidates, bandwidth, self.classifier.as_ref())?;
        debug!(
            strategy = self.packing.name(),
            candidates = packing.order.len(),
            allocations = packing.allocations.len(),
            "Packed DL candidates"
        );

        self.sta_info = selection
            .candidates
            .iter()
            .map(|c| (c.address, c.info))
            .collect();
        self.candidates = packing.order;
        self.ru_allocation = packing.allocations;
        self.start_station = Some(selection.next_station);
        Ok(TxFormat::DownlinkMultiUser)
    }

    /// Point the cursor at an associated station, moving it to the first
    /// one if the station it pointed to left
    fn reset_cursor(&mut self, stations: &BTreeMap<Aid, MacAddress>) -> Option<Aid> {
        match self.start_station {
            Some(aid) if stations.contains_key(&aid) => Some(aid),
            previous => {
                let first = stations.keys().next().copied();
                if let Some(aid) = previous {
                    debug!(aid, first = ?first, "Starting station left, resetting cursor");
                }
                self.start_station = first;
                first
            }
        }
    }

    fn no_receivers(&self, reason: &str) -> TxFormat {
        if self.config.force_dl_ofdma {
            debug!(reason, "Returning DL OFDMA with an empty set of receivers");
            TxFormat::DownlinkMultiUser
        } else {
            debug!(reason, "Returning SU format");
            TxFormat::SingleUser
        }
    }

    fn clear_candidates(&mut self) {
        self.candidates.clear();
        self.sta_info.clear();
        self.ru_allocation.clear();
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Name of the packing strategy in use
    pub fn packing_strategy(&self) -> &'static str {
        self.packing.name()
    }

    /// AID the next DL selection starts from
    pub fn start_station(&self) -> Option<Aid> {
        self.start_station
    }

    /// Format returned by the last decision
    pub fn tx_format(&self) -> TxFormat {
        self.tx_format
    }

    /// Candidates of the last DL decision in RU order
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Candidates of the last DL decision in selection order
    pub fn sta_info(&self) -> &[(MacAddress, PerStaInfo)] {
        &self.sta_info
    }

    pub fn ru_allocation(&self) -> &[RuSpec] {
        &self.ru_allocation
    }

    pub fn tx_vector(&self) -> &TxVector {
        &self.tx_vector
    }

    pub fn tx_params(&self) -> &TxParams {
        &self.tx_params
    }

    pub fn dl_ack_sequence(&self) -> Option<DlMuAckSequence> {
        self.dl_ack_sequence
    }

    pub fn ul_ack_sequence(&self) -> Option<UlMuAckSequence> {
        self.ul_ack_sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::GreedyPacking;
    use rrofdma_core::{PackingPolicy, RuType};
    use rrofdma_sim::{Scenario, SimulatedBss, StationScenario};

    fn bss(n: u16) -> SimulatedBss {
        SimulatedBss::new(Scenario {
            stations: (1..=n)
                .map(|aid| StationScenario::new(aid).with_frame(0, 100))
                .collect(),
            ..Scenario::default()
        })
        .unwrap()
    }

    #[test]
    fn test_new_validates_config() {
        let config = SchedulerConfig {
            n_stations: 0,
            ..SchedulerConfig::default()
        };
        let classifier = Arc::new(StaticClassifier::new(&TrafficClassTables::default()));
        let err = OfdmaScheduler::new(config, classifier).err().unwrap();
        assert!(err.is_config());
    }

    #[test]
    fn test_from_config_selects_strategy() {
        let mut config = OfdmaConfig::default();
        config.scheduler.packing = PackingPolicy::Greedy;
        let scheduler = OfdmaScheduler::from_config(&config).unwrap();
        assert_eq!(scheduler.packing_strategy(), "greedy");
        assert_eq!(OfdmaScheduler::with_defaults().packing_strategy(), "legacy");
    }

    #[test]
    fn test_four_unclassified_stations_get_52_tone_rus() {
        let env = bss(4);
        let mut scheduler = OfdmaScheduler::with_defaults();
        let frame = env.next_frame().unwrap();

        let format = scheduler.select_tx_format(&env, &frame).unwrap();
        assert_eq!(format, TxFormat::DownlinkMultiUser);
        assert_eq!(scheduler.ru_allocation().len(), 4);
        assert!(scheduler
            .ru_allocation()
            .iter()
            .all(|ru| ru.ru_type == RuType::Ru52));
        let indices: Vec<usize> = scheduler.ru_allocation().iter().map(|ru| ru.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
        assert_eq!(scheduler.start_station(), Some(1));
    }

    #[test]
    fn test_no_stations_returns_single_user() {
        let env = bss(0);
        let mut scheduler = OfdmaScheduler::with_defaults();
        let frame = QueuedFrame {
            receiver: MacAddress::from_index(1),
            tid: Tid::new(0).unwrap(),
            size: 100,
        };
        assert_eq!(
            scheduler.select_tx_format(&env, &frame).unwrap(),
            TxFormat::SingleUser
        );
        assert_eq!(scheduler.start_station(), None);
    }

    #[test]
    fn test_sta_info_and_candidates_hold_same_stations() {
        let env = bss(6);
        let mut scheduler = OfdmaScheduler::with_defaults();
        let frame = env.next_frame().unwrap();
        scheduler.select_tx_format(&env, &frame).unwrap();

        let mut selected: Vec<MacAddress> = scheduler.sta_info().iter().map(|(a, _)| *a).collect();
        let mut packed: Vec<MacAddress> = scheduler.candidates().iter().map(|c| c.address).collect();
        selected.sort();
        packed.sort();
        assert_eq!(selected, packed);
    }

    #[test]
    fn test_custom_packing_strategy() {
        let env = bss(3);
        let mut scheduler =
            OfdmaScheduler::with_defaults().with_packing_strategy(Arc::new(GreedyPacking));
        let frame = env.next_frame().unwrap();
        scheduler.select_tx_format(&env, &frame).unwrap();
        // legacy packing would serve 3 stations on two 106-tone RUs
        assert_eq!(scheduler.ru_allocation().len(), 3);
        assert_eq!(scheduler.ru_allocation()[0].ru_type, RuType::Ru106);
    }
}
