//! Turning a scheduling decision into the information handed to the MAC

use rrofdma_core::{
    BlockAckReqType, BlockAckType, DlMuAckSequence, DlOfdmaInfo, HeMuUserInfo, MacAddress,
    PerStaInfo, Preamble, RuSpec, TriggerFrame, TriggerKind, TxParams, TxVector, UlOfdmaInfo,
    WifiEnvironment,
};
use tracing::debug;

use crate::scheduler::OfdmaScheduler;

/// An empty HE MU TX vector for the operating channel
pub fn he_mu_tx_vector<E: WifiEnvironment + ?Sized>(env: &E) -> TxVector {
    let guard_interval_ns = u16::try_from(env.guard_interval().as_nanos()).unwrap_or(u16::MAX);
    TxVector {
        preamble: Preamble::HeMu,
        channel_width: env.channel_width(),
        guard_interval_ns,
        tx_power_level: env.default_tx_power_level(),
        ..TxVector::default()
    }
}

/// Build the HE MU TX vector and the TX params for `receivers`, each served
/// on the RU paired with it
pub fn init_tx_vector_and_params<'a, E, I>(
    env: &E,
    receivers: I,
    ack_sequence: DlMuAckSequence,
) -> (TxVector, TxParams)
where
    E: WifiEnvironment + ?Sized,
    I: IntoIterator<Item = (&'a MacAddress, &'a PerStaInfo, RuSpec)>,
{
    let mut tx_vector = he_mu_tx_vector(env);
    let mut params = TxParams::for_dl(ack_sequence);

    for (address, info, ru) in receivers {
        let mode = env.data_mode(address);
        tx_vector.set_user(
            info.aid,
            HeMuUserInfo {
                ru,
                mcs: mode.mcs,
                nss: mode.nss,
            },
        );

        let (bar, ba) = if env.ba_agreement_established(address, info.tid) {
            (
                env.block_ack_req_type(address, info.tid),
                env.block_ack_type(address, info.tid),
            )
        } else {
            (BlockAckReqType::Compressed, BlockAckType::Compressed)
        };

        match ack_sequence {
            DlMuAckSequence::SuFormat | DlMuAckSequence::MuBar => {
                params.enable_block_ack_request(*address, bar, ba)
            }
            DlMuAckSequence::AggregateTf => params.enable_block_ack(*address, ba),
        }
    }

    (tx_vector, params)
}

/// MU-BAR soliciting the Block Acks of the users of `tx_vector`
pub fn mu_bar_trigger<E: WifiEnvironment + ?Sized>(
    env: &E,
    tx_vector: &TxVector,
    params: &TxParams,
    max_mcs: u8,
) -> TriggerFrame {
    let mut trigger = TriggerFrame::from_tx_vector(TriggerKind::MuBar, tx_vector, Some(max_mcs));
    trigger.ul_length = env.ul_length_for_block_acks(&trigger, params);
    trigger
}

impl OfdmaScheduler {
    /// Assign RUs to the candidates picked by the last DL decision.
    ///
    /// Candidates without an RU are not served; the next decision starts
    /// from the first of them.
    pub fn compute_dl_ofdma_info<E: WifiEnvironment + ?Sized>(&mut self, env: &E) -> DlOfdmaInfo {
        if self.sta_info.is_empty() {
            return DlOfdmaInfo::default();
        }
        let Some(ack_sequence) = self.dl_ack_sequence else {
            return DlOfdmaInfo::default();
        };

        let served = self.ru_allocation.len().min(self.candidates.len());
        if let Some(first_unserved) = self.candidates.get(served) {
            self.start_station = Some(first_unserved.info.aid);
            debug!(
                aid = first_unserved.info.aid,
                served,
                candidates = self.candidates.len(),
                "Next station to serve"
            );
        }

        let receivers = &self.candidates[..served];
        let (tx_vector, params) = init_tx_vector_and_params(
            env,
            receivers
                .iter()
                .zip(&self.ru_allocation)
                .map(|(c, ru)| (&c.address, &c.info, *ru)),
            ack_sequence,
        );

        let mut info = DlOfdmaInfo {
            sta_info: receivers.iter().map(|c| (c.address, c.info)).collect(),
            ru_map: receivers
                .iter()
                .zip(&self.ru_allocation)
                .map(|(c, ru)| (c.info.aid, *ru))
                .collect(),
            params: params.clone(),
            tx_vector: tx_vector.clone(),
            trigger: None,
        };

        if ack_sequence.solicits_with_trigger() {
            let mut trigger = mu_bar_trigger(env, &tx_vector, &params, self.config.max_trigger_mcs);
            trigger.set_target_rssi(env.default_tx_power_level(), self.config.ul_target_rssi());
            info.trigger = Some(trigger);
        }

        for (aid, ru) in &info.ru_map {
            debug!(aid, ru = %ru, "RU assigned");
        }

        self.tx_vector = tx_vector;
        self.tx_params = params;
        info
    }

    /// Basic trigger soliciting the HE TB PPDU granted by the last UL decision
    pub fn compute_ul_ofdma_info<E: WifiEnvironment + ?Sized>(&self, env: &E) -> UlOfdmaInfo {
        let mut trigger = TriggerFrame::from_tx_vector(TriggerKind::Basic, &self.tx_vector, None);
        trigger.ul_length = self.tx_vector.length;
        trigger.set_target_rssi(env.default_tx_power_level(), self.config.ul_target_rssi());

        UlOfdmaInfo {
            params: self.tx_params.clone(),
            trigger,
        }
    }
}
