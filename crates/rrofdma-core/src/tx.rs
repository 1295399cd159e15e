//! TX vectors, TX parameters, trigger frames and scheduling outputs

use crate::ru::RuSpec;
use crate::wifi::{Aid, BlockAckReqType, BlockAckType, MacAddress, Tid};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Format chosen for a transmission opportunity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TxFormat {
    /// Legacy single-user transmission
    #[default]
    SingleUser,
    /// DL OFDMA transmission
    DownlinkMultiUser,
    /// Trigger-based UL OFDMA transmission
    UplinkMultiUser,
}

impl fmt::Display for TxFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxFormat::SingleUser => write!(f, "SU"),
            TxFormat::DownlinkMultiUser => write!(f, "DL_OFDMA"),
            TxFormat::UplinkMultiUser => write!(f, "UL_OFDMA"),
        }
    }
}

/// Acknowledgment sequence following a DL MU PPDU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DlMuAckSequence {
    /// BAR/BA exchanged with each station in SU format
    SuFormat,
    /// MU-BAR trigger frame soliciting BAs in a TB PPDU
    MuBar,
    /// MU-BAR aggregated to the DL MU PPDU
    AggregateTf,
}

impl DlMuAckSequence {
    /// Whether the sequence needs a trigger frame to solicit the acks
    pub fn solicits_with_trigger(self) -> bool {
        matches!(self, DlMuAckSequence::MuBar | DlMuAckSequence::AggregateTf)
    }
}

/// Acknowledgment sequence following a TB PPDU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UlMuAckSequence {
    /// A single Multi-STA Block Ack
    MultiStaBlockAck,
    /// Block Acks carried in a DL MU PPDU
    BlockAcksInDlMu,
}

impl fmt::Display for UlMuAckSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UlMuAckSequence::MultiStaBlockAck => write!(f, "multi-STA block ack"),
            UlMuAckSequence::BlockAcksInDlMu => write!(f, "block acks in DL MU PPDU"),
        }
    }
}

/// PPDU preamble
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preamble {
    NonHt,
    HeSu,
    #[default]
    HeMu,
    HeTb,
}

/// Modulation and spatial streams used towards a station
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiMode {
    /// HE MCS index
    pub mcs: u8,
    /// Number of spatial streams
    pub nss: u8,
}

/// Per-user information of a HE MU TX vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeMuUserInfo {
    pub ru: RuSpec,
    pub mcs: u8,
    pub nss: u8,
}

/// Parameters describing how a PPDU is sent
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TxVector {
    pub preamble: Preamble,
    /// Channel width in MHz
    pub channel_width: u16,
    /// Guard interval in nanoseconds
    pub guard_interval_ns: u16,
    pub tx_power_level: u8,
    /// Mode of a single-user or control transmission
    pub mode: Option<WifiMode>,
    /// Users of a HE MU PPDU, keyed by AID
    pub users: BTreeMap<Aid, HeMuUserInfo>,
    /// L-SIG length of a solicited HE TB PPDU
    pub length: u16,
}

impl TxVector {
    /// Non-HT vector for control frames
    pub fn non_ht(channel_width: u16, mode: WifiMode) -> Self {
        Self {
            preamble: Preamble::NonHt,
            channel_width,
            mode: Some(mode),
            ..Self::default()
        }
    }

    /// Add or replace the user info of `aid`
    pub fn set_user(&mut self, aid: Aid, info: HeMuUserInfo) {
        self.users.insert(aid, info);
    }

    /// RU assigned to `aid`, if any
    pub fn ru_of(&self, aid: Aid) -> Option<RuSpec> {
        self.users.get(&aid).map(|u| u.ru)
    }
}

/// Acknowledgment solicited from one receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AckRequest {
    /// A Block Ack Request is sent and a Block Ack expected
    BlockAckRequest { bar: BlockAckReqType, ba: BlockAckType },
    /// A Block Ack is expected without a preceding request
    BlockAck { ba: BlockAckType },
}

/// MAC-level transmission parameters handed to the MAC layer
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TxParams {
    pub dl_ack_sequence: Option<DlMuAckSequence>,
    pub ul_ack_sequence: Option<UlMuAckSequence>,
    /// Acknowledgment expected from each receiver
    pub acks: BTreeMap<MacAddress, AckRequest>,
}

impl TxParams {
    pub fn for_dl(sequence: DlMuAckSequence) -> Self {
        Self {
            dl_ack_sequence: Some(sequence),
            ..Self::default()
        }
    }

    pub fn for_ul(sequence: UlMuAckSequence) -> Self {
        Self {
            ul_ack_sequence: Some(sequence),
            ..Self::default()
        }
    }

    pub fn enable_block_ack_request(
        &mut self,
        address: MacAddress,
        bar: BlockAckReqType,
        ba: BlockAckType,
    ) {
        self.acks
            .insert(address, AckRequest::BlockAckRequest { bar, ba });
    }

    pub fn enable_block_ack(&mut self, address: MacAddress, ba: BlockAckType) {
        self.acks.insert(address, AckRequest::BlockAck { ba });
    }
}

/// Trigger frame variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerKind {
    /// Solicits data in HE TB PPDUs
    Basic,
    /// Solicits Block Acks in HE TB PPDUs
    MuBar,
}

/// Target RSSI requested from the solicited stations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UlTargetRssi {
    /// Stations transmit at their maximum power
    #[default]
    MaxTxPower,
    /// Expected receive power at the AP, in dBm
    Dbm(i8),
}

/// User Info field of a trigger frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerUserInfo {
    pub aid: Aid,
    pub ru: RuSpec,
    pub mcs: u8,
    pub nss: u8,
    pub ul_target_rssi: UlTargetRssi,
}

/// A trigger frame as described to the MAC layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerFrame {
    pub kind: TriggerKind,
    pub channel_width: u16,
    /// L-SIG length of the solicited HE TB PPDU
    pub ul_length: u16,
    pub ap_tx_power_level: u8,
    pub users: Vec<TriggerUserInfo>,
}

impl TriggerFrame {
    const MAC_HEADER_SIZE: u32 = 16;
    const COMMON_INFO_SIZE: u32 = 8;
    const USER_INFO_SIZE: u32 = 5;
    const FCS_SIZE: u32 = 4;

    /// Build a trigger soliciting the users of `tx_vector` on the same RUs,
    /// capping their MCS at `max_mcs`
    pub fn from_tx_vector(kind: TriggerKind, tx_vector: &TxVector, max_mcs: Option<u8>) -> Self {
        let users = tx_vector
            .users
            .iter()
            .map(|(aid, info)| TriggerUserInfo {
                aid: *aid,
                ru: info.ru,
                mcs: max_mcs.map_or(info.mcs, |cap| info.mcs.min(cap)),
                nss: info.nss,
                ul_target_rssi: UlTargetRssi::default(),
            })
            .collect();

        Self {
            kind,
            channel_width: tx_vector.channel_width,
            ul_length: tx_vector.length,
            ap_tx_power_level: tx_vector.tx_power_level,
            users,
        }
    }

    /// AID of the first solicited user
    pub fn first_aid(&self) -> Option<Aid> {
        self.users.first().map(|u| u.aid)
    }

    /// Apply the power-control hint to every user
    pub fn set_target_rssi(&mut self, ap_tx_power_level: u8, target: UlTargetRssi) {
        self.ap_tx_power_level = ap_tx_power_level;
        for user in &mut self.users {
            user.ul_target_rssi = target;
        }
    }

    /// Size in bytes of the frame including MAC header and FCS
    pub fn serialized_size(&self) -> u32 {
        let per_user = match self.kind {
            TriggerKind::Basic => Self::USER_INFO_SIZE + 1,
            TriggerKind::MuBar => Self::USER_INFO_SIZE,
        };
        Self::MAC_HEADER_SIZE
            + Self::COMMON_INFO_SIZE
            + per_user * self.users.len() as u32
            + Self::FCS_SIZE
    }
}

const LEGACY_PREAMBLE: Duration = Duration::from_micros(20);
const SYMBOL_DURATION_NS: u128 = 4_000;

/// L-SIG length announcing a HE TB PPDU of the given duration
pub fn he_tb_lsig_length(duration: Duration) -> u16 {
    let payload = duration.saturating_sub(LEGACY_PREAMBLE).as_nanos();
    let symbols = payload.div_ceil(SYMBOL_DURATION_NS);
    let length = (symbols * 3).saturating_sub(5);
    u16::try_from(length).unwrap_or(u16::MAX)
}

/// Duration of a HE TB PPDU announced with the given L-SIG length
pub fn he_tb_duration(lsig_length: u16) -> Duration {
    let symbols = (u64::from(lsig_length) + 5).div_ceil(3);
    LEGACY_PREAMBLE + Duration::from_nanos(symbols * SYMBOL_DURATION_NS as u64)
}

/// Per-station information of a DL MU receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerStaInfo {
    pub aid: Aid,
    pub tid: Tid,
}

/// Information needed to transmit a DL MU PPDU
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DlOfdmaInfo {
    /// Receivers of the DL MU PPDU
    pub sta_info: BTreeMap<MacAddress, PerStaInfo>,
    /// RU assigned to each receiver, keyed by AID
    pub ru_map: BTreeMap<Aid, RuSpec>,
    pub params: TxParams,
    pub tx_vector: TxVector,
    /// MU-BAR soliciting the acknowledgments, if the ack sequence needs one
    pub trigger: Option<TriggerFrame>,
}

impl DlOfdmaInfo {
    pub fn is_empty(&self) -> bool {
        self.sta_info.is_empty()
    }
}

/// Information needed to solicit a UL MU PPDU
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UlOfdmaInfo {
    pub params: TxParams,
    pub trigger: TriggerFrame,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ru::RuType;

    fn mu_vector() -> TxVector {
        let mut v = TxVector {
            channel_width: 20,
            tx_power_level: 3,
            ..TxVector::default()
        };
        v.set_user(
            1,
            HeMuUserInfo {
                ru: RuSpec::primary(RuType::Ru106, 1),
                mcs: 9,
                nss: 2,
            },
        );
        v.set_user(
            2,
            HeMuUserInfo {
                ru: RuSpec::primary(RuType::Ru106, 2),
                mcs: 3,
                nss: 1,
            },
        );
        v
    }

    #[test]
    fn test_trigger_caps_mcs() {
        let trigger = TriggerFrame::from_tx_vector(TriggerKind::MuBar, &mu_vector(), Some(5));
        let mcs: Vec<u8> = trigger.users.iter().map(|u| u.mcs).collect();
        assert_eq!(mcs, vec![5, 3]);
        assert_eq!(trigger.first_aid(), Some(1));
        assert_eq!(trigger.users[1].ru, RuSpec::primary(RuType::Ru106, 2));
    }

    #[test]
    fn test_trigger_size() {
        let mu_bar = TriggerFrame::from_tx_vector(TriggerKind::MuBar, &mu_vector(), None);
        assert_eq!(mu_bar.serialized_size(), 16 + 8 + 2 * 5 + 4);
        let basic = TriggerFrame::from_tx_vector(TriggerKind::Basic, &mu_vector(), None);
        assert_eq!(basic.serialized_size(), 16 + 8 + 2 * 6 + 4);
    }

    #[test]
    fn test_target_rssi_applies_to_all_users() {
        let mut trigger = TriggerFrame::from_tx_vector(TriggerKind::Basic, &mu_vector(), None);
        trigger.set_target_rssi(7, UlTargetRssi::Dbm(-70));
        assert_eq!(trigger.ap_tx_power_level, 7);
        assert!(trigger
            .users
            .iter()
            .all(|u| u.ul_target_rssi == UlTargetRssi::Dbm(-70)));
    }

    #[test]
    fn test_lsig_length() {
        // 1 ms: (1000 - 20) / 4 = 245 symbols -> 245 * 3 - 5
        assert_eq!(he_tb_lsig_length(Duration::from_millis(1)), 730);
        assert_eq!(he_tb_duration(730), Duration::from_millis(1));
        assert_eq!(he_tb_lsig_length(Duration::from_micros(10)), 0);
    }

    #[test]
    fn test_ack_sequence_trigger() {
        assert!(DlMuAckSequence::MuBar.solicits_with_trigger());
        assert!(DlMuAckSequence::AggregateTf.solicits_with_trigger());
        assert!(!DlMuAckSequence::SuFormat.solicits_with_trigger());
    }

    #[test]
    fn test_tx_params_acks() {
        let mut params = TxParams::for_dl(DlMuAckSequence::SuFormat);
        let addr = MacAddress::from_index(1);
        params.enable_block_ack_request(addr, BlockAckReqType::Compressed, BlockAckType::Compressed);
        params.enable_block_ack(addr, BlockAckType::Compressed);
        assert_eq!(
            params.acks.get(&addr),
            Some(&AckRequest::BlockAck {
                ba: BlockAckType::Compressed
            })
        );
    }
}
