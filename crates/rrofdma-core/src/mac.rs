//! Traits for the MAC/PHY collaborators queried by the scheduler
//!
//! All calls are synchronous and must not change state visible to the
//! scheduler while a decision is in progress.

use crate::tx::{DlMuAckSequence, Preamble, TriggerFrame, TxParams, TxVector, UlMuAckSequence, WifiMode};
use crate::wifi::{AccessCategory, Aid, BlockAckReqType, BlockAckType, MacAddress, Tid};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Largest PSDU a HE PPDU can carry, in bytes
pub const HE_MAX_PSDU_SIZE: u32 = 6_500_631;

/// Head-of-line frame queued for a station
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedFrame {
    pub receiver: MacAddress,
    pub tid: Tid,
    /// Packet size in bytes
    pub size: u32,
}

/// Buffer status reported by a station
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferStatus {
    /// Code 255: the station did not report
    Unknown,
    /// Code 254: more data than can be expressed
    Unbounded,
    /// Any other code, in bytes
    Bytes(u32),
}

impl BufferStatus {
    pub const UNKNOWN_CODE: u8 = 255;
    pub const UNBOUNDED_CODE: u8 = 254;
    /// Bytes represented by one unit of a buffer-status code
    pub const UNIT: u32 = 256;

    /// Decode a queue-size code
    pub fn from_code(code: u8) -> Self {
        match code {
            Self::UNKNOWN_CODE => BufferStatus::Unknown,
            Self::UNBOUNDED_CODE => BufferStatus::Unbounded,
            v => BufferStatus::Bytes(u32::from(v) * Self::UNIT),
        }
    }
}

/// PHY timing and channel facts
pub trait Phy {
    /// Operating channel width in MHz
    fn channel_width(&self) -> u16;

    fn guard_interval(&self) -> Duration;

    /// Longest PPDU allowed for the preamble
    fn max_ppdu_duration(&self, preamble: Preamble) -> Duration;

    /// Time to transmit `bytes` with `tx_vector`; for MU vectors `sta_id`
    /// selects the user whose RU and rate apply
    fn tx_duration(&self, bytes: u32, tx_vector: &TxVector, sta_id: Option<Aid>) -> Duration;
}

/// EDCA queues, block-ack agreements and acknowledgment timing
pub trait MacLayer {
    /// First frame queued for `station` with `tid`
    fn peek_next_frame(&self, tid: Tid, station: &MacAddress) -> Option<QueuedFrame>;

    fn ba_agreement_established(&self, station: &MacAddress, tid: Tid) -> bool;

    fn block_ack_req_type(&self, station: &MacAddress, tid: Tid) -> BlockAckReqType;

    fn block_ack_type(&self, station: &MacAddress, tid: Tid) -> BlockAckType;

    /// TXOP limit of the access category; zero when it does not hold TXOPs
    fn txop_limit(&self, ac: AccessCategory) -> Duration;

    /// Time left in the TXOP currently held by the access category
    fn remaining_txop(&self, ac: AccessCategory) -> Duration;

    /// Ack sequence the ack policy selects for DL MU PPDUs
    fn dl_mu_ack_sequence(&self, ac: AccessCategory) -> DlMuAckSequence;

    /// Ack sequence the ack policy selects for TB PPDUs
    fn ul_mu_ack_sequence(&self, ac: AccessCategory) -> UlMuAckSequence;

    /// Duration of the response exchange following a PPDU sent with the
    /// given parameters, including the solicitation `trigger` if any
    fn response_duration(
        &self,
        params: &TxParams,
        tx_vector: &TxVector,
        trigger: Option<&TriggerFrame>,
    ) -> Duration;

    /// L-SIG length of the TB PPDU carrying the Block Acks solicited by `trigger`
    fn ul_length_for_block_acks(&self, trigger: &TriggerFrame, params: &TxParams) -> u16;
}

/// Association table and per-station transmit state
pub trait StationManager {
    /// Associated stations ordered by AID
    fn associated_stations(&self) -> BTreeMap<Aid, MacAddress>;

    /// Latest queue-size code reported by `station`
    fn buffer_status(&self, station: &MacAddress) -> u8;

    fn default_tx_power_level(&self) -> u8;

    /// Mode used for data frames sent to `station`
    fn data_mode(&self, station: &MacAddress) -> WifiMode;

    /// Vector used for control frames such as trigger frames
    fn control_tx_vector(&self) -> TxVector;
}

/// Everything the scheduler needs from the MAC/PHY layer
pub trait WifiEnvironment: Phy + MacLayer + StationManager {}

impl<T: Phy + MacLayer + StationManager + ?Sized> WifiEnvironment for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_status_codes() {
        assert_eq!(BufferStatus::from_code(255), BufferStatus::Unknown);
        assert_eq!(BufferStatus::from_code(254), BufferStatus::Unbounded);
        assert_eq!(BufferStatus::from_code(0), BufferStatus::Bytes(0));
        assert_eq!(BufferStatus::from_code(10), BufferStatus::Bytes(2560));
        assert_eq!(BufferStatus::from_code(253), BufferStatus::Bytes(253 * 256));
    }
}
