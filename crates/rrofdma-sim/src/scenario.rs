//! Scenario files describing a simulated BSS

use rrofdma_core::{
    AccessCategory, Aid, DlMuAckSequence, MacAddress, OfdmaError, OfdmaResult, UlMuAckSequence,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A BSS with its channel, TXOP state and associated stations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Channel width in MHz
    pub channel_width: u16,
    /// Guard interval in nanoseconds
    pub guard_interval_ns: u16,
    /// Default TX power level of the AP
    pub tx_power_level: u8,
    /// Longest PPDU, in microseconds
    pub max_ppdu_duration_us: u64,
    /// Ack sequence used after DL MU PPDUs
    pub dl_ack_sequence: DlMuAckSequence,
    /// Ack sequence used after HE TB PPDUs
    pub ul_ack_sequence: UlMuAckSequence,
    /// Access categories holding a TXOP
    pub txop: Vec<TxopScenario>,
    /// SIFS plus acknowledgment time of a response exchange, in microseconds
    pub response_us: u64,
    /// Duration of the HE TB PPDU carrying solicited Block Acks, in microseconds
    pub block_ack_tb_us: u64,
    pub stations: Vec<StationScenario>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            channel_width: 20,
            guard_interval_ns: 800,
            tx_power_level: 1,
            max_ppdu_duration_us: 5484,
            dl_ack_sequence: DlMuAckSequence::SuFormat,
            ul_ack_sequence: UlMuAckSequence::MultiStaBlockAck,
            txop: Vec::new(),
            response_us: 100,
            block_ack_tb_us: 100,
            stations: Vec::new(),
        }
    }
}

impl Scenario {
    /// Load a scenario from a TOML file
    pub fn from_file(path: &Path) -> OfdmaResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            OfdmaError::Scenario(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse a scenario from TOML text
    pub fn from_toml(content: &str) -> OfdmaResult<Self> {
        toml::from_str(content)
            .map_err(|e| OfdmaError::Scenario(format!("Failed to parse scenario: {}", e)))
    }
}

/// TXOP held by an access category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxopScenario {
    pub ac: AccessCategory,
    /// TXOP limit in microseconds
    pub limit_us: u64,
    /// Time left in the current TXOP, in microseconds
    pub remaining_us: u64,
}

/// Frame queued at the AP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameScenario {
    pub tid: u8,
    /// Size in bytes
    pub size: u32,
}

/// An associated station
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationScenario {
    pub aid: Aid,
    /// Defaults to an address derived from the AID
    #[serde(default)]
    pub address: Option<MacAddress>,
    /// TIDs with an established Block Ack agreement
    #[serde(default = "default_ba_tids")]
    pub ba_tids: Vec<u8>,
    /// Frames queued for the station, in order
    #[serde(default)]
    pub frames: Vec<FrameScenario>,
    /// Last reported queue-size code
    #[serde(default = "default_buffer_status")]
    pub buffer_status: u8,
    #[serde(default = "default_mcs")]
    pub mcs: u8,
    #[serde(default = "default_nss")]
    pub nss: u8,
}

fn default_ba_tids() -> Vec<u8> {
    vec![0]
}

fn default_buffer_status() -> u8 {
    255
}

fn default_mcs() -> u8 {
    7
}

fn default_nss() -> u8 {
    1
}

impl StationScenario {
    /// Station with a BA agreement for TID 0 and nothing queued
    pub fn new(aid: Aid) -> Self {
        Self {
            aid,
            address: None,
            ba_tids: default_ba_tids(),
            frames: Vec::new(),
            buffer_status: default_buffer_status(),
            mcs: default_mcs(),
            nss: default_nss(),
        }
    }

    /// Queue a frame of `size` bytes with `tid`
    pub fn with_frame(mut self, tid: u8, size: u32) -> Self {
        self.frames.push(FrameScenario { tid, size });
        self
    }

    pub fn with_address(mut self, address: MacAddress) -> Self {
        self.address = Some(address);
        self
    }

    pub fn with_buffer_status(mut self, code: u8) -> Self {
        self.buffer_status = code;
        self
    }

    /// Address of the station
    pub fn mac_address(&self) -> MacAddress {
        self.address
            .unwrap_or_else(|| MacAddress::from_index(u64::from(self.aid)))
    }
}
