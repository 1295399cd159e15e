//! Station identities, traffic identifiers and block-ack types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Association identifier assigned by the AP
pub type Aid = u16;

/// 48-bit MAC address of a station
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Broadcast address
    pub const BROADCAST: MacAddress = MacAddress([0xff; 6]);

    /// Create an address from raw octets
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Address whose low-order octets hold `n`, the way simulators allocate them
    pub fn from_index(n: u64) -> Self {
        let b = n.to_be_bytes();
        Self([b[2], b[3], b[4], b[5], b[6], b[7]])
    }

    /// Raw octets
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in octets.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| format!("MAC address '{}' has fewer than 6 octets", s))?;
            *octet = u8::from_str_radix(part, 16)
                .map_err(|e| format!("Invalid octet '{}' in MAC address '{}': {}", part, s, e))?;
        }
        if parts.next().is_some() {
            return Err(format!("MAC address '{}' has more than 6 octets", s));
        }
        Ok(Self(octets))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MacAddress> for String {
    fn from(addr: MacAddress) -> Self {
        addr.to_string()
    }
}

/// Access category, ordered the way the EDCA queues are indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessCategory {
    /// Best effort
    #[serde(rename = "be")]
    BestEffort,
    /// Background
    #[serde(rename = "bk")]
    Background,
    /// Video
    #[serde(rename = "vi")]
    Video,
    /// Voice
    #[serde(rename = "vo")]
    Voice,
}

impl AccessCategory {
    /// All access categories in queue-index order
    pub const ALL: [AccessCategory; 4] = [
        AccessCategory::BestEffort,
        AccessCategory::Background,
        AccessCategory::Video,
        AccessCategory::Voice,
    ];
}

impl fmt::Display for AccessCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessCategory::BestEffort => write!(f, "AC_BE"),
            AccessCategory::Background => write!(f, "AC_BK"),
            AccessCategory::Video => write!(f, "AC_VI"),
            AccessCategory::Voice => write!(f, "AC_VO"),
        }
    }
}

/// Traffic identifier (0-7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Tid(u8);

impl Tid {
    /// Fallback order used after the TID of the triggering frame
    pub const FALLBACK_ORDER: [u8; 8] = [1, 2, 0, 3, 4, 5, 6, 7];

    /// Create a TID, rejecting values above 7
    pub fn new(value: u8) -> Option<Self> {
        (value <= 7).then_some(Self(value))
    }

    /// Numeric value
    pub fn value(self) -> u8 {
        self.0
    }

    /// Access category serving this TID
    pub fn access_category(self) -> AccessCategory {
        match self.0 {
            1 | 2 => AccessCategory::Background,
            0 | 3 => AccessCategory::BestEffort,
            4 | 5 => AccessCategory::Video,
            _ => AccessCategory::Voice,
        }
    }

    /// TIDs to inspect for a station: `current` first, then the fallback order
    pub fn scan_order(current: Tid) -> impl Iterator<Item = Tid> {
        std::iter::once(current).chain(Self::FALLBACK_ORDER.into_iter().map(Tid))
    }
}

impl TryFrom<u8> for Tid {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Tid::new(value).ok_or_else(|| format!("TID {} out of range 0-7", value))
    }
}

impl From<Tid> for u8 {
    fn from(tid: Tid) -> Self {
        tid.0
    }
}

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Block Ack Request variant negotiated with a station
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockAckReqType {
    Basic,
    #[default]
    Compressed,
    ExtendedCompressed,
    MultiTid,
}

/// Block Ack variant negotiated with a station
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockAckType {
    Basic,
    #[default]
    Compressed,
    ExtendedCompressed,
    MultiTid,
    /// Multi-STA Block Ack carrying a bitmap of the given length per station
    MultiSta { bitmap_len: u16 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_address_roundtrip() {
        let addr: MacAddress = "00:00:00:00:00:0a".parse().unwrap();
        assert_eq!(addr, MacAddress::from_index(10));
        assert_eq!(addr.to_string(), "00:00:00:00:00:0a");
    }

    #[test]
    fn test_mac_address_rejects_garbage() {
        assert!("00:00:00:00:00".parse::<MacAddress>().is_err());
        assert!("00:00:00:00:00:00:00".parse::<MacAddress>().is_err());
        assert!("zz:00:00:00:00:00".parse::<MacAddress>().is_err());
    }

    #[test]
    fn test_tid_to_access_category() {
        let ac: Vec<AccessCategory> = (0..8)
            .map(|t| Tid::new(t).unwrap().access_category())
            .collect();
        assert_eq!(
            ac,
            vec![
                AccessCategory::BestEffort,
                AccessCategory::Background,
                AccessCategory::Background,
                AccessCategory::BestEffort,
                AccessCategory::Video,
                AccessCategory::Video,
                AccessCategory::Voice,
                AccessCategory::Voice,
            ]
        );
        assert!(Tid::new(8).is_none());
    }

    #[test]
    fn test_scan_order_starts_with_current() {
        let order: Vec<u8> = Tid::scan_order(Tid::new(5).unwrap())
            .map(Tid::value)
            .collect();
        assert_eq!(order, vec![5, 1, 2, 0, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_access_category_ordering() {
        assert!(AccessCategory::Background > AccessCategory::BestEffort);
        assert!(AccessCategory::Voice > AccessCategory::Video);
    }
}
