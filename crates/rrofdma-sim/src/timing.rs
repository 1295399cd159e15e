//! HE PPDU timing model
//!
//! Durations are `preamble + symbols × (12.8 µs + GI)` for HE PPDUs and
//! `20 µs + symbols × 4 µs` for non-HT PPDUs, with 22 service and tail bits
//! added to the payload.

use rrofdma_core::{Preamble, RuType};
use std::time::Duration;

/// HE OFDM symbol duration without guard interval
const HE_SYMBOL_NS: u64 = 12_800;
/// Non-HT OFDM symbol duration, guard interval included
const NON_HT_SYMBOL_NS: u64 = 4_000;
const SERVICE_AND_TAIL_BITS: u64 = 22;
/// Non-HT rates in Mb/s, indexed by MCS
const NON_HT_RATES_MBPS: [u64; 8] = [6, 9, 12, 18, 24, 36, 48, 54];

/// Data subcarriers of an RU
pub fn data_tones(ru_type: RuType) -> u64 {
    match ru_type {
        RuType::Ru26 => 24,
        RuType::Ru52 => 48,
        RuType::Ru106 => 102,
        RuType::Ru242 => 234,
        RuType::Ru484 => 468,
        RuType::Ru996 => 980,
        RuType::Ru2x996 => 1960,
    }
}

/// Coded bits per subcarrier and coding rate `(bits, numerator, denominator)`
fn he_mcs(mcs: u8) -> (u64, u64, u64) {
    match mcs {
        0 => (1, 1, 2),
        1 => (2, 1, 2),
        2 => (2, 3, 4),
        3 => (4, 1, 2),
        4 => (4, 3, 4),
        5 => (6, 2, 3),
        6 => (6, 3, 4),
        7 => (6, 5, 6),
        8 => (8, 3, 4),
        9 => (8, 5, 6),
        10 => (10, 3, 4),
        _ => (10, 5, 6),
    }
}

/// Preamble and training fields
pub fn preamble_duration(preamble: Preamble) -> Duration {
    match preamble {
        Preamble::NonHt => Duration::from_micros(20),
        Preamble::HeSu => Duration::from_micros(36),
        Preamble::HeMu | Preamble::HeTb => Duration::from_micros(40),
    }
}

fn payload_bits(bytes: u32) -> u64 {
    8 * u64::from(bytes) + SERVICE_AND_TAIL_BITS
}

/// Duration of a HE PPDU carrying `bytes` on `ru_type`
pub fn he_duration(
    bytes: u32,
    preamble: Preamble,
    ru_type: RuType,
    mcs: u8,
    nss: u8,
    guard_interval_ns: u16,
) -> Duration {
    let (bits, num, den) = he_mcs(mcs);
    let bits_per_symbol =
        (data_tones(ru_type) * bits * u64::from(nss.max(1)) * num / den).max(1);
    let symbols = payload_bits(bytes).div_ceil(bits_per_symbol);
    let symbol_ns = HE_SYMBOL_NS + u64::from(guard_interval_ns);
    preamble_duration(preamble) + Duration::from_nanos(symbols * symbol_ns)
}

/// Duration of a non-HT PPDU carrying `bytes` at the rate of `mcs`
pub fn non_ht_duration(bytes: u32, mcs: u8) -> Duration {
    let rate = NON_HT_RATES_MBPS[usize::from(mcs).min(NON_HT_RATES_MBPS.len() - 1)];
    let bits_per_symbol = rate * NON_HT_SYMBOL_NS / 1_000;
    let symbols = payload_bits(bytes).div_ceil(bits_per_symbol);
    preamble_duration(Preamble::NonHt) + Duration::from_nanos(symbols * NON_HT_SYMBOL_NS)
}
