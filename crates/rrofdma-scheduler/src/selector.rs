//! Round-robin selection of the DL MU receivers

use rrofdma_core::{
    AccessCategory, Aid, HeMuUserInfo, MacAddress, PerStaInfo, Preamble, RuSpec, Tid,
    WifiEnvironment, HE_MAX_PSDU_SIZE,
};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use crate::finalizer::he_mu_tx_vector;
use crate::packer::Candidate;

/// Parameters of one selection round
#[derive(Debug, Clone, Copy)]
pub struct SelectionRequest {
    /// AID the walk starts from; must be in the station table
    pub start: Aid,
    /// Access category of the frame that triggered the decision
    pub primary_ac: AccessCategory,
    /// TID inspected first for every station
    pub current_tid: Tid,
    /// Maximum number of candidates
    pub max_stations: usize,
    /// RU tentatively assigned to a candidate to time its frame
    pub tentative_ru: RuSpec,
    /// Time available for the DL MU PPDU when a TXOP is held
    pub budget: Option<Duration>,
}

/// Outcome of a selection round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub candidates: Vec<Candidate>,
    /// Station the next round should start from
    pub next_station: Aid,
}

/// Walk the station table circularly from `request.start` and pick up to
/// `request.max_stations` stations with a frame ready for a DL MU PPDU.
pub fn select_stations<E: WifiEnvironment + ?Sized>(
    env: &E,
    stations: &BTreeMap<Aid, MacAddress>,
    request: &SelectionRequest,
) -> Selection {
    let ring: Vec<(Aid, MacAddress)> = stations
        .range(request.start..)
        .chain(stations.range(..request.start))
        .map(|(aid, address)| (*aid, *address))
        .collect();

    let mut selection = Selection {
        candidates: Vec::new(),
        next_station: request.start,
    };
    if request.max_stations == 0 {
        return selection;
    }

    for (position, &(aid, address)) in ring.iter().enumerate() {
        debug!(aid, %address, "Next candidate station");
        if let Some(candidate) = eligible_frame(env, aid, &address, request) {
            selection.candidates.push(candidate);
        }
        if selection.candidates.len() == request.max_stations {
            selection.next_station = ring
                .get(position + 1)
                .map_or(request.start, |(aid, _)| *aid);
            break;
        }
    }

    selection
}

/// First TID, in scan order, whose head-of-line frame for `address` can be
/// sent in the DL MU PPDU
fn eligible_frame<E: WifiEnvironment + ?Sized>(
    env: &E,
    aid: Aid,
    address: &MacAddress,
    request: &SelectionRequest,
) -> Option<Candidate> {
    for tid in Tid::scan_order(request.current_tid) {
        if tid.access_category() < request.primary_ac
            || !env.ba_agreement_established(address, tid)
        {
            continue;
        }

        let Some(frame) = env.peek_next_frame(tid, address) else {
            debug!(%address, tid = tid.value(), "No frames to send");
            continue;
        };

        if within_size_and_time_limits(env, aid, address, frame.size, request) {
            debug!(aid, %address, tid = tid.value(), size = frame.size, "Adding candidate station");
            return Some(Candidate {
                address: *address,
                size: frame.size,
                info: PerStaInfo { aid, tid },
            });
        }
    }
    None
}

/// Whether a frame of `size` bytes for `address` alone on the tentative RU
/// fits a HE MU PPDU and the remaining budget
fn within_size_and_time_limits<E: WifiEnvironment + ?Sized>(
    env: &E,
    aid: Aid,
    address: &MacAddress,
    size: u32,
    request: &SelectionRequest,
) -> bool {
    if size > HE_MAX_PSDU_SIZE {
        return false;
    }

    let mode = env.data_mode(address);
    let mut tx_vector = he_mu_tx_vector(env);
    tx_vector.set_user(
        aid,
        HeMuUserInfo {
            ru: request.tentative_ru,
            mcs: mode.mcs,
            nss: mode.nss,
        },
    );

    let duration = env.tx_duration(size, &tx_vector, Some(aid));
    if duration > env.max_ppdu_duration(Preamble::HeMu) {
        return false;
    }
    // a zero budget means the TXOP sets no limit
    request
        .budget
        .filter(|budget| !budget.is_zero())
        .map_or(true, |budget| duration <= budget)
}
