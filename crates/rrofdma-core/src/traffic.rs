//! Traffic classes and the classifier injected into the scheduler

use crate::wifi::MacAddress;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Traffic class of a DL candidate, driving the RU packing rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficClass {
    /// Class 1: short bursts, served with 26-tone RUs
    Bursty,
    /// Class 2: bulk transfers, served with 106/52-tone RUs
    Bulk,
    /// Class 3: request/response traffic filling the leftover 26-tone RUs
    Web,
}

impl TrafficClass {
    /// Class assumed for stations no table lists
    pub const DEFAULT: TrafficClass = TrafficClass::Bursty;

    /// Canonical class number (1-3)
    pub fn number(self) -> u8 {
        match self {
            TrafficClass::Bursty => 1,
            TrafficClass::Bulk => 2,
            TrafficClass::Web => 3,
        }
    }
}

impl fmt::Display for TrafficClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class {}", self.number())
    }
}

/// Maps a station to its traffic class
pub trait TrafficClassifier: Send + Sync {
    /// Class of `address`, if known
    fn classify(&self, address: &MacAddress) -> Option<TrafficClass>;

    /// Class of `address`, falling back to [`TrafficClass::DEFAULT`]
    fn class_of(&self, address: &MacAddress) -> TrafficClass {
        self.classify(address).unwrap_or(TrafficClass::DEFAULT)
    }
}

/// Membership lists for the three traffic classes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficClassTables {
    pub class1: Vec<MacAddress>,
    pub class2: Vec<MacAddress>,
    pub class3: Vec<MacAddress>,
}

/// Classifier backed by fixed membership tables.
///
/// A station listed in several tables is looked up in class 2 first,
/// then class 1, then class 3.
#[derive(Debug, Clone, Default)]
pub struct StaticClassifier {
    classes: HashMap<MacAddress, TrafficClass>,
}

impl StaticClassifier {
    /// Build the classifier from membership tables
    pub fn new(tables: &TrafficClassTables) -> Self {
        let mut classes = HashMap::new();
        for (list, class) in [
            (&tables.class3, TrafficClass::Web),
            (&tables.class1, TrafficClass::Bursty),
            (&tables.class2, TrafficClass::Bulk),
        ] {
            for addr in list {
                classes.insert(*addr, class);
            }
        }
        Self { classes }
    }

    /// Number of classified stations
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl TrafficClassifier for StaticClassifier {
    fn classify(&self, address: &MacAddress) -> Option<TrafficClass> {
        self.classes.get(address).copied()
    }
}

impl TrafficClassifier for HashMap<MacAddress, TrafficClass> {
    fn classify(&self, address: &MacAddress) -> Option<TrafficClass> {
        self.get(address).copied()
    }
}
