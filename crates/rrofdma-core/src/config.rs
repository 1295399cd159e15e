//! Configuration types for rrofdma

use crate::traffic::TrafficClassTables;
use crate::tx::UlTargetRssi;
use serde::{Deserialize, Serialize};

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OfdmaConfig {
    /// Scheduler configuration
    pub scheduler: SchedulerConfig,
    /// Traffic-class membership tables
    pub traffic_classes: TrafficClassTables,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl OfdmaConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, crate::OfdmaError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::OfdmaError::Config(format!("Failed to read config file: {}", e))
        })?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| crate::OfdmaError::Config(format!("Failed to parse config: {}", e)))?;
        config.scheduler.validate()?;
        Ok(config)
    }
}

/// RU packing policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackingPolicy {
    /// Class-driven packing with the historical RU index layout
    #[default]
    Legacy,
    /// Largest-first split of the channel, ignoring traffic classes
    Greedy,
}

/// Round-robin OFDMA scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum number of stations granted an RU in a DL MU PPDU
    pub n_stations: u8,
    /// Return DL OFDMA even if no DL MU PPDU could be built
    pub force_dl_ofdma: bool,
    /// Try UL OFDMA after a DL OFDMA transmission
    pub enable_ul_ofdma: bool,
    /// Size in bytes of the PSDU solicited in a HE TB PPDU
    pub ul_psdu_size: u32,
    /// RU packing policy
    pub packing: PackingPolicy,
    /// Highest MCS stations may use when answering a trigger frame
    pub max_trigger_mcs: u8,
    /// Target RSSI for solicited stations, in dBm; unset means max TX power
    pub ul_target_rssi_dbm: Option<i8>,
}

impl SchedulerConfig {
    /// Smallest accepted `n_stations`
    pub const MIN_STATIONS: u8 = 1;
    /// Largest accepted `n_stations` (26-tone RUs in a 160 MHz channel)
    pub const MAX_STATIONS: u8 = 74;

    /// Reject settings the scheduler cannot run with
    pub fn validate(&self) -> Result<(), crate::OfdmaError> {
        if !(Self::MIN_STATIONS..=Self::MAX_STATIONS).contains(&self.n_stations) {
            return Err(crate::OfdmaError::Config(format!(
                "n_stations must be within {}..={}, got {}",
                Self::MIN_STATIONS,
                Self::MAX_STATIONS,
                self.n_stations
            )));
        }
        if self.enable_ul_ofdma && self.ul_psdu_size == 0 {
            return Err(crate::OfdmaError::Config(
                "ul_psdu_size must be non-zero when UL OFDMA is enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Power-control hint placed in trigger frames
    pub fn ul_target_rssi(&self) -> UlTargetRssi {
        self.ul_target_rssi_dbm
            .map_or(UlTargetRssi::MaxTxPower, UlTargetRssi::Dbm)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            n_stations: 4,
            force_dl_ofdma: false,
            enable_ul_ofdma: true,
            ul_psdu_size: 500,
            packing: PackingPolicy::Legacy,
            max_trigger_mcs: 5,
            ul_target_rssi_dbm: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (text or compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MacAddress;

    #[test]
    fn test_default_scheduler_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.n_stations, 4);
        assert!(config.enable_ul_ofdma);
        assert_eq!(config.ul_psdu_size, 500);
        assert!(config.validate().is_ok());
        assert_eq!(config.ul_target_rssi(), UlTargetRssi::MaxTxPower);
    }

    #[test]
    fn test_validate_rejects_bad_station_count() {
        let config = SchedulerConfig {
            n_stations: 0,
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SchedulerConfig {
            n_stations: 75,
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_ul_psdu() {
        let config = SchedulerConfig {
            ul_psdu_size: 0,
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SchedulerConfig {
            ul_psdu_size: 0,
            enable_ul_ofdma: false,
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_parse() {
        let toml_str = r#"
[scheduler]
n_stations = 9
force_dl_ofdma = true
packing = "greedy"
ul_target_rssi_dbm = -70

[traffic_classes]
class1 = ["00:00:00:00:00:01"]

[logging]
level = "debug"
"#;
        let config: OfdmaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.scheduler.n_stations, 9);
        assert!(config.scheduler.force_dl_ofdma);
        assert_eq!(config.scheduler.packing, PackingPolicy::Greedy);
        assert_eq!(config.scheduler.ul_psdu_size, 500);
        assert_eq!(config.scheduler.ul_target_rssi(), UlTargetRssi::Dbm(-70));
        assert_eq!(config.traffic_classes.class1, vec![MacAddress::from_index(1)]);
        assert_eq!(config.logging.level, "debug");
    }
}
