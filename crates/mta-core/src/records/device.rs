//! Device-level records: DECT, service flows, logs and battery

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bounded::{BoundedString, ClassName, Description, LongValue, ShortText};

/// A DECT handset known to the base
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandsetRecord {
    pub instance_number: u32,
    /// Registered and reachable
    pub status: bool,
    pub last_active_time: LongValue,
    pub handset_name: LongValue,
    pub handset_firmware: LongValue,
    pub operating_tn: LongValue,
    pub supported_tn: LongValue,
}

impl HandsetRecord {
    pub fn new(instance_number: u32, handset_name: LongValue) -> Self {
        Self {
            instance_number,
            status: true,
            last_active_time: LongValue::default(),
            handset_name,
            handset_firmware: LongValue::default(),
            operating_tn: LongValue::default(),
            supported_tn: LongValue::default(),
        }
    }
}

/// DECT base module identity and settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DectInfo {
    pub hardware_version: LongValue,
    pub rfpi: LongValue,
    pub software_version: LongValue,
    pub pin: LongValue,
}

/// One DOCSIS service flow used for voice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceFlow {
    pub sfid: u32,
    pub service_class_name: ClassName,
    pub direction: BoundedString<16>,
    pub schedule_type: u32,
    pub default_flow: bool,
    pub nom_grant_interval: u32,
    pub unsolicit_grant_size: u32,
    pub tol_grant_jitter: u32,
    pub nom_poll_interval: u32,
    pub min_reserved_pkt: u32,
    pub max_traffic_rate: u32,
    pub min_reserved_rate: u32,
    pub max_traffic_burst: u32,
    pub traffic_type: LongValue,
    pub number_of_packets: u64,
}

/// Entry of the DSX diagnostic log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DsxLogEntry {
    pub id: u64,
    pub time: DateTime<Utc>,
    pub description: Description,
    pub level: u32,
}

/// Entry of the MTA event log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MtaLogEntry {
    pub index: u64,
    pub event_id: u32,
    pub event_level: LongValue,
    pub time: DateTime<Utc>,
    pub description: String,
}

/// Entry of the call-signalling log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignallingLogEntry {
    pub id: u64,
    pub time: DateTime<Utc>,
    pub line_number: u32,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerStatus {
    #[serde(rename = "AC")]
    Ac,
    Battery,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatteryCondition {
    Good,
    Bad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatteryStatus {
    Missing,
    Idle,
    Charging,
    Discharging,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatteryLife {
    Good,
    #[serde(rename = "Need Replacement")]
    NeedReplacement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerSavingMode {
    Enabled,
    Disabled,
}

impl PowerSavingMode {
    /// HAL code: 1 for enabled, 2 for disabled
    pub fn code(self) -> u32 {
        match self {
            PowerSavingMode::Enabled => 1,
            PowerSavingMode::Disabled => 2,
        }
    }
}

/// One battery reading
///
/// `None` marks a field the producer could not supply (or supplied in a
/// corrupted form); it reads back as `Unavailable`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryInfo {
    pub installed: bool,
    /// mAh
    pub total_capacity: Option<u32>,
    /// mAh
    pub actual_capacity: Option<u32>,
    /// mAh
    pub remaining_charge: Option<u32>,
    /// minutes
    pub remaining_time: Option<u32>,
    pub number_of_cycles: Option<u32>,
    pub power_status: Option<PowerStatus>,
    pub condition: Option<BatteryCondition>,
    pub status: Option<BatteryStatus>,
    pub life: Option<BatteryLife>,
    pub model_number: Option<ShortText>,
    pub serial_number: Option<ShortText>,
    pub part_number: Option<ShortText>,
    pub charger_firmware_revision: Option<ShortText>,
    pub power_saving_mode: Option<PowerSavingMode>,
}

impl BatteryInfo {
    /// Reading for a device with no battery fitted
    pub fn not_installed() -> Self {
        Self {
            installed: false,
            power_status: Some(PowerStatus::Ac),
            status: Some(BatteryStatus::Missing),
            ..Self::default()
        }
    }
}
