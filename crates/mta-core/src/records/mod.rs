//! Fixed-shape value records
//!
//! Everything handed to a caller is an owned copy of one of these types.
//! Records never alias live aggregator state.

pub mod bounded;
pub mod call;
pub mod device;
pub mod dhcp;
pub mod line;

pub use bounded::{BoundedString, ClassName, Description, LongValue, ShortText, ShortValue};
pub use call::{CallHandle, CallMetric, CallRecord, MetricsUpdate};
pub use device::{
    BatteryCondition, BatteryInfo, BatteryLife, BatteryStatus, DectInfo, DsxLogEntry,
    HandsetRecord, MtaLogEntry, PowerSavingMode, PowerStatus, ServiceFlow, SignallingLogEntry,
};
pub use dhcp::{DhcpV4Lease, DhcpV6Lease, Inet6Text, IpMode, ProvisioningParams};
pub use line::{
    CallpState, CallpStatus, DiagnosticsReport, LcState, LineDiagnostics, LineInfo, LineStatus,
    LineStatusUpdate,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status shared by DHCP, config-file, operational and line
/// registration tracking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MtaStatus {
    #[default]
    Init,
    Started,
    Complete,
    Error,
    Rejected,
}

impl MtaStatus {
    /// Numeric code used on the HAL wire (`MTA_INIT` = 0 .. `MTA_REJECTED` = 4)
    pub fn code(self) -> u32 {
        match self {
            MtaStatus::Init => 0,
            MtaStatus::Started => 1,
            MtaStatus::Complete => 2,
            MtaStatus::Error => 3,
            MtaStatus::Rejected => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MtaStatus::Init => "Init",
            MtaStatus::Started => "Started",
            MtaStatus::Complete => "Complete",
            MtaStatus::Error => "Error",
            MtaStatus::Rejected => "Rejected",
        }
    }

    /// Terminal states are left only through a reset or a fresh cycle
    pub fn is_terminal(self) -> bool {
        matches!(self, MtaStatus::Error | MtaStatus::Rejected)
    }
}

impl fmt::Display for MtaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall provisioning outcome of the MTA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvisionStatus {
    Provisioned,
    NonProvisioned,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookStatus {
    #[default]
    OnHook,
    OffHook,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverCurrentFault {
    #[default]
    Normal,
    Fault,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoopCurrent {
    #[default]
    Normal,
    Boosted,
}

/// Outcome of one line diagnostic test
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticResult {
    #[default]
    NotStarted,
    Passed,
    Failed,
}

impl DiagnosticResult {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticResult::NotStarted => "NotStarted",
            DiagnosticResult::Passed => "Passed",
            DiagnosticResult::Failed => "Failed",
        }
    }
}

impl fmt::Display for DiagnosticResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-line diagnostics run state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticsState {
    #[default]
    Idle,
    Running,
    Passed,
    Failed,
}

impl DiagnosticsState {
    /// Whether a new run may be triggered
    pub fn is_ready(self) -> bool {
        !matches!(self, DiagnosticsState::Running)
    }
}

/// Count-plus-entries pair produced under a single lock acquisition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot<T> {
    count: usize,
    entries: Vec<T>,
}

impl<T> Snapshot<T> {
    pub fn new(entries: Vec<T>) -> Self {
        Self {
            count: entries.len(),
            entries,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<T> {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl<T> FromIterator<T> for Snapshot<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_match_hal() {
        assert_eq!(MtaStatus::Init.code(), 0);
        assert_eq!(MtaStatus::Started.code(), 1);
        assert_eq!(MtaStatus::Complete.code(), 2);
        assert_eq!(MtaStatus::Error.code(), 3);
        assert_eq!(MtaStatus::Rejected.code(), 4);
    }

    #[test]
    fn test_snapshot_count_tracks_entries() {
        let snapshot: Snapshot<u32> = (1..=3).collect();
        assert_eq!(snapshot.count(), 3);
        assert_eq!(snapshot.entries(), &[1, 2, 3]);
        assert!(Snapshot::<u32>::new(Vec::new()).is_empty());
    }
}
