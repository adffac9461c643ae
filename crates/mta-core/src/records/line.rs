//! Line table records

use serde::{Deserialize, Serialize};

use super::bounded::LongValue;
use super::{
    DiagnosticResult, DiagnosticsState, HookStatus, LoopCurrent, MtaStatus, OverCurrentFault,
};

/// Results of the five line tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDiagnostics {
    pub hazardous_potential: DiagnosticResult,
    pub foreign_emf: DiagnosticResult,
    pub resistive_faults: DiagnosticResult,
    pub receiver_off_hook: DiagnosticResult,
    pub ringer_equivalency: DiagnosticResult,
}

/// Completion report delivered by the diagnostics producer
pub type DiagnosticsReport = LineDiagnostics;

impl LineDiagnostics {
    /// Report with every test set to the same result
    pub fn uniform(result: DiagnosticResult) -> Self {
        Self {
            hazardous_potential: result,
            foreign_emf: result,
            resistive_faults: result,
            receiver_off_hook: result,
            ringer_equivalency: result,
        }
    }

    fn results(&self) -> [DiagnosticResult; 5] {
        [
            self.hazardous_potential,
            self.foreign_emf,
            self.resistive_faults,
            self.receiver_off_hook,
            self.ringer_equivalency,
        ]
    }

    /// Final run state: failed if any single test failed
    pub fn outcome(&self) -> DiagnosticsState {
        if self.results().contains(&DiagnosticResult::Failed) {
            DiagnosticsState::Failed
        } else {
            DiagnosticsState::Passed
        }
    }
}

/// Copy of one line's table entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInfo {
    pub instance_number: u32,
    pub line_number: u32,
    pub hook_status: HookStatus,
    pub over_current_fault: OverCurrentFault,
    pub registration_status: MtaStatus,
    pub diagnostics: LineDiagnostics,
    pub diagnostics_state: DiagnosticsState,
    pub ca_name: LongValue,
    pub ca_port: u32,
    pub mwd: u32,
    pub loop_current: LoopCurrent,
    pub calls_number: usize,
    /// Milliseconds since device construction of the last call-list mutation
    pub calls_update_time: u64,
    pub has_active_call: bool,
    pub version: u64,
}

/// Loop condition of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LcState {
    #[serde(rename = "In Use")]
    InUse,
    #[serde(rename = "Idle")]
    Idle,
    #[serde(rename = "Out of Service")]
    OutOfService,
}

/// Call-processing service state of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallpState {
    #[serde(rename = "In Service")]
    InService,
    #[serde(rename = "OOS")]
    OutOfService,
}

/// CALLP status, derived from the line at read time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallpStatus {
    pub lc_state: LcState,
    pub callp_state: CallpState,
    pub loop_current: LoopCurrent,
}

/// Status of one line as delivered to the subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineStatus {
    pub line_number: u32,
    pub instance_number: u32,
    pub registration_status: MtaStatus,
    pub hook_status: HookStatus,
    pub over_current_fault: OverCurrentFault,
    pub version: u64,
}

/// One notification: the full status array plus the line that changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineStatusUpdate {
    /// Delivery sequence number, starting at 1
    pub sequence: u64,
    /// Line number whose change caused the delivery; `None` for a resync
    pub changed_line: Option<u32>,
    /// Every line in line-number order
    pub statuses: Vec<LineStatus>,
}

impl LineStatusUpdate {
    /// Registration array in the shape of the HAL callback
    pub fn registration_statuses(&self) -> Vec<MtaStatus> {
        self.statuses.iter().map(|s| s.registration_status).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_fails_on_any_failed_test() {
        let mut report = LineDiagnostics::uniform(DiagnosticResult::Passed);
        assert_eq!(report.outcome(), DiagnosticsState::Passed);

        report.ringer_equivalency = DiagnosticResult::Failed;
        assert_eq!(report.outcome(), DiagnosticsState::Failed);
    }

    #[test]
    fn test_not_started_tests_do_not_fail_the_run() {
        let mut report = LineDiagnostics::default();
        report.receiver_off_hook = DiagnosticResult::Passed;
        assert_eq!(report.outcome(), DiagnosticsState::Passed);
    }

    #[test]
    fn test_callp_serializes_hal_strings() {
        let callp = CallpStatus {
            lc_state: LcState::OutOfService,
            callp_state: CallpState::OutOfService,
            loop_current: LoopCurrent::Normal,
        };
        let json = serde_json::to_value(callp).unwrap();
        assert_eq!(json["lc_state"], "Out of Service");
        assert_eq!(json["callp_state"], "OOS");
    }
}
