//! Line diagnostics lifecycle
//!
//! `trigger` moves a line to `Running` and hands the run to the diagnostics
//! producer; the producer later calls back with `report`, which stores the
//! five results and settles the run as `Passed` or `Failed`.

use super::LineRegistry;
use crate::error::{Error, Result};
use crate::records::{DiagnosticsReport, DiagnosticsState, LineDiagnostics};
use crate::traits::{DiagnosticsRequest, DiagnosticsRunner};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct DiagnosticsCoordinator {
    lines: Arc<LineRegistry>,
    runner: Option<Arc<dyn DiagnosticsRunner>>,
}

impl DiagnosticsCoordinator {
    pub fn new(lines: Arc<LineRegistry>, runner: Option<Arc<dyn DiagnosticsRunner>>) -> Self {
        Self { lines, runner }
    }

    /// Start a diagnostics run on a line
    ///
    /// Results of the previous run are cleared. Fails with `AlreadyRunning`
    /// while a run is in progress.
    pub fn trigger(&self, line_instance: u32) -> Result<()> {
        let request = self.lines.with_line(line_instance, |state| {
            if state.diagnostics_state == DiagnosticsState::Running {
                return Err(Error::AlreadyRunning(line_instance));
            }
            state.diagnostics_state = DiagnosticsState::Running;
            state.diagnostics = LineDiagnostics::default();
            Ok(DiagnosticsRequest {
                line_instance,
                line_number: line_instance,
            })
        })?;

        info!("Diagnostics started on line {}", line_instance);
        match &self.runner {
            Some(runner) => runner.launch(request),
            None => debug!("No diagnostics runner attached; awaiting external report"),
        }
        Ok(())
    }

    /// Complete the run in progress on a line
    pub fn report(&self, line_instance: u32, report: DiagnosticsReport) -> Result<DiagnosticsState> {
        let outcome = self.lines.with_line(line_instance, |state| {
            if state.diagnostics_state != DiagnosticsState::Running {
                return Err(Error::invalid_transition(
                    format!("{:?}", state.diagnostics_state),
                    "report diagnostics",
                ));
            }
            let outcome = report.outcome();
            state.diagnostics = report;
            state.diagnostics_state = outcome;
            Ok(outcome)
        })?;

        match outcome {
            DiagnosticsState::Failed => warn!("Diagnostics failed on line {}", line_instance),
            _ => info!("Diagnostics passed on line {}", line_instance),
        }
        Ok(outcome)
    }

    pub fn state(&self, line_instance: u32) -> Result<DiagnosticsState> {
        self.lines
            .with_line(line_instance, |state| Ok(state.diagnostics_state))
    }
}
