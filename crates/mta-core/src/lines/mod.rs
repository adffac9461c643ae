//! Line table
//!
//! The registry owns one entry per telephony line, each behind its own lock.
//! Operations on different lines never contend; operations on one line are
//! serialized. Lines are addressed by instance number (`1..=line_count`) and
//! line number, which coincide, or by zero-based table index.
//!
//! Status changes (registration, hook, over-current fault) bump the line's
//! version and enqueue a notification for the dispatch loop while the line
//! lock is still held, so notifications for one line leave in mutation order.

pub mod calls;
pub mod diagnostics;

pub use calls::CallSessionTracker;
pub use diagnostics::DiagnosticsCoordinator;

use crate::dispatch::StatusNotifier;
use crate::error::{Error, Result};
use crate::records::{
    CallRecord, CallpState, CallpStatus, DiagnosticsState, HookStatus, LcState, LineDiagnostics,
    LineInfo, LineStatus, LongValue, LoopCurrent, MtaStatus, OverCurrentFault, Snapshot,
};
use crate::sync::lock;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, info};

/// Monotonic millisecond clock anchored at device construction
#[derive(Debug, Clone, Copy)]
pub struct DeviceClock {
    epoch: Instant,
}

impl DeviceClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for DeviceClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Mutable state of one line
#[derive(Debug)]
pub(crate) struct LineState {
    pub(crate) hook_status: HookStatus,
    pub(crate) over_current_fault: OverCurrentFault,
    pub(crate) registration_status: MtaStatus,
    pub(crate) diagnostics: LineDiagnostics,
    pub(crate) diagnostics_state: DiagnosticsState,
    pub(crate) ca_name: LongValue,
    pub(crate) ca_port: u32,
    pub(crate) mwd: u32,
    pub(crate) loop_current: LoopCurrent,
    /// Sealed calls in end order
    pub(crate) calls: Vec<CallRecord>,
    pub(crate) active_call: Option<CallRecord>,
    pub(crate) calls_update_time: u64,
    pub(crate) version: u64,
}

impl LineState {
    fn new() -> Self {
        Self {
            hook_status: HookStatus::OnHook,
            over_current_fault: OverCurrentFault::Normal,
            registration_status: MtaStatus::Init,
            diagnostics: LineDiagnostics::default(),
            diagnostics_state: DiagnosticsState::Idle,
            ca_name: LongValue::default(),
            ca_port: 0,
            mwd: 0,
            loop_current: LoopCurrent::Normal,
            calls: Vec::new(),
            active_call: None,
            calls_update_time: 0,
            version: 0,
        }
    }

    /// Stamp a call-list mutation; must run under the line lock
    ///
    /// Never moves backwards, even when a writer read the clock late.
    pub(crate) fn touch_calls(&mut self, clock: DeviceClock) {
        self.calls_update_time = self.calls_update_time.max(clock.elapsed_ms());
    }
}

struct LineSlot {
    instance_number: u32,
    line_number: u32,
    state: Mutex<LineState>,
}

impl LineSlot {
    fn info(&self, state: &LineState) -> LineInfo {
        LineInfo {
            instance_number: self.instance_number,
            line_number: self.line_number,
            hook_status: state.hook_status,
            over_current_fault: state.over_current_fault,
            registration_status: state.registration_status,
            diagnostics: state.diagnostics,
            diagnostics_state: state.diagnostics_state,
            ca_name: state.ca_name.clone(),
            ca_port: state.ca_port,
            mwd: state.mwd,
            loop_current: state.loop_current,
            calls_number: state.calls.len(),
            calls_update_time: state.calls_update_time,
            has_active_call: state.active_call.is_some(),
            version: state.version,
        }
    }

    fn status(&self, state: &LineState) -> LineStatus {
        LineStatus {
            line_number: self.line_number,
            instance_number: self.instance_number,
            registration_status: state.registration_status,
            hook_status: state.hook_status,
            over_current_fault: state.over_current_fault,
            version: state.version,
        }
    }
}

/// Fixed-size table of lines
pub struct LineRegistry {
    lines: Vec<LineSlot>,
    notifier: StatusNotifier,
    clock: DeviceClock,
}

impl LineRegistry {
    pub(crate) fn new(line_count: u32, notifier: StatusNotifier, clock: DeviceClock) -> Self {
        let lines = (1..=line_count)
            .map(|n| LineSlot {
                instance_number: n,
                line_number: n,
                state: Mutex::new(LineState::new()),
            })
            .collect();
        Self {
            lines,
            notifier,
            clock,
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn clock(&self) -> DeviceClock {
        self.clock
    }

    /// Copy of the line at a zero-based table index
    pub fn get_line(&self, index: usize) -> Result<LineInfo> {
        let slot = self
            .lines
            .get(index)
            .ok_or_else(|| Error::out_of_range(index, self.lines.len()))?;
        let state = lock(&slot.state);
        Ok(slot.info(&state))
    }

    /// Copy of the line with the given instance number
    pub fn line_by_instance(&self, instance: u32) -> Result<LineInfo> {
        let slot = self.slot(instance)?;
        let state = lock(&slot.state);
        Ok(slot.info(&state))
    }

    /// Copies of every line, each taken under its own lock
    pub fn lines(&self) -> Snapshot<LineInfo> {
        self.lines
            .iter()
            .map(|slot| slot.info(&lock(&slot.state)))
            .collect()
    }

    /// Current status of every line in line-number order
    pub fn statuses(&self) -> Vec<LineStatus> {
        self.lines
            .iter()
            .map(|slot| slot.status(&lock(&slot.state)))
            .collect()
    }

    /// Registration status of every line in line-number order
    pub fn registration_statuses(&self) -> Vec<MtaStatus> {
        self.lines
            .iter()
            .map(|slot| lock(&slot.state).registration_status)
            .collect()
    }

    /// Record a hook transition; returns whether the status changed
    pub fn update_hook_status(&self, instance: u32, status: HookStatus) -> Result<bool> {
        self.update_status(instance, |state| {
            if state.hook_status == status {
                return false;
            }
            state.hook_status = status;
            true
        })
    }

    /// Record an over-current fault change; returns whether it changed
    pub fn update_fault(&self, instance: u32, fault: OverCurrentFault) -> Result<bool> {
        self.update_status(instance, |state| {
            if state.over_current_fault == fault {
                return false;
            }
            state.over_current_fault = fault;
            true
        })
    }

    /// Record a registration change; returns whether it changed
    pub fn update_registration_status(&self, instance: u32, status: MtaStatus) -> Result<bool> {
        let changed = self.update_status(instance, |state| {
            if state.registration_status == status {
                return false;
            }
            state.registration_status = status;
            true
        })?;
        if changed {
            info!("Line {} registration -> {}", instance, status);
        }
        Ok(changed)
    }

    pub fn set_loop_current(&self, instance: u32, loop_current: LoopCurrent) -> Result<()> {
        self.with_line(instance, |state| {
            state.loop_current = loop_current;
            Ok(())
        })
    }

    /// Set the call agent the line registers with
    pub fn set_call_agent(&self, instance: u32, ca_name: &str, ca_port: u32) -> Result<()> {
        let ca_name = LongValue::new(ca_name)?;
        self.with_line(instance, |state| {
            state.ca_name = ca_name;
            state.ca_port = ca_port;
            Ok(())
        })
    }

    /// Set the message-waiting indicator
    pub fn set_message_waiting(&self, instance: u32, mwd: u32) -> Result<()> {
        self.with_line(instance, |state| {
            state.mwd = mwd;
            Ok(())
        })
    }

    /// CALLP status of a line, derived at read time
    pub fn callp(&self, line_number: u32) -> Result<CallpStatus> {
        let slot = self
            .lines
            .iter()
            .find(|slot| slot.line_number == line_number)
            .ok_or_else(|| Error::not_found(format!("line number {}", line_number)))?;
        let state = lock(&slot.state);

        let in_service = state.registration_status == MtaStatus::Complete
            && state.over_current_fault == OverCurrentFault::Normal;
        let lc_state = if !in_service {
            LcState::OutOfService
        } else if state.hook_status == HookStatus::OffHook || state.active_call.is_some() {
            LcState::InUse
        } else {
            LcState::Idle
        };

        Ok(CallpStatus {
            lc_state,
            callp_state: if in_service {
                CallpState::InService
            } else {
                CallpState::OutOfService
            },
            loop_current: state.loop_current,
        })
    }

    /// Return every line's registration to `Init`
    ///
    /// Returns the number of lines that were not already in `Init`.
    pub(crate) fn reset_registrations(&self) -> usize {
        (1..=self.lines.len() as u32)
            .filter_map(|instance| {
                self.update_status(instance, |state| {
                    if state.registration_status == MtaStatus::Init {
                        return false;
                    }
                    state.registration_status = MtaStatus::Init;
                    true
                })
                .ok()
            })
            .filter(|changed| *changed)
            .count()
    }

    /// Run `f` on one line under its lock
    pub(crate) fn with_line<R, F>(&self, instance: u32, f: F) -> Result<R>
    where
        F: FnOnce(&mut LineState) -> Result<R>,
    {
        let slot = self.slot(instance)?;
        let mut state = lock(&slot.state);
        f(&mut state)
    }

    fn update_status<F>(&self, instance: u32, apply: F) -> Result<bool>
    where
        F: FnOnce(&mut LineState) -> bool,
    {
        let slot = self.slot(instance)?;
        let mut state = lock(&slot.state);
        if !apply(&mut state) {
            return Ok(false);
        }
        state.version += 1;
        debug!(
            "Line {} status changed (version {})",
            slot.line_number, state.version
        );
        self.notifier.notify(slot.line_number);
        Ok(true)
    }

    fn slot(&self, instance: u32) -> Result<&LineSlot> {
        instance
            .checked_sub(1)
            .and_then(|index| self.lines.get(index as usize))
            .ok_or_else(|| Error::not_found(format!("line instance {}", instance)))
    }
}
