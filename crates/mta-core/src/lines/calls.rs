//! Call session tracking
//!
//! Each line has at most one active call. Ending a call seals the record and
//! appends it to the line's call list, so the list is ordered by end time.

use super::LineRegistry;
use crate::error::{Error, Result};
use crate::records::{CallHandle, CallRecord, LongValue, MetricsUpdate, Snapshot};
use chrono::{DateTime, Utc};
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

pub struct CallSessionTracker {
    lines: Arc<LineRegistry>,
    next_call_id: AtomicU64,
}

impl CallSessionTracker {
    pub fn new(lines: Arc<LineRegistry>) -> Self {
        Self {
            lines,
            next_call_id: AtomicU64::new(1),
        }
    }

    /// Open a call on a line, timestamped now
    pub fn start_call(
        &self,
        line_instance: u32,
        codec: &str,
        remote_addr: IpAddr,
        originator: bool,
    ) -> Result<CallHandle> {
        self.start_call_at(line_instance, codec, remote_addr, originator, Utc::now())
    }

    /// Open a call on a line with an explicit start time
    ///
    /// Fails with `LineBusy` while another call is active on the line.
    pub fn start_call_at(
        &self,
        line_instance: u32,
        codec: &str,
        remote_addr: IpAddr,
        originator: bool,
        start_time: DateTime<Utc>,
    ) -> Result<CallHandle> {
        let codec = LongValue::new(codec)?;
        let clock = self.lines.clock();

        let handle = self.lines.with_line(line_instance, |state| {
            if state.active_call.is_some() {
                return Err(Error::LineBusy(line_instance));
            }
            let handle = CallHandle {
                line_instance,
                call_id: self.next_call_id.fetch_add(1, Ordering::Relaxed),
            };
            state.active_call = Some(CallRecord::open(
                handle,
                codec,
                remote_addr,
                originator,
                start_time,
            ));
            state.touch_calls(clock);
            Ok(handle)
        })?;

        debug!(
            "Call {} started on line {} ({})",
            handle.call_id, line_instance, remote_addr
        );
        Ok(handle)
    }

    /// Apply a metrics batch to an active call
    ///
    /// The batch is applied entirely or not at all.
    pub fn update_metrics(&self, handle: CallHandle, update: MetricsUpdate) -> Result<()> {
        self.lines.with_line(handle.line_instance, |state| {
            match state.active_call.as_mut() {
                Some(call) if call.call_id == handle.call_id => call.apply(update),
                _ => Err(Error::not_found(format!(
                    "no active call {} on line {}",
                    handle.call_id, handle.line_instance
                ))),
            }
        })
    }

    /// End an active call, sealing and archiving it
    ///
    /// A handle that was already ended fails with `NotFound`.
    pub fn end_call(&self, handle: CallHandle, end_time: DateTime<Utc>) -> Result<CallRecord> {
        let clock = self.lines.clock();

        let record = self.lines.with_line(handle.line_instance, |state| {
            match state.active_call.as_mut() {
                Some(call) if call.call_id == handle.call_id => call.seal(end_time)?,
                _ => {
                    return Err(Error::not_found(format!(
                        "no active call {} on line {}",
                        handle.call_id, handle.line_instance
                    )));
                }
            }
            let Some(sealed) = state.active_call.take() else {
                return Err(Error::not_found(format!("call {}", handle.call_id)));
            };
            state.calls.push(sealed.clone());
            state.touch_calls(clock);
            Ok(sealed)
        })?;

        info!(
            "Call {} ended on line {} after {}s",
            record.call_id, record.line_instance, record.duration_secs
        );
        Ok(record)
    }

    /// Drop every sealed call of a line; the active call is untouched
    ///
    /// Returns the number of records removed.
    pub fn clear_calls(&self, line_instance: u32) -> Result<usize> {
        let clock = self.lines.clock();
        let removed = self.lines.with_line(line_instance, |state| {
            let removed = state.calls.len();
            state.calls.clear();
            state.touch_calls(clock);
            Ok(removed)
        })?;
        debug!("Cleared {} calls on line {}", removed, line_instance);
        Ok(removed)
    }

    /// Sealed calls of a line in end order
    pub fn calls(&self, line_instance: u32) -> Result<Snapshot<CallRecord>> {
        self.lines
            .with_line(line_instance, |state| Ok(Snapshot::new(state.calls.clone())))
    }

    pub fn active_call(&self, line_instance: u32) -> Result<Option<CallRecord>> {
        self.lines
            .with_line(line_instance, |state| Ok(state.active_call.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::StatusNotifier;
    use crate::lines::DeviceClock;
    use crate::records::CallMetric;
    use chrono::Duration;

    fn tracker(count: u32) -> CallSessionTracker {
        let (notifier, _rx) = StatusNotifier::channel(16);
        CallSessionTracker::new(Arc::new(LineRegistry::new(
            count,
            notifier,
            DeviceClock::new(),
        )))
    }

    fn remote() -> IpAddr {
        "192.0.2.10".parse().unwrap()
    }

    #[test]
    fn test_second_call_on_busy_line_rejected() {
        let calls = tracker(2);
        calls.start_call(1, "PCMU", remote(), true).unwrap();

        assert!(matches!(
            calls.start_call(1, "PCMU", remote(), false),
            Err(Error::LineBusy(1))
        ));
        assert!(calls.start_call(2, "PCMU", remote(), false).is_ok());
    }

    #[test]
    fn test_calls_listed_in_end_order() {
        let calls = tracker(1);
        let t0 = Utc::now();

        let first = calls.start_call_at(1, "PCMU", remote(), true, t0).unwrap();
        calls.end_call(first, t0 + Duration::seconds(5)).unwrap();
        let second = calls.start_call_at(1, "G729", remote(), false, t0).unwrap();
        calls.end_call(second, t0 + Duration::seconds(9)).unwrap();

        let list = calls.calls(1).unwrap();
        assert_eq!(list.count(), 2);
        let ids: Vec<u64> = list.entries().iter().map(|c| c.call_id).collect();
        assert_eq!(ids, vec![first.call_id, second.call_id]);
    }

    #[test]
    fn test_metrics_after_end_rejected() {
        let calls = tracker(1);
        let handle = calls.start_call(1, "PCMU", remote(), true).unwrap();
        calls.end_call(handle, Utc::now()).unwrap();

        let update = MetricsUpdate::new()
            .metric(CallMetric::MosLq, "4.1")
            .unwrap();
        assert!(matches!(
            calls.update_metrics(handle, update),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_backwards_end_time_keeps_call_active() {
        let calls = tracker(1);
        let t0 = Utc::now();
        let handle = calls.start_call_at(1, "PCMU", remote(), true, t0).unwrap();

        assert!(calls.end_call(handle, t0 - Duration::seconds(1)).is_err());
        assert!(calls.active_call(1).unwrap().is_some());
        assert!(calls.end_call(handle, t0).is_ok());
    }

    #[test]
    fn test_clear_keeps_active_call() {
        let calls = tracker(1);
        let done = calls.start_call(1, "PCMU", remote(), true).unwrap();
        calls.end_call(done, Utc::now()).unwrap();
        let live = calls.start_call(1, "PCMU", remote(), true).unwrap();

        assert_eq!(calls.clear_calls(1).unwrap(), 1);
        assert!(calls.calls(1).unwrap().is_empty());
        assert_eq!(calls.active_call(1).unwrap().map(|c| c.call_id), Some(live.call_id));
    }

    #[test]
    fn test_oversized_codec_rejected() {
        let calls = tracker(1);
        assert!(matches!(
            calls.start_call(1, &"x".repeat(65), remote(), true),
            Err(Error::InvalidInput(_))
        ));
        assert!(calls.active_call(1).unwrap().is_none());
    }
}
