//! Architectural Contract Test: Call Sessions
//!
//! Constraints verified:
//! - A line holds at most one unsealed call at any time
//! - Metrics are write-once; a colliding batch is refused as a whole
//! - Ending a call twice never appends it twice
//! - Every call-list mutation advances the line's update time, never backwards
//!
//! If this test fails, someone has:
//! - Allowed a second concurrent call on a line
//! - Made metric writes overwrite earlier values
//! - Made `end_call` append without checking the active call
//! - Stamped the update time outside the line lock

mod common;

use chrono::{Duration, Utc};
use mta_core::Error;
use mta_core::records::{CallMetric, MetricsUpdate};
use proptest::prelude::*;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

fn remote() -> IpAddr {
    "10.0.0.5".parse().unwrap()
}

#[test]
fn g711_call_metrics_end_to_end() {
    let (device, _dispatch) = common::device(2);
    let calls = device.calls();

    let handle = calls.start_call(1, "G.711", remote(), true).unwrap();

    calls
        .update_metrics(
            handle,
            MetricsUpdate::new().metric(CallMetric::MosLq, "40").unwrap(),
        )
        .unwrap();

    let err = calls
        .update_metrics(
            handle,
            MetricsUpdate::new().metric(CallMetric::MosLq, "41").unwrap(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::AlreadySet(_)));

    let sealed = calls.end_call(handle, Utc::now()).unwrap();
    assert!(sealed.is_sealed());

    let list = calls.calls(1).unwrap();
    assert_eq!(list.count(), 1);
    let record = &list.entries()[0];
    assert_eq!(record.codec, "G.711");
    assert_eq!(record.remote_addr, remote());
    assert!(record.originator);
    assert_eq!(record.metric(CallMetric::MosLq), Some("40"));
    assert!(record.end_time.is_some());
}

#[test]
fn colliding_batch_leaves_record_untouched() {
    let (device, _dispatch) = common::device(1);
    let calls = device.calls();
    let handle = calls.start_call(1, "PCMA", remote(), false).unwrap();

    calls
        .update_metrics(
            handle,
            MetricsUpdate::new().metric(CallMetric::Snr, "35").unwrap(),
        )
        .unwrap();

    let batch = MetricsUpdate::new()
        .metric(CallMetric::RoundTripDelay, "20")
        .unwrap()
        .metric(CallMetric::Snr, "36")
        .unwrap()
        .remote_codec("PCMA")
        .unwrap();
    assert!(calls.update_metrics(handle, batch).is_err());

    let active = calls.active_call(1).unwrap().unwrap();
    assert_eq!(active.metric(CallMetric::Snr), Some("35"));
    assert_eq!(active.metric(CallMetric::RoundTripDelay), None);
    assert_eq!(active.remote_codec, None);
}

#[test]
fn duplicate_end_is_rejected_not_appended() {
    let (device, _dispatch) = common::device(1);
    let calls = device.calls();
    let start = Utc::now();
    let handle = calls.start_call_at(1, "G.711", remote(), true, start).unwrap();

    let sealed = calls.end_call(handle, start + Duration::seconds(30)).unwrap();
    assert_eq!(sealed.duration_secs, 30);

    let err = calls
        .end_call(handle, start + Duration::seconds(31))
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(calls.calls(1).unwrap().count(), 1);
    assert_eq!(device.lines().line_by_instance(1).unwrap().calls_number, 1);
}

#[test]
fn busy_line_rejects_second_call_until_ended() {
    let (device, _dispatch) = common::device(1);
    let calls = device.calls();

    let first = calls.start_call(1, "G.711", remote(), true).unwrap();
    assert!(matches!(
        calls.start_call(1, "G.711", remote(), false),
        Err(Error::LineBusy(1))
    ));
    assert!(device.lines().line_by_instance(1).unwrap().has_active_call);

    calls.end_call(first, Utc::now()).unwrap();
    assert!(calls.start_call(1, "G.711", remote(), false).is_ok());
}

fn calls_update_time(device: &mta_core::MtaDevice, instance: u32) -> u64 {
    device
        .lines()
        .line_by_instance(instance)
        .unwrap()
        .calls_update_time
}

fn pause() {
    thread::sleep(std::time::Duration::from_millis(3));
}

#[test]
fn call_list_mutations_advance_update_time() {
    let (device, _dispatch) = common::device(1);
    let calls = device.calls();
    let initial = calls_update_time(&device, 1);

    pause();
    let handle = calls.start_call(1, "G.711", remote(), true).unwrap();
    let started = calls_update_time(&device, 1);
    assert!(started > initial);

    pause();
    calls.end_call(handle, Utc::now()).unwrap();
    let ended = calls_update_time(&device, 1);
    assert!(ended > started);

    pause();
    calls.clear_calls(1).unwrap();
    let cleared = calls_update_time(&device, 1);
    assert!(cleared > ended);

    // Failed mutations leave the stamp alone
    pause();
    assert!(calls.end_call(handle, Utc::now()).is_err());
    assert_eq!(calls_update_time(&device, 1), cleared);
}

#[test]
fn update_time_is_monotonic_under_concurrent_writers() {
    let (device, _dispatch) = common::device(1);
    let done = Arc::new(AtomicBool::new(false));

    let reader = {
        let device = Arc::clone(&device);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut last = 0;
            while !done.load(Ordering::SeqCst) {
                let now = calls_update_time(&device, 1);
                assert!(now >= last, "update time went from {} to {}", last, now);
                last = now;
            }
        })
    };

    let writers: Vec<_> = (0..8)
        .map(|_| {
            let device = Arc::clone(&device);
            thread::spawn(move || {
                for _ in 0..500 {
                    device.calls().clear_calls(1).unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }
    done.store(true, Ordering::SeqCst);
    reader.join().unwrap();
}

#[derive(Debug, Clone)]
enum Action {
    Start(u32),
    End(u32),
    Clear(u32),
    Metric(u32),
}

fn action_strategy() -> impl Strategy<Value = Action> {
    let line = 1u32..=3;
    prop_oneof![
        line.clone().prop_map(Action::Start),
        line.clone().prop_map(Action::End),
        line.clone().prop_map(Action::Clear),
        line.prop_map(Action::Metric),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn at_most_one_unsealed_call_per_line(actions in prop::collection::vec(action_strategy(), 1..80)) {
        let (device, _dispatch) = common::device(3);
        let calls = device.calls();
        let mut open = [None; 3];
        let mut sealed = [0usize; 3];

        for action in actions {
            match action {
                Action::Start(line) => {
                    let slot = &mut open[(line - 1) as usize];
                    let result = calls.start_call(line, "G.711", remote(), true);
                    if slot.is_some() {
                        prop_assert!(matches!(result, Err(Error::LineBusy(l)) if l == line));
                    } else {
                        *slot = Some(result.unwrap());
                    }
                }
                Action::End(line) => {
                    let index = (line - 1) as usize;
                    if let Some(handle) = open[index].take() {
                        calls.end_call(handle, Utc::now()).unwrap();
                        sealed[index] += 1;
                        // duplicate delivery of the same end
                        prop_assert!(calls.end_call(handle, Utc::now()).is_err());
                    }
                }
                Action::Clear(line) => {
                    calls.clear_calls(line).unwrap();
                    sealed[(line - 1) as usize] = 0;
                }
                Action::Metric(line) => {
                    if let Some(handle) = open[(line - 1) as usize] {
                        let update = MetricsUpdate::new().jitter_buffer_adaptive(true);
                        let _ = calls.update_metrics(handle, update);
                    }
                }
            }

            for line in 1..=3u32 {
                let index = (line - 1) as usize;
                let info = device.lines().line_by_instance(line).unwrap();
                prop_assert_eq!(info.has_active_call, open[index].is_some());
                prop_assert_eq!(info.calls_number, sealed[index]);
                prop_assert!(calls.calls(line).unwrap().entries().iter().all(|c| c.is_sealed()));
            }
        }
    }
}
