//! Test doubles and common utilities for architecture contract tests
//!
//! Each double records how the aggregator used it so tests can assert on
//! the interaction as well as on the resulting state.

#![allow(dead_code)]

use mta_core::error::{Error, Result};
use mta_core::records::{BatteryInfo, LineStatusUpdate};
use mta_core::traits::{BatterySource, DiagnosticsRequest, DiagnosticsRunner, LineStatusSubscriber};
use mta_core::{DispatchLoop, MtaConfig, MtaDevice};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Build a device with `line_count` lines and no producers attached
pub fn device(line_count: u32) -> (Arc<MtaDevice>, DispatchLoop) {
    let (device, dispatch) = MtaDevice::builder(MtaConfig::new().with_line_count(line_count))
        .build()
        .expect("device construction succeeds");
    (Arc::new(device), dispatch)
}

/// Poll `condition` until it holds or the timeout elapses
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Run `future` with a timeout, panicking if it does not finish
pub async fn within<T>(timeout: Duration, future: impl Future<Output = T>) -> T {
    tokio::time::timeout(timeout, future)
        .await
        .expect("operation finished in time")
}

/// Subscriber that records every delivery
#[derive(Default)]
pub struct RecordingSubscriber {
    updates: Mutex<Vec<LineStatusUpdate>>,
    call_count: AtomicUsize,
}

impl RecordingSubscriber {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> Vec<LineStatusUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<LineStatusUpdate> {
        self.updates.lock().unwrap().last().cloned()
    }
}

impl LineStatusSubscriber for RecordingSubscriber {
    fn on_line_status(&self, update: &LineStatusUpdate) {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.updates.lock().unwrap().push(update.clone());
    }
}

/// Diagnostics engine stand-in that forwards requests to the test
pub struct QueuedDiagnosticsRunner {
    tx: mpsc::UnboundedSender<DiagnosticsRequest>,
    launch_count: AtomicUsize,
}

impl QueuedDiagnosticsRunner {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<DiagnosticsRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                tx,
                launch_count: AtomicUsize::new(0),
            }),
            rx,
        )
    }

    pub fn launch_count(&self) -> usize {
        self.launch_count.load(Ordering::SeqCst)
    }
}

impl DiagnosticsRunner for QueuedDiagnosticsRunner {
    fn launch(&self, request: DiagnosticsRequest) {
        self.launch_count.fetch_add(1, Ordering::SeqCst);
        let _ = self.tx.send(request);
    }
}

/// Battery source whose readings and failures are scripted by the test
#[derive(Clone)]
pub struct ScriptedBatterySource {
    reading: Arc<Mutex<BatteryInfo>>,
    failing: Arc<AtomicBool>,
    read_count: Arc<AtomicUsize>,
}

impl ScriptedBatterySource {
    pub fn new(reading: BatteryInfo) -> Self {
        Self {
            reading: Arc::new(Mutex::new(reading)),
            failing: Arc::new(AtomicBool::new(false)),
            read_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_reading(&self, reading: BatteryInfo) {
        *self.reading.lock().unwrap() = reading;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn read_count(&self) -> usize {
        self.read_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl BatterySource for ScriptedBatterySource {
    async fn read(&self) -> Result<BatteryInfo> {
        self.read_count.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::unavailable("fuel gauge not responding"));
        }
        Ok(self.reading.lock().unwrap().clone())
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}
