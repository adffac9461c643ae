//! The MTA device aggregate
//!
//! [`MtaDevice`] owns every component: the line table and its call and
//! diagnostics views, the four provisioning machines, DECT, service flows,
//! the event logs and the battery cache. Components lock independently;
//! there is no device-wide lock.
//!
//! ## Construction
//!
//! ```rust,ignore
//! let (device, dispatch) = MtaDevice::builder(config)
//!     .battery_source(source)
//!     .diagnostics_runner(runner)
//!     .build()?;
//! tokio::spawn(dispatch.run());
//! ```

use crate::battery::{BatteryMonitor, BatteryPoller};
use crate::config::MtaConfig;
use crate::dect::DectRegistry;
use crate::dispatch::{CallbackDispatcher, DispatchLoop, StatusNotifier};
use crate::error::{Error, Result};
use crate::lines::{CallSessionTracker, DeviceClock, DiagnosticsCoordinator, LineRegistry};
use crate::logs::LogBuffer;
use crate::provisioning::ProvisioningMachine;
use crate::records::{
    Description, DhcpV4Lease, DhcpV6Lease, DiagnosticsReport, DiagnosticsState, DsxLogEntry,
    LongValue, MtaLogEntry, MtaStatus, ProvisionStatus, ProvisioningParams, ServiceFlow,
    SignallingLogEntry, Snapshot,
};
use crate::sync::{lock, read, write};
use crate::traits::{BatterySource, DiagnosticsRunner};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// MTA event id recorded for a device reset
const EVENT_DEVICE_RESET: u32 = 0x0400_0001;

/// Builder for [`MtaDevice`]
pub struct MtaDeviceBuilder {
    config: MtaConfig,
    battery_source: Option<Box<dyn BatterySource>>,
    diagnostics_runner: Option<Arc<dyn DiagnosticsRunner>>,
}

impl MtaDeviceBuilder {
    /// Attach the battery producer
    pub fn battery_source(mut self, source: Box<dyn BatterySource>) -> Self {
        self.battery_source = Some(source);
        self
    }

    /// Attach the diagnostics producer
    pub fn diagnostics_runner(mut self, runner: Arc<dyn DiagnosticsRunner>) -> Self {
        self.diagnostics_runner = Some(runner);
        self
    }

    /// Validate the configuration and build the device
    ///
    /// Also returns the dispatch loop that delivers line-status updates; it
    /// must be spawned for the subscriber to hear anything.
    pub fn build(self) -> Result<(MtaDevice, DispatchLoop)> {
        self.config.validate()?;

        let (notifier, status_rx) = StatusNotifier::channel(self.config.dispatch_channel_capacity);
        let lines = Arc::new(LineRegistry::new(
            self.config.line_count,
            notifier,
            DeviceClock::new(),
        ));
        let dispatcher = CallbackDispatcher::new();
        let dispatch = DispatchLoop::new(status_rx, &lines, &dispatcher);

        let device = MtaDevice {
            calls: CallSessionTracker::new(lines.clone()),
            diagnostics: DiagnosticsCoordinator::new(lines.clone(), self.diagnostics_runner),
            lines,
            dispatcher,
            dhcpv4: ProvisioningMachine::new("dhcpv4"),
            dhcpv6: ProvisioningMachine::new("dhcpv6"),
            config_file: ProvisioningMachine::new("config-file"),
            operational: ProvisioningMachine::new("operational"),
            provisioning_params: Mutex::new(None),
            dect: DectRegistry::new(&self.config.dect)?,
            service_flows: RwLock::new(BTreeMap::new()),
            dsx_log: LogBuffer::new("dsx", self.config.dsx_log_capacity)?,
            mta_log: LogBuffer::new("mta", self.config.mta_log_capacity)?,
            signalling_log: LogBuffer::new("signalling", self.config.signalling_log_capacity)?,
            battery: Arc::new(BatteryMonitor::new(self.battery_source)),
            mta_reset_count: AtomicU64::new(0),
            line_reset_count: AtomicU64::new(0),
            config: self.config,
        };

        info!(
            "MTA device built with {} lines (battery source: {})",
            device.lines.line_count(),
            if device.battery.has_source() { "yes" } else { "none" }
        );
        Ok((device, dispatch))
    }
}

/// Aggregated telephony state of one MTA
pub struct MtaDevice {
    config: MtaConfig,
    lines: Arc<LineRegistry>,
    calls: CallSessionTracker,
    diagnostics: DiagnosticsCoordinator,
    dispatcher: CallbackDispatcher,
    dhcpv4: ProvisioningMachine<DhcpV4Lease>,
    dhcpv6: ProvisioningMachine<DhcpV6Lease>,
    config_file: ProvisioningMachine,
    operational: ProvisioningMachine,
    provisioning_params: Mutex<Option<ProvisioningParams>>,
    dect: DectRegistry,
    service_flows: RwLock<BTreeMap<u32, ServiceFlow>>,
    dsx_log: LogBuffer<DsxLogEntry>,
    mta_log: LogBuffer<MtaLogEntry>,
    signalling_log: LogBuffer<SignallingLogEntry>,
    battery: Arc<BatteryMonitor>,
    mta_reset_count: AtomicU64,
    line_reset_count: AtomicU64,
}

impl MtaDevice {
    pub fn builder(config: MtaConfig) -> MtaDeviceBuilder {
        MtaDeviceBuilder {
            config,
            battery_source: None,
            diagnostics_runner: None,
        }
    }

    pub fn config(&self) -> &MtaConfig {
        &self.config
    }

    pub fn lines(&self) -> &LineRegistry {
        &self.lines
    }

    pub fn calls(&self) -> &CallSessionTracker {
        &self.calls
    }

    pub fn diagnostics(&self) -> &DiagnosticsCoordinator {
        &self.diagnostics
    }

    pub fn dispatcher(&self) -> &CallbackDispatcher {
        &self.dispatcher
    }

    pub fn dect(&self) -> &DectRegistry {
        &self.dect
    }

    pub fn dhcpv4(&self) -> &ProvisioningMachine<DhcpV4Lease> {
        &self.dhcpv4
    }

    pub fn dhcpv6(&self) -> &ProvisioningMachine<DhcpV6Lease> {
        &self.dhcpv6
    }

    pub fn config_file(&self) -> &ProvisioningMachine {
        &self.config_file
    }

    pub fn operational(&self) -> &ProvisioningMachine {
        &self.operational
    }

    pub fn battery(&self) -> &BatteryMonitor {
        &self.battery
    }

    /// Poller that keeps the battery cache warm
    pub fn battery_poller(&self, interval: Duration) -> BatteryPoller {
        BatteryPoller::new(self.battery.clone(), interval)
    }

    pub fn dsx_log(&self) -> &LogBuffer<DsxLogEntry> {
        &self.dsx_log
    }

    pub fn mta_log(&self) -> &LogBuffer<MtaLogEntry> {
        &self.mta_log
    }

    pub fn signalling_log(&self) -> &LogBuffer<SignallingLogEntry> {
        &self.signalling_log
    }

    /// Completion entry point for the diagnostics producer
    pub fn report_diagnostics(
        &self,
        line_instance: u32,
        report: DiagnosticsReport,
    ) -> Result<DiagnosticsState> {
        self.diagnostics.report(line_instance, report)
    }

    /// Record a DSX log entry; `None` while the log is disabled
    pub fn log_dsx(&self, description: &str, level: u32) -> Result<Option<u64>> {
        let description = Description::new(description)?;
        Ok(self.dsx_log.append(DsxLogEntry {
            id: 0,
            time: Utc::now(),
            description,
            level,
        }))
    }

    /// Record an MTA event
    pub fn log_mta_event(
        &self,
        event_id: u32,
        event_level: &str,
        description: impl Into<String>,
    ) -> Result<Option<u64>> {
        let event_level = LongValue::new(event_level)?;
        Ok(self.mta_log.append(MtaLogEntry {
            index: 0,
            event_id,
            event_level,
            time: Utc::now(),
            description: description.into(),
        }))
    }

    /// Record a call-signalling message; `None` while the log is disabled
    pub fn log_signalling(&self, line_number: u32, message: impl Into<String>) -> Option<u64> {
        self.signalling_log.append(SignallingLogEntry {
            id: 0,
            time: Utc::now(),
            line_number,
            message: message.into(),
        })
    }

    /// Add or replace a service flow keyed by SFID
    pub fn upsert_service_flow(&self, flow: ServiceFlow) {
        let sfid = flow.sfid;
        if write(&self.service_flows).insert(sfid, flow).is_none() {
            debug!("Service flow {} added", sfid);
        }
    }

    pub fn remove_service_flow(&self, sfid: u32) -> Result<ServiceFlow> {
        write(&self.service_flows)
            .remove(&sfid)
            .ok_or_else(|| Error::not_found(format!("service flow {}", sfid)))
    }

    pub fn service_flow(&self, sfid: u32) -> Result<ServiceFlow> {
        read(&self.service_flows)
            .get(&sfid)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("service flow {}", sfid)))
    }

    /// Service flows ordered by SFID
    pub fn service_flows(&self) -> Snapshot<ServiceFlow> {
        read(&self.service_flows).values().cloned().collect()
    }

    /// IPv4 and IPv6 DHCP status, each read independently
    pub fn dhcp_status(&self) -> (MtaStatus, MtaStatus) {
        (self.dhcpv4.state(), self.dhcpv6.state())
    }

    /// Provisioned once the config file and at least one IP family completed
    pub fn provisioning_status(&self) -> ProvisionStatus {
        let (v4, v6) = self.dhcp_status();
        let family_up = v4 == MtaStatus::Complete || v6 == MtaStatus::Complete;
        if family_up && self.config_file.state() == MtaStatus::Complete {
            ProvisionStatus::Provisioned
        } else {
            ProvisionStatus::NonProvisioned
        }
    }

    /// Store provisioning parameters and start DHCP for the selected families
    ///
    /// A family already in `Started` keeps its cycle running.
    pub fn start_provisioning(&self, params: ProvisioningParams) -> Result<()> {
        let ip_mode = params.ip_mode;
        if ip_mode.includes_v4() {
            self.dhcpv4.ensure_started();
        }
        if ip_mode.includes_v6() {
            self.dhcpv6.ensure_started();
        }
        *lock(&self.provisioning_params) = Some(params);

        info!("Provisioning started ({:?})", ip_mode);
        Ok(())
    }

    pub fn provisioning_params(&self) -> Option<ProvisioningParams> {
        lock(&self.provisioning_params).clone()
    }

    /// Reset provisioning and line registration
    ///
    /// `false` is a no-op. Returns the number of lines whose registration
    /// was reset from a non-`Init` value.
    pub fn dev_reset_now(&self, reset: bool) -> usize {
        if !reset {
            return 0;
        }
        warn!("MTA device reset requested");

        self.dhcpv4.reset();
        self.dhcpv6.reset();
        self.config_file.reset();
        self.operational.reset();

        let lines_reset = self.lines.reset_registrations();
        self.mta_reset_count.fetch_add(1, Ordering::Relaxed);
        self.line_reset_count
            .fetch_add(lines_reset as u64, Ordering::Relaxed);

        if let Err(e) = self.log_mta_event(
            EVENT_DEVICE_RESET,
            "informational",
            format!("MTA reset, {} line registrations cleared", lines_reset),
        ) {
            debug!("Failed to record reset event: {}", e);
        }
        lines_reset
    }

    pub fn mta_reset_count(&self) -> u64 {
        self.mta_reset_count.load(Ordering::Relaxed)
    }

    pub fn line_reset_count(&self) -> u64 {
        self.line_reset_count.load(Ordering::Relaxed)
    }
}
