//! HAL-compatible facade
//!
//! [`MtaHal`] mirrors the MTA HAL entry points one to one. Every method
//! returns [`HalResult`]: the rich [`crate::Error`] is logged at warn level
//! and collapsed to a payload-free [`HalError`], matching the binary
//! success/failure contract of the HAL. Variable-length collections come
//! back as a single `(count, entries)` snapshot.
//!
//! Battery getters read through to the battery producer on every call.
//!
//! The HAL's `InitDB` has no method here. Initialization is building the
//! device with `MtaDevice::builder(config).build()` and wrapping it with
//! [`MtaHal::new`], or both at once with [`MtaHal::init`]. Either way the
//! caller owns the returned [`DispatchLoop`] and must spawn it before
//! callbacks are delivered.

use crate::config::MtaConfig;
use crate::device::MtaDevice;
use crate::dispatch::{DispatchLoop, Subscription};
use crate::error::{Error, Result};
use crate::records::{
    BatteryCondition, BatteryInfo, BatteryLife, BatteryStatus, CallRecord, CallpStatus, DectInfo,
    DhcpV4Lease, DhcpV6Lease, DsxLogEntry, HandsetRecord, LineInfo, MtaLogEntry, MtaStatus,
    PowerSavingMode, PowerStatus, ProvisionStatus, ProvisioningParams, ServiceFlow, ShortText,
    SignallingLogEntry, Snapshot,
};
use crate::traits::LineStatusSubscriber;
use std::sync::Arc;
use tracing::warn;

/// Failure at the HAL boundary; details are in the log
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("MTA HAL operation failed")]
pub struct HalError;

pub type HalResult<T> = std::result::Result<T, HalError>;

trait Collapse<T> {
    fn collapse(self, op: &'static str) -> HalResult<T>;
}

impl<T> Collapse<T> for Result<T> {
    fn collapse(self, op: &'static str) -> HalResult<T> {
        self.map_err(|e| {
            warn!("{} failed: {}", op, e);
            HalError
        })
    }
}

/// HAL facade over a shared [`MtaDevice`]
#[derive(Clone)]
pub struct MtaHal {
    device: Arc<MtaDevice>,
}

impl MtaHal {
    pub fn new(device: Arc<MtaDevice>) -> Self {
        Self { device }
    }

    /// Build a device from `config` and wrap it, in place of `InitDB`
    pub fn init(config: MtaConfig) -> HalResult<(Self, DispatchLoop)> {
        let (device, dispatch) = MtaDevice::builder(config).build().collapse("init")?;
        Ok((Self::new(Arc::new(device)), dispatch))
    }

    pub fn device(&self) -> &Arc<MtaDevice> {
        &self.device
    }

    pub fn get_dhcp_info(&self) -> HalResult<DhcpV4Lease> {
        self.device
            .dhcpv4()
            .lease()
            .ok_or_else(|| Error::unavailable("no DHCPv4 lease"))
            .collapse("get_dhcp_info")
    }

    pub fn get_dhcpv6_info(&self) -> HalResult<DhcpV6Lease> {
        self.device
            .dhcpv6()
            .lease()
            .ok_or_else(|| Error::unavailable("no DHCPv6 lease"))
            .collapse("get_dhcpv6_info")
    }

    pub fn line_table_get_number_of_entries(&self) -> HalResult<usize> {
        Ok(self.device.lines().line_count())
    }

    /// Line at a zero-based table index
    pub fn line_table_get_entry(&self, index: usize) -> HalResult<LineInfo> {
        self.device
            .lines()
            .get_line(index)
            .collapse("line_table_get_entry")
    }

    pub fn trigger_diagnostics(&self, line_number: u32) -> HalResult<()> {
        self.device
            .diagnostics()
            .trigger(line_number)
            .collapse("trigger_diagnostics")
    }

    pub fn get_service_flow(&self) -> HalResult<Snapshot<ServiceFlow>> {
        Ok(self.device.service_flows())
    }

    pub fn dect_get_enable(&self) -> HalResult<bool> {
        Ok(self.device.dect().enabled())
    }

    pub fn dect_set_enable(&self, enable: bool) -> HalResult<()> {
        self.device.dect().set_enabled(enable);
        Ok(())
    }

    pub fn dect_get_registration_mode(&self) -> HalResult<bool> {
        Ok(self.device.dect().registration_mode())
    }

    pub fn dect_set_registration_mode(&self, open: bool) -> HalResult<()> {
        self.device
            .dect()
            .set_registration_mode(open)
            .collapse("dect_set_registration_mode")
    }

    pub fn dect_deregister_handset(&self, instance: u32) -> HalResult<()> {
        self.device
            .dect()
            .deregister_handset(instance)
            .map(|_| ())
            .collapse("dect_deregister_handset")
    }

    pub fn get_dect(&self) -> HalResult<DectInfo> {
        Ok(self.device.dect().info())
    }

    pub fn get_dect_pin(&self) -> HalResult<String> {
        Ok(self.device.dect().pin().into_inner())
    }

    pub fn set_dect_pin(&self, pin: &str) -> HalResult<()> {
        self.device.dect().set_pin(pin).collapse("set_dect_pin")
    }

    pub fn get_handsets(&self) -> HalResult<Snapshot<HandsetRecord>> {
        Ok(self.device.dect().handsets())
    }

    pub fn get_calls(&self, line_instance: u32) -> HalResult<Snapshot<CallRecord>> {
        self.device.calls().calls(line_instance).collapse("get_calls")
    }

    pub fn clear_calls(&self, line_instance: u32) -> HalResult<()> {
        self.device
            .calls()
            .clear_calls(line_instance)
            .map(|_| ())
            .collapse("clear_calls")
    }

    pub fn get_callp(&self, line_number: u32) -> HalResult<CallpStatus> {
        self.device.lines().callp(line_number).collapse("get_callp")
    }

    pub fn get_dsx_logs(&self) -> HalResult<Snapshot<DsxLogEntry>> {
        Ok(self.device.dsx_log().snapshot())
    }

    pub fn get_dsx_log_enable(&self) -> HalResult<bool> {
        Ok(self.device.dsx_log().is_enabled())
    }

    pub fn set_dsx_log_enable(&self, enable: bool) -> HalResult<()> {
        self.device.dsx_log().set_enabled(enable);
        Ok(())
    }

    pub fn clear_dsx_log(&self, clear: bool) -> HalResult<()> {
        self.device.dsx_log().clear(clear);
        Ok(())
    }

    pub fn get_call_signalling_logs(&self) -> HalResult<Snapshot<SignallingLogEntry>> {
        Ok(self.device.signalling_log().snapshot())
    }

    pub fn get_call_signalling_log_enable(&self) -> HalResult<bool> {
        Ok(self.device.signalling_log().is_enabled())
    }

    pub fn set_call_signalling_log_enable(&self, enable: bool) -> HalResult<()> {
        self.device.signalling_log().set_enabled(enable);
        Ok(())
    }

    pub fn clear_call_signalling_log(&self, clear: bool) -> HalResult<()> {
        self.device.signalling_log().clear(clear);
        Ok(())
    }

    pub fn get_mta_log(&self) -> HalResult<Snapshot<MtaLogEntry>> {
        Ok(self.device.mta_log().snapshot())
    }

    pub async fn battery_get_info(&self) -> HalResult<BatteryInfo> {
        self.device
            .battery()
            .refresh()
            .await
            .map(|snapshot| snapshot.info)
            .collapse("battery_get_info")
    }

    pub async fn battery_get_installed(&self) -> HalResult<bool> {
        self.battery_field("battery_get_installed", |b| Some(b.installed))
            .await
    }

    pub async fn battery_get_total_capacity(&self) -> HalResult<u32> {
        self.battery_field("battery_get_total_capacity", |b| b.total_capacity)
            .await
    }

    pub async fn battery_get_actual_capacity(&self) -> HalResult<u32> {
        self.battery_field("battery_get_actual_capacity", |b| b.actual_capacity)
            .await
    }

    pub async fn battery_get_remaining_charge(&self) -> HalResult<u32> {
        self.battery_field("battery_get_remaining_charge", |b| b.remaining_charge)
            .await
    }

    pub async fn battery_get_remaining_time(&self) -> HalResult<u32> {
        self.battery_field("battery_get_remaining_time", |b| b.remaining_time)
            .await
    }

    pub async fn battery_get_number_of_cycles(&self) -> HalResult<u32> {
        self.battery_field("battery_get_number_of_cycles", |b| b.number_of_cycles)
            .await
    }

    pub async fn battery_get_power_status(&self) -> HalResult<PowerStatus> {
        self.battery_field("battery_get_power_status", |b| b.power_status)
            .await
    }

    pub async fn battery_get_condition(&self) -> HalResult<BatteryCondition> {
        self.battery_field("battery_get_condition", |b| b.condition)
            .await
    }

    pub async fn battery_get_status(&self) -> HalResult<BatteryStatus> {
        self.battery_field("battery_get_status", |b| b.status).await
    }

    pub async fn battery_get_life(&self) -> HalResult<BatteryLife> {
        self.battery_field("battery_get_life", |b| b.life).await
    }

    pub async fn battery_get_model_number(&self) -> HalResult<ShortText> {
        self.battery_field("battery_get_model_number", |b| b.model_number.clone())
            .await
    }

    pub async fn battery_get_serial_number(&self) -> HalResult<ShortText> {
        self.battery_field("battery_get_serial_number", |b| b.serial_number.clone())
            .await
    }

    pub async fn battery_get_part_number(&self) -> HalResult<ShortText> {
        self.battery_field("battery_get_part_number", |b| b.part_number.clone())
            .await
    }

    pub async fn battery_get_charger_firmware_revision(&self) -> HalResult<ShortText> {
        self.battery_field("battery_get_charger_firmware_revision", |b| {
            b.charger_firmware_revision.clone()
        })
        .await
    }

    pub async fn battery_get_power_saving_mode_status(&self) -> HalResult<PowerSavingMode> {
        self.battery_field("battery_get_power_saving_mode_status", |b| {
            b.power_saving_mode
        })
        .await
    }

    pub fn get_mta_reset_count(&self) -> HalResult<u64> {
        Ok(self.device.mta_reset_count())
    }

    pub fn get_line_reset_count(&self) -> HalResult<u64> {
        Ok(self.device.line_reset_count())
    }

    /// IPv4 and IPv6 DHCP status
    pub fn get_dhcp_status(&self) -> HalResult<(MtaStatus, MtaStatus)> {
        Ok(self.device.dhcp_status())
    }

    pub fn get_config_file_status(&self) -> HalResult<MtaStatus> {
        Ok(self.device.config_file().state())
    }

    /// Registration status of every line
    ///
    /// `array_size` is the caller's buffer size and must cover every line.
    pub fn get_line_register_status(&self, array_size: usize) -> HalResult<Vec<MtaStatus>> {
        let statuses = self.device.lines().registration_statuses();
        if array_size < statuses.len() {
            return Err(Error::out_of_range(array_size, statuses.len()))
                .collapse("get_line_register_status");
        }
        Ok(statuses)
    }

    pub fn dev_reset_now(&self, reset: bool) -> HalResult<()> {
        self.device.dev_reset_now(reset);
        Ok(())
    }

    pub fn get_mta_operational_status(&self) -> HalResult<MtaStatus> {
        Ok(self.device.operational().state())
    }

    pub fn get_mta_provisioning_status(&self) -> HalResult<ProvisionStatus> {
        Ok(self.device.provisioning_status())
    }

    pub fn start_provisioning(&self, params: ProvisioningParams) -> HalResult<()> {
        self.device
            .start_provisioning(params)
            .collapse("start_provisioning")
    }

    /// Register the line-status subscriber
    ///
    /// Keep the returned handle alive; dropping it unregisters.
    pub fn line_register_status_callback_register(
        &self,
        subscriber: &Arc<dyn LineStatusSubscriber>,
    ) -> HalResult<Subscription> {
        Ok(self.device.dispatcher().register(subscriber))
    }

    async fn battery_field<T, F>(&self, op: &'static str, field: F) -> HalResult<T>
    where
        F: FnOnce(&BatteryInfo) -> Option<T>,
    {
        let snapshot = self.device.battery().refresh().await.collapse(op)?;
        field(&snapshot.info)
            .ok_or_else(|| Error::unavailable("battery field not reported"))
            .collapse(op)
    }
}
