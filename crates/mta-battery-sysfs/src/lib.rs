// # Sysfs Battery Source
//
// This crate provides a battery producer backed by the Linux power_supply
// class (`/sys/class/power_supply/<name>`).
//
// ## Attribute Mapping
//
// | sysfs attribute      | BatteryInfo field   | conversion        |
// |----------------------|---------------------|-------------------|
// | present              | installed           | "1" = installed   |
// | charge_full_design   | total_capacity      | uAh -> mAh        |
// | charge_full          | actual_capacity     | uAh -> mAh        |
// | charge_now           | remaining_charge    | uAh -> mAh        |
// | time_to_empty_now    | remaining_time      | seconds -> minutes|
// | cycle_count          | number_of_cycles    |                   |
// | status               | status/power_status |                   |
// | health               | condition/life      |                   |
// | model_name           | model_number        |                   |
// | serial_number        | serial_number       |                   |
//
// Attributes the driver does not expose, or exposes in an unparsable form,
// are reported as `None`. Only a missing supply directory fails the read.

use mta_core::config::BatterySourceConfig;
use mta_core::records::{
    BatteryCondition, BatteryInfo, BatteryLife, BatteryStatus, PowerStatus, ShortText,
};
use mta_core::traits::{BatterySource, BatterySourceFactory};
use mta_core::{Error, ProducerRegistry, Result};

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

/// Attempts made to reach the supply directory before giving up
const READ_ATTEMPTS: u32 = 3;

/// Delay between attempts
const RETRY_DELAY: Duration = Duration::from_millis(50);

/// Battery producer reading one power_supply directory
pub struct SysfsBatterySource {
    /// Supply directory, e.g. "/sys/class/power_supply/BAT0"
    path: PathBuf,
}

impl SysfsBatterySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the supply directory, retrying transient failures
    async fn ensure_present(&self) -> Result<()> {
        let mut last_error = None;
        for attempt in 1..=READ_ATTEMPTS {
            match tokio::fs::metadata(&self.path).await {
                Ok(meta) if meta.is_dir() => return Ok(()),
                Ok(_) => {
                    return Err(Error::unavailable(format!(
                        "{} is not a power_supply directory",
                        self.path.display()
                    )));
                }
                Err(e) => {
                    debug!(
                        "Battery supply {} not readable (attempt {}): {}",
                        self.path.display(),
                        attempt,
                        e
                    );
                    last_error = Some(e);
                }
            }
            if attempt < READ_ATTEMPTS {
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }

        Err(Error::unavailable(format!(
            "battery supply {} unavailable: {}",
            self.path.display(),
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    async fn attribute(&self, name: &str) -> Option<String> {
        match tokio::fs::read_to_string(self.path.join(name)).await {
            Ok(raw) => Some(raw.trim().to_string()),
            Err(_) => None,
        }
    }

    async fn number(&self, name: &str) -> Option<u64> {
        let raw = self.attribute(name).await?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring malformed battery attribute {}: {:?}", name, raw);
                None
            }
        }
    }

    /// Charge attribute in mAh
    async fn charge_mah(&self, name: &str) -> Option<u32> {
        self.number(name)
            .await
            .and_then(|uah| u32::try_from(uah / 1000).ok())
    }

    async fn text(&self, name: &str) -> Option<ShortText> {
        let raw = self.attribute(name).await?;
        if raw.is_empty() {
            return None;
        }
        let text = ShortText::lenient(raw);
        if text.is_none() {
            warn!("Ignoring oversized battery attribute {}", name);
        }
        text
    }
}

#[async_trait::async_trait]
impl BatterySource for SysfsBatterySource {
    async fn read(&self) -> Result<BatteryInfo> {
        self.ensure_present().await?;

        let installed = self.attribute("present").await.as_deref() != Some("0");
        if !installed {
            return Ok(BatteryInfo::not_installed());
        }

        let status = self.attribute("status").await;
        let health = self.attribute("health").await;

        Ok(BatteryInfo {
            installed,
            total_capacity: self.charge_mah("charge_full_design").await,
            actual_capacity: self.charge_mah("charge_full").await,
            remaining_charge: self.charge_mah("charge_now").await,
            remaining_time: self
                .number("time_to_empty_now")
                .await
                .and_then(|secs| u32::try_from(secs / 60).ok()),
            number_of_cycles: self
                .number("cycle_count")
                .await
                .and_then(|n| u32::try_from(n).ok()),
            power_status: status.as_deref().map(power_status),
            condition: health.as_deref().and_then(condition),
            status: status.as_deref().map(battery_status),
            life: health.as_deref().and_then(life),
            model_number: self.text("model_name").await,
            serial_number: self.text("serial_number").await,
            part_number: None,
            charger_firmware_revision: None,
            power_saving_mode: None,
        })
    }

    fn source_name(&self) -> &'static str {
        "sysfs"
    }
}

fn battery_status(status: &str) -> BatteryStatus {
    match status {
        "Charging" => BatteryStatus::Charging,
        "Discharging" => BatteryStatus::Discharging,
        "Full" | "Not charging" => BatteryStatus::Idle,
        _ => BatteryStatus::Unknown,
    }
}

/// Mains power is inferred from a battery that is not discharging
fn power_status(status: &str) -> PowerStatus {
    match status {
        "Discharging" => PowerStatus::Battery,
        "Charging" | "Full" | "Not charging" => PowerStatus::Ac,
        _ => PowerStatus::Unknown,
    }
}

fn condition(health: &str) -> Option<BatteryCondition> {
    match health {
        "Good" => Some(BatteryCondition::Good),
        "Unknown" => None,
        _ => Some(BatteryCondition::Bad),
    }
}

fn life(health: &str) -> Option<BatteryLife> {
    match health {
        "Good" => Some(BatteryLife::Good),
        "Dead" | "Over voltage" | "Unspecified failure" => Some(BatteryLife::NeedReplacement),
        _ => None,
    }
}

/// Factory for creating sysfs battery sources
pub struct SysfsBatterySourceFactory;

impl BatterySourceFactory for SysfsBatterySourceFactory {
    fn create(&self, config: &BatterySourceConfig) -> Result<Box<dyn BatterySource>> {
        match config {
            BatterySourceConfig::Sysfs { path } => Ok(Box::new(SysfsBatterySource::new(path))),
            _ => Err(Error::config("Invalid config for sysfs battery source")),
        }
    }
}

/// Register the sysfs battery source with a registry
pub fn register(registry: &ProducerRegistry) {
    registry.register_battery_source("sysfs", Box::new(SysfsBatterySourceFactory));
}
