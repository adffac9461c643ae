//! DECT base station state
//!
//! Handsets can only be registered while the base is enabled and its
//! registration window is open. Disabling the base also closes the window.

use crate::config::DectConfig;
use crate::error::{Error, Result};
use crate::records::{DectInfo, HandsetRecord, LongValue, Snapshot};
use crate::sync::{read, write};
use std::collections::BTreeMap;
use std::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug)]
struct DectSettings {
    enabled: bool,
    registration_mode: bool,
    info: DectInfo,
}

/// Lock order: `settings` before `handsets`
pub struct DectRegistry {
    settings: RwLock<DectSettings>,
    handsets: RwLock<BTreeMap<u32, HandsetRecord>>,
}

impl DectRegistry {
    pub fn new(config: &DectConfig) -> Result<Self> {
        let info = DectInfo {
            hardware_version: LongValue::new(config.hardware_version.as_str())?,
            rfpi: LongValue::new(config.rfpi.as_str())?,
            software_version: LongValue::new(config.software_version.as_str())?,
            pin: LongValue::default(),
        };
        Ok(Self {
            settings: RwLock::new(DectSettings {
                enabled: false,
                registration_mode: false,
                info,
            }),
            handsets: RwLock::new(BTreeMap::new()),
        })
    }

    pub fn enabled(&self) -> bool {
        read(&self.settings).enabled
    }

    pub fn set_enabled(&self, enabled: bool) {
        let mut settings = write(&self.settings);
        settings.enabled = enabled;
        if !enabled {
            settings.registration_mode = false;
        }
        info!("DECT base {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn registration_mode(&self) -> bool {
        read(&self.settings).registration_mode
    }

    /// Open or close the registration window
    ///
    /// Opening requires the base to be enabled.
    pub fn set_registration_mode(&self, open: bool) -> Result<()> {
        let mut settings = write(&self.settings);
        if open && !settings.enabled {
            return Err(Error::unavailable("DECT base is disabled"));
        }
        settings.registration_mode = open;
        debug!(
            "DECT registration window {}",
            if open { "opened" } else { "closed" }
        );
        Ok(())
    }

    pub fn info(&self) -> DectInfo {
        read(&self.settings).info.clone()
    }

    pub fn set_pin(&self, pin: &str) -> Result<()> {
        let pin = LongValue::new(pin)?;
        write(&self.settings).info.pin = pin;
        Ok(())
    }

    pub fn pin(&self) -> LongValue {
        read(&self.settings).info.pin.clone()
    }

    /// Add or refresh a handset
    ///
    /// Returns `true` for a newly known handset.
    pub fn register_handset(&self, handset: HandsetRecord) -> Result<bool> {
        let settings = read(&self.settings);
        if !settings.enabled {
            return Err(Error::unavailable("DECT base is disabled"));
        }
        if !settings.registration_mode {
            return Err(Error::unavailable("DECT registration window is closed"));
        }

        let instance = handset.instance_number;
        let added = write(&self.handsets).insert(instance, handset).is_none();
        drop(settings);

        info!(
            "DECT handset {} {}",
            instance,
            if added { "registered" } else { "re-registered" }
        );
        Ok(added)
    }

    pub fn deregister_handset(&self, instance: u32) -> Result<HandsetRecord> {
        let removed = write(&self.handsets)
            .remove(&instance)
            .ok_or_else(|| Error::not_found(format!("DECT handset {}", instance)))?;
        info!("DECT handset {} deregistered", instance);
        Ok(removed)
    }

    /// Update the reachability of a registered handset
    pub fn set_handset_status(
        &self,
        instance: u32,
        active: bool,
        last_active_time: &str,
    ) -> Result<()> {
        let last_active_time = LongValue::new(last_active_time)?;
        let mut handsets = write(&self.handsets);
        let handset = handsets
            .get_mut(&instance)
            .ok_or_else(|| Error::not_found(format!("DECT handset {}", instance)))?;
        handset.status = active;
        handset.last_active_time = last_active_time;
        debug!("DECT handset {} active={}", instance, active);
        Ok(())
    }

    /// Handsets ordered by instance number
    pub fn handsets(&self) -> Snapshot<HandsetRecord> {
        read(&self.handsets).values().cloned().collect()
    }

    pub fn handset(&self, instance: u32) -> Result<HandsetRecord> {
        read(&self.handsets)
            .get(&instance)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("DECT handset {}", instance)))
    }
}
