//! Configuration types for the MTA aggregator
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

/// Upper bound on the number of lines a device may be built with
pub const MAX_LINE_COUNT: u32 = 16;

/// Main aggregator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MtaConfig {
    /// Number of telephony lines, fixed for the device lifetime
    #[serde(default = "default_line_count")]
    pub line_count: u32,

    /// Capacity of the DSX log ring buffer
    #[serde(default = "default_dsx_log_capacity")]
    pub dsx_log_capacity: usize,

    /// Capacity of the MTA event log ring buffer
    #[serde(default = "default_mta_log_capacity")]
    pub mta_log_capacity: usize,

    /// Capacity of the call-signalling log ring buffer
    #[serde(default = "default_signalling_log_capacity")]
    pub signalling_log_capacity: usize,

    /// Capacity of the line-status notification channel
    ///
    /// When full, producers never block: the dispatcher falls back to a
    /// single resync delivery carrying the current state.
    #[serde(default = "default_dispatch_channel_capacity")]
    pub dispatch_channel_capacity: usize,

    /// Battery producer settings
    #[serde(default)]
    pub battery: BatteryConfig,

    /// DECT base module identity
    #[serde(default)]
    pub dect: DectConfig,
}

impl MtaConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            line_count: default_line_count(),
            dsx_log_capacity: default_dsx_log_capacity(),
            mta_log_capacity: default_mta_log_capacity(),
            signalling_log_capacity: default_signalling_log_capacity(),
            dispatch_channel_capacity: default_dispatch_channel_capacity(),
            battery: BatteryConfig::default(),
            dect: DectConfig::default(),
        }
    }

    /// Parse a JSON configuration document and validate it
    pub fn from_json_str(json: &str) -> Result<Self, crate::Error> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the line count
    pub fn with_line_count(mut self, line_count: u32) -> Self {
        self.line_count = line_count;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.line_count == 0 || self.line_count > MAX_LINE_COUNT {
            return Err(crate::Error::config(format!(
                "line_count must be between 1 and {}, got {}",
                MAX_LINE_COUNT, self.line_count
            )));
        }
        if self.dsx_log_capacity == 0 {
            return Err(crate::Error::config("dsx_log_capacity must be > 0"));
        }
        if self.mta_log_capacity == 0 {
            return Err(crate::Error::config("mta_log_capacity must be > 0"));
        }
        if self.signalling_log_capacity == 0 {
            return Err(crate::Error::config("signalling_log_capacity must be > 0"));
        }
        if self.dispatch_channel_capacity == 0 {
            return Err(crate::Error::config("dispatch_channel_capacity must be > 0"));
        }

        self.battery.validate()?;
        self.dect.validate()?;

        Ok(())
    }
}

impl Default for MtaConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Battery producer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatteryConfig {
    /// Where battery readings come from
    #[serde(default)]
    pub source: BatterySourceConfig,

    /// Poll interval of the background battery poller (in seconds)
    #[serde(default = "default_battery_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl BatteryConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.poll_interval_secs == 0 {
            return Err(crate::Error::config("battery poll interval must be > 0"));
        }
        self.source.validate()
    }
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            source: BatterySourceConfig::default(),
            poll_interval_secs: default_battery_poll_interval_secs(),
        }
    }
}

/// Battery source configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatterySourceConfig {
    /// No battery producer; battery reads report `Unavailable`
    #[default]
    None,

    /// Linux power_supply sysfs class
    Sysfs {
        /// Directory of the supply, e.g. "/sys/class/power_supply/BAT0"
        path: String,
    },

    /// Custom battery producer
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl BatterySourceConfig {
    /// Validate the battery source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            BatterySourceConfig::Sysfs { path } => {
                if path.is_empty() {
                    return Err(crate::Error::config("sysfs battery path cannot be empty"));
                }
                Ok(())
            }
            BatterySourceConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom battery source factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom battery source config cannot be null",
                    ));
                }
                Ok(())
            }
            BatterySourceConfig::None => Ok(()),
        }
    }

    /// Get the factory name this configuration resolves to
    pub fn type_name(&self) -> &str {
        match self {
            BatterySourceConfig::None => "none",
            BatterySourceConfig::Sysfs { .. } => "sysfs",
            BatterySourceConfig::Custom { factory, .. } => factory,
        }
    }
}

/// DECT base module identity reported through `get_dect`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DectConfig {
    #[serde(default)]
    pub hardware_version: String,
    #[serde(default)]
    pub software_version: String,
    #[serde(default)]
    pub rfpi: String,
}

impl DectConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        for (name, value) in [
            ("hardware_version", &self.hardware_version),
            ("software_version", &self.software_version),
            ("rfpi", &self.rfpi),
        ] {
            crate::records::LongValue::new(value.as_str())
                .map_err(|e| crate::Error::config(format!("dect.{}: {}", name, e)))?;
        }
        Ok(())
    }
}

fn default_line_count() -> u32 {
    8
}

fn default_dsx_log_capacity() -> usize {
    256
}

fn default_mta_log_capacity() -> usize {
    512
}

fn default_signalling_log_capacity() -> usize {
    256
}

fn default_dispatch_channel_capacity() -> usize {
    1000
}

fn default_battery_poll_interval_secs() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = MtaConfig::default();
        assert_eq!(config.line_count, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_line_count_bounds() {
        assert!(MtaConfig::new().with_line_count(0).validate().is_err());
        assert!(MtaConfig::new().with_line_count(16).validate().is_ok());
        assert!(MtaConfig::new().with_line_count(17).validate().is_err());
    }

    #[test]
    fn test_from_json_applies_defaults() {
        let config = MtaConfig::from_json_str(
            r#"{ "line_count": 2, "battery": { "source": { "type": "sysfs", "path": "/sys/class/power_supply/BAT0" } } }"#,
        )
        .unwrap();

        assert_eq!(config.line_count, 2);
        assert_eq!(config.dsx_log_capacity, 256);
        assert_eq!(config.battery.poll_interval_secs, 60);
        assert_eq!(config.battery.source.type_name(), "sysfs");
    }

    #[test]
    fn test_empty_sysfs_path_rejected() {
        let err = MtaConfig::from_json_str(
            r#"{ "battery": { "source": { "type": "sysfs", "path": "" } } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_oversized_dect_identity_rejected() {
        let mut config = MtaConfig::new();
        config.dect.rfpi = "F".repeat(65);
        assert!(config.validate().is_err());
    }
}
