//! Plugin-based producer registry
//!
//! Producer crates register factories by type name at startup; the daemon
//! then builds producers from configuration without hardcoding any of them.
//!
//! ## Registration
//!
//! ```rust,ignore
//! // In the mta-battery-sysfs crate
//! pub fn register(registry: &ProducerRegistry) {
//!     registry.register_battery_source("sysfs", Box::new(SysfsBatterySourceFactory));
//! }
//! ```

use crate::config::BatterySourceConfig;
use crate::error::{Error, Result};
use crate::sync::{read, write};
use crate::traits::{BatterySource, BatterySourceFactory};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// Registry of producer factories
///
/// Uses interior mutability with RwLock, allowing concurrent reads and
/// exclusive writes.
#[derive(Default)]
pub struct ProducerRegistry {
    battery_sources: RwLock<HashMap<String, Box<dyn BatterySourceFactory>>>,
}

impl ProducerRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a battery source factory
    ///
    /// # Parameters
    ///
    /// - `name`: Source type name (e.g., "sysfs")
    /// - `factory`: Factory object for creating source instances
    pub fn register_battery_source(
        &self,
        name: impl Into<String>,
        factory: Box<dyn BatterySourceFactory>,
    ) {
        let name = name.into();
        debug!("Registering battery source factory: {}", name);
        write(&self.battery_sources).insert(name, factory);
    }

    /// Create a battery source from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(None)`: The configuration selects no battery source
    /// - `Ok(Some(_))`: Created source instance
    /// - `Err(Error)`: If the type is not registered or creation fails
    pub fn create_battery_source(
        &self,
        config: &BatterySourceConfig,
    ) -> Result<Option<Box<dyn BatterySource>>> {
        if matches!(config, BatterySourceConfig::None) {
            return Ok(None);
        }

        let source_type = config.type_name();
        let sources = read(&self.battery_sources);
        let factory = sources.get(source_type).ok_or_else(|| {
            Error::config(format!("Unknown battery source type: {}", source_type))
        })?;

        factory.create(config).map(Some)
    }

    /// List all registered battery source types
    pub fn list_battery_sources(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.battery_sources).keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a battery source type is registered
    pub fn has_battery_source(&self, name: &str) -> bool {
        read(&self.battery_sources).contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockFactory;

    impl BatterySourceFactory for MockFactory {
        fn create(&self, _config: &BatterySourceConfig) -> Result<Box<dyn BatterySource>> {
            Err(Error::not_found("Mock battery source not implemented"))
        }
    }

    #[test]
    fn test_registry_registration() {
        let registry = ProducerRegistry::new();
        assert!(!registry.has_battery_source("mock"));

        registry.register_battery_source("mock", Box::new(MockFactory));

        assert!(registry.has_battery_source("mock"));
        assert_eq!(registry.list_battery_sources(), vec!["mock".to_string()]);
    }

    #[test]
    fn test_none_config_creates_nothing() {
        let registry = ProducerRegistry::new();
        assert!(registry
            .create_battery_source(&BatterySourceConfig::None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_unknown_type_is_config_error() {
        let registry = ProducerRegistry::new();
        let config = BatterySourceConfig::Sysfs {
            path: "/sys/class/power_supply/BAT0".to_string(),
        };
        assert!(matches!(
            registry.create_battery_source(&config),
            Err(Error::Config(_))
        ));
    }
}
