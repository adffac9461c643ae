// # Battery Source Trait
//
// Defines the interface for reading battery telemetry.
//
// ## Implementations
//
// - sysfs-based (Linux): `mta-battery-sysfs` crate
// - Future: vendor fuel-gauge drivers over I2C/SMBus
//
// ## Usage
//
// ```rust,ignore
// use mta_core::BatterySource;
//
// #[tokio::main]
// async fn main() -> mta_core::Result<()> {
//     let source = /* BatterySource implementation */;
//
//     let reading = source.read().await?;
//     println!("installed: {}", reading.installed);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::records::BatteryInfo;

/// Trait for battery producer implementations
///
/// # Contract
///
/// - `read()` returns one complete reading. Fields the hardware cannot
///   supply are `None`, not an error.
/// - `Err(Error::Unavailable)` means no reading could be taken at all. A
///   source retries transient hardware failures itself before reporting
///   this; the aggregator never retries.
/// - Implementations must be safe to call concurrently from multiple tasks.
#[async_trait]
pub trait BatterySource: Send + Sync {
    /// Take one battery reading
    async fn read(&self) -> Result<BatteryInfo, crate::Error>;

    /// Name of the source for logging
    fn source_name(&self) -> &'static str;
}

/// Helper trait for constructing battery sources from configuration
pub trait BatterySourceFactory: Send + Sync {
    /// Create a BatterySource instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: The battery source configuration
    ///
    /// # Returns
    ///
    /// A boxed BatterySource trait object
    fn create(
        &self,
        config: &crate::config::BatterySourceConfig,
    ) -> Result<Box<dyn BatterySource>, crate::Error>;
}
