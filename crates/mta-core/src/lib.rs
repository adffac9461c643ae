// # mta-core
//
// Core library of the MTA telephony state aggregator.
//
// ## Architecture Overview
//
// The aggregator holds the live state of a cable-modem voice module and
// serves consistent copies of it to management callers:
// - **LineRegistry**: Per-line table (hook, fault, registration, CA, diagnostics)
// - **CallSessionTracker**: Active and sealed calls with write-once metrics
// - **DiagnosticsCoordinator**: Per-line diagnostics lifecycle
// - **ProvisioningMachine**: Independent DHCPv4/DHCPv6/config-file/operational machines
// - **CallbackDispatcher**: Single line-status subscriber fed by a dispatch loop
// - **DectRegistry**, **LogBuffer**, **BatteryMonitor**: Device-level state
// - **MtaDevice**: Owns all of the above; **MtaHal** exposes it as HAL calls
// - **ProducerRegistry**: Plugin-based registry for battery producers
//
// ## Design Principles
//
// 1. **No global lock**: Each line and each device component locks on its own
// 2. **Copies out**: Readers always receive owned snapshots
// 3. **Non-blocking producers**: Notifications are queued, never called out under a lock
// 4. **Plugin-Based**: Producers are registered dynamically, no hard-coded if-else

pub mod battery;
pub mod config;
pub mod dect;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod hal;
pub mod lines;
pub mod logs;
pub mod provisioning;
pub mod records;
pub mod registry;
pub mod store;
pub mod traits;

mod sync;

// Re-export core types for convenience
pub use battery::{BatteryMonitor, BatteryPoller, BatterySnapshot};
pub use config::{BatteryConfig, BatterySourceConfig, DectConfig, MtaConfig};
pub use dect::DectRegistry;
pub use device::{MtaDevice, MtaDeviceBuilder};
pub use dispatch::{CallbackDispatcher, DispatchLoop, Subscription};
pub use error::{Error, Result};
pub use hal::{HalError, HalResult, MtaHal};
pub use lines::{CallSessionTracker, DiagnosticsCoordinator, LineRegistry};
pub use logs::LogBuffer;
pub use provisioning::{Lease, ProvisioningMachine, ProvisioningSnapshot};
pub use registry::ProducerRegistry;
pub use store::{Record, RecordKind};
pub use traits::{BatterySource, DiagnosticsRunner, LineStatusSubscriber};
