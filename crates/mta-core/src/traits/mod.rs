//! Producer and consumer traits for the MTA aggregator
//!
//! This module defines the abstract interfaces at the edges of the aggregator.
//!
//! - [`BatterySource`]: Read battery telemetry from a fuel-gauge driver
//! - [`DiagnosticsRunner`]: Hand line-test requests to the diagnostics engine
//! - [`LineStatusSubscriber`]: Receive line-status change notifications

pub mod battery_source;
pub mod diagnostics_runner;
pub mod line_status_subscriber;

pub use battery_source::{BatterySource, BatterySourceFactory};
pub use diagnostics_runner::{DiagnosticsRequest, DiagnosticsRunner};
pub use line_status_subscriber::LineStatusSubscriber;
