//! Architectural Contract Test: Battery Read-Through
//!
//! Constraints verified:
//! - Every HAL battery getter consults the producer
//! - A failing producer falls back to the last good reading, marked stale
//! - With no reading ever taken, a failure surfaces as unavailable
//!
//! If this test fails, someone has:
//! - Served battery values from a cache without refreshing
//! - Dropped the stale marker on fallback readings

mod common;

use common::*;
use mta_core::records::{BatteryInfo, BatteryLife, BatteryStatus, PowerStatus, ShortText};
use mta_core::{Error, HalError, MtaConfig, MtaDevice, MtaHal};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

fn reading(remaining_charge: u32) -> BatteryInfo {
    BatteryInfo {
        installed: true,
        total_capacity: Some(2200),
        actual_capacity: Some(2000),
        remaining_charge: Some(remaining_charge),
        remaining_time: Some(180),
        number_of_cycles: Some(12),
        power_status: Some(PowerStatus::Battery),
        status: Some(BatteryStatus::Discharging),
        life: Some(BatteryLife::Good),
        model_number: Some(ShortText::new("BT-2200").unwrap()),
        ..BatteryInfo::default()
    }
}

fn device_with(source: &ScriptedBatterySource) -> Arc<MtaDevice> {
    let (device, _dispatch) = MtaDevice::builder(MtaConfig::new().with_line_count(1))
        .battery_source(Box::new(source.clone()))
        .build()
        .unwrap();
    Arc::new(device)
}

#[tokio::test]
async fn refresh_then_stale_fallback() {
    let source = ScriptedBatterySource::new(reading(1500));
    let device = device_with(&source);

    let fresh = assert_ok!(device.battery().refresh().await);
    assert!(!fresh.stale);
    assert_eq!(fresh.info.remaining_charge, Some(1500));

    source.set_failing(true);
    let fallback = assert_ok!(device.battery().refresh().await);
    assert!(fallback.stale);
    assert_eq!(fallback.info, fresh.info);
    assert_eq!(source.read_count(), 2);

    source.set_failing(false);
    source.set_reading(reading(900));
    let recovered = assert_ok!(device.battery().refresh().await);
    assert!(!recovered.stale);
    assert_eq!(recovered.info.remaining_charge, Some(900));
}

#[tokio::test]
async fn failure_without_history_is_unavailable() {
    let source = ScriptedBatterySource::new(reading(1500));
    source.set_failing(true);
    let device = device_with(&source);

    assert!(matches!(
        device.battery().refresh().await,
        Err(Error::Unavailable(_))
    ));
    assert_err!(device.battery().snapshot());
}

#[tokio::test]
async fn hal_getters_read_through() {
    let source = ScriptedBatterySource::new(reading(1500));
    let hal = MtaHal::new(device_with(&source));

    assert_eq!(hal.battery_get_installed().await, Ok(true));
    assert_eq!(hal.battery_get_remaining_charge().await, Ok(1500));

    source.set_reading(reading(1400));
    assert_eq!(hal.battery_get_remaining_charge().await, Ok(1400));
    assert_eq!(hal.battery_get_power_status().await, Ok(PowerStatus::Battery));
    assert_eq!(hal.battery_get_model_number().await.unwrap(), "BT-2200");
    assert_eq!(source.read_count(), 5);

    // Fields the producer does not report fail individually
    assert_eq!(hal.battery_get_serial_number().await, Err(HalError));
    assert_eq!(hal.battery_get_condition().await, Err(HalError));
}
