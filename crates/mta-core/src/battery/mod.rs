//! Battery read-through cache
//!
//! `refresh` asks the battery producer for a fresh reading. If the producer
//! fails, the last good reading is served instead; only when no reading was
//! ever obtained does the call fail with `Unavailable`.

use crate::error::{Error, Result};
use crate::records::BatteryInfo;
use crate::sync::{read, write};
use crate::traits::BatterySource;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// A battery reading and when it was taken
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatterySnapshot {
    pub info: BatteryInfo,
    pub refreshed_at: DateTime<Utc>,
    /// Set when the producer failed and this is the last good reading
    pub stale: bool,
}

pub struct BatteryMonitor {
    source: Option<Box<dyn BatterySource>>,
    last: RwLock<Option<BatterySnapshot>>,
}

impl BatteryMonitor {
    pub fn new(source: Option<Box<dyn BatterySource>>) -> Self {
        Self {
            source,
            last: RwLock::new(None),
        }
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Read through to the producer
    pub async fn refresh(&self) -> Result<BatterySnapshot> {
        let Some(source) = &self.source else {
            return Err(Error::unavailable("no battery source configured"));
        };

        match source.read().await {
            Ok(info) => {
                let snapshot = BatterySnapshot {
                    info,
                    refreshed_at: Utc::now(),
                    stale: false,
                };
                *write(&self.last) = Some(snapshot.clone());
                debug!("Battery reading refreshed from {}", source.source_name());
                Ok(snapshot)
            }
            Err(e) => {
                warn!("Battery source {} failed: {}", source.source_name(), e);
                self.snapshot().map(|mut snapshot| {
                    snapshot.stale = true;
                    snapshot
                })
            }
        }
    }

    /// Last good reading without contacting the producer
    pub fn snapshot(&self) -> Result<BatterySnapshot> {
        read(&self.last)
            .clone()
            .ok_or_else(|| Error::unavailable("no battery reading available"))
    }
}

/// Periodically refreshes a [`BatteryMonitor`]
pub struct BatteryPoller {
    monitor: Arc<BatteryMonitor>,
    interval: Duration,
}

impl BatteryPoller {
    pub fn new(monitor: Arc<BatteryMonitor>, interval: Duration) -> Self {
        Self { monitor, interval }
    }

    /// Poll until `shutdown_rx` fires, or forever when it is `None`
    pub async fn run_with_shutdown(self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        if !self.monitor.has_source() {
            info!("No battery source configured, poller idle");
            return Ok(());
        }

        let mut ticker = tokio::time::interval(self.interval);
        info!("Battery poller started (every {:?})", self.interval);

        match shutdown_rx {
            Some(mut shutdown) => loop {
                tokio::select! {
                    _ = ticker.tick() => self.poll_once().await,
                    _ = &mut shutdown => {
                        info!("Battery poller stopped");
                        break;
                    }
                }
            },
            None => loop {
                ticker.tick().await;
                self.poll_once().await;
            },
        }
        Ok(())
    }

    async fn poll_once(&self) {
        if let Err(e) = self.monitor.refresh().await {
            debug!("Battery poll produced no reading: {}", e);
        }
    }
}
