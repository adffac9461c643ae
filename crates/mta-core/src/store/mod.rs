//! Uniform keyed read access over every record family
//!
//! Each read returns an owned copy taken under the owning component's lock;
//! nothing handed out aliases live state.

use crate::battery::BatterySnapshot;
use crate::device::MtaDevice;
use crate::error::{Error, Result};
use crate::records::{
    CallRecord, CallpStatus, DhcpV4Lease, DhcpV6Lease, DsxLogEntry, HandsetRecord, LineInfo,
    MtaLogEntry, ServiceFlow, SignallingLogEntry, Snapshot,
};
use serde::Serialize;

/// Record family addressed by [`MtaDevice::snapshot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// key = line instance
    Line,
    /// key = line instance
    Calls,
    /// key = handset instance
    Handset,
    /// key ignored
    DhcpV4,
    /// key ignored
    DhcpV6,
    /// key ignored
    Battery,
    /// key = entry id
    DsxLog,
    /// key = entry index
    MtaLog,
    /// key = entry id
    SignallingLog,
    /// key = SFID
    ServiceFlow,
    /// key = line number
    Callp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum Record {
    Line(LineInfo),
    Calls(Snapshot<CallRecord>),
    Handset(HandsetRecord),
    DhcpV4(DhcpV4Lease),
    DhcpV6(DhcpV6Lease),
    Battery(BatterySnapshot),
    DsxLog(DsxLogEntry),
    MtaLog(MtaLogEntry),
    SignallingLog(SignallingLogEntry),
    ServiceFlow(ServiceFlow),
    Callp(CallpStatus),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Line(_) => RecordKind::Line,
            Record::Calls(_) => RecordKind::Calls,
            Record::Handset(_) => RecordKind::Handset,
            Record::DhcpV4(_) => RecordKind::DhcpV4,
            Record::DhcpV6(_) => RecordKind::DhcpV6,
            Record::Battery(_) => RecordKind::Battery,
            Record::DsxLog(_) => RecordKind::DsxLog,
            Record::MtaLog(_) => RecordKind::MtaLog,
            Record::SignallingLog(_) => RecordKind::SignallingLog,
            Record::ServiceFlow(_) => RecordKind::ServiceFlow,
            Record::Callp(_) => RecordKind::Callp,
        }
    }
}

impl MtaDevice {
    /// Copy of one record
    ///
    /// `Unavailable` when the producer has not supplied the record yet (no
    /// lease, no battery reading); `NotFound` for an unknown key.
    pub fn snapshot(&self, kind: RecordKind, key: u64) -> Result<Record> {
        let instance = || {
            u32::try_from(key).map_err(|_| Error::not_found(format!("{:?} {}", kind, key)))
        };

        match kind {
            RecordKind::Line => self.lines().line_by_instance(instance()?).map(Record::Line),
            RecordKind::Calls => self.calls().calls(instance()?).map(Record::Calls),
            RecordKind::Handset => self.dect().handset(instance()?).map(Record::Handset),
            RecordKind::DhcpV4 => self
                .dhcpv4()
                .lease()
                .map(Record::DhcpV4)
                .ok_or_else(|| Error::unavailable("no DHCPv4 lease")),
            RecordKind::DhcpV6 => self
                .dhcpv6()
                .lease()
                .map(Record::DhcpV6)
                .ok_or_else(|| Error::unavailable("no DHCPv6 lease")),
            RecordKind::Battery => self.battery().snapshot().map(Record::Battery),
            RecordKind::DsxLog => self
                .dsx_log()
                .get(key)
                .map(Record::DsxLog)
                .ok_or_else(|| Error::not_found(format!("DSX log entry {}", key))),
            RecordKind::MtaLog => self
                .mta_log()
                .get(key)
                .map(Record::MtaLog)
                .ok_or_else(|| Error::not_found(format!("MTA log entry {}", key))),
            RecordKind::SignallingLog => self
                .signalling_log()
                .get(key)
                .map(Record::SignallingLog)
                .ok_or_else(|| Error::not_found(format!("signalling log entry {}", key))),
            RecordKind::ServiceFlow => self.service_flow(instance()?).map(Record::ServiceFlow),
            RecordKind::Callp => self.lines().callp(instance()?).map(Record::Callp),
        }
    }

    /// Copies of every record of a family
    ///
    /// Singleton families yield zero or one entry. Per-line families yield
    /// one entry per line in line-number order.
    pub fn snapshot_all(&self, kind: RecordKind) -> Snapshot<Record> {
        let line_instances = 1..=self.lines().line_count() as u32;

        match kind {
            RecordKind::Line => wrap(self.lines().lines(), Record::Line),
            RecordKind::Calls => line_instances
                .filter_map(|instance| self.calls().calls(instance).ok())
                .map(Record::Calls)
                .collect(),
            RecordKind::Handset => wrap(self.dect().handsets(), Record::Handset),
            RecordKind::DhcpV4 => self.dhcpv4().lease().map(Record::DhcpV4).into_iter().collect(),
            RecordKind::DhcpV6 => self.dhcpv6().lease().map(Record::DhcpV6).into_iter().collect(),
            RecordKind::Battery => self
                .battery()
                .snapshot()
                .ok()
                .map(Record::Battery)
                .into_iter()
                .collect(),
            RecordKind::DsxLog => wrap(self.dsx_log().snapshot(), Record::DsxLog),
            RecordKind::MtaLog => wrap(self.mta_log().snapshot(), Record::MtaLog),
            RecordKind::SignallingLog => {
                wrap(self.signalling_log().snapshot(), Record::SignallingLog)
            }
            RecordKind::ServiceFlow => wrap(self.service_flows(), Record::ServiceFlow),
            RecordKind::Callp => line_instances
                .filter_map(|line_number| self.lines().callp(line_number).ok())
                .map(Record::Callp)
                .collect(),
        }
    }
}

fn wrap<T>(snapshot: Snapshot<T>, f: fn(T) -> Record) -> Snapshot<Record> {
    snapshot.into_entries().into_iter().map(f).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MtaConfig;
    use crate::records::MtaStatus;
    use std::net::Ipv4Addr;

    fn device() -> MtaDevice {
        let (device, _dispatch) = MtaDevice::builder(MtaConfig::new().with_line_count(2))
            .build()
            .unwrap();
        device
    }

    #[test]
    fn test_missing_lease_is_unavailable() {
        let device = device();
        assert!(matches!(
            device.snapshot(RecordKind::DhcpV4, 0),
            Err(Error::Unavailable(_))
        ));
        assert!(device.snapshot_all(RecordKind::DhcpV4).is_empty());

        device.dhcpv4().begin().unwrap();
        device
            .dhcpv4()
            .complete(DhcpV4Lease::new(Ipv4Addr::new(10, 0, 0, 2), 600))
            .unwrap();
        let record = device.snapshot(RecordKind::DhcpV4, 0).unwrap();
        assert_eq!(record.kind(), RecordKind::DhcpV4);
    }

    #[test]
    fn test_per_line_families() {
        let device = device();
        device
            .lines()
            .update_registration_status(2, MtaStatus::Complete)
            .unwrap();

        assert_eq!(device.snapshot_all(RecordKind::Line).count(), 2);
        assert_eq!(device.snapshot_all(RecordKind::Callp).count(), 2);
        assert_eq!(device.snapshot_all(RecordKind::Calls).count(), 2);

        match device.snapshot(RecordKind::Line, 2).unwrap() {
            Record::Line(info) => assert_eq!(info.registration_status, MtaStatus::Complete),
            other => panic!("unexpected record {:?}", other),
        }
        assert!(matches!(
            device.snapshot(RecordKind::Line, 3),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            device.snapshot(RecordKind::Line, u64::MAX),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_log_records_by_id() {
        let device = device();
        let id = device.log_signalling(1, "INVITE sip:100@ca").unwrap();

        assert!(device.snapshot(RecordKind::SignallingLog, id).is_ok());
        assert!(device.snapshot(RecordKind::SignallingLog, id + 1).is_err());
        assert_eq!(device.snapshot_all(RecordKind::SignallingLog).count(), 1);
    }
}
