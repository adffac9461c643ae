//! Call records and quality metrics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use super::bounded::{LongValue, ShortValue};
use crate::error::{Error, Result};

macro_rules! call_metrics {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// End-of-call quality statistic reported by the signaling stack
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum CallMetric {
            $(
                #[serde(rename = $name)]
                $variant,
            )+
        }

        impl CallMetric {
            /// Every metric, local first then remote
            pub const ALL: &'static [CallMetric] = &[$(CallMetric::$variant,)+];

            /// Field name as it appears in the HAL call record
            pub fn name(self) -> &'static str {
                match self {
                    $(CallMetric::$variant => $name,)+
                }
            }
        }

        impl FromStr for CallMetric {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($name => Ok(CallMetric::$variant),)+
                    other => Err(Error::invalid_input(format!("unknown call metric: {}", other))),
                }
            }
        }
    };
}

call_metrics! {
    CwErrorRate => "CWErrorRate",
    PktLossConcealment => "PktLossConcealment",
    CwErrors => "CWErrors",
    Snr => "SNR",
    MicroReflections => "MicroReflections",
    DownstreamPower => "DownstreamPower",
    UpstreamPower => "UpstreamPower",
    EqiAverage => "EQIAverage",
    EqiMinimum => "EQIMinimum",
    EqiMaximum => "EQIMaximum",
    EqiInstantaneous => "EQIInstantaneous",
    MosLq => "MOS_LQ",
    MosCq => "MOS_CQ",
    EchoReturnLoss => "EchoReturnLoss",
    SignalLevel => "SignalLevel",
    NoiseLevel => "NoiseLevel",
    LossRate => "LossRate",
    DiscardRate => "DiscardRate",
    BurstDensity => "BurstDensity",
    GapDensity => "GapDensity",
    BurstDuration => "BurstDuration",
    GapDuration => "GapDuration",
    RoundTripDelay => "RoundTripDelay",
    Gmin => "Gmin",
    RFactor => "RFactor",
    ExternalRFactor => "ExternalRFactor",
    JitterBufRate => "JitterBufRate",
    JbNominalDelay => "JBNominalDelay",
    JbMaxDelay => "JBMaxDelay",
    JbAbsMaxDelay => "JBAbsMaxDelay",
    TxPackets => "TxPackets",
    TxOctets => "TxOctets",
    RxPackets => "RxPackets",
    RxOctets => "RxOctets",
    PacketLoss => "PacketLoss",
    IntervalJitter => "IntervalJitter",
    RemoteIntervalJitter => "RemoteIntervalJitter",
    RemoteMosLq => "RemoteMOS_LQ",
    RemoteMosCq => "RemoteMOS_CQ",
    RemoteEchoReturnLoss => "RemoteEchoReturnLoss",
    RemoteSignalLevel => "RemoteSignalLevel",
    RemoteNoiseLevel => "RemoteNoiseLevel",
    RemoteLossRate => "RemoteLossRate",
    RemotePktLossConcealment => "RemotePktLossConcealment",
    RemoteDiscardRate => "RemoteDiscardRate",
    RemoteBurstDensity => "RemoteBurstDensity",
    RemoteGapDensity => "RemoteGapDensity",
    RemoteBurstDuration => "RemoteBurstDuration",
    RemoteGapDuration => "RemoteGapDuration",
    RemoteRoundTripDelay => "RemoteRoundTripDelay",
    RemoteGmin => "RemoteGmin",
    RemoteRFactor => "RemoteRFactor",
    RemoteExternalRFactor => "RemoteExternalRFactor",
    RemoteJitterBufRate => "RemoteJitterBufRate",
    RemoteJbNominalDelay => "RemoteJBNominalDelay",
    RemoteJbMaxDelay => "RemoteJBMaxDelay",
    RemoteJbAbsMaxDelay => "RemoteJBAbsMaxDelay",
}

impl fmt::Display for CallMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reference to an active call, returned by `start_call`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallHandle {
    /// Instance number of the owning line
    pub line_instance: u32,
    /// Device-wide unique call id
    pub call_id: u64,
}

/// A batch of write-once metric values
///
/// Applied all-or-nothing: if any field is already populated on the call,
/// none of the batch is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsUpdate {
    metrics: BTreeMap<CallMetric, ShortValue>,
    remote_codec: Option<LongValue>,
    jitter_buffer_adaptive: Option<bool>,
    remote_jitter_buffer_adaptive: Option<bool>,
}

impl MetricsUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a metric value, validating its length
    pub fn metric(mut self, metric: CallMetric, value: impl Into<String>) -> Result<Self> {
        self.metrics.insert(metric, ShortValue::new(value)?);
        Ok(self)
    }

    pub fn remote_codec(mut self, codec: impl Into<String>) -> Result<Self> {
        self.remote_codec = Some(LongValue::new(codec)?);
        Ok(self)
    }

    pub fn jitter_buffer_adaptive(mut self, adaptive: bool) -> Self {
        self.jitter_buffer_adaptive = Some(adaptive);
        self
    }

    pub fn remote_jitter_buffer_adaptive(mut self, adaptive: bool) -> Self {
        self.remote_jitter_buffer_adaptive = Some(adaptive);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
            && self.remote_codec.is_none()
            && self.jitter_buffer_adaptive.is_none()
            && self.remote_jitter_buffer_adaptive.is_none()
    }
}

/// One call on one line
///
/// Created by `start_call`, sealed by `end_call` and never mutated after
/// sealing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    pub call_id: u64,
    pub line_instance: u32,
    pub codec: LongValue,
    pub remote_codec: Option<LongValue>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_secs: u64,
    pub originator: bool,
    pub remote_addr: IpAddr,
    pub jitter_buffer_adaptive: Option<bool>,
    pub remote_jitter_buffer_adaptive: Option<bool>,
    pub metrics: BTreeMap<CallMetric, ShortValue>,
}

impl CallRecord {
    pub(crate) fn open(
        handle: CallHandle,
        codec: LongValue,
        remote_addr: IpAddr,
        originator: bool,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            call_id: handle.call_id,
            line_instance: handle.line_instance,
            codec,
            remote_codec: None,
            start_time,
            end_time: None,
            duration_secs: 0,
            originator,
            remote_addr,
            jitter_buffer_adaptive: None,
            remote_jitter_buffer_adaptive: None,
            metrics: BTreeMap::new(),
        }
    }

    pub fn handle(&self) -> CallHandle {
        CallHandle {
            line_instance: self.line_instance,
            call_id: self.call_id,
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.end_time.is_some()
    }

    pub fn metric(&self, metric: CallMetric) -> Option<&str> {
        self.metrics.get(&metric).map(|v| v.as_str())
    }

    /// Merge a write-once batch; nothing is applied if any field collides
    pub(crate) fn apply(&mut self, update: MetricsUpdate) -> Result<()> {
        if self.is_sealed() {
            return Err(Error::invalid_transition("sealed call", "update metrics"));
        }

        let mut collisions: Vec<&str> = update
            .metrics
            .keys()
            .filter(|m| self.metrics.contains_key(m))
            .map(|m| m.name())
            .collect();
        if update.remote_codec.is_some() && self.remote_codec.is_some() {
            collisions.push("RemoteCodec");
        }
        if update.jitter_buffer_adaptive.is_some() && self.jitter_buffer_adaptive.is_some() {
            collisions.push("JitterBufferAdaptive");
        }
        if update.remote_jitter_buffer_adaptive.is_some()
            && self.remote_jitter_buffer_adaptive.is_some()
        {
            collisions.push("RemoteJitterBufferAdaptive");
        }
        if !collisions.is_empty() {
            return Err(Error::already_set(collisions.join(", ")));
        }

        self.metrics.extend(update.metrics);
        if update.remote_codec.is_some() {
            self.remote_codec = update.remote_codec;
        }
        if update.jitter_buffer_adaptive.is_some() {
            self.jitter_buffer_adaptive = update.jitter_buffer_adaptive;
        }
        if update.remote_jitter_buffer_adaptive.is_some() {
            self.remote_jitter_buffer_adaptive = update.remote_jitter_buffer_adaptive;
        }
        Ok(())
    }

    pub(crate) fn seal(&mut self, end_time: DateTime<Utc>) -> Result<()> {
        if end_time < self.start_time {
            return Err(Error::invalid_input(format!(
                "call {} end time {} precedes start time {}",
                self.call_id, end_time, self.start_time
            )));
        }
        let elapsed = end_time.signed_duration_since(self.start_time);
        self.duration_secs = u64::try_from(elapsed.num_seconds()).unwrap_or(0);
        self.end_time = Some(end_time);
        Ok(())
    }
}
