//! Provisioning state machines
//!
//! Four machines track MTA bring-up independently: the DHCPv4 lease, the
//! DHCPv6 lease, config-file download and the overall operational status.
//! None of them observes another; the aggregate provisioning status is
//! derived by the device at read time.
//!
//! ## Transitions
//!
//! ```text
//!            begin            complete(lease)
//!   Init ─────────▶ Started ─────────────────▶ Complete ──┐
//!    ▲                 │ fail / reject              ▲      │ renew(lease)
//!    │                 ▼                            └──────┘
//!    └──── reset ── Error / Rejected
//! ```
//!
//! `begin` from `Complete`, `Error` or `Rejected` starts a fresh cycle and
//! discards the previous lease.

use crate::error::{Error, Result};
use crate::records::{DhcpV4Lease, DhcpV6Lease, MtaStatus};
use crate::sync::lock;
use serde::Serialize;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Data attached to the `Complete` state of a machine
pub trait Lease: Clone + Send + Sync + 'static {
    /// Reject a lease that cannot describe a usable binding
    fn validate(&self) -> Result<()>;
}

/// Machines without a lease (config file, operational status)
impl Lease for () {
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

impl Lease for DhcpV4Lease {
    fn validate(&self) -> Result<()> {
        if self.ip_address == Ipv4Addr::UNSPECIFIED {
            return Err(Error::invalid_input("DHCPv4 lease has no address"));
        }
        if self.lease_time_remaining == 0 {
            return Err(Error::invalid_input("DHCPv4 lease has already expired"));
        }
        Ok(())
    }
}

impl Lease for DhcpV6Lease {
    fn validate(&self) -> Result<()> {
        if self.ipv6_address == Ipv6Addr::UNSPECIFIED {
            return Err(Error::invalid_input("DHCPv6 lease has no address"));
        }
        if self.lease_time_remaining == 0 {
            return Err(Error::invalid_input("DHCPv6 lease has already expired"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Phase<L> {
    Init,
    Started,
    Complete(L),
    Error(String),
    Rejected(String),
}

impl<L> Phase<L> {
    fn status(&self) -> MtaStatus {
        match self {
            Phase::Init => MtaStatus::Init,
            Phase::Started => MtaStatus::Started,
            Phase::Complete(_) => MtaStatus::Complete,
            Phase::Error(_) => MtaStatus::Error,
            Phase::Rejected(_) => MtaStatus::Rejected,
        }
    }
}

/// Owned copy of a machine's state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisioningSnapshot<L> {
    pub status: MtaStatus,
    /// Present only while `Complete`
    pub lease: Option<L>,
    /// Failure or rejection reason while in a terminal state
    pub reason: Option<String>,
    /// Number of transitions taken since construction
    pub transitions: u64,
}

struct MachineState<L> {
    phase: Phase<L>,
    transitions: u64,
}

/// One provisioning state machine
///
/// Transitions are serialized by an internal lock. Each accepted transition
/// is published on a watch channel so producers and tests can await a
/// target status without polling.
pub struct ProvisioningMachine<L: Lease = ()> {
    name: &'static str,
    state: Mutex<MachineState<L>>,
    status_tx: watch::Sender<MtaStatus>,
}

impl<L: Lease> ProvisioningMachine<L> {
    /// Create a machine in `Init`
    ///
    /// `name` identifies the machine in logs and errors (e.g. "dhcpv4").
    pub fn new(name: &'static str) -> Self {
        let (status_tx, _) = watch::channel(MtaStatus::Init);
        Self {
            name,
            state: Mutex::new(MachineState {
                phase: Phase::Init,
                transitions: 0,
            }),
            status_tx,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Start (or restart) acquisition
    pub fn begin(&self) -> Result<()> {
        self.transition("begin", |phase| match phase {
            Phase::Started => None,
            _ => Some(Phase::Started),
        })
    }

    /// Begin unless a cycle is already running
    ///
    /// Checked and applied under one lock. Returns whether a new cycle
    /// was started.
    pub fn ensure_started(&self) -> bool {
        let mut state = lock(&self.state);
        if matches!(state.phase, Phase::Started) {
            return false;
        }
        let from = state.phase.status();
        state.phase = Phase::Started;
        state.transitions += 1;
        self.status_tx.send_replace(MtaStatus::Started);
        info!("{} provisioning: {} -> {}", self.name, from, MtaStatus::Started);
        true
    }

    /// Finish acquisition with a lease
    pub fn complete(&self, lease: L) -> Result<()> {
        lease.validate()?;
        self.transition("complete", move |phase| match phase {
            Phase::Started => Some(Phase::Complete(lease)),
            _ => None,
        })
    }

    /// Replace the lease of a completed machine
    pub fn renew(&self, lease: L) -> Result<()> {
        lease.validate()?;
        self.transition("renew", move |phase| match phase {
            Phase::Complete(_) => Some(Phase::Complete(lease)),
            _ => None,
        })
    }

    /// Move to `Error` from any non-terminal state
    pub fn fail(&self, reason: impl Into<String>) -> Result<()> {
        let reason = reason.into();
        self.transition("fail", move |phase| match phase {
            Phase::Error(_) | Phase::Rejected(_) => None,
            _ => Some(Phase::Error(reason)),
        })
    }

    /// Move from `Started` to `Rejected`
    pub fn reject(&self, reason: impl Into<String>) -> Result<()> {
        let reason = reason.into();
        self.transition("reject", move |phase| match phase {
            Phase::Started => Some(Phase::Rejected(reason)),
            _ => None,
        })
    }

    /// Return to `Init` from any state, dropping the lease
    ///
    /// Returns whether the machine actually moved.
    pub fn reset(&self) -> bool {
        let mut state = lock(&self.state);
        if matches!(state.phase, Phase::Init) {
            return false;
        }
        state.phase = Phase::Init;
        state.transitions += 1;
        self.status_tx.send_replace(MtaStatus::Init);
        debug!("{} provisioning reset to Init", self.name);
        true
    }

    pub fn state(&self) -> MtaStatus {
        lock(&self.state).phase.status()
    }

    /// Lease held while `Complete`
    pub fn lease(&self) -> Option<L> {
        match &lock(&self.state).phase {
            Phase::Complete(lease) => Some(lease.clone()),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> ProvisioningSnapshot<L> {
        let state = lock(&self.state);
        let (lease, reason) = match &state.phase {
            Phase::Complete(lease) => (Some(lease.clone()), None),
            Phase::Error(reason) | Phase::Rejected(reason) => (None, Some(reason.clone())),
            Phase::Init | Phase::Started => (None, None),
        };
        ProvisioningSnapshot {
            status: state.phase.status(),
            lease,
            reason,
            transitions: state.transitions,
        }
    }

    /// Watch the status of this machine
    pub fn subscribe(&self) -> watch::Receiver<MtaStatus> {
        self.status_tx.subscribe()
    }

    fn transition<F>(&self, action: &str, next: F) -> Result<()>
    where
        F: FnOnce(&Phase<L>) -> Option<Phase<L>>,
    {
        let mut state = lock(&self.state);
        let from = state.phase.status();

        let Some(phase) = next(&state.phase) else {
            warn!("{} provisioning: cannot {} from {}", self.name, action, from);
            return Err(Error::invalid_transition(
                format!("{} {}", self.name, from),
                action,
            ));
        };

        let to = phase.status();
        state.phase = phase;
        state.transitions += 1;
        self.status_tx.send_replace(to);

        if from == to {
            debug!("{} provisioning: {} kept {}", self.name, action, to);
        } else {
            info!("{} provisioning: {} -> {}", self.name, from, to);
        }
        Ok(())
    }
}

impl<L: Lease> std::fmt::Debug for ProvisioningMachine<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisioningMachine")
            .field("name", &self.name)
            .field("status", &self.state())
            .finish()
    }
}
