//! Canonical data model for collected BGP neighbor state.
//!
//! Vendor-specific output is normalized into [`NeighborRecord`]s; per-device
//! results are [`DeviceOutcome`]s; a full fleet run is a [`CollectionResult`];
//! the persisted form of a run is a [`Snapshot`].

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// BGP finite-state-machine state of a session.
///
/// Vendor state strings are mapped onto this enum through an explicit
/// table in the normalizer; anything unmapped becomes `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Connect,
    Active,
    OpenSent,
    OpenConfirm,
    Established,
    Unknown,
}

impl SessionState {
    /// Canonical string form, used for persistence and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Connect => "Connect",
            Self::Active => "Active",
            Self::OpenSent => "OpenSent",
            Self::OpenConfirm => "OpenConfirm",
            Self::Established => "Established",
            Self::Unknown => "Unknown",
        }
    }

    /// Parse the canonical string form back; unrecognized input maps to
    /// `Unknown` so that old snapshots always load.
    pub fn from_stored(s: &str) -> Self {
        match s {
            "Idle" => Self::Idle,
            "Connect" => Self::Connect,
            "Active" => Self::Active,
            "OpenSent" => Self::OpenSent,
            "OpenConfirm" => Self::OpenConfirm,
            "Established" => Self::Established,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// BGP address family a session's prefixes are counted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressFamily {
    Ipv4Unicast,
    Ipv6Unicast,
    Vpnv4,
    Vpnv6,
    Unknown,
}

impl AddressFamily {
    /// Canonical string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ipv4Unicast => "ipv4-unicast",
            Self::Ipv6Unicast => "ipv6-unicast",
            Self::Vpnv4 => "vpnv4",
            Self::Vpnv6 => "vpnv6",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a routing-table name as given on the command line
    /// (`ipv4`, `ipv6`).
    pub fn from_table(s: &str) -> Option<Self> {
        match s {
            "ipv4" | "ipv4-unicast" => Some(Self::Ipv4Unicast),
            "ipv6" | "ipv6-unicast" => Some(Self::Ipv6Unicast),
            _ => None,
        }
    }

    /// Parse the canonical string form; unrecognized input maps to
    /// `Unknown` so that old snapshots always load.
    pub fn from_stored(s: &str) -> Self {
        match s {
            "ipv4-unicast" => Self::Ipv4Unicast,
            "ipv6-unicast" => Self::Ipv6Unicast,
            "vpnv4" => Self::Vpnv4,
            "vpnv6" => Self::Vpnv6,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One BGP session as observed on one device at one point in time.
///
/// `peer_address` + `address_family` + `local_device` identify a record
/// within a snapshot; a record is never emitted without a parseable peer
/// address and ASN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborRecord {
    /// Hostname of the device the session was observed on.
    pub local_device: String,

    /// Remote peer address.
    pub peer_address: IpAddr,

    /// Remote autonomous system number.
    pub peer_asn: u32,

    /// Session FSM state.
    pub session_state: SessionState,

    /// Session uptime in seconds; absent unless the session is Established
    /// and the device reported an uptime.
    pub uptime_seconds: Option<u64>,

    /// Prefixes received from the peer; absent when not reported.
    pub prefixes_received: Option<u64>,

    /// Address family the session was observed under.
    pub address_family: AddressFamily,
}

/// Why a device failed to produce records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// Connect or authentication failure.
    Unreachable,
    /// The device did not answer a command within the timeout.
    CommandTimeout,
    /// The device rejected the command.
    CommandError,
    /// The output could not be processed at all.
    ParseError,
    /// The run deadline expired before the device finished.
    Cancelled,
}

impl FailureReason {
    /// Canonical string form, used for persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unreachable => "unreachable",
            Self::CommandTimeout => "command-timeout",
            Self::CommandError => "command-error",
            Self::ParseError => "parse-error",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the canonical string form.
    pub fn from_stored(s: &str) -> Option<Self> {
        match s {
            "unreachable" => Some(Self::Unreachable),
            "command-timeout" => Some(Self::CommandTimeout),
            "command-error" => Some(Self::CommandError),
            "parse-error" => Some(Self::ParseError),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Transient failures are retried by the worker; persistent ones
    /// are reported immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable | Self::CommandTimeout)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one device's collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Outcome {
    /// Records collected, plus the count of malformed rows that were
    /// dropped along the way.
    Success {
        records: Vec<NeighborRecord>,
        dropped: usize,
    },
    /// The device produced no usable data.
    Failure {
        reason: FailureReason,
        message: String,
    },
}

/// One device's outcome within a collection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceOutcome {
    /// Hostname of the device.
    pub device: String,

    /// What happened.
    pub outcome: Outcome,
}

impl DeviceOutcome {
    /// Create a success outcome.
    pub fn success(device: impl Into<String>, records: Vec<NeighborRecord>, dropped: usize) -> Self {
        Self {
            device: device.into(),
            outcome: Outcome::Success { records, dropped },
        }
    }

    /// Create a failure outcome.
    pub fn failure(
        device: impl Into<String>,
        reason: FailureReason,
        message: impl Into<String>,
    ) -> Self {
        Self {
            device: device.into(),
            outcome: Outcome::Failure {
                reason,
                message: message.into(),
            },
        }
    }

    /// Whether this device produced records.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success { .. })
    }

    /// The records, if any.
    pub fn records(&self) -> &[NeighborRecord] {
        match &self.outcome {
            Outcome::Success { records, .. } => records,
            Outcome::Failure { .. } => &[],
        }
    }
}

/// Aggregate of one fleet collection run.
///
/// Contains exactly one [`DeviceOutcome`] per input device, in input
/// order; the aggregate is semantically a set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionResult {
    /// Run start time; used as the snapshot key.
    pub started_at: DateTime<Utc>,

    /// One outcome per input device.
    pub outcomes: Vec<DeviceOutcome>,
}

impl CollectionResult {
    /// Number of devices that produced records.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number of devices that failed.
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Total records across all succeeded devices.
    pub fn total_records(&self) -> usize {
        self.outcomes.iter().map(|o| o.records().len()).sum()
    }

    /// Total malformed rows dropped across all succeeded devices.
    pub fn dropped_records(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match &o.outcome {
                Outcome::Success { dropped, .. } => *dropped,
                Outcome::Failure { .. } => 0,
            })
            .sum()
    }

    /// Whether every device succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.is_success())
    }

    /// Iterate over all records from succeeded devices.
    pub fn records(&self) -> impl Iterator<Item = &NeighborRecord> {
        self.outcomes.iter().flat_map(|o| o.records().iter())
    }

    /// Iterate over failed devices with their reasons.
    pub fn failures(&self) -> impl Iterator<Item = (&str, FailureReason, &str)> {
        self.outcomes.iter().filter_map(|o| match &o.outcome {
            Outcome::Failure { reason, message } => {
                Some((o.device.as_str(), *reason, message.as_str()))
            }
            Outcome::Success { .. } => None,
        })
    }
}

/// A failed device as recorded in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFailure {
    /// Hostname of the device.
    pub device: String,

    /// Why it failed.
    pub reason: FailureReason,

    /// Diagnostic message.
    pub message: String,
}

/// The persisted form of a collection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Snapshot key (run start time).
    pub timestamp: DateTime<Utc>,

    /// Flattened records from all succeeded devices.
    pub records: Vec<NeighborRecord>,

    /// Failed devices and their reasons.
    pub failures: Vec<SnapshotFailure>,
}
