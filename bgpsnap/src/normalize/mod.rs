//! Vendor output normalization.
//!
//! Maps raw command output plus a vendor profile into canonical
//! [`NeighborRecord`]s. Pure and deterministic: no I/O, identical input
//! yields identical output.
//!
//! Rows that cannot be minimally identified (peer address + ASN) are
//! dropped and counted rather than failing the device; a device whose
//! output is mostly malformed is demoted to a parse failure.

mod markup;
mod template;
mod uptime;

pub use uptime::parse_uptime;

use std::collections::BTreeSet;

use crate::error::NormalizeError;
use crate::model::{AddressFamily, NeighborRecord, SessionState};
use crate::vendor::{ParseStrategy, VendorProfile};

/// Raw output of one issued command, with the routing-table context the
/// command was issued against (None when the output reports the address
/// family inline).
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub family: Option<AddressFamily>,
    pub text: String,
}

impl CommandOutput {
    pub fn new(family: Option<AddressFamily>, text: impl Into<String>) -> Self {
        Self {
            family,
            text: text.into(),
        }
    }
}

/// Result of normalizing one device's output.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    /// Canonical records, in device output order.
    pub records: Vec<NeighborRecord>,

    /// Malformed rows dropped (missing/invalid peer address or ASN).
    pub dropped: usize,

    /// Well-formed records excluded by the AS policy.
    pub filtered: usize,
}

/// AS-number admission policy applied during normalization.
#[derive(Debug, Clone, Default)]
pub struct AsPolicy {
    pub mode: AsFilterMode,

    /// Drop peers whose ASN is reserved or private.
    pub ignore_private: bool,
}

/// Which ASNs to keep.
#[derive(Debug, Clone, Default)]
pub enum AsFilterMode {
    /// Keep everything.
    #[default]
    All,

    /// Keep only these ASNs.
    Except(BTreeSet<u32>),

    /// Drop these ASNs.
    Ignore(BTreeSet<u32>),
}

impl AsPolicy {
    /// Whether a peer with this ASN is admitted.
    pub fn admits(&self, asn: u32) -> bool {
        if self.ignore_private && !is_public_asn(asn) {
            return false;
        }
        match &self.mode {
            AsFilterMode::All => true,
            AsFilterMode::Except(keep) => keep.contains(&asn),
            AsFilterMode::Ignore(drop) => !drop.contains(&asn),
        }
    }
}

/// Publicly assignable ASN ranges (excludes reserved, documentation and
/// private-use blocks).
fn is_public_asn(asn: u32) -> bool {
    (1..=23455).contains(&asn)
        || (23457..=64495).contains(&asn)
        || (131_072..=4_199_999_999).contains(&asn)
}

/// Normalize raw command output into canonical records.
///
/// Dispatches on the profile's parse strategy. Returns an error when the
/// output cannot be processed at all; individual malformed rows are
/// dropped and counted in the result instead.
pub fn normalize(
    profile: &VendorProfile,
    device: &str,
    outputs: &[CommandOutput],
    policy: &AsPolicy,
) -> Result<Normalized, NormalizeError> {
    let normalized = match profile.strategy {
        ParseStrategy::TemplateText => template::normalize_text(profile, device, outputs, policy)?,
        ParseStrategy::StructuredMarkup => markup::normalize_junos(device, outputs, policy)?,
    };

    // A device whose rows are mostly garbage is a parse failure, not a
    // success with drops.
    let kept = normalized.records.len() + normalized.filtered;
    if normalized.dropped > kept {
        return Err(NormalizeError::TooManyMalformed {
            dropped: normalized.dropped,
            total: normalized.dropped + kept,
        });
    }

    Ok(normalized)
}

/// Map a vendor state string onto the canonical session state.
///
/// Unmapped strings become `Unknown`, never dropped.
pub(crate) fn map_session_state(token: &str) -> SessionState {
    match token.trim().to_ascii_lowercase().as_str() {
        "idle" | "idle (admin)" => SessionState::Idle,
        "connect" => SessionState::Connect,
        "active" => SessionState::Active,
        "opensent" => SessionState::OpenSent,
        "openconfirm" => SessionState::OpenConfirm,
        "established" | "estab" => SessionState::Established,
        _ => SessionState::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_session_state_table() {
        assert_eq!(map_session_state("Idle"), SessionState::Idle);
        assert_eq!(map_session_state("Idle (Admin)"), SessionState::Idle);
        assert_eq!(map_session_state("Connect"), SessionState::Connect);
        assert_eq!(map_session_state("Active"), SessionState::Active);
        assert_eq!(map_session_state("OpenSent"), SessionState::OpenSent);
        assert_eq!(map_session_state("OpenConfirm"), SessionState::OpenConfirm);
        assert_eq!(map_session_state("Established"), SessionState::Established);
        assert_eq!(map_session_state("Estab"), SessionState::Established);
        assert_eq!(map_session_state("FooBar"), SessionState::Unknown);
    }

    #[test]
    fn test_as_policy_modes() {
        let all = AsPolicy::default();
        assert!(all.admits(65001));

        let except = AsPolicy {
            mode: AsFilterMode::Except(BTreeSet::from([65001])),
            ignore_private: false,
        };
        assert!(except.admits(65001));
        assert!(!except.admits(65002));

        let ignore = AsPolicy {
            mode: AsFilterMode::Ignore(BTreeSet::from([65001])),
            ignore_private: false,
        };
        assert!(!ignore.admits(65001));
        assert!(ignore.admits(65002));
    }

    #[test]
    fn test_as_policy_private_ranges() {
        let policy = AsPolicy {
            mode: AsFilterMode::All,
            ignore_private: true,
        };
        // 64512-65534 is private-use, 23456 is AS_TRANS.
        assert!(!policy.admits(65001));
        assert!(!policy.admits(23456));
        assert!(!policy.admits(0));
        assert!(policy.admits(3320));
        assert!(policy.admits(13335));
        assert!(policy.admits(200_000));
    }
}
