//! Template-driven normalization for text vendors.
//!
//! The declarative TextFSM template extracts rows from the raw output;
//! this module maps each row onto a canonical record.

use std::collections::HashMap;

use log::debug;
use textfsm_rust::Template;
use thiserror::Error;

use super::uptime::parse_uptime;
use super::{map_session_state, AsPolicy, CommandOutput, Normalized};
use crate::error::NormalizeError;
use crate::model::{AddressFamily, NeighborRecord, SessionState};
use crate::vendor::VendorProfile;

/// Why a parsed row could not become a record.
#[derive(Debug, Error)]
enum RowError {
    #[error("missing peer address")]
    MissingPeer,

    #[error("invalid peer address '{0}'")]
    InvalidPeer(String),

    #[error("missing peer ASN")]
    MissingAsn,

    #[error("invalid peer ASN '{0}'")]
    InvalidAsn(String),
}

pub(super) fn normalize_text(
    profile: &VendorProfile,
    device: &str,
    outputs: &[CommandOutput],
    policy: &AsPolicy,
) -> Result<Normalized, NormalizeError> {
    let source = profile
        .template()
        .ok_or_else(|| NormalizeError::Template {
            message: format!("no template registered for vendor '{}'", profile.vendor),
        })?;
    let template = Template::parse_str(source).map_err(|e| NormalizeError::Template {
        message: e.to_string(),
    })?;

    let mut normalized = Normalized::default();

    for output in outputs {
        let mut parser = template.parser();
        let rows = parser
            .parse_text_to_dicts(&output.text)
            .map_err(|e| NormalizeError::Template {
                message: e.to_string(),
            })?;

        let family = output.family.unwrap_or(AddressFamily::Unknown);

        for row in &rows {
            match record_from_row(device, family, row) {
                Ok(record) => {
                    if policy.admits(record.peer_asn) {
                        normalized.records.push(record);
                    } else {
                        debug!(
                            "[{device}] Ignoring neighbour '{}', ASN {} excluded by policy.",
                            record.peer_address, record.peer_asn
                        );
                        normalized.filtered += 1;
                    }
                }
                Err(err) => {
                    debug!("[{device}] Dropping malformed row: {err}");
                    normalized.dropped += 1;
                }
            }
        }
    }

    Ok(normalized)
}

/// Build one record from a template row.
///
/// Cisco-style summaries fold state and prefix count into one column
/// (`STATE_PFXRCD`: digits mean Established); EOS reports them separately
/// (`STATE` + `PFX_RCD`). Missing numeric fields become absent, not zero.
fn record_from_row(
    device: &str,
    family: AddressFamily,
    row: &HashMap<String, String>,
) -> Result<NeighborRecord, RowError> {
    let peer = field(row, "BGP_NEIGH").ok_or(RowError::MissingPeer)?;
    let peer_address = peer
        .parse()
        .map_err(|_| RowError::InvalidPeer(peer.to_string()))?;

    let asn = field(row, "NEIGH_AS").ok_or(RowError::MissingAsn)?;
    let peer_asn = asn
        .parse()
        .map_err(|_| RowError::InvalidAsn(asn.to_string()))?;

    let (session_state, prefixes_received) = if let Some(combined) = field(row, "STATE_PFXRCD") {
        match combined.parse::<u64>() {
            Ok(prefixes) => (SessionState::Established, Some(prefixes)),
            Err(_) => (map_session_state(combined), None),
        }
    } else if let Some(state) = field(row, "STATE") {
        let prefixes = field(row, "PFX_RCD").and_then(|v| v.parse().ok());
        (map_session_state(state), prefixes)
    } else {
        (SessionState::Unknown, None)
    };

    let uptime_seconds = if session_state == SessionState::Established {
        field(row, "UP_DOWN").and_then(parse_uptime)
    } else {
        None
    };

    Ok(NeighborRecord {
        local_device: device.to_string(),
        peer_address,
        peer_asn,
        session_state,
        uptime_seconds,
        prefixes_received,
        address_family: family,
    })
}

/// Non-empty field lookup; TextFSM yields empty strings for unmatched
/// optional values.
fn field<'a>(row: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    row.get(name).map(String::as_str).map(str::trim).filter(|v| !v.is_empty())
}
