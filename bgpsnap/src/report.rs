//! Human- and machine-facing rendering of collection results.
//!
//! A run partially succeeds by design; every format distinguishes
//! succeeded devices and their record counts from failed devices and
//! their reasons.

use std::fmt::Write as _;

use serde::Serialize;

use crate::error::ReportError;
use crate::model::{CollectionResult, FailureReason, NeighborRecord, Outcome};

/// Output format for a collection report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Csv,
    Summary,
}

/// Process exit status for a run: 0 when every device succeeded, 1 for
/// partial failure, 2 when no device succeeded.
pub fn exit_code(result: &CollectionResult) -> u8 {
    if result.all_succeeded() {
        0
    } else if result.succeeded() > 0 {
        1
    } else {
        2
    }
}

/// Render a result in the requested format.
pub fn render(result: &CollectionResult, format: OutputFormat) -> Result<String, ReportError> {
    match format {
        OutputFormat::Json => render_json(result),
        OutputFormat::Csv => render_csv(result),
        OutputFormat::Summary => Ok(render_summary(result)),
    }
}

#[derive(Serialize)]
struct ReportDoc<'a> {
    timestamp: String,
    succeeded: usize,
    failed: usize,
    total_records: usize,
    dropped_records: usize,
    neighbours: Vec<&'a NeighborRecord>,
    failures: Vec<FailureEntry<'a>>,
}

#[derive(Serialize)]
struct FailureEntry<'a> {
    device: &'a str,
    reason: FailureReason,
    message: &'a str,
}

/// Render the full result as pretty JSON.
pub fn render_json(result: &CollectionResult) -> Result<String, ReportError> {
    let doc = ReportDoc {
        timestamp: result.started_at.to_rfc3339(),
        succeeded: result.succeeded(),
        failed: result.failed(),
        total_records: result.total_records(),
        dropped_records: result.dropped_records(),
        neighbours: result.records().collect(),
        failures: result
            .failures()
            .map(|(device, reason, message)| FailureEntry {
                device,
                reason,
                message,
            })
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

#[derive(Serialize)]
struct CsvRow<'a> {
    hostname: &'a str,
    peer_address: String,
    peer_asn: u32,
    address_family: &'static str,
    session_state: &'static str,
    uptime_seconds: Option<u64>,
    prefixes_received: Option<u64>,
}

/// Render the flattened neighbor set as CSV.
pub fn render_csv(result: &CollectionResult) -> Result<String, ReportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in result.records() {
        writer.serialize(CsvRow {
            hostname: &record.local_device,
            peer_address: record.peer_address.to_string(),
            peer_asn: record.peer_asn,
            address_family: record.address_family.as_str(),
            session_state: record.session_state.as_str(),
            uptime_seconds: record.uptime_seconds,
            prefixes_received: record.prefixes_received,
        })?;
    }
    writer.flush().map_err(csv::Error::from)?;
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Render a plain text summary, one line per device.
pub fn render_summary(result: &CollectionResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Collection {}: {}/{} devices succeeded, {} records ({} dropped).",
        result.started_at.to_rfc3339(),
        result.succeeded(),
        result.outcomes.len(),
        result.total_records(),
        result.dropped_records()
    );

    for outcome in &result.outcomes {
        match &outcome.outcome {
            Outcome::Success { records, dropped } => {
                let _ = write!(out, "  {}: {} records", outcome.device, records.len());
                if *dropped > 0 {
                    let _ = write!(out, " ({dropped} dropped)");
                }
                out.push('\n');
            }
            Outcome::Failure { reason, message } => {
                let _ = writeln!(out, "  {}: FAILED ({reason}): {message}", outcome.device);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::model::{AddressFamily, DeviceOutcome, SessionState};

    fn sample() -> CollectionResult {
        let record = NeighborRecord {
            local_device: "r1".to_string(),
            peer_address: "10.0.0.2".parse().unwrap(),
            peer_asn: 65001,
            session_state: SessionState::Established,
            uptime_seconds: Some(3600),
            prefixes_received: None,
            address_family: AddressFamily::Ipv4Unicast,
        };
        CollectionResult {
            started_at: Utc.with_ymd_and_hms(2024, 5, 14, 10, 30, 0).unwrap(),
            outcomes: vec![
                DeviceOutcome::success("r1", vec![record], 1),
                DeviceOutcome::failure("r2", FailureReason::Unreachable, "no route to host"),
            ],
        }
    }

    #[test]
    fn test_exit_codes() {
        let mut result = sample();
        assert_eq!(exit_code(&result), 1);

        result.outcomes.remove(1);
        assert_eq!(exit_code(&result), 0);

        let total = CollectionResult {
            started_at: Utc::now(),
            outcomes: vec![DeviceOutcome::failure(
                "r1",
                FailureReason::CommandTimeout,
                "slow",
            )],
        };
        assert_eq!(exit_code(&total), 2);
    }

    #[test]
    fn test_json_report_shape() {
        let rendered = render_json(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(value["succeeded"], 1);
        assert_eq!(value["failed"], 1);
        assert_eq!(value["total_records"], 1);
        assert_eq!(value["dropped_records"], 1);
        assert_eq!(value["neighbours"][0]["peer_address"], "10.0.0.2");
        // Absent counters serialize as null, never zero.
        assert!(value["neighbours"][0]["prefixes_received"].is_null());
        assert_eq!(value["failures"][0]["device"], "r2");
        assert_eq!(value["failures"][0]["reason"], "Unreachable");
    }

    #[test]
    fn test_csv_report() {
        let rendered = render_csv(&sample()).unwrap();
        let mut lines = rendered.lines();
        assert_eq!(
            lines.next().unwrap(),
            "hostname,peer_address,peer_asn,address_family,session_state,uptime_seconds,prefixes_received"
        );
        assert_eq!(
            lines.next().unwrap(),
            "r1,10.0.0.2,65001,ipv4-unicast,Established,3600,"
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_summary_distinguishes_failures() {
        let rendered = render_summary(&sample());
        assert!(rendered.contains("1/2 devices succeeded"));
        assert!(rendered.contains("r1: 1 records (1 dropped)"));
        assert!(rendered.contains("r2: FAILED (unreachable): no route to host"));
    }
}
