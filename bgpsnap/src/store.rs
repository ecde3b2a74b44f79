//! Snapshot persistence on SQLite.
//!
//! One snapshot per collection run, keyed by the run start timestamp.
//! `save` is transactional: either the whole snapshot (records plus
//! failure log) becomes visible, or none of it does, and re-saving the
//! same key replaces the previous content instead of duplicating it.

use chrono::{DateTime, SecondsFormat, Utc};
use log::info;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;

use crate::error::StoreError;
use crate::model::{
    AddressFamily, CollectionResult, NeighborRecord, SessionState, Snapshot, SnapshotFailure,
};

/// Connection acquire timeout.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// What a save wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveSummary {
    /// Neighbor records written.
    pub records: usize,

    /// Failure rows written.
    pub failures: usize,

    /// Whether a previous snapshot for the key was replaced.
    pub replaced: bool,
}

/// Snapshot store backed by SQLite.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    pool: SqlitePool,
}

impl SnapshotStore {
    /// Open (and create if missing) a snapshot database.
    ///
    /// `url` is a SQLite connection URL, e.g. `sqlite:snapshots.db` or
    /// `sqlite::memory:`. The pool holds a single connection: writes for
    /// a key must not interleave, and SQLite serializes them for us at
    /// the connection level.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(StoreError::Database)?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS snapshots (
                ts TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                succeeded INTEGER NOT NULL,
                failed INTEGER NOT NULL,
                total_records INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS neighbors (
                snapshot_ts TEXT NOT NULL,
                hostname TEXT NOT NULL,
                peer_address TEXT NOT NULL,
                peer_asn INTEGER NOT NULL,
                session_state TEXT NOT NULL,
                uptime_seconds INTEGER,
                prefixes_received INTEGER,
                address_family TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS failures (
                snapshot_ts TEXT NOT NULL,
                hostname TEXT NOT NULL,
                reason TEXT NOT NULL,
                message TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_neighbors_ts ON neighbors (snapshot_ts)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Persist a collection result as one snapshot, atomically.
    ///
    /// Saving the same timestamp key again replaces the earlier snapshot.
    pub async fn save(&self, result: &CollectionResult) -> Result<SaveSummary, StoreError> {
        let key = format_key(result.started_at);

        let mut tx = self.pool.begin().await?;

        let replaced = sqlx::query("SELECT 1 FROM snapshots WHERE ts = ?1")
            .bind(&key)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();

        sqlx::query(
            "INSERT INTO snapshots (ts, created_at, succeeded, failed, total_records)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(ts) DO UPDATE SET
                created_at = excluded.created_at,
                succeeded = excluded.succeeded,
                failed = excluded.failed,
                total_records = excluded.total_records",
        )
        .bind(&key)
        .bind(format_key(Utc::now()))
        .bind(result.succeeded() as i64)
        .bind(result.failed() as i64)
        .bind(result.total_records() as i64)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM neighbors WHERE snapshot_ts = ?1")
            .bind(&key)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM failures WHERE snapshot_ts = ?1")
            .bind(&key)
            .execute(&mut *tx)
            .await?;

        let mut records = 0usize;
        for record in result.records() {
            sqlx::query(
                "INSERT INTO neighbors
                    (snapshot_ts, hostname, peer_address, peer_asn, session_state,
                     uptime_seconds, prefixes_received, address_family)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .bind(&key)
            .bind(&record.local_device)
            .bind(record.peer_address.to_string())
            .bind(record.peer_asn as i64)
            .bind(record.session_state.as_str())
            .bind(record.uptime_seconds.map(|v| v as i64))
            .bind(record.prefixes_received.map(|v| v as i64))
            .bind(record.address_family.as_str())
            .execute(&mut *tx)
            .await?;
            records += 1;
        }

        let mut failures = 0usize;
        for (device, reason, message) in result.failures() {
            sqlx::query(
                "INSERT INTO failures (snapshot_ts, hostname, reason, message)
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&key)
            .bind(device)
            .bind(reason.as_str())
            .bind(message)
            .execute(&mut *tx)
            .await?;
            failures += 1;
        }

        tx.commit().await?;

        info!("Saved snapshot {key}: {records} records, {failures} failures.");
        Ok(SaveSummary {
            records,
            failures,
            replaced,
        })
    }

    /// Load the snapshot for a timestamp key.
    pub async fn load(&self, timestamp: DateTime<Utc>) -> Result<Snapshot, StoreError> {
        let key = format_key(timestamp);

        let exists = sqlx::query("SELECT 1 FROM snapshots WHERE ts = ?1")
            .bind(&key)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(StoreError::NotFound { ts: key });
        }

        let rows = sqlx::query(
            "SELECT hostname, peer_address, peer_asn, session_state,
                    uptime_seconds, prefixes_received, address_family
             FROM neighbors WHERE snapshot_ts = ?1 ORDER BY rowid",
        )
        .bind(&key)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(record_from_row(&row)?);
        }

        let rows = sqlx::query(
            "SELECT hostname, reason, message
             FROM failures WHERE snapshot_ts = ?1 ORDER BY rowid",
        )
        .bind(&key)
        .fetch_all(&self.pool)
        .await?;

        let mut failures = Vec::with_capacity(rows.len());
        for row in rows {
            let reason: String = row.get("reason");
            failures.push(SnapshotFailure {
                device: row.get("hostname"),
                reason: crate::model::FailureReason::from_stored(&reason).ok_or_else(|| {
                    StoreError::Corrupt {
                        message: format!("unknown failure reason '{reason}'"),
                    }
                })?,
                message: row.get("message"),
            });
        }

        Ok(Snapshot {
            timestamp,
            records,
            failures,
        })
    }

    /// All snapshot timestamps, oldest first.
    pub async fn list_timestamps(&self) -> Result<Vec<DateTime<Utc>>, StoreError> {
        let rows = sqlx::query("SELECT ts FROM snapshots ORDER BY ts ASC")
            .fetch_all(&self.pool)
            .await?;

        let mut timestamps = Vec::with_capacity(rows.len());
        for row in rows {
            let ts: String = row.get("ts");
            timestamps.push(parse_key(&ts)?);
        }
        Ok(timestamps)
    }

    /// Close the store gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<NeighborRecord, StoreError> {
    let address: String = row.get("peer_address");
    let peer_address = address.parse().map_err(|_| StoreError::Corrupt {
        message: format!("invalid peer address '{address}'"),
    })?;
    let state: String = row.get("session_state");
    let family: String = row.get("address_family");

    Ok(NeighborRecord {
        local_device: row.get("hostname"),
        peer_address,
        peer_asn: row.get::<i64, _>("peer_asn") as u32,
        session_state: SessionState::from_stored(&state),
        uptime_seconds: row.get::<Option<i64>, _>("uptime_seconds").map(|v| v as u64),
        prefixes_received: row
            .get::<Option<i64>, _>("prefixes_received")
            .map(|v| v as u64),
        address_family: AddressFamily::from_stored(&family),
    })
}

/// Fixed-format key so that replaces match exactly and parsing back is
/// lossless.
fn format_key(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_key(key: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(key)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            message: format!("invalid timestamp key '{key}': {e}"),
        })
}
