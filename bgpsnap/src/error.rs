//! Error types for bgpsnap.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for bgpsnap operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (inventory, credentials, vendor catalog)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Output normalization errors
    #[error("Normalize error: {0}")]
    Normalize(#[from] NormalizeError),

    /// Snapshot persistence errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Report rendering errors
    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}

/// Configuration errors.
///
/// These are fatal: they abort a run before any device is contacted.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Vendor tag not recognized
    #[error("Unknown vendor tag '{tag}'")]
    UnknownVendor { tag: String },

    /// Vendor has no profile registered in the catalog
    #[error("No profile registered for vendor '{vendor}'")]
    MissingProfile { vendor: String },

    /// Credential reference does not resolve
    #[error("Unknown credential reference '{name}'")]
    UnknownCredential { name: String },

    /// TextFSM template failed to compile
    #[error("Invalid template for vendor '{vendor}': {message}")]
    InvalidTemplate { vendor: String, message: String },

    /// Seed or credentials file could not be parsed
    #[error("Invalid {what} file '{path}': {message}")]
    InvalidFile {
        what: &'static str,
        path: String,
        message: String,
    },

    /// Device list is empty
    #[error("Device list is empty")]
    EmptyInventory,

    /// Invalid run option
    #[error("Invalid option: {message}")]
    InvalidOption { message: String },

    /// I/O error reading configuration
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Transport layer errors (SSH connection, authentication, command I/O).
#[derive(Error, Debug)]
pub enum TransportError {
    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host key was rejected by the verification policy
    #[error("Host key rejected for {host}:{port}")]
    HostKeyRejected { host: String, port: u16 },

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Whether this error is a timeout (command timeouts are retried,
    /// other session errors are treated as the device being unreachable).
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Normalization errors.
///
/// These describe output that could not be processed at all, as opposed
/// to individual malformed rows, which are dropped and counted.
#[derive(Error, Debug)]
pub enum NormalizeError {
    /// TextFSM template failed to compile or apply
    #[error("Template error: {message}")]
    Template { message: String },

    /// Structured markup could not be parsed
    #[error("Markup error: {message}")]
    Markup { message: String },

    /// Too many rows were malformed to trust the output
    #[error("{dropped} of {total} rows malformed")]
    TooManyMalformed { dropped: usize, total: usize },
}

/// Snapshot store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No snapshot exists for the requested timestamp
    #[error("No snapshot for timestamp '{ts}'")]
    NotFound { ts: String },

    /// A persisted value could not be decoded
    #[error("Corrupt snapshot data: {message}")]
    Corrupt { message: String },
}

/// Report rendering errors.
#[derive(Error, Debug)]
pub enum ReportError {
    /// JSON serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV serialization failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias using bgpsnap's Error.
pub type Result<T> = std::result::Result<T, Error>;
