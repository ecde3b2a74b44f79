//! Transport contract for reaching devices.
//!
//! The collection pipeline depends on transports only through the narrow
//! contract below: open a session, run a command for text, close. The
//! SSH implementation lives in [`ssh`]; tests substitute their own.

mod ssh;

#[cfg(test)]
pub(crate) mod testing;

pub use ssh::{SshSession, SshTransport};

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::TransportError;

/// Connection parameters for one device session.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    /// Target host (hostname or IP address).
    pub host: String,

    /// SSH port.
    pub port: u16,

    /// Username for authentication.
    pub username: String,

    /// Authentication method.
    pub auth: AuthMethod,
}

impl ConnectParams {
    /// Get the socket address for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Authentication method for device sessions.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// Password authentication.
    Password(SecretString),

    /// Private key authentication.
    PrivateKey {
        /// Path to the private key file.
        path: PathBuf,
        /// Optional passphrase for encrypted keys.
        passphrase: Option<SecretString>,
    },
}

/// Opens sessions to devices.
pub trait Transport: Send + Sync + 'static {
    /// Session type produced by this transport.
    type Session: Session;

    /// Open and authenticate a session, subject to a connection timeout.
    fn open(
        &self,
        params: &ConnectParams,
        timeout: Duration,
    ) -> impl Future<Output = Result<Self::Session, TransportError>> + Send;
}

/// One open session to one device.
pub trait Session: Send + 'static {
    /// Run a command and return its text output, subject to a timeout.
    fn run(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<String, TransportError>> + Send;

    /// Close the session.
    fn close(self) -> impl Future<Output = Result<(), TransportError>> + Send;
}
