//! SSH transport implementation using russh.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::warn;
use russh::client::{self, Handle, Msg};
use russh::keys::{load_secret_key, PrivateKeyWithHashAlg, PublicKey};
use russh::{Channel, ChannelMsg};
use secrecy::ExposeSecret;

use super::{AuthMethod, ConnectParams, Session, Transport};
use crate::error::TransportError;

/// SSH transport wrapping russh.
///
/// One transport value serves the whole fleet; each [`Transport::open`]
/// call produces an independent session.
#[derive(Debug, Clone, Default)]
pub struct SshTransport {
    /// Verify host keys against known_hosts. Off by default: network
    /// collectors typically run against lab/known fleets the way the
    /// original tooling did, with `auth_strict_key` disabled.
    pub verify_host_key: bool,

    /// Path to known_hosts; the user default when None.
    pub known_hosts_path: Option<PathBuf>,
}

impl SshTransport {
    /// Create a transport that accepts any host key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport that verifies host keys against known_hosts,
    /// learning unknown hosts and rejecting changed keys.
    pub fn with_host_key_verification(known_hosts_path: Option<PathBuf>) -> Self {
        Self {
            verify_host_key: true,
            known_hosts_path,
        }
    }

    async fn authenticate(
        session: &mut Handle<SshHandler>,
        params: &ConnectParams,
    ) -> Result<(), TransportError> {
        let success = match &params.auth {
            AuthMethod::Password(password) => session
                .authenticate_password(&params.username, password.expose_secret())
                .await
                .map_err(TransportError::Ssh)?
                .success(),
            AuthMethod::PrivateKey { path, passphrase } => {
                let key = load_secret_key(path, passphrase.as_ref().map(|p| p.expose_secret()))
                    .map_err(|e| TransportError::Key(e.to_string()))?;

                let hash_alg = session
                    .best_supported_rsa_hash()
                    .await
                    .map_err(TransportError::Ssh)?
                    .flatten();

                session
                    .authenticate_publickey(
                        &params.username,
                        PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                    )
                    .await
                    .map_err(TransportError::Ssh)?
                    .success()
            }
        };

        if !success {
            return Err(TransportError::AuthenticationFailed {
                user: params.username.clone(),
            });
        }

        Ok(())
    }
}

impl Transport for SshTransport {
    type Session = SshSession;

    async fn open(
        &self,
        params: &ConnectParams,
        timeout: Duration,
    ) -> Result<SshSession, TransportError> {
        let config = Arc::new(client::Config {
            inactivity_timeout: Some(timeout),
            ..Default::default()
        });

        let handler = SshHandler {
            host: params.host.clone(),
            port: params.port,
            verify_host_key: self.verify_host_key,
            known_hosts_path: self.known_hosts_path.clone(),
        };

        let mut session = tokio::time::timeout(
            timeout,
            client::connect(config, (params.host.as_str(), params.port), handler),
        )
        .await
        .map_err(|_| TransportError::Timeout(timeout))?
        .map_err(TransportError::Ssh)?;

        Self::authenticate(&mut session, params).await?;

        Ok(SshSession { session })
    }
}

/// One authenticated SSH session.
pub struct SshSession {
    session: Handle<SshHandler>,
}

impl SshSession {
    async fn drain_channel(mut channel: Channel<Msg>) -> Result<String, TransportError> {
        let mut output = Vec::new();
        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { ref data }) => output.extend_from_slice(data),
                Some(ChannelMsg::ExtendedData { ref data, .. }) => output.extend_from_slice(data),
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => break,
                Some(_) => {}
            }
        }
        Ok(String::from_utf8_lossy(&output).into_owned())
    }
}

impl Session for SshSession {
    async fn run(&mut self, command: &str, timeout: Duration) -> Result<String, TransportError> {
        let channel = self
            .session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .exec(true, command)
            .await
            .map_err(TransportError::Ssh)?;

        tokio::time::timeout(timeout, Self::drain_channel(channel))
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
    }

    async fn close(self) -> Result<(), TransportError> {
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(TransportError::Ssh)?;
        Ok(())
    }
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    verify_host_key: bool,
    known_hosts_path: Option<PathBuf>,
}

impl SshHandler {
    /// Check the host key against known_hosts, learning unknown hosts.
    fn check_or_learn(&self, pubkey: &PublicKey) -> bool {
        let checked = if let Some(ref path) = self.known_hosts_path {
            russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::check_known_hosts(&self.host, self.port, pubkey)
        };

        match checked {
            Ok(true) => true,
            Ok(false) => {
                let learned = if let Some(ref path) = self.known_hosts_path {
                    russh::keys::known_hosts::learn_known_hosts_path(
                        &self.host, self.port, pubkey, path,
                    )
                } else {
                    russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey)
                };
                if let Err(e) = learned {
                    warn!("Failed to save host key for {}:{}: {}", self.host, self.port, e);
                }
                true
            }
            Err(e) => {
                warn!(
                    "Host key rejected for {}:{}: {}",
                    self.host, self.port, e
                );
                false
            }
        }
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        if !self.verify_host_key {
            return Ok(true);
        }
        Ok(self.check_or_learn(server_public_key))
    }
}
