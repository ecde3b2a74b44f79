//! Inventory and credential configuration.
//!
//! Device descriptors and credentials are loaded up front and passed
//! into the pipeline explicitly; worker logic never reads ambient
//! configuration.

use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::transport::AuthMethod;
use crate::vendor::Vendor;

/// Opaque reference into the credential store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialRef(pub String);

impl Default for CredentialRef {
    fn default() -> Self {
        Self("default".to_string())
    }
}

impl fmt::Display for CredentialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Login material for a device.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    /// Username to log in with.
    pub username: String,

    /// Password, if password authentication is used.
    #[serde(default)]
    pub password: Option<SecretString>,

    /// Private key path, if key authentication is used.
    #[serde(default)]
    pub key_file: Option<PathBuf>,

    /// Passphrase for an encrypted private key.
    #[serde(default)]
    pub key_passphrase: Option<SecretString>,
}

impl Credentials {
    /// Password credentials.
    pub fn password(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password: Some(password),
            key_file: None,
            key_passphrase: None,
        }
    }

    /// The authentication method these credentials describe, password
    /// taking precedence over a key file.
    pub fn auth_method(&self) -> Result<AuthMethod, ConfigError> {
        if let Some(password) = &self.password {
            return Ok(AuthMethod::Password(password.clone()));
        }
        if let Some(path) = &self.key_file {
            return Ok(AuthMethod::PrivateKey {
                path: path.clone(),
                passphrase: self.key_passphrase.clone(),
            });
        }
        Err(ConfigError::InvalidOption {
            message: format!(
                "credentials for user '{}' have neither password nor key_file",
                self.username
            ),
        })
    }
}

/// Named credential sets, loaded from a JSON file.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    entries: IndexMap<String, Credentials>,
}

impl CredentialStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding one `default` entry.
    pub fn single(credentials: Credentials) -> Self {
        let mut store = Self::new();
        store.insert(CredentialRef::default().0, credentials);
        store
    }

    /// Load a store from a JSON file of `{name: {username, ...}}`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let entries: IndexMap<String, Credentials> =
            serde_json::from_str(&text).map_err(|e| ConfigError::InvalidFile {
                what: "credentials",
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { entries })
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, name: impl Into<String>, credentials: Credentials) {
        self.entries.insert(name.into(), credentials);
    }

    /// Resolve a credential reference.
    pub fn resolve(&self, reference: &CredentialRef) -> Result<&Credentials, ConfigError> {
        self.entries
            .get(&reference.0)
            .ok_or_else(|| ConfigError::UnknownCredential {
                name: reference.0.clone(),
            })
    }
}

fn default_port() -> u16 {
    22
}

/// Identity and connection parameters for one device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Hostname or address to connect to.
    pub hostname: String,

    /// SSH port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Vendor tag selecting command syntax and output parsing.
    #[serde(rename = "os", alias = "vendor")]
    pub vendor: Vendor,

    /// Which credential set to log in with.
    #[serde(default)]
    pub credentials: CredentialRef,

    /// Operator override of the vendor show command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_override: Option<String>,
}

impl DeviceDescriptor {
    /// Create a descriptor with defaults for everything but identity.
    pub fn new(hostname: impl Into<String>, vendor: Vendor) -> Self {
        Self {
            hostname: hostname.into(),
            port: default_port(),
            vendor,
            credentials: CredentialRef::default(),
            command_override: None,
        }
    }
}

/// Load device descriptors from a JSON seed file.
///
/// Accepts either a JSON array of descriptors or the legacy map form
/// `{hostname: descriptor}`.
pub fn load_seed(path: &Path) -> Result<Vec<DeviceDescriptor>, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    parse_seed(&text).map_err(|message| ConfigError::InvalidFile {
        what: "seed",
        path: path.display().to_string(),
        message,
    })
}

fn parse_seed(text: &str) -> Result<Vec<DeviceDescriptor>, String> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    match value {
        serde_json::Value::Array(_) => {
            serde_json::from_value(value).map_err(|e| e.to_string())
        }
        serde_json::Value::Object(_) => {
            let map: IndexMap<String, DeviceDescriptor> =
                serde_json::from_value(value).map_err(|e| e.to_string())?;
            Ok(map.into_values().collect())
        }
        _ => Err("expected a JSON array or object of devices".to_string()),
    }
}
