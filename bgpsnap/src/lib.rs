//! # bgpsnap
//!
//! Fleet-wide BGP neighbour state collection over SSH.
//!
//! bgpsnap fans sessions out across many network devices in parallel,
//! normalizes each vendor's "show bgp neighbor" output into canonical
//! records, tolerates per-device failure without losing the rest of the
//! fleet's data, and persists timestamped snapshots to SQLite.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use bgpsnap::{
//!     collect, config::CredentialStore, config::Credentials, config::DeviceDescriptor,
//!     transport::SshTransport, vendor::Vendor, vendor::VendorCatalog,
//! };
//! use secrecy::SecretString;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), bgpsnap::Error> {
//!     let credentials = CredentialStore::single(Credentials::password(
//!         "admin",
//!         SecretString::from("secret"),
//!     ));
//!     let devices = vec![
//!         DeviceDescriptor::new("edge1.example.net", Vendor::Junos),
//!         DeviceDescriptor::new("core1.example.net", Vendor::IosXr),
//!     ];
//!
//!     let result = collect::run(
//!         Arc::new(SshTransport::new()),
//!         &VendorCatalog::builtin(),
//!         &credentials,
//!         &devices,
//!         &collect::RunOptions::default(),
//!     )
//!     .await?;
//!
//!     println!("{}", bgpsnap::report::render_summary(&result));
//!     Ok(())
//! }
//! ```

pub mod collect;
pub mod config;
pub mod error;
pub mod model;
pub mod normalize;
pub mod report;
pub mod store;
pub mod transport;
pub mod vendor;

// Re-export main types for convenience
pub use collect::{CollectOptions, RunOptions};
pub use config::{CredentialRef, CredentialStore, Credentials, DeviceDescriptor};
pub use error::Error;
pub use model::{
    AddressFamily, CollectionResult, DeviceOutcome, FailureReason, NeighborRecord, Outcome,
    SessionState, Snapshot,
};
pub use store::SnapshotStore;
pub use transport::{AuthMethod, Session, SshTransport, Transport};
pub use vendor::{Vendor, VendorCatalog, VendorProfile};
