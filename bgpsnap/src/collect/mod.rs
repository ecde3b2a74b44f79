//! The collection pipeline: per-device workers and the fleet scheduler.

mod scheduler;
mod worker;

pub use scheduler::run;
pub use worker::collect_device;

use std::time::Duration;

use crate::model::AddressFamily;
use crate::normalize::AsPolicy;

/// Options governing one device's collection.
#[derive(Debug, Clone)]
pub struct CollectOptions {
    /// Timeout for session establishment.
    pub connect_timeout: Duration,

    /// Timeout for each issued command.
    pub command_timeout: Duration,

    /// Total attempts for transient failures (connect, command timeout).
    pub attempts: u32,

    /// Initial backoff between attempts; doubles each retry.
    pub backoff: Duration,

    /// Routing tables to collect from text vendors.
    pub tables: Vec<AddressFamily>,

    /// AS admission policy applied during normalization.
    pub as_policy: AsPolicy,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(60),
            attempts: 2,
            backoff: Duration::from_millis(500),
            tables: vec![AddressFamily::Ipv4Unicast, AddressFamily::Ipv6Unicast],
            as_policy: AsPolicy::default(),
        }
    }
}

/// Options governing a fleet run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Maximum devices in flight at once, independent of fleet size.
    pub concurrency: usize,

    /// Overall run deadline; devices still pending when it expires are
    /// recorded as cancelled.
    pub deadline: Option<Duration>,

    /// Per-device options.
    pub collect: CollectOptions,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            concurrency: 8,
            deadline: None,
            collect: CollectOptions::default(),
        }
    }
}
