//! Scriptable in-memory transport for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{ConnectParams, Session, Transport};
use crate::error::TransportError;

/// Per-host behavior script.
#[derive(Debug, Clone, Default)]
pub(crate) struct HostScript {
    /// Delay before the connect completes.
    pub connect_delay: Duration,

    /// Fail this many connects before succeeding.
    pub connect_failures: usize,

    /// Every connect fails.
    pub always_unreachable: bool,

    /// Every command times out.
    pub command_timeout: bool,

    /// Command text to canned output.
    pub outputs: HashMap<String, String>,
}

impl HostScript {
    pub fn with_output(mut self, command: &str, output: &str) -> Self {
        self.outputs.insert(command.to_string(), output.to_string());
        self
    }
}

#[derive(Debug, Default)]
struct Counters {
    connects: AtomicUsize,
    closes: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

/// Scriptable transport; sessions replay the host's script.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeTransport {
    scripts: Arc<Mutex<HashMap<String, HostScript>>>,
    remaining_failures: Arc<Mutex<HashMap<String, usize>>>,
    counters: Arc<Counters>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, host: &str, script: HostScript) {
        self.remaining_failures
            .lock()
            .unwrap()
            .insert(host.to_string(), script.connect_failures);
        self.scripts
            .lock()
            .unwrap()
            .insert(host.to_string(), script);
    }

    pub fn connects(&self) -> usize {
        self.counters.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.counters.max_active.load(Ordering::SeqCst)
    }
}

impl Transport for FakeTransport {
    type Session = FakeSession;

    async fn open(
        &self,
        params: &ConnectParams,
        _timeout: Duration,
    ) -> Result<FakeSession, TransportError> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&params.host)
            .cloned()
            .unwrap_or_default();

        self.counters.connects.fetch_add(1, Ordering::SeqCst);

        if script.connect_delay > Duration::ZERO {
            tokio::time::sleep(script.connect_delay).await;
        }

        if script.always_unreachable {
            return Err(TransportError::Disconnected);
        }

        {
            let mut remaining = self.remaining_failures.lock().unwrap();
            if let Some(count) = remaining.get_mut(&params.host) {
                if *count > 0 {
                    *count -= 1;
                    return Err(TransportError::Disconnected);
                }
            }
        }

        let active = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_active.fetch_max(active, Ordering::SeqCst);

        Ok(FakeSession {
            script,
            counters: self.counters.clone(),
        })
    }
}

pub(crate) struct FakeSession {
    script: HostScript,
    counters: Arc<Counters>,
}

impl Session for FakeSession {
    async fn run(&mut self, command: &str, timeout: Duration) -> Result<String, TransportError> {
        if self.script.command_timeout {
            return Err(TransportError::Timeout(timeout));
        }
        Ok(self
            .script
            .outputs
            .get(command)
            .cloned()
            .unwrap_or_default())
    }

    async fn close(self) -> Result<(), TransportError> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.counters.active.fetch_sub(1, Ordering::SeqCst);
    }
}
