//! Fleet-wide collection scheduler.
//!
//! Fans one worker out per device with bounded parallelism and collects
//! exactly one outcome per input descriptor, regardless of how many
//! devices fail. Only configuration errors abort a run.

use std::sync::Arc;

use chrono::Utc;
use log::{error, info};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::worker::collect_device;
use super::RunOptions;
use crate::config::{CredentialStore, DeviceDescriptor};
use crate::error::ConfigError;
use crate::model::{CollectionResult, DeviceOutcome, FailureReason};
use crate::transport::Transport;
use crate::vendor::VendorCatalog;

/// Run a collection over the fleet.
///
/// Preflight validation happens before any device is contacted: an
/// unknown vendor, a template that does not compile, or an unresolvable
/// credential reference fails the whole run as a [`ConfigError`].
pub async fn run<T: Transport>(
    transport: Arc<T>,
    catalog: &VendorCatalog,
    credentials: &CredentialStore,
    descriptors: &[DeviceDescriptor],
    options: &RunOptions,
) -> Result<CollectionResult, ConfigError> {
    if descriptors.is_empty() {
        return Err(ConfigError::EmptyInventory);
    }
    if options.concurrency == 0 {
        return Err(ConfigError::InvalidOption {
            message: "concurrency must be at least 1".to_string(),
        });
    }
    if options.collect.tables.is_empty() {
        return Err(ConfigError::InvalidOption {
            message: "at least one routing table must be requested".to_string(),
        });
    }

    let mut jobs = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        let profile = catalog.require(descriptor.vendor)?;
        profile.validate()?;
        let creds = credentials.resolve(&descriptor.credentials)?;
        creds.auth_method()?;
        jobs.push((descriptor.clone(), creds.clone(), profile.clone()));
    }

    let started_at = Utc::now();
    let deadline = options
        .deadline
        .map(|d| tokio::time::Instant::now() + d);
    let semaphore = Arc::new(Semaphore::new(options.concurrency));
    let mut tasks = JoinSet::new();

    info!(
        "Collecting from {} devices (concurrency {}).",
        descriptors.len(),
        options.concurrency
    );

    for (index, (descriptor, creds, profile)) in jobs.into_iter().enumerate() {
        let transport = transport.clone();
        let semaphore = semaphore.clone();
        let collect_options = options.collect.clone();

        tasks.spawn(async move {
            let hostname = descriptor.hostname.clone();
            let worker = async {
                // The permit is acquired inside the deadline scope so
                // that queued devices are cancellable too.
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return DeviceOutcome::failure(
                            &hostname,
                            FailureReason::Cancelled,
                            "scheduler shut down",
                        );
                    }
                };
                collect_device(
                    transport.as_ref(),
                    &descriptor,
                    &creds,
                    &profile,
                    &collect_options,
                )
                .await
            };

            let outcome = match deadline {
                Some(at) => match tokio::time::timeout_at(at, worker).await {
                    Ok(outcome) => outcome,
                    Err(_) => DeviceOutcome::failure(
                        &hostname,
                        FailureReason::Cancelled,
                        "run deadline exceeded",
                    ),
                },
                None => worker.await,
            };

            (index, outcome)
        });
    }

    let mut slots: Vec<Option<DeviceOutcome>> = vec![None; descriptors.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, outcome)) => slots[index] = Some(outcome),
            Err(e) => error!("Collection task failed: {e}"),
        }
    }

    // Every input descriptor yields exactly one outcome, even if a task
    // was aborted out from under us.
    let outcomes = slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.unwrap_or_else(|| {
                DeviceOutcome::failure(
                    &descriptors[index].hostname,
                    FailureReason::Cancelled,
                    "collection task aborted",
                )
            })
        })
        .collect();

    let result = CollectionResult {
        started_at,
        outcomes,
    };

    info!(
        "Collection finished: {} succeeded, {} failed, {} records.",
        result.succeeded(),
        result.failed(),
        result.total_records()
    );

    Ok(result)
}
