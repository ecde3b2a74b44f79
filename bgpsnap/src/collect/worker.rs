//! Per-device collection worker.
//!
//! A worker owns one device's lifecycle for a run: open a session, issue
//! the vendor's show commands, normalize the output, release the session.
//! All failure is returned as a [`DeviceOutcome`]; nothing escapes the
//! worker boundary.

use log::{debug, warn};

use super::CollectOptions;
use crate::config::{Credentials, DeviceDescriptor};
use crate::model::{DeviceOutcome, FailureReason};
use crate::normalize::{normalize, CommandOutput};
use crate::transport::{ConnectParams, Session, Transport};
use crate::vendor::VendorProfile;

/// A failure worth another attempt.
struct Transient {
    reason: FailureReason,
    message: String,
}

/// What one attempt produced.
enum Attempt {
    Done(DeviceOutcome),
    Retryable(Transient),
}

/// Collect BGP neighbor state from one device.
///
/// Transient failures (unreachable, command timeout) are retried up to
/// `options.attempts` times with doubling backoff; command rejection and
/// parse failures are reported immediately.
pub async fn collect_device<T: Transport>(
    transport: &T,
    descriptor: &DeviceDescriptor,
    credentials: &Credentials,
    profile: &VendorProfile,
    options: &CollectOptions,
) -> DeviceOutcome {
    let hostname = descriptor.hostname.as_str();
    let mut backoff = options.backoff;
    let mut attempt_no = 0;

    loop {
        attempt_no += 1;
        match attempt(transport, descriptor, credentials, profile, options).await {
            Attempt::Done(outcome) => return outcome,
            Attempt::Retryable(transient) => {
                if attempt_no >= options.attempts.max(1) {
                    return DeviceOutcome::failure(hostname, transient.reason, transient.message);
                }
                warn!(
                    "[{hostname}] {} (attempt {attempt_no}/{}), retrying in {:?}.",
                    transient.message, options.attempts, backoff
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }
    }
}

async fn attempt<T: Transport>(
    transport: &T,
    descriptor: &DeviceDescriptor,
    credentials: &Credentials,
    profile: &VendorProfile,
    options: &CollectOptions,
) -> Attempt {
    let hostname = descriptor.hostname.as_str();

    let auth = match credentials.auth_method() {
        Ok(auth) => auth,
        // Caught in scheduler preflight; a worker invoked directly with
        // unusable credentials cannot reach the device.
        Err(e) => {
            return Attempt::Done(DeviceOutcome::failure(
                hostname,
                FailureReason::Unreachable,
                e.to_string(),
            ));
        }
    };

    let params = ConnectParams {
        host: descriptor.hostname.clone(),
        port: descriptor.port,
        username: credentials.username.clone(),
        auth,
    };

    let mut session = match transport.open(&params, options.connect_timeout).await {
        Ok(session) => session,
        Err(e) => {
            return Attempt::Retryable(Transient {
                reason: FailureReason::Unreachable,
                message: format!("connect failed: {e}"),
            });
        }
    };

    let commands = profile.commands(&options.tables, descriptor.command_override.as_deref());
    let mut outputs = Vec::with_capacity(commands.len());
    let mut failed: Option<Attempt> = None;

    for planned in &commands {
        debug!("[{hostname}] Running '{}'.", planned.command);
        match session.run(&planned.command, options.command_timeout).await {
            Ok(text) => {
                if let Some(pattern) = profile.failure_in(&text) {
                    failed = Some(Attempt::Done(DeviceOutcome::failure(
                        hostname,
                        FailureReason::CommandError,
                        format!("device rejected '{}': {pattern}", planned.command),
                    )));
                    break;
                }
                outputs.push(CommandOutput::new(planned.family, text));
            }
            Err(e) if e.is_timeout() => {
                failed = Some(Attempt::Retryable(Transient {
                    reason: FailureReason::CommandTimeout,
                    message: format!("'{}' timed out: {e}", planned.command),
                }));
                break;
            }
            Err(e) => {
                failed = Some(Attempt::Retryable(Transient {
                    reason: FailureReason::Unreachable,
                    message: format!("session failed during '{}': {e}", planned.command),
                }));
                break;
            }
        }
    }

    // The session is released on every path; close errors are not worth
    // more than a log line.
    if let Err(e) = session.close().await {
        debug!("[{hostname}] Error closing session: {e}");
    }

    if let Some(attempt) = failed {
        return attempt;
    }

    match normalize(profile, hostname, &outputs, &options.as_policy) {
        Ok(normalized) => {
            if normalized.records.is_empty() {
                debug!("[{hostname}] Device has no neighbours.");
            }
            Attempt::Done(DeviceOutcome::success(
                hostname,
                normalized.records,
                normalized.dropped,
            ))
        }
        Err(e) => Attempt::Done(DeviceOutcome::failure(
            hostname,
            FailureReason::ParseError,
            e.to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;

    use super::*;
    use crate::model::{Outcome, SessionState};
    use crate::transport::testing::{FakeTransport, HostScript};
    use crate::vendor::{Vendor, VendorCatalog};

    const IOS_V4: &str = "\
Neighbor        V           AS MsgRcvd MsgSent   TblVer  InQ OutQ Up/Down  State/PfxRcd
10.1.1.2        4        65001  226479  226490       53    0    0 1d02h          42
";

    const IOS_V6: &str = "\
Neighbor        V           AS MsgRcvd MsgSent   TblVer  InQ OutQ Up/Down  State/PfxRcd
2001:DB8::2     4        65002     100      99        1    0    0 never    Idle
";

    fn quick_options() -> CollectOptions {
        CollectOptions {
            backoff: Duration::from_millis(1),
            ..CollectOptions::default()
        }
    }

    fn credentials() -> Credentials {
        Credentials::password("admin", SecretString::from("secret"))
    }

    fn ios_profile() -> VendorProfile {
        VendorCatalog::builtin()
            .profile(Vendor::Ios)
            .unwrap()
            .clone()
    }

    #[tokio::test]
    async fn test_collect_success() {
        let transport = FakeTransport::new();
        transport.script(
            "r1",
            HostScript::default()
                .with_output("show ip bgp summary", IOS_V4)
                .with_output("show bgp ipv6 unicast summary", IOS_V6),
        );

        let outcome = collect_device(
            &transport,
            &DeviceDescriptor::new("r1", Vendor::Ios),
            &credentials(),
            &ios_profile(),
            &quick_options(),
        )
        .await;

        assert!(outcome.is_success());
        let records = outcome.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].session_state, SessionState::Established);
        assert_eq!(records[1].session_state, SessionState::Idle);
        assert_eq!(transport.connects(), 1);
        assert_eq!(transport.closes(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_retried_then_succeeds() {
        let transport = FakeTransport::new();
        transport.script(
            "r1",
            HostScript {
                connect_failures: 1,
                ..HostScript::default()
            }
            .with_output("show ip bgp summary", IOS_V4)
            .with_output("show bgp ipv6 unicast summary", IOS_V6),
        );

        let outcome = collect_device(
            &transport,
            &DeviceDescriptor::new("r1", Vendor::Ios),
            &credentials(),
            &ios_profile(),
            &quick_options(),
        )
        .await;

        assert!(outcome.is_success());
        assert_eq!(transport.connects(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_exhausts_attempts() {
        let transport = FakeTransport::new();
        transport.script(
            "r1",
            HostScript {
                always_unreachable: true,
                ..HostScript::default()
            },
        );

        let outcome = collect_device(
            &transport,
            &DeviceDescriptor::new("r1", Vendor::Ios),
            &credentials(),
            &ios_profile(),
            &quick_options(),
        )
        .await;

        match outcome.outcome {
            Outcome::Failure { reason, .. } => assert_eq!(reason, FailureReason::Unreachable),
            Outcome::Success { .. } => panic!("expected failure"),
        }
        assert_eq!(transport.connects(), 2);
    }

    #[tokio::test]
    async fn test_command_timeout_retried() {
        let transport = FakeTransport::new();
        transport.script(
            "r1",
            HostScript {
                command_timeout: true,
                ..HostScript::default()
            },
        );

        let outcome = collect_device(
            &transport,
            &DeviceDescriptor::new("r1", Vendor::Ios),
            &credentials(),
            &ios_profile(),
            &quick_options(),
        )
        .await;

        match outcome.outcome {
            Outcome::Failure { reason, .. } => assert_eq!(reason, FailureReason::CommandTimeout),
            Outcome::Success { .. } => panic!("expected failure"),
        }
        // Retried, and the session was released each time.
        assert_eq!(transport.connects(), 2);
        assert_eq!(transport.closes(), 2);
    }

    #[tokio::test]
    async fn test_command_error_not_retried() {
        let transport = FakeTransport::new();
        transport.script(
            "r1",
            HostScript::default().with_output(
                "show ip bgp summary",
                "% Invalid input detected at '^' marker.",
            ),
        );

        let outcome = collect_device(
            &transport,
            &DeviceDescriptor::new("r1", Vendor::Ios),
            &credentials(),
            &ios_profile(),
            &quick_options(),
        )
        .await;

        match outcome.outcome {
            Outcome::Failure { reason, message } => {
                assert_eq!(reason, FailureReason::CommandError);
                assert!(message.contains("% Invalid input"));
            }
            Outcome::Success { .. } => panic!("expected failure"),
        }
        assert_eq!(transport.connects(), 1);
        assert_eq!(transport.closes(), 1);
    }

    #[tokio::test]
    async fn test_markup_garbage_is_parse_error() {
        let transport = FakeTransport::new();
        transport.script(
            "edge1",
            HostScript::default()
                .with_output("show bgp neighbor | display xml", "no xml here"),
        );

        let catalog = VendorCatalog::builtin();
        let outcome = collect_device(
            &transport,
            &DeviceDescriptor::new("edge1", Vendor::Junos),
            &credentials(),
            catalog.profile(Vendor::Junos).unwrap(),
            &quick_options(),
        )
        .await;

        match outcome.outcome {
            Outcome::Failure { reason, .. } => assert_eq!(reason, FailureReason::ParseError),
            Outcome::Success { .. } => panic!("expected failure"),
        }
        // Parse failures are persistent; no retry.
        assert_eq!(transport.connects(), 1);
        assert_eq!(transport.closes(), 1);
    }

    #[tokio::test]
    async fn test_command_override_replaces_plan() {
        let transport = FakeTransport::new();
        transport.script(
            "r1",
            HostScript::default().with_output("show ip bgp summary vrf CORE", IOS_V4),
        );

        let mut descriptor = DeviceDescriptor::new("r1", Vendor::Ios);
        descriptor.command_override = Some("show ip bgp summary vrf CORE".to_string());

        let outcome = collect_device(
            &transport,
            &descriptor,
            &credentials(),
            &ios_profile(),
            &quick_options(),
        )
        .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.records().len(), 1);
        // Override carries no table context.
        assert_eq!(
            outcome.records()[0].address_family,
            crate::model::AddressFamily::Unknown
        );
    }
}
