//! # Retry
//!
//! Exponential backoff over a classified retryable set.
//!
//! The backoff before retry `n` (1-based) is
//! `min(max_backoff, initial_backoff * backoff_factor^(n-1))`. `attempts`
//! counts total invocations, so a policy with 3 attempts sleeps twice.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;

use fabric_protos::common::Status;
use fabric_protos::peer::TxValidationCode;
use fabric_telemetry::RETRY_ATTEMPTS;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{ClientCode, FabricError, Group};

/// Retryable codes per status group.
pub type RetryableCodes = HashMap<Group, HashSet<i32>>;

/// Total invocations for the default and channel policies.
pub const DEFAULT_ATTEMPTS: u32 = 3;
/// First backoff for the default and channel policies.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(500);
/// Backoff ceiling for every built-in policy.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);
/// Growth factor for the default and channel policies.
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Total invocations for resource management.
pub const RESMGMT_ATTEMPTS: u32 = 5;
/// First backoff for resource management.
pub const RESMGMT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
/// Growth factor for resource management.
pub const RESMGMT_BACKOFF_FACTOR: f64 = 2.5;

const GRPC_UNAVAILABLE: i32 = tonic::Code::Unavailable as i32;

/// Backoff schedule plus the set of retryable `(group, code)` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total invocations, including the first
    pub attempts: u32,
    /// Backoff before the first retry
    pub initial_backoff: Duration,
    /// Backoff ceiling
    pub max_backoff: Duration,
    /// Multiplier applied per retry
    pub backoff_factor: f64,
    /// Errors worth retrying
    pub retryable_codes: RetryableCodes,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            retryable_codes: default_retryable_codes(),
        }
    }
}

impl RetryPolicy {
    /// Policy for chaincode queries and invocations.
    pub fn channel_client() -> Self {
        Self {
            retryable_codes: channel_client_retryable_codes(),
            ..Self::default()
        }
    }

    /// Policy for resource management: installs, lifecycle and channel joins.
    pub fn resource_management() -> Self {
        Self {
            attempts: RESMGMT_ATTEMPTS,
            initial_backoff: RESMGMT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            backoff_factor: RESMGMT_BACKOFF_FACTOR,
            retryable_codes: resource_management_retryable_codes(),
        }
    }

    /// Policy for channel configuration queries.
    pub fn channel_config() -> Self {
        Self {
            retryable_codes: channel_config_retryable_codes(),
            ..Self::default()
        }
    }

    /// Single invocation, nothing retried.
    pub fn no_retry() -> Self {
        Self {
            attempts: 1,
            retryable_codes: RetryableCodes::new(),
            ..Self::default()
        }
    }

    /// Backoff to wait before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.initial_backoff.as_secs_f64() * self.backoff_factor.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_backoff.as_secs_f64() {
            return self.max_backoff;
        }
        Duration::from_secs_f64(scaled.max(0.0))
    }

    /// Whether `err` carries a status in the retryable set.
    pub fn is_retryable(&self, err: &FabricError) -> bool {
        err.status()
            .and_then(|status| {
                self.retryable_codes
                    .get(&status.group)
                    .map(|codes| codes.contains(&status.code))
            })
            .unwrap_or(false)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable
    /// error, or the attempts are used up.
    ///
    /// A failure on the first invocation that is not retryable is returned
    /// as is; any other failure is wrapped in
    /// [`FabricError::RetriesExhausted`] with the invocation count.
    pub async fn invoke<T, F, Fut>(&self, mut operation: F) -> Result<T, FabricError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FabricError>>,
    {
        let mut attempt: u32 = 1;
        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let retryable = self.is_retryable(&err);
            if !retryable && attempt == 1 {
                return Err(err);
            }
            if !retryable || attempt >= self.attempts {
                debug!(attempts = attempt, error = %err, "giving up");
                return Err(FabricError::RetriesExhausted {
                    attempts: attempt,
                    source: Box::new(err),
                });
            }

            let backoff = self.backoff(attempt);
            let group = err.status().map(|s| s.group.as_str()).unwrap_or("Unknown");
            RETRY_ATTEMPTS.with_label_values(&[group]).inc();
            warn!(
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                error = %err,
                "retrying after retryable error"
            );

            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}

fn codes<const N: usize>(values: [i32; N]) -> HashSet<i32> {
    values.into_iter().collect()
}

fn event_server_codes() -> HashSet<i32> {
    codes([
        TxValidationCode::DuplicateTxid as i32,
        TxValidationCode::EndorsementPolicyFailure as i32,
        TxValidationCode::MvccReadConflict as i32,
        TxValidationCode::PhantomReadConflict as i32,
    ])
}

fn server_busy_codes() -> HashSet<i32> {
    codes([
        Status::ServiceUnavailable.code(),
        Status::InternalServerError.code(),
    ])
}

/// Codes retried by [`RetryPolicy::default`].
pub fn default_retryable_codes() -> RetryableCodes {
    HashMap::from([
        (
            Group::EndorserClient,
            codes([
                ClientCode::EndorsementMismatch.into(),
                ClientCode::ChaincodeNameNotFound.into(),
            ]),
        ),
        (Group::EndorserServer, server_busy_codes()),
        (Group::OrdererServer, server_busy_codes()),
        (Group::EventServer, event_server_codes()),
        (Group::Transport, codes([GRPC_UNAVAILABLE])),
    ])
}

/// Codes retried by [`RetryPolicy::channel_client`].
pub fn channel_client_retryable_codes() -> RetryableCodes {
    HashMap::from([
        (
            Group::EndorserClient,
            codes([
                ClientCode::ConnectionFailed.into(),
                ClientCode::EndorsementMismatch.into(),
                ClientCode::QueryEndorsers.into(),
                ClientCode::ChaincodeNameNotFound.into(),
            ]),
        ),
        (
            Group::EndorserServer,
            codes([
                Status::ServiceUnavailable.code(),
                Status::InternalServerError.code(),
                ClientCode::PvtDataDisseminationFailed.into(),
            ]),
        ),
        (
            Group::OrdererClient,
            codes([ClientCode::ConnectionFailed.into()]),
        ),
        (Group::OrdererServer, server_busy_codes()),
        (Group::EventServer, event_server_codes()),
        (Group::Transport, codes([GRPC_UNAVAILABLE])),
    ])
}

/// Codes retried by [`RetryPolicy::resource_management`].
pub fn resource_management_retryable_codes() -> RetryableCodes {
    HashMap::from([
        (
            Group::EndorserClient,
            codes([
                ClientCode::ConnectionFailed.into(),
                ClientCode::EndorsementMismatch.into(),
                ClientCode::ChaincodeNameNotFound.into(),
            ]),
        ),
        (Group::EndorserServer, server_busy_codes()),
        (
            Group::OrdererServer,
            codes([
                Status::ServiceUnavailable.code(),
                Status::InternalServerError.code(),
                Status::BadRequest.code(),
                Status::NotFound.code(),
            ]),
        ),
        (Group::EventServer, event_server_codes()),
        (Group::Transport, codes([GRPC_UNAVAILABLE])),
    ])
}

/// Codes retried by [`RetryPolicy::channel_config`].
pub fn channel_config_retryable_codes() -> RetryableCodes {
    HashMap::from([(
        Group::EndorserClient,
        codes([ClientCode::EndorsementMismatch.into()]),
    )])
}
