// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error classification and retry behavior for reconcilers.
//!
//! Every controller loop wraps its reconciler with the classification in this
//! module. Errors fall into four classes:
//!
//! - **Transient** - network/API-server trouble; requeued with backoff
//! - **`NotReady`** - a dependency exists but is not usable yet; requeued with
//!   backoff, since the dependency may become ready on its own
//! - **Conflict** - optimistic-concurrency rejection on a status write; the
//!   cached view was stale, so the retry is immediate
//! - **Permanent** - everything else (malformed spec, unresolvable reference);
//!   not requeued, because retrying cannot fix it. A later spec edit bumps the
//!   generation and triggers a fresh reconcile regardless.
//!
//! Classification unwraps `anyhow` chains rather than inspecting only the
//! top-level error, so a `NotReadyError` wrapped in context is still
//! recognized.
//!
//! The module also provides exponential backoff for retrying individual
//! Kubernetes API calls inside a reconcile pass.

use anyhow::Result;
use rand::RngExt;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::build_errors::{NotReadyError, RegistryError, SourceError};

/// Maximum total time to spend retrying a single API call (5 minutes)
const MAX_ELAPSED_TIME_SECS: u64 = 300;

/// Initial retry interval (100ms)
const INITIAL_INTERVAL_MILLIS: u64 = 100;

/// Maximum interval between retries (30 seconds)
const MAX_INTERVAL_SECS: u64 = 30;

/// Backoff multiplier (exponential growth factor)
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent thundering herd (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Classification of a reconcile error, driving requeue behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network or API-server trouble; requeue with backoff.
    Transient,
    /// A dependency is not ready yet; requeue with backoff.
    NotReady,
    /// Optimistic-concurrency rejection; requeue immediately.
    Conflict,
    /// Retrying cannot fix this; do not requeue from the error path.
    Permanent,
}

impl ErrorClass {
    /// Whether the work queue should requeue after this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ErrorClass::Permanent)
    }
}

/// Classify an error by walking its chain.
///
/// The first recognizable cause wins:
/// - [`NotReadyError`] anywhere in the chain → [`ErrorClass::NotReady`]
/// - a kube conflict (HTTP 409) → [`ErrorClass::Conflict`]
/// - retryable kube errors (429/5xx/transport) → [`ErrorClass::Transient`]
/// - [`RegistryError::Network`] / [`SourceError::Network`] → [`ErrorClass::Transient`]
///
/// Anything else is [`ErrorClass::Permanent`].
#[must_use]
pub fn classify(err: &anyhow::Error) -> ErrorClass {
    for cause in err.chain() {
        if cause.downcast_ref::<NotReadyError>().is_some() {
            return ErrorClass::NotReady;
        }

        if let Some(kube_err) = cause.downcast_ref::<kube::Error>() {
            if let kube::Error::Api(api_err) = kube_err {
                if api_err.code == 409 {
                    return ErrorClass::Conflict;
                }
            }
            if is_retryable_error(kube_err) {
                return ErrorClass::Transient;
            }
            return ErrorClass::Permanent;
        }

        if matches!(
            cause.downcast_ref::<RegistryError>(),
            Some(RegistryError::Network { .. })
        ) {
            return ErrorClass::Transient;
        }

        if matches!(
            cause.downcast_ref::<SourceError>(),
            Some(SourceError::Network { .. })
        ) {
            return ErrorClass::Transient;
        }
    }

    ErrorClass::Permanent
}

/// Simple exponential backoff implementation.
///
/// Provides exponential backoff with randomization (jitter) to prevent
/// thundering herd.
pub struct ExponentialBackoff {
    /// Current interval duration
    pub current_interval: Duration,
    /// Initial interval duration
    pub initial_interval: Duration,
    /// Maximum interval duration
    pub max_interval: Duration,
    /// Maximum total elapsed time
    pub max_elapsed_time: Option<Duration>,
    /// Backoff multiplier (typically 2.0 for doubling)
    pub multiplier: f64,
    /// Randomization factor (e.g., 0.1 for ±10%)
    pub randomization_factor: f64,
    /// Start time for tracking total elapsed time
    start_time: Instant,
}

impl ExponentialBackoff {
    fn new(
        initial_interval: Duration,
        max_interval: Duration,
        max_elapsed_time: Option<Duration>,
        multiplier: f64,
        randomization_factor: f64,
    ) -> Self {
        Self {
            current_interval: initial_interval,
            initial_interval,
            max_interval,
            max_elapsed_time,
            multiplier,
            randomization_factor,
            start_time: Instant::now(),
        }
    }

    /// Get the next backoff interval, or None if max elapsed time exceeded.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if let Some(max_elapsed) = self.max_elapsed_time {
            if self.start_time.elapsed() >= max_elapsed {
                return None;
            }
        }

        let interval = self.current_interval;
        let jittered = self.apply_jitter(interval);

        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);

        Some(jittered)
    }

    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let min = secs - delta;
        let max = secs + delta;

        let mut rng = rand::rng();
        let jittered = rng.random_range(min..=max);

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Create default exponential backoff configuration for Kubernetes API retries.
///
/// 100ms initial, doubling to a 30s cap, ±10% jitter, giving up after 5
/// minutes total.
#[must_use]
pub fn default_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(INITIAL_INTERVAL_MILLIS),
        Duration::from_secs(MAX_INTERVAL_SECS),
        Some(Duration::from_secs(MAX_ELAPSED_TIME_SECS)),
        BACKOFF_MULTIPLIER,
        RANDOMIZATION_FACTOR,
    )
}

/// Retry a Kubernetes API call with exponential backoff.
///
/// Automatically retries on transient errors (HTTP 429, 5xx, transport
/// failures) and fails immediately on permanent errors (4xx client errors
/// except 429).
///
/// # Errors
///
/// Returns an error if a non-retryable error is encountered, the max elapsed
/// time (5 minutes) is exceeded, or the backoff is exhausted.
pub async fn retry_api_call<T, F, Fut>(mut operation: F, operation_name: &str) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, kube::Error>>,
{
    let mut backoff = default_backoff();
    let start_time = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        "Kubernetes API call succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(e) => {
                if !is_retryable_error(&e) {
                    error!(
                        operation = operation_name,
                        error = %e,
                        "Non-retryable Kubernetes API error, failing immediately"
                    );
                    return Err(e.into());
                }

                if let Some(max_elapsed) = backoff.max_elapsed_time {
                    if start_time.elapsed() >= max_elapsed {
                        error!(
                            operation = operation_name,
                            attempt = attempt,
                            elapsed = ?start_time.elapsed(),
                            error = %e,
                            "Max retry time exceeded, giving up"
                        );
                        return Err(anyhow::anyhow!(
                            "Max retry time exceeded after {attempt} attempts: {e}"
                        ));
                    }
                }

                if let Some(duration) = backoff.next_backoff() {
                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        retry_after = ?duration,
                        error = %e,
                        "Retryable Kubernetes API error, will retry"
                    );
                    tokio::time::sleep(duration).await;
                } else {
                    error!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        error = %e,
                        "Backoff exhausted, giving up"
                    );
                    return Err(anyhow::anyhow!(
                        "Backoff exhausted after {attempt} attempts: {e}"
                    ));
                }
            }
        }
    }
}

/// Determine if a Kubernetes error is retryable.
///
/// Rate limiting (429), server errors (5xx), and transport failures are
/// retryable; other client errors are not.
fn is_retryable_error(err: &kube::Error) -> bool {
    match err {
        kube::Error::Api(api_err) => {
            api_err.code == 429 || (api_err.code >= 500 && api_err.code < 600)
        }
        kube::Error::Service(_) => true,
        _ => false,
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
