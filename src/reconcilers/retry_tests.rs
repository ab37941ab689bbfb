// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `retry.rs`

#[cfg(test)]
mod tests {
    use super::super::{classify, default_backoff, is_retryable_error, ErrorClass};
    use crate::build_errors::{NotReadyError, RegistryError, SourceError};
    use anyhow::Context as _;
    use std::time::Duration;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(Box::new(kube::error::ErrorResponse {
            status: Some(kube::core::response::StatusSummary::Failure),
            message: reason.to_string(),
            reason: reason.to_string(),
            code,
            metadata: None,
            details: None,
        }))
    }

    /// Test that backoff configuration has expected values
    #[test]
    fn test_backoff_configuration() {
        let backoff = default_backoff();

        assert_eq!(backoff.initial_interval, Duration::from_millis(100));
        assert_eq!(backoff.max_interval, Duration::from_secs(30));
        assert_eq!(backoff.max_elapsed_time, Some(Duration::from_secs(300)));

        #[allow(clippy::float_cmp)]
        {
            assert_eq!(backoff.multiplier, 2.0);
            assert_eq!(backoff.randomization_factor, 0.1);
        }
    }

    /// Backoff intervals grow until the cap
    #[test]
    fn test_backoff_growth() {
        let mut backoff = default_backoff();
        backoff.randomization_factor = 0.0;

        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(200)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(400)));
    }

    /// HTTP 429 and 5xx are retryable; other 4xx are not
    #[test]
    fn test_kube_error_retryability() {
        assert!(is_retryable_error(&api_error(429, "TooManyRequests")));
        assert!(is_retryable_error(&api_error(500, "InternalServerError")));
        assert!(is_retryable_error(&api_error(503, "ServiceUnavailable")));
        assert!(!is_retryable_error(&api_error(400, "BadRequest")));
        assert!(!is_retryable_error(&api_error(404, "NotFound")));
        assert!(!is_retryable_error(&api_error(422, "Invalid")));
    }

    /// A NotReadyError classifies as NotReady even when wrapped in context
    #[test]
    fn test_not_ready_classified_through_chain() {
        let err: anyhow::Error = anyhow::Error::new(NotReadyError::new("ClusterStack", "base"))
            .context("resolving builder composition");

        assert_eq!(classify(&err), ErrorClass::NotReady);
        assert!(classify(&err).is_retryable());
    }

    /// Optimistic-concurrency rejection classifies as Conflict
    #[test]
    fn test_conflict_classified() {
        let err: anyhow::Error =
            anyhow::Error::new(api_error(409, "Conflict")).context("writing status");

        assert_eq!(classify(&err), ErrorClass::Conflict);
        assert!(classify(&err).is_retryable());
    }

    /// API-server trouble classifies as Transient
    #[test]
    fn test_server_error_classified_transient() {
        let err: anyhow::Error = api_error(503, "ServiceUnavailable").into();
        assert_eq!(classify(&err), ErrorClass::Transient);
    }

    /// Registry and source network failures classify as Transient
    #[test]
    fn test_network_errors_classified_transient() {
        let registry: anyhow::Error = anyhow::Error::new(RegistryError::Network {
            image: "reg.io/builders/base".to_string(),
            reason: "connection refused".to_string(),
        })
        .context("reading builder metadata");
        assert_eq!(classify(&registry), ErrorClass::Transient);

        let source: anyhow::Error = SourceError::Network {
            location: "https://github.com/example/app".to_string(),
            reason: "timeout".to_string(),
        }
        .into();
        assert_eq!(classify(&source), ErrorClass::Transient);
    }

    /// Domain and validation errors classify as Permanent
    #[test]
    fn test_domain_errors_classified_permanent() {
        let invalid: anyhow::Error = RegistryError::InvalidMetadata {
            image: "reg.io/builders/base".to_string(),
            reason: "missing builder metadata label".to_string(),
        }
        .into();
        assert_eq!(classify(&invalid), ErrorClass::Permanent);
        assert!(!classify(&invalid).is_retryable());

        let bad_request: anyhow::Error = api_error(422, "Invalid").into();
        assert_eq!(classify(&bad_request), ErrorClass::Permanent);

        let plain: anyhow::Error = anyhow::anyhow!("ClusterStack 'base' not found");
        assert_eq!(classify(&plain), ErrorClass::Permanent);
    }

    /// The first recognizable cause in the chain wins
    #[test]
    fn test_first_recognizable_cause_wins() {
        let err: anyhow::Error = anyhow::Error::new(NotReadyError::new("ClusterStore", "pool"))
            .context("listing store buildpacks")
            .context("reconciling builder");

        assert_eq!(classify(&err), ErrorClass::NotReady);
    }
}
