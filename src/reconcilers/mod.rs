// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes reconciliation controllers for build resources.
//!
//! This module contains the reconciliation logic for all Kiln Custom
//! Resources. Each reconciler watches its resource type and drives observed
//! state toward the declared spec.
//!
//! # Reconciliation Architecture
//!
//! Kiln follows the standard Kubernetes controller pattern:
//!
//! 1. **Watch** - Monitor resource changes via the Kubernetes API
//! 2. **Reconcile** - Compute the new status from spec and observed external
//!    state (registry metadata, resolved sources, build history)
//! 3. **Update** - Write the status back only when it semantically changed
//! 4. **Requeue** - Let the error classifier decide retry behavior
//!
//! Every reconciler is level-triggered and idempotent: reconciling the same
//! key twice with no external change performs zero additional status writes.
//!
//! # Available Reconcilers
//!
//! ## Build Orchestration
//!
//! - [`image`] - The build scheduling decision engine
//! - [`build`] - Observes external build executions into `Build` status
//! - [`sourceresolver`] - The source resolution state machine
//!
//! ## Builder Composition
//!
//! - [`builder`] - `Builder` and `ClusterBuilder` metadata reconciliation
//! - [`clusterstore`] - `ClusterStore` buildpack discovery
//! - [`clusterstack`] - `ClusterStack` digest pinning
//! - [`clusterlifecycle`] - `ClusterLifecycle` digest pinning
//! - [`clusterbuildpack`] - `ClusterBuildpack` buildpack discovery
//! - [`extension`] - `Extension` package discovery

pub mod build;
pub mod builder;
pub mod clusterbuildpack;
pub mod clusterlifecycle;
pub mod clusterstack;
pub mod clusterstore;
pub mod extension;
pub mod finalizers;
pub mod image;
pub mod retry;
pub mod sourceresolver;
pub mod status;

pub use build::reconcile_build;
pub use builder::{reconcile_builder, reconcile_clusterbuilder};
pub use clusterbuildpack::reconcile_clusterbuildpack;
pub use clusterlifecycle::reconcile_clusterlifecycle;
pub use clusterstack::reconcile_clusterstack;
pub use clusterstore::reconcile_clusterstore;
pub use extension::reconcile_extension;
pub use image::reconcile_image;
pub use sourceresolver::reconcile_sourceresolver;

/// Check if a resource's spec has changed by comparing generation with `observed_generation`.
///
/// `metadata.generation` is incremented by the API server only when the spec
/// changes; `status.observed_generation` is written by the controller after
/// processing a spec. A difference means the status does not yet reflect the
/// latest desired state.
#[must_use]
pub fn should_reconcile(current_generation: Option<i64>, observed_generation: Option<i64>) -> bool {
    match (current_generation, observed_generation) {
        (Some(current), Some(observed)) => current != observed,
        (Some(_), None) => true, // First reconciliation
        _ => false,              // No generation tracking available
    }
}

/// Check if a status value has actually changed compared to the current status.
///
/// Status updates trigger "object updated" events which cause new
/// reconciliations; updating unconditionally creates a tight loop. Writes are
/// gated on this comparison throughout the codebase.
#[must_use]
pub fn status_changed<T: PartialEq>(current_value: &Option<T>, new_value: &Option<T>) -> bool {
    current_value != new_value
}

#[cfg(test)]
mod mod_tests;
