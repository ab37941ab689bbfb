// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Kiln operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

use std::time::Duration;

// ============================================================================
// API Constants
// ============================================================================

/// API group for all Kiln CRDs
pub const API_GROUP: &str = "kiln.firestoned.io";

/// API version for all Kiln CRDs
pub const API_VERSION: &str = "v1alpha1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "kiln.firestoned.io/v1alpha1";

/// Kind name for `Image` resource
pub const KIND_IMAGE: &str = "Image";

/// Kind name for `Build` resource
pub const KIND_BUILD: &str = "Build";

/// Kind name for `SourceResolver` resource
pub const KIND_SOURCE_RESOLVER: &str = "SourceResolver";

/// Kind name for `Builder` resource
pub const KIND_BUILDER: &str = "Builder";

/// Kind name for `ClusterBuilder` resource
pub const KIND_CLUSTER_BUILDER: &str = "ClusterBuilder";

/// Kind name for `ClusterStore` resource
pub const KIND_CLUSTER_STORE: &str = "ClusterStore";

/// Kind name for `ClusterStack` resource
pub const KIND_CLUSTER_STACK: &str = "ClusterStack";

/// Kind name for `ClusterLifecycle` resource
pub const KIND_CLUSTER_LIFECYCLE: &str = "ClusterLifecycle";

/// Kind name for `ClusterBuildpack` resource
pub const KIND_CLUSTER_BUILDPACK: &str = "ClusterBuildpack";

/// Kind name for `Extension` resource
pub const KIND_EXTENSION: &str = "Extension";

// ============================================================================
// Reconciliation Cadence Constants
// ============================================================================

/// Periodic full resync interval for every controller (10 minutes)
pub const RESYNC_PERIOD: Duration = Duration::from_secs(600);

/// Requeue duration once a resource is ready (5 minutes)
pub const READY_REQUEUE_DURATION: Duration = Duration::from_secs(300);

/// Requeue duration while a resource is not yet ready (30 seconds)
pub const NOT_READY_REQUEUE_DURATION: Duration = Duration::from_secs(30);

/// Requeue duration for controller errors (30 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Polling interval for source resolvers watching movable references (1 minute)
pub const SOURCE_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Dependency-tracker leases last this many resync periods.
///
/// Steady-state reconcile traffic re-registers interest every resync, so a
/// lease of three periods keeps live registrations alive while still bounding
/// memory held for deleted dependents.
pub const TRACK_LEASE_FACTOR: u32 = 3;

// ============================================================================
// Build Constants
// ============================================================================

/// Default number of failed builds retained per image
pub const DEFAULT_FAILED_BUILD_HISTORY_LIMIT: i64 = 10;

/// Default number of successful builds retained per image
pub const DEFAULT_SUCCESS_BUILD_HISTORY_LIMIT: i64 = 10;

/// Suffix appended to an image name to form its source resolver name
pub const SOURCE_RESOLVER_SUFFIX: &str = "-source";

/// Suffix appended to an image name to form its build cache volume name
pub const BUILD_CACHE_SUFFIX: &str = "-cache";

// ============================================================================
// Controller Identity Constants
// ============================================================================

/// Namespace the controller runs in; cluster-scoped resources resolve their
/// service accounts here
pub const CONTROLLER_NAMESPACE: &str = "kiln-system";

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
