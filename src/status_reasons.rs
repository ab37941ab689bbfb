// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Standard Kubernetes status condition reasons for Kiln resources.
//!
//! This module defines constants for condition reasons following Kubernetes
//! conventions. Reasons are programmatic identifiers in CamelCase that explain
//! why a condition has a particular status.
//!
//! # Condition Types
//!
//! - `Ready` - overall health of a resource
//! - `Succeeded` - terminal outcome of a `Build` (absent/Unknown while running)
//! - `ActivePolling` - whether a `SourceResolver` re-resolves continuously
//! - `BuilderReady` - whether an `Image`'s referenced builder is usable

// ============================================================================
// Condition Types
// ============================================================================

/// Encompassing readiness condition present on every resource.
pub const CONDITION_TYPE_READY: &str = "Ready";

/// Terminal condition of a `Build`; absent or Unknown while running.
pub const CONDITION_TYPE_SUCCEEDED: &str = "Succeeded";

/// Whether a `SourceResolver` is continuously re-resolving a movable reference.
pub const CONDITION_TYPE_ACTIVE_POLLING: &str = "ActivePolling";

/// Whether an `Image`'s referenced builder exists and is ready.
pub const CONDITION_TYPE_BUILDER_READY: &str = "BuilderReady";

// ============================================================================
// Common Reasons
// ============================================================================

/// Reconciliation completed and the resource is fully operational.
pub const REASON_RECONCILE_SUCCEEDED: &str = "ReconcileSucceeded";

/// Reconciliation failed; the message carries the failure detail.
pub const REASON_RECONCILE_FAILED: &str = "ReconcileFailed";

/// A referenced dependency exists but has not reached a ready condition yet.
pub const REASON_DEPENDENCY_NOT_READY: &str = "DependencyNotReady";

// ============================================================================
// Image Reasons
// ============================================================================

/// The referenced builder resource does not exist.
pub const REASON_BUILDER_NOT_FOUND: &str = "BuilderNotFound";

/// The referenced builder exists but is not ready.
pub const REASON_BUILDER_NOT_READY: &str = "BuilderNotReady";

/// The image's source has not resolved yet.
pub const REASON_RESOLVER_NOT_READY: &str = "ResolverNotReady";

/// The latest build is still running.
pub const REASON_BUILD_RUNNING: &str = "BuildRunning";

/// The latest build completed successfully and no rebuild is needed.
pub const REASON_UP_TO_DATE: &str = "UpToDate";

/// The latest build failed.
pub const REASON_BUILD_FAILED: &str = "BuildFailed";

// ============================================================================
// SourceResolver Reasons
// ============================================================================

/// The source descriptor resolved to a concrete revision.
pub const REASON_RESOLVED: &str = "Resolved";

/// Resolution is pending; no successful resolution has happened yet.
pub const REASON_RESOLUTION_PENDING: &str = "ResolutionPending";

/// The resolver is polling a movable reference.
pub const REASON_POLLING: &str = "Polling";

/// The resolved reference is immutable; polling is unnecessary.
pub const REASON_PINNED: &str = "Pinned";

// ============================================================================
// Registry Metadata Reasons
// ============================================================================

/// Remote registry metadata was read successfully.
pub const REASON_METADATA_RESOLVED: &str = "MetadataResolved";

/// Remote registry metadata could not be read.
pub const REASON_METADATA_UNAVAILABLE: &str = "MetadataUnavailable";
