// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label and annotation constants used across all reconcilers.
//!
//! This module defines standard Kubernetes labels and Kiln-specific labels and
//! annotations to ensure consistency across all resources created by the controller.

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the component name within the architecture (e.g., "build", "build-cache")
pub const K8S_COMPONENT: &str = "app.kubernetes.io/component";

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for the name of a higher-level application this one is part of
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

// ============================================================================
// Kubernetes Standard Label Values
// ============================================================================

/// Value for `app.kubernetes.io/part-of` indicating this resource is part of Kiln
pub const PART_OF_KILN: &str = "kiln";

/// Component value for build executions
pub const COMPONENT_BUILD: &str = "build";

/// Component value for build cache volumes
pub const COMPONENT_BUILD_CACHE: &str = "build-cache";

/// Value for `app.kubernetes.io/managed-by` when a resource is managed by the `Image` controller
pub const MANAGED_BY_IMAGE: &str = "Image";

// ============================================================================
// Kiln-Specific Labels
// ============================================================================

/// Label carrying the name of the `Image` a `Build` belongs to
pub const IMAGE_LABEL: &str = "kiln.firestoned.io/image";

/// Label carrying a build's strictly increasing per-image number.
///
/// Build ordering uses this numeric label, never creation timestamps.
pub const BUILD_NUMBER_LABEL: &str = "kiln.firestoned.io/buildNumber";

// ============================================================================
// Kiln-Specific Annotations
// ============================================================================

/// Annotation carrying the comma-joined reasons a build was created
/// (canonical order: CONFIG, COMMIT, BUILDPACK)
pub const BUILD_REASON_ANNOTATION: &str = "kiln.firestoned.io/reason";

/// Annotation on a `Build` recording the fingerprint of the builder's
/// buildpack metadata at scheduling time; compared on later passes to detect
/// buildpack composition drift
pub const BUILDPACK_FINGERPRINT_ANNOTATION: &str = "kiln.firestoned.io/buildpackFingerprint";

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer for `Image` resources
pub const FINALIZER_IMAGE: &str = "image.kiln.firestoned.io/finalizer";
