// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Domain error types for Kiln.
//!
//! This module provides specialized error types for:
//! - Remote registry metadata reads (builder/store/stack/lifecycle resolution)
//! - Source descriptor resolution (git, blob, registry sources)
//! - Not-ready preconditions (a dependency exists but is not usable yet)
//! - Mounted credential secret parsing
//!
//! The retry decorator classifies errors by downcasting through `anyhow`
//! chains to these types: network and not-ready errors are requeued with
//! backoff, everything else is treated as permanent until the user edits
//! the offending spec.

use thiserror::Error;

/// Errors that can occur while reading remote registry metadata.
#[derive(Error, Debug, Clone)]
pub enum RegistryError {
    /// The registry could not be reached or answered with a server error.
    ///
    /// Always retryable: the registry may recover on its own.
    #[error("Registry request for '{image}' failed: {reason}")]
    Network {
        /// Image reference being read
        image: String,
        /// Transport-level failure detail
        reason: String,
    },

    /// The registry rejected the provided credentials.
    #[error("Registry denied access to '{image}': {reason}")]
    Unauthorized {
        /// Image reference being read
        image: String,
        /// Authorization failure detail
        reason: String,
    },

    /// The image does not exist in the registry.
    #[error("Image '{image}' not found in registry")]
    NotFound {
        /// Image reference that was not found
        image: String,
    },

    /// The image exists but its metadata is not usable.
    ///
    /// Covers manifests without the expected buildpack/stack labels and
    /// malformed metadata JSON. Not retryable: the image must be republished.
    #[error("Metadata for image '{image}' is invalid: {reason}")]
    InvalidMetadata {
        /// Image reference with invalid metadata
        image: String,
        /// Explanation of what is invalid
        reason: String,
    },
}

/// Errors that can occur while resolving a source descriptor.
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    /// The upstream (git remote, blob host, registry) could not be reached.
    #[error("Source lookup for '{location}' failed: {reason}")]
    Network {
        /// Repository URL, blob URL, or image reference
        location: String,
        /// Transport-level failure detail
        reason: String,
    },

    /// The requested revision does not exist upstream.
    #[error("Revision '{revision}' not found in '{location}'")]
    RevisionNotFound {
        /// Repository URL or image reference
        location: String,
        /// The revision that was requested
        revision: String,
    },

    /// The descriptor does not carry exactly one source kind.
    #[error("Source descriptor must set exactly one of git, blob, or registry")]
    AmbiguousDescriptor,
}

/// A referenced dependency exists but has not reached a usable state.
///
/// Returned by reconcilers when a stack, store, lifecycle, builder, or source
/// resolver is present but not ready. The retry decorator recognizes this
/// type anywhere in an error chain and requeues with backoff instead of
/// marking the reconcile permanently failed, since the dependency may become
/// ready on its own.
#[derive(Error, Debug, Clone)]
#[error("{kind} '{name}' is not ready")]
pub struct NotReadyError {
    /// Kind of the dependency (e.g. "ClusterStack")
    pub kind: String,
    /// Name of the dependency
    pub name: String,
}

impl NotReadyError {
    /// Convenience constructor.
    #[must_use]
    pub fn new(kind: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }
}

/// Errors that can occur while parsing mounted credential secrets.
#[derive(Error, Debug, Clone)]
pub enum CredentialError {
    /// A `name=registry` mount argument was malformed.
    #[error("Malformed secret mount argument '{arg}': expected name=registry")]
    MalformedMountArg {
        /// The offending argument
        arg: String,
    },

    /// A mounted secret directory is missing a required file.
    #[error("Secret '{secret}' is missing '{file}'")]
    MissingSecretFile {
        /// Secret (directory) name
        secret: String,
        /// Missing file name (e.g. "username")
        file: String,
    },

    /// A docker config secret did not contain valid JSON.
    #[error("Secret '{secret}' contains invalid docker config: {reason}")]
    InvalidDockerConfig {
        /// Secret name
        secret: String,
        /// Parse failure detail
        reason: String,
    },
}
