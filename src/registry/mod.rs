// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Container registry integration: credential keychains and metadata reads.
//!
//! This module provides the registry-facing collaborators of the build
//! orchestrator:
//!
//! - [`keychain`] - Credential resolution for registry identities, with a
//!   process-lifetime memoizing cache
//! - [`metadata`] - Remote builder/store/stack/lifecycle metadata reads
//!
//! Registry host comparison is centralized here: users write registry
//! references in several equivalent spellings (`reg.io`, `https://reg.io`,
//! `http://reg.io/v1/`), and credential lookup must treat them all as the
//! same host.

pub mod keychain;
pub mod metadata;

pub use keychain::{
    parse_mounted_annotated_secrets, ClusterKeychainProvider, CredentialResolver, Identity,
    Keychain, KeychainCache, KeychainFactory, RegistryCredentials, SecretClusterKeychain,
    ServiceAccountKeychainFactory, StaticKeychain,
};
pub use metadata::{
    BuilderRecord, BuildpackageRecord, HttpMetadataRetriever, LifecycleRecord, MetadataRetriever,
    StackRecord,
};

use url::Url;

/// Normalize a registry reference to a bare, comparable host.
///
/// Accepts a bare host (`reg.io`), scheme-prefixed forms
/// (`https://reg.io`, `http://reg.io`), and API-path-suffixed forms
/// (`reg.io/v1/`, `https://reg.io/v2/`), and reduces them all to the
/// lowercased host (with port, if present).
#[must_use]
pub fn normalize_registry_host(reference: &str) -> String {
    let trimmed = reference.trim();

    if trimmed.contains("://") {
        if let Ok(parsed) = Url::parse(trimmed) {
            if let Some(host) = parsed.host_str() {
                return match parsed.port() {
                    Some(port) => format!("{}:{port}", host.to_ascii_lowercase()),
                    None => host.to_ascii_lowercase(),
                };
            }
        }
    }

    trimmed
        .split('/')
        .next()
        .unwrap_or(trimmed)
        .to_ascii_lowercase()
}

/// Whether two registry references name the same host.
///
/// `reg.io`, `https://reg.io`, `http://reg.io`, `https://reg.io/v1/`, and
/// `http://reg.io/v2/` all match each other; `other.io` in any spelling
/// matches none of them.
#[must_use]
pub fn registry_match(stored: &str, requested: &str) -> bool {
    normalize_registry_host(stored) == normalize_registry_host(requested)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
