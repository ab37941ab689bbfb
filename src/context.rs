// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for all controllers with reflector stores.
//!
//! Every controller receives an `Arc<Context>` holding:
//! - the Kubernetes client
//! - reflector stores for the builder-family CRDs (O(1) in-memory lookups,
//!   no API queries from watch mappers)
//! - the dependency tracker
//! - the keychain cache and the external collaborators (metadata retriever,
//!   source resolvers)
//!
//! The tracker and the keychain cache are the only deliberately shared
//! mutable structures in the core; both are explicit components constructed
//! once in `main` and passed here by reference, never package-level state.

use std::sync::Arc;

use kube::runtime::reflector::Store;
use kube::{Client, ResourceExt};

use crate::crd::{Builder, ClusterBuilder, ClusterLifecycle, ClusterStack, ClusterStore};
use crate::registry::{KeychainCache, MetadataRetriever};
use crate::source::SourceResolvers;
use crate::tracker::Tracker;

/// Shared context passed to all controllers.
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client for API operations
    pub client: Client,

    /// Reflector stores for builder-family CRDs
    pub stores: Stores,

    /// Cross-resource dependency tracker
    pub tracker: Arc<Tracker>,

    /// Memoizing credential keychain cache
    pub keychains: Arc<KeychainCache>,

    /// Remote registry metadata collaborator
    pub metadata: Arc<dyn MetadataRetriever>,

    /// Per-kind source resolution collaborators
    pub sources: Arc<SourceResolvers>,
}

/// Collection of reflector stores for cross-controller queries.
///
/// Each store is populated by a dedicated reflector task and provides
/// in-memory access to resources without API calls.
#[derive(Clone)]
pub struct Stores {
    pub builders: Store<Builder>,
    pub cluster_builders: Store<ClusterBuilder>,
    pub cluster_stores: Store<ClusterStore>,
    pub cluster_stacks: Store<ClusterStack>,
    pub cluster_lifecycles: Store<ClusterLifecycle>,
}

impl Stores {
    /// Get a specific `Builder` by name and namespace from the store.
    #[must_use]
    pub fn get_builder(&self, name: &str, namespace: &str) -> Option<Arc<Builder>> {
        self.builders
            .state()
            .iter()
            .find(|b| b.name_any() == name && b.namespace().as_deref() == Some(namespace))
            .cloned()
    }

    /// Get a specific `ClusterBuilder` by name from the store.
    #[must_use]
    pub fn get_cluster_builder(&self, name: &str) -> Option<Arc<ClusterBuilder>> {
        self.cluster_builders
            .state()
            .iter()
            .find(|b| b.name_any() == name)
            .cloned()
    }

    /// Get a specific `ClusterStore` by name from the store.
    #[must_use]
    pub fn get_cluster_store(&self, name: &str) -> Option<Arc<ClusterStore>> {
        self.cluster_stores
            .state()
            .iter()
            .find(|s| s.name_any() == name)
            .cloned()
    }

    /// Get a specific `ClusterStack` by name from the store.
    #[must_use]
    pub fn get_cluster_stack(&self, name: &str) -> Option<Arc<ClusterStack>> {
        self.cluster_stacks
            .state()
            .iter()
            .find(|s| s.name_any() == name)
            .cloned()
    }

    /// Get a specific `ClusterLifecycle` by name from the store.
    #[must_use]
    pub fn get_cluster_lifecycle(&self, name: &str) -> Option<Arc<ClusterLifecycle>> {
        self.cluster_lifecycles
            .state()
            .iter()
            .find(|l| l.name_any() == name)
            .cloned()
    }
}
