// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Generic finalizer management for Kubernetes resources.
//!
//! Reusable functions for adding, removing, and handling finalizers on
//! custom resources, shared by every reconciler that needs pre-deletion
//! cleanup.
//!
//! # Example
//!
//! ```rust,ignore
//! use kiln::reconcilers::finalizers::{ensure_finalizer, handle_deletion, FinalizerCleanup};
//! use kiln::crd::Image;
//! use kube::Client;
//! use anyhow::Result;
//!
//! const FINALIZER: &str = "image.kiln.firestoned.io/finalizer";
//!
//! #[async_trait::async_trait]
//! impl FinalizerCleanup for Image {
//!     async fn cleanup(&self, client: &Client) -> Result<()> {
//!         // Perform cleanup operations
//!         Ok(())
//!     }
//! }
//!
//! async fn reconcile(client: Client, image: Image) -> Result<()> {
//!     ensure_finalizer(&client, &image, FINALIZER).await?;
//!     if image.metadata.deletion_timestamp.is_some() {
//!         return handle_deletion(&client, &image, FINALIZER).await;
//!     }
//!     // Normal reconciliation logic...
//!     Ok(())
//! }
//! ```

use anyhow::Result;
use kube::api::{Patch, PatchParams};
use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource, ResourceExt};
use serde_json::json;
use tracing::info;

/// Trait for resources that require cleanup operations when being deleted.
///
/// Implement this trait to define custom cleanup logic that runs before the
/// finalizer is removed. If `cleanup` fails the finalizer stays in place and
/// deletion is blocked until a later reconcile succeeds.
#[async_trait::async_trait]
pub trait FinalizerCleanup: Resource + ResourceExt + Clone {
    /// Perform cleanup operations before the finalizer is removed.
    ///
    /// # Errors
    ///
    /// Should return an error when child resources or external state cannot
    /// be cleaned up yet.
    async fn cleanup(&self, client: &Client) -> Result<()>;
}

/// Add a finalizer to a resource if not already present. Idempotent.
///
/// # Errors
///
/// Returns an error if the API patch operation fails.
pub async fn ensure_finalizer<T>(client: &Client, resource: &T, finalizer: &str) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + ResourceExt
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    let namespace = resource.namespace().unwrap_or_default();
    let name = resource.name_any();

    if resource
        .meta()
        .finalizers
        .as_ref()
        .is_none_or(|f| !f.contains(&finalizer.to_string()))
    {
        info!(
            "Adding finalizer {} to {}/{} {}",
            finalizer,
            namespace,
            name,
            T::kind(&())
        );

        let mut finalizers = resource.meta().finalizers.clone().unwrap_or_default();
        finalizers.push(finalizer.to_string());

        let api: Api<T> = Api::namespaced(client.clone(), &namespace);
        let patch = json!({ "metadata": { "finalizers": finalizers } });
        api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
    }

    Ok(())
}

/// Remove a finalizer from a resource. Idempotent.
///
/// Typically called through [`handle_deletion`], which runs cleanup first.
///
/// # Errors
///
/// Returns an error if the API patch operation fails.
pub async fn remove_finalizer<T>(client: &Client, resource: &T, finalizer: &str) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + ResourceExt
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    let namespace = resource.namespace().unwrap_or_default();
    let name = resource.name_any();

    if resource
        .meta()
        .finalizers
        .as_ref()
        .is_some_and(|f| f.contains(&finalizer.to_string()))
    {
        info!(
            "Removing finalizer {} from {}/{} {}",
            finalizer,
            namespace,
            name,
            T::kind(&())
        );

        let mut finalizers = resource.meta().finalizers.clone().unwrap_or_default();
        finalizers.retain(|f| f != finalizer);

        let api: Api<T> = Api::namespaced(client.clone(), &namespace);
        let patch = json!({ "metadata": { "finalizers": finalizers } });
        api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
    }

    Ok(())
}

/// Handle resource deletion with cleanup and finalizer removal.
///
/// Runs the resource's [`FinalizerCleanup::cleanup`] and then removes the
/// finalizer so Kubernetes can finish the delete. Called when a resource has
/// a deletion timestamp and the finalizer is still present.
///
/// # Errors
///
/// Returns an error if cleanup or finalizer removal fails; the finalizer then
/// remains and deletion is retried on a later reconcile.
pub async fn handle_deletion<T>(client: &Client, resource: &T, finalizer: &str) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + ResourceExt
        + FinalizerCleanup
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    let namespace = resource.namespace().unwrap_or_default();
    let name = resource.name_any();

    info!("{} {}/{} is being deleted", T::kind(&()), namespace, name);

    if resource
        .meta()
        .finalizers
        .as_ref()
        .is_some_and(|f| f.contains(&finalizer.to_string()))
    {
        resource.cleanup(client).await?;
        remove_finalizer(client, resource, finalizer).await?;
    }

    Ok(())
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
