// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `Builder` and `ClusterBuilder` reconciliation logic.
//!
//! A builder composes a stack, a store, and a buildpack order into a builder
//! image. The reconciler:
//!
//! 1. Registers tracker interest in the referenced `ClusterStack` and
//!    `ClusterStore`, so their changes re-enqueue this builder
//! 2. Requires both references to exist and be ready; a present-but-not-ready
//!    reference surfaces as a [`NotReadyError`] and is retried with backoff
//! 3. Reads the composed builder image's metadata from the registry
//! 4. Publishes buildpack metadata and stack info downstream images track
//!
//! `Builder` and `ClusterBuilder` share all of this; they differ only in
//! scope and in the namespace their service account resolves in.

use anyhow::Result;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::{debug, info};

use crate::build_errors::NotReadyError;
use crate::constants::{
    CONTROLLER_NAMESPACE, KIND_CLUSTER_STACK, KIND_CLUSTER_STORE,
};
use crate::context::Context;
use crate::crd::{
    is_ready, Builder, BuilderStatus, ClusterBuilder, ResolvedStack,
};
use crate::reconcilers::status::{conditions_equal, update_condition_in_memory};
use crate::registry::{Identity, Keychain};
use crate::status_reasons::{
    CONDITION_TYPE_READY, REASON_DEPENDENCY_NOT_READY, REASON_METADATA_RESOLVED,
    REASON_METADATA_UNAVAILABLE,
};
use crate::tracker::{DependentKey, SubjectRef};
use std::sync::Arc;

/// Reconciles a namespace-scoped `Builder` resource.
///
/// # Errors
///
/// Returns an error if a referenced stack or store is missing or not ready,
/// the registry read fails, or the status update fails.
pub async fn reconcile_builder(ctx: Arc<Context>, builder: Builder) -> Result<()> {
    let name = builder.name_any();
    let namespace = builder.namespace().unwrap_or_default();
    debug!(name = %name, namespace = %namespace, "Reconciling Builder");

    let dependent = DependentKey::namespaced("Builder", &namespace, &name);
    let keychain = match &builder.spec.service_account_name {
        Some(service_account) => {
            ctx.keychains
                .keychain_for(&Identity::new(&namespace, service_account))
                .await?
        }
        None => Arc::new(Keychain::anonymous()),
    };

    let mut new_status = builder.status.clone().unwrap_or_default();
    new_status.observed_generation = builder.metadata.generation;

    let result = compute_builder_status(
        &ctx,
        &keychain,
        &builder.spec.tag,
        &builder.spec.stack,
        &builder.spec.store,
        dependent,
        &mut new_status,
    )
    .await;

    match result {
        Ok(()) => {
            commit_builder_status(&ctx.client, &builder, &namespace, &new_status).await?;
            info!(name = %name, namespace = %namespace, "Builder reconciled");
            Ok(())
        }
        Err(e) => {
            commit_builder_status(&ctx.client, &builder, &namespace, &new_status).await?;
            Err(e)
        }
    }
}

/// Reconciles a cluster-scoped `ClusterBuilder` resource.
///
/// # Errors
///
/// Returns an error if a referenced stack or store is missing or not ready,
/// the registry read fails, or the status update fails.
pub async fn reconcile_clusterbuilder(ctx: Arc<Context>, builder: ClusterBuilder) -> Result<()> {
    let name = builder.name_any();
    debug!(name = %name, "Reconciling ClusterBuilder");

    let dependent = DependentKey::cluster_scoped("ClusterBuilder", &name);
    let keychain = match &builder.spec.service_account_name {
        Some(service_account) => {
            ctx.keychains
                .keychain_for(&Identity::new(CONTROLLER_NAMESPACE, service_account))
                .await?
        }
        None => Arc::new(Keychain::anonymous()),
    };

    let mut new_status = builder.status.clone().unwrap_or_default();
    new_status.observed_generation = builder.metadata.generation;

    let result = compute_builder_status(
        &ctx,
        &keychain,
        &builder.spec.tag,
        &builder.spec.stack,
        &builder.spec.store,
        dependent,
        &mut new_status,
    )
    .await;

    match result {
        Ok(()) => {
            commit_clusterbuilder_status(&ctx.client, &builder, &new_status).await?;
            info!(name = %name, "ClusterBuilder reconciled");
            Ok(())
        }
        Err(e) => {
            commit_clusterbuilder_status(&ctx.client, &builder, &new_status).await?;
            Err(e)
        }
    }
}

/// Shared status computation for both builder scopes.
///
/// Mutates `new_status` in place so the failure path can still write the
/// partially updated conditions before the error propagates.
async fn compute_builder_status(
    ctx: &Context,
    keychain: &Keychain,
    tag: &str,
    stack_name: &str,
    store_name: &str,
    dependent: DependentKey,
    new_status: &mut BuilderStatus,
) -> Result<()> {
    // Register interest before the readiness checks: a stack that becomes
    // ready later must still re-enqueue this builder.
    ctx.tracker.track(
        &SubjectRef::cluster_scoped(KIND_CLUSTER_STACK, stack_name),
        dependent.clone(),
    );
    ctx.tracker.track(
        &SubjectRef::cluster_scoped(KIND_CLUSTER_STORE, store_name),
        dependent,
    );

    let stack = match ctx.stores.get_cluster_stack(stack_name) {
        Some(stack) => stack,
        None => {
            update_condition_in_memory(
                &mut new_status.conditions,
                CONDITION_TYPE_READY,
                "False",
                REASON_DEPENDENCY_NOT_READY,
                &format!("ClusterStack '{stack_name}' not found"),
            );
            return Err(anyhow::anyhow!("ClusterStack '{stack_name}' not found"));
        }
    };

    let store = match ctx.stores.get_cluster_store(store_name) {
        Some(store) => store,
        None => {
            update_condition_in_memory(
                &mut new_status.conditions,
                CONDITION_TYPE_READY,
                "False",
                REASON_DEPENDENCY_NOT_READY,
                &format!("ClusterStore '{store_name}' not found"),
            );
            return Err(anyhow::anyhow!("ClusterStore '{store_name}' not found"));
        }
    };

    let stack_ready = stack
        .status
        .as_ref()
        .is_some_and(|status| is_ready(&status.conditions));
    if !stack_ready {
        update_condition_in_memory(
            &mut new_status.conditions,
            CONDITION_TYPE_READY,
            "False",
            REASON_DEPENDENCY_NOT_READY,
            &format!("ClusterStack '{stack_name}' is not ready"),
        );
        return Err(NotReadyError::new(KIND_CLUSTER_STACK, stack_name).into());
    }

    let store_ready = store
        .status
        .as_ref()
        .is_some_and(|status| is_ready(&status.conditions));
    if !store_ready {
        update_condition_in_memory(
            &mut new_status.conditions,
            CONDITION_TYPE_READY,
            "False",
            REASON_DEPENDENCY_NOT_READY,
            &format!("ClusterStore '{store_name}' is not ready"),
        );
        return Err(NotReadyError::new(KIND_CLUSTER_STORE, store_name).into());
    }

    match ctx.metadata.read_builder(keychain, tag).await {
        Ok(record) => {
            new_status.latest_image = Some(record.image);
            new_status.buildpack_metadata = record.buildpacks;
            new_status.stack = Some(ResolvedStack {
                id: record.stack_id.or_else(|| Some(stack.spec.id.clone())),
                run_image: record
                    .run_image
                    .or_else(|| stack.status.as_ref().and_then(|s| s.run_image.clone())),
            });
            update_condition_in_memory(
                &mut new_status.conditions,
                CONDITION_TYPE_READY,
                "True",
                REASON_METADATA_RESOLVED,
                &format!(
                    "{} buildpack(s) composed",
                    new_status.buildpack_metadata.len()
                ),
            );
            Ok(())
        }
        Err(e) => {
            update_condition_in_memory(
                &mut new_status.conditions,
                CONDITION_TYPE_READY,
                "False",
                REASON_METADATA_UNAVAILABLE,
                &e.to_string(),
            );
            Err(e)
        }
    }
}

fn builder_status_changed(current: Option<&BuilderStatus>, new: &BuilderStatus) -> bool {
    match current {
        None => true,
        Some(current) => {
            current.observed_generation != new.observed_generation
                || current.latest_image != new.latest_image
                || current.buildpack_metadata != new.buildpack_metadata
                || current.stack != new.stack
                || !conditions_equal(&current.conditions, &new.conditions)
        }
    }
}

async fn commit_builder_status(
    client: &Client,
    builder: &Builder,
    namespace: &str,
    new_status: &BuilderStatus,
) -> Result<()> {
    if !builder_status_changed(builder.status.as_ref(), new_status) {
        debug!(name = %builder.name_any(), "Builder status unchanged, skipping update");
        return Ok(());
    }

    let api: Api<Builder> = Api::namespaced(client.clone(), namespace);
    let patch = json!({ "status": new_status });
    api.patch_status(
        &builder.name_any(),
        &PatchParams::default(),
        &Patch::Merge(&patch),
    )
    .await?;
    Ok(())
}

async fn commit_clusterbuilder_status(
    client: &Client,
    builder: &ClusterBuilder,
    new_status: &BuilderStatus,
) -> Result<()> {
    if !builder_status_changed(builder.status.as_ref(), new_status) {
        debug!(name = %builder.name_any(), "ClusterBuilder status unchanged, skipping update");
        return Ok(());
    }

    let api: Api<ClusterBuilder> = Api::all(client.clone());
    let patch = json!({ "status": new_status });
    api.patch_status(
        &builder.name_any(),
        &PatchParams::default(),
        &Patch::Merge(&patch),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod builder_tests;
