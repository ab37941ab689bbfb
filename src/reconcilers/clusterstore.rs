// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `ClusterStore` reconciliation logic.
//!
//! A store aggregates the buildpacks discovered across its buildpackage
//! images. Downstream builders track the store through the dependency
//! tracker, so a new buildpack version published into a shared store
//! retriggers builder (and transitively image) reconciliation without any
//! spec change on those resources.

use anyhow::Result;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::{debug, info};

use crate::context::Context;
use crate::crd::{ClusterStore, ClusterStoreStatus, StoreBuildpack};
use crate::reconcilers::status::{conditions_equal, update_condition_in_memory};
use crate::registry::Keychain;
use crate::status_reasons::{
    CONDITION_TYPE_READY, REASON_METADATA_RESOLVED, REASON_METADATA_UNAVAILABLE,
};
use std::sync::Arc;

/// Reconciles a `ClusterStore` resource.
///
/// Reads every buildpackage image in the store and publishes the union of
/// their buildpacks. A single unreadable buildpackage fails the whole pass:
/// partial buildpack lists would look like buildpacks were removed and
/// trigger spurious downstream rebuilds.
///
/// # Errors
///
/// Returns an error if any registry read or the status update fails.
pub async fn reconcile_clusterstore(ctx: Arc<Context>, store: ClusterStore) -> Result<()> {
    let name = store.name_any();
    debug!(name = %name, sources = store.spec.sources.len(), "Reconciling ClusterStore");

    let mut new_status = store.status.clone().unwrap_or_default();
    new_status.observed_generation = store.metadata.generation;

    let keychain = Keychain::anonymous();

    let mut buildpacks: Vec<StoreBuildpack> = Vec::new();
    for source in &store.spec.sources {
        match ctx.metadata.read_buildpackage(&keychain, &source.image).await {
            Ok(record) => buildpacks.extend(record.buildpacks),
            Err(e) => {
                update_condition_in_memory(
                    &mut new_status.conditions,
                    CONDITION_TYPE_READY,
                    "False",
                    REASON_METADATA_UNAVAILABLE,
                    &format!("Reading buildpackage {}: {e}", source.image),
                );

                commit_status(&ctx.client, &store, &new_status).await?;
                return Err(e);
            }
        }
    }

    let count = buildpacks.len();
    new_status.buildpacks = buildpacks;
    update_condition_in_memory(
        &mut new_status.conditions,
        CONDITION_TYPE_READY,
        "True",
        REASON_METADATA_RESOLVED,
        &format!("{count} buildpack(s) available"),
    );

    commit_status(&ctx.client, &store, &new_status).await?;
    info!(name = %name, buildpacks = count, "ClusterStore reconciled");
    Ok(())
}

async fn commit_status(
    client: &Client,
    store: &ClusterStore,
    new_status: &ClusterStoreStatus,
) -> Result<()> {
    let changed = match store.status.as_ref() {
        None => true,
        Some(current) => {
            current.observed_generation != new_status.observed_generation
                || current.buildpacks != new_status.buildpacks
                || !conditions_equal(&current.conditions, &new_status.conditions)
        }
    };

    if !changed {
        debug!(name = %store.name_any(), "ClusterStore status unchanged, skipping update");
        return Ok(());
    }

    let api: Api<ClusterStore> = Api::all(client.clone());
    let patch = json!({ "status": new_status });
    api.patch_status(
        &store.name_any(),
        &PatchParams::default(),
        &Patch::Merge(&patch),
    )
    .await?;
    Ok(())
}
