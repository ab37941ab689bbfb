// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `ClusterBuildpack` reconciliation logic.

use anyhow::Result;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::debug;

use crate::constants::CONTROLLER_NAMESPACE;
use crate::context::Context;
use crate::crd::{ClusterBuildpack, ClusterBuildpackStatus};
use crate::reconcilers::status::{conditions_equal, update_condition_in_memory};
use crate::registry::{Identity, Keychain};
use crate::status_reasons::{
    CONDITION_TYPE_READY, REASON_METADATA_RESOLVED, REASON_METADATA_UNAVAILABLE,
};
use std::sync::Arc;

/// Reconciles a `ClusterBuildpack` resource.
///
/// Reads the buildpackage image and publishes the buildpacks it contains.
/// A configured service account resolves in the controller namespace.
///
/// # Errors
///
/// Returns an error if the registry read or the status update fails.
pub async fn reconcile_clusterbuildpack(
    ctx: Arc<Context>,
    buildpack: ClusterBuildpack,
) -> Result<()> {
    let name = buildpack.name_any();
    debug!(name = %name, "Reconciling ClusterBuildpack");

    let mut new_status = buildpack.status.clone().unwrap_or_default();
    new_status.observed_generation = buildpack.metadata.generation;

    let keychain = match &buildpack.spec.service_account_name {
        Some(service_account) => {
            let identity = Identity::new(CONTROLLER_NAMESPACE, service_account);
            ctx.keychains.keychain_for(&identity).await?
        }
        None => Arc::new(Keychain::anonymous()),
    };

    match ctx
        .metadata
        .read_buildpackage(&keychain, &buildpack.spec.image.image)
        .await
    {
        Ok(record) => {
            new_status.buildpacks = record.buildpacks;
            update_condition_in_memory(
                &mut new_status.conditions,
                CONDITION_TYPE_READY,
                "True",
                REASON_METADATA_RESOLVED,
                &format!("{} buildpack(s) available", new_status.buildpacks.len()),
            );

            commit_status(&ctx.client, &buildpack, &new_status).await
        }
        Err(e) => {
            update_condition_in_memory(
                &mut new_status.conditions,
                CONDITION_TYPE_READY,
                "False",
                REASON_METADATA_UNAVAILABLE,
                &e.to_string(),
            );

            commit_status(&ctx.client, &buildpack, &new_status).await?;
            Err(e)
        }
    }
}

async fn commit_status(
    client: &Client,
    buildpack: &ClusterBuildpack,
    new_status: &ClusterBuildpackStatus,
) -> Result<()> {
    let changed = match buildpack.status.as_ref() {
        None => true,
        Some(current) => {
            current.observed_generation != new_status.observed_generation
                || current.buildpacks != new_status.buildpacks
                || !conditions_equal(&current.conditions, &new_status.conditions)
        }
    };

    if !changed {
        debug!(name = %buildpack.name_any(), "ClusterBuildpack status unchanged, skipping update");
        return Ok(());
    }

    let api: Api<ClusterBuildpack> = Api::all(client.clone());
    let patch = json!({ "status": new_status });
    api.patch_status(
        &buildpack.name_any(),
        &PatchParams::default(),
        &Patch::Merge(&patch),
    )
    .await?;
    Ok(())
}
