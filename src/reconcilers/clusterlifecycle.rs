// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `ClusterLifecycle` reconciliation logic.

use anyhow::Result;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::debug;

use crate::context::Context;
use crate::crd::{ClusterLifecycle, ClusterLifecycleStatus};
use crate::reconcilers::status::{conditions_equal, update_condition_in_memory};
use crate::registry::Keychain;
use crate::status_reasons::{
    CONDITION_TYPE_READY, REASON_METADATA_RESOLVED, REASON_METADATA_UNAVAILABLE,
};
use std::sync::Arc;

/// Reconciles a `ClusterLifecycle` resource.
///
/// Pins the lifecycle image by digest and surfaces its version.
///
/// # Errors
///
/// Returns an error if the registry read or the status update fails.
pub async fn reconcile_clusterlifecycle(
    ctx: Arc<Context>,
    lifecycle: ClusterLifecycle,
) -> Result<()> {
    let name = lifecycle.name_any();
    debug!(name = %name, "Reconciling ClusterLifecycle");

    let mut new_status = lifecycle.status.clone().unwrap_or_default();
    new_status.observed_generation = lifecycle.metadata.generation;

    let keychain = Keychain::anonymous();

    match ctx
        .metadata
        .read_lifecycle(&keychain, &lifecycle.spec.image.image)
        .await
    {
        Ok(record) => {
            new_status.resolved_image = Some(record.image);
            new_status.version.clone_from(&record.version);
            update_condition_in_memory(
                &mut new_status.conditions,
                CONDITION_TYPE_READY,
                "True",
                REASON_METADATA_RESOLVED,
                &match record.version {
                    Some(version) => format!("Lifecycle {version} pinned"),
                    None => "Lifecycle pinned".to_string(),
                },
            );

            commit_status(&ctx.client, &lifecycle, &new_status).await
        }
        Err(e) => {
            update_condition_in_memory(
                &mut new_status.conditions,
                CONDITION_TYPE_READY,
                "False",
                REASON_METADATA_UNAVAILABLE,
                &e.to_string(),
            );

            commit_status(&ctx.client, &lifecycle, &new_status).await?;
            Err(e)
        }
    }
}

async fn commit_status(
    client: &Client,
    lifecycle: &ClusterLifecycle,
    new_status: &ClusterLifecycleStatus,
) -> Result<()> {
    let changed = match lifecycle.status.as_ref() {
        None => true,
        Some(current) => {
            current.observed_generation != new_status.observed_generation
                || current.resolved_image != new_status.resolved_image
                || current.version != new_status.version
                || !conditions_equal(&current.conditions, &new_status.conditions)
        }
    };

    if !changed {
        debug!(name = %lifecycle.name_any(), "ClusterLifecycle status unchanged, skipping update");
        return Ok(());
    }

    let api: Api<ClusterLifecycle> = Api::all(client.clone());
    let patch = json!({ "status": new_status });
    api.patch_status(
        &lifecycle.name_any(),
        &PatchParams::default(),
        &Patch::Merge(&patch),
    )
    .await?;
    Ok(())
}
