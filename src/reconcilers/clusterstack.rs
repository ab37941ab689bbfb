// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `ClusterStack` reconciliation logic.
//!
//! A stack's build and run images are pinned by digest so downstream builders
//! and images can detect stack drift. The reconciler reads remote registry
//! metadata, sets a Ready condition, and writes status only on semantic
//! change.

use anyhow::Result;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::{debug, info};

use crate::crd::{ClusterStack, ClusterStackStatus};
use crate::reconcilers::status::{conditions_equal, update_condition_in_memory};
use crate::registry::Keychain;
use crate::status_reasons::{
    CONDITION_TYPE_READY, REASON_METADATA_RESOLVED, REASON_METADATA_UNAVAILABLE,
};
use crate::context::Context;
use std::sync::Arc;

/// Reconciles a `ClusterStack` resource.
///
/// Pins the stack's build and run images by digest through the metadata
/// retriever. On failure the Ready condition carries the failure message and
/// the error propagates for retry classification; the status write describing
/// the failure happens before the error is returned.
///
/// # Errors
///
/// Returns an error if the registry read or the status update fails.
pub async fn reconcile_clusterstack(ctx: Arc<Context>, stack: ClusterStack) -> Result<()> {
    let name = stack.name_any();
    debug!(name = %name, generation = ?stack.metadata.generation, "Reconciling ClusterStack");

    let mut new_status = stack.status.clone().unwrap_or_default();
    new_status.observed_generation = stack.metadata.generation;

    // Stacks carry no identity; reads are anonymous unless the registry is public
    let keychain = Keychain::anonymous();

    match ctx
        .metadata
        .read_stack(
            &keychain,
            &stack.spec.build_image.image,
            &stack.spec.run_image.image,
        )
        .await
    {
        Ok(record) => {
            new_status.build_image = Some(record.build_image);
            new_status.run_image = Some(record.run_image);
            update_condition_in_memory(
                &mut new_status.conditions,
                CONDITION_TYPE_READY,
                "True",
                REASON_METADATA_RESOLVED,
                &format!("Stack {} images pinned", stack.spec.id),
            );

            commit_status(&ctx.client, &stack, &new_status).await?;
            info!(name = %name, "ClusterStack reconciled");
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

            // Surface the failure in status before propagating it
            commit_status(&ctx.client, &stack, &new_status).await?;
            Err(e)
        }
    }
}

/// Write the status back only when it semantically differs from the stored one.
async fn commit_status(
    client: &Client,
    stack: &ClusterStack,
    new_status: &ClusterStackStatus,
) -> Result<()> {
    if !stack_status_changed(stack.status.as_ref(), new_status) {
        debug!(name = %stack.name_any(), "ClusterStack status unchanged, skipping update");
        return Ok(());
    }

    let api: Api<ClusterStack> = Api::all(client.clone());
    let patch = json!({ "status": new_status });
    api.patch_status(
        &stack.name_any(),
        &PatchParams::default(),
        &Patch::Merge(&patch),
    )
    .await?;
    Ok(())
}

fn stack_status_changed(current: Option<&ClusterStackStatus>, new: &ClusterStackStatus) -> bool {
    match current {
        None => true,
        Some(current) => {
            current.observed_generation != new.observed_generation
                || current.build_image != new.build_image
                || current.run_image != new.run_image
                || !conditions_equal(&current.conditions, &new.conditions)
        }
    }
}

#[cfg(test)]
#[path = "clusterstack_tests.rs"]
mod clusterstack_tests;
