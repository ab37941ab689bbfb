// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `Extension` reconciliation logic.

use anyhow::Result;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::debug;

use crate::context::Context;
use crate::crd::{Extension, ExtensionStatus};
use crate::reconcilers::status::{conditions_equal, update_condition_in_memory};
use crate::registry::{Identity, Keychain};
use crate::status_reasons::{
    CONDITION_TYPE_READY, REASON_METADATA_RESOLVED, REASON_METADATA_UNAVAILABLE,
};
use std::sync::Arc;

/// Reconciles an `Extension` resource.
///
/// Reads the extension package image and publishes the extensions it
/// contains. The service account resolves in the extension's own namespace.
///
/// # Errors
///
/// Returns an error if the registry read or the status update fails.
pub async fn reconcile_extension(ctx: Arc<Context>, extension: Extension) -> Result<()> {
    let name = extension.name_any();
    let namespace = extension.namespace().unwrap_or_default();
    debug!(name = %name, namespace = %namespace, "Reconciling Extension");

    let mut new_status = extension.status.clone().unwrap_or_default();
    new_status.observed_generation = extension.metadata.generation;

    let keychain = match &extension.spec.service_account_name {
        Some(service_account) => {
            let identity = Identity::new(&namespace, service_account);
            ctx.keychains.keychain_for(&identity).await?
        }
        None => Arc::new(Keychain::anonymous()),
    };

    match ctx
        .metadata
        .read_buildpackage(&keychain, &extension.spec.image.image)
        .await
    {
        Ok(record) => {
            new_status.extensions = record.buildpacks;
            update_condition_in_memory(
                &mut new_status.conditions,
                CONDITION_TYPE_READY,
                "True",
                REASON_METADATA_RESOLVED,
                &format!("{} extension(s) available", new_status.extensions.len()),
            );

            commit_status(&ctx.client, &extension, &namespace, &new_status).await
        }
        Err(e) => {
            update_condition_in_memory(
                &mut new_status.conditions,
                CONDITION_TYPE_READY,
                "False",
                REASON_METADATA_UNAVAILABLE,
                &e.to_string(),
            );

            commit_status(&ctx.client, &extension, &namespace, &new_status).await?;
            Err(e)
        }
    }
}

async fn commit_status(
    client: &Client,
    extension: &Extension,
    namespace: &str,
    new_status: &ExtensionStatus,
) -> Result<()> {
    let changed = match extension.status.as_ref() {
        None => true,
        Some(current) => {
            current.observed_generation != new_status.observed_generation
                || current.extensions != new_status.extensions
                || !conditions_equal(&current.conditions, &new_status.conditions)
        }
    };

    if !changed {
        debug!(name = %extension.name_any(), "Extension status unchanged, skipping update");
        return Ok(());
    }

    let api: Api<Extension> = Api::namespaced(client.clone(), namespace);
    let patch = json!({ "status": new_status });
    api.patch_status(
        &extension.name_any(),
        &PatchParams::default(),
        &Patch::Merge(&patch),
    )
    .await?;
    Ok(())
}
