// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Build cache volume lifecycle.
//!
//! An image requesting `cacheSize` gets one `PersistentVolumeClaim`, named
//! `<image>-cache` and owned by the image. Reconciliation:
//!
//! - requested and absent: create
//! - requested with a different size: resize in place
//! - not requested but present: delete, with a UID precondition so a volume
//!   recreated concurrently under the same name is left alone

#[allow(clippy::wildcard_imports)]
use super::types::*;
use crate::constants::BUILD_CACHE_SUFFIX;
use k8s_openapi::api::core::v1::{
    PersistentVolumeClaimSpec, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

/// Name of the cache volume for `image`.
#[must_use]
pub fn cache_name(image: &Image) -> String {
    format!("{}{BUILD_CACHE_SUFFIX}", image.name_any())
}

/// Construct the desired cache volume for `image`, if caching is requested.
#[must_use]
pub fn desired_cache(image: &Image) -> Option<PersistentVolumeClaim> {
    let size = image.spec.cache_size.as_ref()?;

    let mut labels = BTreeMap::new();
    labels.insert(IMAGE_LABEL.to_string(), image.name_any());
    labels.insert(K8S_COMPONENT.to_string(), COMPONENT_BUILD_CACHE.to_string());
    labels.insert(K8S_MANAGED_BY.to_string(), MANAGED_BY_IMAGE.to_string());
    labels.insert(K8S_PART_OF.to_string(), PART_OF_KILN.to_string());

    let mut requests = BTreeMap::new();
    requests.insert("storage".to_string(), Quantity(size.clone()));

    Some(PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(cache_name(image)),
            namespace: image.namespace(),
            labels: Some(labels),
            owner_references: image_owner_reference(image).map(|owner| vec![owner]),
            ..ObjectMeta::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(requests),
                ..VolumeResourceRequirements::default()
            }),
            ..PersistentVolumeClaimSpec::default()
        }),
        status: None,
    })
}

/// Reconcile the image's cache volume and return its name when caching is
/// active.
///
/// # Errors
///
/// Returns an error when a create, patch, or delete call fails.
pub async fn reconcile_cache(
    client: &Client,
    namespace: &str,
    image: &Image,
) -> Result<Option<String>> {
    let api: Api<PersistentVolumeClaim> = Api::namespaced(client.clone(), namespace);
    let name = cache_name(image);

    let existing = match api.get(&name).await {
        Ok(pvc) => Some(pvc),
        Err(kube::Error::Api(api_err)) if api_err.code == 404 => None,
        Err(e) => return Err(e.into()),
    };

    match (desired_cache(image), existing) {
        (Some(desired), None) => {
            debug!(cache = %name, "Creating build cache volume");
            api.create(&PostParams::default(), &desired).await?;
            Ok(Some(name))
        }
        (Some(desired), Some(existing)) => {
            if cache_needs_update(&existing, &desired) {
                debug!(cache = %name, "Updating build cache volume");
                let patch = json!({
                    "metadata": { "labels": desired.metadata.labels },
                    "spec": { "resources": desired.spec.as_ref().and_then(|s| s.resources.clone()) }
                });
                api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
                    .await?;
            }
            Ok(Some(name))
        }
        (None, Some(existing)) => {
            // Delete only the exact volume we observed; a concurrent
            // recreation under the same name fails the UID precondition and
            // is handled on the next pass
            let delete_params = DeleteParams {
                preconditions: Some(Preconditions {
                    uid: existing.metadata.uid.clone(),
                    resource_version: None,
                }),
                ..DeleteParams::default()
            };

            debug!(cache = %name, "Deleting unrequested build cache volume");
            match api.delete(&name, &delete_params).await {
                Ok(_) => {}
                Err(kube::Error::Api(api_err)) if api_err.code == 404 || api_err.code == 409 => {
                    debug!(cache = %name, "Cache volume already gone or recreated, leaving it");
                }
                Err(e) => return Err(e.into()),
            }
            Ok(None)
        }
        (None, None) => Ok(None),
    }
}

/// Whether the existing volume differs from the desired one in size or labels.
fn cache_needs_update(existing: &PersistentVolumeClaim, desired: &PersistentVolumeClaim) -> bool {
    let existing_size = existing
        .spec
        .as_ref()
        .and_then(|spec| spec.resources.as_ref())
        .and_then(|resources| resources.requests.as_ref())
        .and_then(|requests| requests.get("storage"));
    let desired_size = desired
        .spec
        .as_ref()
        .and_then(|spec| spec.resources.as_ref())
        .and_then(|resources| resources.requests.as_ref())
        .and_then(|requests| requests.get("storage"));

    if existing_size != desired_size {
        return true;
    }

    let missing_labels = desired.metadata.labels.as_ref().is_some_and(|labels| {
        labels.iter().any(|(key, value)| {
            existing
                .metadata
                .labels
                .as_ref()
                .and_then(|existing_labels| existing_labels.get(key))
                != Some(value)
        })
    });

    missing_labels
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod cache_tests;
