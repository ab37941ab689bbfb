// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ownership of the image's `SourceResolver` child.
//!
//! Every image owns exactly one `SourceResolver`, named `<image>-source`.
//! The image reconciler keeps the resolver's spec in sync with the image's
//! source descriptor and service account; the resolver controller does the
//! actual resolution.

#[allow(clippy::wildcard_imports)]
use super::types::*;
use crate::constants::SOURCE_RESOLVER_SUFFIX;

/// Name of the source resolver owned by `image`.
#[must_use]
pub fn resolver_name(image: &Image) -> String {
    format!("{}{SOURCE_RESOLVER_SUFFIX}", image.name_any())
}

/// The resolver spec the image currently wants.
#[must_use]
pub fn desired_resolver_spec(image: &Image) -> SourceResolverSpec {
    SourceResolverSpec {
        service_account_name: Some(image.service_account().to_string()),
        source: image.spec.source.clone(),
    }
}

/// Create or update the image's `SourceResolver` and return its current state.
///
/// The returned resolver is the live object (including status), so the caller
/// can read the resolved source from the same pass when resolution has
/// already happened.
///
/// # Errors
///
/// Returns an error when the get, create, or patch call fails.
pub async fn reconcile_source_resolver(
    client: &Client,
    namespace: &str,
    image: &Image,
) -> Result<SourceResolver> {
    let api: Api<SourceResolver> = Api::namespaced(client.clone(), namespace);
    let name = resolver_name(image);
    let desired_spec = desired_resolver_spec(image);

    match api.get(&name).await {
        Ok(existing) => {
            if existing.spec != desired_spec {
                debug!(resolver = %name, "Updating SourceResolver spec to match image");
                let patch = json!({ "spec": desired_spec });
                let updated = api
                    .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
                    .await?;
                Ok(updated)
            } else {
                Ok(existing)
            }
        }
        Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
            debug!(resolver = %name, "Creating SourceResolver for image");

            let mut labels = BTreeMap::new();
            labels.insert(IMAGE_LABEL.to_string(), image.name_any());
            labels.insert(K8S_MANAGED_BY.to_string(), MANAGED_BY_IMAGE.to_string());
            labels.insert(K8S_PART_OF.to_string(), PART_OF_KILN.to_string());

            let resolver = SourceResolver {
                metadata: ObjectMeta {
                    name: Some(name),
                    namespace: Some(namespace.to_string()),
                    labels: Some(labels),
                    owner_references: image_owner_reference(image).map(|owner| vec![owner]),
                    ..ObjectMeta::default()
                },
                spec: desired_spec,
                status: None,
            };

            Ok(api.create(&PostParams::default(), &resolver).await?)
        }
        Err(e) => Err(e.into()),
    }
}
