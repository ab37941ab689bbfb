// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `cache.rs`

#[cfg(test)]
mod tests {
    use super::super::{cache_name, desired_cache};
    use crate::crd::{BuilderReference, Image, ImageSpec, SourceConfig};
    use crate::labels::{COMPONENT_BUILD_CACHE, K8S_COMPONENT};
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

    fn image(cache_size: Option<&str>) -> Image {
        let mut image = Image::new(
            "petclinic",
            ImageSpec {
                tag: "reg.io/apps/petclinic".to_string(),
                additional_tags: None,
                builder: BuilderReference {
                    kind: "ClusterBuilder".to_string(),
                    name: "base".to_string(),
                },
                service_account_name: None,
                source: SourceConfig::default(),
                build: None,
                cache_size: cache_size.map(ToString::to_string),
                failed_build_history_limit: None,
                success_build_history_limit: None,
            },
        );
        image.metadata.namespace = Some("apps".to_string());
        image.metadata.uid = Some("image-uid-1".to_string());
        image
    }

    /// No cache size requested means no desired volume
    #[test]
    fn test_no_cache_requested() {
        assert!(desired_cache(&image(None)).is_none());
    }

    /// The desired volume carries the requested size and an owner reference
    #[test]
    fn test_desired_cache_shape() {
        let pvc = desired_cache(&image(Some("2Gi"))).unwrap();

        assert_eq!(pvc.metadata.name.as_deref(), Some("petclinic-cache"));
        assert_eq!(pvc.metadata.namespace.as_deref(), Some("apps"));

        let storage = pvc
            .spec
            .as_ref()
            .and_then(|spec| spec.resources.as_ref())
            .and_then(|resources| resources.requests.as_ref())
            .and_then(|requests| requests.get("storage"))
            .cloned();
        assert_eq!(storage, Some(Quantity("2Gi".to_string())));

        let labels = pvc.metadata.labels.as_ref().unwrap();
        assert_eq!(labels.get(K8S_COMPONENT).unwrap(), COMPONENT_BUILD_CACHE);

        let owner = &pvc.metadata.owner_references.as_ref().unwrap()[0];
        assert_eq!(owner.kind, "Image");
        assert_eq!(owner.uid, "image-uid-1");
    }

    /// The cache name is derived from the image name
    #[test]
    fn test_cache_name() {
        assert_eq!(cache_name(&image(Some("1Gi"))), "petclinic-cache");
    }
}
