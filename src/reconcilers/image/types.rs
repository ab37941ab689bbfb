// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared types and imports for `Image` reconciliation.
//!
//! This module provides common type re-exports and shared utilities used
//! across the image reconciliation modules.

#![allow(clippy::wildcard_imports)]

// Re-export commonly used types from parent modules
pub use crate::context::Context;
pub use crate::crd::{
    Build, BuildBuilderImage, BuildSpec, BuildpackRef, Image, ImageStatus, ResolvedSourceConfig,
    SourceResolver, SourceResolverSpec,
};
pub use crate::labels::{
    BUILDPACK_FINGERPRINT_ANNOTATION, BUILD_NUMBER_LABEL, BUILD_REASON_ANNOTATION,
    COMPONENT_BUILD, COMPONENT_BUILD_CACHE, FINALIZER_IMAGE, IMAGE_LABEL, K8S_COMPONENT,
    K8S_MANAGED_BY, K8S_PART_OF, MANAGED_BY_IMAGE, PART_OF_KILN,
};
pub use crate::status_reasons::{
    CONDITION_TYPE_BUILDER_READY, CONDITION_TYPE_READY, REASON_BUILDER_NOT_FOUND,
    REASON_BUILDER_NOT_READY, REASON_BUILD_FAILED, REASON_BUILD_RUNNING, REASON_RESOLVER_NOT_READY,
    REASON_UP_TO_DATE,
};

// Re-export commonly used Kubernetes types
pub use k8s_openapi::api::core::v1::PersistentVolumeClaim;
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;

// Re-export kube-rs types
pub use kube::{
    api::{DeleteParams, ListParams, ObjectMeta, Patch, PatchParams, PostParams, Preconditions},
    client::Client,
    Api, Resource, ResourceExt,
};

// Re-export common utilities
pub use anyhow::Result;
pub use serde_json::json;
pub use std::collections::BTreeMap;
pub use std::sync::Arc;
pub use tracing::{debug, info, warn};

/// The builder inputs an image build schedules against, flattened from either
/// a `Builder` or a `ClusterBuilder`.
#[derive(Clone, Debug, Default)]
pub struct ResolvedBuilderInfo {
    /// Digest-pinned builder image reference.
    pub image: String,

    /// Buildpacks composed into the builder.
    pub buildpacks: Vec<BuildpackRef>,

    /// Run image of the builder's stack.
    pub run_image: Option<String>,

    /// Whether the builder's Ready condition is True.
    pub ready: bool,
}

/// Build an owner reference pointing at `image`, so Builds, the
/// `SourceResolver`, and the cache volume cascade on image deletion.
///
/// Returns `None` when the image has no UID yet (not persisted).
#[must_use]
pub fn image_owner_reference(image: &Image) -> Option<OwnerReference> {
    let uid = image.metadata.uid.clone()?;
    Some(OwnerReference {
        api_version: crate::constants::API_GROUP_VERSION.to_string(),
        kind: crate::constants::KIND_IMAGE.to_string(),
        name: image.name_any(),
        uid,
        controller: Some(true),
        block_owner_deletion: Some(true),
    })
}
