// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Remote registry metadata reads.
//!
//! The composition reconcilers (Builder, ClusterStore, ClusterStack,
//! ClusterLifecycle, ClusterBuildpack, Extension) derive their status from
//! image metadata published in a container registry. This module defines the
//! [`MetadataRetriever`] capability those reconcilers call, the records it
//! returns, and a production implementation over the registry v2 HTTP API.
//!
//! Test implementations are simple in-memory stand-ins; the reconcilers never
//! depend on the HTTP client directly.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::build_errors::RegistryError;
use crate::crd::{BuildpackRef, StoreBuildpack};
use crate::registry::keychain::{CredentialResolver, Keychain};

/// OCI image label carrying builder metadata.
const BUILDER_METADATA_LABEL: &str = "io.buildpacks.builder.metadata";

/// OCI image label carrying buildpackage layer metadata.
const BUILDPACKAGE_METADATA_LABEL: &str = "io.buildpacks.buildpackage.metadata";

/// OCI image label carrying lifecycle metadata.
const LIFECYCLE_METADATA_LABEL: &str = "io.buildpacks.lifecycle.metadata";

/// Builder image metadata read from the registry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BuilderRecord {
    /// Digest-pinned builder image reference.
    pub image: String,

    /// Buildpacks composed into the builder, in detection order.
    pub buildpacks: Vec<BuildpackRef>,

    /// Stack id the builder was created on.
    pub stack_id: Option<String>,

    /// Digest-pinned run image of the builder's stack.
    pub run_image: Option<String>,
}

/// Buildpackage image metadata read from the registry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BuildpackageRecord {
    /// Digest-pinned buildpackage image reference.
    pub image: String,

    /// Buildpacks discovered inside the buildpackage.
    pub buildpacks: Vec<StoreBuildpack>,
}

/// Stack image pair pinned by digest.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StackRecord {
    /// Digest-pinned build image reference.
    pub build_image: String,

    /// Digest-pinned run image reference.
    pub run_image: String,
}

/// Lifecycle image metadata read from the registry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LifecycleRecord {
    /// Digest-pinned lifecycle image reference.
    pub image: String,

    /// Lifecycle version from the image metadata.
    pub version: Option<String>,
}

/// Reads image metadata from remote registries.
///
/// Every method authenticates through the supplied keychain and may block on
/// network I/O; calls happen synchronously within a single key's reconcile.
#[async_trait::async_trait]
pub trait MetadataRetriever: Send + Sync {
    /// Read builder metadata (digest, buildpacks, stack) for `image`.
    async fn read_builder(&self, keychain: &Keychain, image: &str) -> Result<BuilderRecord>;

    /// Read the buildpacks packaged in the buildpackage `image`.
    async fn read_buildpackage(
        &self,
        keychain: &Keychain,
        image: &str,
    ) -> Result<BuildpackageRecord>;

    /// Pin a stack's build and run images by digest.
    async fn read_stack(
        &self,
        keychain: &Keychain,
        build_image: &str,
        run_image: &str,
    ) -> Result<StackRecord>;

    /// Read lifecycle metadata for `image`.
    async fn read_lifecycle(&self, keychain: &Keychain, image: &str) -> Result<LifecycleRecord>;
}

/// Fingerprint of a buildpack list, used to detect builder composition drift.
///
/// The fingerprint is a SHA-256 over the sorted `id@version` lines, so it is
/// insensitive to detection order and stable across serialization changes.
#[must_use]
pub fn buildpack_fingerprint(buildpacks: &[BuildpackRef]) -> String {
    let mut lines: Vec<String> = buildpacks
        .iter()
        .map(|bp| format!("{}@{}", bp.id, bp.version.as_deref().unwrap_or("")))
        .collect();
    lines.sort();

    let mut hasher = Sha256::new();
    for line in &lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

/// Production [`MetadataRetriever`] over the registry v2 HTTP API.
///
/// Resolves a reference's manifest digest from the `Docker-Content-Digest`
/// header, then reads the image config blob for the buildpack metadata
/// labels.
pub struct HttpMetadataRetriever {
    client: reqwest::Client,
}

/// Subset of an OCI image config we read labels from.
#[derive(Debug, Deserialize)]
struct ImageConfigBlob {
    config: ImageConfig,
}

#[derive(Debug, Deserialize)]
struct ImageConfig {
    #[serde(rename = "Labels", default)]
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ManifestConfigRef {
    digest: String,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    config: ManifestConfigRef,
}

/// `io.buildpacks.builder.metadata` label payload.
#[derive(Debug, Deserialize)]
struct BuilderMetadataLabel {
    #[serde(default)]
    buildpacks: Vec<LabelBuildpack>,
    #[serde(default)]
    stack: Option<LabelStack>,
}

#[derive(Debug, Deserialize)]
struct LabelBuildpack {
    id: String,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LabelStack {
    #[serde(rename = "runImage", default)]
    run_image: Option<LabelRunImage>,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LabelRunImage {
    image: Option<String>,
}

/// `io.buildpacks.lifecycle.metadata` label payload.
#[derive(Debug, Deserialize)]
struct LifecycleMetadataLabel {
    #[serde(default)]
    version: Option<String>,
}

impl HttpMetadataRetriever {
    /// Create a retriever with a fresh HTTP client.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Split `reg.io/team/app:tag` into (registry, repository, reference).
    fn split_reference(image: &str) -> (String, String, String) {
        let (registry, remainder) = match image.split_once('/') {
            Some((registry, remainder)) => (registry.to_string(), remainder),
            None => ("registry-1.docker.io".to_string(), image),
        };

        if let Some((repository, digest)) = remainder.split_once('@') {
            return (registry, repository.to_string(), digest.to_string());
        }
        match remainder.rsplit_once(':') {
            Some((repository, tag)) => (registry, repository.to_string(), tag.to_string()),
            None => (registry, remainder.to_string(), "latest".to_string()),
        }
    }

    async fn get(
        &self,
        keychain: &Keychain,
        image: &str,
        url: &str,
        accept: &str,
    ) -> Result<reqwest::Response, RegistryError> {
        let mut request = self.client.get(url).header("Accept", accept);
        if let Some(creds) = keychain.resolve(image) {
            request = request.basic_auth(creds.username, Some(creds.password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| RegistryError::Network {
                image: image.to_string(),
                reason: e.to_string(),
            })?;

        match response.status() {
            status if status.is_success() => Ok(response),
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                Err(RegistryError::Unauthorized {
                    image: image.to_string(),
                    reason: format!("HTTP {}", response.status()),
                })
            }
            reqwest::StatusCode::NOT_FOUND => Err(RegistryError::NotFound {
                image: image.to_string(),
            }),
            status => Err(RegistryError::Network {
                image: image.to_string(),
                reason: format!("HTTP {status}"),
            }),
        }
    }

    /// Resolve an image reference to its manifest digest and config labels.
    async fn read_labels(
        &self,
        keychain: &Keychain,
        image: &str,
    ) -> Result<(String, BTreeMap<String, String>)> {
        let (registry, repository, reference) = Self::split_reference(image);

        let manifest_url = format!("https://{registry}/v2/{repository}/manifests/{reference}");
        let response = self
            .get(
                keychain,
                image,
                &manifest_url,
                "application/vnd.oci.image.manifest.v1+json, \
                 application/vnd.docker.distribution.manifest.v2+json",
            )
            .await?;

        let digest = response
            .headers()
            .get("Docker-Content-Digest")
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string)
            .ok_or_else(|| RegistryError::InvalidMetadata {
                image: image.to_string(),
                reason: "registry did not return a content digest".to_string(),
            })?;

        let manifest: Manifest =
            response
                .json()
                .await
                .map_err(|e| RegistryError::InvalidMetadata {
                    image: image.to_string(),
                    reason: format!("manifest is not valid JSON: {e}"),
                })?;

        let blob_url = format!(
            "https://{registry}/v2/{repository}/blobs/{}",
            manifest.config.digest
        );
        let config: ImageConfigBlob = self
            .get(keychain, image, &blob_url, "application/json")
            .await?
            .json()
            .await
            .map_err(|e| RegistryError::InvalidMetadata {
                image: image.to_string(),
                reason: format!("config blob is not valid JSON: {e}"),
            })?;

        let pinned = format!("{registry}/{repository}@{digest}");
        Ok((pinned, config.config.labels))
    }
}

impl Default for HttpMetadataRetriever {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MetadataRetriever for HttpMetadataRetriever {
    async fn read_builder(&self, keychain: &Keychain, image: &str) -> Result<BuilderRecord> {
        let (pinned, labels) = self.read_labels(keychain, image).await?;

        let label = labels.get(BUILDER_METADATA_LABEL).ok_or_else(|| {
            RegistryError::InvalidMetadata {
                image: image.to_string(),
                reason: format!("missing {BUILDER_METADATA_LABEL} label"),
            }
        })?;

        let metadata: BuilderMetadataLabel =
            serde_json::from_str(label).map_err(|e| RegistryError::InvalidMetadata {
                image: image.to_string(),
                reason: format!("builder metadata label is not valid JSON: {e}"),
            })?;

        let stack = metadata.stack.unwrap_or(LabelStack {
            run_image: None,
            id: None,
        });

        Ok(BuilderRecord {
            image: pinned,
            buildpacks: metadata
                .buildpacks
                .into_iter()
                .map(|bp| BuildpackRef {
                    id: bp.id,
                    version: bp.version,
                })
                .collect(),
            stack_id: stack.id,
            run_image: stack.run_image.and_then(|run| run.image),
        })
    }

    async fn read_buildpackage(
        &self,
        keychain: &Keychain,
        image: &str,
    ) -> Result<BuildpackageRecord> {
        let (pinned, labels) = self.read_labels(keychain, image).await?;

        let label = labels.get(BUILDPACKAGE_METADATA_LABEL).ok_or_else(|| {
            RegistryError::InvalidMetadata {
                image: image.to_string(),
                reason: format!("missing {BUILDPACKAGE_METADATA_LABEL} label"),
            }
        })?;

        let metadata: LabelBuildpack =
            serde_json::from_str(label).map_err(|e| RegistryError::InvalidMetadata {
                image: image.to_string(),
                reason: format!("buildpackage metadata label is not valid JSON: {e}"),
            })?;

        Ok(BuildpackageRecord {
            image: pinned.clone(),
            buildpacks: vec![StoreBuildpack {
                id: metadata.id,
                version: metadata.version,
                buildpackage: Some(pinned),
            }],
        })
    }

    async fn read_stack(
        &self,
        keychain: &Keychain,
        build_image: &str,
        run_image: &str,
    ) -> Result<StackRecord> {
        let (pinned_build, _) = self.read_labels(keychain, build_image).await?;
        let (pinned_run, _) = self.read_labels(keychain, run_image).await?;

        Ok(StackRecord {
            build_image: pinned_build,
            run_image: pinned_run,
        })
    }

    async fn read_lifecycle(&self, keychain: &Keychain, image: &str) -> Result<LifecycleRecord> {
        let (pinned, labels) = self.read_labels(keychain, image).await?;

        let version = labels
            .get(LIFECYCLE_METADATA_LABEL)
            .and_then(|label| serde_json::from_str::<LifecycleMetadataLabel>(label).ok())
            .and_then(|metadata| metadata.version);

        Ok(LifecycleRecord {
            image: pinned,
            version,
        })
    }
}

/// Shared handle to the process-wide metadata retriever.
pub type SharedMetadataRetriever = Arc<dyn MetadataRetriever>;

#[cfg(test)]
#[path = "metadata_tests.rs"]
mod metadata_tests;
