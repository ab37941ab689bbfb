// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for container image builds.
//!
//! This module defines all Kubernetes Custom Resource Definitions used by Kiln
//! to manage continuous container image builds declaratively.
//!
//! # Resource Types
//!
//! ## Build Orchestration
//!
//! - [`Image`] - Desired state of a continuously built container image
//! - [`Build`] - A single, immutable build execution
//! - [`SourceResolver`] - Pins a source descriptor to a concrete revision
//!
//! ## Builder Composition
//!
//! - [`Builder`] - Namespace-scoped builder (stack + store + buildpack order)
//! - [`ClusterBuilder`] - Cluster-scoped builder
//! - [`ClusterStore`] - Shared pool of buildpackage images
//! - [`ClusterStack`] - Build/run image pair
//! - [`ClusterLifecycle`] - Platform lifecycle image
//! - [`ClusterBuildpack`] - Single buildpackage image
//! - [`Extension`] - Image-extension package
//!
//! # Example: Declaring an Image
//!
//! ```rust,no_run
//! use kiln::crd::{ImageSpec, BuilderReference, SourceConfig, GitSource};
//!
//! let spec = ImageSpec {
//!     tag: "registry.example.com/apps/petclinic".to_string(),
//!     additional_tags: None,
//!     builder: BuilderReference {
//!         kind: "ClusterBuilder".to_string(),
//!         name: "base".to_string(),
//!     },
//!     service_account_name: Some("build-bot".to_string()),
//!     source: SourceConfig {
//!         git: Some(GitSource {
//!             url: "https://github.com/example/petclinic".to_string(),
//!             revision: "main".to_string(),
//!         }),
//!         blob: None,
//!         registry: None,
//!         sub_path: None,
//!     },
//!     build: None,
//!     cache_size: Some("2Gi".to_string()),
//!     failed_build_history_limit: Some(10),
//!     success_build_history_limit: Some(10),
//! };
//! ```

use k8s_openapi::api::core::v1::{EnvVar, ResourceRequirements};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::labels::{BUILD_NUMBER_LABEL, BUILD_REASON_ANNOTATION};

/// Condition represents an observation of a resource's current state.
///
/// Conditions are used in status subresources to communicate the state of
/// a resource to users and controllers.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
pub struct Condition {
    /// Type of condition. Common types include: Ready, Succeeded, ActivePolling, BuilderReady.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Reference to the builder resource an [`Image`] builds with.
///
/// The referenced resource must be a `Builder` in the image's namespace or a
/// cluster-scoped `ClusterBuilder`.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuilderReference {
    /// Kind of the builder resource: "Builder" or "ClusterBuilder".
    pub kind: String,

    /// Name of the builder resource.
    pub name: String,
}

/// Git source location.
///
/// The revision may be a branch, a tag, or a full commit SHA. The source
/// resolver classifies the revision and decides whether to keep polling it.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GitSource {
    /// Git repository URL (https or ssh).
    pub url: String,

    /// Branch, tag, or commit SHA to build from.
    pub revision: String,
}

/// Blob source location (an archive fetched over HTTP).
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlobSource {
    /// URL of the source archive (.zip, .tar.gz, .tar).
    pub url: String,
}

/// Registry source location (source packaged as an OCI image).
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySource {
    /// Image reference containing the source code.
    pub image: String,
}

/// Source descriptor for an [`Image`] or [`SourceResolver`].
///
/// Exactly one of `git`, `blob`, or `registry` must be set.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    /// Git source location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<GitSource>,

    /// Blob (archive) source location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob: Option<BlobSource>,

    /// Registry image source location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<RegistrySource>,

    /// Optional subdirectory within the source to use as the build context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,
}

/// Classification of a resolved source revision.
///
/// The classification drives the source resolver's polling decision:
/// a `Commit` is immutable and resolved once, a `Branch` can move and is
/// polled continuously, and `Unknown` means resolution was indeterminate.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
pub enum SourceKind {
    /// Source is pinned to an immutable reference (exact commit SHA or digest).
    Commit,
    /// Source references a movable pointer (branch or tag).
    Branch,
    /// Resolution was indeterminate (e.g. transient lookup failure).
    #[default]
    Unknown,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Commit => write!(f, "Commit"),
            SourceKind::Branch => write!(f, "Branch"),
            SourceKind::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A git source resolved to a concrete revision.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedGitSource {
    /// Git repository URL.
    pub url: String,

    /// The concrete revision (commit SHA) the descriptor resolved to.
    pub revision: String,

    /// Subdirectory within the source used as the build context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,

    /// Classification of the descriptor's revision.
    #[serde(default)]
    pub r#type: SourceKind,
}

/// A blob source resolved for building.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedBlobSource {
    /// URL of the source archive.
    pub url: String,

    /// Subdirectory within the source used as the build context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,
}

/// A registry source resolved to a digest-pinned image.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRegistrySource {
    /// Digest-pinned image reference containing the source code.
    pub image: String,

    /// Subdirectory within the source used as the build context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,
}

/// A source descriptor resolved to concrete, buildable inputs.
///
/// At most one of the fields is set, mirroring [`SourceConfig`].
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSourceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<ResolvedGitSource>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob: Option<ResolvedBlobSource>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<ResolvedRegistrySource>,
}

impl ResolvedSourceConfig {
    /// The concrete revision this source resolved to, if any.
    ///
    /// Git sources resolve to a commit SHA, registry sources to a digest-pinned
    /// image reference, and blob sources to their URL.
    #[must_use]
    pub fn revision(&self) -> Option<&str> {
        if let Some(git) = &self.git {
            return Some(&git.revision);
        }
        if let Some(registry) = &self.registry {
            return Some(&registry.image);
        }
        self.blob.as_ref().map(|blob| blob.url.as_str())
    }

    /// Classification of the resolved source.
    ///
    /// Blob and registry sources are immutable by construction and always
    /// classify as [`SourceKind::Commit`].
    #[must_use]
    pub fn source_kind(&self) -> SourceKind {
        match &self.git {
            Some(git) => git.r#type,
            None if self.blob.is_some() || self.registry.is_some() => SourceKind::Commit,
            None => SourceKind::Unknown,
        }
    }
}

/// Build-time configuration carried by an [`Image`].
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageBuild {
    /// Environment variables injected into the build.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<EnvVar>>,

    /// Compute resources for the build execution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

/// `Image` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Strictly increasing counter of builds created for this image.
    ///
    /// Build numbers are never reused, even after history garbage collection
    /// deletes earlier builds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_counter: Option<i64>,

    /// Name of the most recently created `Build`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_build_ref: Option<String>,

    /// Digest-pinned reference of the most recently produced image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_image: Option<String>,

    /// Run image of the stack the latest build was built on.
    ///
    /// Surfaced so platform teams can detect images built on a stale stack.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_stack: Option<String>,
}

/// `Image` declares a container image to be continuously built from source.
///
/// The image controller watches the referenced builder, the resolved source,
/// and the build history, and creates a new [`Build`] whenever an input that
/// affects the output changes. Builds, the image's [`SourceResolver`], and the
/// optional build cache volume are owned by the `Image` via owner references,
/// so deleting the image cascades.
///
/// # Example
///
/// ```yaml
/// apiVersion: kiln.firestoned.io/v1alpha1
/// kind: Image
/// metadata:
///   name: petclinic
///   namespace: apps
/// spec:
///   tag: registry.example.com/apps/petclinic
///   builder:
///     kind: ClusterBuilder
///     name: base
///   serviceAccountName: build-bot
///   source:
///     git:
///       url: https://github.com/example/petclinic
///       revision: main
///   cacheSize: 2Gi
///   failedBuildHistoryLimit: 10
///   successBuildHistoryLimit: 10
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "kiln.firestoned.io",
    version = "v1alpha1",
    kind = "Image",
    namespaced,
    doc = "Image declares a container image continuously built from source. The controller rebuilds whenever the source revision, builder composition, or build configuration changes."
)]
#[kube(status = "ImageStatus")]
#[serde(rename_all = "camelCase")]
pub struct ImageSpec {
    /// Primary tag builds of this image are pushed to.
    pub tag: String,

    /// Additional tags applied to every successful build.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_tags: Option<Vec<String>>,

    /// Builder resource used to build this image.
    pub builder: BuilderReference,

    /// Service account whose secrets grant registry and source access.
    ///
    /// Defaults to `default` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,

    /// Source descriptor to build from.
    pub source: SourceConfig,

    /// Build-time environment and resources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<ImageBuild>,

    /// Requested size of the build cache volume (e.g. "2Gi").
    ///
    /// When unset, no cache volume is created and builds run uncached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_size: Option<String>,

    /// Number of failed builds to retain. Older failed builds are garbage
    /// collected one per reconcile pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1))]
    pub failed_build_history_limit: Option<i64>,

    /// Number of successful builds to retain. Older successful builds are
    /// garbage collected one per reconcile pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1))]
    pub success_build_history_limit: Option<i64>,
}

impl Image {
    /// Service account used for registry and source credentials.
    #[must_use]
    pub fn service_account(&self) -> &str {
        self.spec
            .service_account_name
            .as_deref()
            .unwrap_or("default")
    }

    /// All tags a build of this image pushes to, primary tag first.
    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        let mut tags = vec![self.spec.tag.clone()];
        if let Some(additional) = &self.spec.additional_tags {
            tags.extend(additional.iter().cloned());
        }
        tags
    }
}

/// The builder image a [`Build`] runs with, pinned at scheduling time.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuildBuilderImage {
    /// Digest-pinned builder image reference.
    pub image: String,
}

/// State of a single step of the external build execution.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepState {
    /// Step name (e.g. "prepare", "detect", "build", "export").
    pub name: String,

    /// Step phase: Waiting, Running, or Terminated.
    pub phase: String,

    /// Exit code once the step has terminated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    /// Failure detail, if the step terminated abnormally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A buildpack identified by id and version.
#[derive(
    Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq, PartialOrd, Ord,
)]
#[serde(rename_all = "camelCase")]
pub struct BuildpackRef {
    /// Buildpack id (e.g. "paketo-buildpacks/java").
    pub id: String,

    /// Buildpack version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// `Build` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BuildStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Digest-pinned reference of the image this build produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_image: Option<String>,

    /// Run image of the stack this build was built on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_run_image: Option<String>,

    /// Per-step execution states observed from the build process.
    #[serde(default)]
    pub step_states: Vec<StepState>,

    /// Buildpacks that participated in this build.
    #[serde(default)]
    pub buildpack_metadata: Vec<BuildpackRef>,
}

/// `Build` captures a single build execution with fully resolved inputs.
///
/// A build is immutable once its execution starts: the spec records the exact
/// tags, builder digest, source revision, environment, and cache used, so two
/// builds can be diffed field-by-field to decide whether a rebuild is needed.
/// The build's number (a strictly increasing per-image counter) is carried in
/// a label; the reasons that triggered it are carried in an annotation.
///
/// A build is running while its `Succeeded` condition is absent or Unknown.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[kube(
    group = "kiln.firestoned.io",
    version = "v1alpha1",
    kind = "Build",
    namespaced,
    doc = "Build captures a single build execution with fully resolved inputs. Builds are immutable and owned by an Image."
)]
#[kube(status = "BuildStatus")]
#[serde(rename_all = "camelCase")]
pub struct BuildSpec {
    /// Tags the produced image is pushed to, primary tag first.
    pub tags: Vec<String>,

    /// Builder image the build runs with, digest-pinned at scheduling time.
    pub builder: BuildBuilderImage,

    /// Service account whose secrets grant registry and source access.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,

    /// Resolved source inputs.
    pub source: ResolvedSourceConfig,

    /// Environment variables injected into the build.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<EnvVar>>,

    /// Compute resources for the build execution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    /// Name of the cache volume mounted into the build, if caching is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_name: Option<String>,
}

impl Build {
    /// Whether this build is still running.
    ///
    /// A build is running iff its `Succeeded` condition is absent or Unknown.
    #[must_use]
    pub fn is_running(&self) -> bool {
        match self.succeeded_condition() {
            None => true,
            Some(condition) => condition.status == "Unknown",
        }
    }

    /// Whether this build completed successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.succeeded_condition()
            .is_some_and(|condition| condition.status == "True")
    }

    /// Whether this build completed with a failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.succeeded_condition()
            .is_some_and(|condition| condition.status == "False")
    }

    /// The build number from the build-number label.
    ///
    /// Build ordering always uses this numeric label, never the creation
    /// timestamp, which is not trustworthy under clock skew.
    #[must_use]
    pub fn build_number(&self) -> Option<i64> {
        self.metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(BUILD_NUMBER_LABEL))
            .and_then(|number| number.parse().ok())
    }

    /// The comma-separated reasons this build was created, from its annotation.
    #[must_use]
    pub fn build_reasons(&self) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|annotations| annotations.get(BUILD_REASON_ANNOTATION))
            .map(String::as_str)
    }

    fn succeeded_condition(&self) -> Option<&Condition> {
        self.status
            .as_ref()?
            .conditions
            .iter()
            .find(|c| c.r#type == "Succeeded")
    }
}

/// `SourceResolver` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SourceResolverStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// The concrete source the descriptor resolved to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ResolvedSourceConfig>,
}

/// `SourceResolver` turns a source descriptor into a pinned revision.
///
/// An [`Image`] owns exactly one `SourceResolver`. The resolver classifies the
/// descriptor's revision: an immutable pin (`Commit`) is resolved once; a
/// movable pointer (`Branch`) is re-resolved continuously, surfaced by an
/// `ActivePolling` condition; an indeterminate result (`Unknown`) never
/// overwrites a previously successful resolution.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "kiln.firestoned.io",
    version = "v1alpha1",
    kind = "SourceResolver",
    namespaced,
    doc = "SourceResolver pins a source descriptor to a concrete revision and actively polls movable references."
)]
#[kube(status = "SourceResolverStatus")]
#[serde(rename_all = "camelCase")]
pub struct SourceResolverSpec {
    /// Service account whose secrets grant source access.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,

    /// Source descriptor to resolve.
    pub source: SourceConfig,
}

impl SourceResolver {
    /// The resolved source, if resolution has succeeded at least once.
    #[must_use]
    pub fn resolved_source(&self) -> Option<&ResolvedSourceConfig> {
        self.status.as_ref()?.source.as_ref()
    }

    /// Whether a resolution has ever succeeded for this resource.
    #[must_use]
    pub fn has_resolved(&self) -> bool {
        self.resolved_source()
            .is_some_and(|source| source.source_kind() != SourceKind::Unknown)
    }

    /// Whether the resolver is actively polling a movable reference.
    #[must_use]
    pub fn polling_active(&self) -> bool {
        self.status
            .as_ref()
            .map(|status| &status.conditions)
            .and_then(|conditions| conditions.iter().find(|c| c.r#type == "ActivePolling"))
            .is_some_and(|condition| condition.status == "True")
    }
}

/// One entry in a builder's buildpack order: a group of buildpacks detected together.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderEntry {
    /// Buildpacks in this detection group.
    pub group: Vec<BuildpackRef>,
}

/// The stack a builder resolved to: id plus digest-pinned run image.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedStack {
    /// Stack id (e.g. "io.buildpacks.stacks.jammy").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Digest-pinned run image of the stack.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_image: Option<String>,
}

/// `Builder` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BuilderStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Digest-pinned reference of the most recently created builder image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_image: Option<String>,

    /// Buildpacks composed into the builder, in detection order.
    #[serde(default)]
    pub buildpack_metadata: Vec<BuildpackRef>,

    /// The stack the builder was created on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<ResolvedStack>,
}

/// `Builder` composes a stack, a store, and a buildpack order into a builder image.
///
/// The builder controller reads remote registry metadata for the composed
/// builder image and publishes the buildpack metadata and stack information
/// downstream images track to decide when to rebuild.
///
/// # Example
///
/// ```yaml
/// apiVersion: kiln.firestoned.io/v1alpha1
/// kind: Builder
/// metadata:
///   name: app-builder
///   namespace: apps
/// spec:
///   tag: registry.example.com/builders/app
///   stack: base-stack
///   store: default-store
///   order:
///     - group:
///         - id: paketo-buildpacks/java
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "kiln.firestoned.io",
    version = "v1alpha1",
    kind = "Builder",
    namespaced,
    doc = "Builder composes a stack, a store, and a buildpack order into a builder image whose metadata downstream Images track."
)]
#[kube(status = "BuilderStatus")]
#[serde(rename_all = "camelCase")]
pub struct BuilderSpec {
    /// Tag the composed builder image is pushed to.
    pub tag: String,

    /// Name of the `ClusterStack` the builder is created on.
    pub stack: String,

    /// Name of the `ClusterStore` providing buildpacks.
    pub store: String,

    /// Buildpack detection order. When unset, the store's order is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<OrderEntry>>,

    /// Service account whose secrets grant registry access.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
}

/// `ClusterBuilder` is the cluster-scoped variant of [`Builder`].
///
/// Cluster builders are shared across namespaces; images in any namespace may
/// reference one by `kind: ClusterBuilder`.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "kiln.firestoned.io",
    version = "v1alpha1",
    kind = "ClusterBuilder",
    doc = "ClusterBuilder is the cluster-scoped variant of Builder, shared across namespaces."
)]
#[kube(status = "BuilderStatus")]
#[serde(rename_all = "camelCase")]
pub struct ClusterBuilderSpec {
    /// Tag the composed builder image is pushed to.
    pub tag: String,

    /// Name of the `ClusterStack` the builder is created on.
    pub stack: String,

    /// Name of the `ClusterStore` providing buildpacks.
    pub store: String,

    /// Buildpack detection order. When unset, the store's order is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<OrderEntry>>,

    /// Service account in the controller namespace whose secrets grant registry access.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
}

/// A buildpackage image contributed to a store.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoreImage {
    /// Buildpackage image reference.
    pub image: String,
}

/// A buildpack discovered inside a store's buildpackage image.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoreBuildpack {
    /// Buildpack id.
    pub id: String,

    /// Buildpack version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Digest-pinned buildpackage image the buildpack was discovered in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buildpackage: Option<String>,
}

/// `ClusterStore` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStoreStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Buildpacks discovered across all buildpackage images in the store.
    #[serde(default)]
    pub buildpacks: Vec<StoreBuildpack>,
}

/// `ClusterStore` is a shared pool of buildpackage images.
///
/// Publishing a new buildpack version into a store retriggers downstream
/// builder and image reconciliation without any spec change on those
/// resources, via the dependency tracker.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "kiln.firestoned.io",
    version = "v1alpha1",
    kind = "ClusterStore",
    doc = "ClusterStore is a shared pool of buildpackage images builders compose from."
)]
#[kube(status = "ClusterStoreStatus")]
#[serde(rename_all = "camelCase")]
pub struct ClusterStoreSpec {
    /// Buildpackage images contributing buildpacks to this store.
    pub sources: Vec<StoreImage>,
}

/// `ClusterStack` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStackStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Digest-pinned build image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_image: Option<String>,

    /// Digest-pinned run image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_image: Option<String>,
}

/// An image reference within a [`ClusterStack`] or [`ClusterLifecycle`].
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StackImage {
    /// Image reference.
    pub image: String,
}

/// `ClusterStack` pairs the build image and run image builders are created on.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "kiln.firestoned.io",
    version = "v1alpha1",
    kind = "ClusterStack",
    doc = "ClusterStack pairs the build and run images builders are created on, pinned by digest in status."
)]
#[kube(status = "ClusterStackStatus")]
#[serde(rename_all = "camelCase")]
pub struct ClusterStackSpec {
    /// Stack id (e.g. "io.buildpacks.stacks.jammy").
    pub id: String,

    /// Image builds run in.
    pub build_image: StackImage,

    /// Image the built application runs on.
    pub run_image: StackImage,
}

/// `ClusterLifecycle` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterLifecycleStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Digest-pinned lifecycle image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_image: Option<String>,

    /// Lifecycle version discovered in the image metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// `ClusterLifecycle` pins the platform lifecycle image used by builders.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "kiln.firestoned.io",
    version = "v1alpha1",
    kind = "ClusterLifecycle",
    doc = "ClusterLifecycle pins the platform lifecycle image used by builders."
)]
#[kube(status = "ClusterLifecycleStatus")]
#[serde(rename_all = "camelCase")]
pub struct ClusterLifecycleSpec {
    /// Lifecycle image reference.
    pub image: StackImage,
}

/// `ClusterBuildpack` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterBuildpackStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Buildpacks discovered in the buildpackage image.
    #[serde(default)]
    pub buildpacks: Vec<StoreBuildpack>,
}

/// `ClusterBuildpack` exposes a single buildpackage image cluster-wide.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "kiln.firestoned.io",
    version = "v1alpha1",
    kind = "ClusterBuildpack",
    doc = "ClusterBuildpack exposes a single buildpackage image cluster-wide."
)]
#[kube(status = "ClusterBuildpackStatus")]
#[serde(rename_all = "camelCase")]
pub struct ClusterBuildpackSpec {
    /// Buildpackage image reference.
    pub image: StoreImage,

    /// Service account whose secrets grant registry access.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
}

/// `Extension` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Extensions discovered in the extension package image.
    #[serde(default)]
    pub extensions: Vec<StoreBuildpack>,
}

/// `Extension` exposes an image-extension package within a namespace.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "kiln.firestoned.io",
    version = "v1alpha1",
    kind = "Extension",
    namespaced,
    doc = "Extension exposes an image-extension package within a namespace."
)]
#[kube(status = "ExtensionStatus")]
#[serde(rename_all = "camelCase")]
pub struct ExtensionSpec {
    /// Extension package image reference.
    pub image: StoreImage,

    /// Service account whose secrets grant registry access.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
}

/// Check whether a condition list's `Ready` condition is True.
#[must_use]
pub fn is_ready(conditions: &[Condition]) -> bool {
    conditions
        .iter()
        .find(|c| c.r#type == "Ready")
        .is_some_and(|condition| condition.status == "True")
}
