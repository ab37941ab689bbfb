// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Build scheduling decisions for `Image` resources.
//!
//! The decision engine compares the desired build inputs (resolved source,
//! builder digest, image configuration) field-by-field against the most
//! recent build and classifies the differences into reasons:
//!
//! - `config` - tags, environment, resources, service account, cache, or
//!   source layout changed
//! - `commit` - the resolved source revision moved
//! - `buildpack` - the builder's buildpack composition changed since the last
//!   build was scheduled
//!
//! Reasons are always emitted in that canonical order, independent of
//! detection order. A non-empty reason set schedules the next build; an empty
//! set reuses the last build's output.

#[allow(clippy::wildcard_imports)]
use super::types::*;
use crate::registry::metadata::buildpack_fingerprint;

/// Why a new build must be created, in canonical emission order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuildReason {
    /// Image configuration changed (tags, env, resources, service account,
    /// cache, source layout).
    Config,
    /// The resolved source revision changed.
    Commit,
    /// The builder's buildpack composition changed.
    Buildpack,
}

impl BuildReason {
    /// The annotation token for this reason.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildReason::Config => "config",
            BuildReason::Commit => "commit",
            BuildReason::Buildpack => "buildpack",
        }
    }
}

/// Join reasons into the build annotation value, canonical order.
#[must_use]
pub fn join_reasons(reasons: &[BuildReason]) -> String {
    let mut sorted = reasons.to_vec();
    sorted.sort();
    sorted.dedup();
    sorted
        .iter()
        .map(|reason| reason.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// The fully resolved inputs the next build would run with.
#[derive(Clone, Debug)]
pub struct DesiredBuild {
    pub tags: Vec<String>,
    pub builder_image: String,
    pub service_account: String,
    pub source: ResolvedSourceConfig,
    pub env: Option<Vec<k8s_openapi::api::core::v1::EnvVar>>,
    pub resources: Option<k8s_openapi::api::core::v1::ResourceRequirements>,
    pub cache_name: Option<String>,
    /// Fingerprint of the builder's buildpack metadata at scheduling time.
    pub buildpack_fingerprint: String,
}

/// Compute the desired build spec from the image's current inputs.
#[must_use]
pub fn desired_build(
    image: &Image,
    builder: &ResolvedBuilderInfo,
    source: &ResolvedSourceConfig,
    cache_name: Option<String>,
) -> DesiredBuild {
    DesiredBuild {
        tags: image.tags(),
        builder_image: builder.image.clone(),
        service_account: image.service_account().to_string(),
        source: source.clone(),
        env: image.spec.build.as_ref().and_then(|build| build.env.clone()),
        resources: image
            .spec
            .build
            .as_ref()
            .and_then(|build| build.resources.clone()),
        cache_name,
        buildpack_fingerprint: buildpack_fingerprint(&builder.buildpacks),
    }
}

/// Classify the differences between the last build and the desired build.
///
/// With no previous build every input is new; the classification is a single
/// `config` reason. The returned set is in canonical order and never contains
/// duplicates.
#[must_use]
pub fn build_reasons(last: Option<&Build>, desired: &DesiredBuild) -> Vec<BuildReason> {
    let Some(last) = last else {
        return vec![BuildReason::Config];
    };

    let mut reasons = Vec::new();

    if config_changed(last, desired) {
        reasons.push(BuildReason::Config);
    }

    if last.spec.source.revision() != desired.source.revision() {
        reasons.push(BuildReason::Commit);
    }

    if buildpacks_changed(last, desired) {
        reasons.push(BuildReason::Buildpack);
    }

    reasons
}

/// Whether any configuration input differs from what the last build recorded.
fn config_changed(last: &Build, desired: &DesiredBuild) -> bool {
    if last.spec.tags != desired.tags
        || last.spec.service_account_name.as_deref().unwrap_or("default")
            != desired.service_account
        || last.spec.env != desired.env
        || last.spec.resources != desired.resources
        || last.spec.cache_name != desired.cache_name
    {
        return true;
    }

    // Source layout: same revision can still be a different repository,
    // archive, or build context subdirectory
    source_layout(&last.spec.source) != source_layout(&desired.source)
}

/// The non-revision part of a resolved source: where it comes from and which
/// subdirectory builds.
fn source_layout(source: &ResolvedSourceConfig) -> (Option<&str>, Option<&str>) {
    if let Some(git) = &source.git {
        return (Some(git.url.as_str()), git.sub_path.as_deref());
    }
    if let Some(blob) = &source.blob {
        return (Some(blob.url.as_str()), blob.sub_path.as_deref());
    }
    if let Some(registry) = &source.registry {
        return (Some(registry.image.as_str()), registry.sub_path.as_deref());
    }
    (None, None)
}

/// Whether the builder's buildpack composition moved since the last build.
///
/// The last build carries a fingerprint annotation stamped at scheduling
/// time; builds created before the annotation existed fall back to the
/// fingerprint of the buildpacks their status recorded.
fn buildpacks_changed(last: &Build, desired: &DesiredBuild) -> bool {
    let last_fingerprint = last
        .metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(BUILDPACK_FINGERPRINT_ANNOTATION))
        .cloned()
        .unwrap_or_else(|| {
            buildpack_fingerprint(
                last.status
                    .as_ref()
                    .map(|status| status.buildpack_metadata.as_slice())
                    .unwrap_or_default(),
            )
        });

    last_fingerprint != desired.buildpack_fingerprint
}

/// Construct the `Build` resource for `desired` with the given number.
///
/// The build number label is the sort key for all history operations; the
/// reasons annotation records why the build was scheduled; the owner
/// reference makes the build cascade when the image is deleted.
#[must_use]
pub fn make_build(
    image: &Image,
    desired: &DesiredBuild,
    build_number: i64,
    reasons: &[BuildReason],
) -> Build {
    let name = format!("{}-build-{build_number}", image.name_any());

    let mut labels = BTreeMap::new();
    labels.insert(IMAGE_LABEL.to_string(), image.name_any());
    labels.insert(BUILD_NUMBER_LABEL.to_string(), build_number.to_string());
    labels.insert(K8S_COMPONENT.to_string(), COMPONENT_BUILD.to_string());
    labels.insert(K8S_MANAGED_BY.to_string(), MANAGED_BY_IMAGE.to_string());
    labels.insert(K8S_PART_OF.to_string(), PART_OF_KILN.to_string());

    let mut annotations = BTreeMap::new();
    annotations.insert(BUILD_REASON_ANNOTATION.to_string(), join_reasons(reasons));
    annotations.insert(
        BUILDPACK_FINGERPRINT_ANNOTATION.to_string(),
        desired.buildpack_fingerprint.clone(),
    );

    Build {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: image.namespace(),
            labels: Some(labels),
            annotations: Some(annotations),
            owner_references: image_owner_reference(image).map(|owner| vec![owner]),
            ..ObjectMeta::default()
        },
        spec: BuildSpec {
            tags: desired.tags.clone(),
            builder: BuildBuilderImage {
                image: desired.builder_image.clone(),
            },
            service_account_name: Some(desired.service_account.clone()),
            source: desired.source.clone(),
            env: desired.env.clone(),
            resources: desired.resources.clone(),
            cache_name: desired.cache_name.clone(),
        },
        status: None,
    }
}

/// The next build number for an image.
///
/// Strictly greater than both the status counter and every existing build's
/// number label, so numbers stay monotonic even when the status write of a
/// previous pass was lost.
#[must_use]
pub fn next_build_number(status_counter: Option<i64>, latest_build: Option<&Build>) -> i64 {
    let from_status = status_counter.unwrap_or(0);
    let from_builds = latest_build.and_then(Build::build_number).unwrap_or(0);
    from_status.max(from_builds) + 1
}

#[cfg(test)]
#[path = "builds_tests.rs"]
mod builds_tests;
