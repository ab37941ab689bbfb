// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `Image` reconciliation: the build scheduling decision engine.
//!
//! The image controller owns the full build loop for one image:
//!
//! 1. Keep the owned `SourceResolver` and build cache volume in sync with
//!    the image spec
//! 2. Resolve the referenced builder from the reflector stores, registering
//!    tracker interest so builder changes re-enqueue the image
//! 3. Gate on the at-most-one-in-flight invariant: while the newest build is
//!    running, scheduling is a no-op
//! 4. Diff the desired build inputs against the newest build and create the
//!    next build when the reason set is non-empty; otherwise surface the last
//!    build's digest
//! 5. Garbage collect at most one failed and one successful build beyond the
//!    image's retention limits
//!
//! All status changes funnel through [`status_helpers::ImageStatusUpdater`],
//! which issues at most one status write per pass.
//!
//! ## Module Structure
//!
//! - [`builds`] - Desired-build computation and rebuild reason classification
//! - [`cache`] - Build cache volume lifecycle
//! - [`history`] - Build history partitioning and incremental GC
//! - [`resolver`] - Ownership of the image's `SourceResolver`
//! - [`status_helpers`] - Collect-then-apply status updates
//! - [`types`] - Shared types and imports

// Submodules
pub mod builds;
pub mod cache;
pub mod history;
pub mod resolver;
pub mod status_helpers;
pub mod types;

use builds::{build_reasons, desired_build, join_reasons, make_build, next_build_number};
use history::{garbage_collect, BuildHistory};
use status_helpers::ImageStatusUpdater;
#[allow(clippy::wildcard_imports)]
use types::*;

use crate::build_errors::NotReadyError;
use crate::constants::{
    DEFAULT_FAILED_BUILD_HISTORY_LIMIT, DEFAULT_SUCCESS_BUILD_HISTORY_LIMIT, KIND_BUILDER,
    KIND_CLUSTER_BUILDER, KIND_IMAGE,
};
use crate::crd::BuilderStatus;
use crate::reconcilers::finalizers::{ensure_finalizer, handle_deletion, FinalizerCleanup};
use crate::registry::Identity;
use crate::status_reasons::REASON_RECONCILE_SUCCEEDED;
use crate::tracker::{DependentKey, SubjectRef};

/// Builds, the source resolver, and the cache volume all carry owner
/// references, so the cluster garbage collector cascades them; cleanup only
/// logs what is about to go.
#[async_trait::async_trait]
impl FinalizerCleanup for Image {
    async fn cleanup(&self, _client: &Client) -> Result<()> {
        info!(
            "Image {}/{} deleted; owned builds, source resolver, and cache cascade via owner references",
            self.namespace().unwrap_or_default(),
            self.name_any()
        );
        Ok(())
    }
}

/// Reconciles an `Image` resource.
///
/// # Errors
///
/// Returns an error when a dependency is present but not ready (retried with
/// backoff), or when an API call fails. A missing builder is not an error:
/// the condition records it and the tracker re-enqueues the image when the
/// builder appears.
pub async fn reconcile_image(ctx: Arc<Context>, image: Image) -> Result<()> {
    let name = image.name_any();
    let namespace = image.namespace().unwrap_or_default();
    debug!(name = %name, namespace = %namespace, "Reconciling Image");

    if image.metadata.deletion_timestamp.is_some() {
        return handle_deletion(&ctx.client, &image, FINALIZER_IMAGE).await;
    }
    ensure_finalizer(&ctx.client, &image, FINALIZER_IMAGE).await?;

    let mut updater = ImageStatusUpdater::new(&image);
    updater.set_observed_generation(image.metadata.generation);

    // Child resources reconcile on every pass, independent of build gating
    let source_resolver =
        resolver::reconcile_source_resolver(&ctx.client, &namespace, &image).await?;
    let cache_name = cache::reconcile_cache(&ctx.client, &namespace, &image).await?;

    // Builder resolution, tracked so builder changes re-enqueue this image
    let dependent = DependentKey::namespaced(KIND_IMAGE, &namespace, &name);
    let Some(builder) = resolve_builder(&ctx, &image, &namespace, dependent) else {
        let message = format!(
            "{} '{}' not found",
            image.spec.builder.kind, image.spec.builder.name
        );
        updater.set_condition(
            CONDITION_TYPE_BUILDER_READY,
            "False",
            REASON_BUILDER_NOT_FOUND,
            &message,
        );
        updater.set_condition(CONDITION_TYPE_READY, "False", REASON_BUILDER_NOT_FOUND, &message);
        updater.apply(&ctx.client).await?;
        // No build attempted; the tracker re-enqueues when the builder appears
        return Ok(());
    };

    if !builder.ready {
        let message = format!(
            "{} '{}' is not ready",
            image.spec.builder.kind, image.spec.builder.name
        );
        updater.set_condition(
            CONDITION_TYPE_BUILDER_READY,
            "False",
            REASON_BUILDER_NOT_READY,
            &message,
        );
        updater.apply(&ctx.client).await?;
        return Err(NotReadyError::new(&image.spec.builder.kind, &image.spec.builder.name).into());
    }

    updater.set_condition(
        CONDITION_TYPE_BUILDER_READY,
        "True",
        REASON_RECONCILE_SUCCEEDED,
        &format!("Builder resolved to {}", builder.image),
    );

    // Resolve the push identity up front so credential problems surface on
    // the image rather than mid-build
    let identity = Identity::new(&namespace, image.service_account());
    ctx.keychains.keychain_for(&identity).await?;

    // Source must have resolved at least once before anything can build;
    // the owned resolver's status update re-enqueues this image
    let Some(source) = source_resolver
        .has_resolved()
        .then(|| source_resolver.resolved_source().cloned())
        .flatten()
    else {
        updater.set_condition(
            CONDITION_TYPE_READY,
            "Unknown",
            REASON_RESOLVER_NOT_READY,
            "Source has not resolved yet",
        );
        updater.apply(&ctx.client).await?;
        return Ok(());
    };

    let history = BuildHistory::partition(owned_builds(&ctx.client, &namespace, &image).await?);

    if history.latest_is_running() {
        // At most one build runs per image; scheduling waits for the
        // terminal condition, which re-enqueues via the owns() watch
        if let Some(running) = history.latest() {
            updater.set_latest_build_ref(&running.name_any());
            updater.set_condition(
                CONDITION_TYPE_READY,
                "Unknown",
                REASON_BUILD_RUNNING,
                &format!("Build {} is running", running.name_any()),
            );
        }
        run_gc(&ctx.client, &namespace, &image, &history).await?;
        updater.apply(&ctx.client).await?;
        return Ok(());
    }

    let desired = desired_build(&image, &builder, &source, cache_name);
    let latest = history.latest();
    let reasons = build_reasons(latest, &desired);

    if reasons.is_empty() {
        // Nothing changed; the last build's output is the current artifact
        if let Some(last) = latest {
            updater.set_latest_build_ref(&last.name_any());
            if last.is_success() {
                let status = last.status.as_ref();
                updater.set_latest_artifact(
                    status.and_then(|s| s.latest_image.clone()),
                    status.and_then(|s| s.stack_run_image.clone()),
                );
                updater.set_condition(
                    CONDITION_TYPE_READY,
                    "True",
                    REASON_UP_TO_DATE,
                    "Latest build is up to date",
                );
            } else {
                updater.set_condition(
                    CONDITION_TYPE_READY,
                    "False",
                    REASON_BUILD_FAILED,
                    &format!("Build {} failed and inputs are unchanged", last.name_any()),
                );
            }
        }
    } else {
        let build_number = next_build_number(
            image.status.as_ref().and_then(|status| status.build_counter),
            latest,
        );
        let build = make_build(&image, &desired, build_number, &reasons);
        let build_name = build.name_any();

        info!(
            name = %name,
            namespace = %namespace,
            build = %build_name,
            number = build_number,
            reasons = %join_reasons(&reasons),
            "Scheduling build"
        );

        let api: Api<Build> = Api::namespaced(ctx.client.clone(), &namespace);
        api.create(&PostParams::default(), &build).await?;
        crate::metrics::record_build_created();

        updater.record_new_build(build_number, &build_name);
        updater.set_condition(
            CONDITION_TYPE_READY,
            "Unknown",
            REASON_BUILD_RUNNING,
            &format!("Build {build_name} scheduled ({})", join_reasons(&reasons)),
        );
    }

    run_gc(&ctx.client, &namespace, &image, &history).await?;
    updater.apply(&ctx.client).await?;
    Ok(())
}

/// Resolve the referenced builder from the reflector stores and register
/// tracker interest in it.
fn resolve_builder(
    ctx: &Context,
    image: &Image,
    namespace: &str,
    dependent: DependentKey,
) -> Option<ResolvedBuilderInfo> {
    let reference = &image.spec.builder;

    if reference.kind == KIND_CLUSTER_BUILDER {
        ctx.tracker.track(
            &SubjectRef::cluster_scoped(KIND_CLUSTER_BUILDER, &reference.name),
            dependent,
        );
        ctx.stores
            .get_cluster_builder(&reference.name)
            .map(|builder| builder_info(builder.status.as_ref()))
    } else {
        ctx.tracker.track(
            &SubjectRef::namespaced(KIND_BUILDER, namespace, &reference.name),
            dependent,
        );
        ctx.stores
            .get_builder(&reference.name, namespace)
            .map(|builder| builder_info(builder.status.as_ref()))
    }
}

/// Flatten a builder's status into the inputs build scheduling needs.
fn builder_info(status: Option<&BuilderStatus>) -> ResolvedBuilderInfo {
    let image = status
        .and_then(|status| status.latest_image.clone())
        .unwrap_or_default();

    ResolvedBuilderInfo {
        ready: !image.is_empty()
            && status.is_some_and(|status| crate::crd::is_ready(&status.conditions)),
        buildpacks: status
            .map(|status| status.buildpack_metadata.clone())
            .unwrap_or_default(),
        run_image: status
            .and_then(|status| status.stack.as_ref())
            .and_then(|stack| stack.run_image.clone()),
        image,
    }
}

/// List the builds owned by `image`.
///
/// The image label narrows the list call; the owner-reference UID check is
/// authoritative, since parentage is never re-derived from names or labels.
async fn owned_builds(client: &Client, namespace: &str, image: &Image) -> Result<Vec<Build>> {
    let api: Api<Build> = Api::namespaced(client.clone(), namespace);
    let params = ListParams::default().labels(&format!("{IMAGE_LABEL}={}", image.name_any()));
    let builds = crate::reconcilers::retry::retry_api_call(
        || async { api.list(&params).await },
        "list builds",
    )
    .await?;

    let image_uid = image.metadata.uid.as_deref();
    Ok(builds
        .items
        .into_iter()
        .filter(|build| {
            build
                .metadata
                .owner_references
                .as_ref()
                .is_some_and(|owners| {
                    owners.iter().any(|owner| Some(owner.uid.as_str()) == image_uid)
                })
        })
        .collect())
}

/// Run incremental history GC with the image's limits.
async fn run_gc(
    client: &Client,
    namespace: &str,
    image: &Image,
    history: &BuildHistory,
) -> Result<()> {
    garbage_collect(
        client,
        namespace,
        history,
        image
            .spec
            .failed_build_history_limit
            .unwrap_or(DEFAULT_FAILED_BUILD_HISTORY_LIMIT),
        image
            .spec
            .success_build_history_limit
            .unwrap_or(DEFAULT_SUCCESS_BUILD_HISTORY_LIMIT),
    )
    .await
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
