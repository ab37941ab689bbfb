// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `Build` reconciliation logic.
//!
//! The buildpack execution itself happens in an externally-run build process;
//! this reconciler only observes its outcome. A [`BuildExecutionObserver`]
//! capability reports execution snapshots (per-step states, produced digest,
//! participating buildpacks), which are folded into the build's status:
//!
//! - no snapshot yet → `Succeeded=Unknown` (the build counts as running)
//! - a running snapshot → `Succeeded=Unknown` with live step states
//! - a terminal snapshot → `Succeeded=True/False` plus digest and metadata
//!
//! A build whose terminal condition is already set is immutable; its
//! reconcile is a no-op regardless of what the observer reports.

use anyhow::Result;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::{debug, info};

use crate::context::Context;
use crate::crd::{Build, BuildStatus, BuildpackRef, StepState};
use crate::reconcilers::status::{conditions_equal, update_condition_in_memory};
use crate::status_reasons::CONDITION_TYPE_SUCCEEDED;
use std::sync::Arc;

/// Terminal or live outcome of an external build execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Execution is still in progress.
    Running,
    /// Execution finished and pushed the image.
    Succeeded,
    /// Execution finished with a failure.
    Failed,
}

/// Snapshot of an externally-run build execution.
#[derive(Clone, Debug)]
pub struct ExecutionSnapshot {
    /// Where the execution currently stands.
    pub outcome: ExecutionOutcome,

    /// Per-step states, in execution order.
    pub step_states: Vec<StepState>,

    /// Digest-pinned image reference, once exported.
    pub latest_image: Option<String>,

    /// Run image of the stack the build ran on.
    pub stack_run_image: Option<String>,

    /// Buildpacks that participated in the build.
    pub buildpack_metadata: Vec<BuildpackRef>,

    /// Failure detail for failed executions.
    pub message: Option<String>,
}

/// Observes externally-run build executions.
///
/// Production implementations watch the execution substrate; tests return
/// canned snapshots. Returning `Ok(None)` means the execution has not
/// surfaced any state yet.
#[async_trait::async_trait]
pub trait BuildExecutionObserver: Send + Sync {
    /// The current execution snapshot for `build`, if any.
    async fn observe(&self, build: &Build) -> Result<Option<ExecutionSnapshot>>;
}

/// Observer for deployments where the execution substrate reports build
/// status out-of-band; reconciles are no-ops until status appears.
pub struct ExternalStatusObserver;

#[async_trait::async_trait]
impl BuildExecutionObserver for ExternalStatusObserver {
    async fn observe(&self, _build: &Build) -> Result<Option<ExecutionSnapshot>> {
        Ok(None)
    }
}

/// Reconciles a `Build` resource.
///
/// # Errors
///
/// Returns an error if observing the execution or writing status fails.
pub async fn reconcile_build(
    ctx: Arc<Context>,
    observer: Arc<dyn BuildExecutionObserver>,
    build: Build,
) -> Result<()> {
    let name = build.name_any();
    let namespace = build.namespace().unwrap_or_default();

    // Terminal builds are immutable
    if build.is_success() || build.is_failure() {
        debug!(name = %name, namespace = %namespace, "Build already terminal, nothing to do");
        return Ok(());
    }

    let Some(snapshot) = observer.observe(&build).await? else {
        debug!(name = %name, namespace = %namespace, "Build execution not observed yet");
        return Ok(());
    };

    let new_status = next_status(&build, &snapshot);
    commit_status(&ctx.client, &build, &namespace, &new_status).await?;

    if snapshot.outcome != ExecutionOutcome::Running {
        info!(
            name = %name,
            namespace = %namespace,
            outcome = ?snapshot.outcome,
            image = new_status.latest_image.as_deref().unwrap_or("<none>"),
            "Build completed"
        );
    }

    Ok(())
}

/// Fold an execution snapshot into the build's status.
#[must_use]
pub fn next_status(build: &Build, snapshot: &ExecutionSnapshot) -> BuildStatus {
    let mut status = build.status.clone().unwrap_or_default();
    status.observed_generation = build.metadata.generation;
    status.step_states.clone_from(&snapshot.step_states);

    match snapshot.outcome {
        ExecutionOutcome::Running => {
            update_condition_in_memory(
                &mut status.conditions,
                CONDITION_TYPE_SUCCEEDED,
                "Unknown",
                "Executing",
                "Build execution in progress",
            );
        }
        ExecutionOutcome::Succeeded => {
            status.latest_image.clone_from(&snapshot.latest_image);
            status.stack_run_image.clone_from(&snapshot.stack_run_image);
            status
                .buildpack_metadata
                .clone_from(&snapshot.buildpack_metadata);
            update_condition_in_memory(
                &mut status.conditions,
                CONDITION_TYPE_SUCCEEDED,
                "True",
                "Completed",
                "Build pushed successfully",
            );
        }
        ExecutionOutcome::Failed => {
            update_condition_in_memory(
                &mut status.conditions,
                CONDITION_TYPE_SUCCEEDED,
                "False",
                "Failed",
                snapshot.message.as_deref().unwrap_or("Build failed"),
            );
        }
    }

    status
}

async fn commit_status(
    client: &Client,
    build: &Build,
    namespace: &str,
    new_status: &BuildStatus,
) -> Result<()> {
    let changed = match build.status.as_ref() {
        None => true,
        Some(current) => {
            current.observed_generation != new_status.observed_generation
                || current.latest_image != new_status.latest_image
                || current.step_states != new_status.step_states
                || current.buildpack_metadata != new_status.buildpack_metadata
                || !conditions_equal(&current.conditions, &new_status.conditions)
        }
    };

    if !changed {
        debug!(name = %build.name_any(), "Build status unchanged, skipping update");
        return Ok(());
    }

    let api: Api<Build> = Api::namespaced(client.clone(), namespace);
    let patch = json!({ "status": new_status });
    api.patch_status(
        &build.name_any(),
        &PatchParams::default(),
        &Patch::Merge(&patch),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
#[path = "build_tests.rs"]
mod build_tests;
