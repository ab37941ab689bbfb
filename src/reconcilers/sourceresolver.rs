// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `SourceResolver` reconciliation: the source resolution state machine.
//!
//! States: `Unresolved -> {Commit, Branch, Unknown}`.
//!
//! - A `Commit` classification pins an immutable reference; the resolver is
//!   done and does not self-re-enqueue.
//! - A `Branch` classification means the referenced revision can move; the
//!   resolver reports `ActivePolling=True` and schedules its own re-enqueue
//!   after a fixed delay.
//! - An `Unknown` classification is ignored when the resource has previously
//!   resolved: the last-known-good source and polling condition are retained
//!   instead of regressing. A resource that has never resolved records
//!   `Unknown` verbatim so callers can see resolution is pending.
//!
//! Resolution calls are synchronous and may block on the external fetch
//! collaborator; each key is serialized by the work queue, so blocking only
//! delays this resource's own re-enqueue.

use anyhow::Result;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::{debug, info};

use crate::context::Context;
use crate::crd::{
    ResolvedSourceConfig, SourceKind, SourceResolver, SourceResolverStatus,
};
use crate::reconcilers::status::{conditions_equal, update_condition_in_memory};
use crate::registry::{Identity, Keychain};
use crate::status_reasons::{
    CONDITION_TYPE_ACTIVE_POLLING, CONDITION_TYPE_READY, REASON_PINNED, REASON_POLLING,
    REASON_RESOLUTION_PENDING, REASON_RESOLVED,
};
use std::sync::Arc;

/// Whether the resolver should schedule its own re-enqueue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollDecision {
    /// The source is movable; re-enqueue after the polling interval.
    Poll,
    /// The source is pinned (or resolution pending); rely on watch + resync.
    Settle,
}

/// Reconciles a `SourceResolver` resource.
///
/// Resolves the spec's source descriptor through the per-kind resolver
/// capability and applies the state machine rules to the status.
///
/// # Errors
///
/// Returns an error if resolution fails hard (bad descriptor, revision not
/// found) or the status update fails. Transient lookup failures are not
/// errors; they surface as an `Unknown` classification.
pub async fn reconcile_sourceresolver(
    ctx: Arc<Context>,
    resolver: SourceResolver,
) -> Result<PollDecision> {
    let name = resolver.name_any();
    let namespace = resolver.namespace().unwrap_or_default();
    debug!(name = %name, namespace = %namespace, "Reconciling SourceResolver");

    let keychain = match &resolver.spec.service_account_name {
        Some(service_account) => {
            ctx.keychains
                .keychain_for(&Identity::new(&namespace, service_account))
                .await?
        }
        None => Arc::new(Keychain::anonymous()),
    };

    let resolved = ctx.sources.resolve(&keychain, &resolver.spec.source).await?;

    let Some(new_status) = next_status(
        resolver.status.as_ref(),
        resolved,
        resolver.metadata.generation,
    ) else {
        // Unknown result after a previous success: keep last-known-good
        debug!(name = %name, "Resolution indeterminate, retaining last-known-good source");
        return Ok(poll_decision(resolver.status.as_ref()));
    };

    let decision = poll_decision(Some(&new_status));

    commit_status(&ctx.client, &resolver, &namespace, &new_status).await?;

    if let Some(revision) = new_status.source.as_ref().and_then(ResolvedSourceConfig::revision) {
        info!(
            name = %name,
            namespace = %namespace,
            revision = %revision,
            polling = decision == PollDecision::Poll,
            "SourceResolver reconciled"
        );
    }

    Ok(decision)
}

/// Apply the state machine to produce the next status.
///
/// Returns `None` when the status must not change: an `Unknown` resolution
/// arriving after the resource has previously resolved successfully.
#[must_use]
pub fn next_status(
    current: Option<&SourceResolverStatus>,
    resolved: ResolvedSourceConfig,
    generation: Option<i64>,
) -> Option<SourceResolverStatus> {
    let kind = resolved.source_kind();

    let previously_resolved = current
        .and_then(|status| status.source.as_ref())
        .is_some_and(|source| source.source_kind() != SourceKind::Unknown);

    if kind == SourceKind::Unknown && previously_resolved {
        return None;
    }

    let mut status = current.cloned().unwrap_or_default();
    status.observed_generation = generation;
    status.source = Some(resolved);

    match kind {
        SourceKind::Commit => {
            update_condition_in_memory(
                &mut status.conditions,
                CONDITION_TYPE_READY,
                "True",
                REASON_RESOLVED,
                "Source pinned to an immutable revision",
            );
            update_condition_in_memory(
                &mut status.conditions,
                CONDITION_TYPE_ACTIVE_POLLING,
                "False",
                REASON_PINNED,
                "Immutable revision, polling unnecessary",
            );
        }
        SourceKind::Branch => {
            update_condition_in_memory(
                &mut status.conditions,
                CONDITION_TYPE_READY,
                "True",
                REASON_RESOLVED,
                "Source resolved from a movable reference",
            );
            update_condition_in_memory(
                &mut status.conditions,
                CONDITION_TYPE_ACTIVE_POLLING,
                "True",
                REASON_POLLING,
                "Movable reference, resolving continuously",
            );
        }
        SourceKind::Unknown => {
            // Never resolved before: record the pending state verbatim
            update_condition_in_memory(
                &mut status.conditions,
                CONDITION_TYPE_READY,
                "Unknown",
                REASON_RESOLUTION_PENDING,
                "Source has not resolved yet",
            );
            update_condition_in_memory(
                &mut status.conditions,
                CONDITION_TYPE_ACTIVE_POLLING,
                "False",
                REASON_RESOLUTION_PENDING,
                "Source has not resolved yet",
            );
        }
    }

    Some(status)
}

/// Derive the polling decision from a status.
fn poll_decision(status: Option<&SourceResolverStatus>) -> PollDecision {
    let polling = status
        .map(|status| &status.conditions)
        .and_then(|conditions| {
            conditions
                .iter()
                .find(|c| c.r#type == CONDITION_TYPE_ACTIVE_POLLING)
        })
        .is_some_and(|condition| condition.status == "True");

    if polling {
        PollDecision::Poll
    } else {
        PollDecision::Settle
    }
}

async fn commit_status(
    client: &Client,
    resolver: &SourceResolver,
    namespace: &str,
    new_status: &SourceResolverStatus,
) -> Result<()> {
    let changed = match resolver.status.as_ref() {
        None => true,
        Some(current) => {
            current.observed_generation != new_status.observed_generation
                || current.source != new_status.source
                || !conditions_equal(&current.conditions, &new_status.conditions)
        }
    };

    if !changed {
        debug!(name = %resolver.name_any(), "SourceResolver status unchanged, skipping update");
        return Ok(());
    }

    let api: Api<SourceResolver> = Api::namespaced(client.clone(), namespace);
    let patch = json!({ "status": new_status });
    api.patch_status(
        &resolver.name_any(),
        &PatchParams::default(),
        &Patch::Merge(&patch),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
#[path = "sourceresolver_tests.rs"]
mod sourceresolver_tests;
