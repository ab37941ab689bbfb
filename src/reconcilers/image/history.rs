// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Build history bookkeeping and incremental garbage collection.
//!
//! Builds are partitioned by terminal condition and ordered by their numeric
//! build-number label (creation timestamps are not trustworthy under clock
//! skew). Garbage collection deletes at most one failed and one successful
//! build per reconcile pass: one deletion per kind per pass bounds the blast
//! radius of a GC bug and spreads the work across reconciles.

#[allow(clippy::wildcard_imports)]
use super::types::*;

/// An image's builds partitioned by outcome, each bucket ordered by build
/// number ascending.
#[derive(Debug, Default)]
pub struct BuildHistory {
    pub succeeded: Vec<Build>,
    pub failed: Vec<Build>,
    /// Builds still running (terminal condition absent or Unknown).
    pub running: Vec<Build>,
}

impl BuildHistory {
    /// Partition `builds` by terminal condition.
    #[must_use]
    pub fn partition(mut builds: Vec<Build>) -> Self {
        builds.sort_by_key(|build| build.build_number().unwrap_or(0));

        let mut history = BuildHistory::default();
        for build in builds {
            if build.is_success() {
                history.succeeded.push(build);
            } else if build.is_failure() {
                history.failed.push(build);
            } else {
                history.running.push(build);
            }
        }
        history
    }

    /// The most recent build across all buckets, by build number.
    #[must_use]
    pub fn latest(&self) -> Option<&Build> {
        self.succeeded
            .iter()
            .chain(&self.failed)
            .chain(&self.running)
            .max_by_key(|build| build.build_number().unwrap_or(0))
    }

    /// Whether the most recent build is still running.
    ///
    /// This is the at-most-one-in-flight gate: while it holds, build
    /// scheduling is a no-op.
    #[must_use]
    pub fn latest_is_running(&self) -> bool {
        self.latest().is_some_and(Build::is_running)
    }

    /// The single oldest successful build in excess of `limit`, if any.
    #[must_use]
    pub fn success_gc_victim(&self, limit: i64) -> Option<&Build> {
        oldest_exceeding(&self.succeeded, limit)
    }

    /// The single oldest failed build in excess of `limit`, if any.
    #[must_use]
    pub fn failed_gc_victim(&self, limit: i64) -> Option<&Build> {
        oldest_exceeding(&self.failed, limit)
    }
}

/// The oldest build of `builds` when the bucket exceeds `limit`.
///
/// Buckets are ordered ascending by build number, so the first element is
/// the oldest. Exactly one victim per call keeps GC incremental.
fn oldest_exceeding(builds: &[Build], limit: i64) -> Option<&Build> {
    let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
    if builds.len() > limit {
        builds.first()
    } else {
        None
    }
}

/// Delete at most one failed and one successful build in excess of the
/// image's retention limits.
///
/// # Errors
///
/// Returns an error when a delete call fails; an already-deleted victim is
/// treated as success.
pub async fn garbage_collect(
    client: &Client,
    namespace: &str,
    history: &BuildHistory,
    failed_limit: i64,
    success_limit: i64,
) -> Result<()> {
    let api: Api<Build> = Api::namespaced(client.clone(), namespace);

    for victim in [
        history.failed_gc_victim(failed_limit),
        history.success_gc_victim(success_limit),
    ]
    .into_iter()
    .flatten()
    {
        let name = victim.name_any();
        debug!(
            build = %name,
            number = ?victim.build_number(),
            "Garbage collecting build beyond retention limit"
        );

        match api.delete(&name, &DeleteParams::default()).await {
            Ok(_) => {
                crate::metrics::record_build_gc();
                info!(build = %name, "Deleted build beyond retention limit");
            }
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                debug!(build = %name, "Build already deleted");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod history_tests;
