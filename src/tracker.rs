// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cross-resource dependency tracking.
//!
//! The tracker lets resource A register interest in resource B without B
//! knowing about A: when B changes, every dependent with a live lease is
//! re-enqueued. Registrations carry a lease so interest from deleted
//! dependents expires instead of accumulating; normal reconcile traffic
//! refreshes the lease on every pass.
//!
//! Re-enqueueing rides the controller runtime's watch mappers: a watch event
//! for a subject calls [`Tracker::on_changed`], and the returned dependent
//! keys are handed straight back to the work queue. The tracker's lock is
//! released before the keys are returned, so enqueue side effects can never
//! deadlock against a reconciler calling [`Tracker::track`] concurrently.
//!
//! The tracker is an explicit component constructed once per process and
//! passed by reference to the reconcilers that need it. The clock is
//! injected so tests can drive lease expiry with isolated instances.
//!
//! # Example
//!
//! ```rust,no_run
//! use kiln::tracker::{DependentKey, SubjectRef, SystemClock, Tracker};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let tracker = Tracker::new(Duration::from_secs(1800), Arc::new(SystemClock));
//!
//! tracker.track(
//!     &SubjectRef::cluster_scoped("ClusterStore", "default-store"),
//!     DependentKey::namespaced("Image", "apps", "petclinic"),
//! );
//!
//! // Later, from the ClusterStore watch mapper:
//! for key in tracker.on_changed(&SubjectRef::cluster_scoped("ClusterStore", "default-store")) {
//!     // hand `key` back to the owning controller's work queue
//!     let _ = key;
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

/// Time source for lease bookkeeping.
///
/// Injected so tests can advance time deterministically.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> Instant;
}

/// Production clock backed by [`Instant::now`].
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Identity of a watched subject.
///
/// Subjects are identified by kind plus namespace/name; the relation is weak
/// and never implies lifecycle ownership.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct SubjectRef {
    /// Kind of the watched resource (e.g. "ClusterStore").
    pub kind: String,

    /// Namespace, `None` for cluster-scoped subjects.
    pub namespace: Option<String>,

    /// Name of the watched resource.
    pub name: String,
}

impl SubjectRef {
    /// Reference to a cluster-scoped subject.
    #[must_use]
    pub fn cluster_scoped(kind: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            namespace: None,
            name: name.to_string(),
        }
    }

    /// Reference to a namespaced subject.
    #[must_use]
    pub fn namespaced(kind: &str, namespace: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            namespace: Some(namespace.to_string()),
            name: name.to_string(),
        }
    }
}

/// Work-queue key of a dependent to re-enqueue when its subject changes.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct DependentKey {
    /// Kind of the dependent resource (e.g. "Image").
    pub kind: String,

    /// Namespace, `None` for cluster-scoped dependents.
    pub namespace: Option<String>,

    /// Name of the dependent resource.
    pub name: String,
}

impl DependentKey {
    /// Key for a namespaced dependent.
    #[must_use]
    pub fn namespaced(kind: &str, namespace: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            namespace: Some(namespace.to_string()),
            name: name.to_string(),
        }
    }

    /// Key for a cluster-scoped dependent.
    #[must_use]
    pub fn cluster_scoped(kind: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            namespace: None,
            name: name.to_string(),
        }
    }
}

/// Maps watched subjects to the dependents that must be re-enqueued when they change.
///
/// All state lives behind a single lock; `track` and `on_changed` are
/// mutually exclusive.
pub struct Tracker {
    lease: Duration,
    clock: Arc<dyn Clock>,
    registrations: Mutex<HashMap<SubjectRef, HashMap<DependentKey, Instant>>>,
}

impl Tracker {
    /// Create a tracker with the given lease duration and clock.
    #[must_use]
    pub fn new(lease: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            lease,
            clock,
            registrations: Mutex::new(HashMap::new()),
        }
    }

    /// Register (or refresh) `dependent`'s interest in `subject`.
    ///
    /// Repeated calls for the same pair refresh the lease expiry; last write
    /// wins. The lease starts at the injected clock's current instant.
    pub fn track(&self, subject: &SubjectRef, dependent: DependentKey) {
        let expiry = self.clock.now() + self.lease;

        let mut registrations = self.registrations.lock().expect("tracker lock poisoned");

        registrations
            .entry(subject.clone())
            .or_default()
            .insert(dependent, expiry);
    }

    /// Notify the tracker that `subject` changed.
    ///
    /// Returns the dependents with unexpired leases, for the caller to
    /// re-enqueue. Expired leases and subjects left with no dependents are
    /// pruned lazily here. A change notification for a subject nobody tracks
    /// returns an empty list.
    #[must_use]
    pub fn on_changed(&self, subject: &SubjectRef) -> Vec<DependentKey> {
        let now = self.clock.now();

        let live: Vec<DependentKey> = {
            let mut registrations = self.registrations.lock().expect("tracker lock poisoned");

            let Some(dependents) = registrations.get_mut(subject) else {
                return Vec::new();
            };

            dependents.retain(|_, expiry| *expiry > now);

            let live = dependents.keys().cloned().collect();
            if dependents.is_empty() {
                registrations.remove(subject);
            }
            live
        };

        if !live.is_empty() {
            debug!(
                subject_kind = %subject.kind,
                subject_name = %subject.name,
                dependents = live.len(),
                "Subject changed, re-enqueueing dependents"
            );
        }

        live
    }

    /// Number of subjects with at least one registration. For metrics and tests.
    #[must_use]
    pub fn tracked_subjects(&self) -> usize {
        self.registrations
            .lock()
            .expect("tracker lock poisoned")
            .len()
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tracker_tests;
