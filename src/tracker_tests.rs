// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `tracker.rs`

#[cfg(test)]
mod tests {
    use super::super::{Clock, DependentKey, SubjectRef, Tracker};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    /// Manually advanced clock for driving lease expiry.
    struct FakeClock {
        now: Mutex<Instant>,
    }

    impl FakeClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(Instant::now()),
            })
        }

        fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }

    fn store_subject() -> SubjectRef {
        SubjectRef::cluster_scoped("ClusterStore", "default-store")
    }

    fn image_key() -> DependentKey {
        DependentKey::namespaced("Image", "apps", "petclinic")
    }

    /// A change before the lease expires re-enqueues the dependent
    #[test]
    fn test_on_changed_within_lease_enqueues() {
        let clock = FakeClock::new();
        let tracker = Tracker::new(Duration::from_secs(60), Arc::clone(&clock) as Arc<dyn Clock>);

        tracker.track(&store_subject(), image_key());
        clock.advance(Duration::from_secs(30));

        assert_eq!(
            tracker.on_changed(&store_subject()),
            vec![image_key()],
            "Dependent should be re-enqueued before its lease expires"
        );
    }

    /// A change after the lease expires does not re-enqueue the dependent
    #[test]
    fn test_on_changed_after_lease_expiry_is_silent() {
        let clock = FakeClock::new();
        let tracker = Tracker::new(Duration::from_secs(60), Arc::clone(&clock) as Arc<dyn Clock>);

        tracker.track(&store_subject(), image_key());
        clock.advance(Duration::from_secs(61));

        assert!(
            tracker.on_changed(&store_subject()).is_empty(),
            "Expired registrations must not be re-enqueued"
        );
    }

    /// Re-tracking the same pair refreshes the lease (last write wins)
    #[test]
    fn test_track_refreshes_lease() {
        let clock = FakeClock::new();
        let tracker = Tracker::new(Duration::from_secs(60), Arc::clone(&clock) as Arc<dyn Clock>);

        tracker.track(&store_subject(), image_key());
        clock.advance(Duration::from_secs(50));

        // Refresh 10 seconds before the original expiry
        tracker.track(&store_subject(), image_key());
        clock.advance(Duration::from_secs(50));

        assert_eq!(
            tracker.on_changed(&store_subject()).len(),
            1,
            "Refreshed lease should still be live 100s after the first track"
        );
    }

    /// A change for an untracked subject returns nothing
    #[test]
    fn test_on_changed_unknown_subject_is_noop() {
        let clock = FakeClock::new();
        let tracker = Tracker::new(Duration::from_secs(60), clock as Arc<dyn Clock>);

        let dependents =
            tracker.on_changed(&SubjectRef::cluster_scoped("ClusterStack", "nobody-watches"));

        assert!(dependents.is_empty());
    }

    /// Expired entries are pruned and empty subjects removed
    #[test]
    fn test_expired_entries_are_pruned() {
        let clock = FakeClock::new();
        let tracker = Tracker::new(Duration::from_secs(60), Arc::clone(&clock) as Arc<dyn Clock>);

        tracker.track(&store_subject(), image_key());
        assert_eq!(tracker.tracked_subjects(), 1);

        clock.advance(Duration::from_secs(120));
        let _ = tracker.on_changed(&store_subject());

        assert_eq!(
            tracker.tracked_subjects(),
            0,
            "Subject with only expired dependents should be removed"
        );
    }

    /// Multiple dependents on one subject are all re-enqueued
    #[test]
    fn test_multiple_dependents_all_enqueued() {
        let clock = FakeClock::new();
        let tracker = Tracker::new(Duration::from_secs(60), clock as Arc<dyn Clock>);

        let other = DependentKey::namespaced("Image", "apps", "storefront");
        tracker.track(&store_subject(), image_key());
        tracker.track(&store_subject(), other.clone());

        let enqueued = tracker.on_changed(&store_subject());

        assert_eq!(enqueued.len(), 2);
        assert!(enqueued.contains(&image_key()));
        assert!(enqueued.contains(&other));
    }

    /// Dependents with live leases survive a mixed prune
    #[test]
    fn test_mixed_expiry_only_live_enqueued() {
        let clock = FakeClock::new();
        let tracker = Tracker::new(Duration::from_secs(60), Arc::clone(&clock) as Arc<dyn Clock>);

        let stale = DependentKey::namespaced("Image", "apps", "stale");
        tracker.track(&store_subject(), stale.clone());

        clock.advance(Duration::from_secs(45));
        tracker.track(&store_subject(), image_key());

        // 70s after `stale` was tracked, 25s after `petclinic` was
        clock.advance(Duration::from_secs(25));
        let enqueued = tracker.on_changed(&store_subject());

        assert_eq!(enqueued, vec![image_key()]);
        assert!(!enqueued.contains(&stale));
    }

    /// Tracking is per (subject, dependent) pair across subjects
    #[test]
    fn test_subjects_are_independent() {
        let clock = FakeClock::new();
        let tracker = Tracker::new(Duration::from_secs(60), clock as Arc<dyn Clock>);

        let stack = SubjectRef::cluster_scoped("ClusterStack", "base");
        tracker.track(&store_subject(), image_key());
        tracker.track(&stack, DependentKey::cluster_scoped("ClusterBuilder", "base"));

        assert_eq!(tracker.on_changed(&store_subject()), vec![image_key()]);
        assert_eq!(
            tracker.on_changed(&stack),
            vec![DependentKey::cluster_scoped("ClusterBuilder", "base")]
        );
    }
}
