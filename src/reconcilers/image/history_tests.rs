// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `history.rs`

#[cfg(test)]
mod tests {
    use super::super::BuildHistory;
    use crate::crd::{Build, BuildSpec, BuildStatus, Condition};
    use crate::labels::BUILD_NUMBER_LABEL;
    use kube::ResourceExt;
    use std::collections::BTreeMap;

    /// Build fixture with a number label and an optional terminal condition.
    fn build(number: i64, succeeded: Option<&str>) -> Build {
        let mut labels = BTreeMap::new();
        labels.insert(BUILD_NUMBER_LABEL.to_string(), number.to_string());

        let mut build = Build::new(&format!("app-build-{number}"), BuildSpec::default());
        build.metadata.labels = Some(labels);
        build.status = succeeded.map(|status| BuildStatus {
            conditions: vec![Condition {
                r#type: "Succeeded".to_string(),
                status: status.to_string(),
                reason: None,
                message: None,
                last_transition_time: None,
            }],
            ..BuildStatus::default()
        });
        build
    }

    /// Partitioning splits by terminal condition and orders by number
    #[test]
    fn test_partition_by_outcome() {
        let history = BuildHistory::partition(vec![
            build(3, Some("False")),
            build(1, Some("True")),
            build(4, None),
            build(2, Some("True")),
        ]);

        assert_eq!(
            history.succeeded.iter().filter_map(Build::build_number).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(history.failed.len(), 1);
        assert_eq!(history.running.len(), 1);
    }

    /// The latest build is found by number, not list position
    #[test]
    fn test_latest_by_build_number() {
        let history = BuildHistory::partition(vec![
            build(7, Some("True")),
            build(9, Some("False")),
            build(8, Some("True")),
        ]);

        assert_eq!(history.latest().and_then(Build::build_number), Some(9));
    }

    /// An Unknown terminal condition counts as running
    #[test]
    fn test_unknown_condition_is_running() {
        let history = BuildHistory::partition(vec![build(1, Some("True")), build(2, Some("Unknown"))]);

        assert!(history.latest_is_running());
        assert_eq!(history.running.len(), 1);
    }

    /// A missing status counts as running (at-most-one-in-flight holds)
    #[test]
    fn test_missing_status_is_running() {
        let history = BuildHistory::partition(vec![build(1, None)]);
        assert!(history.latest_is_running());
    }

    /// GC selects exactly the single oldest failed build beyond the limit
    #[test]
    fn test_failed_gc_victim_is_single_oldest() {
        let history = BuildHistory::partition(vec![
            build(1, Some("False")),
            build(2, Some("False")),
            build(3, Some("False")),
            build(4, Some("True")),
        ]);

        let victim = history.failed_gc_victim(2).unwrap();
        assert_eq!(victim.name_any(), "app-build-1");

        // Within the limit: no victim
        assert!(history.failed_gc_victim(3).is_none());
    }

    /// Success retention applies independently of failed retention
    #[test]
    fn test_success_gc_independent_of_failed() {
        let history = BuildHistory::partition(vec![
            build(1, Some("True")),
            build(2, Some("True")),
            build(3, Some("False")),
        ]);

        assert_eq!(
            history.success_gc_victim(1).and_then(Build::build_number),
            Some(1)
        );
        assert!(history.failed_gc_victim(1).is_none());
    }

    /// Repeated passes converge the bucket to the limit one deletion at a time
    #[test]
    fn test_retention_bound_converges() {
        let mut builds: Vec<Build> = (1..=6).map(|n| build(n, Some("False"))).collect();
        let limit = 2;

        let mut deletions = 0;
        loop {
            let history = BuildHistory::partition(builds.clone());
            let Some(victim) = history.failed_gc_victim(limit) else {
                break;
            };
            let victim_name = victim.name_any();
            builds.retain(|b| b.name_any() != victim_name);
            deletions += 1;
        }

        assert_eq!(deletions, 4, "One deletion per pass until within the limit");
        assert_eq!(builds.len(), 2);
        // The newest failed builds survive
        let survivors: Vec<i64> = builds.iter().filter_map(Build::build_number).collect();
        assert_eq!(survivors, vec![5, 6]);
    }

    /// Running builds are never GC candidates
    #[test]
    fn test_running_builds_not_collected() {
        let history = BuildHistory::partition(vec![build(1, None), build(2, None)]);

        assert!(history.failed_gc_victim(0).is_none());
        assert!(history.success_gc_victim(0).is_none());
    }
}
