// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `clusterstack.rs`

#[cfg(test)]
mod tests {
    use super::super::stack_status_changed;
    use crate::crd::{ClusterStackStatus, Condition};

    fn status() -> ClusterStackStatus {
        ClusterStackStatus {
            conditions: vec![Condition {
                r#type: "Ready".to_string(),
                status: "True".to_string(),
                reason: Some("MetadataResolved".to_string()),
                message: Some("Stack io.buildpacks.stacks.jammy images pinned".to_string()),
                last_transition_time: Some("2025-01-01T00:00:00Z".to_string()),
            }],
            observed_generation: Some(1),
            build_image: Some("reg.io/stacks/build@sha256:b1".to_string()),
            run_image: Some("reg.io/stacks/run@sha256:r1".to_string()),
        }
    }

    /// The first status write always counts as changed
    #[test]
    fn test_first_status_is_changed() {
        assert!(stack_status_changed(None, &status()));
    }

    /// Identical recomputation performs no write
    #[test]
    fn test_identical_status_unchanged() {
        assert!(!stack_status_changed(Some(&status()), &status()));
    }

    /// A digest move on either image is a change
    #[test]
    fn test_image_moves_are_changes() {
        let current = status();

        let mut new_run = status();
        new_run.run_image = Some("reg.io/stacks/run@sha256:r2".to_string());
        assert!(stack_status_changed(Some(&current), &new_run));

        let mut new_build = status();
        new_build.build_image = Some("reg.io/stacks/build@sha256:b2".to_string());
        assert!(stack_status_changed(Some(&current), &new_build));
    }

    /// An observed-generation bump is a change even with identical images
    #[test]
    fn test_generation_bump_is_changed() {
        let current = status();
        let mut new = status();
        new.observed_generation = Some(2);

        assert!(stack_status_changed(Some(&current), &new));
    }
}
