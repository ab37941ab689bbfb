// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `builder.rs`

#[cfg(test)]
mod tests {
    use super::super::builder_status_changed;
    use crate::crd::{BuilderStatus, BuildpackRef, Condition, ResolvedStack};

    fn status() -> BuilderStatus {
        BuilderStatus {
            conditions: vec![Condition {
                r#type: "Ready".to_string(),
                status: "True".to_string(),
                reason: Some("MetadataResolved".to_string()),
                message: Some("1 buildpack(s) composed".to_string()),
                last_transition_time: Some("2025-01-01T00:00:00Z".to_string()),
            }],
            observed_generation: Some(1),
            latest_image: Some("reg.io/builders/base@sha256:bb1".to_string()),
            buildpack_metadata: vec![BuildpackRef {
                id: "paketo-buildpacks/java".to_string(),
                version: Some("1.2.3".to_string()),
            }],
            stack: Some(ResolvedStack {
                id: Some("io.buildpacks.stacks.jammy".to_string()),
                run_image: Some("reg.io/stacks/run@sha256:aa1".to_string()),
            }),
        }
    }

    /// The first status write always counts as changed
    #[test]
    fn test_first_status_is_changed() {
        assert!(builder_status_changed(None, &status()));
    }

    /// An identical recomputation is not a change (timestamps ignored)
    #[test]
    fn test_identical_status_unchanged() {
        let current = status();
        let mut new = status();
        new.conditions[0].last_transition_time = Some("2025-06-01T00:00:00Z".to_string());

        assert!(!builder_status_changed(Some(&current), &new));
    }

    /// A new builder digest is a change
    #[test]
    fn test_digest_move_is_changed() {
        let current = status();
        let mut new = status();
        new.latest_image = Some("reg.io/builders/base@sha256:bb2".to_string());

        assert!(builder_status_changed(Some(&current), &new));
    }

    /// A buildpack version bump is a change
    #[test]
    fn test_buildpack_bump_is_changed() {
        let current = status();
        let mut new = status();
        new.buildpack_metadata[0].version = Some("1.2.4".to_string());

        assert!(builder_status_changed(Some(&current), &new));
    }

    /// A stack run-image move is a change
    #[test]
    fn test_stack_move_is_changed() {
        let current = status();
        let mut new = status();
        new.stack = Some(ResolvedStack {
            id: Some("io.buildpacks.stacks.jammy".to_string()),
            run_image: Some("reg.io/stacks/run@sha256:aa2".to_string()),
        });

        assert!(builder_status_changed(Some(&current), &new));
    }
}
