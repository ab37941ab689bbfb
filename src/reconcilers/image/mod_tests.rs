// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the image reconciler's builder resolution helpers

#[cfg(test)]
mod tests {
    use super::super::builder_info;
    use crate::crd::{BuilderStatus, BuildpackRef, Condition, ResolvedStack};

    fn ready_condition(status: &str) -> Condition {
        Condition {
            r#type: "Ready".to_string(),
            status: status.to_string(),
            reason: None,
            message: None,
            last_transition_time: None,
        }
    }

    /// A ready builder with a published image flattens into usable inputs
    #[test]
    fn test_builder_info_ready() {
        let status = BuilderStatus {
            conditions: vec![ready_condition("True")],
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
        };

        let info = builder_info(Some(&status));

        assert!(info.ready);
        assert_eq!(info.image, "reg.io/builders/base@sha256:bb1");
        assert_eq!(info.buildpacks.len(), 1);
        assert_eq!(
            info.run_image.as_deref(),
            Some("reg.io/stacks/run@sha256:aa1")
        );
    }

    /// A builder without a published image is not usable even if Ready
    #[test]
    fn test_builder_info_requires_image() {
        let status = BuilderStatus {
            conditions: vec![ready_condition("True")],
            ..BuilderStatus::default()
        };

        assert!(!builder_info(Some(&status)).ready);
    }

    /// A builder with a NotReady condition is not usable
    #[test]
    fn test_builder_info_not_ready() {
        let status = BuilderStatus {
            conditions: vec![ready_condition("False")],
            latest_image: Some("reg.io/builders/base@sha256:bb1".to_string()),
            ..BuilderStatus::default()
        };

        assert!(!builder_info(Some(&status)).ready);
    }

    /// No status at all flattens to an unusable builder
    #[test]
    fn test_builder_info_no_status() {
        let info = builder_info(None);
        assert!(!info.ready);
        assert!(info.image.is_empty());
    }
}
