// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `build.rs`

#[cfg(test)]
mod tests {
    use super::super::{next_status, ExecutionOutcome, ExecutionSnapshot};
    use crate::crd::{Build, BuildSpec, BuildpackRef, StepState};

    fn build() -> Build {
        let mut build = Build::new("petclinic-build-1", BuildSpec::default());
        build.metadata.generation = Some(1);
        build
    }

    fn snapshot(outcome: ExecutionOutcome) -> ExecutionSnapshot {
        ExecutionSnapshot {
            outcome,
            step_states: vec![StepState {
                name: "export".to_string(),
                phase: "Terminated".to_string(),
                exit_code: Some(0),
                message: None,
            }],
            latest_image: Some("reg.io/apps/petclinic@sha256:abc".to_string()),
            stack_run_image: Some("reg.io/stacks/run@sha256:def".to_string()),
            buildpack_metadata: vec![BuildpackRef {
                id: "paketo-buildpacks/java".to_string(),
                version: Some("1.2.3".to_string()),
            }],
            message: None,
        }
    }

    fn succeeded(status: &crate::crd::BuildStatus) -> Option<&str> {
        status
            .conditions
            .iter()
            .find(|c| c.r#type == "Succeeded")
            .map(|c| c.status.as_str())
    }

    /// A running snapshot keeps the build non-terminal
    #[test]
    fn test_running_snapshot_is_unknown() {
        let status = next_status(&build(), &snapshot(ExecutionOutcome::Running));

        assert_eq!(succeeded(&status), Some("Unknown"));
        assert!(status.latest_image.is_none());
        assert_eq!(status.step_states.len(), 1);
    }

    /// A successful snapshot records the digest, stack, and buildpacks
    #[test]
    fn test_succeeded_snapshot_records_artifact() {
        let status = next_status(&build(), &snapshot(ExecutionOutcome::Succeeded));

        assert_eq!(succeeded(&status), Some("True"));
        assert_eq!(
            status.latest_image.as_deref(),
            Some("reg.io/apps/petclinic@sha256:abc")
        );
        assert_eq!(
            status.stack_run_image.as_deref(),
            Some("reg.io/stacks/run@sha256:def")
        );
        assert_eq!(status.buildpack_metadata.len(), 1);
        assert_eq!(status.observed_generation, Some(1));
    }

    /// A failed snapshot carries the failure message, no digest
    #[test]
    fn test_failed_snapshot_records_failure() {
        let mut failed = snapshot(ExecutionOutcome::Failed);
        failed.message = Some("detect step exited 100".to_string());
        failed.latest_image = None;

        let status = next_status(&build(), &failed);

        assert_eq!(succeeded(&status), Some("False"));
        assert!(status.latest_image.is_none());
        let condition = status
            .conditions
            .iter()
            .find(|c| c.r#type == "Succeeded")
            .unwrap();
        assert_eq!(condition.message.as_deref(), Some("detect step exited 100"));
    }

    /// Terminal classification helpers agree with the folded status
    #[test]
    fn test_terminal_helpers_after_fold() {
        let mut build = build();
        build.status = Some(next_status(&build, &snapshot(ExecutionOutcome::Succeeded)));

        assert!(build.is_success());
        assert!(!build.is_running());
        assert!(!build.is_failure());
    }
}
