// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `status_helpers.rs`

#[cfg(test)]
mod tests {
    use super::super::ImageStatusUpdater;
    use crate::crd::{BuilderReference, Image, ImageSpec, ImageStatus, SourceConfig};

    fn image_with_status(status: Option<ImageStatus>) -> Image {
        let mut image = Image::new(
            "petclinic",
            ImageSpec {
                tag: "reg.io/apps/petclinic".to_string(),
                additional_tags: None,
                builder: BuilderReference {
                    kind: "ClusterBuilder".to_string(),
                    name: "base".to_string(),
                },
                service_account_name: None,
                source: SourceConfig::default(),
                build: None,
                cache_size: None,
                failed_build_history_limit: None,
                success_build_history_limit: None,
            },
        );
        image.metadata.namespace = Some("apps".to_string());
        image.status = status;
        image
    }

    /// The first status write always counts as a change
    #[test]
    fn test_first_update_has_changes() {
        let updater = ImageStatusUpdater::new(&image_with_status(None));
        assert!(updater.has_changes());
    }

    /// Recomputing the same semantic state is idempotent: no second write
    #[test]
    fn test_identical_state_has_no_changes() {
        let mut seed = ImageStatusUpdater::new(&image_with_status(None));
        seed.set_observed_generation(Some(1));
        seed.set_condition("Ready", "True", "UpToDate", "Latest build is up to date");
        seed.record_new_build(1, "petclinic-build-1");

        // Simulate the stored status after the first pass
        let stored = ImageStatus {
            conditions: seed.conditions().clone(),
            observed_generation: Some(1),
            build_counter: Some(1),
            latest_build_ref: Some("petclinic-build-1".to_string()),
            latest_image: None,
            latest_stack: None,
        };

        let mut second_pass = ImageStatusUpdater::new(&image_with_status(Some(stored)));
        second_pass.set_observed_generation(Some(1));
        second_pass.set_condition("Ready", "True", "UpToDate", "Latest build is up to date");

        assert!(
            !second_pass.has_changes(),
            "Reconciling with no external change must not issue a status write"
        );
    }

    /// A condition flip counts as a change even with identical counters
    #[test]
    fn test_condition_change_detected() {
        let stored = ImageStatus {
            conditions: vec![crate::crd::Condition {
                r#type: "Ready".to_string(),
                status: "True".to_string(),
                reason: Some("UpToDate".to_string()),
                message: Some("Latest build is up to date".to_string()),
                last_transition_time: Some("2025-01-01T00:00:00Z".to_string()),
            }],
            observed_generation: Some(1),
            ..ImageStatus::default()
        };

        let mut updater = ImageStatusUpdater::new(&image_with_status(Some(stored)));
        updater.set_observed_generation(Some(1));
        updater.set_condition("Ready", "False", "BuildFailed", "Build 4 failed");

        assert!(updater.has_changes());
    }

    /// Artifact setters never clear previously surfaced values
    #[test]
    fn test_latest_artifact_retained_when_absent() {
        let stored = ImageStatus {
            latest_image: Some("reg.io/apps/petclinic@sha256:abc".to_string()),
            latest_stack: Some("reg.io/stacks/run@sha256:def".to_string()),
            ..ImageStatus::default()
        };

        let mut updater = ImageStatusUpdater::new(&image_with_status(Some(stored)));
        updater.set_latest_artifact(None, None);

        assert!(
            !updater.has_changes(),
            "Setting no artifact must not erase the last known digest"
        );
    }

    /// Recording a build advances the counter and the latest-build reference
    #[test]
    fn test_record_new_build() {
        let mut updater = ImageStatusUpdater::new(&image_with_status(None));
        updater.record_new_build(4, "petclinic-build-4");

        assert!(updater.has_changes());
    }
}
