// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `builds.rs`

#[cfg(test)]
mod tests {
    use super::super::{
        build_reasons, desired_build, join_reasons, make_build, next_build_number, BuildReason,
        DesiredBuild,
    };
    use crate::crd::{
        Build, BuilderReference, BuildpackRef, GitSource, Image, ImageBuild, ImageSpec,
        ResolvedGitSource, ResolvedSourceConfig, SourceConfig, SourceKind,
    };
    use crate::labels::{BUILD_NUMBER_LABEL, BUILD_REASON_ANNOTATION, IMAGE_LABEL};
    use crate::reconcilers::image::types::ResolvedBuilderInfo;
    use k8s_openapi::api::core::v1::EnvVar;
    use kube::api::ObjectMeta;
    use kube::ResourceExt;

    fn image() -> Image {
        let mut image = Image::new(
            "petclinic",
            ImageSpec {
                tag: "reg.io/apps/petclinic".to_string(),
                additional_tags: None,
                builder: BuilderReference {
                    kind: "ClusterBuilder".to_string(),
                    name: "base".to_string(),
                },
                service_account_name: Some("build-bot".to_string()),
                source: SourceConfig {
                    git: Some(GitSource {
                        url: "https://github.com/example/petclinic".to_string(),
                        revision: "main".to_string(),
                    }),
                    blob: None,
                    registry: None,
                    sub_path: None,
                },
                build: None,
                cache_size: None,
                failed_build_history_limit: None,
                success_build_history_limit: None,
            },
        );
        image.metadata.namespace = Some("apps".to_string());
        image.metadata.uid = Some("image-uid-1".to_string());
        image
    }

    fn builder_info() -> ResolvedBuilderInfo {
        ResolvedBuilderInfo {
            image: "reg.io/builders/base@sha256:bb1".to_string(),
            buildpacks: vec![BuildpackRef {
                id: "paketo-buildpacks/java".to_string(),
                version: Some("1.2.3".to_string()),
            }],
            run_image: Some("reg.io/stacks/run@sha256:aa1".to_string()),
            ready: true,
        }
    }

    fn resolved_source(revision: &str) -> ResolvedSourceConfig {
        ResolvedSourceConfig {
            git: Some(ResolvedGitSource {
                url: "https://github.com/example/petclinic".to_string(),
                revision: revision.to_string(),
                sub_path: None,
                r#type: SourceKind::Commit,
            }),
            blob: None,
            registry: None,
        }
    }

    fn desired() -> DesiredBuild {
        desired_build(&image(), &builder_info(), &resolved_source("abcdef"), None)
    }

    /// Scenario: new image with resolved source and ready builder schedules
    /// build 1 with reason "config"
    #[test]
    fn test_first_build_reason_is_config() {
        let desired = desired();
        let reasons = build_reasons(None, &desired);

        assert_eq!(reasons, vec![BuildReason::Config]);
        assert_eq!(join_reasons(&reasons), "config");
        assert_eq!(next_build_number(None, None), 1);
    }

    /// A second pass with no changes produces an empty reason set
    #[test]
    fn test_unchanged_inputs_produce_no_reasons() {
        let desired = desired();
        let last = make_build(&image(), &desired, 1, &[BuildReason::Config]);

        assert!(build_reasons(Some(&last), &desired).is_empty());
    }

    /// A moved source revision classifies as "commit"
    #[test]
    fn test_commit_reason_on_revision_change() {
        let last = make_build(&image(), &desired(), 1, &[BuildReason::Config]);

        let moved = desired_build(&image(), &builder_info(), &resolved_source("123456"), None);
        let reasons = build_reasons(Some(&last), &moved);

        assert_eq!(reasons, vec![BuildReason::Commit]);
    }

    /// Scenario: builder buildpack metadata changes between reconciles
    /// schedules the next build with reason "buildpack"
    #[test]
    fn test_buildpack_reason_on_metadata_drift() {
        let last = make_build(&image(), &desired(), 1, &[BuildReason::Config]);

        let mut bumped = builder_info();
        bumped.buildpacks[0].version = Some("1.2.4".to_string());
        let drifted = desired_build(&image(), &bumped, &resolved_source("abcdef"), None);

        let reasons = build_reasons(Some(&last), &drifted);
        assert_eq!(reasons, vec![BuildReason::Buildpack]);
        assert_eq!(join_reasons(&reasons), "buildpack");
    }

    /// Env changes classify as "config"
    #[test]
    fn test_config_reason_on_env_change() {
        let last = make_build(&image(), &desired(), 1, &[BuildReason::Config]);

        let mut image_with_env = image();
        image_with_env.spec.build = Some(ImageBuild {
            env: Some(vec![EnvVar {
                name: "BP_JVM_VERSION".to_string(),
                value: Some("21".to_string()),
                value_from: None,
            }]),
            resources: None,
        });
        let changed = desired_build(
            &image_with_env,
            &builder_info(),
            &resolved_source("abcdef"),
            None,
        );

        assert_eq!(build_reasons(Some(&last), &changed), vec![BuildReason::Config]);
    }

    /// Reasons always join in canonical order: config, commit, buildpack
    #[test]
    fn test_reasons_join_in_canonical_order() {
        let joined = join_reasons(&[
            BuildReason::Buildpack,
            BuildReason::Config,
            BuildReason::Commit,
        ]);
        assert_eq!(joined, "config,commit,buildpack");

        // Duplicates collapse
        assert_eq!(
            join_reasons(&[BuildReason::Commit, BuildReason::Commit]),
            "commit"
        );
    }

    /// Everything changing at once emits all three reasons
    #[test]
    fn test_all_reasons_together() {
        let last = make_build(&image(), &desired(), 1, &[BuildReason::Config]);

        let mut image_changed = image();
        image_changed.spec.tag = "reg.io/apps/petclinic-v2".to_string();
        let mut bumped = builder_info();
        bumped.buildpacks[0].version = Some("9.9.9".to_string());
        let changed = desired_build(&image_changed, &bumped, &resolved_source("123456"), None);

        assert_eq!(
            build_reasons(Some(&last), &changed),
            vec![BuildReason::Config, BuildReason::Commit, BuildReason::Buildpack]
        );
    }

    /// Build numbers are strictly increasing and never reused, even when the
    /// status counter lags the newest surviving build
    #[test]
    fn test_next_build_number_monotonic() {
        let build_5 = make_build(&image(), &desired(), 5, &[BuildReason::Commit]);

        assert_eq!(next_build_number(Some(5), Some(&build_5)), 6);
        // Status counter lost (stale write): the label still wins
        assert_eq!(next_build_number(Some(2), Some(&build_5)), 6);
        // Builds GCed but counter intact
        assert_eq!(next_build_number(Some(7), None), 8);
    }

    /// Constructed builds carry the number label, reason annotation, and
    /// owner reference back to the image
    #[test]
    fn test_make_build_metadata() {
        let build = make_build(&image(), &desired(), 3, &[BuildReason::Commit]);

        assert_eq!(build.name_any(), "petclinic-build-3");
        assert_eq!(build.metadata.namespace.as_deref(), Some("apps"));

        let labels = build.metadata.labels.as_ref().unwrap();
        assert_eq!(labels.get(BUILD_NUMBER_LABEL).unwrap(), "3");
        assert_eq!(labels.get(IMAGE_LABEL).unwrap(), "petclinic");
        assert_eq!(build.build_number(), Some(3));

        let annotations = build.metadata.annotations.as_ref().unwrap();
        assert_eq!(annotations.get(BUILD_REASON_ANNOTATION).unwrap(), "commit");

        let owner = &build.metadata.owner_references.as_ref().unwrap()[0];
        assert_eq!(owner.kind, "Image");
        assert_eq!(owner.name, "petclinic");
        assert_eq!(owner.uid, "image-uid-1");
        assert_eq!(owner.controller, Some(true));
    }

    /// The desired spec pins the builder image and records the push identity
    #[test]
    fn test_desired_build_captures_inputs() {
        let desired = desired();

        assert_eq!(desired.tags, vec!["reg.io/apps/petclinic"]);
        assert_eq!(desired.builder_image, "reg.io/builders/base@sha256:bb1");
        assert_eq!(desired.service_account, "build-bot");
        assert_eq!(desired.source.revision(), Some("abcdef"));
        assert!(!desired.buildpack_fingerprint.is_empty());
    }

    /// A build without the fingerprint annotation falls back to its recorded
    /// buildpack metadata for drift detection
    #[test]
    fn test_buildpack_drift_fallback_without_annotation() {
        let mut last = make_build(&image(), &desired(), 1, &[BuildReason::Config]);
        last.metadata.annotations = None;
        last.status = Some(crate::crd::BuildStatus {
            buildpack_metadata: builder_info().buildpacks,
            ..crate::crd::BuildStatus::default()
        });

        // Same buildpacks: no drift
        assert!(build_reasons(Some(&last), &desired()).is_empty());

        // Bumped buildpacks: drift detected via status fallback
        let mut bumped = builder_info();
        bumped.buildpacks[0].version = Some("2.0.0".to_string());
        let drifted = desired_build(&image(), &bumped, &resolved_source("abcdef"), None);
        assert_eq!(
            build_reasons(Some(&last), &drifted),
            vec![BuildReason::Buildpack]
        );
    }

    #[test]
    fn test_build_metadata_uses_empty_objectmeta_defaults() {
        let build = make_build(&image(), &desired(), 1, &[BuildReason::Config]);
        assert_eq!(build.metadata.generation, ObjectMeta::default().generation);
        assert!(build.status.is_none());
    }
}
