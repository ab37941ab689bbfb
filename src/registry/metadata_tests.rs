// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `metadata.rs`

#[cfg(test)]
mod tests {
    use super::super::{buildpack_fingerprint, HttpMetadataRetriever};
    use crate::crd::BuildpackRef;

    fn bp(id: &str, version: &str) -> BuildpackRef {
        BuildpackRef {
            id: id.to_string(),
            version: Some(version.to_string()),
        }
    }

    /// The fingerprint is insensitive to buildpack ordering
    #[test]
    fn test_fingerprint_order_insensitive() {
        let forward = vec![bp("paketo-buildpacks/java", "1.2.3"), bp("paketo-buildpacks/node", "4.5.6")];
        let reverse = vec![bp("paketo-buildpacks/node", "4.5.6"), bp("paketo-buildpacks/java", "1.2.3")];

        assert_eq!(
            buildpack_fingerprint(&forward),
            buildpack_fingerprint(&reverse)
        );
    }

    /// A version bump changes the fingerprint
    #[test]
    fn test_fingerprint_changes_on_version_bump() {
        let before = vec![bp("paketo-buildpacks/java", "1.2.3")];
        let after = vec![bp("paketo-buildpacks/java", "1.2.4")];

        assert_ne!(buildpack_fingerprint(&before), buildpack_fingerprint(&after));
    }

    /// A missing version participates in the fingerprint as empty
    #[test]
    fn test_fingerprint_handles_missing_version() {
        let unversioned = vec![BuildpackRef {
            id: "paketo-buildpacks/java".to_string(),
            version: None,
        }];

        assert_ne!(
            buildpack_fingerprint(&unversioned),
            buildpack_fingerprint(&[bp("paketo-buildpacks/java", "1.2.3")])
        );
    }

    /// Image references split into registry, repository, and reference
    #[test]
    fn test_split_reference() {
        assert_eq!(
            HttpMetadataRetriever::split_reference("reg.io/team/app:v1"),
            (
                "reg.io".to_string(),
                "team/app".to_string(),
                "v1".to_string()
            )
        );
        assert_eq!(
            HttpMetadataRetriever::split_reference("reg.io/team/app@sha256:abc"),
            (
                "reg.io".to_string(),
                "team/app".to_string(),
                "sha256:abc".to_string()
            )
        );
        assert_eq!(
            HttpMetadataRetriever::split_reference("reg.io/team/app"),
            (
                "reg.io".to_string(),
                "team/app".to_string(),
                "latest".to_string()
            )
        );
    }
}
