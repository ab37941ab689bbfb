// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `main.rs`

#[cfg(test)]
mod tests {
    use super::super::{builder_refs, clusterbuilder_refs, image_refs, Options};
    use clap::Parser;
    use kiln::tracker::DependentKey;

    /// Defaults match the documented constants
    #[test]
    fn test_options_defaults() {
        let options = Options::parse_from(["kiln"]);

        assert_eq!(options.metrics_port, 8080);
        assert!(options.secrets_dir.is_none());
        assert!(options.mounted_secrets.is_empty());
    }

    /// Repeated --mounted-secret flags accumulate
    #[test]
    fn test_options_mounted_secrets() {
        let options = Options::parse_from([
            "kiln",
            "--secrets-dir",
            "/var/kiln/secrets",
            "--mounted-secret",
            "gcr-creds=gcr.io",
            "--mounted-secret",
            "ghcr-creds=ghcr.io",
        ]);

        assert_eq!(
            options.mounted_secrets,
            vec!["gcr-creds=gcr.io", "ghcr-creds=ghcr.io"]
        );
    }

    /// Tracker keys map to work-queue references of the right kind only
    #[test]
    fn test_image_refs_filters_kinds() {
        let keys = vec![
            DependentKey::namespaced("Image", "apps", "petclinic"),
            DependentKey::namespaced("Builder", "apps", "app-builder"),
            DependentKey::cluster_scoped("ClusterBuilder", "base"),
        ];

        let refs = image_refs(keys.clone());
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name, "petclinic");

        assert_eq!(builder_refs(keys.clone()).len(), 1);
        assert_eq!(clusterbuilder_refs(keys).len(), 1);
    }

    /// A namespaced dependent key without a namespace is dropped, not mangled
    #[test]
    fn test_image_refs_requires_namespace() {
        let keys = vec![DependentKey::cluster_scoped("Image", "orphan")];
        assert!(image_refs(keys).is_empty());
    }
}
