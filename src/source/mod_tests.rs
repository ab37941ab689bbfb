// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for source descriptor dispatch

#[cfg(test)]
mod tests {
    use super::super::{
        is_commit_sha, BlobSourceResolver, GitRevisionResolver, RegistrySourceResolver,
        SourceResolvers,
    };
    use crate::build_errors::SourceError;
    use crate::crd::{
        BlobSource, GitSource, RegistrySource, ResolvedBlobSource, ResolvedGitSource,
        ResolvedRegistrySource, SourceConfig, SourceKind,
    };
    use crate::registry::Keychain;
    use anyhow::Result;
    use std::sync::Arc;

    struct FakeGit;

    #[async_trait::async_trait]
    impl GitRevisionResolver for FakeGit {
        async fn resolve(
            &self,
            _keychain: &Keychain,
            source: &GitSource,
        ) -> Result<ResolvedGitSource> {
            Ok(ResolvedGitSource {
                url: source.url.clone(),
                revision: "abcdef0123456789abcdef0123456789abcdef01".to_string(),
                sub_path: None,
                r#type: SourceKind::Branch,
            })
        }
    }

    struct FakeBlob;

    #[async_trait::async_trait]
    impl BlobSourceResolver for FakeBlob {
        async fn resolve(
            &self,
            _keychain: &Keychain,
            source: &BlobSource,
        ) -> Result<ResolvedBlobSource> {
            Ok(ResolvedBlobSource {
                url: source.url.clone(),
                sub_path: None,
            })
        }
    }

    struct FakeRegistry;

    #[async_trait::async_trait]
    impl RegistrySourceResolver for FakeRegistry {
        async fn resolve(
            &self,
            _keychain: &Keychain,
            source: &RegistrySource,
        ) -> Result<ResolvedRegistrySource> {
            Ok(ResolvedRegistrySource {
                image: format!("{}@sha256:feed", source.image),
                sub_path: None,
            })
        }
    }

    fn resolvers() -> SourceResolvers {
        SourceResolvers {
            git: Arc::new(FakeGit),
            blob: Arc::new(FakeBlob),
            registry: Arc::new(FakeRegistry),
        }
    }

    fn git_config(sub_path: Option<&str>) -> SourceConfig {
        SourceConfig {
            git: Some(GitSource {
                url: "https://github.com/example/app".to_string(),
                revision: "main".to_string(),
            }),
            blob: None,
            registry: None,
            sub_path: sub_path.map(ToString::to_string),
        }
    }

    /// Dispatch picks the git resolver and propagates the sub path
    #[tokio::test]
    async fn test_dispatch_git_with_sub_path() {
        let resolved = resolvers()
            .resolve(&Keychain::anonymous(), &git_config(Some("backend")))
            .await
            .unwrap();

        let git = resolved.git.unwrap();
        assert_eq!(git.sub_path.as_deref(), Some("backend"));
        assert_eq!(git.r#type, SourceKind::Branch);
        assert!(resolved.blob.is_none());
        assert!(resolved.registry.is_none());
    }

    /// Blob and registry sources classify as commits
    #[tokio::test]
    async fn test_dispatch_blob_classifies_commit() {
        let config = SourceConfig {
            blob: Some(BlobSource {
                url: "https://blobs.example.com/app.tar.gz".to_string(),
            }),
            ..SourceConfig::default()
        };

        let resolved = resolvers()
            .resolve(&Keychain::anonymous(), &config)
            .await
            .unwrap();

        assert_eq!(resolved.source_kind(), SourceKind::Commit);
        assert_eq!(
            resolved.revision(),
            Some("https://blobs.example.com/app.tar.gz")
        );
    }

    /// A descriptor with no source kind is rejected
    #[tokio::test]
    async fn test_dispatch_empty_descriptor_rejected() {
        let err = resolvers()
            .resolve(&Keychain::anonymous(), &SourceConfig::default())
            .await
            .unwrap_err();

        assert!(err.downcast_ref::<SourceError>().is_some());
    }

    /// A descriptor with two source kinds is rejected
    #[tokio::test]
    async fn test_dispatch_ambiguous_descriptor_rejected() {
        let mut config = git_config(None);
        config.blob = Some(BlobSource {
            url: "https://blobs.example.com/app.tar.gz".to_string(),
        });

        let err = resolvers()
            .resolve(&Keychain::anonymous(), &config)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<SourceError>(),
            Some(SourceError::AmbiguousDescriptor)
        ));
    }

    /// Full 40-character hex strings are commit SHAs
    #[test]
    fn test_is_commit_sha() {
        assert!(is_commit_sha("abcdef0123456789abcdef0123456789abcdef01"));
        assert!(!is_commit_sha("main"));
        assert!(!is_commit_sha("abcdef"));
        assert!(!is_commit_sha("zzzzzz0123456789abcdef0123456789abcdef01"));
    }
}
