// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Source descriptor resolution capabilities.
//!
//! The source resolution state machine (`reconcilers::sourceresolver`)
//! depends on one capability per source kind: resolve a descriptor into a
//! concrete revision plus a classification. Fetch mechanics live behind these
//! traits; the reconciler only sees the resolved result.
//!
//! Classification semantics:
//!
//! - A git revision that is already a full commit SHA resolves to
//!   [`SourceKind::Commit`] and is never polled again.
//! - A branch or tag resolves to the commit it currently points at,
//!   classified [`SourceKind::Branch`], and is polled continuously.
//! - An indeterminate lookup (e.g. the remote was unreachable) resolves to
//!   [`SourceKind::Unknown`] rather than an error, so the state machine can
//!   apply its keep-last-known-good rule without unwrapping error chains.
//! - Blob and registry sources are immutable by construction and always
//!   classify as `Commit`.

use anyhow::Result;
use tracing::debug;

use crate::build_errors::SourceError;
use crate::crd::{
    BlobSource, GitSource, RegistrySource, ResolvedBlobSource, ResolvedGitSource,
    ResolvedRegistrySource, ResolvedSourceConfig, SourceConfig, SourceKind,
};
use crate::registry::{Keychain, MetadataRetriever};
use std::sync::Arc;

/// Resolves a git descriptor to a commit and classification.
#[async_trait::async_trait]
pub trait GitRevisionResolver: Send + Sync {
    /// Resolve `source` to a concrete commit.
    ///
    /// Implementations return a [`SourceKind::Unknown`] result for transient
    /// lookup failures instead of an error; errors are reserved for
    /// resolution that cannot succeed without a spec change.
    async fn resolve(&self, keychain: &Keychain, source: &GitSource) -> Result<ResolvedGitSource>;
}

/// Resolves a blob descriptor.
#[async_trait::async_trait]
pub trait BlobSourceResolver: Send + Sync {
    /// Resolve `source` for building.
    async fn resolve(&self, keychain: &Keychain, source: &BlobSource)
        -> Result<ResolvedBlobSource>;
}

/// Resolves a registry-image descriptor to a digest-pinned reference.
#[async_trait::async_trait]
pub trait RegistrySourceResolver: Send + Sync {
    /// Resolve `source` to a digest-pinned image.
    async fn resolve(
        &self,
        keychain: &Keychain,
        source: &RegistrySource,
    ) -> Result<ResolvedRegistrySource>;
}

/// The per-kind resolver capabilities bundled for dispatch.
pub struct SourceResolvers {
    pub git: Arc<dyn GitRevisionResolver>,
    pub blob: Arc<dyn BlobSourceResolver>,
    pub registry: Arc<dyn RegistrySourceResolver>,
}

impl SourceResolvers {
    /// Resolve `config` through the resolver matching its source kind.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::AmbiguousDescriptor`] when the descriptor does
    /// not carry exactly one source kind, and propagates resolver failures.
    pub async fn resolve(
        &self,
        keychain: &Keychain,
        config: &SourceConfig,
    ) -> Result<ResolvedSourceConfig> {
        let kinds = usize::from(config.git.is_some())
            + usize::from(config.blob.is_some())
            + usize::from(config.registry.is_some());
        if kinds != 1 {
            return Err(SourceError::AmbiguousDescriptor.into());
        }

        if let Some(git) = &config.git {
            let mut resolved = self.git.resolve(keychain, git).await?;
            resolved.sub_path.clone_from(&config.sub_path);
            return Ok(ResolvedSourceConfig {
                git: Some(resolved),
                ..ResolvedSourceConfig::default()
            });
        }

        if let Some(blob) = &config.blob {
            let mut resolved = self.blob.resolve(keychain, blob).await?;
            resolved.sub_path.clone_from(&config.sub_path);
            return Ok(ResolvedSourceConfig {
                blob: Some(resolved),
                ..ResolvedSourceConfig::default()
            });
        }

        if let Some(registry) = &config.registry {
            let mut resolved = self.registry.resolve(keychain, registry).await?;
            resolved.sub_path.clone_from(&config.sub_path);
            return Ok(ResolvedSourceConfig {
                registry: Some(resolved),
                ..ResolvedSourceConfig::default()
            });
        }

        Err(SourceError::AmbiguousDescriptor.into())
    }
}

/// Whether a git revision string is already a full commit SHA.
#[must_use]
pub fn is_commit_sha(revision: &str) -> bool {
    revision.len() == 40 && revision.chars().all(|c| c.is_ascii_hexdigit())
}

/// Production git resolver shelling out to `git ls-remote`.
///
/// A revision that is already a full commit SHA is pinned without a remote
/// call. Anything else is looked up against the remote's heads and tags; a
/// match classifies as `Branch` (the pointer can move). An unreachable remote
/// yields an `Unknown` classification rather than an error.
pub struct LsRemoteGitResolver;

#[async_trait::async_trait]
impl GitRevisionResolver for LsRemoteGitResolver {
    async fn resolve(&self, _keychain: &Keychain, source: &GitSource) -> Result<ResolvedGitSource> {
        if is_commit_sha(&source.revision) {
            return Ok(ResolvedGitSource {
                url: source.url.clone(),
                revision: source.revision.clone(),
                sub_path: None,
                r#type: SourceKind::Commit,
            });
        }

        let output = tokio::process::Command::new("git")
            .arg("ls-remote")
            .arg(&source.url)
            .arg(&source.revision)
            .arg(format!("refs/heads/{}", source.revision))
            .arg(format!("refs/tags/{}", source.revision))
            .output()
            .await;

        let output = match output {
            Ok(output) if output.status.success() => output,
            // Remote unreachable or git unavailable: indeterminate, not fatal
            _ => {
                debug!(url = %source.url, revision = %source.revision,
                       "git ls-remote failed, classifying source as unknown");
                return Ok(ResolvedGitSource {
                    url: source.url.clone(),
                    revision: source.revision.clone(),
                    sub_path: None,
                    r#type: SourceKind::Unknown,
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let commit = stdout
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .next();

        match commit {
            Some(commit) => Ok(ResolvedGitSource {
                url: source.url.clone(),
                revision: commit.to_string(),
                sub_path: None,
                r#type: SourceKind::Branch,
            }),
            None => Err(SourceError::RevisionNotFound {
                location: source.url.clone(),
                revision: source.revision.clone(),
            }
            .into()),
        }
    }
}

/// Production blob resolver.
///
/// Blobs are content-addressed by location; resolution records the URL as-is.
pub struct PassthroughBlobResolver;

#[async_trait::async_trait]
impl BlobSourceResolver for PassthroughBlobResolver {
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

/// Production registry source resolver: pins the source image by digest
/// through the shared metadata retriever.
pub struct DigestRegistryResolver {
    retriever: Arc<dyn MetadataRetriever>,
}

impl DigestRegistryResolver {
    /// Create a resolver over the shared metadata retriever.
    #[must_use]
    pub fn new(retriever: Arc<dyn MetadataRetriever>) -> Self {
        Self { retriever }
    }
}

#[async_trait::async_trait]
impl RegistrySourceResolver for DigestRegistryResolver {
    async fn resolve(
        &self,
        keychain: &Keychain,
        source: &RegistrySource,
    ) -> Result<ResolvedRegistrySource> {
        // The lifecycle read path pins any image by digest without
        // interpreting buildpack labels.
        let record = self.retriever.read_lifecycle(keychain, &source.image).await?;
        Ok(ResolvedRegistrySource {
            image: record.image,
            sub_path: None,
        })
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
