// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Credential keychain resolution and caching.
//!
//! A keychain maps a registry host to usable credentials for one identity
//! (a namespace + service account pair). Resolution follows a fixed
//! precedence, most to least specific:
//!
//! 1. Secrets attached to the service account that are annotated for a
//!    specific registry host, merged first-writer-wins per registry
//! 2. Secrets mounted into the controller's own filesystem (platform-provided,
//!    identity-less)
//! 3. Image-pull secrets referenced by the service account, resolved through
//!    the external cluster keychain collaborator
//! 4. Anonymous access
//!
//! Resolving a credential source never fails for "no match" - the chain
//! simply falls through to anonymous. The [`KeychainCache`] memoizes resolved
//! keychains per identity for the lifetime of the process; callers needing
//! fresh credentials after a secret rotation rely on reconcile cadence
//! re-deriving the keychain, not on cache invalidation.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use tracing::debug;

use crate::build_errors::CredentialError;
use crate::registry::registry_match;

/// Secret annotation naming the registry host the secret authenticates to.
pub const REGISTRY_ANNOTATION: &str = "kiln.firestoned.io/registry";

/// Credentials for a single registry host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
}

/// Resolves a registry reference to credentials.
///
/// Returning `None` means anonymous access; resolution itself never fails.
pub trait CredentialResolver: Send + Sync {
    /// Credentials for the registry hosting `reference`, or `None` for anonymous.
    fn resolve(&self, reference: &str) -> Option<RegistryCredentials>;
}

/// A static registry-host-to-credentials table.
///
/// Used for both annotated service-account secrets and mounted platform
/// secrets; lookup applies [`registry_match`] host equivalence.
#[derive(Default)]
pub struct StaticKeychain {
    credentials: BTreeMap<String, RegistryCredentials>,
}

impl StaticKeychain {
    /// Build from an already-merged registry-to-credentials map.
    #[must_use]
    pub fn new(credentials: BTreeMap<String, RegistryCredentials>) -> Self {
        Self { credentials }
    }

    /// Merge annotated basic-auth secret data into a keychain.
    ///
    /// Each entry is `(registry_annotation_value, username, password)`.
    /// An already-present registry entry is never overwritten: the merge is
    /// first-writer-wins so multi-secret ordering stays deterministic.
    #[must_use]
    pub fn from_annotated_entries(entries: Vec<(String, RegistryCredentials)>) -> Self {
        let mut credentials = BTreeMap::new();
        for (registry, creds) in entries {
            credentials.entry(registry).or_insert(creds);
        }
        Self { credentials }
    }

    /// Number of registries with credentials. For tests and logging.
    #[must_use]
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Whether the keychain holds no credentials.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

impl CredentialResolver for StaticKeychain {
    fn resolve(&self, reference: &str) -> Option<RegistryCredentials> {
        self.credentials
            .iter()
            .find(|(registry, _)| registry_match(registry, reference))
            .map(|(_, creds)| creds.clone())
    }
}

/// Resolves image-pull-secret-based and platform-native credentials.
///
/// Production implementations talk to the cluster (docker config secrets,
/// cloud-provider token exchange); tests use in-memory stand-ins.
#[async_trait::async_trait]
pub trait ClusterKeychainProvider: Send + Sync {
    /// Build a resolver over the named image-pull secrets of `namespace`.
    async fn resolver_for_pull_secrets(
        &self,
        namespace: &str,
        secret_names: &[String],
    ) -> Result<Arc<dyn CredentialResolver>>;
}

/// An ordered chain of credential resolvers ending in anonymous access.
pub struct Keychain {
    sources: Vec<Arc<dyn CredentialResolver>>,
}

impl Keychain {
    /// Assemble a keychain from resolvers in precedence order.
    #[must_use]
    pub fn new(sources: Vec<Arc<dyn CredentialResolver>>) -> Self {
        Self { sources }
    }

    /// A keychain that always resolves anonymously.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            sources: Vec::new(),
        }
    }
}

impl CredentialResolver for Keychain {
    fn resolve(&self, reference: &str) -> Option<RegistryCredentials> {
        self.sources
            .iter()
            .find_map(|source| source.resolve(reference))
    }
}

/// Identity a keychain is resolved for.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Identity {
    pub namespace: String,
    pub service_account: String,
}

impl Identity {
    /// Convenience constructor.
    #[must_use]
    pub fn new(namespace: &str, service_account: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            service_account: service_account.to_string(),
        }
    }
}

/// Builds a keychain for an identity.
///
/// The production implementation reads the service account and its secrets
/// from the cluster; test implementations return canned keychains.
#[async_trait::async_trait]
pub trait KeychainFactory: Send + Sync {
    /// Resolve the full credential chain for `identity`.
    async fn keychain_for(&self, identity: &Identity) -> Result<Arc<Keychain>>;
}

/// Memoizing wrapper around a slow [`KeychainFactory`].
///
/// Keyed by `(namespace, service_account)`; entries live until process
/// restart. Identities are finite and low-cardinality per cluster, so the
/// cache carries no eviction path.
pub struct KeychainCache {
    factory: Arc<dyn KeychainFactory>,
    cache: Mutex<HashMap<Identity, Arc<Keychain>>>,
}

impl KeychainCache {
    /// Wrap `factory` with a process-lifetime cache.
    #[must_use]
    pub fn new(factory: Arc<dyn KeychainFactory>) -> Self {
        Self {
            factory,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The keychain for `identity`, resolving through the factory on first use.
    ///
    /// The cache lock is released while the factory runs; two racing first
    /// lookups may both resolve, and the first insert wins.
    ///
    /// # Errors
    ///
    /// Returns an error only when the underlying factory fails; a factory
    /// that finds no credentials returns an anonymous keychain instead.
    pub async fn keychain_for(&self, identity: &Identity) -> Result<Arc<Keychain>> {
        if let Some(cached) = self
            .cache
            .lock()
            .expect("keychain cache lock poisoned")
            .get(identity)
        {
            crate::metrics::record_keychain_cache_hit();
            return Ok(Arc::clone(cached));
        }

        crate::metrics::record_keychain_cache_miss();
        debug!(
            namespace = %identity.namespace,
            service_account = %identity.service_account,
            "Keychain cache miss, resolving credentials"
        );

        let resolved = self.factory.keychain_for(identity).await?;

        let mut cache = self.cache.lock().expect("keychain cache lock poisoned");
        Ok(Arc::clone(
            cache
                .entry(identity.clone())
                .or_insert_with(|| Arc::clone(&resolved)),
        ))
    }

    /// Number of cached identities. For metrics and tests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache
            .lock()
            .expect("keychain cache lock poisoned")
            .len()
    }

    /// Whether any identity has been resolved yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parse platform-mounted credential secrets into a registry-to-credentials map.
///
/// Each argument names a secret and the registry it authenticates to, in the
/// form `name=registry` (e.g. `gcr-creds=gcr.io`). For every argument the
/// secret's `username` and `password` files are read from
/// `<secrets_dir>/<name>/`.
///
/// # Errors
///
/// Returns [`CredentialError::MalformedMountArg`] for an argument without a
/// `=`, and [`CredentialError::MissingSecretFile`] when a named secret
/// directory lacks a `username` or `password` file.
pub fn parse_mounted_annotated_secrets(
    secrets_dir: &Path,
    args: &[String],
) -> Result<BTreeMap<String, RegistryCredentials>, CredentialError> {
    let mut credentials = BTreeMap::new();

    for arg in args {
        let Some((name, registry)) = arg.split_once('=') else {
            return Err(CredentialError::MalformedMountArg { arg: arg.clone() });
        };

        let secret_dir = secrets_dir.join(name);
        let username = read_secret_file(&secret_dir, name, "username")?;
        let password = read_secret_file(&secret_dir, name, "password")?;

        // First writer wins when two mounts name the same registry
        credentials
            .entry(registry.to_string())
            .or_insert(RegistryCredentials { username, password });
    }

    Ok(credentials)
}

fn read_secret_file(
    secret_dir: &Path,
    secret: &str,
    file: &str,
) -> Result<String, CredentialError> {
    std::fs::read_to_string(secret_dir.join(file))
        .map(|content| content.trim_end_matches('\n').to_string())
        .map_err(|_| CredentialError::MissingSecretFile {
            secret: secret.to_string(),
            file: file.to_string(),
        })
}

/// Production keychain factory resolving through the cluster.
///
/// Assembles the full precedence chain for an identity:
/// annotated service-account secrets, then platform-mounted secrets, then
/// image-pull secrets via the cluster keychain provider. A missing service
/// account still yields a usable (mounted + anonymous) keychain.
pub struct ServiceAccountKeychainFactory {
    client: kube::Client,
    mounted: Arc<StaticKeychain>,
    cluster_provider: Arc<dyn ClusterKeychainProvider>,
}

impl ServiceAccountKeychainFactory {
    /// Create a factory over the given client, mounted secrets, and cluster
    /// keychain collaborator.
    #[must_use]
    pub fn new(
        client: kube::Client,
        mounted: Arc<StaticKeychain>,
        cluster_provider: Arc<dyn ClusterKeychainProvider>,
    ) -> Self {
        Self {
            client,
            mounted,
            cluster_provider,
        }
    }
}

#[async_trait::async_trait]
impl KeychainFactory for ServiceAccountKeychainFactory {
    async fn keychain_for(&self, identity: &Identity) -> Result<Arc<Keychain>> {
        use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
        use kube::Api;

        let sa_api: Api<ServiceAccount> =
            Api::namespaced(self.client.clone(), &identity.namespace);
        let Some(service_account) = sa_api.get_opt(&identity.service_account).await? else {
            debug!(
                namespace = %identity.namespace,
                service_account = %identity.service_account,
                "Service account not found, using mounted credentials only"
            );
            return Ok(Arc::new(Keychain::new(vec![
                Arc::clone(&self.mounted) as Arc<dyn CredentialResolver>
            ])));
        };

        let secret_api: Api<Secret> = Api::namespaced(self.client.clone(), &identity.namespace);

        // Most specific first: secrets attached to the service account that
        // are annotated for a registry host
        let mut entries = Vec::new();
        for secret_ref in service_account.secrets.unwrap_or_default() {
            let Some(name) = secret_ref.name else { continue };
            let Some(secret) = secret_api.get_opt(&name).await? else {
                continue;
            };

            let Some(registry) = secret
                .metadata
                .annotations
                .as_ref()
                .and_then(|annotations| annotations.get(REGISTRY_ANNOTATION))
            else {
                continue;
            };

            let data = secret.data.unwrap_or_default();
            let read = |key: &str| {
                data.get(key)
                    .and_then(|value| String::from_utf8(value.0.clone()).ok())
            };
            if let (Some(username), Some(password)) = (read("username"), read("password")) {
                entries.push((registry.clone(), RegistryCredentials { username, password }));
            }
        }
        let annotated = StaticKeychain::from_annotated_entries(entries);

        let pull_secret_names: Vec<String> = service_account
            .image_pull_secrets
            .unwrap_or_default()
            .into_iter()
            .filter_map(|reference| Some(reference.name))
            .collect();
        let pull_secrets = self
            .cluster_provider
            .resolver_for_pull_secrets(&identity.namespace, &pull_secret_names)
            .await?;

        Ok(Arc::new(Keychain::new(vec![
            Arc::new(annotated),
            Arc::clone(&self.mounted) as Arc<dyn CredentialResolver>,
            pull_secrets,
        ])))
    }
}

/// Production cluster keychain provider reading docker config secrets.
pub struct SecretClusterKeychain {
    client: kube::Client,
}

impl SecretClusterKeychain {
    /// Create a provider over the given client.
    #[must_use]
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ClusterKeychainProvider for SecretClusterKeychain {
    async fn resolver_for_pull_secrets(
        &self,
        namespace: &str,
        secret_names: &[String],
    ) -> Result<Arc<dyn CredentialResolver>> {
        use k8s_openapi::api::core::v1::Secret;
        use kube::Api;

        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);

        let mut merged = BTreeMap::new();
        for name in secret_names {
            let Some(secret) = api.get_opt(name).await? else {
                continue;
            };

            let Some(payload) = secret
                .data
                .as_ref()
                .and_then(|data| data.get(".dockerconfigjson"))
            else {
                continue;
            };

            match parse_docker_config_json(name, &payload.0) {
                Ok(credentials) => {
                    for (registry, creds) in credentials {
                        merged.entry(registry).or_insert(creds);
                    }
                }
                Err(e) => {
                    debug!(secret = %name, error = %e, "Skipping unparseable pull secret");
                }
            }
        }

        Ok(Arc::new(StaticKeychain::new(merged)))
    }
}

/// One entry of a docker config `auths` table.
#[derive(Debug, Deserialize)]
struct DockerConfigAuth {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    auth: Option<String>,
}

/// Parse a `kubernetes.io/dockerconfigjson` secret payload into credentials.
///
/// Entries carrying a combined `auth` field (base64 of `user:pass`) are
/// decoded; entries carrying explicit `username`/`password` are used as-is.
/// Entries with neither are skipped.
///
/// # Errors
///
/// Returns [`CredentialError::InvalidDockerConfig`] when the payload is not
/// valid docker config JSON.
pub fn parse_docker_config_json(
    secret_name: &str,
    payload: &[u8],
) -> Result<BTreeMap<String, RegistryCredentials>, CredentialError> {
    #[derive(Debug, Deserialize)]
    struct DockerConfig {
        #[serde(default)]
        auths: BTreeMap<String, DockerConfigAuth>,
    }

    let config: DockerConfig =
        serde_json::from_slice(payload).map_err(|e| CredentialError::InvalidDockerConfig {
            secret: secret_name.to_string(),
            reason: e.to_string(),
        })?;

    let mut credentials = BTreeMap::new();
    for (registry, auth) in config.auths {
        let creds = match (auth.username, auth.password, auth.auth) {
            (Some(username), Some(password), _) => RegistryCredentials { username, password },
            (_, _, Some(combined)) => {
                let decoded = BASE64.decode(combined.as_bytes()).map_err(|e| {
                    CredentialError::InvalidDockerConfig {
                        secret: secret_name.to_string(),
                        reason: format!("auth field is not base64: {e}"),
                    }
                })?;
                let decoded = String::from_utf8(decoded).map_err(|e| {
                    CredentialError::InvalidDockerConfig {
                        secret: secret_name.to_string(),
                        reason: format!("auth field is not utf-8: {e}"),
                    }
                })?;
                let Some((username, password)) = decoded.split_once(':') else {
                    return Err(CredentialError::InvalidDockerConfig {
                        secret: secret_name.to_string(),
                        reason: "auth field is not user:pass".to_string(),
                    });
                };
                RegistryCredentials {
                    username: username.to_string(),
                    password: password.to_string(),
                }
            }
            _ => continue,
        };

        credentials.entry(registry).or_insert(creds);
    }

    Ok(credentials)
}

#[cfg(test)]
#[path = "keychain_tests.rs"]
mod keychain_tests;
