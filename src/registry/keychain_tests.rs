// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `keychain.rs`

#[cfg(test)]
mod tests {
    use super::super::{
        parse_docker_config_json, parse_mounted_annotated_secrets, CredentialResolver, Identity,
        Keychain, KeychainCache, KeychainFactory, RegistryCredentials, StaticKeychain,
    };
    use crate::build_errors::CredentialError;
    use anyhow::Result;
    use std::collections::BTreeMap;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn creds(username: &str) -> RegistryCredentials {
        RegistryCredentials {
            username: username.to_string(),
            password: "hunter2".to_string(),
        }
    }

    /// A keychain factory that counts how often it resolves
    struct CountingFactory {
        resolutions: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl KeychainFactory for CountingFactory {
        async fn keychain_for(&self, _identity: &Identity) -> Result<Arc<Keychain>> {
            self.resolutions.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Keychain::anonymous()))
        }
    }

    /// Two lookups for the same identity hit the slow factory exactly once
    #[tokio::test]
    async fn test_cache_resolves_identity_once() {
        let factory = Arc::new(CountingFactory {
            resolutions: AtomicUsize::new(0),
        });
        let cache = KeychainCache::new(Arc::clone(&factory) as Arc<dyn KeychainFactory>);

        let identity = Identity::new("apps", "build-bot");
        cache.keychain_for(&identity).await.unwrap();
        cache.keychain_for(&identity).await.unwrap();

        assert_eq!(
            factory.resolutions.load(Ordering::SeqCst),
            1,
            "Second lookup must be served from the cache"
        );
        assert_eq!(cache.len(), 1);
    }

    /// Distinct identities resolve independently
    #[tokio::test]
    async fn test_cache_distinct_identities() {
        let factory = Arc::new(CountingFactory {
            resolutions: AtomicUsize::new(0),
        });
        let cache = KeychainCache::new(Arc::clone(&factory) as Arc<dyn KeychainFactory>);

        cache
            .keychain_for(&Identity::new("apps", "build-bot"))
            .await
            .unwrap();
        cache
            .keychain_for(&Identity::new("apps", "default"))
            .await
            .unwrap();

        assert_eq!(factory.resolutions.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    /// Annotated-secret merging is first-writer-wins per registry
    #[test]
    fn test_annotated_merge_first_writer_wins() {
        let keychain = StaticKeychain::from_annotated_entries(vec![
            ("gcr.io".to_string(), creds("first")),
            ("gcr.io".to_string(), creds("second")),
            ("ghcr.io".to_string(), creds("other")),
        ]);

        assert_eq!(keychain.len(), 2);
        assert_eq!(
            keychain.resolve("gcr.io").unwrap().username,
            "first",
            "An already-present registry entry must not be overwritten"
        );
    }

    /// Lookup applies host equivalence to stored registries
    #[test]
    fn test_static_keychain_host_equivalence() {
        let keychain =
            StaticKeychain::from_annotated_entries(vec![("https://reg.io/v1/".to_string(), creds("bot"))]);

        assert!(keychain.resolve("reg.io/team/app:latest").is_some());
        assert!(keychain.resolve("other.io/team/app").is_none());
    }

    /// The chain falls through sources in precedence order
    #[test]
    fn test_chain_precedence() {
        let specific =
            StaticKeychain::from_annotated_entries(vec![("reg.io".to_string(), creds("specific"))]);
        let fallback =
            StaticKeychain::from_annotated_entries(vec![("reg.io".to_string(), creds("fallback"))]);

        let chain = Keychain::new(vec![Arc::new(specific), Arc::new(fallback)]);

        assert_eq!(chain.resolve("reg.io/app").unwrap().username, "specific");
    }

    /// No source matching means anonymous, never an error
    #[test]
    fn test_chain_falls_through_to_anonymous() {
        let chain = Keychain::new(vec![Arc::new(StaticKeychain::default())]);
        assert!(chain.resolve("reg.io/app").is_none());
    }

    /// Mounted secrets parse into a registry-to-credentials map
    #[test]
    fn test_parse_mounted_annotated_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let secret_dir = dir.path().join("gcr-creds");
        fs::create_dir(&secret_dir).unwrap();
        fs::write(secret_dir.join("username"), "_json_key\n").unwrap();
        fs::write(secret_dir.join("password"), "s3cret").unwrap();

        let parsed = parse_mounted_annotated_secrets(
            dir.path(),
            &["gcr-creds=gcr.io".to_string()],
        )
        .unwrap();

        let mut expected = BTreeMap::new();
        expected.insert(
            "gcr.io".to_string(),
            RegistryCredentials {
                username: "_json_key".to_string(),
                password: "s3cret".to_string(),
            },
        );
        assert_eq!(parsed, expected);
    }

    /// A mount argument without '=' is rejected
    #[test]
    fn test_parse_mounted_secrets_malformed_arg() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_mounted_annotated_secrets(dir.path(), &["gcr-creds".to_string()])
            .unwrap_err();

        assert!(matches!(err, CredentialError::MalformedMountArg { .. }));
    }

    /// A named secret directory missing its password file is rejected
    #[test]
    fn test_parse_mounted_secrets_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let secret_dir = dir.path().join("gcr-creds");
        fs::create_dir(&secret_dir).unwrap();
        fs::write(secret_dir.join("username"), "bot").unwrap();

        let err = parse_mounted_annotated_secrets(dir.path(), &["gcr-creds=gcr.io".to_string()])
            .unwrap_err();

        match err {
            CredentialError::MissingSecretFile { secret, file } => {
                assert_eq!(secret, "gcr-creds");
                assert_eq!(file, "password");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    /// Docker config with explicit username/password fields
    #[test]
    fn test_parse_docker_config_explicit_fields() {
        let payload = serde_json::json!({
            "auths": {
                "reg.io": { "username": "bot", "password": "pw" }
            }
        });

        let parsed =
            parse_docker_config_json("pull-secret", payload.to_string().as_bytes()).unwrap();
        assert_eq!(parsed["reg.io"].username, "bot");
    }

    /// Docker config with a combined base64 auth field
    #[test]
    fn test_parse_docker_config_auth_field() {
        // base64("bot:pw")
        let payload = serde_json::json!({
            "auths": {
                "reg.io": { "auth": "Ym90OnB3" }
            }
        });

        let parsed =
            parse_docker_config_json("pull-secret", payload.to_string().as_bytes()).unwrap();
        assert_eq!(parsed["reg.io"].username, "bot");
        assert_eq!(parsed["reg.io"].password, "pw");
    }

    /// Invalid JSON in a docker config secret is a credential error
    #[test]
    fn test_parse_docker_config_invalid_json() {
        let err = parse_docker_config_json("pull-secret", b"not json").unwrap_err();
        assert!(matches!(err, CredentialError::InvalidDockerConfig { .. }));
    }
}
