use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use anyhow::Context;
use rand::rngs::OsRng;
use std::sync::Arc;
use tracing::error;

use crate::config::HashingConfig;

/// Argon2id hasher with configured cost. Verification reads the cost back
/// from the stored PHC string, so old hashes keep verifying after a change.
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
    // hashed with the configured cost; verified against when no user matches
    dummy_hash: Arc<str>,
}

impl PasswordHasher {
    pub fn new(cfg: &HashingConfig) -> anyhow::Result<Self> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 params: {e}"))?;
        let mut hasher = Self {
            params,
            dummy_hash: Arc::from(""),
        };
        hasher.dummy_hash = Arc::from(hasher.hash("userauth-dummy-password")?);
        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    pub fn verify(&self, plain: &str, hash: &str) -> anyhow::Result<bool> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            anyhow::anyhow!(e.to_string())
        })?;
        Ok(self
            .argon2()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }

    /// `hash` on the blocking pool.
    pub async fn hash_blocking(&self, plain: String) -> anyhow::Result<String> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&plain))
            .await
            .context("hash task panicked")?
    }

    /// Spend the same work as a real verification, for logins whose email
    /// matched nobody.
    pub async fn verify_dummy_blocking(&self, plain: String) {
        let hash = self.dummy_hash.to_string();
        if let Err(e) = self.verify_blocking(plain, hash).await {
            error!(error = %e, "dummy verify failed");
        }
    }

    /// `verify` on the blocking pool.
    pub async fn verify_blocking(&self, plain: String, hash: String) -> anyhow::Result<bool> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&plain, &hash))
            .await
            .context("verify task panicked")?
    }
}

#[cfg(test)]
pub(crate) fn test_hasher() -> PasswordHasher {
    PasswordHasher::new(&HashingConfig {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
    })
    .expect("minimal argon2 params are valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hasher = test_hasher();
        let password = "Secur3P@ssw0rd!";
        let hash = hasher.hash(password).expect("hashing should succeed");
        assert!(hasher.verify(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hasher = test_hasher();
        let hash = hasher.hash("correct-horse-battery-staple").expect("hashing should succeed");
        assert!(!hasher.verify("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn same_password_gets_fresh_salt() {
        let hasher = test_hasher();
        let a = hasher.hash("pw123").unwrap();
        let b = hasher.hash("pw123").unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("$argon2id$"));
        assert!(!a.contains("pw123"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = test_hasher().verify("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn hashes_from_other_params_still_verify() {
        let strong = PasswordHasher::new(&HashingConfig {
            memory_kib: 64,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        let hash = strong.hash("pw123").unwrap();
        assert!(test_hasher().verify("pw123", &hash).unwrap());
    }

    #[test]
    fn rejects_impossible_params() {
        let res = PasswordHasher::new(&HashingConfig {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        });
        assert!(res.is_err());
    }

    #[test]
    fn dummy_hash_uses_configured_cost() {
        let hasher = test_hasher();
        assert!(hasher.dummy_hash.starts_with("$argon2id$v=19$m=8,t=1,p=1$"));
        assert!(hasher.verify("anything", &hasher.dummy_hash).is_ok());
    }

    #[tokio::test]
    async fn dummy_hash_rejects_ordinary_passwords() {
        let hasher = test_hasher();
        let dummy = hasher.dummy_hash.to_string();
        assert!(!hasher.verify_blocking("pw123".into(), dummy).await.unwrap());
        hasher.verify_dummy_blocking("pw123".into()).await;
    }

    #[tokio::test]
    async fn blocking_variants_agree() {
        let hasher = test_hasher();
        let hash = hasher.hash_blocking("pw123".into()).await.unwrap();
        assert!(hasher.verify_blocking("pw123".into(), hash.clone()).await.unwrap());
        assert!(!hasher.verify_blocking("nope".into(), hash).await.unwrap());
    }
}
