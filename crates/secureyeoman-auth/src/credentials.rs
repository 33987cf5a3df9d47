//! Credential verification: the admin password and API keys.
//!
//! The admin password is stored as an Argon2id PHC hash; verification is
//! bounded-time by construction. API keys are 256-bit random values stored
//! only as a SHA-256 hash plus a short display prefix.

use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use secureyeoman_core::{ApiKeyId, RoleId, Timestamp};
use secureyeoman_crypto::{ContentHash, generate_api_key};
use secureyeoman_storage::{KvStore, ScopedKvStore};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

const NS_API_KEYS: &str = "auth:api_keys";

// ---------------------------------------------------------------------------
// Admin credential
// ---------------------------------------------------------------------------

/// The built-in admin principal's stored credential.
#[derive(Clone)]
pub struct AdminCredential {
    phc_hash: String,
}

impl AdminCredential {
    /// Wrap an existing Argon2id PHC hash (from configuration).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Hashing`] if the string is not a valid PHC hash.
    pub fn from_phc_hash(phc_hash: impl Into<String>) -> AuthResult<Self> {
        let phc_hash = phc_hash.into();
        PasswordHash::new(&phc_hash).map_err(|e| AuthError::Hashing(e.to_string()))?;
        Ok(Self { phc_hash })
    }

    /// Hash a plaintext password (setup path).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Hashing`] if hashing fails.
    pub fn hash_password(password: &str) -> AuthResult<Self> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;
        Ok(Self {
            phc_hash: hash.to_string(),
        })
    }

    /// The stored PHC hash string.
    #[must_use]
    pub fn phc_hash(&self) -> &str {
        &self.phc_hash
    }

    /// Verify a supplied password.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] on mismatch.
    pub fn verify(&self, password: &str) -> AuthResult<()> {
        let parsed =
            PasswordHash::new(&self.phc_hash).map_err(|e| AuthError::Hashing(e.to_string()))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| AuthError::InvalidCredentials)
    }
}

impl std::fmt::Debug for AdminCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredential").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// API keys
// ---------------------------------------------------------------------------

/// A stored API key record. The plaintext is never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    /// Unique record identifier.
    pub id: ApiKeyId,
    /// Human-assigned name.
    pub name: String,
    /// SHA-256 of the plaintext key.
    pub key_hash: ContentHash,
    /// Display prefix (`sy_` plus the first few characters).
    pub prefix: String,
    /// Role this key acts as.
    pub role: RoleId,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last successful use, if any.
    #[serde(default)]
    pub last_used_at: Option<Timestamp>,
}

/// Result of creating an API key: the record plus the one-time plaintext.
#[derive(Debug)]
pub struct CreatedApiKey {
    /// The persisted record.
    pub record: ApiKeyRecord,
    /// The plaintext key. Shown to the creator exactly once.
    pub plaintext: String,
}

/// Persistent store of API keys, indexed by key hash.
pub struct ApiKeyStore {
    store: ScopedKvStore,
}

impl ApiKeyStore {
    /// Create a store over the given KV backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace binding fails.
    pub fn new(store: Arc<dyn KvStore>) -> AuthResult<Self> {
        let store = ScopedKvStore::new(store, NS_API_KEYS)
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        Ok(Self { store })
    }

    /// Create and persist a new API key with the given name and role.
    ///
    /// # Errors
    ///
    /// Returns an error if persistence fails.
    pub async fn create(&self, name: impl Into<String>, role: RoleId) -> AuthResult<CreatedApiKey> {
        let material = generate_api_key();
        let record = ApiKeyRecord {
            id: ApiKeyId::new(),
            name: name.into(),
            key_hash: material.hash,
            prefix: material.prefix,
            role,
            created_at: Timestamp::now(),
            last_used_at: None,
        };
        self.store
            .set_json(&record.key_hash.to_hex(), &record)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        Ok(CreatedApiKey {
            record,
            plaintext: material.plaintext,
        })
    }

    /// Look up a key by its plaintext, updating `last_used_at` on hit.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] if no key matches.
    pub async fn lookup(&self, plaintext: &str) -> AuthResult<ApiKeyRecord> {
        let hash = ContentHash::hash(plaintext.as_bytes());
        let mut record: ApiKeyRecord = self
            .store
            .get_json(&hash.to_hex())
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?
            .ok_or(AuthError::InvalidCredentials)?;
        record.last_used_at = Some(Timestamp::now());
        self.store
            .set_json(&hash.to_hex(), &record)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        Ok(record)
    }

    /// List all key records (hashes and prefixes only).
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn list(&self) -> AuthResult<Vec<ApiKeyRecord>> {
        let keys = self
            .store
            .list_keys()
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(record) = self
                .store
                .get_json::<ApiKeyRecord>(&key)
                .await
                .map_err(|e| AuthError::Storage(e.to_string()))?
            {
                records.push(record);
            }
        }
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    /// Revoke a key by record id. Returns `true` if a key was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn revoke(&self, id: ApiKeyId) -> AuthResult<bool> {
        for record in self.list().await? {
            if record.id == id {
                return self
                    .store
                    .delete(&record.key_hash.to_hex())
                    .await
                    .map_err(|e| AuthError::Storage(e.to_string()));
            }
        }
        Ok(false)
    }
}

impl std::fmt::Debug for ApiKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secureyeoman_storage::MemoryKvStore;

    #[test]
    fn test_password_round_trip() {
        let cred = AdminCredential::hash_password("test-admin-password-32chars!!").unwrap();
        assert!(cred.verify("test-admin-password-32chars!!").is_ok());
        assert!(matches!(
            cred.verify("wrong"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_phc_hash_survives_reload() {
        let cred = AdminCredential::hash_password("hunter2hunter2hunter2").unwrap();
        let reloaded = AdminCredential::from_phc_hash(cred.phc_hash()).unwrap();
        assert!(reloaded.verify("hunter2hunter2hunter2").is_ok());
    }

    #[test]
    fn test_bad_phc_hash_rejected() {
        assert!(AdminCredential::from_phc_hash("not-a-hash").is_err());
    }

    #[tokio::test]
    async fn test_api_key_create_and_lookup() {
        let store = ApiKeyStore::new(Arc::new(MemoryKvStore::new())).unwrap();
        let role = RoleId::new();
        let created = store.create("ci-bot", role).await.unwrap();

        assert!(created.plaintext.starts_with("sy_"));
        let found = store.lookup(&created.plaintext).await.unwrap();
        assert_eq!(found.id, created.record.id);
        assert_eq!(found.role, role);
        assert!(found.last_used_at.is_some());
    }

    #[tokio::test]
    async fn test_api_key_unknown_rejected() {
        let store = ApiKeyStore::new(Arc::new(MemoryKvStore::new())).unwrap();
        assert!(matches!(
            store.lookup("sy_deadbeef").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_api_key_revoke() {
        let store = ApiKeyStore::new(Arc::new(MemoryKvStore::new())).unwrap();
        let created = store.create("temp", RoleId::new()).await.unwrap();
        assert!(store.revoke(created.record.id).await.unwrap());
        assert!(store.lookup(&created.plaintext).await.is_err());
        assert!(!store.revoke(created.record.id).await.unwrap());
    }
}
