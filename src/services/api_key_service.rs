use std::sync::Arc;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::database::models::ApiKeyEntity;
use crate::database::{
    CreateOptions, DatabaseOptions, DocumentStore, EntityMeta, FindAllOptions, FindOneOptions, ManyOptions,
    Repository, RepositoryError, UpdateOptions,
};
use crate::filter::Filter;

const KEY_LENGTH: usize = 25;
const SECRET_LENGTH: usize = 50;
const ENCRYPTION_KEY_LENGTH: usize = 32;
const PASSPHRASE_LENGTH: usize = 16;
const NONCE_SIZE: usize = 12;

/// Credentials handed out once at creation or rotation. Only the hash of
/// `key:secret` is kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyCreated {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub key: String,
    pub secret: String,
    pub encryption_key: String,
    pub passphrase: String,
}

/// Fixed credentials, used by the seeder.
#[derive(Debug, Clone)]
pub struct RawApiKey {
    pub name: String,
    pub description: Option<String>,
    pub key: String,
    pub secret: String,
    pub encryption_key: String,
    pub passphrase: String,
}

/// What a client seals into the `x-api-key` header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyPayload {
    pub key: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub hash: String,
}

#[derive(Clone)]
pub struct ApiKeyService {
    repository: Repository<ApiKeyEntity>,
}

impl ApiKeyService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { repository: Repository::new(store) }
    }

    pub async fn find_all(&self, filter: Filter, options: FindAllOptions) -> Result<Vec<ApiKeyEntity>, RepositoryError> {
        self.repository.find_all(filter, options).await
    }

    pub async fn find_one_by_id(&self, id: Uuid) -> Result<Option<ApiKeyEntity>, RepositoryError> {
        self.repository.find_one_by_id(id, FindOneOptions::default()).await
    }

    pub async fn find_one(&self, filter: Filter) -> Result<Option<ApiKeyEntity>, RepositoryError> {
        self.repository.find_one(filter, FindOneOptions::default()).await
    }

    pub async fn find_one_by_key(&self, key: &str) -> Result<Option<ApiKeyEntity>, RepositoryError> {
        self.find_one(Filter::eq("key", key)).await
    }

    pub async fn find_one_by_active_key(&self, key: &str) -> Result<Option<ApiKeyEntity>, RepositoryError> {
        self.find_one(Filter::eq("key", key).and(Filter::eq("isActive", true))).await
    }

    pub async fn get_total(&self, filter: Filter) -> Result<u64, RepositoryError> {
        self.repository.get_total(filter, DatabaseOptions::default()).await
    }

    pub async fn create(&self, name: &str, description: Option<String>) -> Result<ApiKeyCreated, RepositoryError> {
        self.create_raw(RawApiKey {
            name: name.to_string(),
            description,
            key: create_key(),
            secret: create_secret(),
            encryption_key: create_encryption_key(),
            passphrase: create_passphrase(),
        })
        .await
    }

    pub async fn create_raw(&self, raw: RawApiKey) -> Result<ApiKeyCreated, RepositoryError> {
        let entity = ApiKeyEntity {
            meta: EntityMeta::new(),
            name: raw.name,
            description: raw.description,
            hash: create_hash_api_key(&raw.key, &raw.secret),
            key: raw.key.clone(),
            encryption_key: raw.encryption_key.clone(),
            passphrase: raw.passphrase.clone(),
            is_active: true,
        };
        let created = self.repository.create(&entity, CreateOptions::default()).await?;
        Ok(ApiKeyCreated {
            id: created.meta.id,
            key: raw.key,
            secret: raw.secret,
            encryption_key: raw.encryption_key,
            passphrase: raw.passphrase,
        })
    }

    pub async fn update_name_and_description(
        &self,
        id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<Option<ApiKeyEntity>, RepositoryError> {
        self.repository
            .update_one_by_id(id, &json!({ "name": name, "description": description }), UpdateOptions::default())
            .await
    }

    /// Rotates the secret. The key, encryption key and passphrase stay.
    pub async fn update_hash_by_id(&self, id: Uuid) -> Result<Option<ApiKeyCreated>, RepositoryError> {
        let Some(current) = self.find_one_by_id(id).await? else {
            return Ok(None);
        };
        let secret = create_secret();
        let hash = create_hash_api_key(&current.key, &secret);
        let updated = self
            .repository
            .update_one_by_id(id, &json!({ "hash": hash }), UpdateOptions::default())
            .await?;
        Ok(updated.map(|api_key| ApiKeyCreated {
            id: api_key.meta.id,
            key: api_key.key,
            secret,
            encryption_key: api_key.encryption_key,
            passphrase: api_key.passphrase,
        }))
    }

    pub async fn active(&self, id: Uuid) -> Result<Option<ApiKeyEntity>, RepositoryError> {
        self.repository
            .update_one_by_id(id, &json!({ "isActive": true }), UpdateOptions::default())
            .await
    }

    pub async fn inactive(&self, id: Uuid) -> Result<Option<ApiKeyEntity>, RepositoryError> {
        self.repository
            .update_one_by_id(id, &json!({ "isActive": false }), UpdateOptions::default())
            .await
    }

    pub async fn delete_one_by_id(&self, id: Uuid) -> Result<Option<ApiKeyEntity>, RepositoryError> {
        self.repository.delete_one_by_id(id, UpdateOptions::default()).await
    }

    pub async fn delete_many(&self, filter: Filter) -> Result<bool, RepositoryError> {
        self.repository.delete_many(filter, ManyOptions::default()).await
    }
}

fn random_string(length: usize) -> String {
    Alphanumeric.sample_string(&mut rand::rng(), length)
}

pub fn create_key() -> String {
    random_string(KEY_LENGTH)
}

pub fn create_secret() -> String {
    random_string(SECRET_LENGTH)
}

pub fn create_encryption_key() -> String {
    random_string(ENCRYPTION_KEY_LENGTH)
}

pub fn create_passphrase() -> String {
    random_string(PASSPHRASE_LENGTH)
}

/// Hex sha256 of `key:secret`.
pub fn create_hash_api_key(key: &str, secret: &str) -> String {
    let digest = Sha256::digest(format!("{}:{}", key, secret).as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn validate_hash_api_key(hash_from_request: &str, hash: &str) -> bool {
    hash_from_request.len() == hash.len()
        && hash_from_request
            .bytes()
            .zip(hash.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

#[derive(Debug, thiserror::Error)]
pub enum SealError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("invalid seal key length")]
    KeyLength,

    #[error("encryption failed")]
    Encrypt,
}

/// AES-256 key bound to both the stored encryption key and passphrase.
fn cipher(encryption_key: &str, passphrase: &str) -> Result<Aes256Gcm, SealError> {
    let key = <Sha256 as Digest>::new()
        .chain_update(encryption_key.as_bytes())
        .chain_update(b":")
        .chain_update(passphrase.as_bytes())
        .finalize();
    Aes256Gcm::new_from_slice(&key).map_err(|_| SealError::KeyLength)
}

/// `base64url(nonce || AES-256-GCM(json))` with a random 96-bit nonce.
pub fn seal_api_key_payload(
    payload: &ApiKeyPayload,
    encryption_key: &str,
    passphrase: &str,
) -> Result<String, SealError> {
    let json = serde_json::to_vec(payload)?;
    let nonce: [u8; NONCE_SIZE] = rand::random();
    let ciphertext = cipher(encryption_key, passphrase)?
        .encrypt(Nonce::from_slice(&nonce), json.as_slice())
        .map_err(|_| SealError::Encrypt)?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(URL_SAFE_NO_PAD.encode(sealed))
}

/// `None` when the seal is malformed, does not decrypt with this key, or the
/// payload lacks a field.
pub fn open_api_key_payload(sealed: &str, encryption_key: &str, passphrase: &str) -> Option<ApiKeyPayload> {
    let bytes = URL_SAFE_NO_PAD.decode(sealed.as_bytes()).ok()?;
    if bytes.len() <= NONCE_SIZE {
        return None;
    }
    let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);
    let json = cipher(encryption_key, passphrase)
        .ok()?
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .ok()?;
    serde_json::from_slice(&json).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;

    fn payload() -> ApiKeyPayload {
        ApiKeyPayload {
            key: "key".to_string(),
            timestamp: 1_700_000_000_000,
            hash: create_hash_api_key("key", "secret"),
        }
    }

    #[test]
    fn test_hash_is_stable_hex() {
        let hash = create_hash_api_key("key", "secret");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, create_hash_api_key("key", "secret"));
        assert!(validate_hash_api_key(&hash, &hash));
        assert!(!validate_hash_api_key(&create_hash_api_key("key", "other"), &hash));
        assert!(!validate_hash_api_key("short", &hash));
    }

    #[test]
    fn test_seal_and_open() {
        let sealed = seal_api_key_payload(&payload(), "encryption", "passphrase").unwrap();
        assert_eq!(open_api_key_payload(&sealed, "encryption", "passphrase"), Some(payload()));
        assert_eq!(open_api_key_payload(&sealed, "encryption", "wrong"), None);
        assert_eq!(open_api_key_payload(&sealed, "other", "passphrase"), None);
        assert_eq!(open_api_key_payload("garbage", "encryption", "passphrase"), None);
        assert_eq!(open_api_key_payload("", "encryption", "passphrase"), None);
    }

    #[test]
    fn test_sealed_payload_is_not_readable() {
        let sealed = seal_api_key_payload(&payload(), "encryption", "passphrase").unwrap();
        let bytes = URL_SAFE_NO_PAD.decode(sealed.as_bytes()).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(!text.contains("timestamp"));
        assert!(!text.contains(&payload().hash));
        assert!(serde_json::from_slice::<ApiKeyPayload>(&bytes[NONCE_SIZE..]).is_err());

        // Fresh nonce per seal.
        let again = seal_api_key_payload(&payload(), "encryption", "passphrase").unwrap();
        assert_ne!(sealed, again);
    }

    #[test]
    fn test_open_rejects_missing_fields() {
        let nonce = [7u8; NONCE_SIZE];
        let ciphertext = cipher("e", "p")
            .unwrap()
            .encrypt(Nonce::from_slice(&nonce), &br#"{"key":"key","timestamp":1}"#[..])
            .unwrap();
        let sealed = URL_SAFE_NO_PAD.encode([nonce.as_slice(), ciphertext.as_slice()].concat());
        assert_eq!(open_api_key_payload(&sealed, "e", "p"), None);
    }

    #[tokio::test]
    async fn test_create_rotate_and_lookup() {
        let service = ApiKeyService::new(Arc::new(MemoryStore::new()));
        let created = service.create("client", None).await.unwrap();
        assert_eq!(created.key.len(), KEY_LENGTH);
        assert_eq!(created.secret.len(), SECRET_LENGTH);

        let stored = service.find_one_by_active_key(&created.key).await.unwrap().unwrap();
        assert_eq!(stored.hash, create_hash_api_key(&created.key, &created.secret));

        let rotated = service.update_hash_by_id(created.id).await.unwrap().unwrap();
        assert_ne!(rotated.secret, created.secret);
        let stored = service.find_one_by_key(&created.key).await.unwrap().unwrap();
        assert_eq!(stored.hash, create_hash_api_key(&created.key, &rotated.secret));

        service.inactive(created.id).await.unwrap();
        assert!(service.find_one_by_active_key(&created.key).await.unwrap().is_none());
        assert!(service.update_hash_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }
}
