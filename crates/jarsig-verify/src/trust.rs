//! Pinned signer keys.
//!
//! A trust store restricts which chain roots the Ed25519 block verifier
//! accepts. Keys are identified by `sha256:<hex>` of their SPKI DER
//! encoding.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::VerifyingKey;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::{VerifyError, VerifyResult};

/// A trusted key as found in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrustedKey {
    /// Key ID (sha256:...).
    pub key_id: String,

    /// Public key (SPKI DER, Base64).
    pub public_key: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub revoked: bool,
}

/// Metadata for a trusted key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMetadata {
    pub description: Option<String>,
    pub revoked: bool,
}

/// Trust store for signer root keys.
#[derive(Debug, Clone, Default)]
pub struct TrustStore {
    keys: HashMap<String, VerifyingKey>,
    metadata: HashMap<String, KeyMetadata>,
}

impl TrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON array of [`TrustedKey`].
    pub fn from_json(json: &str) -> VerifyResult<Self> {
        let keys: Vec<TrustedKey> = serde_json::from_str(json).map_err(|e| VerifyError::Config {
            message: format!("invalid trust store: {}", e),
        })?;
        let mut store = Self::new();
        for key in &keys {
            store.add_key(key)?;
        }
        Ok(store)
    }

    /// Add a configured key, checking that its id matches its bytes.
    pub fn add_key(&mut self, key: &TrustedKey) -> VerifyResult<()> {
        let der = BASE64.decode(&key.public_key).map_err(|e| VerifyError::Config {
            message: format!("invalid base64 public key: {}", e),
        })?;
        let verifying_key = decode_verifying_key(&der)?;
        let computed_id = compute_key_id(&der);

        if computed_id != key.key_id {
            return Err(VerifyError::Config {
                message: format!(
                    "key_id mismatch: claimed {}, computed {}",
                    key.key_id, computed_id
                ),
            });
        }

        if key.revoked {
            tracing::debug!(key_id = %key.key_id, "skipping revoked key");
            self.keys.remove(&key.key_id);
        } else {
            self.keys.insert(key.key_id.clone(), verifying_key);
        }
        self.metadata.insert(
            key.key_id.clone(),
            KeyMetadata {
                description: key.description.clone(),
                revoked: key.revoked,
            },
        );
        Ok(())
    }

    /// Trust a key directly. Returns its key id.
    pub fn add_verifying_key(
        &mut self,
        key: VerifyingKey,
        description: Option<String>,
    ) -> VerifyResult<String> {
        let key_id = compute_key_id_from_key(&key)?;
        self.keys.insert(key_id.clone(), key);
        self.metadata.insert(
            key_id.clone(),
            KeyMetadata {
                description,
                revoked: false,
            },
        );
        Ok(key_id)
    }

    pub fn get_key(&self, key_id: &str) -> Option<&VerifyingKey> {
        self.keys.get(key_id)
    }

    pub fn is_trusted(&self, key: &VerifyingKey) -> bool {
        compute_key_id_from_key(key)
            .map(|id| self.keys.contains_key(&id))
            .unwrap_or(false)
    }

    pub fn get_metadata(&self, key_id: &str) -> Option<&KeyMetadata> {
        self.metadata.get(key_id)
    }

    pub fn list_keys(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.keys.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Compute key ID from public key bytes (SPKI DER).
pub fn compute_key_id(spki_bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(spki_bytes)))
}

/// Compute key ID from a VerifyingKey.
pub fn compute_key_id_from_key(key: &VerifyingKey) -> VerifyResult<String> {
    use pkcs8::EncodePublicKey;
    let doc = key.to_public_key_der().map_err(|e| VerifyError::Config {
        message: format!("failed to encode public key: {}", e),
    })?;
    Ok(compute_key_id(doc.as_bytes()))
}

fn decode_verifying_key(der: &[u8]) -> VerifyResult<VerifyingKey> {
    use pkcs8::DecodePublicKey;
    VerifyingKey::from_public_key_der(der).map_err(|e| VerifyError::Config {
        message: format!("invalid SPKI public key: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use pkcs8::EncodePublicKey;

    fn generate_trusted_key(seed: u8) -> (SigningKey, TrustedKey) {
        let signing_key = SigningKey::from_bytes(&[seed; 32]);
        let spki_der = signing_key.verifying_key().to_public_key_der().unwrap();
        let trusted = TrustedKey {
            key_id: compute_key_id(spki_der.as_bytes()),
            public_key: BASE64.encode(spki_der.as_bytes()),
            description: Some("Test key".to_string()),
            revoked: false,
        };
        (signing_key, trusted)
    }

    #[test]
    fn empty_store_trusts_nothing() {
        let store = TrustStore::new();
        let key = SigningKey::from_bytes(&[1; 32]).verifying_key();
        assert!(!store.is_trusted(&key));
        assert!(store.is_empty());
    }

    #[test]
    fn add_key_and_lookup() {
        let (signing, trusted) = generate_trusted_key(7);
        let mut store = TrustStore::new();
        store.add_key(&trusted).unwrap();
        assert!(store.is_trusted(&signing.verifying_key()));
        assert_eq!(store.list_keys(), vec![trusted.key_id.clone()]);
        assert_eq!(
            store.get_metadata(&trusted.key_id).unwrap().description.as_deref(),
            Some("Test key")
        );
    }

    #[test]
    fn key_id_mismatch_is_rejected() {
        let (_, mut trusted) = generate_trusted_key(7);
        trusted.key_id = "sha256:00".to_string();
        let mut store = TrustStore::new();
        assert!(matches!(
            store.add_key(&trusted),
            Err(VerifyError::Config { .. })
        ));
    }

    #[test]
    fn revoked_keys_are_not_trusted() {
        let (signing, mut trusted) = generate_trusted_key(9);
        trusted.revoked = true;
        let mut store = TrustStore::new();
        store.add_key(&trusted).unwrap();
        assert!(!store.is_trusted(&signing.verifying_key()));
        assert!(store.get_metadata(&trusted.key_id).unwrap().revoked);
    }

    #[test]
    fn loads_from_json() {
        let (signing, trusted) = generate_trusted_key(3);
        let json = format!(
            r#"[{{"key_id": "{}", "public_key": "{}"}}]"#,
            trusted.key_id, trusted.public_key
        );
        let store = TrustStore::from_json(&json).unwrap();
        assert!(store.is_trusted(&signing.verifying_key()));

        assert!(TrustStore::from_json("{").is_err());
    }

    #[test]
    fn direct_keys_get_stable_ids() {
        let key = SigningKey::from_bytes(&[5; 32]).verifying_key();
        let mut store = TrustStore::new();
        let id = store.add_verifying_key(key, None).unwrap();
        assert!(id.starts_with("sha256:"));
        assert_eq!(id.len(), "sha256:".len() + 64);
        assert_eq!(store.get_key(&id), Some(&key));
    }
}
