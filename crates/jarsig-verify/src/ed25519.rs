//! Ed25519 signature blocks.
//!
//! A block is a JSON document:
//!
//! ```json
//! {
//!   "format": "jarsig-ed25519/v1",
//!   "signature": "<base64 Ed25519 signature over the .SF bytes>",
//!   "certificates": [
//!     {"subject": "CN=signer", "issuer": "CN=root", "public_key": "<b64>", "issuer_signature": "<b64>"},
//!     {"subject": "CN=root", "issuer": "CN=root", "public_key": "<b64>", "issuer_signature": "<b64>"}
//!   ]
//! }
//! ```
//!
//! The first certificate holds the signing key. Each certificate is signed
//! by the key of the next one; the last is self-issued.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::certificate::{BlockError, Certificate, CertificateChain, SignatureBlockVerifier};
use crate::error::{VerifyError, VerifyResult};
use crate::trust::{compute_key_id_from_key, TrustStore};

pub const BLOCK_FORMAT: &str = "jarsig-ed25519/v1";

const CERT_DOMAIN: &str = "jarsig-cert/v1";

/// One link of the chain as serialized in the block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateEntry {
    pub subject: String,
    pub issuer: String,
    /// Raw 32-byte Ed25519 key, Base64.
    pub public_key: String,
    /// Issuer's signature over the to-be-signed bytes, Base64.
    pub issuer_signature: String,
}

impl CertificateEntry {
    /// Certificate for `subject_key`, signed by `issuer_key`.
    pub fn issue(
        subject: impl Into<String>,
        subject_key: &VerifyingKey,
        issuer: impl Into<String>,
        issuer_key: &SigningKey,
    ) -> Self {
        let subject = subject.into();
        let issuer = issuer.into();
        let public_key = BASE64.encode(subject_key.as_bytes());
        let tbs = tbs_bytes(&subject, &issuer, &public_key);
        let issuer_signature = BASE64.encode(issuer_key.sign(&tbs).to_bytes());
        Self {
            subject,
            issuer,
            public_key,
            issuer_signature,
        }
    }

    pub fn self_signed(subject: impl Into<String>, key: &SigningKey) -> Self {
        let subject = subject.into();
        Self::issue(subject.clone(), &key.verifying_key(), subject, key)
    }

    fn tbs(&self) -> Vec<u8> {
        tbs_bytes(&self.subject, &self.issuer, &self.public_key)
    }
}

fn tbs_bytes(subject: &str, issuer: &str, public_key_b64: &str) -> Vec<u8> {
    format!("{CERT_DOMAIN}\n{subject}\n{issuer}\n{public_key_b64}").into_bytes()
}

/// Serialized signature block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBlock {
    pub format: String,
    pub signature: String,
    pub certificates: Vec<CertificateEntry>,
}

impl SignatureBlock {
    /// Sign a signature file. `certificates` must start with the signer's.
    pub fn sign(
        signature_file: &[u8],
        signer: &SigningKey,
        certificates: Vec<CertificateEntry>,
    ) -> Self {
        Self {
            format: BLOCK_FORMAT.to_string(),
            signature: BASE64.encode(signer.sign(signature_file).to_bytes()),
            certificates,
        }
    }

    pub fn to_bytes(&self) -> VerifyResult<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| VerifyError::Config {
            message: format!("failed to encode signature block: {}", e),
        })
    }

    /// `None` for anything that is not a block of this format.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let block: Self = serde_json::from_slice(bytes).ok()?;
        (block.format == BLOCK_FORMAT).then_some(block)
    }
}

/// Verifies `jarsig-ed25519/v1` blocks, optionally against pinned roots.
#[derive(Debug, Clone, Default)]
pub struct Ed25519BlockVerifier {
    trust_store: Option<TrustStore>,
}

impl Ed25519BlockVerifier {
    /// Accept any chain that is internally consistent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also require the chain root to be in `store`.
    pub fn with_trust_store(store: TrustStore) -> Self {
        Self {
            trust_store: Some(store),
        }
    }

    pub fn trust_store(&self) -> Option<&TrustStore> {
        self.trust_store.as_ref()
    }
}

fn invalid(reason: impl Into<String>) -> BlockError {
    BlockError::Invalid {
        reason: reason.into(),
    }
}

fn decode_key(entry: &CertificateEntry) -> Result<VerifyingKey, BlockError> {
    let bytes = BASE64
        .decode(&entry.public_key)
        .map_err(|e| invalid(format!("{}: invalid key encoding: {}", entry.subject, e)))?;
    let raw: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| invalid(format!("{}: key must be 32 bytes", entry.subject)))?;
    VerifyingKey::from_bytes(&raw).map_err(|e| invalid(format!("{}: {}", entry.subject, e)))
}

fn decode_signature(b64: &str, what: &str) -> Result<Signature, BlockError> {
    let bytes = BASE64
        .decode(b64)
        .map_err(|e| invalid(format!("{what}: invalid signature encoding: {e}")))?;
    Signature::from_slice(&bytes).map_err(|e| invalid(format!("{what}: {e}")))
}

impl SignatureBlockVerifier for Ed25519BlockVerifier {
    fn verify(
        &self,
        block_name: &str,
        signature_file: &[u8],
        block: &[u8],
    ) -> Result<Option<CertificateChain>, BlockError> {
        let Some(block) = SignatureBlock::from_bytes(block) else {
            tracing::warn!(block = %block_name, "ignoring unrecognised signature block");
            return Ok(None);
        };
        if block.certificates.is_empty() {
            return Err(invalid("no certificates"));
        }

        let keys = block
            .certificates
            .iter()
            .map(decode_key)
            .collect::<Result<Vec<_>, _>>()?;

        let signature = decode_signature(&block.signature, block_name)?;
        keys[0]
            .verify_strict(signature_file, &signature)
            .map_err(|_| invalid("signature does not match signature file"))?;

        let last = block.certificates.len() - 1;
        for (i, entry) in block.certificates.iter().enumerate() {
            let issuer_key = if i == last {
                if entry.subject != entry.issuer {
                    return Err(invalid(format!("chain root {} is not self-issued", entry.subject)));
                }
                &keys[i]
            } else {
                let issuer = &block.certificates[i + 1];
                if entry.issuer != issuer.subject {
                    return Err(invalid(format!(
                        "{} names issuer {} but is followed by {}",
                        entry.subject, entry.issuer, issuer.subject
                    )));
                }
                &keys[i + 1]
            };
            let sig = decode_signature(&entry.issuer_signature, &entry.subject)?;
            issuer_key
                .verify_strict(&entry.tbs(), &sig)
                .map_err(|_| invalid(format!("bad issuer signature on {}", entry.subject)))?;
        }

        if let Some(store) = &self.trust_store {
            let root = &keys[last];
            if !store.is_trusted(root) {
                let key_id = compute_key_id_from_key(root)
                    .unwrap_or_else(|_| block.certificates[last].public_key.clone());
                return Err(BlockError::UntrustedSigner { key_id });
            }
        }

        let certificates = block
            .certificates
            .iter()
            .zip(&keys)
            .map(|(entry, key)| {
                let encoded = serde_json::to_vec(entry)
                    .map_err(|e| invalid(format!("{}: {}", entry.subject, e)))?;
                Ok(Certificate {
                    subject: entry.subject.clone(),
                    issuer: entry.issuer.clone(),
                    public_key: key.as_bytes().to_vec(),
                    encoded,
                })
            })
            .collect::<Result<Vec<_>, BlockError>>()?;

        tracing::debug!(block = %block_name, signer = %certificates[0].subject, "signature block verified");
        Ok(Some(CertificateChain::new(certificates)))
    }
}
