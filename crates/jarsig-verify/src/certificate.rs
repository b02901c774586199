//! Certificates and the signature-block verification capability.

use std::fmt;

/// One certificate of a signer's chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Certificate {
    pub subject: String,
    pub issuer: String,
    /// Raw public key bytes.
    pub public_key: Vec<u8>,
    /// Certificate bytes as carried in the signature block.
    pub encoded: Vec<u8>,
}

impl Certificate {
    pub fn is_self_issued(&self) -> bool {
        self.subject == self.issuer
    }
}

/// Ordered trust path, signer first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CertificateChain(Vec<Certificate>);

impl CertificateChain {
    pub fn new(certificates: Vec<Certificate>) -> Self {
        Self(certificates)
    }

    /// The certificate whose key signed the signature file.
    pub fn signer(&self) -> Option<&Certificate> {
        self.0.first()
    }

    pub fn root(&self) -> Option<&Certificate> {
        self.0.last()
    }

    pub fn certificates(&self) -> &[Certificate] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CertificateChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subjects: Vec<&str> = self.0.iter().map(|c| c.subject.as_str()).collect();
        write!(f, "[{}]", subjects.join(" <- "))
    }
}

/// Why a signature block was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockError {
    /// The signature or a certificate link does not verify.
    #[error("signature block invalid: {reason}")]
    Invalid { reason: String },

    /// Chain is valid but its root is not trusted.
    #[error("signer not trusted: {key_id}")]
    UntrustedSigner { key_id: String },
}

/// Validates a signature block against its signature file.
///
/// `Ok(None)` means the block is not something this verifier understands
/// (unknown format, unparseable); the signature file then counts as not
/// signed, which is not an error. `Err` means the block was understood and
/// the check failed.
pub trait SignatureBlockVerifier: Send + Sync {
    fn verify(
        &self,
        block_name: &str,
        signature_file: &[u8],
        block: &[u8],
    ) -> Result<Option<CertificateChain>, BlockError>;
}
