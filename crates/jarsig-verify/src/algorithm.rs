//! Digest algorithm registry.
//!
//! A fixed set of algorithms, looked up by the names manifests use
//! (`SHA`, `SHA1`, `SHA-256`, ...). Anything else is an
//! [`UnsupportedAlgorithm`], which callers skip.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

use jarsig_manifest::name::DIGEST_ALGORITHMS;
use jarsig_manifest::Attributes;

/// Algorithms tried when a section has no `Digest-Algorithms` attribute.
pub const DEFAULT_DIGEST_ALGORITHMS: &[&str] = &["SHA", "SHA1"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

/// A digest name with no implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported digest algorithm: {0}")]
pub struct UnsupportedAlgorithm(pub String);

impl DigestAlgorithm {
    /// Resolve a manifest algorithm name.
    pub fn from_name(name: &str) -> Result<Self, UnsupportedAlgorithm> {
        match name.to_ascii_uppercase().as_str() {
            "SHA" | "SHA1" | "SHA-1" => Ok(Self::Sha1),
            "SHA-256" | "SHA256" => Ok(Self::Sha256),
            "SHA-384" | "SHA384" => Ok(Self::Sha384),
            "SHA-512" | "SHA512" => Ok(Self::Sha512),
            _ => Err(UnsupportedAlgorithm(name.to_string())),
        }
    }

    /// Canonical name, as written by signers.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        }
    }

    pub fn output_len(&self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    pub fn hasher(&self) -> EntryHasher {
        let inner: Box<dyn HashState> = match self {
            Self::Sha1 => Box::new(Sha1::new()),
            Self::Sha256 => Box::new(Sha256::new()),
            Self::Sha384 => Box::new(Sha384::new()),
            Self::Sha512 => Box::new(Sha512::new()),
        };
        EntryHasher {
            algorithm: *self,
            inner,
        }
    }

    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        let mut hasher = self.hasher();
        hasher.update(data);
        hasher.finalize()
    }

    /// Base64 digest as stored in manifests.
    pub fn digest_base64(&self, data: &[u8]) -> String {
        BASE64.encode(self.digest(data))
    }
}

trait HashState: Send {
    fn update(&mut self, data: &[u8]);
    fn finalize(self: Box<Self>) -> Vec<u8>;
}

impl<D: Digest + Send> HashState for D {
    fn update(&mut self, data: &[u8]) {
        Digest::update(self, data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        Digest::finalize(*self).to_vec()
    }
}

/// Running digest for one entry.
pub struct EntryHasher {
    algorithm: DigestAlgorithm,
    inner: Box<dyn HashState>,
}

impl EntryHasher {
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    pub fn finalize(self) -> Vec<u8> {
        self.inner.finalize()
    }
}

impl std::fmt::Debug for EntryHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryHasher")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Candidate algorithm names for a section, in preference order.
pub fn candidate_names<'a>(attrs: &'a Attributes, defaults: &'a [String]) -> Vec<&'a str> {
    match attrs.get(DIGEST_ALGORITHMS) {
        Some(list) => list.split_whitespace().collect(),
        None => defaults.iter().map(String::as_str).collect(),
    }
}

/// First candidate that has both a `<alg><suffix>` value and an implementation.
pub fn select_digest<'a>(
    attrs: &'a Attributes,
    suffix: &str,
    defaults: &[String],
) -> Option<(DigestAlgorithm, &'a str)> {
    for name in candidate_names(attrs, defaults) {
        let Some(value) = attrs.get(&format!("{name}{suffix}")) else {
            continue;
        };
        match DigestAlgorithm::from_name(name) {
            Ok(algorithm) => return Some((algorithm, value)),
            Err(e) => {
                tracing::debug!(error = %e, "skipping digest candidate");
            }
        }
    }
    None
}

/// Decode a stored digest. Undecodable values can never match.
pub fn decode_digest(value: &str) -> Option<Vec<u8>> {
    BASE64.decode(value.trim()).ok()
}

/// Constant-time comparison of a computed digest with a stored value.
pub fn digest_matches(computed: &[u8], stored: &str) -> bool {
    let Some(expected) = decode_digest(stored) else {
        return false;
    };
    if expected.len() != computed.len() {
        return false;
    }
    expected
        .iter()
        .zip(computed)
        .fold(0_u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
