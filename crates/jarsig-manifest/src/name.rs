//! Attribute names (keys).
//!
//! Names are ASCII tokens of 1 to 70 characters from `[A-Za-z0-9_-]`.
//! Comparison, ordering and hashing ignore ASCII case while the original
//! spelling is kept for writing.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::InvalidAttributeName;

/// Maximum length of an attribute name in bytes.
pub const MAX_NAME_LEN: usize = 70;

pub const MANIFEST_VERSION: &str = "Manifest-Version";
pub const SIGNATURE_VERSION: &str = "Signature-Version";
pub const NAME: &str = "Name";
pub const CREATED_BY: &str = "Created-By";
pub const DIGEST_ALGORITHMS: &str = "Digest-Algorithms";

/// Suffix of per-entry content digests (`SHA-256-Digest`).
pub const DIGEST_SUFFIX: &str = "-Digest";
/// Suffix of whole-manifest digests in signature files.
pub const DIGEST_MANIFEST_SUFFIX: &str = "-Digest-Manifest";
/// Suffix of main-section digests in signature files.
pub const DIGEST_MANIFEST_MAIN_SUFFIX: &str = "-Digest-Manifest-Main-Attributes";

/// A validated, case-insensitive attribute key.
#[derive(Clone)]
pub struct AttributeName(String);

impl AttributeName {
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidAttributeName> {
        let name = name.into();
        validate(&name)?;
        Ok(Self(name))
    }

    /// Name as originally spelled.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn eq_ignore_case(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

fn validate(name: &str) -> Result<(), InvalidAttributeName> {
    if name.is_empty() {
        return Err(InvalidAttributeName::Empty);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(InvalidAttributeName::TooLong {
            len: name.len(),
            max: MAX_NAME_LEN,
        });
    }
    if let Some(ch) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(InvalidAttributeName::InvalidChar {
            name: name.to_string(),
            ch,
        });
    }
    Ok(())
}

impl PartialEq for AttributeName {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for AttributeName {}

impl Hash for AttributeName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
        state.write_u8(0xff);
    }
}

impl Ord for AttributeName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .bytes()
            .map(|b| b.to_ascii_lowercase())
            .cmp(other.0.bytes().map(|b| b.to_ascii_lowercase()))
    }
}

impl PartialOrd for AttributeName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for AttributeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl fmt::Display for AttributeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AttributeName {
    type Err = InvalidAttributeName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<&str> for AttributeName {
    type Error = InvalidAttributeName;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for AttributeName {
    type Error = InvalidAttributeName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl AsRef<str> for AttributeName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
