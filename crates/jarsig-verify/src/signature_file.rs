//! Signature files (`META-INF/*.SF`).

use jarsig_manifest::name::{CREATED_BY, SIGNATURE_VERSION};
use jarsig_manifest::{Attributes, Manifest, ManifestResult, ParseOptions};

/// A parsed signature file: main attributes carrying manifest digests, and
/// one section per attested entry carrying the digest of that entry's
/// manifest section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureFile {
    name: String,
    body: Manifest,
}

impl SignatureFile {
    /// Parse with the manifest grammar. Chunks are never captured.
    pub fn parse(name: impl Into<String>, bytes: &[u8], options: &ParseOptions) -> ManifestResult<Self> {
        let mut options = options.clone();
        options.capture_chunks = false;
        options.required_version = None;
        Ok(Self {
            name: name.into(),
            body: Manifest::parse_with(bytes, &options)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Files without `Signature-Version` do not count as signatures.
    pub fn has_version(&self) -> bool {
        self.body.main_attributes().contains(SIGNATURE_VERSION)
    }

    pub fn created_by(&self) -> Option<&str> {
        self.body.main_attributes().get(CREATED_BY)
    }

    /// Produced by Netscape signtool, which hashed sections differently.
    ///
    /// For these files the main-attributes check is skipped, the whole
    /// manifest digest is stored under `<alg>-Digest`, and section digests
    /// were computed without the trailing blank line's second newline.
    pub fn is_signtool(&self) -> bool {
        self.created_by()
            .is_some_and(|created| created.contains("signtool"))
    }

    pub fn main_attributes(&self) -> &Attributes {
        self.body.main_attributes()
    }

    /// Section for an attested entry.
    pub fn section(&self, entry: &str) -> Option<&Attributes> {
        self.body.attributes(entry)
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &Attributes)> {
        self.body.entries().map(|(name, attrs)| (name.as_str(), attrs))
    }

    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.body.entry_names()
    }
}
