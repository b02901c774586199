//! Verification configuration.

use serde::Deserialize;

use jarsig_manifest::name::MANIFEST_VERSION;
use jarsig_manifest::{
    AttributeName, ManifestLimits, ManifestLimitsOverrides, ParseOptions, TextEncoding,
};

use crate::algorithm::DEFAULT_DIGEST_ALGORITHMS;

fn default_max_metadata_member_bytes() -> u64 {
    8 * 1024 * 1024
}

fn default_digest_algorithms() -> Vec<String> {
    DEFAULT_DIGEST_ALGORITHMS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// How archives are verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyConfig {
    /// When false, metadata is still parsed but every entry is unsigned.
    pub verify: bool,
    pub limits: ManifestLimits,
    /// Largest signature file or signature block read into memory.
    pub max_metadata_member_bytes: u64,
    /// Manifest value encoding; `None` is UTF-8 with Latin-1 fallback.
    pub encoding: Option<TextEncoding>,
    /// Reject manifests without `Manifest-Version`.
    pub require_manifest_version: bool,
    /// Candidates when a section has no `Digest-Algorithms`.
    pub default_digest_algorithms: Vec<String>,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            verify: true,
            limits: ManifestLimits::default(),
            max_metadata_member_bytes: default_max_metadata_member_bytes(),
            encoding: None,
            require_manifest_version: false,
            default_digest_algorithms: default_digest_algorithms(),
        }
    }
}

/// Partial overrides for `VerifyConfig`, for config files.
/// Unknown keys cause deserialization to fail (deny_unknown_fields).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyConfigOverrides {
    pub verify: Option<bool>,
    pub limits: Option<ManifestLimitsOverrides>,
    pub max_metadata_member_bytes: Option<u64>,
    pub encoding: Option<TextEncoding>,
    pub require_manifest_version: Option<bool>,
    pub default_digest_algorithms: Option<Vec<String>>,
}

impl VerifyConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    /// Unparseable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let flag = |key: &str, default: bool| {
            lookup(key)
                .and_then(|v| parse_flag(&v))
                .unwrap_or(default)
        };
        Self {
            verify: flag("JARSIG_VERIFY", defaults.verify),
            limits: ManifestLimits {
                max_line_bytes: lookup("JARSIG_MAX_LINE_BYTES")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.limits.max_line_bytes),
                max_manifest_bytes: lookup("JARSIG_MAX_MANIFEST_BYTES")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.limits.max_manifest_bytes),
            },
            max_metadata_member_bytes: lookup("JARSIG_MAX_METADATA_BYTES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_metadata_member_bytes),
            encoding: lookup("JARSIG_MANIFEST_ENCODING").and_then(|v| v.parse().ok()),
            require_manifest_version: flag(
                "JARSIG_REQUIRE_MANIFEST_VERSION",
                defaults.require_manifest_version,
            ),
            default_digest_algorithms: lookup("JARSIG_DIGEST_ALGORITHMS")
                .map(|v| v.split_whitespace().map(str::to_string).collect::<Vec<_>>())
                .filter(|list| !list.is_empty())
                .unwrap_or(defaults.default_digest_algorithms),
        }
    }

    /// Apply overrides. Only `Some` values override.
    pub fn apply(self, overrides: VerifyConfigOverrides) -> Self {
        Self {
            verify: overrides.verify.unwrap_or(self.verify),
            limits: match overrides.limits {
                Some(limits) => self.limits.apply(limits),
                None => self.limits,
            },
            max_metadata_member_bytes: overrides
                .max_metadata_member_bytes
                .unwrap_or(self.max_metadata_member_bytes),
            encoding: overrides.encoding.or(self.encoding),
            require_manifest_version: overrides
                .require_manifest_version
                .unwrap_or(self.require_manifest_version),
            default_digest_algorithms: overrides
                .default_digest_algorithms
                .unwrap_or(self.default_digest_algorithms),
        }
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn with_limits(mut self, limits: ManifestLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_encoding(mut self, encoding: Option<TextEncoding>) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_max_metadata_member_bytes(mut self, max: u64) -> Self {
        self.max_metadata_member_bytes = max;
        self
    }

    pub fn with_require_manifest_version(mut self, require: bool) -> Self {
        self.require_manifest_version = require;
        self
    }

    pub fn with_default_digest_algorithms<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_digest_algorithms = names.into_iter().map(Into::into).collect();
        self
    }

    /// Options for parsing the manifest itself, chunks included.
    pub fn manifest_options(&self) -> ParseOptions {
        let options = ParseOptions::default()
            .with_limits(self.limits)
            .with_encoding(self.encoding)
            .capture_chunks();
        match AttributeName::new(MANIFEST_VERSION) {
            Ok(name) if self.require_manifest_version => options.require_version(name),
            _ => options,
        }
    }

    /// Options for signature files.
    pub fn signature_file_options(&self) -> ParseOptions {
        ParseOptions::default()
            .with_limits(self.limits)
            .with_encoding(self.encoding)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
