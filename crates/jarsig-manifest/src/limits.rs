use serde::Deserialize;
use std::io::Read;

use crate::error::{ErrorCode, ManifestError, ManifestResult};
use crate::name::AttributeName;
use crate::text::TextEncoding;

/// Resource limits for manifest parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestLimits {
    /// Longest accepted physical line, terminator excluded.
    pub max_line_bytes: usize,
    /// Largest accepted manifest when read from a stream.
    pub max_manifest_bytes: u64,
}

impl Default for ManifestLimits {
    fn default() -> Self {
        Self {
            max_line_bytes: 64 * 1024,
            max_manifest_bytes: 8_u64 * 1024 * 1024,
        }
    }
}

/// Partial overrides for `ManifestLimits`, for config files.
/// Unknown keys cause deserialization to fail (deny_unknown_fields).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestLimitsOverrides {
    pub max_line_bytes: Option<usize>,
    pub max_manifest_bytes: Option<u64>,
}

impl ManifestLimits {
    /// Apply overrides onto these limits. Only `Some` values override.
    pub fn apply(self, overrides: ManifestLimitsOverrides) -> Self {
        Self {
            max_line_bytes: overrides.max_line_bytes.unwrap_or(self.max_line_bytes),
            max_manifest_bytes: overrides
                .max_manifest_bytes
                .unwrap_or(self.max_manifest_bytes),
        }
    }
}

/// Options for a single parse.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub limits: ManifestLimits,
    /// Encoding for attribute values; `None` means UTF-8 with Latin-1 fallback.
    pub encoding: Option<TextEncoding>,
    /// Keep each section's raw bytes for digest verification.
    pub capture_chunks: bool,
    /// Main attribute that must be present, e.g. `Manifest-Version`.
    pub required_version: Option<AttributeName>,
}

impl ParseOptions {
    pub fn with_limits(mut self, limits: ManifestLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_encoding(mut self, encoding: Option<TextEncoding>) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn capture_chunks(mut self) -> Self {
        self.capture_chunks = true;
        self
    }

    pub fn require_version(mut self, name: AttributeName) -> Self {
        self.required_version = Some(name);
        self
    }
}

/// A reader that limits the total number of bytes read and fails explicitly on overflow.
pub struct LimitReader<R> {
    inner: R,
    limit: u64,
    read: u64,
}

impl<R: Read> LimitReader<R> {
    pub fn new(inner: R, limit: u64) -> Self {
        Self {
            inner,
            limit,
            read: 0,
        }
    }
}

/// Marker carried inside the `io::Error` when a `LimitReader` overflows.
#[derive(Debug)]
struct LimitExceeded {
    limit: u64,
}

impl std::fmt::Display for LimitExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "exceeded limit of {} bytes", self.limit)
    }
}

impl std::error::Error for LimitExceeded {}

impl<R: Read> Read for LimitReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        // One byte of headroom distinguishes "exactly at the limit" from "over it".
        if self.read > self.limit {
            return Err(std::io::Error::other(LimitExceeded { limit: self.limit }));
        }

        let headroom = self.limit.saturating_add(1).saturating_sub(self.read);
        let max_to_read = headroom.min(buf.len() as u64) as usize;
        let n = self.inner.read(&mut buf[..max_to_read])?;
        self.read = self.read.saturating_add(n as u64);
        if self.read > self.limit {
            return Err(std::io::Error::other(LimitExceeded { limit: self.limit }));
        }

        Ok(n)
    }
}

/// Read a whole stream, bounded by `limit` bytes.
pub fn read_bounded<R: Read>(reader: R, limit: u64) -> ManifestResult<Vec<u8>> {
    let mut out = Vec::new();
    LimitReader::new(reader, limit)
        .read_to_end(&mut out)
        .map_err(|e| {
            match e.get_ref().and_then(|inner| inner.downcast_ref::<LimitExceeded>()) {
                Some(exceeded) => {
                    ManifestError::structural(ErrorCode::ManifestTooLarge, exceeded.to_string())
                }
                None => ManifestError::from(e),
            }
        })?;
    Ok(out)
}
