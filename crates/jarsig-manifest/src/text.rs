//! Attribute value decoding.

use std::str::FromStr;

use serde::Deserialize;

/// Character encoding applied to attribute values after unfolding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    /// UTF-8; invalid sequences become U+FFFD.
    Utf8,
    /// ISO-8859-1: every byte widened to the code point of the same value.
    Latin1,
    /// US-ASCII; bytes above 0x7F become U+FFFD.
    Ascii,
}

impl FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "utf8" | "utf-8" => Ok(Self::Utf8),
            "latin1" | "latin-1" | "iso-8859-1" | "iso8859-1" => Ok(Self::Latin1),
            "ascii" | "us-ascii" => Ok(Self::Ascii),
            other => Err(format!("unknown text encoding: {other}")),
        }
    }
}

/// Decode raw value bytes.
///
/// With no configured encoding, UTF-8 is tried first and Latin-1 is the
/// fallback; decoding never fails.
pub fn decode(bytes: &[u8], encoding: Option<TextEncoding>) -> String {
    match encoding {
        Some(TextEncoding::Utf8) => String::from_utf8_lossy(bytes).into_owned(),
        Some(TextEncoding::Latin1) => widen(bytes),
        Some(TextEncoding::Ascii) => bytes
            .iter()
            .map(|&b| {
                if b.is_ascii() {
                    b as char
                } else {
                    char::REPLACEMENT_CHARACTER
                }
            })
            .collect(),
        None => match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => widen(bytes),
        },
    }
}

fn widen(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
