//! Archive manifest format.
//!
//! A manifest is a line-oriented text document made of sections:
//!
//! ```text
//! Manifest-Version: 1.0
//! Created-By: example
//!
//! Name: com/example/App.class
//! SHA-256-Digest: 47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=
//!
//! ```
//!
//! The first section holds the main attributes, every later section
//! starts with `Name: <entry>`. Long lines are folded with a leading
//! space. Signature files (`META-INF/*.SF`) use the same grammar.
//!
//! Parsing can optionally capture the raw bytes of every section
//! ([`ManifestChunks`]) so signature verification can hash exactly what
//! was signed.
//!
//! # Example
//!
//! ```
//! use jarsig_manifest::{Manifest, ParseOptions};
//!
//! let bytes = b"Manifest-Version: 1.0\r\n\r\nName: a.txt\r\nSHA-Digest: AAAA\r\n\r\n";
//! let manifest = Manifest::parse_with(bytes, &ParseOptions::default().capture_chunks())?;
//! assert_eq!(manifest.main_attributes().get("manifest-version"), Some("1.0"));
//! assert_eq!(manifest.attributes("a.txt").unwrap().get("SHA-Digest"), Some("AAAA"));
//! assert!(manifest.chunks().unwrap().section("a.txt").is_some());
//! # Ok::<(), jarsig_manifest::ManifestError>(())
//! ```

pub mod attributes;
pub mod error;
pub mod limits;
pub mod manifest;
pub mod name;
mod reader;
pub mod text;
mod writer;

pub use attributes::Attributes;
pub use error::{ErrorClass, ErrorCode, InvalidAttributeName, ManifestError, ManifestResult};
pub use limits::{read_bounded, LimitReader, ManifestLimits, ManifestLimitsOverrides, ParseOptions};
pub use manifest::{Manifest, ManifestChunks};
pub use name::AttributeName;
pub use text::TextEncoding;
pub use writer::LINE_LENGTH;
