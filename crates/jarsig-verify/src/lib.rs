//! Signature verification for manifest-signed archives.
//!
//! An archive is signed by a `META-INF/MANIFEST.MF` listing a digest per
//! entry, one or more signature files (`META-INF/X.SF`) listing a digest of
//! each manifest section, and a signature block (`META-INF/X.RSA`, `.DSA`
//! or `.EC`) signing each signature file. Verification happens while the
//! entries are read:
//!
//! - Metadata members are read in full and checked first.
//! - Every entry stream is wrapped so that reads update its digest.
//! - Once an entry's declared size has been read, the digest is compared;
//!   a mismatch is a [`TrustError`] and the entry's certificates are never
//!   published.
//! - Entries without a manifest digest are unsigned. That is not an error.
//!
//! # Quick Start
//!
//! ```no_run
//! use jarsig_verify::{SignedArchive, ZipContainer};
//!
//! # fn example() -> Result<(), jarsig_verify::VerifyError> {
//! let mut archive = SignedArchive::open("app.jar", ZipContainer::open("app.jar")?)?;
//! let content = archive.read_entry("com/example/App.class")?;
//! if let Some(certs) = archive.certificates("com/example/App.class") {
//!     println!("{} bytes signed by {}", content.len(), certs[0].subject);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `JARSIG_VERIFY` | Verify signatures (default: true) |
//! | `JARSIG_MAX_LINE_BYTES` | Longest manifest line (default: 65536) |
//! | `JARSIG_MAX_MANIFEST_BYTES` | Largest manifest (default: 8 MiB) |
//! | `JARSIG_MAX_METADATA_BYTES` | Largest signature file or block (default: 8 MiB) |
//! | `JARSIG_MANIFEST_ENCODING` | `utf8`, `latin1` or `ascii` (default: UTF-8 with Latin-1 fallback) |
//! | `JARSIG_DIGEST_ALGORITHMS` | Algorithms tried without `Digest-Algorithms` (default: `SHA SHA1`) |
//! | `JARSIG_REQUIRE_MANIFEST_VERSION` | Reject manifests without `Manifest-Version` |

pub mod algorithm;
pub mod archive;
pub mod certificate;
pub mod config;
pub mod container;
pub mod ed25519;
pub mod entry;
pub mod error;
pub mod meta;
pub mod signature_file;
pub mod streaming;
pub mod trust;
pub mod verifier;

pub use algorithm::{DigestAlgorithm, UnsupportedAlgorithm, DEFAULT_DIGEST_ALGORITHMS};
pub use archive::SignedArchive;
pub use certificate::{BlockError, Certificate, CertificateChain, SignatureBlockVerifier};
pub use config::{VerifyConfig, VerifyConfigOverrides};
pub use container::{Container, DirectoryContainer, EntryStream, MemoryContainer, ZipContainer};
pub use ed25519::{CertificateEntry, Ed25519BlockVerifier, SignatureBlock};
pub use entry::VerifyingReader;
pub use error::{TrustError, TrustErrorKind, VerifyError, VerifyResult};
pub use signature_file::SignatureFile;
pub use streaming::{open_tar_gz, StreamEntry, StreamingArchive};
pub use trust::{TrustStore, TrustedKey};
pub use verifier::{EntryVerifier, Verifier, VerifierBuilder, VerifierState};

pub use jarsig_manifest::{Attributes, Manifest};
