//! Error types for archive verification.

use jarsig_manifest::ManifestError;

/// What a trust failure is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustErrorKind {
    /// Entry content does not hash to the manifest digest.
    EntryDigestMismatch,
    /// Entry stream ended before its declared size.
    EntryTruncated,
    /// Signature file's digest of the manifest main section does not match.
    MainAttributesDigestMismatch,
    /// Signature file's digest of one manifest section does not match.
    SectionDigestMismatch,
    /// Signature block failed cryptographic validation.
    SignatureBlockInvalid,
    /// Signature block is valid but its root is not trusted.
    UntrustedSigner,
}

impl std::fmt::Display for TrustErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Declared and computed content disagree, or a signature does not check out.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {subject} in {archive}: {message}")]
pub struct TrustError {
    pub kind: TrustErrorKind,
    /// Archive the failure belongs to.
    pub archive: String,
    /// Entry or signature file name.
    pub subject: String,
    pub message: String,
}

impl TrustError {
    pub fn new(
        kind: TrustErrorKind,
        archive: impl Into<String>,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            archive: archive.into(),
            subject: subject.into(),
            message: message.into(),
        }
    }
}

/// Verification errors.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// Manifest or signature file does not follow the grammar.
    #[error("format error in {member}: {source}")]
    Format {
        member: String,
        #[source]
        source: ManifestError,
    },

    /// Digest or signature mismatch.
    #[error("trust error: {0}")]
    Trust(#[from] TrustError),

    /// The underlying container failed.
    #[error("container error: {context}")]
    Container {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    /// Entry is not in the archive.
    #[error("entry not found: {name}")]
    NotFound { name: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl VerifyError {
    pub fn format(member: impl Into<String>, source: ManifestError) -> Self {
        Self::Format {
            member: member.into(),
            source,
        }
    }

    pub fn container(context: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Container {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn is_trust_failure(&self) -> bool {
        matches!(self, Self::Trust(_))
    }

    pub fn trust(&self) -> Option<&TrustError> {
        match self {
            Self::Trust(t) => Some(t),
            _ => None,
        }
    }

    /// Exit code for CLI wrappers.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound { .. } => 1,
            Self::Config { .. } => 1,
            Self::Format { .. } => 2,
            Self::Trust(_) => 4,
            Self::Container { .. } => 5,
            Self::Io(_) => 5,
        }
    }

    /// Recover a trust error carried through `std::io::Read`.
    pub fn from_io_error(err: &std::io::Error) -> Option<&TrustError> {
        err.get_ref()?.downcast_ref::<TrustError>()
    }
}

impl From<TrustError> for std::io::Error {
    fn from(err: TrustError) -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidData, err)
    }
}

/// Result type for verification operations.
pub type VerifyResult<T> = Result<T, VerifyError>;
