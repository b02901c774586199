//! Error types for manifest parsing and writing.

/// Broad classification of a manifest format failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Grammar violation (missing colon, unnamed section, oversized line, ...).
    Structural,
    /// An attribute key outside `[A-Za-z0-9_-]{1,70}`.
    KeyValidation,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Stable error codes for manifest format failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    MissingColon,
    MissingSpace,
    UnnamedSection,
    DuplicateSection,
    OrphanContinuation,
    NulByte,
    LineTooLong,
    ManifestTooLarge,
    MissingVersion,
    InvalidKey,
    InvalidValue,
    Io,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A manifest (or signature file) that does not follow the wire grammar.
#[derive(Debug, thiserror::Error)]
#[error("{class}: {message} ({code}){}", line.map(|l| format!(" at line {l}")).unwrap_or_default())]
pub struct ManifestError {
    pub class: ErrorClass,
    pub code: ErrorCode,
    /// 1-based physical line where the problem was detected.
    pub line: Option<usize>,
    pub message: String,
    #[source]
    pub source: Option<std::io::Error>,
}

impl ManifestError {
    pub fn structural(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            class: ErrorClass::Structural,
            code,
            line: None,
            message: message.into(),
            source: None,
        }
    }

    pub fn invalid_key(err: InvalidAttributeName) -> Self {
        Self {
            class: ErrorClass::KeyValidation,
            code: ErrorCode::InvalidKey,
            line: None,
            message: err.to_string(),
            source: None,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn class(&self) -> ErrorClass {
        self.class
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }
}

impl From<std::io::Error> for ManifestError {
    fn from(err: std::io::Error) -> Self {
        Self {
            class: ErrorClass::Structural,
            code: ErrorCode::Io,
            line: None,
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<InvalidAttributeName> for ManifestError {
    fn from(err: InvalidAttributeName) -> Self {
        Self::invalid_key(err)
    }
}

/// Attribute key construction failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidAttributeName {
    #[error("attribute name is empty")]
    Empty,

    #[error("attribute name is {len} bytes long, maximum is {max}")]
    TooLong { len: usize, max: usize },

    #[error("attribute name {name:?} contains invalid character {ch:?}")]
    InvalidChar { name: String, ch: char },
}

/// Result type for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;
