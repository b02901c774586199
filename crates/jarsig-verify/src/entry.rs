//! Digesting entry reader.

use std::io::{self, Read};

use crate::error::TrustError;
use crate::verifier::EntryVerifier;

enum ReadState {
    Reading,
    Done,
    Failed(TrustError),
}

/// Wraps an entry's decompressed stream.
///
/// Every byte read feeds the entry's digest. When the declared size has
/// been consumed the digest is compared once; a mismatch is returned as an
/// `io::Error` of kind `InvalidData` wrapping a [`TrustError`] (see
/// [`VerifyError::from_io_error`](crate::VerifyError::from_io_error)), and
/// the bytes of that final read are withheld. Reads never go past the
/// declared size. Unsigned entries pass through undigested.
pub struct VerifyingReader<R> {
    inner: R,
    name: String,
    declared: u64,
    consumed: u64,
    verifier: Option<EntryVerifier>,
    state: ReadState,
}

impl<R: Read> VerifyingReader<R> {
    pub fn new(name: impl Into<String>, inner: R, declared: u64, verifier: Option<EntryVerifier>) -> Self {
        Self {
            inner,
            name: name.into(),
            declared,
            consumed: 0,
            verifier,
            state: ReadState::Reading,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_len(&self) -> u64 {
        self.declared
    }

    /// Whether this entry is being digested.
    pub fn is_signed(&self) -> bool {
        self.verifier.is_some() || matches!(self.state, ReadState::Failed(_))
    }

    /// The whole entry was read and, if signed, matched.
    pub fn is_complete(&self) -> bool {
        matches!(self.state, ReadState::Done)
    }

    fn fail(&mut self, err: TrustError) -> io::Error {
        self.state = ReadState::Failed(err.clone());
        err.into()
    }

    fn finish(&mut self) -> io::Result<()> {
        self.state = ReadState::Done;
        match self.verifier.take() {
            Some(verifier) => verifier.finish().map_err(|e| self.fail(e)),
            None => Ok(()),
        }
    }
}

impl<R: Read> Read for VerifyingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &self.state {
            ReadState::Failed(err) => return Err(err.clone().into()),
            ReadState::Done => return Ok(0),
            ReadState::Reading => {}
        }

        let remaining = self.declared - self.consumed;
        if remaining == 0 {
            self.finish()?;
            return Ok(0);
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let max = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
        let n = self.inner.read(&mut buf[..max])?;
        if n == 0 {
            return match self.verifier.take() {
                Some(verifier) => {
                    let err = verifier.truncated(self.consumed, self.declared);
                    Err(self.fail(err))
                }
                None => {
                    tracing::debug!(entry = %self.name, read = self.consumed, declared = self.declared, "unsigned entry ended early");
                    self.state = ReadState::Done;
                    Ok(0)
                }
            };
        }

        if let Some(verifier) = self.verifier.as_mut() {
            verifier.update(&buf[..n]);
        }
        self.consumed += n as u64;
        if self.consumed == self.declared {
            self.finish()?;
        }
        Ok(n)
    }
}

impl<R> std::fmt::Debug for VerifyingReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifyingReader")
            .field("name", &self.name)
            .field("declared", &self.declared)
            .field("consumed", &self.consumed)
            .field("signed", &self.verifier.is_some())
            .finish_non_exhaustive()
    }
}
