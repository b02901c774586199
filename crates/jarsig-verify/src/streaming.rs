//! Streaming verification over tar archives.
//!
//! Metadata only counts when it leads the stream: the manifest must be the
//! first file (after an optional `META-INF/` directory entry), followed by
//! the other `META-INF/` members. Those are buffered and checked before the
//! first content entry is handed out. An archive that does not start with
//! its manifest is read without verification.

use std::collections::VecDeque;
use std::io::{Cursor, Read};
use std::sync::Arc;

use flate2::read::GzDecoder;
use jarsig_manifest::{read_bounded, Attributes, Manifest};

use crate::archive::into_verify_error;
use crate::certificate::{Certificate, SignatureBlockVerifier};
use crate::config::VerifyConfig;
use crate::ed25519::Ed25519BlockVerifier;
use crate::entry::VerifyingReader;
use crate::error::{VerifyError, VerifyResult};
use crate::meta::{self, MetadataKind};
use crate::verifier::{Verifier, VerifierBuilder};

/// A tar archive over a gzip stream.
pub fn open_tar_gz<R: Read>(reader: R) -> tar::Archive<GzDecoder<R>> {
    tar::Archive::new(GzDecoder::new(reader))
}

/// Entry reader handed out by [`StreamingArchive`].
///
/// As with `tar::Entries`, an entry must be read before the next one is
/// requested; its stream is positioned inside the shared archive.
pub type StreamEntry<'a> = VerifyingReader<Box<dyn Read + 'a>>;

struct Pending<'a, R: Read> {
    name: String,
    entry: tar::Entry<'a, R>,
}

/// Iterates the file entries of a tar archive, verifying as it goes.
///
/// The leading manifest is not yielded (see [`manifest`](Self::manifest));
/// the other leading metadata members are replayed from memory.
pub struct StreamingArchive<'a, R: Read> {
    name: String,
    entries: tar::Entries<'a, R>,
    verifier: Option<Verifier>,
    replay: VecDeque<(String, Vec<u8>)>,
    peeked: Option<Pending<'a, R>>,
    done: bool,
}

fn entry_name<R: Read>(entry: &tar::Entry<'_, R>) -> String {
    String::from_utf8_lossy(&entry.path_bytes()).into_owned()
}

fn is_file<R: Read>(entry: &tar::Entry<'_, R>) -> bool {
    let kind = entry.header().entry_type();
    kind.is_file() || kind.is_contiguous()
}

fn tar_error(err: std::io::Error) -> VerifyError {
    VerifyError::container("reading tar stream", err)
}

impl<'a, R: Read + 'a> StreamingArchive<'a, R> {
    /// Read the leading metadata with the default configuration and the
    /// Ed25519 block verifier.
    pub fn new(name: impl Into<String>, archive: &'a mut tar::Archive<R>) -> VerifyResult<Self> {
        Self::with_config(
            name,
            archive,
            VerifyConfig::default(),
            Arc::new(Ed25519BlockVerifier::new()),
        )
    }

    pub fn with_config(
        name: impl Into<String>,
        archive: &'a mut tar::Archive<R>,
        config: VerifyConfig,
        block_verifier: Arc<dyn SignatureBlockVerifier>,
    ) -> VerifyResult<Self> {
        let name = name.into();
        let max_member = config.max_metadata_member_bytes;
        let mut entries = archive.entries().map_err(tar_error)?;
        let mut builder = VerifierBuilder::new(name.clone(), block_verifier).with_config(config);
        let mut replay = VecDeque::new();
        let mut peeked = None;
        let mut done = true;
        // Only the `META-INF/` directory may precede the manifest.
        let mut content_first = false;

        for next in entries.by_ref() {
            let mut entry = next.map_err(tar_error)?;
            let member = entry_name(&entry);
            if !is_file(&entry) {
                if !builder.has_manifest() && !meta::is_meta_dir(&member) {
                    content_first = true;
                }
                continue;
            }
            let kind = meta::classify(&member);

            if !builder.has_manifest() {
                if kind == Some(MetadataKind::Manifest) && !content_first {
                    builder.read_member(&member, &mut entry)?;
                    continue;
                }
                tracing::debug!(archive = %name, entry = %member, "manifest is not the first entry, verification disabled");
                peeked = Some(Pending { name: member, entry });
                done = false;
                break;
            }

            match kind {
                Some(kind) => {
                    let bytes = read_bounded(&mut entry, max_member)
                        .map_err(|e| VerifyError::format(&member, e))?;
                    if kind != MetadataKind::Other {
                        builder.member(&member, bytes.clone());
                    }
                    replay.push_back((member, bytes));
                }
                None => {
                    peeked = Some(Pending { name: member, entry });
                    done = false;
                    break;
                }
            }
        }

        let verifier = if builder.has_manifest() {
            Some(builder.seed()?)
        } else {
            None
        };

        Ok(Self {
            name,
            entries,
            verifier,
            replay,
            peeked,
            done,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The leading manifest, if the archive had one.
    pub fn manifest(&self) -> Option<&Manifest> {
        self.verifier.as_ref().map(Verifier::manifest)
    }

    pub fn attributes(&self, entry: &str) -> Option<&Attributes> {
        self.manifest()?.attributes(entry)
    }

    pub fn verifier(&self) -> Option<&Verifier> {
        self.verifier.as_ref()
    }

    pub fn is_signed(&self) -> bool {
        self.verifier.as_ref().is_some_and(Verifier::is_signed)
    }

    /// Certificates of `entry`, present only after it was read in full and
    /// matched its digest.
    pub fn certificates(&self, entry: &str) -> Option<Vec<Certificate>> {
        self.verifier.as_ref()?.certificates(entry)
    }

    /// Read every remaining entry to the end, returning their names.
    pub fn drain(&mut self) -> VerifyResult<Vec<String>> {
        let mut names = Vec::new();
        let mut sink = [0u8; 8 * 1024];
        while let Some(entry) = self.next() {
            let mut entry = entry?;
            while entry.read(&mut sink).map_err(into_verify_error)? > 0 {}
            names.push(entry.name().to_string());
        }
        Ok(names)
    }

    fn wrap(&self, pending: Pending<'a, R>) -> StreamEntry<'a> {
        let size = pending.entry.size();
        let digest = self
            .verifier
            .as_ref()
            .and_then(|verifier| verifier.init_entry(&pending.name));
        VerifyingReader::new(pending.name, Box::new(pending.entry), size, digest)
    }
}

impl<'a, R: Read + 'a> Iterator for StreamingArchive<'a, R> {
    type Item = VerifyResult<StreamEntry<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some((name, bytes)) = self.replay.pop_front() {
            let size = bytes.len() as u64;
            let reader: Box<dyn Read + 'a> = Box::new(Cursor::new(bytes));
            return Some(Ok(VerifyingReader::new(name, reader, size, None)));
        }
        if let Some(pending) = self.peeked.take() {
            return Some(Ok(self.wrap(pending)));
        }
        if self.done {
            return None;
        }
        loop {
            let entry = match self.entries.next() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(tar_error(e)));
                }
                Some(Ok(entry)) => entry,
            };
            if !is_file(&entry) {
                continue;
            }
            let name = entry_name(&entry);
            if self.verifier.is_some() && meta::is_signature_related(&name) {
                tracing::debug!(archive = %self.name, entry = %name, "metadata after content is not used for verification");
            }
            return Some(Ok(self.wrap(Pending { name, entry })));
        }
    }
}

impl<R: Read> std::fmt::Debug for StreamingArchive<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingArchive")
            .field("name", &self.name)
            .field("verifier", &self.verifier)
            .field("replay", &self.replay.len())
            .finish_non_exhaustive()
    }
}
