//! Random-access verification.

use std::io::Read;
use std::sync::Arc;

use jarsig_manifest::{Attributes, Manifest};

use crate::certificate::{Certificate, CertificateChain, SignatureBlockVerifier};
use crate::config::VerifyConfig;
use crate::container::Container;
use crate::ed25519::Ed25519BlockVerifier;
use crate::entry::VerifyingReader;
use crate::error::{VerifyError, VerifyResult};
use crate::meta::{self, MetadataKind};
use crate::verifier::{Verifier, VerifierBuilder, VerifierState};

/// A container whose metadata has been read and checked.
///
/// Opening seeds the verifier from every signature-related member before
/// any entry is handed out. Entries can then be opened in any order; each
/// is verified when its stream has been read to the end.
pub struct SignedArchive<C> {
    name: String,
    container: C,
    verifier: Option<Verifier>,
}

impl<C: Container> SignedArchive<C> {
    /// Open with the default configuration and the Ed25519 block verifier.
    pub fn open(name: impl Into<String>, container: C) -> VerifyResult<Self> {
        Self::open_with(
            name,
            container,
            VerifyConfig::default(),
            Arc::new(Ed25519BlockVerifier::new()),
        )
    }

    pub fn open_with(
        name: impl Into<String>,
        mut container: C,
        config: VerifyConfig,
        block_verifier: Arc<dyn SignatureBlockVerifier>,
    ) -> VerifyResult<Self> {
        let name = name.into();
        let mut builder = VerifierBuilder::new(name.clone(), block_verifier).with_config(config);

        let mut content = Vec::new();
        for entry in container.list_entries() {
            match meta::classify(&entry) {
                Some(MetadataKind::Manifest | MetadataKind::SignatureFile | MetadataKind::SignatureBlock) => {
                    let stream = container.open_entry(&entry)?;
                    builder.read_member(&entry, stream.reader)?;
                }
                Some(MetadataKind::Other) => {}
                None => content.push(entry),
            }
        }

        let verifier = if builder.has_manifest() {
            builder.archive_entries(content);
            Some(builder.seed()?)
        } else {
            tracing::debug!(archive = %name, "no manifest, archive is unsigned");
            None
        };

        Ok(Self {
            name,
            container,
            verifier,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.verifier.as_ref().map(Verifier::manifest)
    }

    /// Manifest section of `entry`.
    pub fn attributes(&self, entry: &str) -> Option<&Attributes> {
        self.manifest()?.attributes(entry)
    }

    pub fn verifier(&self) -> Option<&Verifier> {
        self.verifier.as_ref()
    }

    pub fn is_signed(&self) -> bool {
        self.verifier.as_ref().is_some_and(Verifier::is_signed)
    }

    pub fn state(&self) -> Option<VerifierState> {
        self.verifier.as_ref().map(Verifier::state)
    }

    pub fn entries(&self) -> Vec<String> {
        self.container.list_entries()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.container.entry_exists(entry)
    }

    /// Certificates of `entry`, present only after it was read in full and
    /// matched its digest.
    pub fn certificates(&self, entry: &str) -> Option<Vec<Certificate>> {
        self.verifier.as_ref()?.certificates(entry)
    }

    pub fn certificate_chains(&self, entry: &str) -> Option<Vec<CertificateChain>> {
        self.verifier.as_ref()?.certificate_chains(entry)
    }

    pub fn open_entry(&mut self, entry: &str) -> VerifyResult<VerifyingReader<Box<dyn Read + '_>>> {
        let digest = self
            .verifier
            .as_ref()
            .and_then(|verifier| verifier.init_entry(entry));
        let stream = self.container.open_entry(entry)?;
        Ok(VerifyingReader::new(entry, stream.reader, stream.size, digest))
    }

    /// Read `entry` in full. Trust failures come back as
    /// [`VerifyError::Trust`].
    pub fn read_entry(&mut self, entry: &str) -> VerifyResult<Vec<u8>> {
        let mut reader = self.open_entry(entry)?;
        let mut out = Vec::new();
        reader.read_to_end(&mut out).map_err(into_verify_error)?;
        Ok(out)
    }

    /// Read every content entry, stopping at the first failure.
    pub fn verify_all(&mut self) -> VerifyResult<Option<VerifierState>> {
        let names: Vec<String> = self
            .entries()
            .into_iter()
            .filter(|name| !meta::is_metadata_member(name))
            .collect();
        let mut sink = [0u8; 8 * 1024];
        for name in names {
            let mut reader = self.open_entry(&name)?;
            while reader.read(&mut sink).map_err(into_verify_error)? > 0 {}
        }
        Ok(self.state())
    }

    pub fn into_inner(self) -> C {
        self.container
    }
}

pub(crate) fn into_verify_error(err: std::io::Error) -> VerifyError {
    match VerifyError::from_io_error(&err) {
        Some(trust) => VerifyError::Trust(trust.clone()),
        None => VerifyError::Io(err),
    }
}

impl<C> std::fmt::Debug for SignedArchive<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedArchive")
            .field("name", &self.name)
            .field("verifier", &self.verifier)
            .finish_non_exhaustive()
    }
}
