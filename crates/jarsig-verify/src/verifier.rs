//! The verification engine.
//!
//! A [`VerifierBuilder`] collects the raw bytes of every metadata member.
//! [`VerifierBuilder::seed`] parses the manifest, validates each signature
//! block against its signature file, checks the signature files against the
//! manifest and produces a [`Verifier`]. Entries are then checked one at a
//! time through [`EntryVerifier`]s handed out by [`Verifier::init_entry`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Read;
use std::sync::{Arc, Mutex, MutexGuard};

use jarsig_manifest::name::{DIGEST_MANIFEST_MAIN_SUFFIX, DIGEST_MANIFEST_SUFFIX, DIGEST_SUFFIX};
use jarsig_manifest::{read_bounded, Attributes, Manifest, ManifestChunks};

use crate::algorithm::{digest_matches, select_digest, DigestAlgorithm, EntryHasher};
use crate::certificate::{BlockError, Certificate, CertificateChain, SignatureBlockVerifier};
use crate::config::VerifyConfig;
use crate::error::{TrustError, TrustErrorKind, VerifyError, VerifyResult};
use crate::meta::{self, MetadataKind, MANIFEST_NAME};
use crate::signature_file::SignatureFile;

/// Where a verifier is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifierState {
    /// Collecting metadata members.
    Unseeded,
    /// Signatures checked, no entry verified yet.
    Seeded,
    /// Some signed entries verified.
    PartiallyVerified,
    /// Every signed entry known to be in the archive verified.
    Verified,
    /// At least one entry failed verification.
    Untrusted,
}

/// Collects metadata members before seeding.
pub struct VerifierBuilder {
    archive: String,
    config: VerifyConfig,
    block_verifier: Arc<dyn SignatureBlockVerifier>,
    manifest: Option<Vec<u8>>,
    signature_files: HashMap<String, Vec<u8>>,
    blocks: BTreeMap<String, Vec<u8>>,
    archive_entries: Option<BTreeSet<String>>,
}

impl std::fmt::Debug for VerifierBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifierBuilder")
            .field("archive", &self.archive)
            .field("has_manifest", &self.manifest.is_some())
            .field("signature_files", &self.signature_files.keys().collect::<Vec<_>>())
            .field("blocks", &self.blocks.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl VerifierBuilder {
    pub fn new(archive: impl Into<String>, block_verifier: Arc<dyn SignatureBlockVerifier>) -> Self {
        Self {
            archive: archive.into(),
            config: VerifyConfig::default(),
            block_verifier,
            manifest: None,
            signature_files: HashMap::new(),
            blocks: BTreeMap::new(),
            archive_entries: None,
        }
    }

    pub fn with_config(mut self, config: VerifyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn state(&self) -> VerifierState {
        VerifierState::Unseeded
    }

    /// Hand over one metadata member. Members other than the manifest,
    /// signature files and signature blocks are ignored.
    pub fn member(&mut self, name: &str, bytes: Vec<u8>) -> &mut Self {
        match meta::classify(name) {
            Some(MetadataKind::Manifest) => self.manifest = Some(bytes),
            Some(MetadataKind::SignatureFile) => {
                self.signature_files.insert(meta::normalize(name), bytes);
            }
            Some(MetadataKind::SignatureBlock) => {
                self.blocks.insert(meta::normalize(name), bytes);
            }
            Some(MetadataKind::Other) | None => {
                tracing::debug!(archive = %self.archive, member = %name, "ignoring non-signature member");
            }
        }
        self
    }

    /// Read a member in full, bounded by `max_metadata_member_bytes`.
    pub fn read_member<R: Read>(&mut self, name: &str, reader: R) -> VerifyResult<&mut Self> {
        let limit = if meta::classify(name) == Some(MetadataKind::Manifest) {
            self.config.limits.max_manifest_bytes
        } else {
            self.config.max_metadata_member_bytes
        };
        let bytes = read_bounded(reader, limit).map_err(|e| VerifyError::format(name, e))?;
        Ok(self.member(name, bytes))
    }

    /// Names of the content entries the archive holds, so that
    /// [`Verifier::state`] can tell when every signed entry was checked.
    pub fn archive_entries<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.archive_entries = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn has_manifest(&self) -> bool {
        self.manifest.is_some()
    }

    /// Parse and check all metadata.
    ///
    /// Fails with a format error for a malformed manifest or signature file
    /// and with a trust error when a signature block or a signature file's
    /// manifest digests do not check out.
    pub fn seed(self) -> VerifyResult<Verifier> {
        let Self {
            archive,
            config,
            block_verifier,
            manifest,
            signature_files,
            blocks,
            archive_entries,
        } = self;

        let bytes = manifest.ok_or_else(|| VerifyError::NotFound {
            name: MANIFEST_NAME.to_string(),
        })?;
        let mut manifest = Manifest::parse_owned(bytes, &config.manifest_options())
            .map_err(|e| VerifyError::format(MANIFEST_NAME, e))?;
        let chunks = manifest.take_chunks();

        let mut seeding = Seeding {
            archive: &archive,
            config: &config,
            chains: BTreeMap::new(),
            attested: BTreeMap::new(),
        };

        if config.verify {
            if let Some(chunks) = &chunks {
                for (block_name, block) in &blocks {
                    seeding.signature_block(
                        block_verifier.as_ref(),
                        block_name,
                        block,
                        &signature_files,
                        chunks,
                    )?;
                }
            }
        } else {
            tracing::debug!(archive = %archive, "verification disabled by configuration");
        }
        // Chunks are only needed for the checks above.
        drop(chunks);

        let Seeding {
            chains, attested, ..
        } = seeding;

        let mut signers: HashMap<String, Vec<String>> = HashMap::new();
        for (sf_name, entries) in &attested {
            for entry in entries {
                signers.entry(entry.clone()).or_default().push(sf_name.clone());
            }
        }

        tracing::info!(
            archive = %archive,
            trusted_signature_files = chains.len(),
            signed_entries = signers.len(),
            "archive metadata verified"
        );

        Ok(Verifier {
            inner: Arc::new(VerifierInner {
                archive,
                default_algorithms: config.default_digest_algorithms,
                manifest: Arc::new(manifest),
                chains,
                signers,
                archive_entries,
                verified: Mutex::new(HashMap::new()),
                failed: Mutex::new(BTreeSet::new()),
            }),
        })
    }
}

struct Seeding<'a> {
    archive: &'a str,
    config: &'a VerifyConfig,
    /// Trusted signature file -> chain.
    chains: BTreeMap<String, CertificateChain>,
    /// Trusted signature file -> entries it attests.
    attested: BTreeMap<String, Vec<String>>,
}

impl Seeding<'_> {
    fn signature_block(
        &mut self,
        block_verifier: &dyn SignatureBlockVerifier,
        block_name: &str,
        block: &[u8],
        signature_files: &HashMap<String, Vec<u8>>,
        chunks: &ManifestChunks,
    ) -> VerifyResult<()> {
        let Some(sf_name) = meta::signature_file_for_block(block_name) else {
            return Ok(());
        };
        let Some(sf_bytes) = signature_files.get(&sf_name) else {
            tracing::debug!(archive = %self.archive, block = %block_name, "signature block without signature file");
            return Ok(());
        };
        if self.chains.contains_key(&sf_name) {
            tracing::debug!(archive = %self.archive, block = %block_name, "signature file already trusted");
            return Ok(());
        }

        let chain = match block_verifier.verify(block_name, sf_bytes, block) {
            Ok(Some(chain)) => chain,
            Ok(None) => {
                tracing::debug!(archive = %self.archive, signature_file = %sf_name, "signature block not usable, skipping");
                return Ok(());
            }
            Err(BlockError::Invalid { reason }) => {
                return Err(TrustError::new(
                    TrustErrorKind::SignatureBlockInvalid,
                    self.archive,
                    sf_name,
                    reason,
                )
                .into());
            }
            Err(BlockError::UntrustedSigner { key_id }) => {
                return Err(TrustError::new(
                    TrustErrorKind::UntrustedSigner,
                    self.archive,
                    sf_name,
                    format!("root key {} is not trusted", key_id),
                )
                .into());
            }
        };

        let sf = SignatureFile::parse(&sf_name, sf_bytes, &self.config.signature_file_options())
            .map_err(|e| VerifyError::format(&sf_name, e))?;
        if !sf.has_version() {
            tracing::debug!(archive = %self.archive, signature_file = %sf_name, "no Signature-Version, skipping");
            return Ok(());
        }

        if self.check_signature_file(&sf, chunks)? {
            tracing::debug!(
                archive = %self.archive,
                signature_file = %sf_name,
                signer = %chain,
                "signature file trusted"
            );
            self.attested
                .insert(sf_name.clone(), sf.entry_names().map(str::to_string).collect());
            self.chains.insert(sf_name, chain);
        }
        Ok(())
    }

    /// `Ok(false)` drops the signature file without error.
    fn check_signature_file(&self, sf: &SignatureFile, chunks: &ManifestChunks) -> VerifyResult<bool> {
        let signtool = sf.is_signtool();
        let defaults = &self.config.default_digest_algorithms;

        let main = chunks.main_section();
        if !main.is_empty()
            && !signtool
            && !check_digest(
                sf.main_attributes(),
                DIGEST_MANIFEST_MAIN_SUFFIX,
                main,
                defaults,
                Lenience::Ignorable,
            )
        {
            return Err(TrustError::new(
                TrustErrorKind::MainAttributesDigestMismatch,
                self.archive,
                sf.name(),
                "manifest main attributes digest does not match",
            )
            .into());
        }

        let whole_suffix = if signtool {
            DIGEST_SUFFIX
        } else {
            DIGEST_MANIFEST_SUFFIX
        };
        if check_digest(
            sf.main_attributes(),
            whole_suffix,
            chunks.raw(),
            defaults,
            Lenience::Strict,
        ) {
            return Ok(true);
        }

        let section_lenience = if signtool {
            Lenience::SecondNewline
        } else {
            Lenience::Strict
        };
        for (entry, attrs) in sf.sections() {
            let Some(chunk) = chunks.section(entry) else {
                tracing::warn!(
                    archive = %self.archive,
                    signature_file = %sf.name(),
                    entry = %entry,
                    "signature file names a section missing from the manifest, ignoring it"
                );
                return Ok(false);
            };
            if !check_digest(attrs, DIGEST_SUFFIX, chunk, defaults, section_lenience) {
                return Err(TrustError::new(
                    TrustErrorKind::SectionDigestMismatch,
                    self.archive,
                    entry,
                    format!("manifest section digest in {} does not match", sf.name()),
                )
                .into());
            }
        }
        Ok(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lenience {
    Strict,
    /// A missing or unusable digest counts as a match.
    Ignorable,
    /// Hash without the last newline of a trailing blank line (signtool).
    SecondNewline,
}

fn check_digest(
    attrs: &Attributes,
    suffix: &str,
    data: &[u8],
    defaults: &[String],
    lenience: Lenience,
) -> bool {
    let Some((algorithm, expected)) = select_digest(attrs, suffix, defaults) else {
        return lenience == Lenience::Ignorable;
    };
    let data = match data.strip_suffix(b"\n") {
        Some(trimmed) if lenience == Lenience::SecondNewline && trimmed.ends_with(b"\n") => trimmed,
        _ => data,
    };
    digest_matches(&algorithm.digest(data), expected)
}

struct VerifierInner {
    archive: String,
    default_algorithms: Vec<String>,
    manifest: Arc<Manifest>,
    chains: BTreeMap<String, CertificateChain>,
    /// Entry -> trusted signature files naming it.
    signers: HashMap<String, Vec<String>>,
    archive_entries: Option<BTreeSet<String>>,
    verified: Mutex<HashMap<String, Vec<CertificateChain>>>,
    failed: Mutex<BTreeSet<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A seeded verifier. Cloning shares state.
#[derive(Clone)]
pub struct Verifier {
    inner: Arc<VerifierInner>,
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("archive", &self.inner.archive)
            .field("signature_files", &self.inner.chains.keys().collect::<Vec<_>>())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Verifier {
    pub fn archive_name(&self) -> &str {
        &self.inner.archive
    }

    pub fn manifest(&self) -> &Manifest {
        &self.inner.manifest
    }

    pub fn shared_manifest(&self) -> Arc<Manifest> {
        Arc::clone(&self.inner.manifest)
    }

    /// At least one signature file was trusted.
    pub fn is_signed(&self) -> bool {
        !self.inner.chains.is_empty()
    }

    /// Trusted signature files, by upper-cased member name.
    pub fn signature_files(&self) -> impl Iterator<Item = &str> {
        self.inner.chains.keys().map(String::as_str)
    }

    /// Entries with a manifest section that a trusted signature file attests.
    pub fn signed_entries(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .signers
            .keys()
            .filter(|name| self.inner.manifest.attributes(name).is_some())
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn state(&self) -> VerifierState {
        if !lock(&self.inner.failed).is_empty() {
            return VerifierState::Untrusted;
        }
        let verified = lock(&self.inner.verified);
        if verified.is_empty() {
            return VerifierState::Seeded;
        }
        let all_done = self
            .signed_entries()
            .iter()
            .filter(|name| match &self.inner.archive_entries {
                Some(entries) => entries.contains(name.as_str()),
                None => true,
            })
            .all(|name| verified.contains_key(name));
        if all_done {
            VerifierState::Verified
        } else {
            VerifierState::PartiallyVerified
        }
    }

    /// Start verifying `entry`. `None` means the entry is unsigned: no
    /// manifest section, no trusted signature file naming it, or no usable
    /// digest.
    pub fn init_entry(&self, entry: &str) -> Option<EntryVerifier> {
        let inner = &self.inner;
        let Some(attrs) = inner.manifest.attributes(entry) else {
            tracing::debug!(archive = %inner.archive, entry = %entry, "no manifest section, unsigned");
            return None;
        };
        let Some(signers) = inner.signers.get(entry) else {
            tracing::debug!(archive = %inner.archive, entry = %entry, "not attested by a trusted signature file, unsigned");
            return None;
        };
        let Some((algorithm, expected)) = select_digest(attrs, DIGEST_SUFFIX, &inner.default_algorithms)
        else {
            tracing::debug!(archive = %inner.archive, entry = %entry, "no supported digest, unsigned");
            return None;
        };

        let chains = signers
            .iter()
            .filter_map(|sf| inner.chains.get(sf).cloned())
            .collect();
        Some(EntryVerifier {
            verifier: self.clone(),
            entry: entry.to_string(),
            hasher: algorithm.hasher(),
            expected: expected.to_string(),
            chains,
        })
    }

    /// Chains that verified `entry`; `None` until its content was read in
    /// full and matched.
    pub fn certificate_chains(&self, entry: &str) -> Option<Vec<CertificateChain>> {
        lock(&self.inner.verified).get(entry).cloned()
    }

    /// All certificates of all chains that verified `entry`.
    pub fn certificates(&self, entry: &str) -> Option<Vec<Certificate>> {
        self.certificate_chains(entry).map(|chains| {
            chains
                .iter()
                .flat_map(|chain| chain.certificates().iter().cloned())
                .collect()
        })
    }

    pub fn is_verified(&self, entry: &str) -> bool {
        lock(&self.inner.verified).contains_key(entry)
    }

    pub fn is_failed(&self, entry: &str) -> bool {
        lock(&self.inner.failed).contains(entry)
    }

    fn record_success(&self, entry: &str, chains: Vec<CertificateChain>) {
        if self.is_failed(entry) {
            return;
        }
        let mut verified = lock(&self.inner.verified);
        let known = verified.entry(entry.to_string()).or_default();
        for chain in chains {
            if !known.contains(&chain) {
                known.push(chain);
            }
        }
    }

    fn record_failure(&self, entry: &str) {
        lock(&self.inner.verified).remove(entry);
        lock(&self.inner.failed).insert(entry.to_string());
    }
}

/// Running digest state for one entry.
pub struct EntryVerifier {
    verifier: Verifier,
    entry: String,
    hasher: EntryHasher,
    expected: String,
    chains: Vec<CertificateChain>,
}

impl std::fmt::Debug for EntryVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryVerifier")
            .field("entry", &self.entry)
            .field("algorithm", &self.hasher.algorithm())
            .finish_non_exhaustive()
    }
}

impl EntryVerifier {
    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.hasher.algorithm()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Compare the digest of everything fed so far with the manifest.
    pub fn finish(self) -> Result<(), TrustError> {
        let Self {
            verifier,
            entry,
            hasher,
            expected,
            chains,
        } = self;
        let algorithm = hasher.algorithm();
        let computed = hasher.finalize();
        if digest_matches(&computed, &expected) {
            tracing::debug!(archive = %verifier.archive_name(), entry = %entry, "entry verified");
            verifier.record_success(&entry, chains);
            Ok(())
        } else {
            verifier.record_failure(&entry);
            Err(TrustError::new(
                TrustErrorKind::EntryDigestMismatch,
                verifier.archive_name(),
                entry,
                format!("{} digest does not match manifest", algorithm.name()),
            ))
        }
    }

    /// The stream ended after `read` of `declared` bytes.
    pub fn truncated(self, read: u64, declared: u64) -> TrustError {
        self.verifier.record_failure(&self.entry);
        TrustError::new(
            TrustErrorKind::EntryTruncated,
            self.verifier.archive_name(),
            self.entry,
            format!("stream ended after {} of {} bytes", read, declared),
        )
    }
}
