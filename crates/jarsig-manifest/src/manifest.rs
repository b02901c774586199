//! Parsed manifest and its signing chunks.

use std::collections::btree_map;
use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Write};
use std::ops::Range;

use crate::attributes::Attributes;
use crate::error::ManifestResult;
use crate::limits::{read_bounded, ParseOptions};
use crate::reader::{self, SectionSpans};
use crate::writer;

/// Raw bytes of a parsed manifest plus the span of every section.
///
/// Only produced when [`ParseOptions::capture_chunks`] is set. The spans
/// index into the exact bytes that were parsed, original line endings
/// included, so digests computed over them match what a signer hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestChunks {
    raw: Vec<u8>,
    main: Range<usize>,
    sections: HashMap<String, Range<usize>>,
}

impl ManifestChunks {
    fn new(raw: Vec<u8>, spans: SectionSpans) -> Self {
        Self {
            raw,
            main: spans.main,
            sections: spans.sections,
        }
    }

    /// The whole manifest as parsed.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Main section including its terminating blank line.
    pub fn main_section(&self) -> &[u8] {
        &self.raw[self.main.clone()]
    }

    pub fn section(&self, entry: &str) -> Option<&[u8]> {
        self.sections.get(entry).map(|r| &self.raw[r.clone()])
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }
}

/// Main attributes plus per-entry attributes.
///
/// Equality compares attributes only; captured chunks are ignored.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    main: Attributes,
    entries: BTreeMap<String, Attributes>,
    chunks: Option<ManifestChunks>,
}

impl PartialEq for Manifest {
    fn eq(&self, other: &Self) -> bool {
        self.main == other.main && self.entries == other.entries
    }
}

impl Eq for Manifest {}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse with default options (no chunk capture).
    pub fn parse(bytes: &[u8]) -> ManifestResult<Self> {
        Self::parse_with(bytes, &ParseOptions::default())
    }

    pub fn parse_with(bytes: &[u8], options: &ParseOptions) -> ManifestResult<Self> {
        let parsed = reader::parse(bytes, options)?;
        let chunks = parsed
            .spans
            .map(|spans| ManifestChunks::new(bytes.to_vec(), spans));
        Ok(Self {
            main: parsed.main,
            entries: parsed.entries,
            chunks,
        })
    }

    /// Parse an owned buffer; captured chunks take ownership without copying.
    pub fn parse_owned(bytes: Vec<u8>, options: &ParseOptions) -> ManifestResult<Self> {
        let parsed = reader::parse(&bytes, options)?;
        let chunks = parsed.spans.map(|spans| ManifestChunks::new(bytes, spans));
        Ok(Self {
            main: parsed.main,
            entries: parsed.entries,
            chunks,
        })
    }

    /// Read at most `options.limits.max_manifest_bytes` and parse.
    pub fn from_reader<R: Read>(reader: R, options: &ParseOptions) -> ManifestResult<Self> {
        let bytes = read_bounded(reader, options.limits.max_manifest_bytes)?;
        Self::parse_owned(bytes, options)
    }

    pub fn main_attributes(&self) -> &Attributes {
        &self.main
    }

    pub fn main_attributes_mut(&mut self) -> &mut Attributes {
        &mut self.main
    }

    /// Attributes of one entry's section.
    pub fn attributes(&self, entry: &str) -> Option<&Attributes> {
        self.entries.get(entry)
    }

    pub fn attributes_mut(&mut self, entry: &str) -> Option<&mut Attributes> {
        self.entries.get_mut(entry)
    }

    pub fn insert_entry(&mut self, entry: impl Into<String>, attrs: Attributes) -> Option<Attributes> {
        self.entries.insert(entry.into(), attrs)
    }

    pub fn remove_entry(&mut self, entry: &str) -> Option<Attributes> {
        self.entries.remove(entry)
    }

    pub fn entries(&self) -> btree_map::Iter<'_, String, Attributes> {
        self.entries.iter()
    }

    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn chunks(&self) -> Option<&ManifestChunks> {
        self.chunks.as_ref()
    }

    /// Move the captured chunks out, leaving the manifest without them.
    pub fn take_chunks(&mut self) -> Option<ManifestChunks> {
        self.chunks.take()
    }

    /// Write in wire format (CRLF, 72-byte lines).
    pub fn write_to<W: Write>(&self, out: &mut W) -> ManifestResult<()> {
        writer::write_manifest(out, self)
    }

    pub fn to_bytes(&self) -> ManifestResult<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }
}
