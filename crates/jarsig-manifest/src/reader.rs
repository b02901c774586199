//! Line-folding manifest parser.
//!
//! Works on raw bytes. Physical lines end at `\n`, `\r\n` or a lone `\r`;
//! a physical line starting with one space continues the previous logical
//! line. Sections are separated by blank lines. Character decoding happens
//! only after a logical line has been unfolded, so folds may split
//! multi-byte sequences.

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

use crate::attributes::Attributes;
use crate::error::{ErrorCode, ManifestError, ManifestResult};
use crate::limits::ParseOptions;
use crate::name::{AttributeName, NAME};
use crate::text::{decode, TextEncoding};

/// Byte ranges of every section, relative to the parsed buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SectionSpans {
    pub(crate) main: Range<usize>,
    pub(crate) sections: HashMap<String, Range<usize>>,
}

/// Result of a parse. Pure data; nothing is shared between parses.
#[derive(Debug, Clone, Default)]
pub(crate) struct Parsed {
    pub(crate) main: Attributes,
    pub(crate) entries: BTreeMap<String, Attributes>,
    pub(crate) spans: Option<SectionSpans>,
}

#[derive(Debug, Clone, Copy)]
struct Physical {
    start: usize,
    content_end: usize,
    end: usize,
    terminated: bool,
}

enum Logical {
    Blank,
    Header { bytes: Vec<u8>, line: usize },
}

struct LineScanner<'a> {
    buf: &'a [u8],
    pos: usize,
    line_no: usize,
    max_line: usize,
}

impl<'a> LineScanner<'a> {
    fn new(buf: &'a [u8], max_line: usize) -> Self {
        Self {
            buf,
            pos: 0,
            line_no: 0,
            max_line,
        }
    }

    fn peek_physical(&self) -> ManifestResult<Option<Physical>> {
        if self.pos >= self.buf.len() {
            return Ok(None);
        }
        let rest = &self.buf[self.pos..];
        let stop = rest
            .iter()
            .position(|&b| b == b'\n' || b == b'\r' || b == 0);

        let (content_len, term_len, terminated) = match stop {
            Some(i) if rest[i] == 0 => {
                return Err(ManifestError::structural(
                    ErrorCode::NulByte,
                    "NUL character in manifest",
                )
                .at_line(self.line_no + 1));
            }
            Some(i) if rest[i] == b'\r' && rest.get(i + 1) == Some(&b'\n') => (i, 2, true),
            Some(i) => (i, 1, true),
            None => (rest.len(), 0, false),
        };

        if content_len > self.max_line {
            return Err(ManifestError::structural(
                ErrorCode::LineTooLong,
                format!(
                    "line length {} exceeds limit {}",
                    content_len, self.max_line
                ),
            )
            .at_line(self.line_no + 1));
        }

        Ok(Some(Physical {
            start: self.pos,
            content_end: self.pos + content_len,
            end: self.pos + content_len + term_len,
            terminated,
        }))
    }

    fn advance(&mut self, line: &Physical) {
        self.pos = line.end;
        self.line_no += 1;
    }

    fn next_logical(&mut self) -> ManifestResult<Option<Logical>> {
        let Some(first) = self.peek_physical()? else {
            return Ok(None);
        };

        if first.content_end == first.start {
            self.advance(&first);
            return Ok(first.terminated.then_some(Logical::Blank));
        }

        if self.buf[first.start] == b' ' {
            return Err(ManifestError::structural(
                ErrorCode::OrphanContinuation,
                "continuation line without a preceding attribute",
            )
            .at_line(self.line_no + 1));
        }

        self.advance(&first);
        let line = self.line_no;
        let mut bytes = self.buf[first.start..first.content_end].to_vec();

        while let Some(next) = self.peek_physical()? {
            if next.content_end == next.start || self.buf[next.start] != b' ' {
                break;
            }
            bytes.extend_from_slice(&self.buf[next.start + 1..next.content_end]);
            self.advance(&next);
        }

        Ok(Some(Logical::Header { bytes, line }))
    }
}

/// Split an unfolded `Key: Value` line.
fn split_header(
    bytes: &[u8],
    line: usize,
    encoding: Option<TextEncoding>,
) -> ManifestResult<(AttributeName, String)> {
    let colon = bytes.iter().position(|&b| b == b':').ok_or_else(|| {
        ManifestError::structural(ErrorCode::MissingColon, "attribute line has no ':'")
            .at_line(line)
    })?;

    let key = String::from_utf8_lossy(&bytes[..colon]);
    if bytes.get(colon + 1) != Some(&b' ') {
        return Err(ManifestError::structural(
            ErrorCode::MissingSpace,
            format!("invalid value for attribute '{}': expected ': '", key),
        )
        .at_line(line));
    }

    let name = AttributeName::new(key.into_owned())
        .map_err(|e| ManifestError::invalid_key(e).at_line(line))?;
    let value = decode(&bytes[colon + 2..], encoding);
    Ok((name, value))
}

/// Parse a complete manifest buffer.
pub(crate) fn parse(buf: &[u8], options: &ParseOptions) -> ManifestResult<Parsed> {
    let mut scanner = LineScanner::new(buf, options.limits.max_line_bytes);
    let encoding = options.encoding;

    let mut main = Attributes::new();
    while let Some(Logical::Header { bytes, line }) = scanner.next_logical()? {
        let (name, value) = split_header(&bytes, line, encoding)?;
        main.put(name, value);
    }
    let main_end = scanner.pos;

    if let Some(required) = &options.required_version {
        if main.get_name(required).is_none() {
            return Err(ManifestError::structural(
                ErrorCode::MissingVersion,
                format!("main section is missing '{}'", required),
            ));
        }
    }

    let mut entries: BTreeMap<String, Attributes> = BTreeMap::new();
    let mut sections: Option<HashMap<String, Range<usize>>> =
        options.capture_chunks.then(HashMap::new);
    let mut mark = scanner.pos;

    loop {
        let (bytes, line) = match scanner.next_logical()? {
            None => break,
            Some(Logical::Blank) => {
                // Extra separators belong to no section.
                mark = scanner.pos;
                continue;
            }
            Some(Logical::Header { bytes, line }) => (bytes, line),
        };

        let (key, entry_name) = split_header(&bytes, line, encoding)?;
        if !key.eq_ignore_case(NAME) {
            return Err(ManifestError::structural(
                ErrorCode::UnnamedSection,
                format!("section starts with '{}' instead of 'Name'", key),
            )
            .at_line(line));
        }

        let mut attrs = Attributes::new();
        while let Some(Logical::Header { bytes, line }) = scanner.next_logical()? {
            let (name, value) = split_header(&bytes, line, encoding)?;
            attrs.put(name, value);
        }
        let end = scanner.pos;

        if let Some(sections) = sections.as_mut() {
            if sections.contains_key(&entry_name) {
                return Err(ManifestError::structural(
                    ErrorCode::DuplicateSection,
                    format!("more than one section named '{}'", entry_name),
                )
                .at_line(line));
            }
            sections.insert(entry_name.clone(), mark..end);
        }

        entries.entry(entry_name).or_default().extend_from(attrs);
        mark = end;
    }

    tracing::debug!(
        bytes = buf.len(),
        sections = entries.len(),
        chunks = sections.is_some(),
        "parsed manifest"
    );
    Ok(Parsed {
        main,
        entries,
        spans: sections.map(|sections| SectionSpans {
            main: 0..main_end,
            sections,
        }),
    })
}
