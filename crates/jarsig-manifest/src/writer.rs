use std::io::Write;

use crate::attributes::Attributes;
use crate::error::{ErrorCode, ManifestError, ManifestResult};
use crate::manifest::Manifest;
use crate::name::{MANIFEST_VERSION, NAME, SIGNATURE_VERSION};

/// Maximum bytes per physical line, terminator excluded.
pub const LINE_LENGTH: usize = 72;

const CRLF: &[u8] = b"\r\n";

pub(crate) fn write_manifest<W: Write>(out: &mut W, manifest: &Manifest) -> ManifestResult<()> {
    let main = manifest.main_attributes();
    let version_key = [MANIFEST_VERSION, SIGNATURE_VERSION]
        .into_iter()
        .find(|k| main.contains(k));

    if let Some(key) = version_key {
        if let Some(value) = main.get(key) {
            write_attribute(out, key, value)?;
        }
    }
    write_section_body(out, main, version_key)?;
    out.write_all(CRLF)?;

    for (name, attrs) in manifest.entries() {
        write_attribute(out, NAME, name)?;
        write_section_body(out, attrs, None)?;
        out.write_all(CRLF)?;
    }
    Ok(())
}

fn write_section_body<W: Write>(
    out: &mut W,
    attrs: &Attributes,
    skip: Option<&str>,
) -> ManifestResult<()> {
    for (name, value) in attrs {
        if skip.is_some_and(|s| name.eq_ignore_case(s)) {
            continue;
        }
        write_attribute(out, name.as_str(), value)?;
    }
    Ok(())
}

/// Write one `Key: Value` line, folded at `LINE_LENGTH` bytes.
pub(crate) fn write_attribute<W: Write>(out: &mut W, key: &str, value: &str) -> ManifestResult<()> {
    if let Some(bad) = value.bytes().find(|b| matches!(b, b'\r' | b'\n' | 0)) {
        return Err(ManifestError::structural(
            ErrorCode::InvalidValue,
            format!("value of '{}' contains byte {:#04x}", key, bad),
        ));
    }

    let mut line = Vec::with_capacity(key.len() + 2 + value.len());
    line.extend_from_slice(key.as_bytes());
    line.extend_from_slice(b": ");
    line.extend_from_slice(value.as_bytes());

    let first = line.len().min(LINE_LENGTH);
    out.write_all(&line[..first])?;
    out.write_all(CRLF)?;
    for chunk in line[first..].chunks(LINE_LENGTH - 1) {
        out.write_all(b" ")?;
        out.write_all(chunk)?;
        out.write_all(CRLF)?;
    }
    Ok(())
}
