//! Metadata directory naming rules.
//!
//! Metadata members live directly under `META-INF/`. Names are compared
//! upper-cased, so `meta-inf/cert.sf` and `META-INF/CERT.SF` are the same
//! member.

pub const META_DIR: &str = "META-INF/";
pub const MANIFEST_NAME: &str = "META-INF/MANIFEST.MF";

/// Signature block suffixes, each pairing with a `.SF` file of the same base name.
pub const SIGNATURE_BLOCK_SUFFIXES: &[&str] = &[".RSA", ".DSA", ".EC"];
pub const SIGNATURE_FILE_SUFFIX: &str = ".SF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    Manifest,
    SignatureFile,
    SignatureBlock,
    /// Some other file directly under `META-INF/`.
    Other,
}

/// Upper-cased form used as the metadata key.
pub fn normalize(name: &str) -> String {
    name.to_ascii_uppercase()
}

/// The `META-INF/` directory entry itself.
pub fn is_meta_dir(name: &str) -> bool {
    name.eq_ignore_ascii_case(META_DIR) || name.eq_ignore_ascii_case("META-INF")
}

/// Classify a member name. `None` for anything outside the metadata directory.
pub fn classify(name: &str) -> Option<MetadataKind> {
    let upper = normalize(name);
    let rest = upper.strip_prefix(META_DIR)?;
    if rest.is_empty() || rest.contains('/') {
        return None;
    }
    if upper == MANIFEST_NAME {
        Some(MetadataKind::Manifest)
    } else if rest.ends_with(SIGNATURE_FILE_SUFFIX) {
        Some(MetadataKind::SignatureFile)
    } else if SIGNATURE_BLOCK_SUFFIXES.iter().any(|s| rest.ends_with(s)) {
        Some(MetadataKind::SignatureBlock)
    } else {
        Some(MetadataKind::Other)
    }
}

pub fn is_metadata_member(name: &str) -> bool {
    classify(name).is_some()
}

/// Members the verifier needs: the manifest, signature files and blocks.
pub fn is_signature_related(name: &str) -> bool {
    matches!(
        classify(name),
        Some(MetadataKind::Manifest | MetadataKind::SignatureFile | MetadataKind::SignatureBlock)
    )
}

/// `META-INF/CERT.RSA` -> `META-INF/CERT.SF`.
pub fn signature_file_for_block(block: &str) -> Option<String> {
    let upper = normalize(block);
    let dot = upper.rfind('.')?;
    Some(format!("{}{}", &upper[..dot], SIGNATURE_FILE_SUFFIX))
}
