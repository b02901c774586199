//! Fixture builders: signed metadata, memory/tar/zip archives.

#![allow(dead_code)]

use std::io::Write;

use ed25519_dalek::SigningKey;
use jarsig_manifest::{Attributes, Manifest, ParseOptions};
use jarsig_verify::{CertificateEntry, DigestAlgorithm, MemoryContainer, SignatureBlock};

pub const MANIFEST: &str = "META-INF/MANIFEST.MF";
pub const SIGNATURE_FILE: &str = "META-INF/CERT.SF";
pub const SIGNATURE_BLOCK: &str = "META-INF/CERT.EC";

pub const SIGNER: &str = "CN=jarsig test signer";
pub const ROOT: &str = "CN=jarsig test root";

/// Deterministic test key seeds.
pub fn signer_key() -> SigningKey {
    SigningKey::from_bytes(&[0x11; 32])
}

pub fn root_key() -> SigningKey {
    SigningKey::from_bytes(&[0x22; 32])
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Manifest with a SHA-256 digest section per entry.
pub fn manifest_for(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut manifest = Manifest::new();
    manifest
        .main_attributes_mut()
        .insert("Manifest-Version", "1.0")
        .unwrap();
    manifest
        .main_attributes_mut()
        .insert("Created-By", "jarsig tests")
        .unwrap();
    for (name, content) in entries {
        let mut attrs = Attributes::new();
        attrs.insert("Digest-Algorithms", "SHA-256").unwrap();
        attrs
            .insert("SHA-256-Digest", DigestAlgorithm::Sha256.digest_base64(content))
            .unwrap();
        manifest.insert_entry(*name, attrs);
    }
    manifest.to_bytes().unwrap()
}

/// Signature file attesting every section of `manifest`.
pub fn signature_file_for(manifest: &[u8]) -> Vec<u8> {
    signature_file_naming(manifest, None)
}

/// Signature file attesting only the listed sections, or all of them for `None`.
pub fn signature_file_naming(manifest: &[u8], only: Option<&[&str]>) -> Vec<u8> {
    let mut parsed = Manifest::parse_with(manifest, &ParseOptions::default().capture_chunks()).unwrap();
    let chunks = parsed.take_chunks().unwrap();

    let mut sf = Manifest::new();
    let main = sf.main_attributes_mut();
    main.insert("Signature-Version", "1.0").unwrap();
    main.insert("Created-By", "jarsig tests").unwrap();
    main.insert("Digest-Algorithms", "SHA-256").unwrap();
    main.insert(
        "SHA-256-Digest-Manifest-Main-Attributes",
        DigestAlgorithm::Sha256.digest_base64(chunks.main_section()),
    )
    .unwrap();
    main.insert(
        "SHA-256-Digest-Manifest",
        DigestAlgorithm::Sha256.digest_base64(chunks.raw()),
    )
    .unwrap();
    for name in parsed.entry_names() {
        if only.is_some_and(|only| !only.contains(&name)) {
            continue;
        }
        let mut attrs = Attributes::new();
        attrs.insert("Digest-Algorithms", "SHA-256").unwrap();
        attrs
            .insert(
                "SHA-256-Digest",
                DigestAlgorithm::Sha256.digest_base64(chunks.section(name).unwrap()),
            )
            .unwrap();
        sf.insert_entry(name, attrs);
    }
    sf.to_bytes().unwrap()
}

/// Two-certificate block (signer issued by a self-signed root).
pub fn signature_block_for(sf: &[u8]) -> Vec<u8> {
    let signer = signer_key();
    let root = root_key();
    SignatureBlock::sign(
        sf,
        &signer,
        vec![
            CertificateEntry::issue(SIGNER, &signer.verifying_key(), ROOT, &root),
            CertificateEntry::self_signed(ROOT, &root),
        ],
    )
    .to_bytes()
    .unwrap()
}

/// Single-certificate block signed by a self-issued `subject`.
pub fn self_signed_block_for(sf: &[u8], subject: &str, key: &SigningKey) -> Vec<u8> {
    SignatureBlock::sign(sf, key, vec![CertificateEntry::self_signed(subject, key)])
        .to_bytes()
        .unwrap()
}

/// Manifest, signature file and block, in that order.
pub fn metadata_for_manifest(manifest: Vec<u8>) -> Vec<(String, Vec<u8>)> {
    let sf = signature_file_for(&manifest);
    let block = signature_block_for(&sf);
    vec![
        (MANIFEST.to_string(), manifest),
        (SIGNATURE_FILE.to_string(), sf),
        (SIGNATURE_BLOCK.to_string(), block),
    ]
}

pub fn metadata_for(signed: &[(&str, &[u8])]) -> Vec<(String, Vec<u8>)> {
    metadata_for_manifest(manifest_for(signed))
}

/// Signed metadata for `signed`, then every entry of `signed` and `unsigned`.
pub fn members(signed: &[(&str, &[u8])], unsigned: &[(&str, &[u8])]) -> Vec<(String, Vec<u8>)> {
    let mut out = metadata_for(signed);
    for (name, content) in signed.iter().chain(unsigned) {
        out.push((name.to_string(), content.to_vec()));
    }
    out
}

pub fn memory_container(members: &[(String, Vec<u8>)]) -> MemoryContainer {
    let mut container = MemoryContainer::new();
    for (name, content) in members {
        container.insert(name.clone(), content.clone());
    }
    container
}

/// Tar stream with the members in the given order.
pub fn tar_bytes(members: &[(String, Vec<u8>)], meta_dir_first: bool) -> Vec<u8> {
    let dirs: &[&str] = if meta_dir_first { &["META-INF/"] } else { &[] };
    tar_bytes_with_dirs(dirs, members)
}

/// Tar stream starting with the given directory entries.
pub fn tar_bytes_with_dirs(dirs: &[&str], members: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for dir in dirs {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Directory);
        header.set_size(0);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, dir, std::io::empty()).unwrap();
    }
    for (name, content) in members {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, content.as_slice())
            .unwrap();
    }
    builder.into_inner().unwrap()
}

pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

/// Zip file on disk with the members in the given order.
pub fn zip_file(dir: &std::path::Path, members: &[(String, Vec<u8>)]) -> std::path::PathBuf {
    let path = dir.join("fixture.jar");
    let file = std::fs::File::create(&path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    writer.add_directory("META-INF/", options).unwrap();
    for (name, content) in members {
        writer.start_file(name.as_str(), options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap();
    path
}
