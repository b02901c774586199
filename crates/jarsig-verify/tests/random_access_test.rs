//! Random-access verification over memory, directory and zip containers.

mod common;

use std::io::Read;
use std::sync::Arc;

use common::*;
use jarsig_verify::{
    DigestAlgorithm, Ed25519BlockVerifier, SignedArchive, TrustErrorKind, TrustStore,
    VerifierState, VerifyConfig, VerifyError, ZipContainer,
};

const A: &[u8] = b"alpha content\n";
const B: &[u8] = b"bravo content\n";

#[test]
fn scenario_a_matching_content_yields_signer_chain() {
    init_tracing();
    let manifest = format!(
        "Manifest-Version: 1.0\n\nName: a.txt\nSHA-Digest: {}\n\n",
        DigestAlgorithm::Sha1.digest_base64(A)
    );
    let section = format!(
        "Name: a.txt\nSHA-Digest: {}\n\n",
        DigestAlgorithm::Sha1.digest_base64(A)
    );
    let sf = format!(
        "Signature-Version: 1.0\nSHA-Digest-Manifest: {}\n\nName: a.txt\nSHA-Digest: {}\n\n",
        DigestAlgorithm::Sha1.digest_base64(manifest.as_bytes()),
        DigestAlgorithm::Sha1.digest_base64(section.as_bytes()),
    )
    .into_bytes();
    let block = signature_block_for(&sf);
    let container = memory_container(&[
        (MANIFEST.to_string(), manifest.into_bytes()),
        ("META-INF/CERT.SF".to_string(), sf),
        ("META-INF/CERT.RSA".to_string(), block),
        ("a.txt".to_string(), A.to_vec()),
    ]);

    let mut archive = SignedArchive::open("scenario-a.jar", container).unwrap();
    assert!(archive.is_signed());
    assert!(archive.certificates("a.txt").is_none(), "nothing read yet");

    assert_eq!(archive.read_entry("a.txt").unwrap(), A);
    let chains = archive.certificate_chains("a.txt").unwrap();
    assert_eq!(chains.len(), 1);
    assert_eq!(chains[0].signer().unwrap().subject, SIGNER);
    assert_eq!(chains[0].root().unwrap().subject, ROOT);
    assert_eq!(archive.state(), Some(VerifierState::Verified));
}

#[test]
fn scenario_b_one_byte_change_fails_when_fully_consumed() {
    let mut members = members(&[("a.txt", A)], &[]);
    members.last_mut().unwrap().1[0] ^= 0x01;
    let mut archive = SignedArchive::open("b.jar", memory_container(&members)).unwrap();

    let mut reader = archive.open_entry("a.txt").unwrap();
    let mut head = vec![0u8; A.len() - 1];
    reader.read_exact(&mut head).unwrap();
    let mut last = [0u8; 1];
    let err = reader.read(&mut last).unwrap_err();
    let trust = VerifyError::from_io_error(&err).unwrap();
    assert_eq!(trust.kind, TrustErrorKind::EntryDigestMismatch);
    assert_eq!(trust.subject, "a.txt");
    assert_eq!(trust.archive, "b.jar");
    drop(reader);

    assert!(archive.certificates("a.txt").is_none());
    assert_eq!(archive.state(), Some(VerifierState::Untrusted));

    let err = archive.read_entry("a.txt").unwrap_err();
    assert!(err.is_trust_failure());
    assert_eq!(err.exit_code(), 4);
}

#[test]
fn scenario_c_entry_missing_from_manifest_is_unsigned() {
    let members = members(&[("a.txt", A)], &[("b.txt", B)]);
    let mut archive = SignedArchive::open("c.jar", memory_container(&members)).unwrap();
    assert_eq!(archive.read_entry("b.txt").unwrap(), B);
    assert!(archive.certificates("b.txt").is_none());
    assert!(archive.attributes("b.txt").is_none());
    assert_eq!(archive.state(), Some(VerifierState::Seeded));
}

#[test]
fn scenario_d_main_attributes_mismatch_fails_at_open() {
    let manifest = manifest_for(&[("a.txt", A)]);
    let mut members = metadata_for_manifest(manifest.clone());

    // Same sections, different main attributes.
    let mut parsed = jarsig_verify::Manifest::parse(&manifest).unwrap();
    parsed
        .main_attributes_mut()
        .insert("Implementation-Title", "tampered")
        .unwrap();
    members[0].1 = parsed.to_bytes().unwrap();
    members.push(("a.txt".to_string(), A.to_vec()));

    let err = SignedArchive::open("d.jar", memory_container(&members)).unwrap_err();
    let trust = err.trust().unwrap();
    assert_eq!(trust.kind, TrustErrorKind::MainAttributesDigestMismatch);
    assert_eq!(trust.subject, SIGNATURE_FILE);
}

const SECOND_SIGNER: &str = "CN=jarsig second signer";

/// Metadata with a second signature file and block, signed by another key.
fn two_signers(signed: &[(&str, &[u8])], second_names: &[&str]) -> Vec<(String, Vec<u8>)> {
    let manifest = manifest_for(signed);
    let second_sf = signature_file_naming(&manifest, Some(second_names));
    let second_key = ed25519_dalek::SigningKey::from_bytes(&[0x44; 32]);
    let second_block = self_signed_block_for(&second_sf, SECOND_SIGNER, &second_key);

    let mut out = metadata_for_manifest(manifest);
    out.push(("META-INF/OTHER.SF".to_string(), second_sf));
    out.push(("META-INF/OTHER.RSA".to_string(), second_block));
    for (name, content) in signed {
        out.push((name.to_string(), content.to_vec()));
    }
    out
}

#[test]
fn entry_named_by_two_signature_files_records_both_chains() {
    let members = two_signers(&[("a.txt", A), ("b.txt", B)], &["a.txt", "b.txt"]);
    let mut archive = SignedArchive::open("two.jar", memory_container(&members)).unwrap();
    assert_eq!(archive.verifier().unwrap().signature_files().count(), 2);

    archive.read_entry("a.txt").unwrap();
    let chains = archive.certificate_chains("a.txt").unwrap();
    assert_eq!(chains.len(), 2);
    let mut signers: Vec<&str> = chains
        .iter()
        .map(|chain| chain.signer().unwrap().subject.as_str())
        .collect();
    signers.sort_unstable();
    assert_eq!(signers, vec![SECOND_SIGNER, SIGNER]);
    assert_eq!(archive.certificates("a.txt").unwrap().len(), 3);
}

#[test]
fn entry_named_by_one_of_two_signature_files_records_one_chain() {
    let members = two_signers(&[("a.txt", A), ("b.txt", B)], &["a.txt"]);
    let mut archive = SignedArchive::open("partial-two.jar", memory_container(&members)).unwrap();

    archive.read_entry("b.txt").unwrap();
    let chains = archive.certificate_chains("b.txt").unwrap();
    assert_eq!(chains.len(), 1);
    assert_eq!(chains[0].signer().unwrap().subject, SIGNER);

    archive.read_entry("a.txt").unwrap();
    assert_eq!(archive.certificate_chains("a.txt").unwrap().len(), 2);
    assert_eq!(archive.state(), Some(VerifierState::Verified));
}

#[test]
fn entries_can_be_read_in_any_order() {
    let members = members(&[("a.txt", A), ("dir/b.txt", B)], &[]);
    let mut archive = SignedArchive::open("order.jar", memory_container(&members)).unwrap();
    assert_eq!(archive.read_entry("dir/b.txt").unwrap(), B);
    assert_eq!(archive.state(), Some(VerifierState::PartiallyVerified));
    assert_eq!(archive.read_entry("a.txt").unwrap(), A);
    assert_eq!(archive.state(), Some(VerifierState::Verified));
    assert_eq!(archive.certificates("a.txt").unwrap().len(), 2);
}

#[test]
fn abandoned_read_publishes_nothing() {
    let members = members(&[("a.txt", A)], &[]);
    let mut archive = SignedArchive::open("partial.jar", memory_container(&members)).unwrap();
    {
        let mut reader = archive.open_entry("a.txt").unwrap();
        let mut buf = [0u8; 3];
        reader.read_exact(&mut buf).unwrap();
    }
    assert!(archive.certificates("a.txt").is_none());
    assert_eq!(archive.state(), Some(VerifierState::Seeded));
}

#[test]
fn archive_without_manifest_is_unsigned() {
    let container = memory_container(&[("a.txt".to_string(), A.to_vec())]);
    let mut archive = SignedArchive::open("plain.jar", container).unwrap();
    assert!(archive.manifest().is_none());
    assert!(!archive.is_signed());
    assert_eq!(archive.read_entry("a.txt").unwrap(), A);
    assert!(archive.certificates("a.txt").is_none());
}

#[test]
fn manifest_without_signature_is_unsigned() {
    let container = memory_container(&[
        (MANIFEST.to_string(), manifest_for(&[("a.txt", A)])),
        ("a.txt".to_string(), A.to_vec()),
    ]);
    let mut archive = SignedArchive::open("nosig.jar", container).unwrap();
    assert!(archive.manifest().is_some());
    assert!(archive.attributes("a.txt").is_some());
    assert!(!archive.is_signed());
    archive.read_entry("a.txt").unwrap();
    assert!(archive.certificates("a.txt").is_none());
}

#[test]
fn tampered_signature_file_is_a_block_failure() {
    let mut members = members(&[("a.txt", A)], &[]);
    members[1].1.extend_from_slice(b"Name: extra\r\nSHA-256-Digest: AAAA\r\n\r\n");
    let err = SignedArchive::open("sf.jar", memory_container(&members)).unwrap_err();
    assert_eq!(
        err.trust().unwrap().kind,
        TrustErrorKind::SignatureBlockInvalid
    );
}

#[test]
fn untrusted_root_is_rejected_with_trust_store() {
    let members = members(&[("a.txt", A)], &[]);

    let mut other = TrustStore::new();
    other
        .add_verifying_key(ed25519_dalek::SigningKey::from_bytes(&[0x33; 32]).verifying_key(), None)
        .unwrap();
    let err = SignedArchive::open_with(
        "pinned.jar",
        memory_container(&members),
        VerifyConfig::default(),
        Arc::new(Ed25519BlockVerifier::with_trust_store(other)),
    )
    .unwrap_err();
    assert_eq!(err.trust().unwrap().kind, TrustErrorKind::UntrustedSigner);

    let mut pinned = TrustStore::new();
    pinned
        .add_verifying_key(root_key().verifying_key(), Some("test root".to_string()))
        .unwrap();
    let mut archive = SignedArchive::open_with(
        "pinned.jar",
        memory_container(&members),
        VerifyConfig::default(),
        Arc::new(Ed25519BlockVerifier::with_trust_store(pinned)),
    )
    .unwrap();
    archive.read_entry("a.txt").unwrap();
    assert!(archive.certificates("a.txt").is_some());
}

#[test]
fn verification_can_be_disabled() {
    let mut members = members(&[("a.txt", A)], &[]);
    members.last_mut().unwrap().1 = b"not the signed content".to_vec();
    let mut archive = SignedArchive::open_with(
        "off.jar",
        memory_container(&members),
        VerifyConfig::default().with_verify(false),
        Arc::new(Ed25519BlockVerifier::new()),
    )
    .unwrap();
    assert!(!archive.is_signed());
    assert_eq!(archive.read_entry("a.txt").unwrap(), b"not the signed content");
}

#[test]
fn verify_all_reads_every_entry() {
    let members = members(&[("a.txt", A), ("b.txt", B)], &[("c.txt", b"c")]);
    let mut archive = SignedArchive::open("all.jar", memory_container(&members)).unwrap();
    assert_eq!(archive.verify_all().unwrap(), Some(VerifierState::Verified));
    assert!(archive.certificates("c.txt").is_none());
}

#[test]
fn missing_entry_is_not_found() {
    let members = members(&[("a.txt", A)], &[]);
    let mut archive = SignedArchive::open("nf.jar", memory_container(&members)).unwrap();
    let err = archive.open_entry("zzz").unwrap_err();
    assert!(matches!(err, VerifyError::NotFound { .. }));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn malformed_manifest_is_a_format_error() {
    let container = memory_container(&[(MANIFEST.to_string(), b"Manifest-Version:1.0\n\n".to_vec())]);
    let err = SignedArchive::open("bad.jar", container).unwrap_err();
    assert!(matches!(err, VerifyError::Format { .. }));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn required_manifest_version_is_enforced() {
    let container = memory_container(&[(MANIFEST.to_string(), b"Created-By: x\n\n".to_vec())]);
    let err = SignedArchive::open_with(
        "v.jar",
        container,
        VerifyConfig::default().with_require_manifest_version(true),
        Arc::new(Ed25519BlockVerifier::new()),
    )
    .unwrap_err();
    assert!(matches!(err, VerifyError::Format { .. }));
}

#[test]
fn directory_container_verifies() {
    let dir = tempfile::tempdir().unwrap();
    for (name, content) in members(&[("a.txt", A), ("nested/b.txt", B)], &[]) {
        let path = dir.path().join(&name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
    let container = jarsig_verify::DirectoryContainer::open(dir.path()).unwrap();
    let mut archive = SignedArchive::open("exploded", container).unwrap();
    assert_eq!(archive.read_entry("nested/b.txt").unwrap(), B);
    assert!(archive.certificates("nested/b.txt").is_some());
}

#[test]
fn zip_container_verifies_and_detects_tampering() {
    let dir = tempfile::tempdir().unwrap();
    let good = members(&[("a.txt", A), ("b.txt", B)], &[]);
    let path = zip_file(dir.path(), &good);
    let mut archive = SignedArchive::open("fixture.jar", ZipContainer::open(&path).unwrap()).unwrap();
    assert_eq!(archive.verify_all().unwrap(), Some(VerifierState::Verified));
    assert_eq!(archive.certificates("b.txt").unwrap()[0].subject, SIGNER);

    let mut bad = good.clone();
    bad.last_mut().unwrap().1 = b"bravo c0ntent\n".to_vec();
    let other_dir = tempfile::tempdir().unwrap();
    let path = zip_file(other_dir.path(), &bad);
    let mut archive = SignedArchive::open("fixture.jar", ZipContainer::open(&path).unwrap()).unwrap();
    assert_eq!(archive.read_entry("a.txt").unwrap(), A);
    let err = archive.read_entry("b.txt").unwrap_err();
    assert_eq!(err.trust().unwrap().kind, TrustErrorKind::EntryDigestMismatch);
}
