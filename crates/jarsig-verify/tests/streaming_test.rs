//! Streaming verification over tar and tar.gz.

mod common;

use std::io::Read;

use common::*;
use jarsig_verify::{open_tar_gz, StreamingArchive, TrustErrorKind, VerifierState, VerifyError};

const A: &[u8] = b"first signed entry";
const B: &[u8] = b"second signed entry";

fn collect<R: Read>(archive: &mut StreamingArchive<'_, R>) -> Vec<(String, Vec<u8>)> {
    let mut out = Vec::new();
    for entry in archive.by_ref() {
        let mut entry = entry.unwrap();
        let mut content = Vec::new();
        entry.read_to_end(&mut content).unwrap();
        out.push((entry.name().to_string(), content));
    }
    out
}

#[test]
fn leading_metadata_verifies_entries() {
    init_tracing();
    let bytes = tar_bytes(&members(&[("a.txt", A), ("b.txt", B)], &[("c.txt", b"c")]), true);
    let mut tar = tar::Archive::new(bytes.as_slice());
    let mut archive = StreamingArchive::new("app.tar", &mut tar).unwrap();
    assert!(archive.is_signed());
    assert!(archive.attributes("a.txt").is_some());

    let seen = collect(&mut archive);
    let names: Vec<&str> = seen.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec![SIGNATURE_FILE, SIGNATURE_BLOCK, "a.txt", "b.txt", "c.txt"]);
    assert_eq!(seen[2].1, A);

    assert_eq!(archive.certificates("a.txt").unwrap()[0].subject, SIGNER);
    assert!(archive.certificates("b.txt").is_some());
    assert!(archive.certificates("c.txt").is_none());
    assert_eq!(
        archive.verifier().unwrap().state(),
        VerifierState::Verified
    );
}

#[test]
fn manifest_is_available_before_first_entry() {
    let bytes = tar_bytes(&members(&[("a.txt", A)], &[]), false);
    let mut tar = tar::Archive::new(bytes.as_slice());
    let archive = StreamingArchive::new("app.tar", &mut tar).unwrap();
    let manifest = archive.manifest().unwrap();
    assert_eq!(manifest.main_attributes().get("Manifest-Version"), Some("1.0"));
    assert!(archive.certificates("a.txt").is_none());
}

#[test]
fn tampered_entry_fails_at_its_end() {
    let mut members = members(&[("a.txt", A), ("b.txt", B)], &[]);
    let a = members.iter_mut().find(|(n, _)| n == "a.txt").unwrap();
    a.1[0] = b'F';
    let bytes = tar_bytes(&members, false);
    let mut tar = tar::Archive::new(bytes.as_slice());
    let mut archive = StreamingArchive::new("bad.tar", &mut tar).unwrap();

    let mut failed = None;
    for entry in archive.by_ref() {
        let mut entry = entry.unwrap();
        let mut content = Vec::new();
        if let Err(e) = entry.read_to_end(&mut content) {
            failed = Some((entry.name().to_string(), e));
        }
    }
    let (name, err) = failed.unwrap();
    assert_eq!(name, "a.txt");
    assert_eq!(
        VerifyError::from_io_error(&err).unwrap().kind,
        TrustErrorKind::EntryDigestMismatch
    );
    assert!(archive.certificates("a.txt").is_none());
    assert!(archive.certificates("b.txt").is_some());
    assert_eq!(archive.verifier().unwrap().state(), VerifierState::Untrusted);
}

#[test]
fn drain_surfaces_trust_errors() {
    let mut members = members(&[("a.txt", A)], &[]);
    members.last_mut().unwrap().1.push(b'!');
    let bytes = tar_bytes(&members, false);
    let mut tar = tar::Archive::new(bytes.as_slice());
    let mut archive = StreamingArchive::new("bad.tar", &mut tar).unwrap();
    let err = archive.drain().unwrap_err();
    assert!(err.is_trust_failure());
}

#[test]
fn manifest_not_first_disables_verification() {
    let mut members = members(&[("a.txt", A)], &[]);
    let content = members.pop().unwrap();
    members.insert(0, content);
    let bytes = tar_bytes(&members, false);
    let mut tar = tar::Archive::new(bytes.as_slice());
    let mut archive = StreamingArchive::new("late.tar", &mut tar).unwrap();
    assert!(archive.manifest().is_none());
    assert!(!archive.is_signed());

    let seen = collect(&mut archive);
    let names: Vec<&str> = seen.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["a.txt", MANIFEST, SIGNATURE_FILE, SIGNATURE_BLOCK]);
    assert!(archive.certificates("a.txt").is_none());
}

#[test]
fn signature_after_content_is_not_used() {
    let members = members(&[("a.txt", A)], &[]);
    // MANIFEST.MF, a.txt, CERT.SF, CERT.EC
    let reordered = vec![
        members[0].clone(),
        members[3].clone(),
        members[1].clone(),
        members[2].clone(),
    ];
    let bytes = tar_bytes(&reordered, false);
    let mut tar = tar::Archive::new(bytes.as_slice());
    let mut archive = StreamingArchive::new("late-sig.tar", &mut tar).unwrap();
    assert!(archive.manifest().is_some());
    assert!(!archive.is_signed());
    let seen = collect(&mut archive);
    assert_eq!(seen.len(), 3);
    assert!(archive.certificates("a.txt").is_none());
}

#[test]
fn directory_before_manifest_disables_verification() {
    let members = members(&[("a.txt", A)], &[]);
    let bytes = tar_bytes_with_dirs(&["lib/"], &members);
    let mut tar = tar::Archive::new(bytes.as_slice());
    let mut archive = StreamingArchive::new("dir-first.tar", &mut tar).unwrap();
    assert!(archive.manifest().is_none());

    let seen = collect(&mut archive);
    let names: Vec<&str> = seen.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec![MANIFEST, SIGNATURE_FILE, SIGNATURE_BLOCK, "a.txt"]);
    assert!(archive.certificates("a.txt").is_none());
}

#[test]
fn metadata_directory_may_precede_manifest() {
    let members = members(&[("a.txt", A)], &[]);
    let bytes = tar_bytes_with_dirs(&["META-INF"], &members);
    let mut tar = tar::Archive::new(bytes.as_slice());
    let mut archive = StreamingArchive::new("meta-dir.tar", &mut tar).unwrap();
    assert!(archive.is_signed());
    archive.drain().unwrap();
    assert!(archive.certificates("a.txt").is_some());
}

#[test]
fn gzip_stream_verifies() {
    let bytes = gzip(&tar_bytes(&members(&[("a.txt", A)], &[]), true));
    let mut tar = open_tar_gz(bytes.as_slice());
    let mut archive = StreamingArchive::new("app.tar.gz", &mut tar).unwrap();
    let names = archive.drain().unwrap();
    assert_eq!(names.last().map(String::as_str), Some("a.txt"));
    assert!(archive.certificates("a.txt").is_some());
}

#[test]
fn tampered_metadata_fails_before_any_entry() {
    let mut members = members(&[("a.txt", A)], &[]);
    members[0].1 = manifest_for(&[("a.txt", b"something else")]);
    let bytes = tar_bytes(&members, false);
    let mut tar = tar::Archive::new(bytes.as_slice());
    let err = StreamingArchive::new("meta.tar", &mut tar).unwrap_err();
    assert!(err.is_trust_failure());
}

#[test]
fn empty_stream_has_no_entries() {
    let bytes = tar::Builder::new(Vec::new()).into_inner().unwrap();
    let mut tar = tar::Archive::new(bytes.as_slice());
    let mut archive = StreamingArchive::new("empty.tar", &mut tar).unwrap();
    assert!(archive.next().is_none());
    assert!(archive.manifest().is_none());
}
