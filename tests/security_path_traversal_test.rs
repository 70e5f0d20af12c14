//! Path Traversal Prevention Tests
//!
//! Entry names are arbitrary bytes; extraction must never write outside the
//! destination directory.

use grf_rs::{GrfArchive, GrfError, NoProgress};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// Helper: Build an archive holding `names`, each with its own name as content
fn archive_with(path: &Path, names: &[&str]) -> GrfArchive {
    let mut archive = GrfArchive::new(path);
    for name in names {
        archive
            .add_or_replace_text(name, name.as_bytes().to_vec())
            .unwrap();
    }
    archive.save().unwrap();
    archive
}

fn assert_rejected(archive: &GrfArchive, dest: &Path, name: &str) {
    let report = archive.extract_all(dest, &mut NoProgress).unwrap();
    let failure = report
        .failed
        .iter()
        .find(|(failed, _)| failed == name)
        .unwrap_or_else(|| panic!("{} should have been rejected", name));
    assert!(matches!(failure.1, GrfError::CorruptEntry { .. }));
}

#[test]
fn test_path_traversal_dot_dot() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("out");
    let archive = archive_with(
        &dir.path().join("evil.grf"),
        &["..\\..\\escaped.txt", "data\\..\\..\\escaped2.txt", "safe.txt"],
    );

    assert_rejected(&archive, &dest, "..\\..\\escaped.txt");
    assert_rejected(&archive, &dest, "data\\..\\..\\escaped2.txt");

    assert!(!dir.path().join("escaped.txt").exists());
    assert!(!dir.path().join("escaped2.txt").exists());
    assert_eq!(fs::read(dest.join("safe.txt")).unwrap(), b"safe.txt");
}

#[test]
fn test_absolute_path_unix() {
    let dir = tempdir().unwrap();
    let archive = archive_with(&dir.path().join("evil.grf"), &["/tmp/grf-escape.txt"]);
    assert_rejected(&archive, &dir.path().join("out"), "/tmp/grf-escape.txt");
}

#[test]
fn test_absolute_path_windows() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("out");
    let archive = archive_with(
        &dir.path().join("evil.grf"),
        &["C:\\Windows\\win.ini", "\\root.txt", "data\\c:evil.txt"],
    );

    assert_rejected(&archive, &dest, "C:\\Windows\\win.ini");
    assert_rejected(&archive, &dest, "\\root.txt");
    assert_rejected(&archive, &dest, "data\\c:evil.txt");
}

#[test]
fn test_path_normalization() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("out");
    let archive = archive_with(
        &dir.path().join("normal.grf"),
        &["data\\.\\sprite\\\\a.spr", "data/mixed\\b.txt"],
    );

    let report = archive.extract_all(&dest, &mut NoProgress).unwrap();
    assert!(report.is_complete());
    assert!(dest.join("data").join("sprite").join("a.spr").is_file());
    assert!(dest.join("data").join("mixed").join("b.txt").is_file());
}

#[test]
fn test_path_with_null_bytes() {
    let dir = tempdir().unwrap();
    let mut archive = GrfArchive::new(dir.path().join("nul.grf"));
    assert!(matches!(
        archive.add_or_replace(b"evil\0.txt", b"x".to_vec()),
        Err(GrfError::Encoding(_))
    ));
    assert!(matches!(
        archive.add_or_replace(b"", b"x".to_vec()),
        Err(GrfError::Encoding(_))
    ));
}

#[test]
fn test_dot_only_names_rejected() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("out");
    let archive = archive_with(&dir.path().join("dots.grf"), &[".", "..", "\\"]);

    let report = archive.extract_all(&dest, &mut NoProgress).unwrap();
    assert_eq!(report.extracted, 0);
    assert_eq!(report.failed.len(), 3);
}
