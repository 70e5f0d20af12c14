//! Large Archive Stress Tests
//!
//! Tests for large archives, many entries, and extreme scenarios.
//!
//! Run with: cargo test --test stress_large_archives_test -- --ignored --nocapture

use grf_rs::GrfArchive;
use std::time::Instant;
use tempfile::NamedTempFile;

#[test]
#[ignore] // Run manually: cargo test test_256mb_archive -- --ignored
fn test_256mb_archive() {
    println!("\nCreating 256MB archive (64 x 4MB entries)...");
    let start = Instant::now();

    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path();

    let mut archive = GrfArchive::new(path);
    for i in 0..64 {
        let name = format!("data\\chunk{:03}.bin", i);
        archive
            .add_or_replace_text(&name, vec![i as u8; 4 * 1024 * 1024])
            .unwrap();
    }
    archive.save().unwrap();
    println!("  Saved in {:?}", start.elapsed());

    let reopened = GrfArchive::open(path).unwrap();
    assert_eq!(reopened.entry_count(), 64);
    for i in (0..64).step_by(9) {
        let data = reopened
            .get_data_by_name(&format!("data\\chunk{:03}.bin", i))
            .unwrap();
        assert_eq!(data.len(), 4 * 1024 * 1024);
        assert!(data.iter().all(|&b| b == i as u8));
    }
    println!("  Verified in {:?}", start.elapsed());
}

#[test]
fn test_1000_entries() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path();

    let mut archive = GrfArchive::new(path);
    for i in 0..1000 {
        let name = format!("data\\texture\\dir{:02}\\file{:04}.txt", i % 37, i);
        archive
            .add_or_replace_text(&name, format!("content of {}", i).into_bytes())
            .unwrap();
    }
    archive.save().unwrap();

    let reopened = GrfArchive::open(path).unwrap();
    assert_eq!(reopened.entry_count(), 1000);
    assert_eq!(reopened.header().entry_count().unwrap(), 1000);
    for i in [0, 1, 499, 998, 999] {
        let name = format!("DATA\\TEXTURE\\DIR{:02}\\FILE{:04}.TXT", i % 37, i);
        assert_eq!(
            reopened.get_data_by_name(&name).unwrap(),
            format!("content of {}", i).into_bytes()
        );
    }
    assert!(reopened.verify().unwrap().is_empty());
}

#[test]
fn test_large_entry_exceeds_reserve_hint() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path();

    // 20MB inflates past the largest up-front reservation
    let data: Vec<u8> = (0..20 * 1024 * 1024).map(|i| (i % 251) as u8).collect();

    let mut archive = GrfArchive::new(path);
    archive.add_or_replace_text("big.bin", data.clone()).unwrap();
    archive.save().unwrap();

    let reopened = GrfArchive::open(path).unwrap();
    assert_eq!(reopened.get_data_by_name("big.bin").unwrap(), data);
}

#[test]
fn test_long_entry_names() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path();

    let long_name = format!("data\\{}.txt", "x".repeat(1000));
    let deep_name = (0..50).map(|i| format!("d{}", i)).collect::<Vec<_>>().join("\\");

    let mut archive = GrfArchive::new(path);
    archive.add_or_replace_text(&long_name, b"long".to_vec()).unwrap();
    archive.add_or_replace_text(&deep_name, b"deep".to_vec()).unwrap();
    archive.save().unwrap();

    let reopened = GrfArchive::open(path).unwrap();
    assert_eq!(reopened.get_data_by_name(&long_name).unwrap(), b"long");
    assert_eq!(reopened.get_data_by_name(&deep_name).unwrap(), b"deep");
}

#[test]
fn test_repeated_saves() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path();

    let mut archive = GrfArchive::new(path);
    for round in 0..20 {
        archive
            .add_or_replace_text(&format!("round{}.txt", round), vec![round as u8; 100])
            .unwrap();
        archive
            .add_or_replace_text("shared.txt", format!("{}", round).into_bytes())
            .unwrap();
        archive.save().unwrap();
    }

    assert_eq!(archive.entry_count(), 21);
    assert_eq!(archive.get_data_by_name("shared.txt").unwrap(), b"19");
    assert_eq!(archive.get_data_by_name("round7.txt").unwrap(), vec![7u8; 100]);
}
