#![no_main]

use grf_rs::{GrfArchive, NoProgress};
use libfuzzer_sys::fuzz_target;
use std::io::Write;
use tempfile::NamedTempFile;

fuzz_target!(|data: &[u8]| {
    // Skip inputs shorter than the fixed header
    if data.len() < grf_rs::HEADER_SIZE {
        return;
    }

    // Write fuzz data to temporary file
    let mut temp_file = match NamedTempFile::new() {
        Ok(f) => f,
        Err(_) => return,
    };

    if temp_file.write_all(data).is_err() {
        return;
    }

    if temp_file.flush().is_err() {
        return;
    }

    // Try to open archive - should never panic
    let archive = match GrfArchive::open(temp_file.path()) {
        Ok(a) => a,
        Err(_) => return, // Expected for invalid data
    };

    // Try to read each entry - should never panic
    for entry in archive.entries() {
        let _ = archive.get_raw_data(entry);
        let _ = archive.get_data(entry);
    }

    // Lookups with odd names - should never panic
    let _ = archive.list_names();
    let _ = archive.contains("data\\test.txt");
    let _ = archive.contains("");
    let _ = archive.contains("..\\..\\etc\\passwd");

    // Extraction must stay inside the destination - should never panic
    if let Ok(dest) = tempfile::tempdir() {
        let _ = archive.extract_all(dest.path(), &mut NoProgress);
    }
});
