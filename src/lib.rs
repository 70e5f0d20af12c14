//! grf-rs: reader and writer for GRF 0x200 archive containers
//!
//! This library provides a complete implementation of the GRF container,
//! combining:
//! - A fixed 46-byte header and a zlib-compressed directory
//! - zlib payloads, including the legacy scrambled entries (flags 3 and 5)
//! - Staged add/replace with an atomic whole-archive rewrite on save
//! - Entry names in a legacy charset (EUC-KR by default)
//!
//! # Example
//!
//! ```no_run
//! use grf_rs::GrfArchive;
//!
//! // Create an archive
//! let mut archive = GrfArchive::new("example.grf");
//! archive.add_or_replace_text("data\\hello.txt", b"Hello, World!".to_vec())?;
//! archive.save()?;
//!
//! // Read from archive
//! let archive = GrfArchive::open("example.grf")?;
//! let data = archive.get_data_by_name("data\\hello.txt")?;
//! # Ok::<(), grf_rs::error::GrfError>(())
//! ```

// Core modules
pub mod archive;
pub mod config;
pub mod error;
pub mod names;
pub mod progress;

// Re-export commonly used types
pub use archive::{
    Entry, EntryFlags, ExtractReport, GrfArchive, GrfHeader, DEFAULT_SIGNATURE, FORMAT_VERSION,
    HEADER_SIZE,
};
pub use config::ArchiveConfig;
pub use error::{GrfError, Result};
pub use progress::{NoProgress, ProgressSink};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Ensure core types are accessible
        let _flags = EntryFlags::Compressed;
        let header = GrfHeader::new();
        assert_eq!(header.format_version, FORMAT_VERSION);
        assert_eq!(ArchiveConfig::default().signature, DEFAULT_SIGNATURE);
    }
}
