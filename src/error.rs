use std::io;
use thiserror::Error;

/// Result type for GRF operations
pub type Result<T> = std::result::Result<T, GrfError>;

/// Unified error type for all GRF operations
#[derive(Debug, Error)]
pub enum GrfError {
    // Container errors
    #[error("Invalid archive format: {0}")]
    Format(String),

    #[error("Corrupt entry {name}: {reason}")]
    CorruptEntry { name: String, reason: String },

    #[error("Entry not found in archive: {0}")]
    EntryNotFound(String),

    // Codec errors
    #[error("Codec error: {0}")]
    Codec(String),

    // Handle state
    #[error("Invalid archive state: {0}")]
    InvalidState(&'static str),

    // Entry names
    #[error("Cannot encode entry name: {0}")]
    Encoding(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GrfError {
    /// Whether this error is confined to a single entry.
    ///
    /// Bulk operations collect these and keep going; anything else aborts them.
    pub fn is_per_entry(&self) -> bool {
        matches!(
            self,
            GrfError::CorruptEntry { .. } | GrfError::Codec(_) | GrfError::Encoding(_)
        )
    }
}

impl From<toml::de::Error> for GrfError {
    fn from(err: toml::de::Error) -> Self {
        GrfError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for GrfError {
    fn from(err: toml::ser::Error) -> Self {
        GrfError::Config(err.to_string())
    }
}
