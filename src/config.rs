//! Archive configuration
//!
//! Loaded from TOML; every field is optional.
//!
//! ```toml
//! compression_level = 9
//! name_encoding = "euc-kr"
//! signature = "Master of Magic"
//! temp_dir = "/var/tmp"
//! ```

use crate::archive::codec::DEFAULT_COMPRESSION_LEVEL;
use crate::archive::DEFAULT_SIGNATURE;
use crate::error::{GrfError, Result};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings applied when reading names and saving archives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// zlib level (0-9) for payloads and the directory
    pub compression_level: u32,
    /// WHATWG label of the charset entry names are stored in
    pub name_encoding: String,
    /// Signature written by save, NUL-padded or truncated to 15 bytes
    pub signature: String,
    /// Where save stages the new archive; defaults to the archive's directory
    pub temp_dir: Option<PathBuf>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            name_encoding: "euc-kr".to_string(),
            signature: DEFAULT_SIGNATURE.to_string(),
            temp_dir: None,
        }
    }
}

impl ArchiveConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ArchiveConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Resolve the configured name charset
    pub fn encoding(&self) -> Result<&'static Encoding> {
        Encoding::for_label(self.name_encoding.as_bytes()).ok_or_else(|| {
            GrfError::Config(format!("Unknown name encoding: {}", self.name_encoding))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.compression_level > 9 {
            return Err(GrfError::Config(format!(
                "compression_level must be 0-9, got {}",
                self.compression_level
            )));
        }
        self.encoding()?;
        Ok(())
    }
}
