use crate::error::{GrfError, Result};
use std::io::{self, Read, Write};

/// Signature written into every saved archive
pub const DEFAULT_SIGNATURE: &str = "Master of Magic";

/// Signature field size in bytes (15 significant bytes + trailing NUL)
pub const SIGNATURE_SIZE: usize = 16;

/// Legacy key field size in bytes
pub const KEY_FIELD_SIZE: usize = 14;

/// Fixed header size in bytes; the payload section starts right after it
pub const HEADER_SIZE: usize = 46;

/// Byte offset of the directory offset field inside the header
pub const DIRECTORY_OFFSET_POSITION: u64 = 30;

/// The only archive version read and written
pub const FORMAT_VERSION: u32 = 0x200;

/// Bias between the two count markers: `entries = marker_b - marker_a - 7`
pub const COUNT_MARKER_BIAS: i32 = 7;

/// Count marker A used by newly created archives
pub const DEFAULT_COUNT_MARKER_A: i32 = 0;

/// Fixed 46-byte archive header
///
/// Structure (little-endian):
/// - Signature: 16 bytes (NUL padded)
/// - Key field: 14 bytes (legacy, carried through unchanged)
/// - Directory offset: int32, relative to the end of the header
/// - Count marker A: int32
/// - Count marker B: int32
/// - Format version: uint32
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrfHeader {
    pub signature: [u8; SIGNATURE_SIZE],
    pub key_field: [u8; KEY_FIELD_SIZE],
    pub directory_offset: i32,
    pub count_marker_a: i32,
    pub count_marker_b: i32,
    pub format_version: u32,
}

impl GrfHeader {
    /// Header of an empty archive
    pub fn new() -> Self {
        Self {
            signature: encode_signature(DEFAULT_SIGNATURE),
            key_field: [0u8; KEY_FIELD_SIZE],
            directory_offset: 0,
            count_marker_a: DEFAULT_COUNT_MARKER_A,
            count_marker_b: DEFAULT_COUNT_MARKER_A + COUNT_MARKER_BIAS,
            format_version: FORMAT_VERSION,
        }
    }

    /// Signature text up to the first NUL
    pub fn signature_str(&self) -> String {
        let end = self
            .signature
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(SIGNATURE_SIZE);
        String::from_utf8_lossy(&self.signature[..end]).into_owned()
    }

    /// Number of directory entries encoded by the two count markers
    pub fn entry_count(&self) -> Result<usize> {
        let count = i64::from(self.count_marker_b)
            - i64::from(self.count_marker_a)
            - i64::from(COUNT_MARKER_BIAS);
        usize::try_from(count).map_err(|_| {
            GrfError::Format(format!(
                "Negative entry count {} (markers {} / {})",
                count, self.count_marker_a, self.count_marker_b
            ))
        })
    }

    /// Absolute file position of the directory section
    pub fn directory_position(&self) -> Result<u64> {
        u64::try_from(self.directory_offset)
            .map(|offset| HEADER_SIZE as u64 + offset)
            .map_err(|_| {
                GrfError::Format(format!(
                    "Negative directory offset {}",
                    self.directory_offset
                ))
            })
    }

    /// Header for a save pass: normalized signature and version, directory
    /// offset reserved, marker B recomputed from the entry count.
    pub fn for_save(&self, signature: &str, entry_count: usize) -> Result<Self> {
        let count_marker_b = i32::try_from(entry_count)
            .ok()
            .and_then(|count| count.checked_add(self.count_marker_a))
            .and_then(|marker| marker.checked_add(COUNT_MARKER_BIAS))
            .ok_or_else(|| {
                GrfError::Format(format!("Too many entries to save: {}", entry_count))
            })?;

        Ok(Self {
            signature: encode_signature(signature),
            key_field: self.key_field,
            directory_offset: 0,
            count_marker_a: self.count_marker_a,
            count_marker_b,
            format_version: FORMAT_VERSION,
        })
    }

    /// Write header to a writer
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&self.signature)?;
        writer.write_all(&self.key_field)?;
        writer.write_all(&self.directory_offset.to_le_bytes())?;
        writer.write_all(&self.count_marker_a.to_le_bytes())?;
        writer.write_all(&self.count_marker_b.to_le_bytes())?;
        writer.write_all(&self.format_version.to_le_bytes())?;
        Ok(())
    }

    /// Read header from a reader
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut signature = [0u8; SIGNATURE_SIZE];
        read_field(&mut reader, &mut signature, "header signature")?;

        let mut key_field = [0u8; KEY_FIELD_SIZE];
        read_field(&mut reader, &mut key_field, "header key field")?;

        let directory_offset = read_i32(&mut reader, "directory offset")?;
        let count_marker_a = read_i32(&mut reader, "count marker A")?;
        let count_marker_b = read_i32(&mut reader, "count marker B")?;
        let format_version = read_u32(&mut reader, "format version")?;

        Ok(Self {
            signature,
            key_field,
            directory_offset,
            count_marker_a,
            count_marker_b,
            format_version,
        })
    }

    /// Validate version compatibility
    pub fn validate_version(&self) -> Result<()> {
        if self.format_version != FORMAT_VERSION {
            return Err(GrfError::Format(format!(
                "Unsupported archive version {:#x} (expected {:#x})",
                self.format_version, FORMAT_VERSION
            )));
        }
        Ok(())
    }
}

impl Default for GrfHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// NUL-pad or truncate a signature to 15 bytes plus a trailing NUL
pub fn encode_signature(signature: &str) -> [u8; SIGNATURE_SIZE] {
    let mut field = [0u8; SIGNATURE_SIZE];
    let bytes = signature.as_bytes();
    let len = bytes.len().min(SIGNATURE_SIZE - 1);
    field[..len].copy_from_slice(&bytes[..len]);
    field
}

// Helper functions for reading primitive types; a short read is a format
// error rather than a bare I/O error.
pub(crate) fn read_field<R: Read>(mut reader: R, buf: &mut [u8], what: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => GrfError::Format(format!("Truncated {}", what)),
        _ => GrfError::Io(e),
    })
}

pub(crate) fn read_u8<R: Read>(reader: R, what: &str) -> Result<u8> {
    let mut buf = [0u8; 1];
    read_field(reader, &mut buf, what)?;
    Ok(buf[0])
}

pub(crate) fn read_u32<R: Read>(reader: R, what: &str) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_field(reader, &mut buf, what)?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_i32<R: Read>(reader: R, what: &str) -> Result<i32> {
    let mut buf = [0u8; 4];
    read_field(reader, &mut buf, what)?;
    Ok(i32::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let mut header = GrfHeader::new();
        header.directory_offset = 0x0102_0304;
        header.count_marker_b = 12;
        header.key_field[0] = 0xAA;

        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();

        assert_eq!(buf.len(), HEADER_SIZE);
        assert_eq!(&buf[..15], b"Master of Magic");
        assert_eq!(buf[15], 0);
        assert_eq!(buf[16], 0xAA);
        assert_eq!(&buf[30..34], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&buf[38..42], &12i32.to_le_bytes());
        assert_eq!(&buf[42..46], &0x200u32.to_le_bytes());

        let parsed = GrfHeader::read_from(&buf[..]).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.entry_count().unwrap(), 5);
    }

    #[test]
    fn test_truncated_header_is_format_error() {
        let mut buf = Vec::new();
        GrfHeader::new().write_to(&mut buf).unwrap();

        for len in [0, 10, 16, 30, 45] {
            match GrfHeader::read_from(&buf[..len]) {
                Err(GrfError::Format(_)) => {}
                other => panic!("Expected Format error at {} bytes, got {:?}", len, other),
            }
        }
    }

    #[test]
    fn test_negative_entry_count() {
        let mut header = GrfHeader::new();
        header.count_marker_a = 10;
        header.count_marker_b = 10;
        assert!(matches!(header.entry_count(), Err(GrfError::Format(_))));
    }

    #[test]
    fn test_for_save_normalizes_header() {
        let mut header = GrfHeader::new();
        header.signature = encode_signature("Event Horizon");
        header.count_marker_a = 3;
        header.directory_offset = 999;
        header.format_version = 0x103;
        header.key_field = [7u8; KEY_FIELD_SIZE];

        let saved = header.for_save(DEFAULT_SIGNATURE, 4).unwrap();
        assert_eq!(saved.signature_str(), DEFAULT_SIGNATURE);
        assert_eq!(saved.key_field, [7u8; KEY_FIELD_SIZE]);
        assert_eq!(saved.directory_offset, 0);
        assert_eq!(saved.count_marker_a, 3);
        assert_eq!(saved.count_marker_b, 4 + 3 + 7);
        assert_eq!(saved.format_version, FORMAT_VERSION);
        assert_eq!(saved.entry_count().unwrap(), 4);
    }

    #[test]
    fn test_signature_truncated_to_fifteen_bytes() {
        let field = encode_signature("A signature that is far too long");
        assert_eq!(&field[..15], b"A signature tha");
        assert_eq!(field[15], 0);
    }

    #[test]
    fn test_unsupported_version() {
        let mut header = GrfHeader::new();
        header.format_version = 0x103;
        let message = header.validate_version().unwrap_err().to_string();
        assert!(message.contains("0x103"), "{}", message);
        assert!(message.contains("expected 0x200"), "{}", message);
        header.format_version = FORMAT_VERSION;
        assert!(header.validate_version().is_ok());
    }
}
