use crate::archive::descramble::cycle_for_length;
use crate::archive::format::{read_u32, read_u8};
use crate::error::{GrfError, Result};
use encoding_rs::Encoding;
use std::io::{BufRead, Write};

/// Fixed bytes following the name in a directory record
pub const ENTRY_FIXED_SIZE: usize = 17;

/// How an entry's payload is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntryFlags {
    /// Not materialized on disk (directory records, freshly staged entries)
    Placeholder = 0,
    /// Plain zlib stream
    Compressed = 1,
    /// zlib stream, fully scrambled
    Scrambled = 3,
    /// zlib stream, first blocks scrambled
    HeaderScrambled = 5,
}

impl EntryFlags {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Placeholder),
            1 => Ok(Self::Compressed),
            3 => Ok(Self::Scrambled),
            5 => Ok(Self::HeaderScrambled),
            _ => Err(GrfError::Format(format!("Invalid entry flags: {}", value))),
        }
    }

    pub fn is_scrambled(self) -> bool {
        matches!(self, Self::Scrambled | Self::HeaderScrambled)
    }
}

/// One archived file
///
/// Directory record (little-endian):
/// - Name: NUL-terminated bytes in the archive charset
/// - Compressed length: uint32
/// - Aligned compressed length: uint32 (bytes actually stored)
/// - Uncompressed length: uint32
/// - Flags: uint8
/// - Offset: uint32, relative to the end of the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    name: Vec<u8>,
    compressed_length: u32,
    compressed_length_aligned: u32,
    uncompressed_length: u32,
    flags: EntryFlags,
    offset: u32,
    pending_payload: Option<Vec<u8>>,
}

impl Entry {
    /// New entry carrying only staged content
    pub fn staged(name: Vec<u8>, data: Vec<u8>) -> Self {
        Self {
            name,
            compressed_length: 0,
            compressed_length_aligned: 0,
            uncompressed_length: 0,
            flags: EntryFlags::Placeholder,
            offset: 0,
            pending_payload: Some(data),
        }
    }

    /// Entry as written by a save pass: plain zlib, no padding
    pub(crate) fn stored(
        name: Vec<u8>,
        compressed_length: u32,
        uncompressed_length: u32,
        offset: u32,
    ) -> Self {
        Self {
            name,
            compressed_length,
            compressed_length_aligned: compressed_length,
            uncompressed_length,
            flags: EntryFlags::Compressed,
            offset,
            pending_payload: None,
        }
    }

    /// Directory record with no payload, kept at `offset`
    pub(crate) fn placeholder(name: Vec<u8>, offset: u32) -> Self {
        Self {
            name,
            compressed_length: 0,
            compressed_length_aligned: 0,
            uncompressed_length: 0,
            flags: EntryFlags::Placeholder,
            offset,
            pending_payload: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_layout(
        name: &[u8],
        compressed_length: u32,
        compressed_length_aligned: u32,
        uncompressed_length: u32,
        flags: EntryFlags,
        offset: u32,
    ) -> Self {
        Self {
            name: name.to_vec(),
            compressed_length,
            compressed_length_aligned,
            uncompressed_length,
            flags,
            offset,
            pending_payload: None,
        }
    }

    /// Read one record from the inflated directory, advancing the cursor
    pub fn decode_metadata<R: BufRead>(mut reader: R) -> Result<Self> {
        let mut name = Vec::new();
        reader.read_until(0, &mut name)?;
        if name.pop() != Some(0) {
            return Err(GrfError::Format(
                "Entry name runs past the end of the directory".to_string(),
            ));
        }

        let compressed_length = read_u32(&mut reader, "entry compressed length")?;
        let compressed_length_aligned = read_u32(&mut reader, "entry aligned length")?;
        let uncompressed_length = read_u32(&mut reader, "entry uncompressed length")?;
        let flags = EntryFlags::from_u8(read_u8(&mut reader, "entry flags")?)?;
        let offset = read_u32(&mut reader, "entry offset")?;

        if compressed_length_aligned < compressed_length {
            return Err(GrfError::Format(format!(
                "Entry {} stores {} bytes but declares {} compressed bytes",
                String::from_utf8_lossy(&name),
                compressed_length_aligned,
                compressed_length
            )));
        }

        Ok(Self {
            name,
            compressed_length,
            compressed_length_aligned,
            uncompressed_length,
            flags,
            offset,
            pending_payload: None,
        })
    }

    /// Write this entry's directory record
    pub fn encode_metadata<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&self.name)?;
        writer.write_all(&[0u8])?;
        writer.write_all(&self.compressed_length.to_le_bytes())?;
        writer.write_all(&self.compressed_length_aligned.to_le_bytes())?;
        writer.write_all(&self.uncompressed_length.to_le_bytes())?;
        writer.write_all(&[self.flags as u8])?;
        writer.write_all(&self.offset.to_le_bytes())?;
        Ok(())
    }

    /// Stage replacement content; the stored payload is no longer consulted
    pub fn set_payload(&mut self, data: Vec<u8>) {
        self.pending_payload = Some(data);
    }

    /// Raw name bytes in the archive charset
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Name decoded from the archive charset
    pub fn display_name(&self, encoding: &'static Encoding) -> String {
        crate::names::decode_name(&self.name, encoding)
    }

    pub fn compressed_length(&self) -> u32 {
        self.compressed_length
    }

    pub fn compressed_length_aligned(&self) -> u32 {
        self.compressed_length_aligned
    }

    pub fn uncompressed_length(&self) -> u32 {
        self.uncompressed_length
    }

    pub fn flags(&self) -> EntryFlags {
        self.flags
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Descrambling round count; only meaningful for fully scrambled entries
    pub fn cycle(&self) -> u32 {
        match self.flags {
            EntryFlags::Scrambled => cycle_for_length(self.compressed_length),
            _ => 0,
        }
    }

    pub fn pending_payload(&self) -> Option<&[u8]> {
        self.pending_payload.as_deref()
    }

    /// Whether content is staged for the next save
    pub fn is_staged(&self) -> bool {
        self.pending_payload.is_some()
    }

    /// Whether the entry has a payload on disk
    pub fn has_stored_payload(&self) -> bool {
        self.flags != EntryFlags::Placeholder
    }
}
