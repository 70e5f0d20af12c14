//! zlib codec used for entry payloads and the central directory
//!
//! The container stores zlib-wrapped DEFLATE streams. Decompression stops at
//! the end of the stream, so alignment padding after it is ignored.

use crate::error::{GrfError, Result};
use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use std::io::Write;
use tracing::trace;

/// Compression level used when none is configured
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Initial output reservation when no size hint is available
const MIN_OUTPUT_RESERVE: usize = 1024;

/// Largest size hint honoured up front; bigger outputs grow on demand
const MAX_OUTPUT_RESERVE: usize = 16 * 1024 * 1024;

/// Compress with the default level
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    compress_with_level(data, DEFAULT_COMPRESSION_LEVEL)
}

/// Compress into a zlib stream at `level` (0-9)
pub fn compress_with_level(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level.min(9)));
    encoder
        .write_all(data)
        .map_err(|e| GrfError::Codec(format!("zlib compression failed: {}", e)))?;
    let compressed = encoder
        .finish()
        .map_err(|e| GrfError::Codec(format!("zlib compression failed: {}", e)))?;

    trace!("zlib: {} bytes -> {} bytes", data.len(), compressed.len());
    Ok(compressed)
}

/// Inflate a complete zlib stream
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    decompress_with_hint(data, 0)
}

/// Inflate a complete zlib stream, reserving `size_hint` bytes up front
///
/// Fails with [`GrfError::Codec`] when the stream is malformed or ends before
/// its final block.
pub fn decompress_with_hint(data: &[u8], size_hint: usize) -> Result<Vec<u8>> {
    let mut inflater = Decompress::new(true);
    let mut output = Vec::with_capacity(size_hint.clamp(MIN_OUTPUT_RESERVE, MAX_OUTPUT_RESERVE));

    loop {
        if output.len() == output.capacity() {
            output.reserve(output.capacity().max(MIN_OUTPUT_RESERVE));
        }

        let consumed = inflater.total_in() as usize;
        let produced = inflater.total_out();
        let status = inflater
            .decompress_vec(&data[consumed..], &mut output, FlushDecompress::None)
            .map_err(|e| GrfError::Codec(format!("zlib decompression failed: {}", e)))?;

        if status == Status::StreamEnd {
            break;
        }

        // With output space left over, the inflater stopped for lack of input.
        let stalled = inflater.total_in() as usize == consumed && inflater.total_out() == produced;
        let input_exhausted = inflater.total_in() as usize >= data.len();
        if output.len() < output.capacity() && (stalled || input_exhausted) {
            return Err(GrfError::Codec(format!(
                "zlib stream truncated after {} of {} input bytes",
                inflater.total_in(),
                data.len()
            )));
        }
    }

    trace!("zlib: {} bytes -> {} bytes", inflater.total_in(), output.len());
    Ok(output)
}
