pub mod codec;
pub mod descramble;
mod entry;
mod format;
mod grf;

pub use entry::{Entry, EntryFlags, ENTRY_FIXED_SIZE};
pub use format::{
    encode_signature, GrfHeader, COUNT_MARKER_BIAS, DEFAULT_SIGNATURE, DIRECTORY_OFFSET_POSITION,
    FORMAT_VERSION, HEADER_SIZE, KEY_FIELD_SIZE, SIGNATURE_SIZE,
};
pub use grf::{ExtractReport, GrfArchive};
