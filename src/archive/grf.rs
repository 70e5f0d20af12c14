use crate::archive::codec;
use crate::archive::descramble::descramble;
use crate::archive::entry::{Entry, ENTRY_FIXED_SIZE};
use crate::archive::format::{
    read_field, read_u32, GrfHeader, DIRECTORY_OFFSET_POSITION, HEADER_SIZE,
};
use crate::config::ArchiveConfig;
use crate::error::{GrfError, Result};
use crate::names::{self, DEFAULT_NAME_ENCODING};
use crate::progress::{NoProgress, ProgressSink};
use encoding_rs::Encoding;
use std::borrow::Cow;
use std::cell::RefCell;
use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, trace, warn};

/// Backing stream of an archive handle
enum Backing {
    /// Never opened; every entry is staged in memory
    Detached,
    Open(RefCell<File>),
    Closed,
}

/// Outcome of a bulk extraction
#[derive(Debug, Default)]
pub struct ExtractReport {
    /// Entries written to disk
    pub extracted: usize,
    /// Entries skipped, with the reason
    pub failed: Vec<(String, GrfError)>,
}

impl ExtractReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A GRF archive bound to a path on disk
///
/// The handle owns exactly one backing stream while open. Reads go through
/// that stream; [`GrfArchive::save`] rewrites the whole container into a
/// temporary file next to the target and swaps it in only once it is
/// complete, then reopens it.
///
/// # Concurrency
///
/// A handle is meant for one thread at a time; it is `Send` but not `Sync`.
/// Two handles writing the same path is undefined: no file locking is done.
pub struct GrfArchive {
    path: PathBuf,
    config: ArchiveConfig,
    encoding: &'static Encoding,
    header: GrfHeader,
    entries: Vec<Entry>,
    backing: Backing,
}

/// This is essentially our "API"; the public facing portion of our code.
impl GrfArchive {
    /// New, empty archive bound to `path`; nothing touches the disk until save
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            config: ArchiveConfig::default(),
            encoding: DEFAULT_NAME_ENCODING,
            header: GrfHeader::new(),
            entries: Vec::new(),
            backing: Backing::Detached,
        }
    }

    /// New, empty archive with explicit settings
    pub fn with_config<P: AsRef<Path>>(path: P, config: ArchiveConfig) -> Result<Self> {
        config.validate()?;
        let encoding = config.encoding()?;
        Ok(Self {
            encoding,
            config,
            ..Self::new(path)
        })
    }

    /// Open an existing archive
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut archive = Self::new(path);
        archive.reopen()?;
        Ok(archive)
    }

    /// Open an existing archive with explicit settings
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: ArchiveConfig) -> Result<Self> {
        let mut archive = Self::with_config(path, config)?;
        archive.reopen()?;
        Ok(archive)
    }

    /// Write an empty archive at `path` and open it
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut archive = Self::new(path);
        archive.save()?;
        Ok(archive)
    }

    /// (Re)read the archive at the bound path
    ///
    /// All in-memory entries, staged content included, are replaced by what
    /// is on disk. On failure the handle keeps its previous state.
    pub fn reopen(&mut self) -> Result<()> {
        let mut file = File::open(&self.path)?;
        let (header, entries) = read_archive(&mut file)?;

        debug!(
            path = %self.path.display(),
            entries = entries.len(),
            directory_offset = header.directory_offset,
            "Opened archive"
        );

        self.header = header;
        self.entries = entries;
        self.backing = Backing::Open(RefCell::new(file));
        Ok(())
    }

    /// Bind the handle to another path and open it
    pub fn open_path<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let previous = std::mem::replace(&mut self.path, path.as_ref().to_path_buf());
        if let Err(err) = self.reopen() {
            self.path = previous;
            return Err(err);
        }
        Ok(())
    }

    /// Release the backing stream
    pub fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.backing, Backing::Closed) {
            Backing::Open(_) => {
                debug!(path = %self.path.display(), "Closed archive");
                Ok(())
            }
            other => {
                self.backing = other;
                Err(GrfError::InvalidState("archive is not open"))
            }
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.backing, Backing::Open(_))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// Charset entry names are stored in
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Header as last read from disk
    pub fn header(&self) -> &GrfHeader {
        &self.header
    }

    /// Entries in directory order
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Entry names decoded from the archive charset
    pub fn list_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.display_name(self.encoding))
            .collect()
    }

    /// Case-insensitive lookup by raw name
    pub fn find(&self, name: &[u8]) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|entry| names::eq_ignore_case(entry.name(), name))
    }

    /// Case-insensitive lookup by host string
    pub fn find_text(&self, name: &str) -> Option<&Entry> {
        let encoded = names::encode_name(name, self.encoding).ok()?;
        self.find(&encoded)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find_text(name).is_some()
    }

    /// Original file content of `entry`
    ///
    /// Staged content is returned as is. Stored payloads are read, descrambled
    /// when flagged and inflated; a payload that fails to inflate to its
    /// declared size is a [`GrfError::CorruptEntry`].
    pub fn get_data(&self, entry: &Entry) -> Result<Vec<u8>> {
        self.ensure_readable()?;

        if let Some(data) = entry.pending_payload() {
            return Ok(data.to_vec());
        }
        if !entry.has_stored_payload() {
            return Ok(Vec::new());
        }

        let raw = self.read_stored(entry)?;
        decode_payload(entry, raw, self.encoding)
    }

    /// Payload bytes exactly as stored, `compressed_length_aligned` long
    pub fn get_raw_data(&self, entry: &Entry) -> Result<Vec<u8>> {
        self.read_stored(entry)
    }

    /// Look up an entry by host string and return its content
    pub fn get_data_by_name(&self, name: &str) -> Result<Vec<u8>> {
        let entry = self
            .find_text(name)
            .ok_or_else(|| GrfError::EntryNotFound(name.to_string()))?;
        self.get_data(entry)
    }

    /// Stage `data` under `name` (raw archive bytes)
    ///
    /// An existing entry with the same name, compared case-insensitively,
    /// gets the new content; otherwise a new entry is appended. Nothing is
    /// written until the next save.
    pub fn add_or_replace(&mut self, name: &[u8], data: Vec<u8>) -> Result<()> {
        names::validate_name(name)?;

        match self
            .entries
            .iter_mut()
            .find(|entry| names::eq_ignore_case(entry.name(), name))
        {
            Some(entry) => {
                trace!(entry = %entry.display_name(self.encoding), "Replacing staged content");
                entry.set_payload(data);
            }
            None => self.entries.push(Entry::staged(name.to_vec(), data)),
        }
        Ok(())
    }

    /// Stage `data` under a host string name, encoded with the archive charset
    pub fn add_or_replace_text(&mut self, name: &str, data: Vec<u8>) -> Result<()> {
        let encoded = names::encode_name(name, self.encoding)?;
        self.add_or_replace(&encoded, data)
    }

    /// Stage the content of a file on disk
    pub fn add_file_from_disk(&mut self, name: &str, disk_path: &Path) -> Result<()> {
        let data = fs::read(disk_path)?;
        self.add_or_replace_text(name, data)
    }

    /// Drop an entry before the next save; returns whether one was removed
    pub fn remove(&mut self, name: &str) -> bool {
        let Ok(encoded) = names::encode_name(name, self.encoding) else {
            return false;
        };
        let before = self.entries.len();
        self.entries
            .retain(|entry| !names::eq_ignore_case(entry.name(), &encoded));
        before != self.entries.len()
    }

    /// Rewrite the whole archive, then reopen it
    pub fn save(&mut self) -> Result<()> {
        self.save_with_progress(&mut NoProgress)
    }

    /// Rewrite the whole archive, reporting each flushed entry, then reopen it
    ///
    /// The new container is built in a temporary file; any failure before it
    /// replaces the target leaves both the file on disk and the in-memory
    /// entries untouched.
    pub fn save_with_progress<P: ProgressSink>(&mut self, progress: &mut P) -> Result<()> {
        if matches!(self.backing, Backing::Closed) {
            return Err(GrfError::InvalidState("archive is closed"));
        }

        let staged = self.write_staged_archive(progress)?;

        // The old stream stays with the handle until the swap succeeds; std
        // opens files shareable for deletion, so the rename does not need
        // it closed.
        if let Err(err) = staged.persist(&self.path) {
            warn!(path = %self.path.display(), error = %err.error, "Could not replace archive");
            return Err(GrfError::Io(err.error));
        }

        debug!(path = %self.path.display(), entries = self.entries.len(), "Saved archive");
        self.backing = Backing::Closed;
        self.reopen()
    }

    /// Write every entry to `dest`, mapping `\` separators to directories
    ///
    /// Entries that fail to decode or carry unsafe names are logged and
    /// collected in the report; I/O failures on `dest` abort.
    pub fn extract_all<P: ProgressSink>(
        &self,
        dest: &Path,
        progress: &mut P,
    ) -> Result<ExtractReport> {
        self.ensure_readable()?;
        fs::create_dir_all(dest)?;

        let total = self.entries.len();
        let mut report = ExtractReport::default();

        for (index, entry) in self.entries.iter().enumerate() {
            let name = entry.display_name(self.encoding);
            match self.extract_entry(entry, &name, dest) {
                Ok(()) => report.extracted += 1,
                Err(err) if err.is_per_entry() => {
                    warn!(entry = %name, error = %err, "Skipping entry");
                    report.failed.push((name.clone(), err));
                }
                Err(err) => return Err(err),
            }
            progress.on_progress(index + 1, total, &name);
        }

        debug!(
            extracted = report.extracted,
            failed = report.failed.len(),
            "Extraction finished"
        );
        Ok(report)
    }

    /// Inflate every entry, collecting the ones that fail
    pub fn verify(&self) -> Result<Vec<(String, GrfError)>> {
        self.ensure_readable()?;

        let mut failures = Vec::new();
        for entry in &self.entries {
            match self.get_data(entry) {
                Ok(_) => {}
                Err(err) if err.is_per_entry() => {
                    failures.push((entry.display_name(self.encoding), err));
                }
                Err(err) => return Err(err),
            }
        }
        Ok(failures)
    }

    fn ensure_readable(&self) -> Result<()> {
        match self.backing {
            Backing::Closed => Err(GrfError::InvalidState("archive is closed")),
            Backing::Detached | Backing::Open(_) => Ok(()),
        }
    }

    fn read_stored(&self, entry: &Entry) -> Result<Vec<u8>> {
        match &self.backing {
            Backing::Open(file) => read_payload(&mut *file.borrow_mut(), entry, self.encoding),
            Backing::Closed => Err(GrfError::InvalidState("archive is closed")),
            Backing::Detached => Err(GrfError::InvalidState("archive has not been opened")),
        }
    }

    fn extract_entry(&self, entry: &Entry, name: &str, dest: &Path) -> Result<()> {
        let relative = sanitize_entry_path(name).ok_or_else(|| GrfError::CorruptEntry {
            name: name.to_string(),
            reason: "unsafe path".to_string(),
        })?;
        let target = dest.join(relative);

        if !entry.is_staged() && !entry.has_stored_payload() {
            fs::create_dir_all(&target)?;
            return Ok(());
        }

        let data = self.get_data(entry)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, data)?;
        Ok(())
    }

    fn staging_dir(&self) -> PathBuf {
        if let Some(dir) = &self.config.temp_dir {
            return dir.clone();
        }
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Build the complete new container in a temporary file
    fn write_staged_archive<P: ProgressSink>(&self, progress: &mut P) -> Result<NamedTempFile> {
        let mut staged = NamedTempFile::new_in(self.staging_dir())?;
        let header = self
            .header
            .for_save(&self.config.signature, self.entries.len())?;
        let level = self.config.compression_level;
        let total = self.entries.len();

        let mut written = Vec::with_capacity(total);
        let mut body_len: u64 = 0;

        let mut writer = BufWriter::new(staged.as_file_mut());
        header.write_to(&mut writer)?;

        for (index, entry) in self.entries.iter().enumerate() {
            let offset = u32::try_from(body_len)
                .map_err(|_| GrfError::Format("archive body exceeds 4 GiB".to_string()))?;

            if !entry.is_staged() && !entry.has_stored_payload() {
                written.push(Entry::placeholder(entry.name().to_vec(), offset));
            } else {
                let content = match entry.pending_payload() {
                    Some(data) => Cow::Borrowed(data),
                    None => Cow::Owned(self.get_data(entry)?),
                };
                let compressed = codec::compress_with_level(&content, level)?;
                let compressed_length = length_field(compressed.len(), entry, self.encoding)?;
                let uncompressed_length = length_field(content.len(), entry, self.encoding)?;

                writer.write_all(&compressed)?;
                body_len += compressed.len() as u64;

                trace!(
                    entry = %entry.display_name(self.encoding),
                    offset,
                    compressed_length,
                    uncompressed_length,
                    "Wrote payload"
                );
                written.push(Entry::stored(
                    entry.name().to_vec(),
                    compressed_length,
                    uncompressed_length,
                    offset,
                ));
            }

            progress.on_progress(index + 1, total, &entry.display_name(self.encoding));
        }

        let directory_offset = i32::try_from(body_len)
            .map_err(|_| GrfError::Format("archive body exceeds 2 GiB".to_string()))?;

        let mut directory = Vec::new();
        for entry in &written {
            entry.encode_metadata(&mut directory)?;
        }
        let compressed_directory = codec::compress_with_level(&directory, level)?;
        let directory_too_large = || GrfError::Format("directory exceeds 4 GiB".to_string());
        let compressed_directory_len =
            u32::try_from(compressed_directory.len()).map_err(|_| directory_too_large())?;
        let directory_len = u32::try_from(directory.len()).map_err(|_| directory_too_large())?;

        writer.write_all(&compressed_directory_len.to_le_bytes())?;
        writer.write_all(&directory_len.to_le_bytes())?;
        writer.write_all(&compressed_directory)?;

        let file = writer.into_inner().map_err(|e| e.into_error())?;

        // Patch the directory offset reserved in the header
        file.seek(SeekFrom::Start(DIRECTORY_OFFSET_POSITION))?;
        file.write_all(&directory_offset.to_le_bytes())?;
        file.sync_all()?;

        debug!(
            entries = written.len(),
            directory_offset,
            directory_len,
            "Staged archive"
        );
        Ok(staged)
    }
}

/// Read the header and directory of an archive
fn read_archive<R: Read + Seek>(reader: &mut R) -> Result<(GrfHeader, Vec<Entry>)> {
    let header = GrfHeader::read_from(&mut *reader)?;
    header.validate_version()?;
    let entry_count = header.entry_count()?;

    let file_len = reader.seek(SeekFrom::End(0))?;
    let directory_position = header.directory_position()?;
    if directory_position + 8 > file_len {
        return Err(GrfError::Format(format!(
            "Directory at {} lies past the end of the file ({} bytes)",
            directory_position, file_len
        )));
    }

    reader.seek(SeekFrom::Start(directory_position))?;
    let compressed_len = read_u32(&mut *reader, "directory compressed length")?;
    let uncompressed_len = read_u32(&mut *reader, "directory length")?;

    if directory_position + 8 + u64::from(compressed_len) > file_len {
        return Err(GrfError::Format(format!(
            "Directory of {} bytes is truncated",
            compressed_len
        )));
    }

    let mut compressed = vec![0u8; compressed_len as usize];
    read_field(&mut *reader, &mut compressed, "directory")?;

    let directory = codec::decompress_with_hint(&compressed, uncompressed_len as usize)?;
    if directory.len() != uncompressed_len as usize {
        return Err(GrfError::Format(format!(
            "Directory inflated to {} bytes, header declares {}",
            directory.len(),
            uncompressed_len
        )));
    }

    let mut cursor = Cursor::new(directory.as_slice());
    let mut entries = Vec::with_capacity(entry_count.min(directory.len() / (ENTRY_FIXED_SIZE + 2)));
    for _ in 0..entry_count {
        entries.push(Entry::decode_metadata(&mut cursor)?);
    }

    Ok((header, entries))
}

/// Read `compressed_length_aligned` bytes at the entry's offset
fn read_payload<R: Read + Seek>(
    reader: &mut R,
    entry: &Entry,
    encoding: &'static Encoding,
) -> Result<Vec<u8>> {
    let start = HEADER_SIZE as u64 + u64::from(entry.offset());
    let len = entry.compressed_length_aligned();
    let file_len = reader.seek(SeekFrom::End(0))?;

    if start + u64::from(len) > file_len {
        return Err(GrfError::CorruptEntry {
            name: entry.display_name(encoding),
            reason: format!(
                "payload {}..{} extends past the end of the archive ({} bytes)",
                start,
                start + u64::from(len),
                file_len
            ),
        });
    }

    reader.seek(SeekFrom::Start(start))?;
    let mut data = vec![0u8; len as usize];
    reader.read_exact(&mut data)?;

    trace!(entry = %entry.display_name(encoding), start, len, "Read payload");
    Ok(data)
}

/// Descramble (when flagged) then inflate a stored payload
fn decode_payload(entry: &Entry, mut raw: Vec<u8>, encoding: &'static Encoding) -> Result<Vec<u8>> {
    if entry.flags().is_scrambled() {
        descramble(&mut raw, entry.flags(), entry.cycle());
    }

    let corrupt = |reason: String| GrfError::CorruptEntry {
        name: entry.display_name(encoding),
        reason,
    };

    let expected = entry.uncompressed_length() as usize;
    let data = codec::decompress_with_hint(&raw, expected).map_err(|e| corrupt(e.to_string()))?;
    if data.len() != expected {
        return Err(corrupt(format!(
            "inflated to {} bytes, expected {}",
            data.len(),
            expected
        )));
    }
    Ok(data)
}

fn length_field(len: usize, entry: &Entry, encoding: &'static Encoding) -> Result<u32> {
    u32::try_from(len).map_err(|_| GrfError::CorruptEntry {
        name: entry.display_name(encoding),
        reason: format!("{} bytes do not fit a 32-bit length", len),
    })
}

/// Relative host path for an archive name; `None` when it would escape
fn sanitize_entry_path(name: &str) -> Option<PathBuf> {
    if name.starts_with(['\\', '/']) {
        return None;
    }

    let mut path = PathBuf::new();
    for part in name.split(['\\', '/']) {
        if part.is_empty() || part == "." {
            continue;
        }
        if part.contains(':') {
            return None;
        }
        let mut components = Path::new(part).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(component)), None) => path.push(component),
            _ => return None,
        }
    }

    if path.as_os_str().is_empty() {
        None
    } else {
        Some(path)
    }
}
