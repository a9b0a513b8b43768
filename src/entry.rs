//! A single cached dataset file and the lock guarding it.
use std::fmt;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::content::{read, rm, write};
use crate::diagnostics::{CacheWarning, Diagnostics, TracingDiagnostics};
use crate::encoding::{self, CACHE_ENCODING};
use crate::errors::{Error, IoErrorExt, Result};
use crate::key;

const BUF_SIZE: usize = 16 * 1024;

/// Receives the byte length of every chunk written by a streaming fill.
pub trait Progress {
    /// Called once per chunk.
    fn update(&mut self, bytes: usize);
}

impl<F: FnMut(usize)> Progress for F {
    fn update(&mut self, bytes: usize) {
        self(bytes)
    }
}

/// One cached artifact: `<cache_root>/<platform_pseudo_id>/<dataset_id>.<format>`.
///
/// Every operation runs while holding the entry's lock, so a reader of this
/// object sees either the content before a fill or the complete content
/// after it. The lock belongs to this object: two `CacheEntry` values built
/// independently for the same path do not exclude each other. Share one
/// entry (e.g. through an `Arc`), or get entries from a [`crate::Cache`]
/// opened with [`crate::CacheOpts::shared_locks`].
///
/// The lock is not reentrant. Composite operations should take it once with
/// [`CacheEntry::lock`] and work through the returned [`EntryGuard`].
pub struct CacheEntry {
    dataset_id: String,
    format: String,
    platform_pseudo_id: String,
    cache_root: PathBuf,
    path: PathBuf,
    pub(crate) lock: Arc<Mutex<()>>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("dataset_id", &self.dataset_id)
            .field("format", &self.format)
            .field("platform_pseudo_id", &self.platform_pseudo_id)
            .field("cache_root", &self.cache_root)
            .finish()
    }
}

impl CacheEntry {
    /// Creates an entry with its own lock, reporting warnings through
    /// `tracing`. Nothing is touched on disk.
    pub fn new<D, F, P, R>(dataset_id: D, format: F, platform_pseudo_id: P, cache_root: R) -> Self
    where
        D: Into<String>,
        F: Into<String>,
        P: Into<String>,
        R: AsRef<Path>,
    {
        let dataset_id = dataset_id.into();
        let format = format.into();
        let platform_pseudo_id = platform_pseudo_id.into();
        let cache_root = cache_root.as_ref().to_path_buf();
        let path = key::entry_path(&cache_root, &platform_pseudo_id, &dataset_id, &format);
        CacheEntry {
            dataset_id,
            format,
            platform_pseudo_id,
            cache_root,
            path,
            lock: Arc::new(Mutex::new(())),
            diagnostics: Arc::new(TracingDiagnostics),
        }
    }

    /// Replaces the warning sink.
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub(crate) fn with_lock(mut self, lock: Arc<Mutex<()>>) -> Self {
        self.lock = lock;
        self
    }

    /// Dataset identifier.
    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    /// File format, used as extension.
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Directory name of the platform inside the cache root.
    pub fn platform_pseudo_id(&self) -> &str {
        &self.platform_pseudo_id
    }

    /// Root directory of the cache.
    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Location of the backing file.
    pub fn file_path(&self) -> &Path {
        &self.path
    }

    /// Whether the backing file exists right now. Does not take the lock, and
    /// the answer may be stale as soon as it is returned.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Fails with [`Error::EntryNotFound`] if there is no backing file.
    /// Checked under the lock.
    pub fn assert_exists(&self) -> Result<()> {
        self.lock().assert_exists()
    }

    /// Takes the entry lock, blocking until it is available. There is no
    /// timeout.
    pub fn lock(&self) -> EntryGuard<'_> {
        // The mutex guards no data, so a panic while holding it leaves
        // nothing inconsistent behind.
        let guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        EntryGuard {
            entry: self,
            _guard: guard,
        }
    }

    /// Reads the whole cached file. Fails with [`Error::EntryNotFound`] on a
    /// cache miss.
    pub fn read(&self) -> Result<String> {
        self.lock().read()
    }

    /// Copies the cached file's bytes, untranscoded, to `destination`.
    pub fn copy_to_file<P: AsRef<Path>>(&self, destination: P) -> Result<()> {
        self.lock().copy_to_file(destination)
    }

    /// Stores already decoded text. `source_encoding` is the encoding the
    /// text was originally received in; it is only compared against the
    /// cache encoding to decide whether to warn, never used to decode.
    pub fn fill_from_str(&self, source_encoding: &str, decoded_text: &str) -> Result<()> {
        self.lock().fill_from_str(source_encoding, decoded_text)
    }

    /// Stores a stream of byte chunks declared as `chunk_encoding`.
    ///
    /// Labels follow the WHATWG encoding rules: `latin1` and `iso-8859-1`
    /// mean windows-1252, so bytes 0x80 to 0x9F become characters like `€`
    /// rather than C1 control codes. A leading byte order mark overrides the
    /// label and is not stored.
    pub fn fill_from_iterable<I>(
        &self,
        chunks: I,
        chunk_encoding: &str,
        progress: Option<&mut dyn Progress>,
    ) -> Result<()>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        self.lock().fill_from_iterable(chunks, chunk_encoding, progress)
    }

    /// Stores everything `reader` yields, declared as `encoding`. Encoding
    /// labels are handled as in [`CacheEntry::fill_from_iterable`].
    pub fn fill_from_reader<R: Read>(
        &self,
        reader: R,
        encoding: &str,
        progress: Option<&mut dyn Progress>,
    ) -> Result<()> {
        self.lock().fill_from_reader(reader, encoding, progress)
    }

    /// Stores a copy of an already downloaded file. Encoding labels are
    /// handled as in [`CacheEntry::fill_from_iterable`].
    pub fn fill_from_file<P: AsRef<Path>>(&self, source: P, source_encoding: &str) -> Result<()> {
        self.lock().fill_from_file(source, source_encoding)
    }

    /// Removes the cached file. Deleting a missing entry only warns.
    pub fn delete(&self) -> Result<()> {
        self.lock().delete()
    }

    /// Returns the cached text, or runs `fill` to populate the entry first.
    /// The lock is held across both steps, so concurrent callers sharing this
    /// entry fetch at most once.
    ///
    /// ```no_run
    /// use odscache::CacheEntry;
    ///
    /// fn main() -> odscache::Result<()> {
    ///     let entry = CacheEntry::new("abc", "csv", "public", ".odsclient");
    ///     let text = entry.read_or_fill_with(|guard| {
    ///         guard.fill_from_str("utf-8", "a;b\n1;2\n")
    ///     })?;
    ///     assert_eq!(text, "a;b\n1;2\n");
    ///     Ok(())
    /// }
    /// ```
    pub fn read_or_fill_with<F, E>(&self, fill: F) -> std::result::Result<String, E>
    where
        F: FnOnce(&EntryGuard<'_>) -> std::result::Result<(), E>,
        E: From<Error>,
    {
        let guard = self.lock();
        match guard.read() {
            Ok(text) => {
                tracing::debug!(path = %self.path.display(), "cache hit");
                Ok(text)
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(path = %self.path.display(), "cache miss");
                fill(&guard)?;
                Ok(guard.read()?)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Exclusive access to a [`CacheEntry`], obtained with [`CacheEntry::lock`].
/// Every method here assumes the lock is already held.
pub struct EntryGuard<'a> {
    entry: &'a CacheEntry,
    _guard: MutexGuard<'a, ()>,
}

impl<'a> EntryGuard<'a> {
    /// The locked entry.
    pub fn entry(&self) -> &CacheEntry {
        self.entry
    }

    /// See [`CacheEntry::exists`].
    pub fn exists(&self) -> bool {
        self.entry.exists()
    }

    /// Fails with [`Error::EntryNotFound`] if there is no backing file.
    pub fn assert_exists(&self) -> Result<()> {
        if self.exists() {
            Ok(())
        } else {
            Err(Error::EntryNotFound(self.entry.path.clone()))
        }
    }

    /// See [`CacheEntry::read`].
    pub fn read(&self) -> Result<String> {
        self.assert_exists()?;
        tracing::trace!(path = %self.entry.path.display(), "reading cached file");
        read::read_to_string(&self.entry.path)
    }

    /// See [`CacheEntry::copy_to_file`].
    pub fn copy_to_file<P: AsRef<Path>>(&self, destination: P) -> Result<()> {
        self.assert_exists()?;
        read::copy(&self.entry.path, destination.as_ref())
    }

    /// See [`CacheEntry::fill_from_str`].
    pub fn fill_from_str(&self, source_encoding: &str, decoded_text: &str) -> Result<()> {
        self.warn_if_transcoding(source_encoding);
        let mut writer = self.prepare_for_writing()?;
        writer
            .write_all(decoded_text.as_bytes())
            .with_context(|| self.write_failed())?;
        writer.commit()?;
        tracing::debug!(path = %self.entry.path.display(), "filled from text");
        Ok(())
    }

    /// Byte-for-byte copy when `chunk_encoding` is the cache encoding;
    /// otherwise the chunks are collected, decoded as a whole and
    /// re-encoded.
    /// Labels follow the WHATWG rules, so `latin1` decodes as windows-1252.
    pub fn fill_from_iterable<I>(
        &self,
        chunks: I,
        chunk_encoding: &str,
        progress: Option<&mut dyn Progress>,
    ) -> Result<()>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        self.fill_from_chunks(chunks.into_iter().map(Ok::<_, std::io::Error>), chunk_encoding, progress)
    }

    /// See [`CacheEntry::fill_from_reader`].
    pub fn fill_from_reader<R: Read>(
        &self,
        mut reader: R,
        encoding: &str,
        progress: Option<&mut dyn Progress>,
    ) -> Result<()> {
        let mut buf = vec![0u8; BUF_SIZE];
        let chunks = std::iter::from_fn(move || loop {
            match reader.read(&mut buf) {
                Ok(0) => return None,
                Ok(n) => return Some(Ok(buf[..n].to_vec())),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Some(Err(e)),
            }
        });
        self.fill_from_chunks(chunks, encoding, progress)
    }

    // A failing chunk aborts the fill before anything is committed.
    fn fill_from_chunks<I, B>(
        &self,
        chunks: I,
        chunk_encoding: &str,
        mut progress: Option<&mut dyn Progress>,
    ) -> Result<()>
    where
        I: Iterator<Item = std::io::Result<B>>,
        B: AsRef<[u8]>,
    {
        let fast_path = encoding::is_cache_encoding(chunk_encoding);
        self.warn_if_transcoding(chunk_encoding);
        let mut writer = self.prepare_for_writing()?;
        let mut pending = Vec::new();
        for chunk in chunks {
            let chunk = chunk.with_context(|| {
                format!("Failed to read content for dataset {}", self.entry.dataset_id)
            })?;
            let chunk = chunk.as_ref();
            if fast_path {
                writer.write_all(chunk).with_context(|| self.write_failed())?;
            } else {
                // Decoded as a whole below, so multi-byte sequences split
                // across chunks survive.
                pending.extend_from_slice(chunk);
            }
            if let Some(progress) = progress.as_deref_mut() {
                progress.update(chunk.len());
            }
        }
        if !fast_path {
            let text = encoding::decode(&pending, chunk_encoding, &self.entry.dataset_id)?;
            writer
                .write_all(text.as_bytes())
                .with_context(|| self.write_failed())?;
        }
        writer.commit()?;
        let transcoded = !fast_path;
        tracing::debug!(path = %self.entry.path.display(), transcoded, "filled from chunks");
        Ok(())
    }

    /// See [`CacheEntry::fill_from_file`].
    pub fn fill_from_file<P: AsRef<Path>>(&self, source: P, source_encoding: &str) -> Result<()> {
        let source = source.as_ref();
        let open_failed = || format!("Failed to read source file {}", source.display());
        if encoding::is_cache_encoding(source_encoding) {
            let mut file = std::fs::File::open(source).with_context(open_failed)?;
            let mut writer = self.prepare_for_writing()?;
            std::io::copy(&mut file, &mut writer).with_context(|| self.write_failed())?;
            writer.commit()?;
        } else {
            self.warn_if_transcoding(source_encoding);
            let bytes = std::fs::read(source).with_context(open_failed)?;
            let text = encoding::decode(&bytes, source_encoding, &source.display().to_string())?;
            let mut writer = self.prepare_for_writing()?;
            writer
                .write_all(text.as_bytes())
                .with_context(|| self.write_failed())?;
            writer.commit()?;
        }
        tracing::debug!(
            path = %self.entry.path.display(),
            source = %source.display(),
            "filled from file"
        );
        Ok(())
    }

    /// See [`CacheEntry::delete`].
    pub fn delete(&self) -> Result<()> {
        let removed = if self.exists() {
            rm::rm(&self.entry.path)?
        } else {
            false
        };
        if removed {
            tracing::debug!(path = %self.entry.path.display(), "deleted cached file");
        } else {
            self.entry
                .diagnostics
                .warn(&CacheWarning::DeleteAbsent(self.entry.path.clone()));
        }
        Ok(())
    }

    fn prepare_for_writing(&self) -> Result<write::Writer> {
        if self.exists() {
            self.entry
                .diagnostics
                .warn(&CacheWarning::Overwrite(self.entry.path.clone()));
        }
        write::Writer::new(&self.entry.path)
    }

    fn warn_if_transcoding(&self, source_encoding: &str) {
        if !encoding::is_cache_encoding(source_encoding) {
            self.entry.diagnostics.warn(&CacheWarning::EncodingMismatch {
                dataset_id: self.entry.dataset_id.clone(),
                cache_encoding: CACHE_ENCODING.into(),
                source_encoding: source_encoding.into(),
            });
        }
    }

    fn write_failed(&self) -> String {
        format!("Failed to write cached file at {}", self.entry.path.display())
    }
}
