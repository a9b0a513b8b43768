//! Non-fatal cache events, delivered to an explicit sink.
use std::fmt;
use std::path::PathBuf;

/// Something worth telling the caller about that does not stop the
/// operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheWarning {
    /// Content is being transcoded from its original encoding into the
    /// cache encoding.
    EncodingMismatch {
        /// Dataset the content belongs to.
        dataset_id: String,
        /// The fixed cache encoding.
        cache_encoding: String,
        /// Encoding the content was declared with.
        source_encoding: String,
    },
    /// A fill is about to replace an existing cached file.
    Overwrite(PathBuf),
    /// A delete was requested for an entry with no backing file.
    DeleteAbsent(PathBuf),
}

impl fmt::Display for CacheWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheWarning::EncodingMismatch {
                dataset_id,
                cache_encoding,
                source_encoding,
            } => write!(
                f,
                "Cached file for dataset {} will be stored as {} while it was received as {}. \
                 Nothing is lost unless the dataset holds characters {} cannot represent.",
                dataset_id, cache_encoding, source_encoding, cache_encoding
            ),
            CacheWarning::Overwrite(path) => {
                write!(f, "Cached file {} already exists and will be overwritten", path.display())
            }
            CacheWarning::DeleteAbsent(path) => {
                write!(f, "Cached file {} does not exist, nothing to delete", path.display())
            }
        }
    }
}

/// Receives cache warnings. Implementations must be shareable across
/// threads since one sink usually serves every entry of a cache.
pub trait Diagnostics: Send + Sync {
    /// Called once per warning, while the entry lock is held.
    fn warn(&self, warning: &CacheWarning);
}

/// Default sink: forwards warnings to `tracing` at WARN level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn warn(&self, warning: &CacheWarning) {
        match warning {
            CacheWarning::EncodingMismatch {
                dataset_id,
                source_encoding,
                ..
            } => tracing::warn!(dataset_id = %dataset_id, source_encoding = %source_encoding, "{}", warning),
            CacheWarning::Overwrite(path) | CacheWarning::DeleteAbsent(path) => {
                tracing::warn!(path = %path.display(), "{}", warning)
            }
        }
    }
}
