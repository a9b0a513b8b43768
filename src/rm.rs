//! Bulk removal of cached files.
//!
//! These functions work on plain directories and do not take any entry
//! lock. Running them while entries under the same root are being read or
//! filled is unsafe; clear the cache between uses instead.
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use walkdir::WalkDir;

use crate::errors::{Error, IoErrorExt, Result};
use crate::key;

/// Removes every cached format of `dataset_id` under one platform, i.e. all
/// files named `<dataset_id>.<format>`. Returns how many files were removed.
///
/// ## Example
/// ```no_run
/// fn main() -> odscache::Result<()> {
///     odscache::rm::dataset(".odsclient", "public", "abc")?;
///     Ok(())
/// }
/// ```
pub fn dataset<P: AsRef<Path>>(cache_root: P, platform_pseudo_id: &str, dataset_id: &str) -> Result<usize> {
    let dir = key::platform_dir(cache_root.as_ref(), platform_pseudo_id);
    if !dir.is_dir() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(walkdir_error(&dir))?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.file_stem().map_or(true, |s| s != dataset_id) {
            continue;
        }
        match fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to remove cached file at {}", path.display()))
            }
        }
    }
    tracing::debug!(dir = %dir.display(), dataset_id, removed, "removed cached dataset");
    Ok(removed)
}

/// Removes the directory of one platform and everything in it. A missing
/// directory is not an error.
pub fn platform<P: AsRef<Path>>(cache_root: P, platform_pseudo_id: &str) -> Result<()> {
    remove_dir(&key::platform_dir(cache_root.as_ref(), platform_pseudo_id))
}

/// Removes the whole cache root. A missing directory is not an error.
///
/// ## Example
/// ```no_run
/// fn main() -> odscache::Result<()> {
///     odscache::rm::all(".odsclient")?;
///     Ok(())
/// }
/// ```
pub fn all<P: AsRef<Path>>(cache_root: P) -> Result<()> {
    remove_dir(cache_root.as_ref())
}

fn remove_dir(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        res => {
            res.with_context(|| format!("Failed to remove cache directory {}", dir.display()))?;
            tracing::debug!(dir = %dir.display(), "removed cache directory");
            Ok(())
        }
    }
}

fn walkdir_error(dir: &Path) -> impl FnOnce(walkdir::Error) -> Error + '_ {
    move |e| {
        let message = format!("Failed to list cache directory {}", dir.display());
        let io = e
            .into_io_error()
            .unwrap_or_else(|| std::io::Error::new(ErrorKind::Other, "filesystem loop"));
        Error::IoError(io, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CacheEntry;

    fn fill(root: &Path, platform: &str, dataset: &str, format: &str) -> CacheEntry {
        let entry = CacheEntry::new(dataset, format, platform, root);
        entry.fill_from_str("utf-8", "data").unwrap();
        entry
    }

    #[test]
    fn dataset_removes_all_formats() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        let csv = fill(dir, "public", "abc", "csv");
        let json = fill(dir, "public", "abc", "json");
        let other = fill(dir, "public", "abcd", "csv");
        let elsewhere = fill(dir, "acme", "abc", "csv");

        assert_eq!(dataset(dir, "public", "abc").unwrap(), 2);
        assert!(!csv.exists());
        assert!(!json.exists());
        assert!(other.exists());
        assert!(elsewhere.exists());

        assert_eq!(dataset(dir, "public", "abc").unwrap(), 0);
    }

    #[test]
    fn dataset_tolerates_missing_platform() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(dataset(tmp.path().join("nope"), "public", "abc").unwrap(), 0);
    }

    #[test]
    fn platform_removes_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        let public = fill(dir, "public", "abc", "csv");
        let acme = fill(dir, "acme", "abc", "csv");

        platform(dir, "public").unwrap();
        assert!(!dir.join("public").exists());
        assert!(!public.exists());
        assert!(acme.exists());

        platform(dir, "public").unwrap();
    }

    #[test]
    fn all_removes_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("cache");
        let entry = fill(&root, "public", "abc", "csv");

        all(&root).unwrap();
        assert!(!root.exists());
        assert!(!entry.exists());

        all(&root).unwrap();
    }
}
