use std::io::ErrorKind;
use std::path::Path;

use crate::errors::{Error, IoErrorExt, Result};

/// Reads a cached file as text. Line terminators are returned untouched.
pub fn read_to_string(path: &Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::EntryNotFound(path.to_path_buf())),
        res => res.with_context(|| format!("Failed to read cached file at {}", path.display())),
    }
}

/// Copies the raw bytes of a cached file to `to`, reflinking when the
/// filesystem supports it. An existing file at `to` is replaced.
pub fn copy(path: &Path, to: &Path) -> Result<()> {
    // reflink refuses existing destinations; the plain copy overwrites them.
    let copied = reflink_copy::reflink(path, to).or_else(|_| std::fs::copy(path, to).map(|_| ()));
    match copied {
        Err(e) if e.kind() == ErrorKind::NotFound && !path.exists() => {
            Err(Error::EntryNotFound(path.to_path_buf()))
        }
        res => res.with_context(|| {
            format!(
                "Failed to copy cached file at {} to {}",
                path.display(),
                to.display()
            )
        }),
    }
}
