use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::errors::{IoErrorExt, Result};

/// Removes a cached file. Returns `false` if it was already gone.
pub fn rm(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to remove cached file at {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ds.csv");
        assert!(!rm(&path).unwrap());
        std::fs::write(&path, b"x").unwrap();
        assert!(rm(&path).unwrap());
        assert!(!path.exists());
    }
}
