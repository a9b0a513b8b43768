use std::fs::DirBuilder;
use std::io::prelude::*;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::errors::{IoErrorExt, Result};

/// Writes a cached file through a temporary file in the same directory.
/// Nothing is visible at the target path until [`Writer::commit`].
pub struct Writer {
    target: PathBuf,
    tmpfile: NamedTempFile,
}

impl Writer {
    pub fn new(target: &Path) -> Result<Writer> {
        // Entry paths always have a platform directory as parent.
        let parent = target.parent().unwrap_or_else(|| Path::new("."));
        DirBuilder::new()
            .recursive(true)
            .create(parent)
            .with_context(|| format!("Failed to create cache directory at {}", parent.display()))?;
        let mut builder = tempfile::Builder::new();
        // Temp files default to 0600; cached files get the permissions a
        // plain File::create would give them (0666 minus umask).
        #[cfg(unix)]
        builder.permissions(std::os::unix::fs::PermissionsExt::from_mode(0o666));
        let tmpfile = builder
            .tempfile_in(parent)
            .with_context(|| format!("Failed to create a temp file in {}", parent.display()))?;
        Ok(Writer {
            target: target.to_path_buf(),
            tmpfile,
        })
    }

    /// Moves the written content to the target path, replacing whatever
    /// was there.
    pub fn commit(mut self) -> Result<()> {
        self.tmpfile
            .flush()
            .with_context(|| format!("Failed to flush temp file for {}", self.target.display()))?;
        let target = self.target;
        self.tmpfile
            .persist(&target)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to persist cached file to {}", target.display()))?;
        Ok(())
    }
}

impl Write for Writer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.tmpfile.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.tmpfile.flush()
    }
}
