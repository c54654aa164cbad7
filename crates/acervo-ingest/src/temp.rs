//! Scratch files for local extraction.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use acervo_core::{Error, Result};

/// Delete `path` if it exists. Returns whether a file was removed.
///
/// A missing file is not an error; any other failure is logged and
/// swallowed.
pub fn remove_temp_file(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(
                subsystem = "ingest",
                component = "temp",
                path = %path.display(),
                "Removed scratch file"
            );
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!(
                subsystem = "ingest",
                component = "temp",
                path = %path.display(),
                error = %e,
                "Failed to remove scratch file"
            );
            false
        }
    }
}

/// A file on disk removed when dropped, whatever the exit path.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Write `data` to a fresh file with the given suffix (e.g. `.docx`).
    pub fn write(data: &[u8], suffix: &str) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("acervo-")
            .suffix(suffix)
            .tempfile()
            .map_err(|e| Error::Internal(format!("Failed to create temp file: {}", e)))?;
        file.write_all(data)
            .map_err(|e| Error::Internal(format!("Failed to write temp file: {}", e)))?;
        let (_, path) = file
            .keep()
            .map_err(|e| Error::Internal(format!("Failed to keep temp file: {}", e)))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove now. Safe to call more than once.
    pub fn remove(&self) -> bool {
        remove_temp_file(&self.path)
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        remove_temp_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_missing_file_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never-created.tmp");
        assert!(!remove_temp_file(&path));
        assert!(!remove_temp_file(&path));
    }

    #[test]
    fn test_scratch_file_double_removal() {
        let scratch = ScratchFile::write(b"hello", ".txt").unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");

        assert!(scratch.remove());
        assert!(!scratch.remove());
        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn test_scratch_file_removed_on_drop() {
        let path = {
            let scratch = ScratchFile::write(b"x", ".docx").unwrap();
            assert!(scratch.path().to_string_lossy().ends_with(".docx"));
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
