//! Local file storage for generated artifacts.
//!
//! Stored paths are relative to the storage root (e.g. `qrcodes/x.png`)
//! so database rows stay valid if the root moves. Deletions are
//! best-effort: a missing file is not an error.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Filesystem storage rooted at a configurable directory.
#[derive(Debug)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: PathBuf) -> Self {
        Storage { root }
    }

    /// Absolute path for a stored relative path.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Ensures the parent directory of a relative path exists and
    /// returns the absolute path to write to.
    pub fn prepare(&self, relative: &str) -> std::io::Result<PathBuf> {
        let path = self.resolve(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(path)
    }

    /// Deletes a stored file, best-effort. Logs and swallows failures.
    pub fn delete_quietly(&self, relative: &str) {
        let path = self.resolve(relative);
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "Deleted stored file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete stored file"),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
