//! Scratch directory for downloads waiting to be sent.
//!
//! Every download lives under one root directory so leftovers from a crash
//! can be purged at startup. Files are removed right after a send attempt.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Owner of the bot's temporary download directory
#[derive(Debug, Clone)]
pub struct TempStore {
    root: PathBuf,
}

impl TempStore {
    /// Use (and create) `root` as the download directory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Directory under the system temp dir named after the crate
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub fn in_system_temp() -> io::Result<Self> {
        Self::new(std::env::temp_dir().join(env!("CARGO_PKG_NAME")))
    }

    /// Root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fresh, not yet existing file path with the given extension (`.jpg`)
    #[must_use]
    pub fn file_path(&self, extension: Option<&str>) -> PathBuf {
        let ext = extension.unwrap_or_default();
        let ext = if ext.is_empty() || ext.starts_with('.') {
            ext.to_string()
        } else {
            format!(".{ext}")
        };
        self.root
            .join(format!("{}{ext}", Uuid::new_v4().as_simple()))
    }

    /// Create a fresh job directory, used by tools that pick their own file names
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub async fn job_dir(&self) -> io::Result<PathBuf> {
        let dir = self.root.join(format!("job-{}", Uuid::new_v4().as_simple()));
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Remove a downloaded file and its job directory once it is empty.
    ///
    /// Failures are logged, never returned: a leftover file is purged on the
    /// next start anyway.
    pub async fn cleanup(&self, path: &Path) {
        if !path.starts_with(&self.root) {
            warn!(path = %path.display(), "Refusing to remove file outside temp store");
            return;
        }

        match tokio::fs::remove_file(path).await {
            Ok(()) => info!(path = %path.display(), "Cleaned up temporary file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to clean up temp file"),
        }

        if let Some(parent) = path.parent() {
            if parent != self.root && parent.starts_with(&self.root) {
                // Fails while the directory still holds sibling files
                if tokio::fs::remove_dir(parent).await.is_ok() {
                    debug!(dir = %parent.display(), "Removed empty job directory");
                }
            }
        }
    }

    /// Remove a whole job directory
    pub async fn cleanup_dir(&self, dir: &Path) {
        if dir == self.root || !dir.starts_with(&self.root) {
            return;
        }
        if let Err(e) = tokio::fs::remove_dir_all(dir).await {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(dir = %dir.display(), error = %e, "Failed to remove job directory");
            }
        }
    }

    /// Delete everything under the root, returns the number of entries removed
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the root cannot be listed.
    pub async fn purge(&self) -> io::Result<usize> {
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let result = if entry.file_type().await?.is_dir() {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to purge temp entry"),
            }
        }
        Ok(removed)
    }
}
