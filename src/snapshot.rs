//! Snapshot persistence.
//!
//! Writes the JPEG chosen for a motion event into the configured output
//! directory as `motion_<epoch>.jpg`. A write failure is the caller's to
//! log; the email attachment uses the in-memory bytes either way.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

/// Writes event snapshots into one directory, created at construction.
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    /// Create the writer, ensuring the output directory exists.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create snapshot directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `jpeg` as `motion_<epoch>.jpg` and return the path.
    pub fn save(&self, jpeg: &[u8], epoch_seconds: u64) -> Result<PathBuf> {
        let path = self.dir.join(format!("motion_{}.jpg", epoch_seconds));
        std::fs::write(&path, jpeg)
            .map_err(|e| anyhow!("failed to write snapshot {}: {}", path.display(), e))?;
        Ok(path)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
