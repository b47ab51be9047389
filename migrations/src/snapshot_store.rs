//! Snapshot file manager
//!
//! Reads and writes `.snapshot.json` in the migrations directory. A stored
//! checksum that no longer matches the recomputed one means the file was
//! edited by hand (drift); that is surfaced as a warning and never halts a
//! run.

use crate::error::Result;
use crate::snapshot::DatabaseSchemaSnapshot;
use std::path::{Path, PathBuf};

/// File name inside the migrations directory
pub const SNAPSHOT_FILE: &str = ".snapshot.json";

/// Reads and writes the snapshot file for one migrations directory
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Full path of the snapshot file
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    /// The migrations directory this store works in
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read the stored snapshot; a missing file yields `None`
    pub fn read(&self) -> Result<Option<DatabaseSchemaSnapshot>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        let snapshot = DatabaseSchemaSnapshot::parse(&contents)?;

        if snapshot.checksum != snapshot.computed_checksum() {
            tracing::warn!(
                path = %path.display(),
                "snapshot checksum mismatch - the file drifted from its recorded state"
            );
        }
        Ok(Some(snapshot))
    }

    /// Write the snapshot, creating the directory when absent
    pub fn write(&self, snapshot: &DatabaseSchemaSnapshot) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path(), snapshot.to_json()?)?;
        Ok(())
    }
}
