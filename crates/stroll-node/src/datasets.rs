//! CSV storage of the published split files.
//!
//! Each team has three files in the dataset directory, named after
//! [`SplitFile::file_stem`]. A new accepted defence overwrites all three: every
//! file is first written to a temporary sibling, and only once all three are
//! written are they renamed into place.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use stroll_core::error::StrollError;
use stroll_core::traits::DatasetStore;
use stroll_core::types::{SplitFile, SplitOutput, TeamId, VerificationRow};
use tempfile::NamedTempFile;
use tracing::debug;

/// Split files stored as CSV under one directory.
#[derive(Debug, Clone)]
pub struct CsvDatasetStore {
    dir: PathBuf,
}

impl CsvDatasetStore {
    /// Store rooted at `dir`, created if missing.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StrollError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Path of one of the split files of `team`.
    pub fn path(&self, file: SplitFile, team: TeamId) -> PathBuf {
        self.dir.join(format!("{}.csv", file.file_stem(team)))
    }
}

impl DatasetStore for CsvDatasetStore {
    fn write_split(&self, team: TeamId, split: &SplitOutput) -> Result<(), StrollError> {
        let staged = [
            (SplitFile::Test, stage_csv(&self.dir, &split.test)?),
            (SplitFile::Train, stage_csv(&self.dir, &split.train)?),
            (SplitFile::Verification, stage_csv(&self.dir, &split.verification)?),
        ];
        for (file, tmp) in staged {
            let path = self.path(file, team);
            tmp.persist(&path)
                .map_err(|e| StrollError::Io(format!("{}: {e}", path.display())))?;
        }
        debug!(team, dir = %self.dir.display(), "split files written");
        Ok(())
    }

    fn read_verification(&self, team: TeamId) -> Result<Vec<VerificationRow>, StrollError> {
        let path = self.path(SplitFile::Verification, team);
        let mut rdr = csv::Reader::from_path(&path)
            .map_err(|e| StrollError::Io(format!("{}: {e}", path.display())))?;
        rdr.deserialize()
            .collect::<Result<Vec<VerificationRow>, _>>()
            .map_err(|e| StrollError::Io(format!("{}: {e}", path.display())))
    }
}

/// Write `rows` to a temporary file in `dir`, removed unless persisted.
fn stage_csv<T: Serialize>(dir: &Path, rows: &[T]) -> Result<NamedTempFile, StrollError> {
    let mut wtr = csv::Writer::from_writer(NamedTempFile::new_in(dir)?);
    for row in rows {
        wtr.serialize(row)
            .map_err(|e| StrollError::Io(e.to_string()))?;
    }
    wtr.into_inner()
        .map_err(|e| StrollError::Io(e.to_string()))
}
