use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::account::{parse_identity, Edge};
use crate::error::PersistenceError;

/// Durable per-target results. A checkpoint is only ever written whole,
/// once, after a target's collection completed.
pub trait CheckpointStore {
    fn exists(&self, target: &str) -> bool;

    fn load(&self, target: &str) -> Result<Vec<Edge>, PersistenceError>;

    /// Never overwrites an existing checkpoint.
    fn save(&self, target: &str, edges: &[Edge]) -> Result<(), PersistenceError>;

    /// Checks the storage medium itself is still usable.
    fn probe(&self) -> Result<(), PersistenceError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointRow {
    username: String,
    #[serde(default)]
    display_name: String,
}

/// One `<target>_following.csv` per target under a directory.
#[derive(Debug, Clone)]
pub struct CsvCheckpointStore {
    dir: PathBuf,
}

impl CsvCheckpointStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| PersistenceError::io(&dir, e))?;
        Ok(CsvCheckpointStore { dir })
    }

    pub fn path_for(&self, target: &str) -> Result<PathBuf, PersistenceError> {
        // Targets become file names, so they must be a single path segment.
        let key =
            parse_identity(target).map_err(|_| PersistenceError::InvalidKey(target.to_string()))?;
        Ok(self.dir.join(format!("{}_following.csv", key)))
    }
}

impl CheckpointStore for CsvCheckpointStore {
    fn exists(&self, target: &str) -> bool {
        self.path_for(target).map(|p| p.exists()).unwrap_or(false)
    }

    fn load(&self, target: &str) -> Result<Vec<Edge>, PersistenceError> {
        let path = self.path_for(target)?;
        let file = File::open(&path).map_err(|e| PersistenceError::io(&path, e))?;
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(file);

        let mut edges = Vec::new();
        for result in rdr.deserialize::<CheckpointRow>() {
            match result {
                Ok(row) if !row.username.is_empty() => {
                    edges.push(Edge::new(target, row.username, row.display_name));
                }
                Ok(_) => warn!("Skipping row without username in {:?}", path),
                Err(e) => warn!("Skipping unreadable row in {:?}: {}", path, e),
            }
        }
        info!("Loaded {} edges for @{} from {:?}", edges.len(), target, path);
        Ok(edges)
    }

    fn save(&self, target: &str, edges: &[Edge]) -> Result<(), PersistenceError> {
        let path = self.path_for(target)?;
        if path.exists() {
            warn!("Checkpoint {:?} already exists, leaving it untouched", path);
            return Ok(());
        }

        // Written next to the destination, then moved into place in one step.
        let tmp = NamedTempFile::new_in(&self.dir).map_err(|e| PersistenceError::io(&self.dir, e))?;
        {
            let mut wtr = csv::Writer::from_writer(tmp.as_file());
            for edge in edges {
                wtr.serialize(CheckpointRow {
                    username: edge.target.clone(),
                    display_name: edge.target_display_name.clone(),
                })
                .map_err(|e| PersistenceError::csv(&path, e))?;
            }
            if edges.is_empty() {
                wtr.write_record(["username", "display_name"])
                    .map_err(|e| PersistenceError::csv(&path, e))?;
            }
            wtr.flush().map_err(|e| PersistenceError::io(&path, e))?;
        }
        tmp.as_file()
            .sync_all()
            .map_err(|e| PersistenceError::io(&path, e))?;

        tmp.persist_noclobber(&path).map_err(|e| {
            error!("Failed to persist checkpoint {:?}: {}", path, e.error);
            PersistenceError::Persist {
                path: path.clone(),
                source: e.error,
            }
        })?;
        info!("Saved {} following for @{} to {:?}", edges.len(), target, path);
        Ok(())
    }

    fn probe(&self) -> Result<(), PersistenceError> {
        let mut tmp =
            NamedTempFile::new_in(&self.dir).map_err(|e| PersistenceError::io(&self.dir, e))?;
        tmp.write_all(b"probe")
            .map_err(|e| PersistenceError::io(&self.dir, e))
    }
}
