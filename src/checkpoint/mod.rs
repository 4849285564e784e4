//! Durable storage for the Q-table and episode metrics
//!
//! Each slot is a directory under the store root holding two files:
//!
//! - `qtable.npy`: the table as a `[state_count, action_count]` array of `<f8`
//! - `metrics.json`: `{"best_reward": ..., "episode_rewards": [...]}`
//!
//! A save writes both files into a staging directory and then swaps it in with renames, so a
//! reader sees the complete previous slot, the complete new slot, or (for a moment) no slot at
//! all, never a table from one save next to metrics from another.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use log::{info, warn};

use crate::{
    algo::QTable,
    error::{Error, Result},
    metrics::EpisodeMetrics,
};

pub mod npy;

pub const TABLE_FILE: &str = "qtable.npy";
pub const METRICS_FILE: &str = "metrics.json";

/// The persisted state of an agent
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub table: QTable,
    pub metrics: EpisodeMetrics,
}

/// A directory of named checkpoint slots
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    root: PathBuf,
}

impl CheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the files of `slot`
    pub fn slot_dir(&self, slot: &str) -> PathBuf {
        self.root.join(slot)
    }

    pub fn exists(&self, slot: &str) -> bool {
        self.slot_dir(slot).is_dir() || self.retired_dir(slot).is_dir()
    }

    /// Persist `table` and `metrics` under `slot`, replacing what was there
    pub fn save(&self, slot: &str, table: &QTable, metrics: &EpisodeMetrics) -> Result<()> {
        validate_slot(slot)?;
        fs::create_dir_all(&self.root)
            .map_err(|e| Error::io(format!("create {}", self.root.display()), e))?;

        let staging = self.root.join(format!(".{slot}.tmp"));
        let retired = self.retired_dir(slot);
        let target = self.slot_dir(slot);

        if staging.exists() {
            remove_dir(&staging)?;
        }
        fs::create_dir(&staging)
            .map_err(|e| Error::io(format!("create {}", staging.display()), e))?;

        write_file(&staging.join(TABLE_FILE), |w| {
            npy::write(w, table.state_count(), table.action_count(), table.as_slice())
                .map_err(|e| Error::io("encode Q-table", e))
        })?;
        write_file(&staging.join(METRICS_FILE), |w| {
            serde_json::to_writer(w, metrics).map_err(Error::from)
        })?;

        if target.exists() {
            if retired.exists() {
                remove_dir(&retired)?;
            }
            fs::rename(&target, &retired)
                .map_err(|e| Error::io(format!("retire {}", target.display()), e))?;
        }
        fs::rename(&staging, &target)
            .map_err(|e| Error::io(format!("publish {}", target.display()), e))?;
        if retired.exists() {
            if let Err(e) = fs::remove_dir_all(&retired) {
                warn!("Could not clean up {}: {e}", retired.display());
            }
        }
        Ok(())
    }

    /// Read the checkpoint stored under `slot`
    ///
    /// **Returns** [`Error::MissingCheckpoint`] if the slot was never saved and
    /// [`Error::CorruptCheckpoint`] if it exists but cannot be decoded
    pub fn load(&self, slot: &str) -> Result<Checkpoint> {
        validate_slot(slot)?;
        let target = self.slot_dir(slot);
        let dir = if target.is_dir() {
            target
        } else {
            let retired = self.retired_dir(slot);
            if !retired.is_dir() {
                return Err(Error::MissingCheckpoint {
                    slot: slot.to_string(),
                });
            }
            warn!("Slot `{slot}` was caught mid-save, restoring the previous version");
            retired
        };

        let table_path = dir.join(TABLE_FILE);
        let file = File::open(&table_path)
            .map_err(|e| Error::corrupt(slot, format!("{}: {e}", table_path.display())))?;
        let array = npy::read(&mut BufReader::new(file))
            .map_err(|e| Error::corrupt(slot, format!("{}: {e}", table_path.display())))?;
        let table = QTable::from_raw(array.rows, array.cols, array.data)
            .ok_or_else(|| Error::corrupt(slot, "Q-table has no actions"))?;

        let metrics_path = dir.join(METRICS_FILE);
        let file = File::open(&metrics_path)
            .map_err(|e| Error::corrupt(slot, format!("{}: {e}", metrics_path.display())))?;
        let metrics: EpisodeMetrics = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::corrupt(slot, format!("{}: {e}", metrics_path.display())))?;

        info!(
            "Loaded slot `{slot}` ({} episodes, best reward {})",
            metrics.episodes(),
            metrics.best_reward()
        );
        Ok(Checkpoint { table, metrics })
    }

    fn retired_dir(&self, slot: &str) -> PathBuf {
        self.root.join(format!(".{slot}.old"))
    }
}

/// Slot names are single, non-hidden path components
pub(crate) fn validate_slot(slot: &str) -> Result<()> {
    let ok = !slot.is_empty()
        && !slot.starts_with('.')
        && !slot.contains(['/', '\\'])
        && slot != "..";
    ok.then_some(())
        .ok_or_else(|| Error::InvalidConfig(format!("`{slot}` is not a valid slot name")))
}

fn write_file(path: &Path, f: impl FnOnce(&mut BufWriter<File>) -> Result<()>) -> Result<()> {
    let file =
        File::create(path).map_err(|e| Error::io(format!("create {}", path.display()), e))?;
    let mut writer = BufWriter::new(file);
    f(&mut writer)?;
    writer
        .flush()
        .map_err(|e| Error::io(format!("write {}", path.display()), e))?;
    let file = writer
        .into_inner()
        .map_err(|e| Error::io(format!("write {}", path.display()), e.into_error()))?;
    file.sync_all()
        .map_err(|e| Error::io(format!("sync {}", path.display()), e))
}

fn remove_dir(path: &Path) -> Result<()> {
    fs::remove_dir_all(path).map_err(|e| Error::io(format!("remove {}", path.display()), e))
}
