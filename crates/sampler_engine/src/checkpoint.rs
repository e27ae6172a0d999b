use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use log::info;
use sampler_core::{SizeRange, StratumState};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::HarvestError;

/// Durable projection of one stratum's state: one JSON row per stratum,
/// keyed by its size range, with upsert semantics (the in-memory map is
/// authoritative, the file is rewritten whole).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    pub low: u64,
    pub high: u64,
    pub state: EntryState,
    #[serde(default)]
    pub overflowed: bool,
    /// Unix seconds of the last transition.
    pub timestamp: u64,
}

/// Serialized form of [`StratumState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    Pending,
    InProgress,
    Split,
    Done,
}

impl From<StratumState> for EntryState {
    fn from(state: StratumState) -> Self {
        match state {
            StratumState::Pending => EntryState::Pending,
            StratumState::InProgress => EntryState::InProgress,
            StratumState::Split => EntryState::Split,
            StratumState::Done => EntryState::Done,
        }
    }
}

impl From<EntryState> for StratumState {
    fn from(state: EntryState) -> Self {
        match state {
            EntryState::Pending => StratumState::Pending,
            EntryState::InProgress => StratumState::InProgress,
            EntryState::Split => StratumState::Split,
            EntryState::Done => StratumState::Done,
        }
    }
}

/// Durable record of which strata have been harvested. Its presence and
/// content is the sole resumption mechanism; deleting the file forces a
/// full re-walk.
pub struct CheckpointStore {
    path: PathBuf,
    rows: BTreeMap<(u64, u64), CheckpointEntry>,
}

impl CheckpointStore {
    /// Load the checkpoint, or start empty when the file does not exist.
    /// A file that exists but cannot be parsed is fatal.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, HarvestError> {
        let path = path.into();
        let mut rows = BTreeMap::new();
        if path.exists() {
            let text = fs::read_to_string(&path)?;
            for (index, line) in text.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let entry: CheckpointEntry = serde_json::from_str(line).map_err(|err| {
                    HarvestError::CheckpointCorrupt {
                        path: path.clone(),
                        line: index + 1,
                        reason: err.to_string(),
                    }
                })?;
                if entry.low < 1 || entry.low > entry.high {
                    return Err(HarvestError::CheckpointCorrupt {
                        path: path.clone(),
                        line: index + 1,
                        reason: format!("invalid range {}..{}", entry.low, entry.high),
                    });
                }
                rows.insert((entry.low, entry.high), entry);
            }
            info!("loaded {} checkpoint rows from {:?}", rows.len(), path);
        }
        Ok(Self { path, rows })
    }

    /// Seed rows for [`sampler_core::SamplingPlanner::resume`].
    pub fn planner_seed(&self) -> Vec<(SizeRange, StratumState, bool)> {
        self.rows
            .values()
            .map(|entry| {
                (
                    SizeRange::new(entry.low, entry.high),
                    entry.state.into(),
                    entry.overflowed,
                )
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Upsert one stratum's state and rewrite the file atomically.
    pub fn record(
        &mut self,
        range: SizeRange,
        state: StratumState,
        overflowed: bool,
    ) -> Result<(), HarvestError> {
        self.rows.insert(
            (range.low, range.high),
            CheckpointEntry {
                low: range.low,
                high: range.high,
                state: state.into(),
                overflowed,
                timestamp: unix_now(),
            },
        );
        self.rewrite()
    }

    /// Record a split as one transition: both children become `Pending` and
    /// the parent becomes `Split` in a single file rewrite, so no crash can
    /// surface a `Split` parent without its children or a lone child
    /// shadowing its still-unfinished sibling.
    pub fn record_split(
        &mut self,
        parent: SizeRange,
        lower: SizeRange,
        upper: SizeRange,
    ) -> Result<(), HarvestError> {
        let now = unix_now();
        for child in [lower, upper] {
            self.rows.insert(
                (child.low, child.high),
                CheckpointEntry {
                    low: child.low,
                    high: child.high,
                    state: EntryState::Pending,
                    overflowed: false,
                    timestamp: now,
                },
            );
        }
        self.rows.insert(
            (parent.low, parent.high),
            CheckpointEntry {
                low: parent.low,
                high: parent.high,
                state: EntryState::Split,
                overflowed: false,
                timestamp: now,
            },
        );
        self.rewrite()
    }

    /// Write all rows to a temp file in the target directory, then rename
    /// over the checkpoint so a crash never leaves a torn file.
    fn rewrite(&self) -> Result<(), HarvestError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        for entry in self.rows.values() {
            let line = serde_json::to_string(entry)
                .map_err(|err| HarvestError::Persistence(err.to_string()))?;
            writeln!(tmp, "{line}")?;
        }
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|err| HarvestError::CheckpointIo(err.error))?;
        Ok(())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
