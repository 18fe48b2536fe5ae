use matchgraph_crawler::error::StoreError;
use matchgraph_crawler::record::MatchRecord;
use matchgraph_crawler::store::{CheckpointStore, SetName};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_FILE_INTERVAL: usize = 1000;
const SHARD_PREFIX: &str = "matches_";
const SHARD_SUFFIX: &str = ".json";

/// File-backed checkpoint store: two JSON set files plus zero-padded,
/// rollover-bounded record shards, all under one data directory.
///
/// Shards are strictly appended, never truncated, so a crash between a
/// fetch and a flush costs at most one unflushed batch; the matching ids
/// were not persisted either, so those records are simply re-fetched on
/// the next run.
pub struct DataDir {
    root: PathBuf,
    file_interval: usize,
    index: usize,
    count: usize,
}

impl DataDir {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let mut dir = Self {
            root,
            file_interval: DEFAULT_FILE_INTERVAL,
            index: 0,
            count: 0,
        };
        let (index, count) = dir.scan_shards()?;
        dir.index = index;
        dir.count = count;
        Ok(dir)
    }

    pub fn with_file_interval(mut self, file_interval: usize) -> Self {
        self.file_interval = file_interval.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Index and record count of the most recently written shard. A full
    /// shard keeps its overshoot; the move to a fresh index happens on
    /// the next append.
    pub fn current_index_and_count(&self) -> (usize, usize) {
        (self.index, self.count)
    }

    pub fn shard_path(&self, index: usize) -> PathBuf {
        self.root
            .join(format!("{}{:04}{}", SHARD_PREFIX, index, SHARD_SUFFIX))
    }

    pub fn read_shard(&self, index: usize) -> Result<Vec<MatchRecord>, StoreError> {
        read_records(&self.shard_path(index))
    }

    /// Find the highest existing shard index and its record count so
    /// appends resume where the previous run stopped instead of starting
    /// a spurious new file.
    fn scan_shards(&self) -> Result<(usize, usize), StoreError> {
        let mut latest: Option<usize> = None;
        for entry in fs::read_dir(&self.root)? {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(stem) = name
                .strip_prefix(SHARD_PREFIX)
                .and_then(|rest| rest.strip_suffix(SHARD_SUFFIX))
            else {
                continue;
            };
            if let Ok(index) = stem.parse::<usize>() {
                latest = Some(latest.map_or(index, |seen| seen.max(index)));
            }
        }
        let Some(latest) = latest else {
            return Ok((0, 0));
        };
        match read_records(&self.shard_path(latest)) {
            Ok(records) => {
                debug!(
                    "Resuming at shard {:04} with {} records",
                    latest,
                    records.len()
                );
                Ok((latest, records.len()))
            }
            Err(err) => {
                // Never append into a shard that cannot be parsed; leave
                // it in place and start the next index fresh.
                warn!(
                    "Shard {:04} is unreadable ({}), starting a new shard",
                    latest, err
                );
                Ok((latest + 1, 0))
            }
        }
    }
}

impl CheckpointStore for DataDir {
    fn load_set(&self, name: SetName) -> HashSet<String> {
        let path = self.root.join(name.file_name());
        if !path.exists() {
            return HashSet::new();
        }
        match read_set(&path) {
            Ok(set) => set,
            Err(err) => {
                warn!(
                    "Checkpoint set {} is unreadable ({}), treating as empty",
                    name.file_name(),
                    err
                );
                HashSet::new()
            }
        }
    }

    fn save_set(&mut self, name: SetName, set: &HashSet<String>) -> Result<(), StoreError> {
        let path = self.root.join(name.file_name());
        let tmp = self.root.join(format!("{}.tmp", name.file_name()));
        // Sorted output keeps the files diffable between flushes.
        let mut items: Vec<&str> = set.iter().map(String::as_str).collect();
        items.sort_unstable();
        fs::write(&tmp, serde_json::to_vec(&items)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn append_batch(&mut self, records: &[MatchRecord]) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(self.count);
        }
        if self.count >= self.file_interval {
            self.index += 1;
            self.count = 0;
        }
        let path = self.shard_path(self.index);
        let mut existing = if path.exists() {
            read_records(&path)?
        } else {
            Vec::new()
        };
        existing.extend_from_slice(records);
        fs::write(&path, serde_json::to_vec_pretty(&existing)?)?;
        self.count = existing.len();
        debug!(
            "Appended {} records to {} ({} total)",
            records.len(),
            path.display(),
            self.count
        );
        Ok(self.count)
    }
}

fn read_records(path: &Path) -> Result<Vec<MatchRecord>, StoreError> {
    let body = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&body)?)
}

fn read_set(path: &Path) -> Result<HashSet<String>, StoreError> {
    let body = fs::read_to_string(path)?;
    let items: Vec<String> = serde_json::from_str(&body)?;
    Ok(items.into_iter().collect())
}

/// Point-in-time view of a data directory for operator inspection.
#[derive(Debug, Clone)]
pub struct CheckpointStatus {
    pub visited_players: usize,
    pub collected_matches: usize,
    pub shard_index: usize,
    pub shard_count: usize,
}

pub fn checkpoint_status(root: impl Into<PathBuf>) -> Result<CheckpointStatus, StoreError> {
    let dir = DataDir::open(root)?;
    let (shard_index, shard_count) = dir.current_index_and_count();
    Ok(CheckpointStatus {
        visited_players: dir.load_set(SetName::VisitedPlayers).len(),
        collected_matches: dir.load_set(SetName::CollectedMatches).len(),
        shard_index,
        shard_count,
    })
}
