use crate::error::StoreError;
use crate::record::MatchRecord;
use std::collections::HashSet;

/// The two dedup sets a crawl persists between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetName {
    VisitedPlayers,
    CollectedMatches,
}

impl SetName {
    pub fn file_name(self) -> &'static str {
        match self {
            SetName::VisitedPlayers => "visited_puuids.json",
            SetName::CollectedMatches => "collected_matches.json",
        }
    }
}

/// Durable side of a crawl: the dedup sets plus the append-only record
/// shards. The engine is generic over this seam so tests can substitute
/// an in-memory fake for the file-backed store.
pub trait CheckpointStore {
    /// Read a persisted set. Absent or unreadable backing data degrades
    /// to an empty set; it must never fail the crawl.
    fn load_set(&self, name: SetName) -> HashSet<String>;

    /// Overwrite the persisted set with the full current contents.
    fn save_set(&mut self, name: SetName, set: &HashSet<String>) -> Result<(), StoreError>;

    /// Append records to the active shard and return its new total count.
    fn append_batch(&mut self, records: &[MatchRecord]) -> Result<usize, StoreError>;
}
