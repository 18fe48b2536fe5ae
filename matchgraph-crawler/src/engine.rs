use crate::api::MatchApi;
use crate::error::{CrawlError, Result, StoreError};
use crate::record::MatchRecord;
use crate::retry::{DEFAULT_MAX_ATTEMPTS, with_retry};
use crate::store::{CheckpointStore, SetName};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_DEPTH: usize = 4;
pub const DEFAULT_SAVE_INTERVAL: usize = 100;

/// Called with (depth, puuid) each time a player node is expanded.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;
/// Called with the match id each time a record is collected.
pub type RecordCallback = Arc<dyn Fn(String) + Send + Sync>;

#[derive(Debug, Default, Clone)]
pub struct CrawlSummary {
    /// Records fetched and batched during this run.
    pub records_collected: usize,
    /// Player nodes whose match list was fetched during this run.
    pub nodes_expanded: usize,
    /// Detail fetches abandoned after the retry budget ran out.
    pub records_skipped: usize,
    /// Match-list fetches abandoned after the retry budget ran out.
    pub nodes_skipped: usize,
    pub batches_flushed: usize,
    /// True when the run stopped on the shutdown flag rather than an
    /// exhausted frontier.
    pub interrupted: bool,
    /// Collected-set size at the end of the run, prior runs included.
    pub total_collected: usize,
    pub total_visited: usize,
}

/// Breadth-first traversal of the match graph.
///
/// All mutable crawl state (frontier, dedup sets, pending batch) is owned
/// here and touched only by the driver loop; concurrent detail fetches
/// hand their results back to the driver instead of sharing state.
pub struct CrawlEngine<S: CheckpointStore> {
    api: MatchApi,
    store: S,
    visited: HashSet<String>,
    collected: HashSet<String>,
    frontier: VecDeque<(String, usize)>,
    batch: Vec<MatchRecord>,
    max_depth: usize,
    save_interval: usize,
    max_attempts: u32,
    shutdown: Option<Arc<AtomicBool>>,
    progress_callback: Option<ProgressCallback>,
    record_callback: Option<RecordCallback>,
}

impl<S: CheckpointStore> CrawlEngine<S> {
    /// Build an engine over an API surface and a checkpoint store. The
    /// dedup sets are loaded from the store immediately, so identifiers
    /// persisted by earlier runs are never fetched again.
    pub fn new(api: MatchApi, store: S) -> Self {
        let visited = store.load_set(SetName::VisitedPlayers);
        let collected = store.load_set(SetName::CollectedMatches);
        if !visited.is_empty() || !collected.is_empty() {
            info!(
                "Resuming from checkpoint: {} players visited, {} matches collected",
                visited.len(),
                collected.len()
            );
        }
        Self {
            api,
            store,
            visited,
            collected,
            frontier: VecDeque::new(),
            batch: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            save_interval: DEFAULT_SAVE_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            shutdown: None,
            progress_callback: None,
            record_callback: None,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_save_interval(mut self, interval: usize) -> Self {
        self.save_interval = interval.max(1);
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn with_record_callback(mut self, callback: RecordCallback) -> Self {
        self.record_callback = Some(callback);
        self
    }

    pub fn visited(&self) -> &HashSet<String> {
        &self.visited
    }

    pub fn collected(&self) -> &HashSet<String> {
        &self.collected
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resolve the seed identity to a PUUID. Failure here is fatal for
    /// the run; no crawl state has been touched yet.
    pub async fn resolve_seed(&self, game_name: &str, tag_line: &str) -> Result<String> {
        info!("Resolving seed identity {}#{}", game_name, tag_line);
        with_retry(self.max_attempts, || {
            self.api.account_by_riot_id(game_name, tag_line)
        })
        .await
        .map_err(|e| CrawlError::SeedUnresolved(format!("{}#{}: {}", game_name, tag_line, e)))
    }

    /// Run the traversal until the frontier drains or shutdown is
    /// requested, flushing any pending batch before returning.
    pub async fn run(&mut self, seed: &str) -> Result<CrawlSummary> {
        let mut summary = CrawlSummary::default();
        self.frontier.push_back((seed.to_string(), 0));

        while let Some((node, depth)) = self.frontier.pop_front() {
            if self.shutdown_requested() {
                info!(
                    "Shutdown requested, stopping after {} expansions",
                    summary.nodes_expanded
                );
                summary.interrupted = true;
                break;
            }
            if self.visited.contains(&node) || depth > self.max_depth {
                continue;
            }
            self.visited.insert(node.clone());
            summary.nodes_expanded += 1;
            if let Some(callback) = &self.progress_callback {
                callback(depth, node.clone());
            }
            debug!("Expanding player {} at depth {}", node, depth);

            let ids =
                match with_retry(self.max_attempts, || self.api.match_ids_by_puuid(&node)).await {
                    Ok(ids) => ids,
                    Err(e) => {
                        warn!("Skipping player {}: match list fetch failed: {}", node, e);
                        summary.nodes_skipped += 1;
                        continue;
                    }
                };

            // Mark ids collected before any fetch is issued so a duplicate
            // inside the same page cannot be fetched twice.
            let mut fresh = Vec::new();
            for id in ids {
                if self.collected.insert(id.clone()) {
                    fresh.push(id);
                }
            }

            let api = &self.api;
            let max_attempts = self.max_attempts;
            let mut detail_fetches: FuturesUnordered<_> = fresh
                .into_iter()
                .map(|id| async move {
                    let result = with_retry(max_attempts, || api.match_detail(&id)).await;
                    (id, result)
                })
                .collect();

            // Completion order, not discovery order, decides batch order.
            while let Some((id, result)) = detail_fetches.next().await {
                match result {
                    Ok(record) => {
                        summary.records_collected += 1;
                        if let Some(callback) = &self.record_callback {
                            callback(id);
                        }
                        for puuid in record.participants() {
                            if depth + 1 <= self.max_depth && !self.visited.contains(puuid) {
                                self.frontier.push_back((puuid.clone(), depth + 1));
                            }
                        }
                        self.batch.push(record);
                        if self.batch.len() >= self.save_interval {
                            Self::flush(
                                &mut self.store,
                                &mut self.batch,
                                &self.visited,
                                &self.collected,
                            )?;
                            summary.batches_flushed += 1;
                        }
                    }
                    Err(e) => {
                        // The id stays in the collected set; a record that
                        // exhausts its retries is given up for this run.
                        warn!("Dropping match {}: detail fetch failed: {}", id, e);
                        summary.records_skipped += 1;
                    }
                }
            }
        }

        if self.batch.is_empty() {
            // Sets may have grown since the last flush even with nothing
            // left in the buffer.
            self.store.save_set(SetName::VisitedPlayers, &self.visited)?;
            self.store
                .save_set(SetName::CollectedMatches, &self.collected)?;
        } else {
            Self::flush(&mut self.store, &mut self.batch, &self.visited, &self.collected)?;
            summary.batches_flushed += 1;
        }

        summary.total_collected = self.collected.len();
        summary.total_visited = self.visited.len();
        info!(
            "Crawl finished: {} records this run, {} collected in total",
            summary.records_collected, summary.total_collected
        );
        Ok(summary)
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Free function over disjoint fields so it can run while the detail
    /// fetches still borrow the API handle.
    fn flush(
        store: &mut S,
        batch: &mut Vec<MatchRecord>,
        visited: &HashSet<String>,
        collected: &HashSet<String>,
    ) -> std::result::Result<(), StoreError> {
        if !batch.is_empty() {
            let total = store.append_batch(batch)?;
            debug!(
                "Flushed {} records, active shard now holds {}",
                batch.len(),
                total
            );
            batch.clear();
        }
        store.save_set(SetName::VisitedPlayers, visited)?;
        store.save_set(SetName::CollectedMatches, collected)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RateLimitedClient;
    use std::collections::HashMap;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct MemoryStore {
        seeded: HashMap<SetName, HashSet<String>>,
        saved: HashMap<SetName, HashSet<String>>,
        appended: Vec<MatchRecord>,
        appends: usize,
    }

    impl MemoryStore {
        fn seeded_with(visited: &[&str], collected: &[&str]) -> Self {
            let mut store = Self::default();
            store.seeded.insert(
                SetName::VisitedPlayers,
                visited.iter().map(|s| s.to_string()).collect(),
            );
            store.seeded.insert(
                SetName::CollectedMatches,
                collected.iter().map(|s| s.to_string()).collect(),
            );
            store
        }

        fn appended_ids(&self) -> HashSet<String> {
            self.appended
                .iter()
                .map(|r| r.metadata.match_id.clone())
                .collect()
        }
    }

    impl CheckpointStore for MemoryStore {
        fn load_set(&self, name: SetName) -> HashSet<String> {
            self.seeded.get(&name).cloned().unwrap_or_default()
        }

        fn save_set(
            &mut self,
            name: SetName,
            set: &HashSet<String>,
        ) -> std::result::Result<(), StoreError> {
            self.saved.insert(name, set.clone());
            Ok(())
        }

        fn append_batch(
            &mut self,
            records: &[MatchRecord],
        ) -> std::result::Result<usize, StoreError> {
            self.appended.extend_from_slice(records);
            self.appends += 1;
            Ok(self.appended.len())
        }
    }

    async fn engine_for(server: &MockServer, store: MemoryStore) -> CrawlEngine<MemoryStore> {
        let client = RateLimitedClient::new("test-key", 4).unwrap();
        let api = MatchApi::with_base_url(client, Url::parse(&server.uri()).unwrap()).unwrap();
        CrawlEngine::new(api, store)
    }

    async fn mount_account(server: &MockServer, name: &str, tag: &str, puuid: &str) {
        Mock::given(method("GET"))
            .and(path(format!(
                "/riot/account/v1/accounts/by-riot-id/{}/{}",
                name, tag
            )))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "puuid": puuid })),
            )
            .mount(server)
            .await;
    }

    async fn mount_match_ids(server: &MockServer, puuid: &str, ids: &[&str], expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/lol/match/v5/matches/by-puuid/{}/ids", puuid)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!(ids)))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    async fn mount_detail(server: &MockServer, id: &str, participants: &[&str], expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/lol/match/v5/matches/{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "metadata": { "matchId": id, "participants": participants },
                "info": { "queueId": 450 }
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    /// The scenario from the crawler's contract: the seed resolves to P1,
    /// P1 played M1 and M2, M1 introduces P2, and M2's detail endpoint
    /// fails twice before succeeding.
    #[tokio::test]
    async fn end_to_end_scenario_with_flaky_detail() {
        let server = MockServer::start().await;
        mount_account(&server, "Seed", "KR1", "P1").await;
        mount_match_ids(&server, "P1", &["M1", "M2"], 1).await;
        mount_match_ids(&server, "P2", &[], 1).await;
        mount_detail(&server, "M1", &["P1", "P2"], 1).await;

        Mock::given(method("GET"))
            .and(path("/lol/match/v5/matches/M2"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        mount_detail(&server, "M2", &["P1"], 1).await;

        let mut engine = engine_for(&server, MemoryStore::default())
            .await
            .with_max_depth(1);
        let seed = engine.resolve_seed("Seed", "KR1").await.unwrap();
        assert_eq!(seed, "P1");

        let summary = engine.run(&seed).await.unwrap();

        assert_eq!(summary.records_collected, 2);
        assert_eq!(summary.records_skipped, 0);
        assert_eq!(summary.nodes_expanded, 2);
        assert!(engine.collected().contains("M1"));
        assert!(engine.collected().contains("M2"));
        assert!(engine.visited().contains("P1"));
        assert!(engine.visited().contains("P2"));
        assert_eq!(engine.store().appended_ids(), engine.collected().clone());
    }

    #[tokio::test]
    async fn shared_participants_are_expanded_once() {
        let server = MockServer::start().await;
        mount_account(&server, "Seed", "KR1", "P1").await;
        // P2 appears in both matches, so it lands on the frontier twice
        // but its match list must be fetched exactly once.
        mount_match_ids(&server, "P1", &["M1", "M2"], 1).await;
        mount_match_ids(&server, "P2", &["M1"], 1).await;
        mount_detail(&server, "M1", &["P1", "P2"], 1).await;
        mount_detail(&server, "M2", &["P1", "P2"], 1).await;

        let mut engine = engine_for(&server, MemoryStore::default())
            .await
            .with_max_depth(2);
        let summary = engine.run("P1").await.unwrap();

        assert_eq!(summary.nodes_expanded, 2);
        assert_eq!(summary.records_collected, 2);
        server.verify().await;
    }

    #[tokio::test]
    async fn depth_bound_blocks_enqueue_beyond_the_limit() {
        let server = MockServer::start().await;
        mount_match_ids(&server, "P1", &["M1"], 1).await;
        // P2 sits at depth 1 which is past the bound, so its list
        // endpoint must never be hit.
        mount_match_ids(&server, "P2", &[], 0).await;
        mount_detail(&server, "M1", &["P1", "P2"], 1).await;

        let mut engine = engine_for(&server, MemoryStore::default())
            .await
            .with_max_depth(0);
        let summary = engine.run("P1").await.unwrap();

        assert_eq!(summary.nodes_expanded, 1);
        assert!(!engine.visited().contains("P2"));
        server.verify().await;
    }

    #[tokio::test]
    async fn resume_skips_checkpointed_players_and_matches() {
        let server = MockServer::start().await;
        // A and B were expanded in an earlier run and M1 was collected;
        // none of them may produce another request.
        mount_match_ids(&server, "A", &[], 0).await;
        mount_match_ids(&server, "B", &[], 0).await;
        mount_match_ids(&server, "C", &["M1", "M2"], 1).await;
        Mock::given(method("GET"))
            .and(path("/lol/match/v5/matches/M1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        mount_detail(&server, "M2", &["A", "B"], 1).await;

        let store = MemoryStore::seeded_with(&["A", "B"], &["M1"]);
        let mut engine = engine_for(&server, store).await.with_max_depth(2);
        let summary = engine.run("C").await.unwrap();

        assert_eq!(summary.records_collected, 1);
        assert_eq!(summary.total_collected, 2);
        assert_eq!(engine.store().appended_ids(), HashSet::from(["M2".to_string()]));
        server.verify().await;
    }

    #[tokio::test]
    async fn failed_list_fetch_skips_the_node_and_continues() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lol/match/v5/matches/by-puuid/P1/ids"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut engine = engine_for(&server, MemoryStore::default())
            .await
            .with_max_attempts(1);
        let summary = engine.run("P1").await.unwrap();

        assert_eq!(summary.nodes_skipped, 1);
        assert_eq!(summary.records_collected, 0);
        // The node stays visited so it is not retried within this run.
        assert!(engine.visited().contains("P1"));
    }

    #[tokio::test]
    async fn failed_detail_stays_collected_but_unpersisted() {
        let server = MockServer::start().await;
        mount_match_ids(&server, "P1", &["M1"], 1).await;
        Mock::given(method("GET"))
            .and(path("/lol/match/v5/matches/M1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut engine = engine_for(&server, MemoryStore::default())
            .await
            .with_max_attempts(1);
        let summary = engine.run("P1").await.unwrap();

        assert_eq!(summary.records_skipped, 1);
        assert!(engine.collected().contains("M1"));
        assert!(engine.store().appended_ids().is_empty());
        // The collected mark is still persisted with the final set save.
        assert!(engine.store().saved[&SetName::CollectedMatches].contains("M1"));
    }

    #[tokio::test]
    async fn batch_flushes_at_the_save_interval() {
        let server = MockServer::start().await;
        mount_match_ids(&server, "P1", &["M1", "M2", "M3"], 1).await;
        for id in ["M1", "M2", "M3"] {
            mount_detail(&server, id, &[], 1).await;
        }

        let mut engine = engine_for(&server, MemoryStore::default())
            .await
            .with_save_interval(2);
        let summary = engine.run("P1").await.unwrap();

        // Two records trigger the mid-run flush, the third goes out with
        // the final flush.
        assert_eq!(summary.batches_flushed, 2);
        assert_eq!(engine.store().appends, 2);
        assert_eq!(engine.store().appended.len(), 3);
    }

    #[tokio::test]
    async fn shutdown_flag_stops_the_run_and_persists_state() {
        let server = MockServer::start().await;
        mount_match_ids(&server, "P1", &["M1"], 1).await;
        mount_detail(&server, "M1", &["P2"], 1).await;
        mount_match_ids(&server, "P2", &[], 0).await;

        let flag = Arc::new(AtomicBool::new(false));
        let mut engine = engine_for(&server, MemoryStore::default())
            .await
            .with_max_depth(3)
            .with_shutdown_flag(flag.clone());

        // Trip the flag as soon as the first node reports progress; P2 is
        // still on the frontier at that point and must not be expanded.
        let trip = flag.clone();
        engine = engine.with_progress_callback(Arc::new(move |_depth, _node| {
            trip.store(true, Ordering::Relaxed);
        }));

        let summary = engine.run("P1").await.unwrap();

        assert!(summary.interrupted);
        assert_eq!(summary.nodes_expanded, 1);
        assert_eq!(engine.store().appended.len(), 1);
        assert!(engine.store().saved[&SetName::VisitedPlayers].contains("P1"));
        server.verify().await;
    }

    #[tokio::test]
    async fn unresolvable_seed_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/riot/account/v1/accounts/by-riot-id/Nobody/NA1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let engine = engine_for(&server, MemoryStore::default()).await;
        let err = engine.resolve_seed("Nobody", "NA1").await.unwrap_err();
        assert!(matches!(err, CrawlError::SeedUnresolved(_)));
    }
}
