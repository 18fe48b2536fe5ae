use crate::checkpoint::{DEFAULT_FILE_INTERVAL, DataDir};
use indicatif::{ProgressBar, ProgressStyle};
use matchgraph_crawler::api::{DEFAULT_PAGE_SIZE, DEFAULT_QUEUE};
use matchgraph_crawler::client::DEFAULT_CONCURRENCY;
use matchgraph_crawler::engine::{DEFAULT_MAX_DEPTH, DEFAULT_SAVE_INTERVAL};
use matchgraph_crawler::{CrawlEngine, CrawlError, CrawlSummary, MatchApi, RateLimitedClient};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Options for one crawl run, read once at startup.
pub struct CrawlOptions {
    pub game_name: String,
    pub tag_line: String,
    pub region: String,
    pub api_key: String,
    pub queue: u32,
    pub page_size: u32,
    pub data_dir: PathBuf,
    pub concurrency: usize,
    pub max_depth: usize,
    pub save_interval: usize,
    pub file_interval: usize,
    pub show_progress: bool,
}

impl CrawlOptions {
    pub fn new(
        game_name: impl Into<String>,
        tag_line: impl Into<String>,
        api_key: impl Into<String>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            game_name: game_name.into(),
            tag_line: tag_line.into(),
            region: "asia".to_string(),
            api_key: api_key.into(),
            queue: DEFAULT_QUEUE,
            page_size: DEFAULT_PAGE_SIZE,
            data_dir: data_dir.into(),
            concurrency: DEFAULT_CONCURRENCY,
            max_depth: DEFAULT_MAX_DEPTH,
            save_interval: DEFAULT_SAVE_INTERVAL,
            file_interval: DEFAULT_FILE_INTERVAL,
            show_progress: true,
        }
    }
}

/// Split a `Name#Tag` Riot ID into its game-name and tag-line parts.
pub fn parse_riot_id(riot_id: &str) -> Option<(String, String)> {
    let (name, tag) = riot_id.rsplit_once('#')?;
    if name.is_empty() || tag.is_empty() {
        return None;
    }
    Some((name.to_string(), tag.to_string()))
}

/// Wire up the client, the data directory and the engine, resolve the
/// seed, and drive the traversal to completion (or until `shutdown` is
/// raised). Returns the run summary.
pub async fn execute_crawl(
    options: CrawlOptions,
    shutdown: Arc<AtomicBool>,
) -> Result<CrawlSummary, CrawlError> {
    let CrawlOptions {
        game_name,
        tag_line,
        region,
        api_key,
        queue,
        page_size,
        data_dir,
        concurrency,
        max_depth,
        save_interval,
        file_interval,
        show_progress,
    } = options;

    let client = RateLimitedClient::new(api_key, concurrency)?;
    let api = MatchApi::new(client, &region)?
        .with_queue(queue)
        .with_page_size(page_size);
    let store = DataDir::open(data_dir)?.with_file_interval(file_interval);

    let mut engine = CrawlEngine::new(api, store)
        .with_max_depth(max_depth)
        .with_save_interval(save_interval)
        .with_shutdown_flag(shutdown);

    let progress_bar = if show_progress {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap(),
        );
        pb.set_message("Resolving seed...");
        Some(Arc::new(pb))
    } else {
        None
    };

    if let Some(pb) = &progress_bar {
        let collected = Arc::new(AtomicUsize::new(0));
        let pb_node = pb.clone();
        let pb_record = pb.clone();
        engine = engine
            .with_progress_callback(Arc::new(move |depth, puuid| {
                pb_node.set_message(format!("depth {} | expanding {}", depth, puuid));
                pb_node.tick();
            }))
            .with_record_callback(Arc::new(move |_match_id| {
                let n = collected.fetch_add(1, Ordering::Relaxed) + 1;
                pb_record.set_message(format!("{} matches collected", n));
                pb_record.tick();
            }));
    }

    let seed = engine.resolve_seed(&game_name, &tag_line).await?;
    let summary = engine.run(&seed).await?;

    if let Some(pb) = &progress_bar {
        pb.finish_with_message(format!(
            "Crawl complete: {} matches collected this run",
            summary.records_collected
        ));
    }

    Ok(summary)
}
