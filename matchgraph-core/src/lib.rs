pub mod checkpoint;
pub mod crawl;

pub use checkpoint::{CheckpointStatus, DEFAULT_FILE_INTERVAL, DataDir, checkpoint_status};
pub use crawl::{CrawlOptions, execute_crawl, parse_riot_id};
