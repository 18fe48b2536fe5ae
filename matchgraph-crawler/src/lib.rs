pub mod api;
pub mod client;
pub mod engine;
pub mod error;
pub mod record;
pub mod retry;
pub mod store;

pub use api::MatchApi;
pub use client::RateLimitedClient;
pub use engine::{CrawlEngine, CrawlSummary, ProgressCallback, RecordCallback};
pub use error::{CrawlError, FetchError, StoreError};
pub use record::{MatchMetadata, MatchRecord};
pub use store::{CheckpointStore, SetName};
