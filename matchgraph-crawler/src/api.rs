use crate::client::RateLimitedClient;
use crate::error::FetchError;
use crate::record::MatchRecord;
use serde_json::Value;
use tracing::debug;
use url::Url;

pub const DEFAULT_QUEUE: u32 = 450;
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// The three endpoints the crawl consumes: identity lookup, per-player
/// match-id page, and match detail. Hosts are regional
/// (`https://{region}.api.riotgames.com`); tests override the base URL.
pub struct MatchApi {
    client: RateLimitedClient,
    base: Url,
    queue: u32,
    page_size: u32,
}

impl MatchApi {
    pub fn new(client: RateLimitedClient, region: &str) -> Result<Self, FetchError> {
        let base = Url::parse(&format!("https://{}.api.riotgames.com", region))
            .map_err(|e| FetchError::InvalidUrl(format!("bad region {:?}: {}", region, e)))?;
        Self::with_base_url(client, base)
    }

    pub fn with_base_url(client: RateLimitedClient, base: Url) -> Result<Self, FetchError> {
        if base.cannot_be_a_base() {
            return Err(FetchError::InvalidUrl(format!(
                "{} cannot serve as an API base",
                base
            )));
        }
        Ok(Self {
            client,
            base,
            queue: DEFAULT_QUEUE,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    pub fn with_queue(mut self, queue: u32) -> Self {
        self.queue = queue;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Resolve a human-readable Riot ID to the player's PUUID.
    pub async fn account_by_riot_id(
        &self,
        game_name: &str,
        tag_line: &str,
    ) -> Result<String, FetchError> {
        let url = self.endpoint([
            "riot",
            "account",
            "v1",
            "accounts",
            "by-riot-id",
            game_name,
            tag_line,
        ]);
        debug!("Looking up account {}#{}", game_name, tag_line);
        let body = self.client.fetch_json(url.as_str()).await?;
        body.get("puuid")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| FetchError::Decode("account response lacks a puuid".to_string()))
    }

    /// Fetch one page of match ids for a player, filtered to the
    /// configured queue. Only the API's first window is consumed.
    pub async fn match_ids_by_puuid(&self, puuid: &str) -> Result<Vec<String>, FetchError> {
        let mut url = self.endpoint(["lol", "match", "v5", "matches", "by-puuid", puuid, "ids"]);
        url.query_pairs_mut()
            .append_pair("start", "0")
            .append_pair("count", &self.page_size.to_string())
            .append_pair("queue", &self.queue.to_string());
        let body = self.client.fetch_json(url.as_str()).await?;
        serde_json::from_value(body).map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// Fetch the full detail payload for one match.
    pub async fn match_detail(&self, match_id: &str) -> Result<MatchRecord, FetchError> {
        let url = self.endpoint(["lol", "match", "v5", "matches", match_id]);
        let body = self.client.fetch_json(url.as_str()).await?;
        serde_json::from_value(body).map_err(|e| FetchError::Decode(e.to_string()))
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .expect("base validated at construction")
            .pop_if_empty()
            .extend(segments);
        url
    }
}
