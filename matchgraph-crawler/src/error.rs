use thiserror::Error;

/// Failure of a single logical fetch against the remote API.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed response body: {0}")]
    Decode(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Transport failures and server errors are worth another attempt;
    /// everything else is a definitive answer from the API.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport(_) => true,
            FetchError::HttpStatus(code) => *code >= 500,
            _ => false,
        }
    }
}

/// Failure of the durable checkpoint layer.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum CrawlError {
    /// The seed identity could not be resolved. Nothing has been mutated
    /// when this is raised, so the run aborts cleanly.
    #[error("seed identity could not be resolved: {0}")]
    SeedUnresolved(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, CrawlError>;
