//! Steam-Harvest: a resumable catalog and review harvester
//!
//! This crate crawls a paginated store listing and, for every crawlable
//! catalog entry, the cursor-paginated review stream attached to it. Raw
//! responses are written to disk so the extraction stages can turn them into
//! tables later, and every run can be interrupted and re-invoked safely.

pub mod catalog;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Archive error: {0}")]
    Archive(#[from] storage::ArchiveError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Listing page {page} failed {failures} times in a row, giving up")]
    ListingStalled { page: u32, failures: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid title pattern: {0}")]
    InvalidPattern(String),
}

/// Failure of a single fetch, or of the whole bounded retry cycle
///
/// The fetcher never panics or propagates transport errors by other means;
/// every failure reaches the caller as one of these values.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection error for {url}: {message}")]
    Connection { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u16 },

    #[error("Giving up on {url} after {attempts} attempts (last error: {last})")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last: Box<FetchError>,
    },

    #[error("Malformed payload from {url}: {message}")]
    MalformedPayload { url: String, message: String },
}

/// Errors raised while pulling structured data out of raw pages
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Listing page has {ids} item links but {titles} titles")]
    MisalignedListing { ids: usize, titles: usize },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Unknown item kind: {0}")]
    UnknownKind(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),
}

/// Result type alias for fetch operations
pub type FetchResult = std::result::Result<Vec<u8>, FetchError>;

// Re-export commonly used types
pub use catalog::{CatalogItem, ItemKind};
pub use config::{CompletionPolicy, Config};
pub use state::{CursorStreamState, ListingPageState};
