use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LISTING_URL: &str =
    "https://store.steampowered.com/search/results?sort_by=_ASC&snr=1_7_7_230_7";
pub const DEFAULT_REVIEWS_URL: &str = "https://store.steampowered.com/appreviews";
pub const DEFAULT_REVIEW_LANGUAGE: &str = "english";

/// Main configuration structure
///
/// Built once (defaults, then an optional TOML file, then CLI overrides),
/// validated, and handed to every component by reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub output: OutputConfig,
    pub listing: ListingConfig,
    pub reviews: ReviewsConfig,
}

/// Settings shared by every fetch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Pause after every successful fetch, in seconds
    pub pause_secs: f64,

    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 180,
            pause_secs: 0.5,
            user_agent: format!("steam-harvest/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn pause(&self) -> Duration {
        Duration::from_secs_f64(self.pause_secs)
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Root directory for raw pages, tables and the ledger
    pub root: PathBuf,

    /// File name of the SQLite run ledger, relative to `root`
    pub ledger_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
            ledger_file: "harvest.db".to_string(),
        }
    }
}

/// Catalog listing crawl settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ListingConfig {
    /// Listing endpoint, without the page parameter
    pub url: String,

    /// Name of the integer page query parameter
    pub page_param: String,

    /// Index of the first listing page
    pub first_page: u32,

    /// Fetch attempts per request, and empty observations tolerated per page
    pub max_retries: u32,

    /// Delay before re-fetching a page that came back empty, in seconds
    pub empty_page_delay_secs: f64,

    /// Multiple of the pause slept after an exhausted fetch
    pub failure_backoff_factor: f64,

    /// Exhausted fetches of one page in a row before the listing is abandoned
    pub max_page_failures: u32,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_LISTING_URL.to_string(),
            page_param: "page".to_string(),
            first_page: 0,
            max_retries: 5,
            empty_page_delay_secs: 5.0,
            failure_backoff_factor: 10.0,
            max_page_failures: 20,
        }
    }
}

impl ListingConfig {
    pub fn empty_page_delay(&self) -> Duration {
        Duration::from_secs_f64(self.empty_page_delay_secs)
    }
}

/// What a review stream exit counts as for resumption purposes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionPolicy {
    /// Only a terminal marker completes an item; aborted streams are checkpointed
    #[default]
    TerminalOnly,

    /// Any loop exit completes the item, including an error-budget abort
    AnyExit,
}

/// Per-item review crawl settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ReviewsConfig {
    /// Review endpoint; the item id is appended as a path segment
    pub url: String,

    /// Item table to iterate; defaults to `<out>/games.csv`
    pub item_table: Option<PathBuf>,

    /// Value of the `filter` query parameter
    pub filter: String,

    /// Review language; also nests item directories under `<language>/`
    pub language: Option<String>,

    /// Only crawl items whose title matches this regular expression
    pub title_filter: Option<String>,

    /// Fetch attempts per request
    pub max_retries: u32,

    /// Failed fetches tolerated per item before the stream is aborted
    pub max_errors: u32,

    /// Multiple of the pause slept after a failed fetch
    pub error_backoff_factor: f64,

    /// Bundle finished items into `reviews.zip`
    pub archive: bool,

    pub completion: CompletionPolicy,

    /// Accepted for compatibility; no cap is applied
    pub max_reviews: Option<u32>,

    /// Accepted for compatibility; has no effect
    pub force: bool,
}

impl Default for ReviewsConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REVIEWS_URL.to_string(),
            item_table: None,
            filter: "recent".to_string(),
            language: None,
            title_filter: None,
            max_retries: 3,
            max_errors: 10,
            error_backoff_factor: 3.0,
            archive: false,
            completion: CompletionPolicy::TerminalOnly,
            max_reviews: None,
            force: false,
        }
    }
}

impl ReviewsConfig {
    /// Language sent in the review request
    pub fn request_language(&self) -> &str {
        self.language.as_deref().unwrap_or(DEFAULT_REVIEW_LANGUAGE)
    }
}

impl Config {
    /// Path of the item table the review crawl reads
    pub fn item_table_path(&self) -> PathBuf {
        self.reviews
            .item_table
            .clone()
            .unwrap_or_else(|| self.output.root.join("games.csv"))
    }

    /// Path of the SQLite run ledger
    pub fn ledger_path(&self) -> PathBuf {
        self.output.root.join(&self.output.ledger_file)
    }
}
