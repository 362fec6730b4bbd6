//! Per-item review crawl
//!
//! Every crawlable item in the item table gets its own cursor-paginated
//! review stream. Streams are independent: each starts from the wildcard
//! cursor (or from its checkpoint) with a fresh error budget, and ends either
//! on a terminal page or when that budget runs out. Items already marked
//! complete on disk are skipped without a request.

use crate::catalog::{read_item_table, CatalogItem};
use crate::config::{compute_config_hash, CompletionPolicy, Config};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::parser::{ReviewPage, ReviewPageParser, SteamReviewParser};
use crate::state::{CursorStreamState, StreamPhase};
use crate::storage::{
    open_ledger, write_page, Checkpoint, ItemOutcome, Ledger, OutputLayout, ResumptionTracker,
    RunKind, RunStatus,
};
use crate::{ConfigError, FetchError, HarvestError};
use regex::Regex;
use std::path::Path;
use url::Url;

/// How one review stream ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The remote signalled the end of the stream
    Terminal { pages: u32 },

    /// The error budget ran out
    Aborted {
        pages: u32,
        cursor: String,
        page_index: u32,
        error_count: u32,
        last_error: Option<String>,
    },
}

impl StreamOutcome {
    pub fn pages(&self) -> u32 {
        match self {
            Self::Terminal { pages } | Self::Aborted { pages, .. } => *pages,
        }
    }
}

/// What the crawl did with one item of the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemDisposition {
    /// Not a crawlable kind
    SkippedSecondary,

    /// Title did not match the configured filter
    SkippedFiltered,

    /// Already marked complete on disk
    SkippedComplete,

    Crawled(StreamOutcome),
}

/// Totals for one review crawl
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewSummary {
    pub items: usize,
    pub completed: usize,
    pub aborted: usize,
    pub resumed: usize,
    pub skipped_secondary: usize,
    pub skipped_filtered: usize,
    pub skipped_complete: usize,
    pub pages: u64,
}

impl ReviewSummary {
    /// Returns true if any stream was abandoned before its end
    pub fn is_partial(&self) -> bool {
        self.aborted > 0
    }

    fn record(&mut self, disposition: &ItemDisposition) {
        self.items += 1;
        match disposition {
            ItemDisposition::SkippedSecondary => self.skipped_secondary += 1,
            ItemDisposition::SkippedFiltered => self.skipped_filtered += 1,
            ItemDisposition::SkippedComplete => self.skipped_complete += 1,
            ItemDisposition::Crawled(outcome) => {
                self.pages += u64::from(outcome.pages());
                match outcome {
                    StreamOutcome::Terminal { .. } => self.completed += 1,
                    StreamOutcome::Aborted { .. } => self.aborted += 1,
                }
            }
        }
    }
}

/// Review stream paginator for a sequence of catalog items
pub struct ReviewCrawler<'a, P: ReviewPageParser, L: Ledger> {
    config: &'a Config,
    fetcher: Fetcher,
    parser: P,
    layout: OutputLayout,
    tracker: ResumptionTracker<L>,
    title_filter: Option<Regex>,
    run_id: i64,
}

impl<'a, P: ReviewPageParser, L: Ledger> ReviewCrawler<'a, P, L> {
    /// Creates a crawler recording outcomes under `run_id` in `ledger`
    pub fn new(
        config: &'a Config,
        fetcher: Fetcher,
        parser: P,
        ledger: L,
        run_id: i64,
    ) -> Result<Self, HarvestError> {
        let title_filter = config
            .reviews
            .title_filter
            .as_deref()
            .map(Regex::new)
            .transpose()?;

        Ok(Self {
            config,
            fetcher,
            parser,
            layout: OutputLayout::new(&config.output.root),
            tracker: ResumptionTracker::new(ledger, config.reviews.archive),
            title_filter,
            run_id,
        })
    }

    /// Hands the ledger back once the crawl is over
    pub fn into_ledger(self) -> L {
        self.tracker.into_ledger()
    }

    /// URL of the review page for item `id` at `cursor`
    pub fn review_url(&self, id: &str, cursor: &str) -> Result<Url, HarvestError> {
        let reviews = &self.config.reviews;
        let mut url = Url::parse(&reviews.url)?;
        url.path_segments_mut()
            .map_err(|_| ConfigError::InvalidUrl(reviews.url.clone()))?
            .pop_if_empty()
            .push(id);
        url.query_pairs_mut()
            .append_pair("json", "1")
            .append_pair("cursor", cursor)
            .append_pair("filter", &reviews.filter)
            .append_pair("language", reviews.request_language());
        Ok(url)
    }

    /// Crawls every item in order
    pub async fn run(&mut self, items: &[CatalogItem]) -> Result<ReviewSummary, HarvestError> {
        if let Some(cap) = self.config.reviews.max_reviews {
            tracing::warn!("max-reviews = {} is accepted but not enforced", cap);
        }
        if self.config.reviews.force {
            tracing::debug!("force is set but has no effect on the review crawl");
        }

        let mut summary = ReviewSummary::default();
        for (n, item) in items.iter().enumerate() {
            let disposition = self.crawl_item(item, &mut summary).await?;
            summary.record(&disposition);

            if (n + 1) % 100 == 0 {
                tracing::info!(
                    "Progress: {}/{} items ({} completed, {} aborted)",
                    n + 1,
                    items.len(),
                    summary.completed,
                    summary.aborted
                );
            }
        }

        Ok(summary)
    }

    /// Crawls (or skips) a single item
    pub async fn crawl_item(
        &mut self,
        item: &CatalogItem,
        summary: &mut ReviewSummary,
    ) -> Result<ItemDisposition, HarvestError> {
        if !item.kind.is_crawlable() {
            tracing::info!("Skipping {} {} ({})", item.kind, item.id, item.title);
            return Ok(ItemDisposition::SkippedSecondary);
        }

        if let Some(filter) = &self.title_filter {
            if !filter.is_match(&item.title) {
                tracing::debug!("Skipping {} ({}): title filtered", item.id, item.title);
                return Ok(ItemDisposition::SkippedFiltered);
            }
        }

        let language = self.config.reviews.language.as_deref();
        let dir = self.layout.item_dir(item, language);
        let key = OutputLayout::stream_key(item, language);

        if self.tracker.is_complete(&dir) {
            tracing::debug!("Skipping {}: already complete", key);
            return Ok(ItemDisposition::SkippedComplete);
        }

        std::fs::create_dir_all(&dir)?;

        let state = match self.tracker.checkpoint(&key)? {
            Some(checkpoint) => {
                tracing::info!(
                    "Resuming {} ({}) at page {}",
                    key,
                    item.title,
                    checkpoint.page_index
                );
                summary.resumed += 1;
                CursorStreamState::resume(checkpoint.cursor, checkpoint.page_index)
            }
            None => {
                tracing::info!("Crawling reviews for {} ({})", key, item.title);
                CursorStreamState::seed()
            }
        };

        let outcome = self.stream(&item.id, &dir, state).await?;
        self.finish_stream(&key, &dir, &outcome)?;

        Ok(ItemDisposition::Crawled(outcome))
    }

    /// Follows the cursor chain until a terminal page or the error budget
    async fn stream(
        &self,
        id: &str,
        dir: &Path,
        mut state: CursorStreamState,
    ) -> Result<StreamOutcome, HarvestError> {
        let reviews = &self.config.reviews;
        let mut pages = 0;

        loop {
            let url = self.review_url(id, state.cursor())?;
            tracing::debug!("{} page {}: {}", id, state.page_index(), url);

            let result = match self.fetcher.fetch(&url).await {
                Ok(body) => self.interpret(&url, body),
                Err(e) => Err(e),
            };

            match result {
                Ok((_, ReviewPage::Terminal)) => {
                    tracing::info!("{}: end of reviews after {} pages", id, pages);
                    return Ok(StreamOutcome::Terminal { pages });
                }
                Ok((body, ReviewPage::Next { cursor })) => {
                    write_page(&OutputLayout::review_page_path(dir, state.page_index()), &body)?;
                    pages += 1;

                    if state.on_page(cursor) == StreamPhase::Terminal {
                        tracing::info!("{}: cursor repeated after {} pages", id, pages);
                        return Ok(StreamOutcome::Terminal { pages });
                    }
                }
                Err(e) => {
                    tracing::error!("Error downloading {}: {}", url, e);

                    if state.on_error(reviews.max_errors) == StreamPhase::Aborted {
                        tracing::error!(
                            "{}: giving up after {} errors at page {}",
                            id,
                            state.error_count(),
                            state.page_index()
                        );
                        return Ok(StreamOutcome::Aborted {
                            pages,
                            cursor: state.cursor().to_string(),
                            page_index: state.page_index(),
                            error_count: state.error_count(),
                            last_error: Some(e.to_string()),
                        });
                    }

                    let backoff = self.fetcher.pause().mul_f64(reviews.error_backoff_factor);
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// Decides what a fetched body means for the stream
    ///
    /// A body that cannot be interpreted is counted like a failed fetch and
    /// is never written to disk.
    fn interpret(&self, url: &Url, body: Vec<u8>) -> Result<(Vec<u8>, ReviewPage), FetchError> {
        let page = self
            .parser
            .interpret(&String::from_utf8_lossy(&body))
            .map_err(|e| FetchError::MalformedPayload {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok((body, page))
    }

    /// Applies the completion policy to a finished stream
    fn finish_stream(
        &mut self,
        key: &str,
        dir: &Path,
        outcome: &StreamOutcome,
    ) -> Result<(), HarvestError> {
        match outcome {
            StreamOutcome::Terminal { pages } => {
                self.tracker.complete(key, dir)?;
                self.tracker.ledger_mut().record_outcome(
                    self.run_id,
                    key,
                    ItemOutcome::Completed,
                    *pages,
                )?;
            }
            StreamOutcome::Aborted {
                pages,
                cursor,
                page_index,
                error_count,
                last_error,
            } => {
                self.tracker.ledger_mut().record_outcome(
                    self.run_id,
                    key,
                    ItemOutcome::Aborted,
                    *pages,
                )?;

                match self.config.reviews.completion {
                    CompletionPolicy::AnyExit => {
                        tracing::warn!("{}: aborted, but marked complete anyway", key);
                        self.tracker.complete(key, dir)?;
                    }
                    CompletionPolicy::TerminalOnly => {
                        self.tracker.suspend(&Checkpoint {
                            stream_key: key.to_string(),
                            cursor: cursor.clone(),
                            page_index: *page_index,
                            error_count: *error_count,
                            last_error: last_error.clone(),
                            updated_at: chrono::Utc::now().to_rfc3339(),
                        })?;
                        tracing::warn!("{}: aborted, will resume at page {}", key, page_index);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Runs a complete review crawl with ledger bookkeeping
///
/// Reads the item table, crawls every item, and records the run as
/// completed, partial (some stream aborted) or failed.
pub async fn crawl_reviews(config: &Config) -> Result<ReviewSummary, HarvestError> {
    let items = read_item_table(&config.item_table_path())?;
    tracing::info!(
        "Loaded {} items from {}",
        items.len(),
        config.item_table_path().display()
    );

    let parser = SteamReviewParser::new()?;

    let mut ledger = open_ledger(&config.ledger_path())?;
    let run_id = ledger.create_run(RunKind::Reviews, &compute_config_hash(config)?)?;
    tracing::info!("Starting review run {}", run_id);

    let fetcher = match Fetcher::from_config(&config.http, config.reviews.max_retries) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            ledger.finish_run(run_id, RunStatus::Failed)?;
            return Err(e.into());
        }
    };

    let mut crawler = ReviewCrawler::new(config, fetcher, parser, ledger, run_id)?;
    let result = crawler.run(&items).await;
    let mut ledger = crawler.into_ledger();

    let status = match &result {
        Ok(summary) if summary.is_partial() => RunStatus::Partial,
        Ok(_) => RunStatus::Completed,
        Err(_) => RunStatus::Failed,
    };
    ledger.finish_run(run_id, status)?;

    if let Ok(summary) = &result {
        tracing::info!(
            "Review run {} finished: {} completed, {} aborted, {} skipped, {} pages",
            run_id,
            summary.completed,
            summary.aborted,
            summary.skipped_secondary + summary.skipped_filtered + summary.skipped_complete,
            summary.pages
        );
    }

    result
}
