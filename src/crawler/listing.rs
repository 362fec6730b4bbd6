//! Catalog listing crawl
//!
//! Walks the integer-paginated listing from the first page, saving every page
//! that carries at least one item link under `pages/games/`. An empty
//! page is re-fetched a bounded number of times before the listing is
//! considered exhausted; empty pages are never written.

use crate::config::{compute_config_hash, Config};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::parser::{ListingParser, SteamListingParser};
use crate::state::{ListingPageState, ListingPhase};
use crate::storage::{open_ledger, write_page, Ledger, OutputLayout, RunKind, RunStatus};
use crate::HarvestError;
use url::Url;

/// Totals for one listing crawl
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingSummary {
    /// Pages written to disk
    pub pages_saved: u32,

    /// Item links seen across the saved pages
    pub items_seen: usize,

    /// Page index the crawl stopped on
    pub last_page: u32,
}

/// Listing paginator
pub struct ListingCrawler<'a, P: ListingParser> {
    config: &'a Config,
    fetcher: Fetcher,
    parser: P,
    layout: OutputLayout,
}

impl<'a, P: ListingParser> ListingCrawler<'a, P> {
    pub fn new(config: &'a Config, fetcher: Fetcher, parser: P) -> Self {
        Self {
            config,
            fetcher,
            parser,
            layout: OutputLayout::new(&config.output.root),
        }
    }

    /// URL of listing page `page`
    pub fn page_url(&self, page: u32) -> Result<Url, HarvestError> {
        let mut url = Url::parse(&self.config.listing.url)?;
        url.query_pairs_mut()
            .append_pair(&self.config.listing.page_param, &page.to_string());
        Ok(url)
    }

    /// Crawls the listing until it is exhausted
    ///
    /// # Returns
    ///
    /// * `Ok(ListingSummary)` - The listing ended on empty pages
    /// * `Err(HarvestError::ListingStalled)` - One page could not be fetched
    ///   `max-page-failures` times in a row; pages saved so far stay on disk
    pub async fn run(&self) -> Result<ListingSummary, HarvestError> {
        let listing = &self.config.listing;
        std::fs::create_dir_all(self.layout.games_dir())?;

        let mut state = ListingPageState::new(listing.first_page);
        let mut phase = ListingPhase::Fetching(listing.first_page);
        let mut summary = ListingSummary::default();

        while let Some(page) = phase.page() {
            let url = self.page_url(page)?;
            tracing::debug!("Listing {}: {}", phase, url);

            phase = match self.fetcher.fetch(&url).await {
                Ok(body) => {
                    let ids = self.parser.item_ids(&String::from_utf8_lossy(&body));
                    if ids.is_empty() {
                        let next = state.on_empty(listing.max_retries);
                        if !next.is_terminal() {
                            tracing::warn!(
                                "Listing page {} is empty ({}/{}), trying again",
                                page,
                                state.consecutive_empty,
                                listing.max_retries
                            );
                            tokio::time::sleep(listing.empty_page_delay()).await;
                        }
                        next
                    } else {
                        write_page(&self.layout.games_page_path(page), &body)?;
                        summary.pages_saved += 1;
                        summary.items_seen += ids.len();
                        tracing::info!("Listing page {}: {} items", page, ids.len());
                        state.on_items()
                    }
                }
                Err(e) => {
                    tracing::error!("Listing page {} failed: {}", page, e);
                    let next = state.on_failure(listing.max_page_failures);
                    if !next.is_terminal() {
                        let backoff = self.fetcher.pause().mul_f64(listing.failure_backoff_factor);
                        tokio::time::sleep(backoff).await;
                    }
                    next
                }
            };
        }

        summary.last_page = state.page_index;

        if let ListingPhase::Stalled(page) = phase {
            tracing::error!(
                "Listing stalled at page {} after saving {} pages",
                page,
                summary.pages_saved
            );
            return Err(HarvestError::ListingStalled {
                page,
                failures: state.consecutive_failures,
            });
        }

        tracing::info!(
            "Listing exhausted at page {}: {} pages, {} items",
            summary.last_page,
            summary.pages_saved,
            summary.items_seen
        );
        Ok(summary)
    }
}

/// Runs a complete listing crawl with ledger bookkeeping
///
/// The run is recorded as completed, as partial when the listing stalled, or
/// as failed for any other error.
pub async fn crawl_listing(config: &Config) -> Result<ListingSummary, HarvestError> {
    let mut ledger = open_ledger(&config.ledger_path())?;
    let run_id = ledger.create_run(RunKind::Listing, &compute_config_hash(config)?)?;
    tracing::info!("Starting listing run {}", run_id);

    let result = run_listing(config).await;

    let status = match &result {
        Ok(_) => RunStatus::Completed,
        Err(HarvestError::ListingStalled { .. }) => RunStatus::Partial,
        Err(_) => RunStatus::Failed,
    };
    ledger.finish_run(run_id, status)?;

    result
}

async fn run_listing(config: &Config) -> Result<ListingSummary, HarvestError> {
    let fetcher = Fetcher::from_config(&config.http, config.listing.max_retries)?;
    let crawler = ListingCrawler::new(config, fetcher, SteamListingParser::new()?);
    crawler.run().await
}
