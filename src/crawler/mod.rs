//! Crawler module for the two paginated endpoints
//!
//! This module contains the crawling logic, including:
//! - HTTP fetching with bounded retry and a fixed pause
//! - Page interpretation (item links, review cursors, terminal markers)
//! - The integer-paginated catalog listing crawl
//! - The cursor-paginated per-item review crawl
//!
//! Everything runs strictly sequentially: one request is in flight at a time.

mod fetcher;
mod listing;
mod parser;
mod reviews;

pub use fetcher::{build_http_client, Fetcher};
pub use listing::{crawl_listing, ListingCrawler, ListingSummary};
pub use parser::{
    ListingParser, ReviewPage, ReviewPageParser, SteamListingParser, SteamReviewParser,
};
pub use reviews::{crawl_reviews, ItemDisposition, ReviewCrawler, ReviewSummary, StreamOutcome};
