//! Review table extraction from saved review pages
//!
//! Each saved page is the JSON envelope returned by the review endpoint. Its
//! `html` field holds a fragment with one `div.review_box` per review, from
//! which the fields below are read. Missing fields fall back to zero (or
//! `__anon__` for the user name) rather than dropping the review.

use crate::extract::{table_writer, walk_files};
use crate::storage::{page_index_of, read_archive, ARCHIVE_FILE};
use crate::{ExtractError, HarvestError};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::path::Path;

const ANONYMOUS_USER: &str = "__anon__";

/// One review, as written to the review table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub item_id: String,
    pub helpful: u64,
    pub funny: u64,
    pub username: String,
    pub owned_games: u64,
    pub num_reviews: u64,
    /// +1 recommended, -1 not recommended, 0 unknown
    pub recommended: i8,
    pub hours: f64,
    pub posted: String,
    pub content: String,
}

/// Returns the item id of an item directory named `app-<id>`
pub fn item_id_of(dir: &Path) -> Option<String> {
    let name = dir.file_name()?.to_str()?;
    let id = name.strip_prefix("app-")?;
    if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
        Some(id.to_string())
    } else {
        None
    }
}

struct ReviewSelectors {
    review_box: Selector,
    vote_info: Selector,
    persona_name: Selector,
    owned_games: Selector,
    num_reviews: Selector,
    verdict: Selector,
    hours: Selector,
    posted: Selector,
    content: Selector,
}

impl ReviewSelectors {
    fn new() -> Result<Self, ExtractError> {
        let parse = |css: &str| {
            Selector::parse(css).map_err(|e| ExtractError::InvalidSelector(format!("{}: {}", css, e)))
        };
        Ok(Self {
            review_box: parse("div.review_box")?,
            vote_info: parse("div.vote_info")?,
            persona_name: parse("div.persona_name")?,
            owned_games: parse("div.num_owned_games")?,
            num_reviews: parse("div.num_reviews")?,
            verdict: parse("div.title.ellipsis")?,
            hours: parse("div.hours.ellipsis")?,
            posted: parse("div.postedDate")?,
            content: parse("div.content")?,
        })
    }
}

struct ReviewPatterns {
    helpful: Regex,
    funny: Regex,
    owned: Regex,
    reviews: Regex,
    hours: Regex,
    posted: Regex,
    year: Regex,
    user: Regex,
}

impl ReviewPatterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            helpful: Regex::new(r"([0-9,]+) [a-z]+? found this review helpful")?,
            funny: Regex::new(r"([0-9,]+) [a-z]+? found this review funny")?,
            owned: Regex::new(r"([0-9,]+) product")?,
            reviews: Regex::new(r"([0-9,]+) review")?,
            hours: Regex::new(r"([0-9.,]+) hrs on record")?,
            posted: Regex::new(r"Posted: (.+)")?,
            year: Regex::new(r".* [0-9]{4}$")?,
            user: Regex::new(r"/(profiles|id)/(.+?)/")?,
        })
    }
}

/// Parses review pages into [`ReviewRecord`]s
pub struct ReviewExtractor {
    selectors: ReviewSelectors,
    patterns: ReviewPatterns,
    current_year: i32,
}

impl ReviewExtractor {
    /// Creates an extractor; `current_year` completes posted dates without a year
    pub fn new(current_year: i32) -> Result<Self, HarvestError> {
        Ok(Self {
            selectors: ReviewSelectors::new()?,
            patterns: ReviewPatterns::new()?,
            current_year,
        })
    }

    /// Extracts every review of one saved page
    pub fn parse_payload(
        &self,
        item_id: &str,
        payload: &[u8],
    ) -> Result<Vec<ReviewRecord>, ExtractError> {
        let envelope: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| ExtractError::MalformedPayload(e.to_string()))?;
        let html = envelope
            .get("html")
            .and_then(|h| h.as_str())
            .ok_or_else(|| ExtractError::MalformedPayload("missing html field".to_string()))?;

        let fragment = Html::parse_fragment(html);
        Ok(fragment
            .select(&self.selectors.review_box)
            .map(|review| self.parse_review(item_id, review))
            .collect())
    }

    fn parse_review(&self, item_id: &str, review: ElementRef<'_>) -> ReviewRecord {
        let s = &self.selectors;
        let p = &self.patterns;

        let votes = text_of(review, &s.vote_info).unwrap_or_default();

        let username = review
            .select(&s.persona_name)
            .next()
            .and_then(|e| {
                p.user
                    .captures(&e.inner_html())
                    .and_then(|c| c.get(2).map(|m| m.as_str().to_string()))
            })
            .unwrap_or_else(|| ANONYMOUS_USER.to_string());

        let recommended = match text_of(review, &s.verdict) {
            Some(verdict) if verdict.trim() == "Recommended" => 1,
            Some(_) => -1,
            None => 0,
        };

        let posted = text_of(review, &s.posted)
            .and_then(|t| capture(&p.posted, &t))
            .map(|date| {
                let date = date.trim().to_string();
                if p.year.is_match(&date) {
                    date
                } else {
                    format!("{}, {}", date, self.current_year)
                }
            })
            .unwrap_or_default();

        ReviewRecord {
            item_id: item_id.to_string(),
            helpful: count(&p.helpful, &votes),
            funny: count(&p.funny, &votes),
            username,
            owned_games: text_of(review, &s.owned_games)
                .map(|t| count(&p.owned, &t))
                .unwrap_or(0),
            num_reviews: text_of(review, &s.num_reviews)
                .map(|t| count(&p.reviews, &t))
                .unwrap_or(0),
            recommended,
            hours: text_of(review, &s.hours)
                .and_then(|t| capture(&p.hours, &t))
                .and_then(|h| h.replace(',', "").parse().ok())
                .unwrap_or(0.0),
            posted,
            content: text_of(review, &s.content)
                .map(|t| t.trim().to_string())
                .unwrap_or_default(),
        }
    }
}

fn text_of(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(|e| e.text().collect::<String>())
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn count(re: &Regex, text: &str) -> u64 {
    capture(re, text)
        .and_then(|n| n.replace(',', "").parse().ok())
        .unwrap_or(0)
}

/// Totals for one review extraction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewExtraction {
    pub items: usize,
    pub pages: usize,
    pub malformed_pages: usize,
    pub reviews: usize,
}

/// Builds the review table at `output` from the reviews tree under `input`
///
/// Only directories named `app-<id>` are read; inside them both loose
/// `reviews-<n>.html` pages and `reviews.zip` members are parsed.
pub fn extract_reviews(
    input: &Path,
    output: &Path,
    current_year: i32,
) -> Result<ReviewExtraction, HarvestError> {
    let extractor = ReviewExtractor::new(current_year)?;
    let mut writer = table_writer(output)?;
    let mut summary = ReviewExtraction::default();
    let mut last_dir = None;

    for path in walk_files(input)? {
        let Some(dir) = path.parent() else { continue };
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        let is_page = page_index_of(file_name).is_some();
        let is_archive = file_name == ARCHIVE_FILE;
        if !is_page && !is_archive {
            continue;
        }

        let Some(item_id) = item_id_of(dir) else {
            tracing::warn!("Skipping {}: not an item directory", path.display());
            continue;
        };

        if last_dir.as_deref() != Some(dir) {
            summary.items += 1;
            last_dir = Some(dir.to_path_buf());
        }

        let payloads: Vec<(String, Vec<u8>)> = if is_archive {
            let members = match read_archive(&path) {
                Ok(members) => members,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    summary.malformed_pages += 1;
                    continue;
                }
            };
            members
                .into_iter()
                .filter(|(name, _)| page_index_of(name).is_some())
                .map(|(name, payload)| (format!("{}:{}", path.display(), name), payload))
                .collect()
        } else {
            vec![(path.display().to_string(), std::fs::read(&path)?)]
        };

        for (source, payload) in payloads {
            match extractor.parse_payload(&item_id, &payload) {
                Ok(records) => {
                    summary.pages += 1;
                    summary.reviews += records.len();
                    for record in &records {
                        writer.serialize(record)?;
                    }
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", source, e);
                    summary.malformed_pages += 1;
                }
            }
        }
    }

    writer.flush()?;
    tracing::info!(
        "Extracted {} reviews of {} items into {}",
        summary.reviews,
        summary.items,
        output.display()
    );
    Ok(summary)
}
