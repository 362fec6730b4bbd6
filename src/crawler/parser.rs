//! Page interpretation for the two paginated endpoints
//!
//! The paginators only need two answers from a page: which catalog items a
//! listing page links to, and whether a review page ends its stream (and if
//! not, which cursor comes next). Both are behind small traits so the
//! pagination state machines never touch markup or JSON directly.

use crate::catalog::{CatalogItem, ItemKind};
use crate::ExtractError;
use regex::Regex;
use std::collections::HashSet;

/// Extracts catalog entries from a listing page
pub trait ListingParser {
    /// Distinct `(kind, id)` pairs linked from the page, in page order
    fn item_ids(&self, page: &str) -> Vec<(ItemKind, String)>;

    /// Entries with titles, paired positionally
    ///
    /// Fails with [`ExtractError::MisalignedListing`] when the page does not
    /// have exactly one title per item link.
    fn items(&self, page: &str) -> Result<Vec<CatalogItem>, ExtractError>;
}

/// What a review page says about its stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewPage {
    /// No further pages; this payload carries nothing to keep
    Terminal,

    /// More pages follow, starting at `cursor`
    Next { cursor: String },
}

/// Interprets the payload of one review page
pub trait ReviewPageParser {
    fn interpret(&self, payload: &str) -> Result<ReviewPage, ExtractError>;
}

/// Listing parser for the store search results markup
pub struct SteamListingParser {
    link_re: Regex,
    title_re: Regex,
}

impl SteamListingParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            link_re: Regex::new(r"/(app|sub)/([0-9]+)/")?,
            title_re: Regex::new(r#"<span class="title">(.*?)</span>"#)?,
        })
    }

    fn links<'a>(&'a self, page: &'a str) -> impl Iterator<Item = (ItemKind, &'a str)> + 'a {
        self.link_re.captures_iter(page).filter_map(|caps| {
            let kind = caps.get(1)?.as_str().parse().ok()?;
            Some((kind, caps.get(2)?.as_str()))
        })
    }
}

impl ListingParser for SteamListingParser {
    fn item_ids(&self, page: &str) -> Vec<(ItemKind, String)> {
        let mut seen = HashSet::new();
        self.links(page)
            .filter(|(kind, id)| seen.insert((*kind, *id)))
            .map(|(kind, id)| (kind, id.to_string()))
            .collect()
    }

    fn items(&self, page: &str) -> Result<Vec<CatalogItem>, ExtractError> {
        let links: Vec<(ItemKind, &str)> = self.links(page).collect();
        let titles: Vec<&str> = self
            .title_re
            .captures_iter(page)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect();

        if links.len() != titles.len() {
            return Err(ExtractError::MisalignedListing {
                ids: links.len(),
                titles: titles.len(),
            });
        }

        Ok(links
            .into_iter()
            .zip(titles)
            .map(|((kind, id), title)| CatalogItem::new(kind, id, title))
            .collect())
    }
}

/// Review page parser for the store's JSON review envelope
///
/// A page is terminal when it carries `"success":2` or the
/// `no_more_reviews` marker inside its HTML fragment.
pub struct SteamReviewParser {
    end_re: Regex,
}

impl SteamReviewParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            end_re: Regex::new(r#"(\{"success":2\})|(no_more_reviews)"#)?,
        })
    }
}

impl ReviewPageParser for SteamReviewParser {
    fn interpret(&self, payload: &str) -> Result<ReviewPage, ExtractError> {
        if self.end_re.is_match(payload) {
            return Ok(ReviewPage::Terminal);
        }

        let value: serde_json::Value = serde_json::from_str(payload)
            .map_err(|e| ExtractError::MalformedPayload(e.to_string()))?;

        if value.get("success").and_then(|s| s.as_i64()) == Some(2) {
            return Ok(ReviewPage::Terminal);
        }

        value
            .get("cursor")
            .and_then(|c| c.as_str())
            .map(|cursor| ReviewPage::Next {
                cursor: cursor.to_string(),
            })
            .ok_or_else(|| ExtractError::MalformedPayload("missing cursor field".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <a href="https://store.steampowered.com/app/10/CounterStrike/" class="search_result_row">
            <span class="title">Counter-Strike</span>
        </a>
        <a href="https://store.steampowered.com/sub/20/Bundle/" class="search_result_row">
            <span class="title">Bundle B</span>
        </a>
    "#;

    #[test]
    fn test_item_ids() {
        let parser = SteamListingParser::new().unwrap();
        let ids = parser.item_ids(LISTING);
        assert_eq!(
            ids,
            vec![
                (ItemKind::Primary, "10".to_string()),
                (ItemKind::Secondary, "20".to_string()),
            ]
        );
    }

    #[test]
    fn test_item_ids_are_distinct() {
        let parser = SteamListingParser::new().unwrap();
        let page = r#"<a href="/app/10/A/">x</a><a href="/app/10/A/">y</a>"#;
        assert_eq!(parser.item_ids(page).len(), 1);
        assert!(parser.item_ids("<html>no results</html>").is_empty());
    }

    #[test]
    fn test_items_pair_titles() {
        let parser = SteamListingParser::new().unwrap();
        let items = parser.items(LISTING).unwrap();
        assert_eq!(
            items,
            vec![
                CatalogItem::new(ItemKind::Primary, "10", "Counter-Strike"),
                CatalogItem::new(ItemKind::Secondary, "20", "Bundle B"),
            ]
        );
    }

    #[test]
    fn test_items_reject_misaligned_page() {
        let parser = SteamListingParser::new().unwrap();
        let page = r#"<a href="/app/10/A/"><span class="title">A</span></a><a href="/app/11/B/"></a>"#;
        assert!(matches!(
            parser.items(page),
            Err(ExtractError::MisalignedListing { ids: 2, titles: 1 })
        ));
    }

    #[test]
    fn test_review_page_with_cursor() {
        let parser = SteamReviewParser::new().unwrap();
        let page = r#"{"success":1,"html":"<div class=\"review_box\"></div>","cursor":"AoJ4+/x="}"#;
        assert_eq!(
            parser.interpret(page).unwrap(),
            ReviewPage::Next {
                cursor: "AoJ4+/x=".to_string()
            }
        );
    }

    #[test]
    fn test_review_terminal_markers() {
        let parser = SteamReviewParser::new().unwrap();

        assert_eq!(
            parser.interpret(r#"{"success":2}"#).unwrap(),
            ReviewPage::Terminal
        );
        assert_eq!(
            parser
                .interpret(r#"{"success":1,"html":"<div id=\"no_more_reviews\"></div>","cursor":"x"}"#)
                .unwrap(),
            ReviewPage::Terminal
        );
        assert_eq!(
            parser
                .interpret(r#"{ "success": 2, "html": "" }"#)
                .unwrap(),
            ReviewPage::Terminal
        );
    }

    #[test]
    fn test_review_malformed_payloads() {
        let parser = SteamReviewParser::new().unwrap();

        assert!(matches!(
            parser.interpret("<html>maintenance</html>"),
            Err(ExtractError::MalformedPayload(_))
        ));
        assert!(matches!(
            parser.interpret(r#"{"success":1,"html":""}"#),
            Err(ExtractError::MalformedPayload(_))
        ));
    }
}
