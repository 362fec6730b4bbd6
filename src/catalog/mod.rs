//! Catalog entries and the persisted item table
//!
//! The listing crawl discovers catalog entries, the game extraction stage
//! writes them to the item table, and the review crawl reads that table
//! back. Entries are either primary (apps, crawled for reviews) or secondary
//! (bundles and packages, deliberately skipped).

mod table;

pub use table::{read_item_table, write_item_table};

use crate::ExtractError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Kind of a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemKind {
    /// A directly crawlable entry (`app` links)
    #[serde(rename = "app")]
    Primary,

    /// A grouping entry such as a bundle (`sub` links), skipped by the review crawl
    #[serde(rename = "sub")]
    Secondary,
}

impl ItemKind {
    /// Returns true if the review crawl should visit entries of this kind
    pub fn is_crawlable(&self) -> bool {
        matches!(self, Self::Primary)
    }

    /// Returns the path segment used in store links and output directories
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "app",
            Self::Secondary => "sub",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "app" => Ok(Self::Primary),
            "sub" => Ok(Self::Secondary),
            other => Err(ExtractError::UnknownKind(other.to_string())),
        }
    }
}

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub kind: ItemKind,
    pub id: String,
    pub title: String,
}

impl CatalogItem {
    pub fn new(kind: ItemKind, id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            title: title.into(),
        }
    }

    /// Directory name for this item's review pages, e.g. `app-10`
    pub fn dir_name(&self) -> String {
        format!("{}-{}", self.kind, self.id)
    }
}

/// Drops repeated `(kind, id)` pairs, keeping the first occurrence in order
pub fn dedupe_items(items: Vec<CatalogItem>) -> Vec<CatalogItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert((item.kind, item.id.clone())))
        .collect()
}
