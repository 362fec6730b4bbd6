//! Item table extraction from saved listing pages

use crate::catalog::{write_item_table, CatalogItem, ItemKind};
use crate::crawler::{ListingParser, SteamListingParser};
use crate::extract::walk_files;
use crate::HarvestError;
use std::collections::HashMap;
use std::path::Path;

/// Catalog entries keyed by `(kind, id)`
///
/// An entry keeps the position of its first sighting and the title of its
/// last one.
#[derive(Debug, Default)]
pub struct GameTable {
    items: Vec<CatalogItem>,
    index: HashMap<(ItemKind, String), usize>,
}

impl GameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item: CatalogItem) {
        let key = (item.kind, item.id.clone());
        match self.index.get(&key) {
            Some(&position) => self.items[position].title = item.title,
            None => {
                self.index.insert(key, self.items.len());
                self.items.push(item);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<CatalogItem> {
        self.items
    }
}

/// Totals for one game extraction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameExtraction {
    pub pages: usize,
    pub skipped_pages: usize,
    pub items: usize,
}

/// Builds the item table at `output` from every listing page under `input`
///
/// Pages whose links and titles do not line up are logged and skipped.
pub fn extract_games(input: &Path, output: &Path) -> Result<GameExtraction, HarvestError> {
    let parser = SteamListingParser::new()?;
    let mut table = GameTable::new();
    let mut summary = GameExtraction::default();

    for path in walk_files(input)? {
        let page = std::fs::read(&path)?;
        match parser.items(&String::from_utf8_lossy(&page)) {
            Ok(items) => {
                tracing::debug!("{}: {} items", path.display(), items.len());
                summary.pages += 1;
                for item in items {
                    table.insert(item);
                }
            }
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                summary.skipped_pages += 1;
            }
        }
    }

    summary.items = table.len();
    write_item_table(output, &table.into_items())?;

    tracing::info!(
        "Extracted {} items from {} pages into {}",
        summary.items,
        summary.pages,
        output.display()
    );
    Ok(summary)
}
