//! Item table persistence
//!
//! The item table is a header-less CSV of `kind,id,title` rows.

use crate::catalog::{dedupe_items, CatalogItem};
use crate::HarvestError;
use std::path::Path;

/// Reads the item table, skipping unreadable rows and repeated entries
///
/// Rows that do not parse (wrong column count, unknown kind) are logged and
/// skipped rather than aborting the whole crawl.
pub fn read_item_table(path: &Path) -> Result<Vec<CatalogItem>, HarvestError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut items = Vec::new();
    for (line, record) in reader.deserialize::<CatalogItem>().enumerate() {
        match record {
            Ok(item) => items.push(item),
            Err(e) => {
                tracing::warn!("Skipping row {} of {}: {}", line + 1, path.display(), e);
            }
        }
    }

    let total = items.len();
    let items = dedupe_items(items);
    if items.len() < total {
        tracing::debug!("Dropped {} duplicate items", total - items.len());
    }

    Ok(items)
}

/// Writes the item table, replacing any existing file
pub fn write_item_table(path: &Path, items: &[CatalogItem]) -> Result<(), HarvestError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    for item in items {
        writer.serialize(item)?;
    }
    writer.flush()?;
    Ok(())
}
