//! Extraction stages
//!
//! These turn the raw pages written by the crawlers into tables:
//! - Listing pages into the item table (`kind,id,title`)
//! - Review pages (loose or archived) into the review table
//!
//! Both stages run offline and never touch the network.

mod games;
mod reviews;

pub use games::{extract_games, GameExtraction, GameTable};
pub use reviews::{extract_reviews, item_id_of, ReviewExtraction, ReviewExtractor, ReviewRecord};

use crate::HarvestError;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Lists every regular file under `root` in file name order
///
/// A `root` that is itself a file yields just that file.
pub fn walk_files(root: &Path) -> Result<Vec<PathBuf>, HarvestError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Opens a CSV writer at `path` without a header row, creating parent directories
pub(crate) fn table_writer(path: &Path) -> Result<csv::Writer<std::fs::File>, HarvestError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?)
}
