//! On-disk layout of harvested pages
//!
//! ```text
//! <out>/pages/games/games-page-<n>.html
//! <out>/pages/reviews/[<language>/]<kind>-<id>/reviews-<n>.html
//! <out>/pages/reviews/[<language>/]<kind>-<id>/reviews.zip
//! <out>/pages/reviews/[<language>/]<kind>-<id>/reviews-done.txt
//! ```

use crate::catalog::CatalogItem;
use std::io;
use std::path::{Path, PathBuf};

pub const DONE_MARKER_FILE: &str = "reviews-done.txt";
pub const ARCHIVE_FILE: &str = "reviews.zip";
const REVIEW_PAGE_PREFIX: &str = "reviews-";
const PAGE_SUFFIX: &str = ".html";

/// Resolves every path the crawlers write to
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn games_dir(&self) -> PathBuf {
        self.root.join("pages").join("games")
    }

    pub fn games_page_path(&self, page: u32) -> PathBuf {
        self.games_dir().join(format!("games-page-{}{}", page, PAGE_SUFFIX))
    }

    pub fn reviews_root(&self) -> PathBuf {
        self.root.join("pages").join("reviews")
    }

    /// Key identifying an item's review stream, relative to the reviews root
    pub fn stream_key(item: &CatalogItem, language: Option<&str>) -> String {
        match language {
            Some(language) => format!("{}/{}", language, item.dir_name()),
            None => item.dir_name(),
        }
    }

    pub fn item_dir(&self, item: &CatalogItem, language: Option<&str>) -> PathBuf {
        let mut dir = self.reviews_root();
        if let Some(language) = language {
            dir.push(language);
        }
        dir.push(item.dir_name());
        dir
    }

    pub fn review_page_name(page: u32) -> String {
        format!("{}{}{}", REVIEW_PAGE_PREFIX, page, PAGE_SUFFIX)
    }

    pub fn review_page_path(dir: &Path, page: u32) -> PathBuf {
        dir.join(Self::review_page_name(page))
    }

    pub fn done_marker_path(dir: &Path) -> PathBuf {
        dir.join(DONE_MARKER_FILE)
    }

    pub fn archive_path(dir: &Path) -> PathBuf {
        dir.join(ARCHIVE_FILE)
    }

    /// Lists the loose review pages in `dir`, ordered by page index
    pub fn list_review_pages(dir: &Path) -> io::Result<Vec<(u32, PathBuf)>> {
        let mut pages = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if let Some(index) = name.to_str().and_then(page_index_of) {
                pages.push((index, entry.path()));
            }
        }
        pages.sort_by_key(|(index, _)| *index);
        Ok(pages)
    }
}

/// Parses the page index out of a `reviews-<n>.html` file name
pub fn page_index_of(file_name: &str) -> Option<u32> {
    file_name
        .strip_prefix(REVIEW_PAGE_PREFIX)?
        .strip_suffix(PAGE_SUFFIX)?
        .parse()
        .ok()
}

/// Writes a raw page, creating parent directories as needed
pub fn write_page(path: &Path, payload: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, payload)
}
