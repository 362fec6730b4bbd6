//! Per-item archives of raw review pages
//!
//! Once an item's stream is finished its loose `reviews-<n>.html` files are
//! packed into a single `reviews.zip` next to them and then removed. Member
//! names are the original file names.

use crate::storage::layout::{OutputLayout, ARCHIVE_FILE};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Errors that can occur while building or reading an archive
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// What went into an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    pub members: usize,
    pub bytes: u64,
}

/// Packs every loose review page in `dir` into `reviews.zip`
///
/// Pages are added in page order. The archive is written under a temporary
/// name and renamed into place before any loose file is deleted, so an
/// existing `reviews.zip` is always complete.
pub fn archive_item(dir: &Path) -> Result<ArchiveSummary, ArchiveError> {
    fs::create_dir_all(dir)?;
    let pages = OutputLayout::list_review_pages(dir)?;

    let final_path = OutputLayout::archive_path(dir);
    let partial_path = dir.join(format!("{}.partial", ARCHIVE_FILE));

    let mut writer = ZipWriter::new(File::create(&partial_path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut bytes = 0u64;
    for (index, path) in &pages {
        let payload = fs::read(path)?;
        writer.start_file(OutputLayout::review_page_name(*index), options)?;
        writer.write_all(&payload)?;
        bytes += payload.len() as u64;
    }
    writer.finish()?;

    fs::rename(&partial_path, &final_path)?;

    for (_, path) in &pages {
        fs::remove_file(path)?;
    }

    tracing::debug!(
        "Archived {} pages ({} bytes) into {}",
        pages.len(),
        bytes,
        final_path.display()
    );

    Ok(ArchiveSummary {
        path: final_path,
        members: pages.len(),
        bytes,
    })
}

/// Reads every member of an archive as `(name, payload)` pairs
pub fn read_archive(path: &Path) -> Result<Vec<(String, Vec<u8>)>, ArchiveError> {
    let mut archive = ZipArchive::new(File::open(path)?)?;

    let mut members = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();
        let mut payload = Vec::new();
        entry.read_to_end(&mut payload)?;
        members.push((name, payload));
    }

    Ok(members)
}
