//! Resumption tracking for per-item review streams
//!
//! An item is complete when its directory holds a done marker or an
//! archive; either one makes every later run skip the item without a single
//! request. Streams abandoned before their end leave a checkpoint in the
//! ledger instead, so the next run continues from the last good cursor.

use crate::storage::archive::archive_item;
use crate::storage::layout::OutputLayout;
use crate::storage::traits::{Ledger, StorageResult};
use crate::storage::Checkpoint;
use crate::HarvestError;
use std::path::Path;

pub struct ResumptionTracker<L: Ledger> {
    ledger: L,
    archive: bool,
}

impl<L: Ledger> ResumptionTracker<L> {
    /// Creates a tracker; with `archive` set, completion packs the item's pages
    pub fn new(ledger: L, archive: bool) -> Self {
        Self { ledger, archive }
    }

    /// Returns true if the item in `dir` must not be crawled again
    ///
    /// Both marker forms are honoured regardless of mode, so switching
    /// archiving on or off never re-crawls finished items.
    pub fn is_complete(&self, dir: &Path) -> bool {
        OutputLayout::done_marker_path(dir).exists() || OutputLayout::archive_path(dir).exists()
    }

    pub fn checkpoint(&self, stream_key: &str) -> StorageResult<Option<Checkpoint>> {
        self.ledger.load_checkpoint(stream_key)
    }

    /// Marks the item in `dir` complete and drops its checkpoint
    pub fn complete(&mut self, stream_key: &str, dir: &Path) -> Result<(), HarvestError> {
        std::fs::create_dir_all(dir)?;

        if self.archive {
            let summary = archive_item(dir)?;
            tracing::debug!("{}: {} pages archived", stream_key, summary.members);
        } else {
            std::fs::File::create(OutputLayout::done_marker_path(dir))?;
        }

        self.ledger.clear_checkpoint(stream_key)?;
        Ok(())
    }

    /// Records where an abandoned stream stopped
    pub fn suspend(&mut self, checkpoint: &Checkpoint) -> StorageResult<()> {
        self.ledger.save_checkpoint(checkpoint)
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    pub fn into_ledger(self) -> L {
        self.ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::layout::write_page;
    use crate::storage::SqliteLedger;
    use tempfile::tempdir;

    fn checkpoint(key: &str) -> Checkpoint {
        Checkpoint {
            stream_key: key.to_string(),
            cursor: "AoJ4".to_string(),
            page_index: 4,
            error_count: 10,
            last_error: None,
            updated_at: "2024-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_done_marker_mode() {
        let dir = tempdir().unwrap();
        let item_dir = dir.path().join("app-10");
        let mut tracker = ResumptionTracker::new(SqliteLedger::new_in_memory().unwrap(), false);

        assert!(!tracker.is_complete(&item_dir));
        tracker.suspend(&checkpoint("app-10")).unwrap();

        tracker.complete("app-10", &item_dir).unwrap();
        assert!(item_dir.join("reviews-done.txt").exists());
        assert!(tracker.is_complete(&item_dir));
        assert!(tracker.checkpoint("app-10").unwrap().is_none());
    }

    #[test]
    fn test_archive_mode() {
        let dir = tempdir().unwrap();
        let item_dir = dir.path().join("app-10");
        write_page(&OutputLayout::review_page_path(&item_dir, 1), b"{}").unwrap();

        let mut tracker = ResumptionTracker::new(SqliteLedger::new_in_memory().unwrap(), true);

        tracker.complete("app-10", &item_dir).unwrap();
        assert!(item_dir.join("reviews.zip").exists());
        assert!(!item_dir.join("reviews-1.html").exists());
        assert!(!item_dir.join("reviews-done.txt").exists());
        assert!(tracker.is_complete(&item_dir));
    }

    #[test]
    fn test_either_marker_counts_in_any_mode() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path()).unwrap();
        std::fs::write(dir.path().join("reviews-done.txt"), b"").unwrap();

        let tracker = ResumptionTracker::new(SqliteLedger::new_in_memory().unwrap(), true);
        assert!(tracker.is_complete(dir.path()));
    }
}
