//! Storage module for persisting crawl output and progress
//!
//! This module handles everything that outlives a process:
//! - The on-disk layout of raw listing and review pages
//! - Per-item archives of review pages
//! - Resumption markers and checkpoints for aborted streams
//! - The SQLite run ledger (runs, per-item outcomes, checkpoints)

mod archive;
mod layout;
mod resume;
mod schema;
mod sqlite;
mod traits;

pub use archive::{archive_item, read_archive, ArchiveError, ArchiveSummary};
pub use layout::{page_index_of, write_page, OutputLayout, ARCHIVE_FILE, DONE_MARKER_FILE};
pub use resume::ResumptionTracker;
pub use sqlite::SqliteLedger;
pub use traits::{Ledger, StorageError, StorageResult};

use crate::HarvestError;
use std::path::Path;

/// Opens (and creates if needed) the run ledger at `path`
pub fn open_ledger(path: &Path) -> Result<SqliteLedger, HarvestError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(SqliteLedger::new(path)?)
}

/// Which crawler a run belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Listing,
    Reviews,
}

impl RunKind {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Listing => "listing",
            Self::Reviews => "reviews",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "listing" => Some(Self::Listing),
            "reviews" => Some(Self::Reviews),
            _ => None,
        }
    }
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub kind: RunKind,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    /// Finished, but some items were aborted or the listing stalled
    Partial,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "partial" => Some(Self::Partial),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// How one item's review stream ended in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemOutcome {
    /// A terminal marker was reached
    Completed,
    /// The error budget ran out
    Aborted,
}

impl ItemOutcome {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(Self::Completed),
            "aborted" => Some(Self::Aborted),
            _ => None,
        }
    }
}

/// Where an aborted review stream stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    /// Item directory relative to the reviews root, e.g. `english/app-10`
    pub stream_key: String,

    /// Last cursor that was handed out by the remote
    pub cursor: String,

    /// Index the next persisted page will get
    pub page_index: u32,

    /// Errors seen before the stream was abandoned
    pub error_count: u32,

    pub last_error: Option<String>,

    pub updated_at: String,
}
