//! Ledger trait and error types
//!
//! This module defines the trait interface for the run ledger and its
//! associated error types.

use crate::storage::{Checkpoint, ItemOutcome, RunKind, RunRecord, RunStatus};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during ledger operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for ledger operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for run ledger backends
///
/// The ledger records every run, the outcome of every review stream the run
/// attempted, and a checkpoint for each stream that was abandoned before the
/// remote signalled its end.
pub trait Ledger {
    // ===== Run Management =====

    /// Creates a new run and returns its ID
    fn create_run(&mut self, kind: RunKind, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run of a kind
    fn get_latest_run(&self, kind: RunKind) -> StorageResult<Option<RunRecord>>;

    /// Lists the most recent runs, newest first
    fn list_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;

    /// Marks a run as finished with the given status
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Item Outcomes =====

    /// Records how a review stream ended in a run
    fn record_outcome(
        &mut self,
        run_id: i64,
        stream_key: &str,
        outcome: ItemOutcome,
        pages: u32,
    ) -> StorageResult<()>;

    /// Counts outcomes recorded for a run
    fn count_outcomes(&self, run_id: i64) -> StorageResult<HashMap<ItemOutcome, u64>>;

    // ===== Checkpoints =====

    /// Loads the checkpoint of a stream, if it was abandoned earlier
    fn load_checkpoint(&self, stream_key: &str) -> StorageResult<Option<Checkpoint>>;

    /// Inserts or replaces the checkpoint of a stream
    fn save_checkpoint(&mut self, checkpoint: &Checkpoint) -> StorageResult<()>;

    /// Removes the checkpoint of a stream
    fn clear_checkpoint(&mut self, stream_key: &str) -> StorageResult<()>;

    /// Lists every pending checkpoint
    fn list_checkpoints(&self) -> StorageResult<Vec<Checkpoint>>;
}
