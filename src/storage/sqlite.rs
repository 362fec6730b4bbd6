//! SQLite ledger implementation
//!
//! This module provides a SQLite-based implementation of the Ledger trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Ledger, StorageError, StorageResult};
use crate::storage::{Checkpoint, ItemOutcome, RunKind, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

/// SQLite ledger backend
pub struct SqliteLedger {
    conn: Connection,
}

impl SqliteLedger {
    /// Opens or creates the ledger database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

const RUN_COLUMNS: &str = "id, kind, started_at, finished_at, config_hash, status";

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        kind: RunKind::from_db_string(&row.get::<_, String>(1)?).unwrap_or(RunKind::Reviews),
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(RunStatus::Running),
    })
}

fn checkpoint_from_row(row: &Row<'_>) -> rusqlite::Result<Checkpoint> {
    Ok(Checkpoint {
        stream_key: row.get(0)?,
        cursor: row.get(1)?,
        page_index: row.get(2)?,
        error_count: row.get(3)?,
        last_error: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

impl Ledger for SqliteLedger {
    // ===== Run Management =====

    fn create_run(&mut self, kind: RunKind, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (kind, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                kind.to_db_string(),
                now,
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self, kind: RunKind) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM runs WHERE kind = ?1 ORDER BY id DESC LIMIT 1",
                    RUN_COLUMNS
                ),
                params![kind.to_db_string()],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn list_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM runs ORDER BY id DESC LIMIT ?1",
            RUN_COLUMNS
        ))?;

        let runs = stmt
            .query_map(params![limit as i64], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(runs)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Item Outcomes =====

    fn record_outcome(
        &mut self,
        run_id: i64,
        stream_key: &str,
        outcome: ItemOutcome,
        pages: u32,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO item_outcomes (run_id, stream_key, outcome, pages, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![run_id, stream_key, outcome.to_db_string(), pages, now],
        )?;
        Ok(())
    }

    fn count_outcomes(&self, run_id: i64) -> StorageResult<HashMap<ItemOutcome, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT outcome, COUNT(*) FROM item_outcomes WHERE run_id = ?1 GROUP BY outcome",
        )?;

        let mut counts = HashMap::new();
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (outcome, count) = row?;
            if let Some(outcome) = ItemOutcome::from_db_string(&outcome) {
                counts.insert(outcome, count as u64);
            }
        }

        Ok(counts)
    }

    // ===== Checkpoints =====

    fn load_checkpoint(&self, stream_key: &str) -> StorageResult<Option<Checkpoint>> {
        let checkpoint = self
            .conn
            .query_row(
                "SELECT stream_key, cursor, page_index, error_count, last_error, updated_at
                 FROM stream_checkpoints WHERE stream_key = ?1",
                params![stream_key],
                checkpoint_from_row,
            )
            .optional()?;
        Ok(checkpoint)
    }

    fn save_checkpoint(&mut self, checkpoint: &Checkpoint) -> StorageResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO stream_checkpoints
             (stream_key, cursor, page_index, error_count, last_error, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                checkpoint.stream_key,
                checkpoint.cursor,
                checkpoint.page_index,
                checkpoint.error_count,
                checkpoint.last_error,
                checkpoint.updated_at
            ],
        )?;
        Ok(())
    }

    fn clear_checkpoint(&mut self, stream_key: &str) -> StorageResult<()> {
        self.conn.execute(
            "DELETE FROM stream_checkpoints WHERE stream_key = ?1",
            params![stream_key],
        )?;
        Ok(())
    }

    fn list_checkpoints(&self) -> StorageResult<Vec<Checkpoint>> {
        let mut stmt = self.conn.prepare(
            "SELECT stream_key, cursor, page_index, error_count, last_error, updated_at
             FROM stream_checkpoints ORDER BY stream_key",
        )?;

        let checkpoints = stmt
            .query_map([], checkpoint_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(checkpoints)
    }
}
