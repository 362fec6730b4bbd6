//! Ledger status from the run database
//!
//! This module provides functionality for extracting and displaying the
//! run history, per-run outcome counts and pending checkpoints recorded in
//! the ledger.

use crate::storage::{Checkpoint, ItemOutcome, Ledger, RunKind, RunRecord};
use crate::HarvestError;

/// One run with its outcome counts
#[derive(Debug, Clone)]
pub struct RunStatistics {
    pub run: RunRecord,

    /// Review streams that reached their terminal page
    pub completed: u64,

    /// Review streams abandoned after their error budget
    pub aborted: u64,

    /// Run duration, when the run has finished
    pub duration_seconds: Option<u64>,
}

/// Ledger status summary
#[derive(Debug, Clone)]
pub struct LedgerStatus {
    /// Most recent runs, newest first
    pub runs: Vec<RunStatistics>,

    /// Streams waiting to be resumed
    pub checkpoints: Vec<Checkpoint>,
}

/// Loads the ledger status
///
/// # Arguments
///
/// * `ledger` - The ledger to query
/// * `limit` - Maximum number of runs to include
///
/// # Returns
///
/// * `Ok(LedgerStatus)` - Successfully loaded status
/// * `Err(HarvestError)` - Failed to query the ledger
pub fn load_status(ledger: &dyn Ledger, limit: usize) -> Result<LedgerStatus, HarvestError> {
    let mut runs = Vec::new();
    for run in ledger.list_runs(limit)? {
        let outcomes = ledger.count_outcomes(run.id)?;
        let duration_seconds = duration_of(&run);
        runs.push(RunStatistics {
            completed: outcomes.get(&ItemOutcome::Completed).copied().unwrap_or(0),
            aborted: outcomes.get(&ItemOutcome::Aborted).copied().unwrap_or(0),
            duration_seconds,
            run,
        });
    }

    Ok(LedgerStatus {
        runs,
        checkpoints: ledger.list_checkpoints()?,
    })
}

fn duration_of(run: &RunRecord) -> Option<u64> {
    let started = run.started_at.parse::<chrono::DateTime<chrono::Utc>>().ok()?;
    let finished = run
        .finished_at
        .as_ref()?
        .parse::<chrono::DateTime<chrono::Utc>>()
        .ok()?;
    u64::try_from((finished - started).num_seconds()).ok()
}

/// Prints the ledger status to stdout in a formatted manner
pub fn print_status(status: &LedgerStatus) {
    println!("=== Harvest Status ===\n");

    if status.runs.is_empty() {
        println!("No runs recorded.");
        println!();
    } else {
        println!("Runs:");
        for stats in &status.runs {
            let run = &stats.run;
            let duration = stats
                .duration_seconds
                .map(|s| format!("{}s", s))
                .unwrap_or_else(|| "-".to_string());
            print!(
                "  #{} {:<8} {:<10} started {} ({})",
                run.id,
                run.kind.to_db_string(),
                run.status.to_db_string(),
                run.started_at,
                duration
            );
            if run.kind == RunKind::Reviews {
                print!(
                    ", {} completed, {} aborted",
                    stats.completed, stats.aborted
                );
            }
            println!();
        }
        println!();
    }

    if !status.checkpoints.is_empty() {
        println!("Pending Streams ({}):", status.checkpoints.len());
        for checkpoint in &status.checkpoints {
            println!(
                "  - {} at page {} after {} errors{}",
                checkpoint.stream_key,
                checkpoint.page_index,
                checkpoint.error_count,
                checkpoint
                    .last_error
                    .as_ref()
                    .map(|e| format!(" (last: {})", e))
                    .unwrap_or_default()
            );
        }
        println!();
    }
}
