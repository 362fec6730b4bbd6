//! Output module for reports over harvested data
//!
//! This module handles:
//! - Displaying the run ledger (runs, outcomes, pending streams)
//! - Aggregating the review table into JSON statistics

pub mod review_stats;
pub mod stats;

pub use review_stats::{write_review_stats, GameTally, ReviewStats, StatsSummary, UserTally};
pub use stats::{load_status, print_status, LedgerStatus, RunStatistics};
