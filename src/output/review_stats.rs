//! Aggregate statistics over the review table
//!
//! Produces three JSON files next to each other: `summary.json` with the
//! overall totals, `users.json` keyed by user name and `games.json` keyed by
//! item id.

use crate::extract::ReviewRecord;
use crate::HarvestError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSummary {
    pub reviews: u64,
    pub hours: f64,
    pub users: usize,
    pub games: usize,
}

/// Per-user totals
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserTally {
    /// Reviews written, one per reviewed game
    pub games: u64,
    pub time: f64,
    pub recommended: u64,
    pub not_recommended: u64,
}

/// Per-game totals
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GameTally {
    pub reviews: u64,
    pub time: f64,
    pub recommended: u64,
    pub not_recommended: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ReviewStats {
    pub summary: StatsSummary,
    pub users: BTreeMap<String, UserTally>,
    pub games: BTreeMap<String, GameTally>,
}

impl ReviewStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, review: &ReviewRecord) {
        let (up, down) = match review.recommended {
            r if r > 0 => (1, 0),
            r if r < 0 => (0, 1),
            _ => (0, 0),
        };

        self.summary.reviews += 1;
        self.summary.hours += review.hours;

        let user = self.users.entry(review.username.clone()).or_default();
        user.games += 1;
        user.time += review.hours;
        user.recommended += up;
        user.not_recommended += down;

        let game = self.games.entry(review.item_id.clone()).or_default();
        game.reviews += 1;
        game.time += review.hours;
        game.recommended += up;
        game.not_recommended += down;

        self.summary.users = self.users.len();
        self.summary.games = self.games.len();
    }

    /// Reads a review table and tallies every row
    ///
    /// Rows that do not parse are logged and skipped.
    pub fn from_table(path: &Path) -> Result<Self, HarvestError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(path)?;

        let mut stats = Self::new();
        for (line, record) in reader.deserialize::<ReviewRecord>().enumerate() {
            match record {
                Ok(review) => stats.add(&review),
                Err(e) => tracing::warn!("Skipping row {} of {}: {}", line + 1, path.display(), e),
            }
            if (line + 1) % 100_000 == 0 {
                tracing::info!("{} reviews tallied", line + 1);
            }
        }
        Ok(stats)
    }

    /// Writes `summary.json`, `users.json` and `games.json` into `dir`
    pub fn write(&self, dir: &Path) -> Result<(), HarvestError> {
        std::fs::create_dir_all(dir)?;
        std::fs::write(dir.join("summary.json"), serde_json::to_vec(&self.summary)?)?;
        std::fs::write(dir.join("users.json"), serde_json::to_vec(&self.users)?)?;
        std::fs::write(dir.join("games.json"), serde_json::to_vec(&self.games)?)?;
        Ok(())
    }
}

/// Computes review statistics from `table` and writes them into `dir`
pub fn write_review_stats(table: &Path, dir: &Path) -> Result<StatsSummary, HarvestError> {
    let stats = ReviewStats::from_table(table)?;
    stats.write(dir)?;
    tracing::info!(
        "{} reviews, {} users, {} games written to {}",
        stats.summary.reviews,
        stats.summary.users,
        stats.summary.games,
        dir.display()
    );
    Ok(stats.summary)
}
