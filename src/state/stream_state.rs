//! Cursor stream state for one item's review crawl
//!
//! The cursor is opaque: apart from the wildcard seed it is only ever taken
//! from the previous response.
use std::fmt;

/// Cursor that starts every fresh stream
const SEED_CURSOR: &str = "*";

/// Where the review paginator goes next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamPhase {
    /// Fetch the page for the current cursor
    Fetching,

    /// The last attempt failed; back off and retry the same cursor
    ErrorBackoff,

    /// The remote signalled that the stream has no more pages
    Terminal,

    /// The per-item error budget is spent
    Aborted,
}

impl fmt::Display for StreamPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetching => "fetching",
            Self::ErrorBackoff => "error_backoff",
            Self::Terminal => "terminal",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorStreamState {
    cursor: String,
    page_index: u32,
    error_count: u32,
}

impl CursorStreamState {
    /// A fresh stream: wildcard cursor, first page
    pub fn seed() -> Self {
        Self {
            cursor: SEED_CURSOR.to_string(),
            page_index: 1,
            error_count: 0,
        }
    }

    /// A stream picked up from a checkpoint, with a fresh error budget
    pub fn resume(cursor: impl Into<String>, page_index: u32) -> Self {
        Self {
            cursor: cursor.into(),
            page_index: page_index.max(1),
            error_count: 0,
        }
    }

    pub fn cursor(&self) -> &str {
        &self.cursor
    }

    /// Index the next persisted page will get
    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    /// A page was persisted and the remote returned `next_cursor`
    ///
    /// A cursor equal to the current one means the remote has nothing
    /// further to hand out, which ends the stream.
    pub fn on_page(&mut self, next_cursor: String) -> StreamPhase {
        self.page_index += 1;
        if next_cursor == self.cursor {
            return StreamPhase::Terminal;
        }
        self.cursor = next_cursor;
        StreamPhase::Fetching
    }

    /// A fetch failed or returned an unusable payload
    pub fn on_error(&mut self, max_errors: u32) -> StreamPhase {
        self.error_count += 1;
        if self.error_count >= max_errors {
            StreamPhase::Aborted
        } else {
            StreamPhase::ErrorBackoff
        }
    }
}
