//! Listing pagination state
//!
//! The listing is paginated by an integer index. A page that comes back
//! without any item links is not trusted to be the end: the same index is
//! fetched again until the empty observation has repeated enough times.
use std::fmt;

/// Where the listing paginator goes next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingPhase {
    /// Fetch this page for the first time
    Fetching(u32),

    /// Fetch this page again after an empty result or an exhausted fetch
    Retrying(u32),

    /// The previous page had items; move on to this one
    Advancing(u32),

    /// Too many exhausted fetches of this page in a row
    Stalled(u32),

    /// The listing is exhausted
    Done,
}

impl ListingPhase {
    /// Returns true if the paginator stops in this phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stalled(_) | Self::Done)
    }

    /// Page index to fetch next, if any
    pub fn page(&self) -> Option<u32> {
        match self {
            Self::Fetching(page) | Self::Retrying(page) | Self::Advancing(page) => Some(*page),
            Self::Stalled(_) | Self::Done => None,
        }
    }
}

impl fmt::Display for ListingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetching(page) => write!(f, "fetching page {}", page),
            Self::Retrying(page) => write!(f, "retrying page {}", page),
            Self::Advancing(page) => write!(f, "advancing to page {}", page),
            Self::Stalled(page) => write!(f, "stalled at page {}", page),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Counters driving the listing paginator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPageState {
    /// Index of the page being fetched
    pub page_index: u32,

    /// Empty observations of `page_index` in a row
    pub consecutive_empty: u32,

    /// Exhausted fetches of `page_index` in a row
    pub consecutive_failures: u32,
}

impl ListingPageState {
    pub fn new(first_page: u32) -> Self {
        Self {
            page_index: first_page,
            consecutive_empty: 0,
            consecutive_failures: 0,
        }
    }

    /// The fetched page had at least one item
    pub fn on_items(&mut self) -> ListingPhase {
        self.consecutive_empty = 0;
        self.consecutive_failures = 0;
        self.page_index += 1;
        ListingPhase::Advancing(self.page_index)
    }

    /// The fetched page had no items
    ///
    /// The same page is retried while fewer than `max_empty` retries have
    /// been spent on it; after that the listing is considered exhausted.
    pub fn on_empty(&mut self, max_empty: u32) -> ListingPhase {
        self.consecutive_failures = 0;
        if self.consecutive_empty < max_empty {
            self.consecutive_empty += 1;
            ListingPhase::Retrying(self.page_index)
        } else {
            ListingPhase::Done
        }
    }

    /// The fetch of the current page was exhausted
    pub fn on_failure(&mut self, max_failures: u32) -> ListingPhase {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= max_failures {
            ListingPhase::Stalled(self.page_index)
        } else {
            ListingPhase::Retrying(self.page_index)
        }
    }
}
