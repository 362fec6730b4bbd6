//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `ListingPageState`: counters for the integer-paginated catalog listing
//! - `CursorStreamState`: cursor, page index and error budget of one item's review stream

mod listing_state;
mod stream_state;

// Re-export main types
pub use listing_state::{ListingPageState, ListingPhase};
pub use stream_state::{CursorStreamState, StreamPhase};
