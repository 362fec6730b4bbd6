//! Configuration module for Steam-Harvest
//!
//! This module handles loading, parsing, and validating the harvest
//! configuration. Every key has a default, so the TOML file is optional and
//! command-line flags can be layered on top before validation.
//!
//! # Example
//!
//! ```no_run
//! use steam_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Writing pages under {}", config.output.root.display());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CompletionPolicy, Config, HttpConfig, ListingConfig, OutputConfig, ReviewsConfig,
    DEFAULT_LISTING_URL, DEFAULT_REVIEWS_URL, DEFAULT_REVIEW_LANGUAGE,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, read_config};
pub use validation::validate;
