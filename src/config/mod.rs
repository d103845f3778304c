//! Configuration module for PDF-Trawler
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key is optional; a missing file means defaults.
//!
//! # Example
//!
//! ```no_run
//! use pdf_trawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("trawler.toml")).unwrap();
//! println!("Fetch attempts per URL: {}", config.crawler.retries);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, OutputConfig};

// Re-export parser functions
pub use parser::{
    compute_config_hash, default_config, load_config, load_config_with_hash, parse_config,
    parse_verify_flag, VERIFY_SSL_ENV,
};
