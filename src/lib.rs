//! Tickergrid: a stock screener scraping client
//!
//! This crate queries a financial-data website's HTML pages (stock screener,
//! quote pages, news feeds) and converts the markup into structured records,
//! with optional export to CSV or an embedded SQLite store.
//!
//! The heart of the crate is the pagination-and-concurrent-fetch pipeline:
//! a search is submitted, the server-reported result total and page count are
//! read off the first page, and the remaining pages are fetched either as a
//! bounded-concurrency batch or one at a time with rate-limit backoff. Rows
//! from all pages are stitched back together in page order.

pub mod config;
pub mod fetch;
pub mod output;
pub mod parse;
pub mod quote;
pub mod screener;

use std::time::Duration;
use thiserror::Error;

/// Main error type for tickergrid operations
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("no results found for query: {query}")]
    NoResults { query: String },

    #[error("invalid table type: {0}")]
    InvalidTableType(String),

    #[error("request timed out for {url}")]
    Timeout { url: String },

    #[error("rate limited by the server at {url}")]
    Throttled { url: String },

    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u16 },

    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("batch deadline of {0:?} elapsed")]
    BatchTimeout(Duration),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("export error: {0}")]
    Export(#[from] output::ExportError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read query file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unknown table view: {0}")]
    InvalidTable(String),
}

/// Result type alias for tickergrid operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{ConnectionConfig, FailurePolicy, TableView};
pub use fetch::{FetchMode, FetchOutcome, Orchestrator};
pub use parse::TableRow;
pub use quote::{NewsItem, QuoteClient, Rating};
pub use screener::{Screener, ScreenerQuery, TickerDetail};
