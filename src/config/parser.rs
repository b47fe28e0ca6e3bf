//! TOML query-file loading for the CLI

use crate::screener::ScreenerQuery;
use crate::ConfigError;
use serde::Deserialize;
use std::path::Path;

/// On-disk description of a screener query
///
/// # Example file
///
/// ```toml
/// filters = ["idx_sp500", "exch_nasd"]
/// table = "overview"
/// order = "-marketcap"
/// rows = 50
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryFile {
    #[serde(default)]
    pub tickers: Vec<String>,

    #[serde(default)]
    pub filters: Vec<String>,

    /// Sort key; a leading `-` means descending
    #[serde(default)]
    pub order: String,

    #[serde(default)]
    pub signal: String,

    /// One of the seven view names; defaults to "overview"
    pub table: Option<String>,

    /// Explicit row cap; omit to take everything the server reports
    pub rows: Option<usize>,

    /// Custom column ids, only meaningful with the Custom view
    #[serde(default)]
    pub custom: Vec<String>,
}

/// Loads and validates a query file, producing a ready [`ScreenerQuery`]
///
/// # Arguments
///
/// * `path` - Path to the TOML query file
///
/// # Returns
///
/// * `Ok(ScreenerQuery)` - Successfully loaded and validated query
/// * `Err(ConfigError)` - Failed to read, parse, or validate the file
pub fn load_query(path: &Path) -> Result<ScreenerQuery, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let file: QueryFile = toml::from_str(&content)?;

    let table = match file.table.as_deref() {
        Some(name) => name
            .parse()
            .map_err(|_| ConfigError::InvalidTable(name.to_string()))?,
        None => Default::default(),
    };

    if file.rows == Some(0) {
        return Err(ConfigError::Validation(
            "rows must be at least 1 when given".to_string(),
        ));
    }

    Ok(ScreenerQuery {
        tickers: file.tickers,
        filters: file.filters,
        order: file.order,
        signal: file.signal,
        table,
        rows: file.rows,
        custom: file.custom,
    })
}
