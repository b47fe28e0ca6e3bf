//! Screener queries and the aggregated result set
//!
//! [`ScreenerQuery`] describes a search; [`Screener::search`] runs the full
//! pipeline: submit the search, read the total and page plan off the first
//! page, fetch every page, and stitch the per-page rows into one ordered
//! result whose length matches the server-reported total (clamped to any
//! caller row cap). The finished aggregate supports indexed access,
//! iteration, enrichment with per-ticker detail, and export.

use crate::config::{ConnectionConfig, TableView};
use crate::fetch::{FetchMode, Orchestrator};
use crate::output::{write_csv, ExportSink, SqliteExporter};
use crate::parse::{self, Extraction, TableRow};
use crate::quote::{QuoteClient, Rating};
use crate::{Result, ScrapeError};
use scraper::Html;
use std::path::{Path, PathBuf};
use url::Url;

/// Default base URL of the target site
pub const DEFAULT_BASE_URL: &str = "https://finviz.com";

/// Search parameters for one screener query
///
/// Tickers round-trip in the order given; filters are ordered and
/// server-significant. `order` is a signed field name where a leading `-`
/// means descending. `rows` caps the result set; `custom` selects columns
/// for the Custom view.
#[derive(Debug, Clone, Default)]
pub struct ScreenerQuery {
    pub tickers: Vec<String>,
    pub filters: Vec<String>,
    pub order: String,
    pub signal: String,
    pub table: TableView,
    pub rows: Option<usize>,
    pub custom: Vec<String>,
}

impl ScreenerQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tickers<I, S>(mut self, tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tickers = tickers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_filters<I, S>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters = filters.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_table(mut self, table: TableView) -> Self {
        self.table = table;
        self
    }

    pub fn with_order(mut self, order: impl Into<String>) -> Self {
        self.order = order.into();
        self
    }

    pub fn with_signal(mut self, signal: impl Into<String>) -> Self {
        self.signal = signal.into();
        self
    }

    pub fn with_rows(mut self, rows: usize) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn with_custom<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.custom = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Validates construction-time invariants, before any network I/O
    pub fn validate(&self) -> Result<()> {
        if self.rows == Some(0) {
            return Err(ScrapeError::Config(crate::ConfigError::Validation(
                "row cap must be at least 1".to_string(),
            )));
        }
        Ok(())
    }

    /// Builds the query-string payload for the search request
    ///
    /// Multi-valued parameters (tickers, filters, custom columns) are
    /// comma-joined into single values, as the server expects.
    pub fn payload(&self) -> Vec<(&'static str, String)> {
        let mut payload = vec![
            ("v", self.table.code().to_string()),
            ("t", self.tickers.join(",")),
            ("f", self.filters.join(",")),
            ("o", self.order.clone()),
            ("s", self.signal.clone()),
        ];
        if !self.custom.is_empty() {
            payload.push(("c", self.custom.join(",")));
        }
        payload
    }

    /// Human-readable description used in no-result errors
    fn describe(&self) -> String {
        self.payload()
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Per-ticker detail used for enrichment
///
/// `fields` is merged into every matching row; `ratings` accumulate in the
/// aggregate's separate analysis list.
#[derive(Debug, Clone)]
pub struct TickerDetail {
    pub ticker: String,
    pub fields: TableRow,
    pub ratings: Vec<Rating>,
}

/// The aggregated, ordered result of one screener query
pub struct Screener {
    query: ScreenerQuery,
    base_url: String,
    settings: ConnectionConfig,
    mode: FetchMode,
    headers: Vec<String>,
    rows: Vec<TableRow>,
    total: usize,
    analysis: Vec<Rating>,
    degraded_pages: usize,
}

impl Screener {
    /// Runs a query against the default site
    ///
    /// # Arguments
    ///
    /// * `query` - The search parameters
    /// * `settings` - Connection tuning for the fetch pipeline
    /// * `mode` - Concurrent or sequential page fetching
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tickergrid::{ConnectionConfig, FetchMode, Screener, ScreenerQuery};
    ///
    /// # async fn example() -> tickergrid::Result<()> {
    /// let query = ScreenerQuery::new().with_filters(["idx_sp500"]);
    /// let screener = Screener::search(query, ConnectionConfig::default(), FetchMode::Concurrent).await?;
    /// println!("{} rows", screener.len());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn search(
        query: ScreenerQuery,
        settings: ConnectionConfig,
        mode: FetchMode,
    ) -> Result<Self> {
        Self::search_at(DEFAULT_BASE_URL, query, settings, mode).await
    }

    /// Runs a query against an explicit base URL (tests use a mock server)
    pub async fn search_at(
        base_url: &str,
        query: ScreenerQuery,
        settings: ConnectionConfig,
        mode: FetchMode,
    ) -> Result<Self> {
        query.validate()?;
        let base = Url::parse(base_url)?;

        let mut screener = Self {
            query,
            base_url: base.as_str().trim_end_matches('/').to_string(),
            settings,
            mode,
            headers: Vec::new(),
            rows: Vec::new(),
            total: 0,
            analysis: Vec::new(),
            degraded_pages: 0,
        };
        screener.run().await?;
        Ok(screener)
    }

    /// Executes the full pipeline, replacing any previous result
    async fn run(&mut self) -> Result<()> {
        let orchestrator = Orchestrator::new(self.settings.clone())?;
        let search_url = format!("{}/screener.ashx", self.base_url);

        let (body, resolved_url) = orchestrator
            .fetch_one(&search_url, &self.query.payload())
            .await?;

        // Headers, total, and page plan all come off the first page. The
        // parsed document must drop before the next await.
        let (headers, total, urls) = {
            let document = Html::parse_document(&body);

            let headers = parse::table_headers(&document);
            let server_total = parse::total_rows(&document);
            let total = match self.query.rows {
                // A zero server total means the summary cell was unparseable;
                // the caller's cap is the only number left to trust.
                Some(cap) if server_total > 0 => cap.min(server_total),
                Some(cap) => cap,
                None => server_total,
            };

            let page_count = parse::page_count(&document).ok_or_else(|| {
                ScrapeError::NoResults {
                    query: self.query.describe(),
                }
            })?;

            // A zero total here means the summary cell was unparseable and
            // the caller set no cap; there is no trustworthy row count left,
            // so the result would violate rows.len() == len(). Surface it as
            // a no-results condition instead of fetching uncapped pages.
            if total == 0 {
                return Err(ScrapeError::NoResults {
                    query: self.query.describe(),
                });
            }

            let urls = parse::plan_pages(&resolved_url, page_count, total);
            (headers, total, urls)
        };

        tracing::info!(
            "search resolved: {} rows across {} pages",
            total,
            urls.len()
        );

        let extract_headers = headers.clone();
        let extractions: Vec<Extraction> = orchestrator
            .fetch_all(
                urls,
                move |page| parse::extract_rows(page, &extract_headers, Some(total)),
                self.mode,
            )
            .await?;

        self.degraded_pages = extractions.iter().filter(|e| e.layout.is_none()).count();
        if self.degraded_pages > 0 {
            tracing::warn!(
                "{} page(s) matched no known layout; result is partial",
                self.degraded_pages
            );
        }

        self.headers = headers;
        self.rows = extractions.into_iter().flat_map(|e| e.rows).collect();
        self.total = total;
        self.analysis.clear();

        Ok(())
    }

    /// Appends filters to the query and re-runs the whole pipeline
    ///
    /// There is no incremental diffing; the previous rows are replaced.
    pub async fn add_filters<I, S>(&mut self, filters: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.filters.extend(filters.into_iter().map(Into::into));
        self.run().await
    }

    /// The column identity for every row, in server order
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// The i-th row by insertion (server) order
    pub fn get(&self, index: usize) -> Option<&TableRow> {
        self.rows.get(index)
    }

    /// The query's authoritative row count: the server-reported total,
    /// clamped to the caller's row cap
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// All rows, concatenated in page order
    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TableRow> {
        self.rows.iter()
    }

    /// The search parameters this aggregate was built from
    pub fn query(&self) -> &ScreenerQuery {
        &self.query
    }

    /// Analyst ratings accumulated by enrichment
    pub fn analysis(&self) -> &[Rating] {
        &self.analysis
    }

    /// Pages whose markup matched no known layout (partial-data indicator)
    pub fn degraded_pages(&self) -> usize {
        self.degraded_pages
    }

    /// Merges per-ticker detail into matching rows
    ///
    /// For every row whose `Ticker` matches a detail's key, the detail's
    /// fields are merged into the row. New field names are appended to the
    /// header list exactly once, in first-seen order. Each matched detail's
    /// ratings are appended to the analysis accumulator. A detail whose
    /// ticker matches no row is dropped silently; detail fetches are
    /// allowed to partially fail.
    pub fn enrich(&mut self, details: &[TickerDetail]) {
        for detail in details {
            let mut matched = false;

            for row in self
                .rows
                .iter_mut()
                .filter(|row| row.get("Ticker") == Some(detail.ticker.as_str()))
            {
                for (key, value) in detail.fields.iter() {
                    row.insert(key, value);
                }
                matched = true;
            }

            if matched {
                for (key, _) in detail.fields.iter() {
                    if !self.headers.iter().any(|h| h == key) {
                        self.headers.push(key.to_string());
                    }
                }
                self.analysis.extend(detail.ratings.iter().cloned());
            } else {
                tracing::debug!("no row matches detail ticker {}", detail.ticker);
            }
        }
    }

    /// Fetches detail pages for every ticker in the result and enriches
    ///
    /// A ticker whose detail page cannot be fetched or parsed is skipped
    /// with a warning; the rest of the result is unaffected.
    pub async fn enrich_from_quotes(&mut self, quotes: &mut QuoteClient) -> Result<()> {
        let tickers: Vec<String> = self
            .rows
            .iter()
            .filter_map(|row| row.get("Ticker").map(str::to_string))
            .collect();

        let mut details = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            let fields = match quotes.stock_details(&ticker).await {
                Ok(fields) => fields,
                Err(e) => {
                    tracing::warn!("unable to fetch detail page for ticker {}: {}", ticker, e);
                    continue;
                }
            };
            let ratings = quotes
                .analyst_price_targets(&ticker, 5)
                .await
                .unwrap_or_default();
            details.push(TickerDetail {
                ticker,
                fields,
                ratings,
            });
        }

        self.enrich(&details);
        Ok(())
    }

    /// Downloads the daily candlestick chart image for every ticker
    ///
    /// Charts are written as `{TICKER}.jpg` under `directory` (created if
    /// missing); the returned paths follow row order. Rows without a
    /// `Ticker` column are skipped.
    pub async fn download_charts(&self, directory: &Path) -> Result<Vec<PathBuf>> {
        let orchestrator = Orchestrator::new(self.settings.clone())?;
        std::fs::create_dir_all(directory)?;
        let chart_url = format!("{}/chart.ashx", self.base_url);

        let mut saved = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let Some(ticker) = row.get("Ticker") else {
                continue;
            };
            let params = [
                ("ty", "c".to_string()),
                ("ta", "1".to_string()),
                ("p", "d".to_string()),
                ("s", "l".to_string()),
                ("t", ticker.to_string()),
            ];
            let bytes = orchestrator.fetch_one_bytes(&chart_url, &params).await?;

            let path = directory.join(format!("{}.jpg", ticker));
            std::fs::write(&path, &bytes)?;
            saved.push(path);
        }

        tracing::info!("saved {} chart(s) to {}", saved.len(), directory.display());
        Ok(saved)
    }

    /// Writes the result as CSV to `path`, or renders it to a string when no
    /// path is given
    pub fn to_csv(&self, path: Option<&Path>) -> Result<Option<String>> {
        match path {
            Some(path) => {
                let mut file = std::fs::File::create(path)?;
                write_csv(&mut file, &self.headers, &self.rows)
                    .map_err(crate::output::ExportError::from)?;
                Ok(None)
            }
            None => {
                let mut buffer = Vec::new();
                write_csv(&mut buffer, &self.headers, &self.rows)
                    .map_err(crate::output::ExportError::from)?;
                Ok(Some(String::from_utf8_lossy(&buffer).into_owned()))
            }
        }
    }

    /// Writes the result into a SQLite database at `path`
    pub fn to_sqlite(&self, path: &Path) -> Result<()> {
        let mut exporter = SqliteExporter::open(path)?;
        exporter.export(&self.headers, &self.rows)?;
        Ok(())
    }

    /// Writes the result into an already open SQLite exporter
    pub fn export_into(&self, sink: &mut dyn ExportSink) -> Result<()> {
        sink.export(&self.headers, &self.rows)?;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Screener {
    type Item = &'a TableRow;
    type IntoIter = std::slice::Iter<'a, TableRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
