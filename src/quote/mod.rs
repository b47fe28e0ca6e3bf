//! Single-entity detail pages: fundamentals, insider trades, news, ratings
//!
//! [`QuoteClient`] owns an explicit per-ticker page cache: a quote page is
//! fetched at most once per process and reused by every accessor
//! (fundamentals, insider table, news, analyst ratings). The cache never
//! evicts; its lifetime is the client's.

use crate::config::{pick_user_agent, ConnectionConfig};
use crate::fetch::{build_http_client, fetch_page, FetchOutcome};
use crate::parse::{FixedColumnLayout, LayoutStrategy, PairedCellLayout, TableRow};
use crate::screener::DEFAULT_BASE_URL;
use crate::{Result, ScrapeError};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashMap;
use url::Url;

/// One news entry, either per-ticker or from the site-wide feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsItem {
    /// Normalized timestamp (`YYYY-MM-DD HH:MM`), or the raw text when the
    /// feed provides no parseable time
    pub timestamp: String,
    pub headline: String,
    pub url: String,
    /// Publisher name, when the page carries one
    pub source: Option<String>,
}

/// One analyst rating / price-target row
#[derive(Debug, Clone, PartialEq)]
pub struct Rating {
    /// Normalized date (`YYYY-MM-DD`)
    pub date: String,
    pub category: String,
    pub analyst: String,
    pub rating: String,
    /// Single price target, when the row carries one
    pub target: Option<f64>,
    /// Range start for "from -> to" revisions
    pub target_from: Option<f64>,
    /// Range end for "from -> to" revisions
    pub target_to: Option<f64>,
}

/// Client for quote pages and news feeds, with a no-eviction page cache
pub struct QuoteClient {
    client: Client,
    base_url: String,
    user_agent: &'static str,
    /// ticker -> raw page body; grows for the life of the client
    cache: HashMap<String, String>,
}

impl QuoteClient {
    /// Creates a client against the default site
    pub fn new(settings: &ConnectionConfig) -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, settings)
    }

    /// Creates a client against an explicit base URL (tests use a mock server)
    pub fn with_base_url(base_url: &str, settings: &ConnectionConfig) -> Result<Self> {
        let base = Url::parse(base_url)?;
        Ok(Self {
            client: build_http_client(settings.request_timeout)?,
            base_url: base.as_str().trim_end_matches('/').to_string(),
            user_agent: pick_user_agent(),
            cache: HashMap::new(),
        })
    }

    /// Returns the quote page body for a ticker, fetching it on first access
    async fn page(&mut self, ticker: &str) -> Result<&str> {
        if !self.cache.contains_key(ticker) {
            let url = format!("{}/quote.ashx", self.base_url);
            let params = [("t", ticker.to_string())];
            let body = self.get(&url, &params).await?;
            self.cache.insert(ticker.to_string(), body);
        }
        // Just inserted above when absent.
        Ok(self
            .cache
            .get(ticker)
            .map(String::as_str)
            .unwrap_or_default())
    }

    async fn get(&self, url: &str, params: &[(&str, String)]) -> Result<String> {
        match fetch_page(&self.client, url, params, self.user_agent).await {
            FetchOutcome::Success { body, .. } => Ok(body),
            FetchOutcome::Throttled => Err(ScrapeError::Throttled {
                url: url.to_string(),
            }),
            FetchOutcome::Timeout => Err(ScrapeError::Timeout {
                url: url.to_string(),
            }),
            FetchOutcome::HttpError { status } => Err(ScrapeError::Http {
                url: url.to_string(),
                status,
            }),
            FetchOutcome::Network(message) => Err(ScrapeError::Network {
                url: url.to_string(),
                message,
            }),
        }
    }

    /// Fundamental data for one ticker as a single label/value mapping
    ///
    /// Combines the title strip (Company/Sector/Industry/Country/Website)
    /// with the paired-cell fundamentals table. A page matching no known
    /// layout degrades to an empty mapping with a diagnostic; the caller
    /// gets partial data, not an error.
    pub async fn stock_details(&mut self, ticker: &str) -> Result<TableRow> {
        let body = self.page(ticker).await?.to_string();
        let details = parse_stock_details(&body);
        if details.is_empty() {
            tracing::warn!("unable to parse detail page for ticker {}", ticker);
        }
        Ok(details)
    }

    /// Recent insider transactions for one ticker
    ///
    /// An absent insider table yields an empty list.
    pub async fn insider_transactions(&mut self, ticker: &str) -> Result<Vec<TableRow>> {
        let body = self.page(ticker).await?.to_string();
        Ok(parse_insider(&body))
    }

    /// News headlines attached to one ticker's quote page
    pub async fn news(&mut self, ticker: &str) -> Result<Vec<NewsItem>> {
        let body = self.page(ticker).await?.to_string();
        Ok(parse_news(&body))
    }

    /// Analyst ratings and price targets for one ticker
    ///
    /// # Arguments
    ///
    /// * `ticker` - Stock symbol
    /// * `last` - Most recent ratings to keep
    pub async fn analyst_price_targets(&mut self, ticker: &str, last: usize) -> Result<Vec<Rating>> {
        let body = self.page(ticker).await?.to_string();
        Ok(parse_ratings(&body, last))
    }

    /// The site-wide news feed (not cached; the feed changes constantly)
    pub async fn all_news(&self) -> Result<Vec<NewsItem>> {
        let url = format!("{}/news.ashx", self.base_url);
        let body = self.get(&url, &[]).await?;
        Ok(parse_all_news(&body))
    }

    /// The crypto performance table, one row per pair
    ///
    /// Not cached; this is a live market snapshot.
    pub async fn crypto_performance(&self) -> Result<Vec<TableRow>> {
        let url = format!("{}/crypto_performance.ashx", self.base_url);
        let body = self.get(&url, &[]).await?;
        Ok(parse_crypto(&body))
    }

    /// Performance row for a single crypto pair (e.g. "BTCUSD")
    pub async fn crypto(&self, pair: &str) -> Result<Option<TableRow>> {
        let rows = self.crypto_performance().await?;
        Ok(rows
            .into_iter()
            .find(|row| row.iter().next().is_some_and(|(_, value)| value == pair)))
    }
}

fn select_text(element: scraper::ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Parses the quote page's title strip and fundamentals table
pub(crate) fn parse_stock_details(body: &str) -> TableRow {
    let document = Html::parse_document(body);
    let mut details = TableRow::new();

    // Title strip: Company / Sector / Industry / Country from the tab links
    if let (Ok(title), Ok(links)) = (
        Selector::parse("table.fullview-title"),
        Selector::parse("a.tab-link"),
    ) {
        if let Some(table) = document.select(&title).next() {
            let link_elements: Vec<_> = table.select(&links).collect();

            let keys = ["Company", "Sector", "Industry", "Country"];
            for (key, link) in keys.iter().zip(link_elements.iter()) {
                details.insert(key, &select_text(*link));
            }

            // The company link doubles as the website, when it's external
            if let Some(website) = link_elements
                .first()
                .and_then(|a| a.value().attr("href"))
                .filter(|href| href.starts_with("http"))
            {
                details.insert("Website", website);
            }
        }
    }

    // Fundamentals: label/value paired cells
    if let Some(rows) = PairedCellLayout.try_extract(&document, &[], None) {
        if let Some(fundamentals) = rows.into_iter().next() {
            for (key, value) in fundamentals.iter() {
                details.insert(key, value);
            }
        }
    }

    details
}

/// Parses the insider-trading table into header-keyed rows
pub(crate) fn parse_insider(body: &str) -> Vec<TableRow> {
    let document = Html::parse_document(body);
    let (Ok(table_selector), Ok(tr), Ok(td)) = (
        Selector::parse("table.insider-trading-table"),
        Selector::parse("tr"),
        Selector::parse("td"),
    ) else {
        return Vec::new();
    };

    let Some(table) = document.select(&table_selector).next() else {
        return Vec::new();
    };

    let mut rows = table.select(&tr);
    let Some(header_row) = rows.next() else {
        return Vec::new();
    };
    let headers: Vec<String> = header_row.select(&td).map(select_text).collect();

    rows.map(|row| {
        let cells: Vec<String> = row.select(&td).map(select_text).collect();
        TableRow::from_cells(&headers, &cells)
    })
    .filter(|row| !row.is_empty())
    .collect()
}

/// Parses the per-ticker news table
///
/// The first cell carries either a full timestamp ("Nov-12-24 08:30AM") or a
/// bare time; bare times inherit the date of the previous full timestamp.
pub(crate) fn parse_news(body: &str) -> Vec<NewsItem> {
    let document = Html::parse_document(body);
    let (Ok(table_selector), Ok(tr), Ok(td), Ok(link), Ok(source)) = (
        Selector::parse("table#news-table"),
        Selector::parse("tr:not([id])"),
        Selector::parse("td"),
        Selector::parse("a.tab-link-news"),
        Selector::parse("div.news-link-right span"),
    ) else {
        return Vec::new();
    };

    let Some(table) = document.select(&table_selector).next() else {
        return Vec::new();
    };

    let mut items = Vec::new();
    let mut current_date: Option<NaiveDate> = None;

    for row in table.select(&tr) {
        let mut cells = row.select(&td);
        let Some(time_cell) = cells.next() else { continue };
        let Some(body_cell) = cells.next() else { continue };

        let raw = select_text(time_cell);
        let raw = raw.trim_matches(|c: char| c.is_whitespace() || c == '\u{a0}');

        let timestamp = if raw.len() > 8 {
            match NaiveDateTime::parse_from_str(raw, "%b-%d-%y %I:%M%p") {
                Ok(parsed) => {
                    current_date = Some(parsed.date());
                    parsed.format("%Y-%m-%d %H:%M").to_string()
                }
                Err(_) => raw.to_string(),
            }
        } else {
            match (current_date, NaiveTime::parse_from_str(raw, "%I:%M%p")) {
                (Some(date), Ok(time)) => {
                    NaiveDateTime::new(date, time).format("%Y-%m-%d %H:%M").to_string()
                }
                _ => raw.to_string(),
            }
        };

        let Some(anchor) = body_cell.select(&link).next() else {
            continue;
        };
        let headline = select_text(anchor);
        let url = anchor.value().attr("href").unwrap_or_default().to_string();
        let source = body_cell
            .select(&source)
            .next()
            .map(|span| {
                select_text(span)
                    .trim_matches(|c: char| c == '(' || c == ')' || c == '\u{a0}')
                    .to_string()
            })
            .filter(|s| !s.is_empty());

        items.push(NewsItem {
            timestamp,
            headline,
            url,
            source,
        });
    }

    items
}

/// Parses the site-wide news feed page
pub(crate) fn parse_all_news(body: &str) -> Vec<NewsItem> {
    let document = Html::parse_document(body);
    let (Ok(date_selector), Ok(link_selector)) = (
        Selector::parse("td.nn-date"),
        Selector::parse("a.nn-tab-link"),
    ) else {
        return Vec::new();
    };

    let dates: Vec<String> = document.select(&date_selector).map(select_text).collect();

    document
        .select(&link_selector)
        .enumerate()
        .map(|(index, anchor)| NewsItem {
            timestamp: dates.get(index).cloned().unwrap_or_default(),
            headline: select_text(anchor),
            url: anchor.value().attr("href").unwrap_or_default().to_string(),
            source: None,
        })
        .collect()
}

/// Parses the crypto performance table
///
/// Same shape as a screener results page: a `valign="middle"` header row and
/// fixed-column data rows, except the first cell is the pair name rather
/// than a sequence number (so no row cap applies).
pub(crate) fn parse_crypto(body: &str) -> Vec<TableRow> {
    let document = Html::parse_document(body);
    let headers = crate::parse::table_headers(&document);

    FixedColumnLayout
        .try_extract(&document, &headers, None)
        .unwrap_or_default()
}

/// Parses the analyst-ratings table
///
/// Target cells are `$`-stripped; "from → to" revisions split into a range.
/// Malformed rows are skipped rather than failing the page.
pub(crate) fn parse_ratings(body: &str, last: usize) -> Vec<Rating> {
    let document = Html::parse_document(body);
    let (Ok(table_selector), Ok(tr), Ok(td)) = (
        Selector::parse("table.js-table-ratings"),
        Selector::parse("tr"),
        Selector::parse("td"),
    ) else {
        return Vec::new();
    };

    let Some(table) = document.select(&table_selector).next() else {
        return Vec::new();
    };

    let mut ratings = Vec::new();

    for row in table.select(&tr) {
        let cells: Vec<String> = row
            .select(&td)
            .map(select_text)
            .map(|text| text.replace('\u{2192}', "->").replace('$', ""))
            .filter(|text| !text.is_empty())
            .collect();

        if cells.len() < 4 {
            continue;
        }

        let date = NaiveDate::parse_from_str(&cells[0], "%b-%d-%y")
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|_| cells[0].clone());

        let mut rating = Rating {
            date,
            category: cells[1].clone(),
            analyst: cells[2].clone(),
            rating: cells[3].clone(),
            target: None,
            target_from: None,
            target_to: None,
        };

        if let Some(target_cell) = cells.get(4) {
            if target_cell.contains("->") {
                let compact = target_cell.replace(' ', "");
                let mut parts = compact.split("->");
                rating.target_from = parts.next().and_then(|v| v.parse().ok());
                rating.target_to = parts.next().and_then(|v| v.parse().ok());
            } else {
                rating.target = target_cell.trim().parse().ok();
            }
        }

        ratings.push(rating);
        if ratings.len() == last {
            break;
        }
    }

    ratings
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUOTE_PAGE: &str = r#"<html><body>
        <table class="fullview-title">
          <tr><td>
            <a class="tab-link" href="https://www.apple.com">Apple Inc.</a>
            <a class="tab-link" href="/screener.ashx?f=sec_technology">Technology</a>
            <a class="tab-link" href="/screener.ashx?f=ind_consumerelectronics">Consumer Electronics</a>
            <a class="tab-link" href="/screener.ashx?f=geo_usa">USA</a>
          </td></tr>
        </table>
        <table>
          <tr class="table-dark-row"><td>P/E</td><td>28.5</td><td>EPS next Y</td><td>7.10</td></tr>
          <tr class="table-dark-row"><td>EPS next Y</td><td>9.8%</td><td>Volatility</td><td>1.2% 2.3%</td></tr>
        </table>
    </body></html>"#;

    #[test]
    fn test_parse_stock_details() {
        let details = parse_stock_details(QUOTE_PAGE);

        assert_eq!(details.get("Company"), Some("Apple Inc."));
        assert_eq!(details.get("Sector"), Some("Technology"));
        assert_eq!(details.get("Country"), Some("USA"));
        assert_eq!(details.get("Website"), Some("https://www.apple.com"));
        assert_eq!(details.get("P/E"), Some("28.5"));
        assert_eq!(details.get("EPS growth next Y"), Some("9.8%"));
        assert_eq!(details.get("Volatility (Week)"), Some("1.2%"));
    }

    #[test]
    fn test_parse_stock_details_unknown_layout() {
        let details = parse_stock_details("<html><body><p>maintenance</p></body></html>");
        assert!(details.is_empty());
    }

    #[test]
    fn test_parse_insider() {
        let page = r#"<html><body>
            <table class="body-table insider-trading-table">
              <tr><td>Insider Trading</td><td>Relationship</td><td>Date</td></tr>
              <tr><td>COOK TIMOTHY D</td><td>CEO</td><td>Apr 02</td></tr>
              <tr><td>LEVINSON ARTHUR D</td><td>Director</td><td>Feb 01</td></tr>
            </table>
        </body></html>"#;

        let rows = parse_insider(page);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Insider Trading"), Some("COOK TIMOTHY D"));
        assert_eq!(rows[1].get("Relationship"), Some("Director"));
    }

    #[test]
    fn test_parse_insider_absent_table() {
        assert!(parse_insider("<html><body></body></html>").is_empty());
    }

    #[test]
    fn test_parse_news_date_carry_forward() {
        let page = r#"<html><body>
            <table id="news-table">
              <tr><td>Nov-12-24 08:30AM</td>
                  <td><a class="tab-link-news" href="https://n.example/a">Headline A</a>
                      <div class="news-link-right"><span>(Reuters)</span></div></td></tr>
              <tr><td>06:15AM</td>
                  <td><a class="tab-link-news" href="https://n.example/b">Headline B</a>
                      <div class="news-link-right"><span>(Bloomberg)</span></div></td></tr>
            </table>
        </body></html>"#;

        let items = parse_news(page);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].timestamp, "2024-11-12 08:30");
        assert_eq!(items[0].source.as_deref(), Some("Reuters"));
        // Time-only row inherits the previous row's date
        assert_eq!(items[1].timestamp, "2024-11-12 06:15");
        assert_eq!(items[1].headline, "Headline B");
    }

    #[test]
    fn test_parse_all_news() {
        let page = r#"<html><body><table>
            <tr><td class="nn-date">08:30AM</td>
                <td><a class="nn-tab-link" href="https://n.example/x">Feed headline</a></td></tr>
        </table></body></html>"#;

        let items = parse_all_news(page);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].timestamp, "08:30AM");
        assert_eq!(items[0].headline, "Feed headline");
    }

    #[test]
    fn test_parse_ratings() {
        let page = r#"<html><body>
            <table class="js-table-ratings">
              <tr><td>Jan-10-24</td><td>Reiterated</td><td>Example Corp</td><td>Buy</td><td>$200 → $230</td></tr>
              <tr><td>Dec-02-23</td><td>Initiated</td><td>Other Corp</td><td>Hold</td><td>$180</td></tr>
              <tr><td>Nov-20-23</td><td>Downgrade</td><td>Third Corp</td><td>Sell</td></tr>
            </table>
        </body></html>"#;

        let ratings = parse_ratings(page, 5);
        assert_eq!(ratings.len(), 3);

        assert_eq!(ratings[0].date, "2024-01-10");
        assert_eq!(ratings[0].target_from, Some(200.0));
        assert_eq!(ratings[0].target_to, Some(230.0));
        assert_eq!(ratings[0].target, None);

        assert_eq!(ratings[1].target, Some(180.0));
        assert_eq!(ratings[2].rating, "Sell");
        assert_eq!(ratings[2].target, None);
    }

    #[test]
    fn test_parse_crypto() {
        let page = r#"<html><body><table>
            <tr valign="middle"><td>Ticker</td><td>Price</td><td>Perf Day</td></tr>
            <tr valign="top"><td>Ticker</td><td>Price</td><td>Perf Day</td></tr>
            <tr valign="top"><td>BTCUSD</td><td>64210.55</td><td>1.25%</td></tr>
            <tr valign="top"><td>ETHUSD</td><td>3150.02</td><td>-0.40%</td></tr>
        </table></body></html>"#;

        let rows = parse_crypto(page);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Ticker"), Some("BTCUSD"));
        assert_eq!(rows[1].get("Perf Day"), Some("-0.40%"));
    }

    #[test]
    fn test_parse_crypto_unknown_markup() {
        assert!(parse_crypto("<html><body><p>maintenance</p></body></html>").is_empty());
    }

    #[test]
    fn test_parse_ratings_honors_last() {
        let page = r#"<html><body>
            <table class="js-table-ratings">
              <tr><td>Jan-10-24</td><td>A</td><td>X</td><td>Buy</td></tr>
              <tr><td>Jan-09-24</td><td>B</td><td>Y</td><td>Hold</td></tr>
              <tr><td>Jan-08-24</td><td>C</td><td>Z</td><td>Sell</td></tr>
            </table>
        </body></html>"#;

        assert_eq!(parse_ratings(page, 2).len(), 2);
    }
}
