//! Table layout strategies and the uniform row format

use scraper::{ElementRef, Html, Selector};

/// An ordered mapping from header name to cell text
///
/// Values are unparsed presentation text; numeric or date coercion is the
/// caller's concern. Insertion order defines column identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRow {
    fields: Vec<(String, String)>,
}

impl TableRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for `key`, if present
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Sets `key` to `value`, replacing an existing entry or appending a new
    /// one at the end
    pub fn insert(&mut self, key: &str, value: &str) {
        if let Some(entry) = self.fields.iter_mut().find(|(name, _)| name == key) {
            entry.1 = value.to_string();
        } else {
            self.fields.push((key.to_string(), value.to_string()));
        }
    }

    /// Iterates over `(header, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Builds a row by zipping headers positionally against cell values
    pub fn from_cells(headers: &[String], cells: &[String]) -> Self {
        let mut row = TableRow::new();
        for (header, cell) in headers.iter().zip(cells.iter()) {
            row.insert(header, cell);
        }
        row
    }
}

/// Result of extracting one page
///
/// `layout` names the strategy that recognized the page; `None` means no
/// layout matched and the rows were degraded to empty (soft failure).
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub rows: Vec<TableRow>,
    pub layout: Option<&'static str>,
}

/// A table-layout recognizer
///
/// Strategies are tried in a fixed order; the first one returning `Some`
/// wins. Returning `None` means "this page is not in my layout", not an
/// error.
pub trait LayoutStrategy {
    fn name(&self) -> &'static str;

    /// Attempts to extract rows from the page
    ///
    /// # Arguments
    ///
    /// * `document` - The parsed page
    /// * `headers` - Column identity for positional layouts
    /// * `row_cap` - Stop once a row's own sequence number reaches this value
    ///   (tail-page handling); `None` consumes every row
    fn try_extract(
        &self,
        document: &Html,
        headers: &[String],
        row_cap: Option<usize>,
    ) -> Option<Vec<TableRow>>;
}

/// Joined, trimmed text content of an element
fn cell_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Reads the `td` cells of a row element into strings
fn row_cells(row: ElementRef<'_>) -> Vec<String> {
    let Ok(td) = Selector::parse("td") else {
        return Vec::new();
    };
    row.select(&td).map(cell_text).collect()
}

/// Zips rows against headers, honoring the tail-page cap
///
/// The last requested page can carry more rows than needed because page
/// boundaries don't align with the requested total; a row whose first cell
/// (its own sequence number) equals the cap is the last one taken.
fn collect_capped(
    row_elements: impl Iterator<Item = Vec<String>>,
    headers: &[String],
    row_cap: Option<usize>,
) -> Vec<TableRow> {
    let mut rows = Vec::new();
    for cells in row_elements {
        if cells.is_empty() {
            continue;
        }
        let sequence = cells[0].parse::<usize>().ok();
        rows.push(TableRow::from_cells(headers, &cells));
        if let (Some(cap), Some(sequence)) = (row_cap, sequence) {
            if sequence == cap {
                break;
            }
        }
    }
    rows
}

/// Legacy fixed-column layout: data rows marked `valign="top"`
///
/// The first matching row is the in-table header strip and is skipped; the
/// rest are data rows whose cells zip positionally against the header list.
pub struct FixedColumnLayout;

impl LayoutStrategy for FixedColumnLayout {
    fn name(&self) -> &'static str {
        "fixed-column"
    }

    fn try_extract(
        &self,
        document: &Html,
        headers: &[String],
        row_cap: Option<usize>,
    ) -> Option<Vec<TableRow>> {
        let selector = Selector::parse(r#"tr[valign="top"]"#).ok()?;
        let mut matches = document.select(&selector).peekable();
        matches.peek()?;

        Some(collect_capped(
            matches.skip(1).map(row_cells),
            headers,
            row_cap,
        ))
    }
}

/// Newer CSS-class-addressed layout: data rows carry a `styled-row` class
pub struct ClassAddressedLayout;

impl LayoutStrategy for ClassAddressedLayout {
    fn name(&self) -> &'static str {
        "class-addressed"
    }

    fn try_extract(
        &self,
        document: &Html,
        headers: &[String],
        row_cap: Option<usize>,
    ) -> Option<Vec<TableRow>> {
        let selector = Selector::parse("tr.styled-row").ok()?;
        let mut matches = document.select(&selector).peekable();
        matches.peek()?;

        Some(collect_capped(matches.map(row_cells), headers, row_cap))
    }
}

/// Label/value paired-cell layout used by single-entity detail pages
///
/// Each `table-dark-row` holds alternating label/value cell pairs; labels
/// become keys directly, so no external header list is involved. The whole
/// page collapses into a single mapping.
///
/// Two field fixups keep downstream consumers consistent:
/// - "EPS next Y" legitimately appears twice; the second occurrence is the
///   growth percentage and is renamed "EPS growth next Y".
/// - "Volatility" is a composite cell covering two time windows and splits
///   into "Volatility (Week)" and "Volatility (Month)".
pub struct PairedCellLayout;

impl LayoutStrategy for PairedCellLayout {
    fn name(&self) -> &'static str {
        "paired-cell"
    }

    fn try_extract(
        &self,
        document: &Html,
        _headers: &[String],
        _row_cap: Option<usize>,
    ) -> Option<Vec<TableRow>> {
        let selector = Selector::parse("tr.table-dark-row").ok()?;
        let mut matches = document.select(&selector).peekable();
        matches.peek()?;

        let mut row = TableRow::new();
        for tr in matches {
            let cells = row_cells(tr);
            for pair in cells.chunks(2) {
                let [label, value] = pair else { continue };
                match label.as_str() {
                    "EPS next Y" if row.contains_key("EPS next Y") => {
                        row.insert("EPS growth next Y", value);
                    }
                    "Volatility" => {
                        let mut windows = value.split_whitespace();
                        if let Some(week) = windows.next() {
                            row.insert("Volatility (Week)", week);
                        }
                        if let Some(month) = windows.next() {
                            row.insert("Volatility (Month)", month);
                        }
                    }
                    _ => row.insert(label, value),
                }
            }
        }

        Some(vec![row])
    }
}

/// Extracts one page's rows, trying each known layout in order
///
/// The order matters: the two positional screener layouts are tried before
/// the paired-cell detail layout. A page matching none of them yields an
/// empty extraction with `layout: None` and a diagnostic: a partial-data
/// outcome, never a hard failure.
pub fn extract_rows(page: &str, headers: &[String], row_cap: Option<usize>) -> Extraction {
    let document = Html::parse_document(page);
    let strategies: [&dyn LayoutStrategy; 3] =
        [&FixedColumnLayout, &ClassAddressedLayout, &PairedCellLayout];

    for strategy in strategies {
        if let Some(rows) = strategy.try_extract(&document, headers, row_cap) {
            return Extraction {
                rows,
                layout: Some(strategy.name()),
            };
        }
    }

    tracing::warn!("page matched no known table layout, returning no rows");
    Extraction {
        rows: Vec::new(),
        layout: None,
    }
}

/// Reads the header list off the first results page
///
/// Headers come from the first `valign="middle"` row; cell order defines
/// column identity for the whole query. Sorted columns wrap their text after
/// an arrow image, which text-collection flattens away.
pub fn table_headers(document: &Html) -> Vec<String> {
    let Ok(selector) = Selector::parse(r#"tr[valign="middle"]"#) else {
        return Vec::new();
    };
    let Ok(cells) = Selector::parse("td, th") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .next()
        .map(|row| {
            row.select(&cells)
                .map(cell_text)
                .filter(|text| !text.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn screener_page(rows: &[(usize, &str, &str)]) -> String {
        let mut html = String::from(
            r#"<html><body><table>
            <tr valign="top"><td>No.</td><td>Ticker</td><td>Price</td></tr>"#,
        );
        for (number, ticker, price) in rows {
            html.push_str(&format!(
                r#"<tr valign="top"><td><a>{}</a></td><td><a>{}</a></td><td>{}</td></tr>"#,
                number, ticker, price
            ));
        }
        html.push_str("</table></body></html>");
        html
    }

    #[test]
    fn test_table_row_ordering() {
        let mut row = TableRow::new();
        row.insert("Ticker", "AAPL");
        row.insert("Price", "180.00");
        row.insert("Ticker", "MSFT"); // replace, not append

        assert_eq!(row.len(), 2);
        assert_eq!(row.get("Ticker"), Some("MSFT"));
        let keys: Vec<&str> = row.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["Ticker", "Price"]);
    }

    #[test]
    fn test_fixed_column_layout() {
        let page = screener_page(&[(1, "AAPL", "180.00"), (2, "MSFT", "410.00")]);
        let extraction = extract_rows(&page, &headers(&["No.", "Ticker", "Price"]), None);

        assert_eq!(extraction.layout, Some("fixed-column"));
        assert_eq!(extraction.rows.len(), 2);
        assert_eq!(extraction.rows[0].get("Ticker"), Some("AAPL"));
        assert_eq!(extraction.rows[1].get("Price"), Some("410.00"));
    }

    #[test]
    fn test_fixed_column_skips_header_strip() {
        let page = screener_page(&[]);
        let extraction = extract_rows(&page, &headers(&["No.", "Ticker", "Price"]), None);

        // The lone valign="top" row is the in-table header strip
        assert_eq!(extraction.layout, Some("fixed-column"));
        assert!(extraction.rows.is_empty());
    }

    #[test]
    fn test_row_cap_stops_at_sequence_number() {
        // Tail page: 20 rows served, only up to sequence 503 wanted
        let rows: Vec<(usize, String, String)> = (501..=520)
            .map(|n| (n, format!("T{}", n), "1.00".to_string()))
            .collect();
        let borrowed: Vec<(usize, &str, &str)> = rows
            .iter()
            .map(|(n, t, p)| (*n, t.as_str(), p.as_str()))
            .collect();
        let page = screener_page(&borrowed);

        let extraction = extract_rows(&page, &headers(&["No.", "Ticker", "Price"]), Some(503));
        assert_eq!(extraction.rows.len(), 3);
        assert_eq!(extraction.rows[2].get("No."), Some("503"));
    }

    #[test]
    fn test_no_cap_consumes_all_rows() {
        let page = screener_page(&[(1, "AAPL", "180.00"), (2, "MSFT", "410.00")]);
        let extraction = extract_rows(&page, &headers(&["No.", "Ticker", "Price"]), None);
        assert_eq!(extraction.rows.len(), 2);
    }

    #[test]
    fn test_class_addressed_layout() {
        let page = r#"<html><body><table class="screener_table">
            <tr class="styled-row"><td>1</td><td>AAPL</td></tr>
            <tr class="styled-row"><td>2</td><td>MSFT</td></tr>
        </table></body></html>"#;

        let extraction = extract_rows(page, &headers(&["No.", "Ticker"]), None);
        assert_eq!(extraction.layout, Some("class-addressed"));
        assert_eq!(extraction.rows.len(), 2);
        assert_eq!(extraction.rows[1].get("Ticker"), Some("MSFT"));
    }

    #[test]
    fn test_paired_cell_layout() {
        let page = r#"<html><body><table>
            <tr class="table-dark-row"><td>P/E</td><td>28.5</td><td>EPS next Y</td><td>7.10</td></tr>
            <tr class="table-dark-row"><td>EPS next Y</td><td>9.8%</td><td>Volatility</td><td>1.2% 2.3%</td></tr>
        </table></body></html>"#;

        let extraction = extract_rows(page, &[], None);
        assert_eq!(extraction.layout, Some("paired-cell"));
        assert_eq!(extraction.rows.len(), 1);

        let row = &extraction.rows[0];
        assert_eq!(row.get("P/E"), Some("28.5"));
        assert_eq!(row.get("EPS next Y"), Some("7.10"));
        assert_eq!(row.get("EPS growth next Y"), Some("9.8%"));
        assert_eq!(row.get("Volatility (Week)"), Some("1.2%"));
        assert_eq!(row.get("Volatility (Month)"), Some("2.3%"));
        assert!(row.get("Volatility").is_none());
    }

    #[test]
    fn test_unknown_layout_degrades() {
        let page = "<html><body><div>nothing tabular here</div></body></html>";
        let extraction = extract_rows(page, &headers(&["Ticker"]), None);

        assert_eq!(extraction.layout, None);
        assert!(extraction.rows.is_empty());
    }

    #[test]
    fn test_table_headers() {
        let page = r#"<html><body><table>
            <tr valign="middle"><td>No.</td><td><img src="up.gif"/>Ticker</td><td>Price</td></tr>
        </table></body></html>"#;
        let document = Html::parse_document(page);

        let headers = table_headers(&document);
        assert_eq!(headers, vec!["No.", "Ticker", "Price"]);
    }

    #[test]
    fn test_table_headers_absent() {
        let document = Html::parse_document("<html><body></body></html>");
        assert!(table_headers(&document).is_empty());
    }
}
