//! Pagination planning
//!
//! The server returns results in fixed pages of 20 rows. The first results
//! page carries two authoritative numbers: the total row count (a summary
//! cell) and the page count (the pager widget's own "1/M" text). The page
//! count is read from the widget rather than recomputed from total/stride
//! because the two can disagree at small scales.

use scraper::{Html, Selector};

/// Rows per result page; server-defined, not configurable
pub const PAGE_STRIDE: usize = 20;

/// Reads the server-reported total row count off the first page
///
/// The summary cell (`td[width="140"]`) reads like "Total: 503 #1"; the
/// first whitespace token that parses as an integer is the total. An
/// unparseable cell yields 0.
pub fn total_rows(document: &Html) -> usize {
    let Ok(selector) = Selector::parse(r#"td[width="140"]"#) else {
        return 0;
    };

    document
        .select(&selector)
        .next()
        .map(|cell| cell.text().collect::<String>())
        .and_then(|text| {
            text.split_whitespace()
                .find_map(|token| token.parse::<usize>().ok())
        })
        .unwrap_or(0)
}

/// Reads the total page count from the pager widget
///
/// The widget's first option reads like "Page 1/26"; the value after the
/// slash is the page count. Absence of the widget means the search yielded
/// zero results; callers surface that as a distinct no-results condition,
/// not an empty success.
pub fn page_count(document: &Html) -> Option<usize> {
    let selector = Selector::parse(r#"option[value="1"]"#).ok()?;

    let text = document
        .select(&selector)
        .next()
        .map(|option| option.text().collect::<String>())?;

    text.rsplit('/').next()?.trim().parse().ok()
}

/// Computes the URL of every result page
///
/// Page `i` (1-based) starts at row offset `1 + (i-1)*20`, appended as the
/// `r` query parameter. Planning stops before any page whose offset already
/// lies beyond `total_rows`, since the previous page covers the last needed
/// row.
/// The first page is always emitted, so any total of 20 or fewer (including
/// a single result) yields exactly one page.
///
/// # Arguments
///
/// * `base_url` - The resolved first-page URL, query string included
/// * `page_count` - Page count from the pager widget
/// * `total_rows` - Number of rows actually wanted (server total, or the
///   caller's cap if smaller)
pub fn plan_pages(base_url: &str, page_count: usize, total_rows: usize) -> Vec<String> {
    let mut urls = Vec::new();

    for page_number in 1..=page_count {
        let offset = 1 + (page_number - 1) * PAGE_STRIDE;

        if page_number > 1 && offset > total_rows {
            break;
        }

        urls.push(format!("{}&r={}", base_url, offset));
    }

    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://example.com/screener.ashx?v=110&f=idx_sp500";

    fn first_page(total: usize, pages: usize) -> Html {
        Html::parse_document(&format!(
            r#"<html><body>
            <table><tr><td width="140"><b>Total:</b> {} #1</td></tr></table>
            <select><option value="1">Page 1/{}</option></select>
            </body></html>"#,
            total, pages
        ))
    }

    #[test]
    fn test_total_rows() {
        assert_eq!(total_rows(&first_page(503, 26)), 503);
    }

    #[test]
    fn test_total_rows_alternate_format() {
        let document = Html::parse_document(
            r#"<html><body><table><tr><td width="140">#1 / 503 Total</td></tr></table></body></html>"#,
        );
        assert_eq!(total_rows(&document), 503);
    }

    #[test]
    fn test_total_rows_missing_cell() {
        let document = Html::parse_document("<html><body></body></html>");
        assert_eq!(total_rows(&document), 0);
    }

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(&first_page(503, 26)), Some(26));
    }

    #[test]
    fn test_page_count_absent_means_no_results() {
        let document = Html::parse_document("<html><body></body></html>");
        assert_eq!(page_count(&document), None);
    }

    #[test]
    fn test_plan_pages_full_scenario() {
        // 503 total rows across 26 pages of 20
        let urls = plan_pages(BASE, 26, 503);
        assert_eq!(urls.len(), 26);
        assert!(urls[0].ends_with("&r=1"));
        assert!(urls[1].ends_with("&r=21"));
        assert!(urls[25].ends_with("&r=501"));
    }

    #[test]
    fn test_plan_pages_exact_multiple() {
        let urls = plan_pages(BASE, 2, 40);
        assert_eq!(urls.len(), 2);
    }

    #[test]
    fn test_plan_pages_caller_cap_below_server_total() {
        // Server has 50 pages, caller only wants 30 rows
        let urls = plan_pages(BASE, 50, 30);
        assert_eq!(urls.len(), 2);
        assert!(urls[1].ends_with("&r=21"));
    }

    #[test]
    fn test_plan_pages_single_row_emits_one_page() {
        // Regression: a one-row result must still fetch its page
        let urls = plan_pages(BASE, 1, 1);
        assert_eq!(urls.len(), 1);
        assert!(urls[0].ends_with("&r=1"));
    }

    #[test]
    fn test_plan_pages_single_full_page() {
        let urls = plan_pages(BASE, 1, 20);
        assert_eq!(urls.len(), 1);
    }

    #[test]
    fn test_plan_pages_twenty_one_rows() {
        let urls = plan_pages(BASE, 2, 21);
        assert_eq!(urls.len(), 2);
    }

    #[test]
    fn test_plan_pages_offsets_are_one_based_strides() {
        let urls = plan_pages(BASE, 4, 80);
        let offsets: Vec<String> = urls
            .iter()
            .map(|u| u.rsplit("&r=").next().unwrap().to_string())
            .collect();
        assert_eq!(offsets, vec!["1", "21", "41", "61"]);
    }
}
