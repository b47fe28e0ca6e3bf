//! Hand-rolled CSV writer
//!
//! The output shape is simple enough (header row plus flat string cells)
//! that a dedicated CSV dependency buys nothing. Quoting follows RFC 4180:
//! fields containing the separator, quotes, or line breaks are quoted, and
//! embedded quotes double.

use crate::parse::TableRow;
use std::io::{self, Write};

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn write_record<W: Write>(writer: &mut W, cells: impl Iterator<Item = String>) -> io::Result<()> {
    let mut first = true;
    for cell in cells {
        if !first {
            write!(writer, ",")?;
        } else {
            first = false;
        }
        if needs_quotes(&cell) {
            write!(writer, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(writer, "{}", cell)?;
        }
    }
    writeln!(writer)
}

/// Writes headers plus one record per row to `writer`
///
/// Cells are looked up by header name; a row missing a column emits an
/// empty field, so enriched and unenriched rows mix safely.
pub fn write_csv<W: Write>(
    writer: &mut W,
    headers: &[String],
    rows: &[TableRow],
) -> io::Result<()> {
    write_record(writer, headers.iter().cloned())?;

    for row in rows {
        write_record(
            writer,
            headers
                .iter()
                .map(|header| row.get(header).unwrap_or_default().to_string()),
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> Vec<String> {
        vec!["Ticker".to_string(), "Company".to_string()]
    }

    fn row(ticker: &str, company: &str) -> TableRow {
        TableRow::from_cells(
            &["Ticker".to_string(), "Company".to_string()],
            &[ticker.to_string(), company.to_string()],
        )
    }

    fn render(headers: &[String], rows: &[TableRow]) -> String {
        let mut buffer = Vec::new();
        write_csv(&mut buffer, headers, rows).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_plain_fields() {
        let out = render(&headers(), &[row("AAPL", "Apple Inc.")]);
        assert_eq!(out, "Ticker,Company\nAAPL,Apple Inc.\n");
    }

    #[test]
    fn test_quoting_and_escapes() {
        let out = render(&headers(), &[row("T", r#"Shops, "Quoted" & Co"#)]);
        assert_eq!(out, "Ticker,Company\nT,\"Shops, \"\"Quoted\"\" & Co\"\n");
    }

    #[test]
    fn test_missing_column_emits_empty_field() {
        let sparse = TableRow::from_cells(&["Ticker".to_string()], &["MSFT".to_string()]);
        let out = render(&headers(), &[sparse]);
        assert_eq!(out, "Ticker,Company\nMSFT,\n");
    }

    #[test]
    fn test_headers_only() {
        let out = render(&headers(), &[]);
        assert_eq!(out, "Ticker,Company\n");
    }
}
