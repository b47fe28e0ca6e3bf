//! SQLite exporter
//!
//! Writes a result set into a single `screener_results` table, one column
//! per header. Column names are sanitized for SQL identifiers; all inserts
//! run inside one transaction.

use crate::output::traits::{ExportError, ExportResult, ExportSink};
use crate::parse::TableRow;
use rusqlite::Connection;
use std::path::Path;

/// Normalizes a header into a SQL column identifier
///
/// Strips everything outside `[A-Za-z0-9_]`. The percent-window columns get
/// fixed renames because a bare strip would leave them digit-led:
/// "50D High" becomes `High50D`, "52W Low" becomes `Low52W`, and so on. Any
/// other digit-led survivor gets a `Col` prefix.
pub fn sanitize_column(header: &str) -> String {
    let stripped: String = header
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    let renamed = match stripped.as_str() {
        "50DHigh" => "High50D".to_string(),
        "50DLow" => "Low50D".to_string(),
        "52WHigh" => "High52W".to_string(),
        "52WLow" => "Low52W".to_string(),
        _ => stripped,
    };

    if renamed.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        format!("Col{}", renamed)
    } else {
        renamed
    }
}

/// Export sink backed by a SQLite database file
pub struct SqliteExporter {
    connection: Connection,
}

impl SqliteExporter {
    /// Opens (or creates) the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> ExportResult<Self> {
        Ok(Self {
            connection: Connection::open(path)?,
        })
    }

    /// Opens an in-memory database, for tests
    pub fn open_in_memory() -> ExportResult<Self> {
        Ok(Self {
            connection: Connection::open_in_memory()?,
        })
    }

    /// Counts the rows currently stored
    pub fn row_count(&self) -> ExportResult<usize> {
        let count: usize =
            self.connection
                .query_row("SELECT COUNT(*) FROM screener_results", [], |row| {
                    row.get(0)
                })?;
        Ok(count)
    }
}

impl ExportSink for SqliteExporter {
    fn export(&mut self, headers: &[String], rows: &[TableRow]) -> ExportResult<()> {
        if headers.is_empty() {
            return Err(ExportError::Format(
                "cannot export a result set with no columns".to_string(),
            ));
        }

        let columns: Vec<String> = headers.iter().map(|h| sanitize_column(h)).collect();

        let create = format!(
            "CREATE TABLE IF NOT EXISTS screener_results ({})",
            columns
                .iter()
                .map(|c| format!("\"{}\" TEXT", c))
                .collect::<Vec<_>>()
                .join(", ")
        );
        self.connection.execute(&create, [])?;

        let insert = format!(
            "INSERT INTO screener_results ({}) VALUES ({})",
            columns
                .iter()
                .map(|c| format!("\"{}\"", c))
                .collect::<Vec<_>>()
                .join(", "),
            columns
                .iter()
                .enumerate()
                .map(|(i, _)| format!("?{}", i + 1))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let transaction = self.connection.transaction()?;
        {
            let mut statement = transaction.prepare(&insert)?;
            for row in rows {
                let values: Vec<String> = headers
                    .iter()
                    .map(|header| row.get(header).unwrap_or_default().to_string())
                    .collect();
                statement.execute(rusqlite::params_from_iter(values.iter()))?;
            }
        }
        transaction.commit()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Vec<String>, Vec<TableRow>) {
        let headers = vec![
            "Ticker".to_string(),
            "P/E".to_string(),
            "52W High".to_string(),
        ];
        let rows = vec![
            TableRow::from_cells(
                &headers,
                &["AAPL".to_string(), "28.5".to_string(), "3.1%".to_string()],
            ),
            TableRow::from_cells(
                &headers,
                &["MSFT".to_string(), "33.0".to_string(), "1.8%".to_string()],
            ),
        ];
        (headers, rows)
    }

    #[test]
    fn test_sanitize_column() {
        assert_eq!(sanitize_column("P/E"), "PE");
        assert_eq!(sanitize_column("Market Cap"), "MarketCap");
        assert_eq!(sanitize_column("EPS (ttm)"), "EPSttm");
        assert_eq!(sanitize_column("50D High"), "High50D");
        assert_eq!(sanitize_column("50D Low"), "Low50D");
        assert_eq!(sanitize_column("52W High"), "High52W");
        assert_eq!(sanitize_column("52W Low"), "Low52W");
        assert_eq!(sanitize_column("5Y Perf"), "Col5YPerf");
    }

    #[test]
    fn test_export_round_trip() {
        let (headers, rows) = sample();
        let mut exporter = SqliteExporter::open_in_memory().unwrap();
        exporter.export(&headers, &rows).unwrap();

        assert_eq!(exporter.row_count().unwrap(), 2);

        let pe: String = exporter
            .connection
            .query_row(
                "SELECT \"PE\" FROM screener_results WHERE \"Ticker\" = 'MSFT'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(pe, "33.0");
    }

    #[test]
    fn test_export_missing_cell_becomes_empty() {
        let headers = vec!["Ticker".to_string(), "Company".to_string()];
        let rows = vec![TableRow::from_cells(
            &["Ticker".to_string()],
            &["GOOG".to_string()],
        )];

        let mut exporter = SqliteExporter::open_in_memory().unwrap();
        exporter.export(&headers, &rows).unwrap();

        let company: String = exporter
            .connection
            .query_row("SELECT \"Company\" FROM screener_results", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(company, "");
    }

    #[test]
    fn test_export_no_columns_rejected() {
        let mut exporter = SqliteExporter::open_in_memory().unwrap();
        let result = exporter.export(&[], &[]);
        assert!(matches!(result, Err(ExportError::Format(_))));
    }
}
