//! Export sinks for finished screener results
//!
//! Results leave the crate through two sinks: a hand-rolled CSV writer and a
//! SQLite exporter. Both consume the same header/row shape the screener
//! produces; the [`ExportSink`] trait lets callers supply their own.

mod csv_output;
mod sqlite_output;
mod traits;

pub use csv_output::write_csv;
pub use sqlite_output::{sanitize_column, SqliteExporter};
pub use traits::{ExportError, ExportResult, ExportSink};
