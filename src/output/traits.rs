//! Export sink abstraction

use crate::parse::TableRow;

/// Errors that can occur while exporting results
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Format error: {0}")]
    Format(String),
}

/// Result type for export operations
pub type ExportResult<T> = std::result::Result<T, ExportError>;

/// A destination for a finished result set
///
/// Implementations receive the header list once together with every row;
/// rows carry their own label/value pairs and may hold fields the headers
/// do not name (enrichment adds columns), so sinks key off the headers.
pub trait ExportSink {
    /// Writes the complete result set into the sink
    fn export(&mut self, headers: &[String], rows: &[TableRow]) -> ExportResult<()>;
}
