//! HTML table parsing: row extraction and pagination planning
//!
//! The remote site has changed its markup several times, so row extraction
//! runs through an ordered list of [`LayoutStrategy`] implementations; the
//! first one that recognizes the page wins. The CSS selectors used here are
//! a contract with the remote site, not with this crate, and are expected to
//! drift. A page matching no layout degrades to an empty extraction plus a
//! diagnostic instead of failing the query.

mod layout;
mod pager;

pub use layout::{
    extract_rows, table_headers, ClassAddressedLayout, Extraction, FixedColumnLayout,
    LayoutStrategy, PairedCellLayout, TableRow,
};
pub use pager::{page_count, plan_pages, total_rows, PAGE_STRIDE};
