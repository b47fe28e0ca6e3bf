//! Configuration types and query-file loading
//!
//! Connection tuning lives in [`ConnectionConfig`]; the seven screener table
//! views and their numeric codes in [`TableView`]; the browser identity pool
//! in [`pick_user_agent`]. Queries can also be described in a TOML file and
//! loaded with [`load_query`] (used by the CLI).

mod parser;
mod types;

pub use parser::{load_query, QueryFile};
pub use types::{pick_user_agent, ConnectionConfig, FailurePolicy, TableView, USER_AGENTS};
