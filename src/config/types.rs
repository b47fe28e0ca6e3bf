//! Core configuration types

use crate::ScrapeError;
use rand::seq::SliceRandom;
use std::str::FromStr;
use std::time::Duration;

/// What to do when a page keeps failing in sequential mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Abort the whole batch on the first page that exhausts its retries
    #[default]
    Abort,

    /// Log a warning, record an empty page, and continue with the rest
    Skip,
}

/// Connection and scheduling settings for the fetch pipeline
///
/// The defaults match the remote site's tolerances: 30 concurrent
/// connections, a 30 second whole-batch deadline, and a 500ms politeness
/// delay between sequential requests with a 1.5x backoff escalation when the
/// server pushes back.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Maximum in-flight requests in concurrent mode
    pub concurrent_connections: usize,

    /// Per-request timeout applied by the HTTP client
    pub request_timeout: Duration,

    /// Deadline for an entire concurrent batch; no partial results on expiry
    pub batch_deadline: Duration,

    /// Base delay between requests in sequential mode
    pub request_delay: Duration,

    /// Multiplier applied to the retry delay after each throttled attempt
    pub backoff_factor: f64,

    /// Retries per page before the failure policy decides the outcome
    pub max_retries: u32,

    /// Sequential-mode behavior once retries are exhausted
    pub failure_policy: FailurePolicy,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            concurrent_connections: 30,
            request_timeout: Duration::from_secs(30),
            batch_deadline: Duration::from_secs(30),
            request_delay: Duration::from_millis(500),
            backoff_factor: 1.5,
            max_retries: 3,
            failure_policy: FailurePolicy::Abort,
        }
    }
}

/// The screener's seven table views
///
/// Each view maps to the numeric `v` code the server expects. An unknown
/// view name is a configuration error raised before any network I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableView {
    #[default]
    Overview,
    Valuation,
    Ownership,
    Performance,
    Custom,
    Financial,
    Technical,
}

impl TableView {
    /// Returns the numeric view code sent as the `v` query parameter
    pub fn code(self) -> &'static str {
        match self {
            TableView::Overview => "110",
            TableView::Valuation => "120",
            TableView::Ownership => "130",
            TableView::Performance => "140",
            TableView::Custom => "150",
            TableView::Financial => "160",
            TableView::Technical => "170",
        }
    }

    /// Returns the human name of the view
    pub fn name(self) -> &'static str {
        match self {
            TableView::Overview => "Overview",
            TableView::Valuation => "Valuation",
            TableView::Ownership => "Ownership",
            TableView::Performance => "Performance",
            TableView::Custom => "Custom",
            TableView::Financial => "Financial",
            TableView::Technical => "Technical",
        }
    }
}

impl FromStr for TableView {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "overview" => Ok(TableView::Overview),
            "valuation" => Ok(TableView::Valuation),
            "ownership" => Ok(TableView::Ownership),
            "performance" => Ok(TableView::Performance),
            "custom" => Ok(TableView::Custom),
            "financial" => Ok(TableView::Financial),
            "technical" => Ok(TableView::Technical),
            _ => Err(ScrapeError::InvalidTableType(s.to_string())),
        }
    }
}

/// Pool of realistic browser identity strings
///
/// One entry is chosen per batch and reused for every request in that batch.
/// Re-randomizing per request can get a session rejected when the far side
/// compares identities across requests.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 \
     Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 \
     (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
];

/// Picks a random identity string from the pool
pub fn pick_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_view_codes() {
        assert_eq!(TableView::Overview.code(), "110");
        assert_eq!(TableView::Valuation.code(), "120");
        assert_eq!(TableView::Ownership.code(), "130");
        assert_eq!(TableView::Performance.code(), "140");
        assert_eq!(TableView::Custom.code(), "150");
        assert_eq!(TableView::Financial.code(), "160");
        assert_eq!(TableView::Technical.code(), "170");
    }

    #[test]
    fn test_table_view_from_str() {
        assert_eq!("overview".parse::<TableView>().unwrap(), TableView::Overview);
        assert_eq!("Technical".parse::<TableView>().unwrap(), TableView::Technical);
    }

    #[test]
    fn test_table_view_unknown_is_config_error() {
        let err = "holdings".parse::<TableView>().unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidTableType(name) if name == "holdings"));
    }

    #[test]
    fn test_connection_defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.concurrent_connections, 30);
        assert_eq!(config.batch_deadline, Duration::from_secs(30));
        assert_eq!(config.request_delay, Duration::from_millis(500));
        assert!((config.backoff_factor - 1.5).abs() < f64::EPSILON);
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
    }

    #[test]
    fn test_pick_user_agent_is_from_pool() {
        for _ in 0..20 {
            let ua = pick_user_agent();
            assert!(USER_AGENTS.contains(&ua));
        }
    }
}
