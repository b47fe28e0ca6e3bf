//! HTTP fetching: single-page fetcher and the batch orchestrator
//!
//! [`fetch_page`] issues one parameterized GET and classifies the response
//! into a [`FetchOutcome`]. The [`Orchestrator`] drives a whole batch of
//! page fetches to completion, either concurrently (bounded fan-out,
//! fail-fast) or sequentially (politeness delay plus backoff on throttling),
//! and reassembles per-page results in request order.

mod fetcher;
mod orchestrator;

pub use fetcher::{build_http_client, fetch_bytes, fetch_page, FetchOutcome, THROTTLE_SENTINEL};
pub use orchestrator::{FetchMode, Orchestrator};
