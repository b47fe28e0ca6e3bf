//! Batch fetch orchestration
//!
//! Drives N page fetches to completion and reassembles per-page results in
//! request order, independent of completion order. Two scheduling modes:
//!
//! - **Concurrent**: all fetches are issued as one bounded-concurrency batch
//!   behind a semaphore, with a whole-batch deadline. The first unrecoverable
//!   page error aborts the batch (fail-fast); a batch deadline expiry abandons
//!   all outstanding requests with no partial result.
//! - **Sequential**: one fetch at a time with a politeness delay between
//!   pages. A throttled or timed-out page is retried with an escalating
//!   backoff delay; once retries are exhausted the configured
//!   [`FailurePolicy`](crate::config::FailurePolicy) decides between aborting
//!   the batch and skipping the page with a warning.

use crate::config::{pick_user_agent, ConnectionConfig, FailurePolicy};
use crate::fetch::{build_http_client, fetch_bytes, fetch_page, FetchOutcome};
use crate::{Result, ScrapeError};
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Scheduling mode for a batch of page fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Bounded fan-out over a shared connection pool
    #[default]
    Concurrent,

    /// One request at a time, with politeness delay and backoff
    Sequential,
}

/// Drives page fetches and owns the HTTP client for one query
///
/// The identity string is chosen once at construction and reused for every
/// request the orchestrator makes. Keeping the identity stable across a
/// session's requests avoids rejection by the far side.
pub struct Orchestrator {
    client: Client,
    settings: ConnectionConfig,
    user_agent: &'static str,
}

impl Orchestrator {
    /// Creates an orchestrator with a freshly built client and identity
    pub fn new(settings: ConnectionConfig) -> Result<Self> {
        let client = build_http_client(settings.request_timeout)?;
        let user_agent = pick_user_agent();
        Ok(Self {
            client,
            settings,
            user_agent,
        })
    }

    /// Fetches a single URL, converting non-success outcomes into errors
    ///
    /// Used for the first results page, where the resolved URL (with its
    /// query string) seeds the pagination plan.
    ///
    /// # Returns
    ///
    /// * `Ok((body, final_url))` on success
    /// * `Err(ScrapeError)` for throttling, timeout, or HTTP failure
    pub async fn fetch_one(&self, url: &str, params: &[(&str, String)]) -> Result<(String, String)> {
        match fetch_page(&self.client, url, params, self.user_agent).await {
            FetchOutcome::Success { body, final_url } => Ok((body, final_url)),
            outcome => Err(outcome_error(outcome, url)),
        }
    }

    /// Fetches a single URL as raw bytes (chart images)
    pub async fn fetch_one_bytes(&self, url: &str, params: &[(&str, String)]) -> Result<Vec<u8>> {
        fetch_bytes(&self.client, url, params, self.user_agent).await
    }

    /// Fetches every URL in the batch and extracts each page's payload
    ///
    /// Output order always matches input order: slot `i` of the returned
    /// vector holds the extraction of `urls[i]`, regardless of the order in
    /// which responses arrive. Each slot is written exactly once.
    ///
    /// # Arguments
    ///
    /// * `urls` - Fully formed page URLs, in page order
    /// * `extract` - Synchronous extraction applied to each page body
    /// * `mode` - Concurrent or sequential scheduling
    pub async fn fetch_all<T, F>(&self, urls: Vec<String>, extract: F, mode: FetchMode) -> Result<Vec<T>>
    where
        T: Default + Send + 'static,
        F: Fn(&str) -> T + Send + Sync + 'static,
    {
        match mode {
            FetchMode::Concurrent => self.fetch_concurrent(urls, extract).await,
            FetchMode::Sequential => self.fetch_sequential(urls, extract).await,
        }
    }

    async fn fetch_concurrent<T, F>(&self, urls: Vec<String>, extract: F) -> Result<Vec<T>>
    where
        T: Default + Send + 'static,
        F: Fn(&str) -> T + Send + Sync + 'static,
    {
        let total = urls.len();
        let extract = Arc::new(extract);
        let semaphore = Arc::new(Semaphore::new(self.settings.concurrent_connections));
        let mut join_set = JoinSet::new();

        for (index, url) in urls.into_iter().enumerate() {
            let client = self.client.clone();
            let semaphore = Arc::clone(&semaphore);
            let extract = Arc::clone(&extract);
            let user_agent = self.user_agent;

            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                match fetch_page(&client, &url, &[], user_agent).await {
                    FetchOutcome::Success { body, .. } => Ok((index, extract(&body))),
                    outcome => Err(outcome_error(outcome, &url)),
                }
            });
        }

        // Write-once slots keyed by page index; reassembly is by request
        // order, never arrival order.
        let mut slots: Vec<Option<T>> = (0..total).map(|_| None).collect();
        let deadline = self.settings.batch_deadline;

        let outcome = tokio::time::timeout(deadline, async {
            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok(Ok((index, value))) => slots[index] = Some(value),
                    Ok(Err(e)) => {
                        // Fail-fast: the first unrecoverable page error
                        // abandons the rest of the batch.
                        join_set.abort_all();
                        return Err(e);
                    }
                    Err(e) if e.is_cancelled() => continue,
                    Err(e) => {
                        join_set.abort_all();
                        return Err(ScrapeError::from(e));
                    }
                }
            }
            Ok(())
        })
        .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                join_set.abort_all();
                return Err(ScrapeError::BatchTimeout(deadline));
            }
        }

        Ok(slots
            .into_iter()
            .map(|slot| slot.unwrap_or_default())
            .collect())
    }

    async fn fetch_sequential<T, F>(&self, urls: Vec<String>, extract: F) -> Result<Vec<T>>
    where
        T: Default + Send + 'static,
        F: Fn(&str) -> T + Send + Sync + 'static,
    {
        let mut results = Vec::with_capacity(urls.len());
        let base_delay = self.settings.request_delay;
        let mut first_request = true;

        for url in urls {
            if !first_request {
                tokio::time::sleep(base_delay).await;
            }
            first_request = false;

            // Backoff multiplier is per-page and resets to 1 on success.
            let mut multiplier: f64 = 1.0;
            let mut retries = 0u32;

            loop {
                match fetch_page(&self.client, &url, &[], self.user_agent).await {
                    FetchOutcome::Success { body, .. } => {
                        results.push(extract(&body));
                        break;
                    }
                    outcome @ (FetchOutcome::Throttled | FetchOutcome::Timeout) => {
                        retries += 1;
                        if retries > self.settings.max_retries {
                            match self.settings.failure_policy {
                                FailurePolicy::Abort => {
                                    return Err(outcome_error(outcome, &url))
                                }
                                FailurePolicy::Skip => {
                                    tracing::warn!(
                                        "giving up on {} after {} retries, skipping page",
                                        url,
                                        self.settings.max_retries
                                    );
                                    results.push(T::default());
                                    break;
                                }
                            }
                        }
                        let delay = base_delay.mul_f64(multiplier);
                        tracing::warn!(
                            "server pushed back on {}, retrying in {:?} (attempt {})",
                            url,
                            delay,
                            retries
                        );
                        tokio::time::sleep(delay).await;
                        multiplier *= self.settings.backoff_factor;
                    }
                    outcome => match self.settings.failure_policy {
                        FailurePolicy::Abort => return Err(outcome_error(outcome, &url)),
                        FailurePolicy::Skip => {
                            tracing::warn!("fetch failed for {}, skipping page", url);
                            results.push(T::default());
                            break;
                        }
                    },
                }
            }
        }

        Ok(results)
    }
}

/// Maps a non-success [`FetchOutcome`] to the matching error, carrying the URL
fn outcome_error(outcome: FetchOutcome, url: &str) -> ScrapeError {
    let url = url.to_string();
    match outcome {
        FetchOutcome::Throttled => ScrapeError::Throttled { url },
        FetchOutcome::Timeout => ScrapeError::Timeout { url },
        FetchOutcome::HttpError { status } => ScrapeError::Http { url, status },
        FetchOutcome::Network(message) => ScrapeError::Network { url, message },
        FetchOutcome::Success { .. } => {
            // Callers only pass non-success outcomes here.
            ScrapeError::Network {
                url,
                message: "unexpected success outcome".to_string(),
            }
        }
    }
}
