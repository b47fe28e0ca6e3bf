//! Single-page HTTP fetcher
//!
//! Builds the HTTP client and classifies each response into a
//! [`FetchOutcome`]. Classification rules:
//!
//! | Condition | Outcome |
//! |-----------|---------|
//! | 2xx with the throttling sentinel body | Throttled |
//! | HTTP 429 | Throttled |
//! | other 4xx/5xx | HttpError |
//! | transport timeout | Timeout |
//! | other transport failure | Network |
//! | anything else | Success |

use crate::ScrapeError;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use std::time::Duration;

/// Literal response body the server sends when rate-limiting
///
/// This arrives with a 200 status, so it must be recognized by body content.
/// It is always retryable and must never be reported as a parse failure.
pub const THROTTLE_SENTINEL: &str = "Too many requests.";

/// Classified result of a single page fetch
#[derive(Debug)]
pub enum FetchOutcome {
    /// Successfully fetched the page
    Success {
        /// Page body content
        body: String,
        /// Final URL after redirects, query string included
        final_url: String,
    },

    /// The server is rate-limiting us; retryable
    Throttled,

    /// Transport-level timeout
    Timeout,

    /// Non-success HTTP status
    HttpError { status: u16 },

    /// Other transport failure (connection refused, DNS, ...)
    Network(String),
}

/// Builds the HTTP client used for all requests
///
/// Certificate verification is switched off on purpose: the target site's
/// certificate chain is treated as untrustworthy-but-acceptable for this
/// client, matching its long-standing behavior. This is a deliberate trust
/// relaxation, not an oversight.
///
/// # Arguments
///
/// * `timeout` - Per-request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL and classifies the response
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The URL to fetch
/// * `params` - Query parameters appended to the URL (empty slice for none)
/// * `user_agent` - Identity string for this request; callers pick one per
///   batch and pass the same value for every request in that batch
pub async fn fetch_page(
    client: &Client,
    url: &str,
    params: &[(&str, String)],
    user_agent: &str,
) -> FetchOutcome {
    let request = client.get(url).query(params).header(USER_AGENT, user_agent);

    match request.send().await {
        Ok(response) => {
            let status = response.status();
            let final_url = response.url().to_string();

            if status.as_u16() == 429 {
                return FetchOutcome::Throttled;
            }

            if !status.is_success() {
                return FetchOutcome::HttpError {
                    status: status.as_u16(),
                };
            }

            match response.text().await {
                Ok(body) if body == THROTTLE_SENTINEL => FetchOutcome::Throttled,
                Ok(body) => FetchOutcome::Success { body, final_url },
                Err(e) if e.is_timeout() => FetchOutcome::Timeout,
                Err(e) => FetchOutcome::Network(e.to_string()),
            }
        }
        Err(e) if e.is_timeout() => FetchOutcome::Timeout,
        Err(e) if e.is_connect() => FetchOutcome::Network(format!("connection failed: {}", e)),
        Err(e) => FetchOutcome::Network(e.to_string()),
    }
}

/// Fetches a URL and returns the raw response bytes
///
/// Used for binary payloads (chart images). Classification mirrors
/// [`fetch_page`], minus the body sentinel, which only ever appears on HTML
/// endpoints; non-success outcomes surface directly as errors.
pub async fn fetch_bytes(
    client: &Client,
    url: &str,
    params: &[(&str, String)],
    user_agent: &str,
) -> Result<Vec<u8>, ScrapeError> {
    let request = client.get(url).query(params).header(USER_AGENT, user_agent);

    let response = request.send().await.map_err(|e| classify_transport(e, url))?;
    let status = response.status();

    if status.as_u16() == 429 {
        return Err(ScrapeError::Throttled {
            url: url.to_string(),
        });
    }
    if !status.is_success() {
        return Err(ScrapeError::Http {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| classify_transport(e, url))?;
    Ok(bytes.to_vec())
}

fn classify_transport(error: reqwest::Error, url: &str) -> ScrapeError {
    let url = url.to_string();
    if error.is_timeout() {
        ScrapeError::Timeout { url }
    } else {
        ScrapeError::Network {
            url,
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(Duration::from_secs(5));
        assert!(client.is_ok());
    }

    #[test]
    fn test_sentinel_text() {
        // The sentinel is compared byte-for-byte against response bodies
        assert_eq!(THROTTLE_SENTINEL, "Too many requests.");
    }
}
