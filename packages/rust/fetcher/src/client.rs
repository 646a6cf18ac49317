//! HTTP client shared by every stage of a scan cycle.
//!
//! Each request carries a deadline; transient failures (connect errors,
//! timeouts, 5xx, 429) are retried with exponential backoff, permanent ones
//! (other 4xx, malformed URLs) fail immediately.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use lawwatch_shared::{LawWatchError, Result, ScanConfig};

/// User-Agent string for all outbound requests.
const USER_AGENT: &str = concat!("LawWatch/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects followed per request.
const MAX_REDIRECTS: usize = 5;

/// Upper bound on a single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// `Accept` header for the RSS feed.
pub const ACCEPT_XML: &str = "application/rss+xml, application/xml, */*";

/// `Accept` header for JSON endpoints.
pub const ACCEPT_JSON: &str = "application/json, text/plain, */*";

/// `Accept` header for pages and attachments.
pub const ACCEPT_ANY: &str = "*/*";

// ---------------------------------------------------------------------------
// FetchOptions
// ---------------------------------------------------------------------------

/// Network policy for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Deadline for each individual request.
    pub timeout: Duration,
    /// Extra attempts after the first one for transient failures.
    pub retry_attempts: usize,
    /// First backoff delay; doubles on each retry.
    pub retry_backoff: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry_attempts: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl From<&ScanConfig> for FetchOptions {
    fn from(config: &ScanConfig) -> Self {
        Self {
            timeout: config.request_timeout,
            retry_attempts: config.retry_attempts,
            retry_backoff: config.retry_backoff,
        }
    }
}

// ---------------------------------------------------------------------------
// HttpFetcher
// ---------------------------------------------------------------------------

/// Cheap-to-clone HTTP client with deadline and retry policy.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    opts: FetchOptions,
}

impl HttpFetcher {
    /// Build a fetcher with the given network policy.
    pub fn new(opts: FetchOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(opts.timeout)
            .build()
            .map_err(|e| LawWatchError::permanent(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, opts })
    }

    /// The underlying reqwest client, for collaborators that POST.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// GET `url` and return the raw body, retrying transient failures.
    pub async fn get_bytes(&self, url: &str, accept: &str) -> Result<Vec<u8>> {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.opts.retry_backoff)
            .with_max_delay(MAX_BACKOFF)
            .with_max_times(self.opts.retry_attempts);

        (|| self.get_once(url, accept))
            .retry(backoff)
            .when(LawWatchError::is_transient)
            .notify(|err, delay| {
                warn!(%url, error = %err, delay_ms = delay.as_millis() as u64, "retrying fetch");
            })
            .await
    }

    /// GET `url` and decode the body as JSON.
    pub async fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        let body = self.get_bytes(url, ACCEPT_JSON).await?;
        serde_json::from_slice(&body)
            .map_err(|e| LawWatchError::parse(format!("{url}: invalid JSON: {e}")))
    }

    async fn get_once(&self, url: &str, accept: &str) -> Result<Vec<u8>> {
        debug!(%url, "fetching");

        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, accept)
            .send()
            .await
            .map_err(|e| classify_send_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let msg = format!("{url}: HTTP {status}");
            return Err(if is_transient_status(status) {
                LawWatchError::transient(msg)
            } else {
                LawWatchError::permanent(msg)
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| LawWatchError::transient(format!("{url}: body read failed: {e}")))?;

        Ok(body.to_vec())
    }
}

fn classify_send_error(url: &str, e: reqwest::Error) -> LawWatchError {
    if e.is_builder() {
        LawWatchError::permanent(format!("{url}: {e}"))
    } else {
        LawWatchError::transient(format!("{url}: {e}"))
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_fetcher(retry_attempts: usize) -> HttpFetcher {
        HttpFetcher::new(FetchOptions {
            timeout: Duration::from_secs(5),
            retry_attempts,
            retry_backoff: Duration::from_millis(1),
        })
        .unwrap()
    }

    #[test]
    fn transient_statuses() {
        assert!(is_transient_status(StatusCode::BAD_GATEWAY));
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
        assert!(!is_transient_status(StatusCode::FORBIDDEN));
    }

    #[tokio::test]
    async fn get_bytes_sends_accept_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header("accept", ACCEPT_ANY))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html/>"))
            .expect(1)
            .mount(&server)
            .await;

        let body = fast_fetcher(0)
            .get_bytes(&format!("{}/page", server.uri()), ACCEPT_ANY)
            .await
            .unwrap();
        assert_eq!(body, b"<html/>");
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let body = fast_fetcher(2)
            .get_bytes(&format!("{}/flaky", server.uri()), ACCEPT_ANY)
            .await
            .unwrap();
        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let err = fast_fetcher(2)
            .get_bytes(&format!("{}/down", server.uri()), ACCEPT_ANY)
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn client_errors_fail_fast() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = fast_fetcher(3)
            .get_bytes(&format!("{}/missing", server.uri()), ACCEPT_ANY)
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn get_json_rejects_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stages"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = fast_fetcher(0)
            .get_json(&format!("{}/stages", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, LawWatchError::Parse { .. }));
    }
}
