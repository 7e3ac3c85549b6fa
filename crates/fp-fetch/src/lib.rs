//! The HTTP fetcher (C3): conditional-GET against a feed or article URL
//! with timeouts and origin-politeness limits.

mod gate;

pub use gate::HostGates;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use reqwest::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED, USER_AGENT};
use tokio::sync::Semaphore;

/// A conditional-GET request.
pub struct FetchRequest<'a> {
    pub url: &'a str,
    pub etag: Option<&'a str>,
    pub last_modified: Option<&'a str>,
}

/// Outcome of one HTTP round-trip, distinguishing the three cases in §4.3.
#[derive(Debug, Clone)]
pub enum FetchResponse {
    NotModified,
    Ok {
        body: Vec<u8>,
        etag: Option<String>,
        last_modified: Option<String>,
    },
    /// Transport failure is represented with `status = 0`.
    Error { status: u16, message: String },
}

impl FetchResponse {
    /// The status code recorded in the FetchLog for this outcome.
    pub fn log_status(&self) -> i32 {
        match self {
            FetchResponse::NotModified => 304,
            FetchResponse::Ok { .. } => 200,
            FetchResponse::Error { status, .. } => *status as i32,
        }
    }
}

/// Format an instant as an RFC-1123 UTC date, as required for
/// `If-Modified-Since` headers.
pub fn format_rfc1123(instant: DateTime<Utc>) -> String {
    instant.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Shared fetcher: one connection-pooled client, one global concurrency
/// cap, and a table of per-host politeness gates (shared between feed
/// fetches and article-enrichment fetches, per §4.5).
pub struct Fetcher {
    client: reqwest::Client,
    host_gates: Arc<HostGates>,
    global: Arc<Semaphore>,
    global_concurrency: usize,
    user_agent: String,
}

impl Fetcher {
    pub fn new(
        timeout: Duration,
        global_concurrency: usize,
        per_host_concurrency: usize,
        user_agent: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("building the shared HTTP client");
        Self {
            client,
            host_gates: Arc::new(HostGates::new(per_host_concurrency)),
            global: Arc::new(Semaphore::new(global_concurrency.max(1))),
            global_concurrency: global_concurrency.max(1),
            user_agent: user_agent.into(),
        }
    }

    /// Host gates shared by this fetcher's feed and article traffic.
    pub fn host_gates(&self) -> Arc<HostGates> {
        self.host_gates.clone()
    }

    /// Fetches currently holding the global concurrency permit, for the
    /// `/v1/metrics` surface.
    pub fn in_flight_count(&self) -> usize {
        self.global_concurrency.saturating_sub(self.global.available_permits())
    }

    /// Issue a conditional GET against `req.url`, gated both globally and
    /// per `host_key`. Never panics on transport failure; all outcomes
    /// are represented in [`FetchResponse`].
    pub async fn fetch(&self, host_key: &str, req: FetchRequest<'_>) -> (FetchResponse, u128, Option<u64>) {
        let _global_permit = self.global.acquire().await;
        let _host_permit = self.host_gates.acquire(host_key).await;

        let started = Instant::now();
        let mut builder = self
            .client
            .get(req.url)
            .header(USER_AGENT, self.user_agent.as_str());
        if let Some(etag) = req.etag {
            builder = builder.header(IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = req.last_modified {
            builder = builder.header(IF_MODIFIED_SINCE, last_modified);
        }

        let outcome = match builder.send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.as_u16() == 304 {
                    FetchResponse::NotModified
                } else if status.is_success() {
                    let etag = resp
                        .headers()
                        .get(ETAG)
                        .and_then(|v| v.to_str().ok())
                        .map(|s| s.to_owned());
                    let last_modified = resp
                        .headers()
                        .get(LAST_MODIFIED)
                        .and_then(|v| v.to_str().ok())
                        .map(|s| s.to_owned());
                    match resp.bytes().await {
                        Ok(bytes) => FetchResponse::Ok {
                            body: bytes.to_vec(),
                            etag,
                            last_modified,
                        },
                        Err(e) => FetchResponse::Error {
                            status: 0,
                            message: format!("reading response body: {e}"),
                        },
                    }
                } else {
                    FetchResponse::Error {
                        status: status.as_u16(),
                        message: format!("unexpected HTTP status {status}"),
                    }
                }
            }
            Err(e) => FetchResponse::Error {
                status: 0,
                message: e.to_string(),
            },
        };

        let elapsed_ms = started.elapsed().as_millis();
        let byte_count = match &outcome {
            FetchResponse::Ok { body, .. } => Some(body.len() as u64),
            _ => None,
        };
        (outcome, elapsed_ms, byte_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc1123_format_matches_http_date_shape() {
        let instant = DateTime::parse_from_rfc3339("2025-01-19T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_rfc1123(instant), "Sun, 19 Jan 2025 12:00:00 GMT");
    }

    #[test]
    fn log_status_for_each_outcome_kind() {
        assert_eq!(FetchResponse::NotModified.log_status(), 304);
        assert_eq!(
            FetchResponse::Ok {
                body: vec![],
                etag: None,
                last_modified: None
            }
            .log_status(),
            200
        );
        assert_eq!(
            FetchResponse::Error {
                status: 0,
                message: "boom".into()
            }
            .log_status(),
            0
        );
        assert_eq!(
            FetchResponse::Error {
                status: 500,
                message: "boom".into()
            }
            .log_status(),
            500
        );
    }

    #[tokio::test]
    async fn transport_error_against_unroutable_address_is_error_outcome() {
        let fetcher = Fetcher::new(Duration::from_millis(500), 4, 2, "feedpipe-test/0.1");
        // 10.255.255.1 is a non-routable address reserved for documentation
        // of this exact failure mode; the connection attempt will time out
        // or be refused rather than succeed.
        let (outcome, _elapsed, bytes) = fetcher
            .fetch(
                "10.255.255.1",
                FetchRequest {
                    url: "http://10.255.255.1:1/feed.xml",
                    etag: None,
                    last_modified: None,
                },
            )
            .await;
        assert!(matches!(outcome, FetchResponse::Error { .. }));
        assert!(bytes.is_none());
    }
}
