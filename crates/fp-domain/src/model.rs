//! Row types for the persistent store (C1). See §3 of the spec this
//! pipeline implements for the authoritative field list and invariants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A periodic source, polled by the scheduler.
///
/// Metadata is mutated exclusively by the scheduler (`next_run_at`
/// advancement) and the consumer pool (fetch outcome fields).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Feed {
    pub id: Uuid,
    pub url: String,
    pub title: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub last_fetch_at: Option<DateTime<Utc>>,
    pub last_status: Option<i32>,
    pub next_run_at: DateTime<Utc>,
    pub interval_seconds: i64,
    pub per_host_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Feed {
    /// Derive the politeness-gate key from a feed URL's authority.
    ///
    /// Falls back to the whole URL if it cannot be parsed, so every feed
    /// still gets *some* bucket rather than panicking at creation time.
    pub fn host_key_for(url: &str) -> String {
        url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_owned()))
            .unwrap_or_else(|| url.to_owned())
    }
}

/// One normalized syndication entry, unique per `(feed_id, guid)`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Item {
    pub id: Uuid,
    pub feed_id: Uuid,
    pub guid: String,
    pub title: Option<String>,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub content_html: Option<String>,
    pub content_text: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
    pub hash: String,
}

/// A new item not yet assigned an id, ready for bulk insertion by C6.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub feed_id: Uuid,
    pub guid: String,
    pub title: Option<String>,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub content_html: Option<String>,
    pub content_text: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub hash: String,
}

/// Per-item user state. Never written by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReadState {
    pub item_id: Uuid,
    pub read_at: Option<DateTime<Utc>>,
    pub starred: bool,
}

/// Append-only audit record for one fetch attempt.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FetchLog {
    pub id: Uuid,
    pub feed_id: Uuid,
    pub http_status: i32,
    pub elapsed_ms: i64,
    pub byte_count: Option<i64>,
    pub error: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// User grouping of feeds, many-to-many via `feed_categories`. Opaque to
/// the pipeline beyond existing for a future read API to join against.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
}

/// The outcome of fetching and processing one feed, produced by the
/// consumer pool and consumed for logging/eventing purposes.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    NotModified,
    Fetched { new_items: usize },
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_key_extracts_authority() {
        assert_eq!(
            Feed::host_key_for("https://example.com/feed.xml"),
            "example.com"
        );
        assert_eq!(
            Feed::host_key_for("http://sub.example.com:8080/a"),
            "sub.example.com"
        );
    }

    #[test]
    fn host_key_falls_back_to_whole_string_on_parse_failure() {
        assert_eq!(Feed::host_key_for("not a url"), "not a url");
    }
}
