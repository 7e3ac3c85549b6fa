//! The item normalizer (C6): turns a parsed feed entry into a row ready
//! for insertion, deriving a stable guid, resolving the best available
//! image, and hashing the content for change detection.

use chrono::SecondsFormat;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use fp_domain::model::NewItem;
use fp_feedparse::ParsedEntry;

/// Derive a stable identity for an entry (§4.6): the feed's own id if
/// it declared one, else the link, else a hash of title+published.
/// Returns `None` when none of the three are available — the entry has
/// no identity at all and must be skipped rather than hashed into a
/// guid that would collide with every other identity-less entry in the
/// same feed.
pub fn derive_guid(entry: &ParsedEntry) -> Option<String> {
    if let Some(id) = &entry.id {
        return Some(id.clone());
    }
    if let Some(link) = &entry.link {
        return Some(link.clone());
    }
    if entry.title.is_none() && entry.published.is_none() {
        return None;
    }
    let title = entry.title.as_deref().unwrap_or("");
    let published = entry
        .published
        .map(|p| p.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default();
    Some(hex::encode(Sha256::digest(
        format!("{title}{published}").as_bytes(),
    )))
}

/// Resolve the item's display image via the fallback chain in §4.6:
/// `media:thumbnail` → image enclosures → image-typed links →
/// `media:content` → the first `<img>` in the body. Truncated to 2048
/// bytes, the only length bound on this field anywhere in the pipeline.
pub fn resolve_image(entry: &ParsedEntry) -> Option<String> {
    entry
        .media_thumbnail
        .clone()
        .or_else(|| entry.image_enclosures.first().cloned())
        .or_else(|| entry.image_links.first().cloned())
        .or_else(|| entry.media_content.first().cloned())
        .or_else(|| {
            entry
                .content_html
                .as_deref()
                .and_then(fp_extract::first_img_src)
        })
        .map(|url| truncate(&url, 2048))
}

/// Truncate `s` to at most `max_bytes` bytes, backing off to the nearest
/// char boundary so multi-byte UTF-8 sequences are never split.
fn truncate(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_owned();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_owned()
}

/// §3's content hash: SHA-256 hex of the first non-empty of
/// `content_html`, `content_text`, title, url. Purely an
/// idempotency/versioning fingerprint — the dedup key is `(feed_id,
/// guid)`, not this hash.
fn compute_hash(
    content_html: Option<&str>,
    content_text: Option<&str>,
    title: Option<&str>,
    url: Option<&str>,
) -> String {
    let non_empty = |s: Option<&str>| s.filter(|s| !s.is_empty());
    let source = non_empty(content_html)
        .or_else(|| non_empty(content_text))
        .or_else(|| non_empty(title))
        .or_else(|| non_empty(url))
        .unwrap_or("");
    hex::encode(Sha256::digest(source.as_bytes()))
}

/// Build a [`NewItem`] from a parsed entry and its pre-derived guid,
/// optionally replacing the inline content with article text fetched
/// and extracted by C5. Callers derive the guid themselves (via
/// [`derive_guid`]) because they need it before this call, to check for
/// duplicates and to decide whether C5 enrichment is worth invoking.
pub fn build_new_item(
    feed_id: Uuid,
    guid: String,
    entry: &ParsedEntry,
    extracted: Option<(Option<String>, Option<String>)>,
) -> NewItem {
    let image_url = resolve_image(entry);

    let mut content_html = entry.content_html.clone();
    let mut content_text = None;
    if let Some((extracted_html, extracted_text)) = extracted {
        if let Some(html) = extracted_html.filter(|h| !h.is_empty()) {
            content_html = Some(html);
        }
        if let Some(text) = extracted_text.filter(|t| !t.is_empty()) {
            content_text = Some(text);
        }
    }

    let hash = compute_hash(
        content_html.as_deref(),
        content_text.as_deref(),
        entry.title.as_deref(),
        entry.link.as_deref(),
    );

    NewItem {
        feed_id,
        guid,
        title: entry.title.clone(),
        url: entry.link.clone(),
        image_url,
        content_html,
        content_text,
        published_at: entry.published,
        hash,
    }
}
