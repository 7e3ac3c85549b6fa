//! The feed parser (C4): syndication documents (RSS 2.0, Atom, RSS 1.0)
//! to normalized entry records, via `feed-rs`.

use chrono::{DateTime, Utc};
use fp_domain::Error;

/// A parsed syndication document, trimmed to the fields the normalizer
/// (C6) actually needs.
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    /// Feed-level title, propagated into the Feed row only when it has
    /// none yet (§4.4).
    pub title: Option<String>,
    pub entries: Vec<ParsedEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedEntry {
    /// Explicit identifier, if the entry carries one.
    pub id: Option<String>,
    pub link: Option<String>,
    pub title: Option<String>,
    /// Preferring the canonical "published" field, falling back to
    /// "updated" (§4.4).
    pub published: Option<DateTime<Utc>>,
    /// The richest of `content[0]`/`summary`.
    pub content_html: Option<String>,
    /// `media:thumbnail`, first-seen.
    pub media_thumbnail: Option<String>,
    /// Enclosures whose declared type is `image/*`.
    pub image_enclosures: Vec<String>,
    /// Links whose declared type is `image/*`.
    pub image_links: Vec<String>,
    /// `media:content` URLs.
    pub media_content: Vec<String>,
}

/// Parse raw response bytes into a [`ParsedFeed`].
///
/// Returns `Err(Error::FeedUnparseable)` only when the document is
/// syntactically unparseable; a document that parses but contains zero
/// entries is not an error (see §4.4) — callers that need to treat an
/// empty result as a failure should check `entries.is_empty()` after a
/// successful parse themselves.
pub fn parse(bytes: &[u8]) -> fp_domain::Result<ParsedFeed> {
    let raw = feed_rs::parser::parse(bytes)
        .map_err(|e| Error::FeedUnparseable(e.to_string()))?;

    let title = raw.title.map(|t| truncate(&t.content, 512));
    let entries = raw.entries.into_iter().map(convert_entry).collect();

    Ok(ParsedFeed { title, entries })
}

fn convert_entry(entry: feed_rs::model::Entry) -> ParsedEntry {
    let link = entry
        .links
        .iter()
        .find(|l| {
            l.media_type
                .as_deref()
                .map(|mt| !mt.starts_with("image/"))
                .unwrap_or(true)
        })
        .map(|l| truncate(&l.href, 512));

    let image_links = entry
        .links
        .iter()
        .filter(|l| l.media_type.as_deref().is_some_and(|mt| mt.starts_with("image/")))
        .map(|l| l.href.clone())
        .collect();

    let content_html = entry
        .content
        .as_ref()
        .and_then(|c| c.body.clone())
        .or_else(|| entry.summary.as_ref().map(|s| s.content.clone()));

    let published = entry.published.or(entry.updated);

    let mut media_thumbnail = None;
    let mut image_enclosures = Vec::new();
    let mut media_content = Vec::new();

    for media in &entry.media {
        if media_thumbnail.is_none() {
            if let Some(thumb) = media.thumbnails.first() {
                media_thumbnail = Some(thumb.image.uri.clone());
            }
        }
        for content in &media.content {
            let Some(url) = content.url.as_ref() else {
                continue;
            };
            let is_image = content
                .content_type
                .as_ref()
                .map(|mime| mime.type_() == "image")
                .unwrap_or(false);
            if is_image {
                image_enclosures.push(url.to_string());
            } else {
                media_content.push(url.to_string());
            }
        }
    }

    ParsedEntry {
        id: if entry.id.is_empty() {
            None
        } else {
            Some(truncate(&entry.id, 512))
        },
        link,
        title: entry.title.map(|t| truncate(&t.content, 1024)),
        published,
        content_html,
        media_thumbnail,
        image_enclosures,
        image_links,
        media_content,
    }
}

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
