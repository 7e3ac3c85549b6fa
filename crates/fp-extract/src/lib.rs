//! The content extractor (C5): article URL + engine name in, cleaned
//! body HTML/text out. See §4.5.

mod engines;

pub use engines::{engine_for, DomScoringExtractor, ExtractEngine, StructuredExtractor};

use fp_fetch::{FetchRequest, FetchResponse, Fetcher};
use scraper::{Html, Selector};

/// Fetches an article URL through the shared [`Fetcher`] and runs the
/// configured engine over the body. When the engine is `"none"` this
/// stage is skipped entirely — callers get `(None, None)` without ever
/// issuing a request.
pub struct ContentExtractor {
    engine: Option<Box<dyn ExtractEngine>>,
}

impl ContentExtractor {
    pub fn new(engine_name: &str) -> Self {
        Self {
            engine: engine_for(engine_name),
        }
    }

    pub fn enabled(&self) -> bool {
        self.engine.is_some()
    }

    /// Fetch `url` and extract its primary content. Any failure along
    /// the way — transport error, non-2xx, extraction failure — yields
    /// `(None, None)` so the caller falls back to inline entry content.
    pub async fn extract_url(&self, fetcher: &Fetcher, url: &str) -> (Option<String>, Option<String>) {
        let Some(engine) = &self.engine else {
            return (None, None);
        };

        let host = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_owned))
            .unwrap_or_else(|| url.to_owned());

        let (response, _elapsed_ms, _bytes) = fetcher
            .fetch(
                &host,
                FetchRequest {
                    url,
                    etag: None,
                    last_modified: None,
                },
            )
            .await;

        match response {
            FetchResponse::Ok { body, .. } => {
                let html = String::from_utf8_lossy(&body).into_owned();
                engine.extract(&html, url)
            }
            _ => (None, None),
        }
    }
}

/// Find the first `<img src="...">` in `html`, used as the last-resort
/// image fallback in §4.6 step 3.
pub fn first_img_src(html: &str) -> Option<String> {
    let document = Html::parse_fragment(html);
    let selector = Selector::parse("img").ok()?;
    document
        .select(&selector)
        .find_map(|img| img.value().attr("src"))
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_extractor_disabled_for_none_engine() {
        let extractor = ContentExtractor::new("none");
        assert!(!extractor.enabled());
    }

    #[test]
    fn content_extractor_enabled_for_known_engines() {
        assert!(ContentExtractor::new("trafilatura").enabled());
        assert!(ContentExtractor::new("readability").enabled());
    }

    #[test]
    fn first_img_src_finds_first_image() {
        let html = r#"<p>intro</p><img src="https://example.com/a.png"><img src="https://example.com/b.png">"#;
        assert_eq!(
            first_img_src(html).as_deref(),
            Some("https://example.com/a.png")
        );
    }

    #[test]
    fn first_img_src_none_when_no_images() {
        assert_eq!(first_img_src("<p>no images here</p>"), None);
    }

    #[tokio::test]
    async fn extract_url_disabled_never_fetches() {
        let extractor = ContentExtractor::new("none");
        let fetcher = Fetcher::new(std::time::Duration::from_millis(200), 2, 2, "test/0.1");
        let (html, text) = extractor.extract_url(&fetcher, "https://example.invalid/a").await;
        assert!(html.is_none());
        assert!(text.is_none());
    }
}
