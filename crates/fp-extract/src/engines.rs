use scraper::{Html, Selector};

/// A pluggable boilerplate-removal engine: article HTML in, cleaned
/// HTML/text out. Any internal failure should surface as `(None, None)`
/// rather than propagate — the caller falls back to inline content.
pub trait ExtractEngine: Send + Sync {
    fn extract(&self, html: &str, url: &str) -> (Option<String>, Option<String>);
}

/// The `"trafilatura"` engine (§4.5, preferred): a structured-extraction
/// engine that scores candidate containers by text density — the ratio
/// of non-link text to total text — and keeps the highest-scoring one.
/// Named for parity with the source system's engine of the same name;
/// this is a native implementation, not a binding to the Python package.
pub struct StructuredExtractor;

impl ExtractEngine for StructuredExtractor {
    fn extract(&self, html: &str, _url: &str) -> (Option<String>, Option<String>) {
        let document = Html::parse_document(html);
        let Ok(candidates) = Selector::parse("article, main, section, div") else {
            return (None, None);
        };
        let Ok(link_selector) = Selector::parse("a") else {
            return (None, None);
        };

        let mut best: Option<(f64, String, String)> = None;
        for candidate in document.select(&candidates) {
            let text: String = candidate.text().collect::<Vec<_>>().join(" ");
            let text_len = text.trim().len();
            if text_len < 200 {
                continue;
            }
            let link_text_len: usize = candidate
                .select(&link_selector)
                .flat_map(|a| a.text())
                .map(str::len)
                .sum();
            let density = 1.0 - (link_text_len as f64 / (text_len as f64 + 1.0));
            let score = text_len as f64 * density;

            let is_better = match &best {
                Some((best_score, _, _)) => score > *best_score,
                None => true,
            };
            if is_better {
                best = Some((score, candidate.html(), text));
            }
        }

        match best {
            Some((_, html_out, text_out)) => (Some(html_out), Some(text_out.trim().to_owned())),
            None => (None, None),
        }
    }
}

/// The `"readability"` engine (§4.5, fallback): a DOM-scoring algorithm
/// in the same family as Mozilla's Readability, backed by the
/// `readability` crate.
pub struct DomScoringExtractor;

impl ExtractEngine for DomScoringExtractor {
    fn extract(&self, html: &str, url: &str) -> (Option<String>, Option<String>) {
        let Ok(parsed_url) = url::Url::parse(url) else {
            return (None, None);
        };
        let mut cursor = std::io::Cursor::new(html.as_bytes());
        match readability::extractor::extract(&mut cursor, &parsed_url) {
            Ok(product) => {
                let html_out = (!product.content.is_empty()).then_some(product.content);
                let text_out = (!product.text.is_empty()).then_some(product.text);
                (html_out, text_out)
            }
            Err(e) => {
                tracing::debug!(error = %e, url, "readability extraction failed");
                (None, None)
            }
        }
    }
}

/// Return the engine named by the `extraction_engine` config value, or
/// `None` for `"none"` / any unrecognized name (treated the same as
/// "skip this stage" — config validation is responsible for rejecting
/// unrecognized names at startup).
pub fn engine_for(name: &str) -> Option<Box<dyn ExtractEngine>> {
    match name {
        "trafilatura" => Some(Box::new(StructuredExtractor)),
        "readability" => Some(Box::new(DomScoringExtractor)),
        _ => None,
    }
}
