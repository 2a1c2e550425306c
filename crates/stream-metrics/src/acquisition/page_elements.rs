use async_trait::async_trait;
use regex::Regex;
use rustc_hash::FxHashMap;
use std::sync::LazyLock;

use super::error::AcquisitionError;
use super::utils::{capitalize, decode_entities, parse_count, title_streamer_name};
use super::{AcquisitionStrategy, Attempt, AttemptContext, RawRecord, ScrapedStats};
use crate::stream_key::StreamKey;

/// An opening tag carrying a `class` attribute.
static CLASSED_TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<([a-z][a-z0-9]*)\b[^>]*?\bclass\s*=\s*["']([^"']*)["'][^>]*>"#).unwrap()
});
static CLOSING_TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</([a-z][a-z0-9]*)\s*>").unwrap());
static ANY_TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

/// Elements that never have a body.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

// Candidate class names per field, first match wins.
const NAME_CLASSES: &[&str] = &[
    "streamer-name",
    "broadcaster-name",
    "host-name",
    "user-name",
    "username",
];
const LIKE_CLASSES: &[&str] = &["like-count", "likes-count", "likes"];
const VIEWER_CLASSES: &[&str] = &["viewer-count", "viewers-count", "viewers", "watching"];
const COMMENT_CLASSES: &[&str] = &["comment-count", "comments-count", "comments"];
const GIFT_CLASSES: &[&str] = &["gift-count", "gifts-count", "gifts"];

fn is_candidate(class: &str) -> bool {
    [NAME_CLASSES, LIKE_CLASSES, VIEWER_CLASSES, COMMENT_CLASSES, GIFT_CLASSES]
        .iter()
        .any(|candidates| candidates.contains(&class))
}

/// Byte offsets of every closing tag, per lowercase tag name, in page order.
struct ClosingTags {
    offsets: FxHashMap<String, Vec<usize>>,
}

impl ClosingTags {
    fn build(html: &str) -> Self {
        let mut offsets: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        for caps in CLOSING_TAG_REGEX.captures_iter(html) {
            if let (Some(tag), Some(name)) = (caps.get(0), caps.get(1)) {
                offsets
                    .entry(name.as_str().to_ascii_lowercase())
                    .or_default()
                    .push(tag.start());
            }
        }
        Self { offsets }
    }

    /// First closing `</name>` at or after `from`.
    fn next(&self, name: &str, from: usize) -> Option<usize> {
        let offsets = self.offsets.get(name)?;
        let index = offsets.partition_point(|&offset| offset < from);
        offsets.get(index).copied()
    }
}

/// Text of the first element carrying each candidate class name.
struct ClassIndex<'a> {
    texts: FxHashMap<&'a str, String>,
}

impl<'a> ClassIndex<'a> {
    fn build(html: &'a str) -> Self {
        let closing = ClosingTags::build(html);
        let mut texts: FxHashMap<&'a str, String> = FxHashMap::default();

        for caps in CLASSED_TAG_REGEX.captures_iter(html) {
            let (Some(tag), Some(name), Some(classes)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            let wanted: Vec<&'a str> = classes
                .as_str()
                .split_whitespace()
                .filter(|class| is_candidate(class) && !texts.contains_key(class))
                .collect();
            if wanted.is_empty() {
                continue;
            }

            let body_start = tag.end();
            let name = name.as_str().to_ascii_lowercase();
            let next_tag = html[body_start..]
                .find('<')
                .map_or(html.len(), |offset| body_start + offset);
            // Void and unclosed elements only own the text up to the next tag.
            let body_end = if VOID_TAGS.contains(&name.as_str()) {
                next_tag
            } else {
                closing.next(&name, body_start).unwrap_or(next_tag)
            };

            let text = element_text(&html[body_start..body_end]);
            if text.is_empty() {
                continue;
            }
            for class in wanted {
                texts.insert(class, text.clone());
            }
        }
        Self { texts }
    }

    fn first(&self, candidates: &[&str]) -> Option<&str> {
        candidates
            .iter()
            .find_map(|class| self.texts.get(*class).map(String::as_str))
    }

    fn count(&self, candidates: &[&str]) -> Option<u64> {
        self.first(candidates).and_then(parse_count)
    }
}

/// Visible text of an element body: tags dropped, whitespace collapsed.
fn element_text(body: &str) -> String {
    ANY_TAG_REGEX
        .replace_all(body, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Picks the streamer name for a scraped page.
///
/// An explicit name wins. Otherwise the name is the capitalized first segment of
/// the stream key, replaced by the name in the page title when the title has a
/// recognised separator.
pub fn resolve_streamer_name(
    explicit: Option<String>,
    stream_key: &str,
    html: &str,
) -> Option<String> {
    if let Some(name) = explicit.filter(|name| !name.trim().is_empty()) {
        return Some(name);
    }

    let broadcaster = StreamKey::from(stream_key).broadcaster().to_string();
    let mut name = (!broadcaster.is_empty()).then(|| capitalize(&broadcaster));
    if let Some(title_name) = title_streamer_name(html) {
        name = Some(title_name);
    }
    name
}

/// Reads the name and counters from labeled elements of the page markup.
pub fn scrape_elements(stream_key: &str, html: &str) -> ScrapedStats {
    let index = ClassIndex::build(html);
    let explicit = index.first(NAME_CLASSES).map(decode_entities);

    ScrapedStats {
        streamer_name: resolve_streamer_name(explicit, stream_key, html),
        likes: index.count(LIKE_CLASSES),
        viewers: index.count(VIEWER_CLASSES),
        comments: index.count(COMMENT_CLASSES),
        gifts: index.count(GIFT_CLASSES),
    }
}

/// Third source: element scraping. Always completes once the page is available;
/// fields it cannot find are left for the normalizer to zero.
#[derive(Debug, Default)]
pub struct PageElementsStrategy;

impl PageElementsStrategy {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AcquisitionStrategy for PageElementsStrategy {
    fn name(&self) -> &'static str {
        "page-elements"
    }

    async fn attempt(&self, ctx: &AttemptContext<'_>) -> Result<Attempt, AcquisitionError> {
        let Some(html) = ctx.page().await else {
            return Ok(Attempt::Miss);
        };
        let stats = scrape_elements(ctx.stream_key().as_str(), html);
        Ok(Attempt::Complete(RawRecord::Scraped(stats)))
    }
}
