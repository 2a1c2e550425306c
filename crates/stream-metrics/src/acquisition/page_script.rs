use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::debug;

use super::error::AcquisitionError;
use super::page_elements::resolve_streamer_name;
use super::utils::{balanced_json_object, json_count, undefined_to_null};
use super::{AcquisitionStrategy, Attempt, AttemptContext, RawRecord, ScrapedStats};

/// Assignment of one of the known state globals, up to the opening brace.
static STATE_ASSIGNMENT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:window\.)?__(?:INITIAL|PRELOADED|APP)_STATE__\s*=\s*\{").unwrap()
});
/// Body of a `<script id="__NEXT_DATA__">` tag, up to the opening brace.
static NEXT_DATA_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script\b[^>]*\bid\s*=\s*["']__NEXT_DATA__["'][^>]*>\s*\{"#).unwrap()
});
static SCRIPT_END_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^(\{.*?\})\s*;?\s*</script>").unwrap());

/// Object keys that name the streamer directly.
const NAME_KEYS: &[&str] = &[
    "streamerName",
    "streamer_name",
    "broadcasterName",
    "nickname",
    "nickName",
    "displayName",
];

/// Object keys whose value is a user object with a `name` field.
const OWNER_KEYS: &[&str] = &["broadcaster", "streamer", "host", "owner", "user"];

const MAX_DEPTH: usize = 12;

/// Known layouts of the metrics object inside the state blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsShape {
    /// `likeCount`, `viewerCount`, `commentCount`, `giftCount`.
    Counted,
    /// `likes`, `viewers`, `comments`, `gifts`.
    Plain,
}

impl StatsShape {
    pub const ALL: [StatsShape; 2] = [StatsShape::Counted, StatsShape::Plain];

    /// Keys for likes, viewers, comments and gifts, in that order.
    pub fn keys(self) -> [&'static str; 4] {
        match self {
            StatsShape::Counted => ["likeCount", "viewerCount", "commentCount", "giftCount"],
            StatsShape::Plain => ["likes", "viewers", "comments", "gifts"],
        }
    }

    /// Reads the counters if `object` has at least one numeric key of this shape.
    pub fn read(self, object: &Map<String, Value>) -> Option<ScrapedStats> {
        let [likes, viewers, comments, gifts] = self.keys().map(|key| object.get(key).and_then(json_count));
        let stats = ScrapedStats {
            streamer_name: None,
            likes,
            viewers,
            comments,
            gifts,
        };
        stats.has_counts().then_some(stats)
    }
}

/// Every state blob on the page, in page order, as JSON text.
///
/// The object is matched by balancing braces; when that fails (for example a
/// blob truncated by the page), the text up to the closing `</script>` is used.
pub fn state_blobs(html: &str) -> Vec<&str> {
    let mut starts: Vec<usize> = STATE_ASSIGNMENT_REGEX
        .find_iter(html)
        .chain(NEXT_DATA_REGEX.find_iter(html))
        .map(|m| m.end() - 1)
        .collect();
    starts.sort_unstable();
    starts.dedup();

    starts
        .into_iter()
        .filter_map(|start| {
            let rest = &html[start..];
            balanced_json_object(rest).or_else(|| {
                SCRIPT_END_REGEX
                    .captures(rest)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str())
            })
        })
        .collect()
}

/// The first state blob on the page.
pub fn find_state_blob(html: &str) -> Option<&str> {
    state_blobs(html).into_iter().next()
}

/// Decodes a state blob, accepting the JavaScript `undefined` literal.
pub fn parse_state_blob(blob: &str) -> Result<Value, AcquisitionError> {
    Ok(serde_json::from_str(&undefined_to_null(blob))?)
}

/// Decodes the first state blob that parses, or reports the last failure.
fn first_parsed_state(html: &str) -> Result<Value, AcquisitionError> {
    let mut last_error = AcquisitionError::MissingPayload;
    for blob in state_blobs(html) {
        match parse_state_blob(blob) {
            Ok(state) => return Ok(state),
            Err(e) => last_error = e,
        }
    }
    Err(last_error)
}

/// Depth-first search for the first object matching one of the [`StatsShape`]s.
pub fn find_stats(value: &Value) -> Option<(StatsShape, ScrapedStats)> {
    fn walk(value: &Value, depth: usize) -> Option<(StatsShape, ScrapedStats)> {
        if depth > MAX_DEPTH {
            return None;
        }
        match value {
            Value::Object(object) => StatsShape::ALL
                .iter()
                .find_map(|shape| shape.read(object).map(|stats| (*shape, stats)))
                .or_else(|| object.values().find_map(|v| walk(v, depth + 1))),
            Value::Array(items) => items.iter().find_map(|v| walk(v, depth + 1)),
            _ => None,
        }
    }
    walk(value, 0)
}

/// Depth-first search for the streamer name.
pub fn find_streamer_name(value: &Value) -> Option<String> {
    fn walk(value: &Value, depth: usize) -> Option<String> {
        if depth > MAX_DEPTH {
            return None;
        }
        match value {
            Value::Object(object) => {
                let direct = NAME_KEYS
                    .iter()
                    .filter_map(|key| object.get(*key).and_then(Value::as_str))
                    .chain(
                        OWNER_KEYS
                            .iter()
                            .filter_map(|key| object.get(*key)?.get("name")?.as_str()),
                    )
                    .map(str::trim)
                    .find(|name| !name.is_empty());
                match direct {
                    Some(name) => Some(name.to_string()),
                    None => object.values().find_map(|v| walk(v, depth + 1)),
                }
            }
            Value::Array(items) => items.iter().find_map(|v| walk(v, depth + 1)),
            _ => None,
        }
    }
    walk(value, 0)
}

/// Second source: the JSON state blob embedded in the stream page's scripts.
#[derive(Debug, Default)]
pub struct PageScriptStrategy;

impl PageScriptStrategy {
    pub fn new() -> Self {
        Self
    }

    /// Scrapes a page already in hand.
    pub fn scrape(&self, stream_key: &str, html: &str) -> Result<Attempt, AcquisitionError> {
        let state = first_parsed_state(html)?;
        let name = find_streamer_name(&state);

        match find_stats(&state) {
            Some((shape, stats)) => {
                debug!(stream_key, ?shape, "Found metrics in embedded state");
                let stats = ScrapedStats {
                    streamer_name: resolve_streamer_name(name, stream_key, html),
                    ..stats
                };
                Ok(Attempt::Complete(RawRecord::Scraped(stats)))
            }
            None => {
                debug!(stream_key, "Embedded state has no metrics object");
                Ok(Attempt::Partial(ScrapedStats {
                    streamer_name: name,
                    ..Default::default()
                }))
            }
        }
    }
}

#[async_trait]
impl AcquisitionStrategy for PageScriptStrategy {
    fn name(&self) -> &'static str {
        "page-script"
    }

    async fn attempt(&self, ctx: &AttemptContext<'_>) -> Result<Attempt, AcquisitionError> {
        let Some(html) = ctx.page().await else {
            return Ok(Attempt::Miss);
        };
        self.scrape(ctx.stream_key().as_str(), html)
    }
}
