use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical identifier of a tracked stream, usually `broadcaster/streamId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamKey(String);

impl StreamKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First path segment of the key, the broadcaster part of `broadcaster/streamId`.
    pub fn broadcaster(&self) -> &str {
        self.0.split('/').next().unwrap_or_default()
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for StreamKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for StreamKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Turns user input (a stream page URL or a bare id) into a [`StreamKey`].
#[derive(Debug, Clone)]
pub struct StreamKeyParser {
    url_regex: Regex,
}

impl StreamKeyParser {
    /// Builds a parser for URLs on `host`, e.g. `jaco.live`.
    pub fn new(host: &str) -> Self {
        let pattern = format!(r"{}/([^/?#\s]+(?:/[^/?#\s]+)?)", regex::escape(host));
        let url_regex = Regex::new(&pattern).expect("escaped host forms a valid pattern");
        Self { url_regex }
    }

    /// Extracts the one or two path segments following the platform host.
    ///
    /// Input that does not look like a platform URL is returned verbatim,
    /// including empty or malformed strings.
    pub fn parse(&self, input: &str) -> StreamKey {
        match self.url_regex.captures(input).and_then(|caps| caps.get(1)) {
            Some(path) => StreamKey::new(path.as_str()),
            None => StreamKey::new(input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://platform.example/alice/stream42", "alice/stream42")]
    #[case("http://www.platform.example/alice/stream42/", "alice/stream42")]
    #[case("platform.example/alice", "alice")]
    #[case("https://platform.example/alice/stream42/extra", "alice/stream42")]
    #[case("https://platform.example/alice/stream42?ref=home", "alice/stream42")]
    #[case("alice/stream42", "alice/stream42")]
    #[case("https://other.example/bob/1", "https://other.example/bob/1")]
    #[case("", "")]
    fn test_parse(#[case] input: &str, #[case] expected: &str) {
        let parser = StreamKeyParser::new("platform.example");
        assert_eq!(parser.parse(input).as_str(), expected);
    }

    #[test]
    fn test_host_is_escaped() {
        let parser = StreamKeyParser::new("jaco.live");
        assert_eq!(parser.parse("jacoxlive/alice").as_str(), "jacoxlive/alice");
        assert_eq!(parser.parse("https://jaco.live/alice/s1").as_str(), "alice/s1");
    }

    #[test]
    fn test_broadcaster() {
        assert_eq!(StreamKey::from("alice/stream42").broadcaster(), "alice");
        assert_eq!(StreamKey::from("alice").broadcaster(), "alice");
        assert_eq!(StreamKey::from("").broadcaster(), "");
    }
}
