use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::sync::LazyLock;

static TITLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());

/// Separators between the streamer name and the site name in a page title.
const TITLE_SEPARATORS: &[&str] = &[" - ", " – ", " — ", " | "];

#[inline]
pub fn capture_group_1<'a>(re: &Regex, input: &'a str) -> Option<&'a str> {
    re.captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Parses a displayed counter by discarding every non-digit character.
///
/// `"1,234 likes"` becomes `1234`; text without digits yields `None`.
pub fn parse_count(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Reads a counter from a JSON value: numbers are floored with negatives
/// clamped to zero, strings go through [`parse_count`].
pub fn json_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))
            .or(Some(0)),
        Value::String(s) => parse_count(s),
        _ => None,
    }
}

/// Upper-cases the first character, leaving the rest untouched.
pub fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Decodes the handful of HTML entities that show up in names and titles.
pub fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Streamer name taken from a `<title>` such as `Alice - Jaco Live`.
///
/// Titles without a recognised separator are ignored.
pub fn title_streamer_name(html: &str) -> Option<String> {
    let title = decode_entities(capture_group_1(&TITLE_REGEX, html)?.trim());
    TITLE_SEPARATORS
        .iter()
        .filter_map(|sep| title.split_once(sep))
        .map(|(name, _)| name.trim())
        .min_by_key(|name| name.len())
        .filter(|name| !name.is_empty())
        .map(ToOwned::to_owned)
}

/// Returns the JSON object starting at the first `{` of `input`, matched by
/// balancing braces outside of string literals.
pub fn balanced_json_object(input: &str) -> Option<&str> {
    let start = input.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in input[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&input[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn is_identifier_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

/// Rewrites bare JavaScript `undefined` tokens to JSON `null`.
///
/// String literals and longer identifiers such as `undefinedValue` are left alone.
pub fn undefined_to_null(input: &str) -> Cow<'_, str> {
    const TOKEN: &str = "undefined";
    if !input.contains(TOKEN) {
        return Cow::Borrowed(input);
    }

    let mut output = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut prev: Option<char> = None;
    let mut chars = input.char_indices();

    while let Some((offset, ch)) = chars.next() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
        } else if ch == '"' {
            in_string = true;
        } else if input[offset..].starts_with(TOKEN)
            && !prev.is_some_and(is_identifier_char)
            && !input[offset + TOKEN.len()..]
                .chars()
                .next()
                .is_some_and(is_identifier_char)
        {
            output.push_str("null");
            // The token is ASCII, so one char per byte.
            for _ in 1..TOKEN.len() {
                chars.next();
            }
            prev = Some('d');
            continue;
        }
        output.push(ch);
        prev = Some(ch);
    }
    Cow::Owned(output)
}
