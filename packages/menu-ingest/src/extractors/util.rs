//! Shared helpers for extractors: text cleanup, selectors and JSON access.

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::warn;

use crate::error::ParseError;

lazy_static! {
    static ref WS_RE: Regex = Regex::new(r"\s+").unwrap();
    static ref SLUG_STRIP_RE: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
}

/// Collapse runs of whitespace and trim.
pub fn collapse_whitespace(text: &str) -> String {
    WS_RE.replace_all(text, " ").trim().to_string()
}

/// Visible text of an element, whitespace-collapsed. None when empty.
pub fn element_text(element: &ElementRef<'_>) -> Option<String> {
    let text = collapse_whitespace(&element.text().collect::<String>());
    (!text.is_empty()).then_some(text)
}

/// Trimmed attribute value. None when missing or blank.
pub fn element_attr(element: &ElementRef<'_>, attribute: &str) -> Option<String> {
    element
        .value()
        .attr(attribute)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Lowercase, hyphen-separated slug (`"Pad Thai!"` -> `"pad-thai"`).
pub fn slugify(text: &str) -> String {
    SLUG_STRIP_RE
        .replace_all(&text.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

/// Parse a CSS selector, logging and returning None when it is invalid.
pub fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            let err = ParseError::Selector {
                selector: selector.to_string(),
                reason: e.to_string(),
            };
            warn!(error = %err, "Skipping invalid selector");
            None
        }
    }
}

/// Text of the document `<title>`.
pub fn page_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document.select(&selector).next().and_then(|el| element_text(&el))
}

/// `content` of the first `<meta>` whose `property` or `name` matches a key
/// (case-insensitive), trying keys in order.
pub fn meta_content(document: &Html, keys: &[&str]) -> Option<String> {
    let selector = Selector::parse("meta").ok()?;
    keys.iter().find_map(|key| {
        document.select(&selector).find_map(|el| {
            let value = el.value();
            let matches = value
                .attr("property")
                .or_else(|| value.attr("name"))
                .or_else(|| value.attr("itemprop"))
                .map(|name| name.trim().eq_ignore_ascii_case(key))
                .unwrap_or(false);
            if matches {
                element_attr(&el, "content")
            } else {
                None
            }
        })
    })
}

/// Site name from `og:site_name` or `application-name`.
pub fn site_name(document: &Html) -> Option<String> {
    meta_content(document, &["og:site_name", "application-name"]).map(|s| collapse_whitespace(&s))
}

/// Non-empty string form of a JSON scalar.
pub fn json_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = collapse_whitespace(s);
            (!s.is_empty()).then_some(s)
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The object itself, or the first element of an array.
pub fn first_of(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.first(),
        Value::Null => None,
        other => Some(other),
    }
}

/// First key present with a usable string value.
pub fn string_field(object: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| object.get(*key).and_then(first_of).and_then(json_string))
}

/// Image reference from a string, an array, or an `ImageObject`-like map.
pub fn image_ref(value: &Value) -> Option<String> {
    match first_of(value)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        obj @ Value::Object(_) => string_field(obj, &["url", "contentUrl", "src", "href"]),
        _ => None,
    }
}

/// `@type` values of a JSON-LD node, lowercased. Handles `schema:` prefixes.
pub fn ld_types(node: &Value) -> Vec<String> {
    let normalize = |s: &str| {
        let s = s.trim();
        let s = s.rsplit(['/', ':']).next().unwrap_or(s);
        s.to_ascii_lowercase()
    };
    match node.get("@type") {
        Some(Value::String(s)) => vec![normalize(s)],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(normalize).collect(),
        _ => Vec::new(),
    }
}
