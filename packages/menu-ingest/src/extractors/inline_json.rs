//! Inline-script JSON extractor.
//!
//! Client-rendered menus usually ship their data in a hydration blob
//! (`window.__NEXT_DATA__ = {...}`) or a bare JSON script. The blob is
//! parsed and walked depth-first; any object with a name-like and a
//! price-like field becomes a candidate.

use lazy_static::lazy_static;
use regex::Regex;
use scraper::Selector;
use serde_json::{Map, Value};
use tracing::debug;

use super::util::{image_ref, json_string, string_field};
use crate::error::ParseError;
use crate::traits::extractor::{Extractor, PageContext};
use crate::types::{Provenance, RawCandidate, RawPrice};

lazy_static! {
    static ref SCRIPT_SELECTOR: Selector = Selector::parse("script").unwrap();
    static ref HYDRATION_RE: Regex = Regex::new(
        r"(?:window\.|self\.|globalThis\.)?(__NEXT_DATA__|__NUXT__|__INITIAL_STATE__|__PRELOADED_STATE__|__APOLLO_STATE__|__INITIAL_DATA__|__remixContext|initialState)\s*=\s*"
    )
    .unwrap();
    static ref NUMERIC_RE: Regex = Regex::new(r"\d").unwrap();
}

const MAX_DEPTH: usize = 64;

const NAME_KEYS: &[&str] = &["name", "title", "productName", "itemName", "displayName"];
const PRICE_HINTS: &[&str] = &["price", "amount", "cost"];

/// Extractor for JSON embedded in inline scripts.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineJsonExtractor;

impl InlineJsonExtractor {
    pub fn new() -> Self {
        Self
    }

    fn walk(&self, node: &Value, page: &PageContext<'_>, out: &mut Vec<RawCandidate>, depth: usize) {
        if depth > MAX_DEPTH {
            return;
        }
        match node {
            Value::Array(items) => {
                for item in items {
                    self.walk(item, page, out, depth + 1);
                }
            }
            Value::Object(map) => {
                if let Some(candidate) = self.candidate(node, map, page) {
                    out.push(candidate);
                    return;
                }
                for child in map.values() {
                    self.walk(child, page, out, depth + 1);
                }
            }
            _ => {}
        }
    }

    fn candidate(
        &self,
        node: &Value,
        map: &Map<String, Value>,
        page: &PageContext<'_>,
    ) -> Option<RawCandidate> {
        let title = NAME_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .filter(|t| !t.is_empty())?;
        let price = find_price(map)?;

        let mut candidate =
            RawCandidate::new(Provenance::InlineJson, page.business_id, page.page_url.as_str())
                .with_title(title)
                .with_price(price)
                .with_raw(node.clone());

        candidate.description = string_field(node, &["description", "desc", "summary"]);
        candidate.currency = string_field(node, &["currency", "currencyCode", "priceCurrency"])
            .or_else(|| {
                map.get("price")
                    .and_then(|p| string_field(p, &["currency", "currencyCode"]))
            });
        candidate.image_url = ["image", "imageUrl", "image_url", "photo", "thumbnail", "img"]
            .iter()
            .find_map(|key| map.get(*key).and_then(image_ref))
            .and_then(|image| page.absolutize(&image));
        candidate.product_url = string_field(node, &["url", "href", "link"])
            .and_then(|url| page.absolutize(&url));

        Some(candidate)
    }

    /// JSON payloads carried by one script body.
    fn payloads(&self, body: &str, context: &str) -> Vec<Value> {
        let mut values = Vec::new();

        for m in HYDRATION_RE.find_iter(body) {
            match parse_prefix(&body[m.end()..]) {
                Ok(value) => values.push(value),
                Err(source) => {
                    let err = ParseError::Json {
                        context: format!("hydration state in {}", context),
                        source,
                    };
                    debug!(error = %err, "Skipping unparsable hydration state");
                }
            }
        }

        if values.is_empty() && (body.starts_with('{') || body.starts_with('[')) {
            match serde_json::from_str::<Value>(body) {
                Ok(value) => values.push(value),
                Err(source) => {
                    let err = ParseError::Json {
                        context: format!("inline script in {}", context),
                        source,
                    };
                    debug!(error = %err, "Skipping unparsable inline JSON");
                }
            }
        }

        values
    }
}

/// Parse the first JSON value at the start of `text`, ignoring the rest.
fn parse_prefix(text: &str) -> Result<Value, serde_json::Error> {
    let mut stream = serde_json::Deserializer::from_str(text.trim_start()).into_iter::<Value>();
    match stream.next() {
        Some(result) => result,
        None => serde_json::from_str(""),
    }
}

/// A price from one of the object's price-like fields.
fn find_price(map: &Map<String, Value>) -> Option<RawPrice> {
    if let Some(price) = map.get("price").and_then(price_value) {
        return Some(price);
    }
    map.iter().find_map(|(key, value)| {
        let lower = key.to_ascii_lowercase();
        if !PRICE_HINTS.iter().any(|hint| lower.contains(hint)) {
            return None;
        }
        let price = price_value(value)?;
        match (lower.ends_with("cents"), price) {
            (true, RawPrice::Number(n)) => Some(RawPrice::Number(n / 100.0)),
            (_, price) => Some(price),
        }
    })
}

fn price_value(value: &Value) -> Option<RawPrice> {
    match value {
        Value::Number(n) => n.as_f64().map(RawPrice::Number),
        Value::String(s) if NUMERIC_RE.is_match(s) => Some(RawPrice::Text(s.trim().to_string())),
        Value::Object(inner) => ["amount", "value", "price"]
            .iter()
            .find_map(|key| inner.get(*key))
            .and_then(|v| match v {
                Value::Number(n) => n.as_f64().map(RawPrice::Number),
                other => json_string(other)
                    .filter(|s| NUMERIC_RE.is_match(s))
                    .map(RawPrice::Text),
            }),
        _ => None,
    }
}

impl Extractor for InlineJsonExtractor {
    fn name(&self) -> &str {
        "inline_json"
    }

    fn extract(&self, page: &PageContext<'_>) -> Vec<RawCandidate> {
        let mut out = Vec::new();

        for script in page.document.select(&SCRIPT_SELECTOR) {
            let value = script.value();
            if value.attr("src").is_some() {
                continue;
            }
            let is_ld = value
                .attr("type")
                .map(|t| t.trim().eq_ignore_ascii_case("application/ld+json"))
                .unwrap_or(false);
            if is_ld {
                continue;
            }

            let body = script.text().collect::<String>();
            let body = body.trim();
            if body.is_empty() {
                continue;
            }

            for payload in self.payloads(body, page.page_url.as_str()) {
                self.walk(&payload, page, &mut out, 0);
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;
    use url::Url;

    fn extract(html: &str) -> Vec<RawCandidate> {
        let document = Html::parse_document(html);
        let url = Url::parse("https://noodles.example.com/").unwrap();
        let page = PageContext::new(&document, &url, "biz-2");
        InlineJsonExtractor.extract(&page)
    }

    #[test]
    fn test_hydration_assignment_with_trailing_code() {
        let out = extract(
            r#"<script>window.__INITIAL_STATE__ = {"menu":{"items":[
                {"id":1,"name":"Tonkotsu Ramen","price":"$13.50","image":"/r.jpg"},
                {"id":2,"label":"no name here","price":2}
            ]}}; window.analytics = true;</script>"#,
        );

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title.as_deref(), Some("Tonkotsu Ramen"));
        assert_eq!(out[0].price, Some(RawPrice::Text("$13.50".into())));
        assert_eq!(out[0].image_url.as_deref(), Some("https://noodles.example.com/r.jpg"));
        assert_eq!(out[0].provenance, Provenance::InlineJson);
    }

    #[test]
    fn test_next_data_json_script() {
        let out = extract(
            r#"<script id="__NEXT_DATA__" type="application/json">
            {"props":{"pageProps":{"products":[
                {"productName":"Pad Thai","priceCents":1250,"currencyCode":"USD"},
                {"title":"Dumplings","unitAmount":{"amount":8}}
            ]}}}</script>"#,
        );

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].title.as_deref(), Some("Pad Thai"));
        assert_eq!(out[0].price, Some(RawPrice::Number(12.5)));
        assert_eq!(out[0].currency.as_deref(), Some("USD"));
        assert_eq!(out[1].price, Some(RawPrice::Number(8.0)));
    }

    #[test]
    fn test_does_not_descend_into_candidates() {
        let out = extract(
            r#"<script>[{"name":"Combo","price":20,"parts":[{"name":"Side","price":3}]}]</script>"#,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title.as_deref(), Some("Combo"));
    }

    #[test]
    fn test_skips_code_and_ld_json() {
        let out = extract(
            r#"<script>console.log("price", 3)</script>
            <script type="application/ld+json">{"name":"X","price":1}</script>
            <script src="/app.js"></script>
            <script>window.__NUXT__=(function(a){return {}}(1));</script>"#,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_price_string_needs_digits() {
        let out = extract(r#"<script>{"name":"Market Fish","price":"market price"}</script>"#);
        assert!(out.is_empty());
    }
}
