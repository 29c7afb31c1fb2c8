//! JSON-LD (schema.org) extractor.
//!
//! Walks every `application/ld+json` block, following list, graph and
//! restaurant-menu containers, and emits one candidate per `Product` or
//! `MenuItem` node (or per `Offer` wrapping one).

use lazy_static::lazy_static;
use scraper::Selector;
use serde_json::Value;
use tracing::debug;

use super::util::{first_of, image_ref, json_string, ld_types, string_field};
use crate::error::ParseError;
use crate::traits::extractor::{Extractor, PageContext};
use crate::types::{Provenance, RawCandidate, RawPrice};

lazy_static! {
    static ref SCRIPT_SELECTOR: Selector = Selector::parse("script").unwrap();
}

const MAX_DEPTH: usize = 32;

const PRODUCT_TYPES: &[&str] = &["product", "menuitem", "individualproduct", "productmodel"];

/// Keys whose values may hold further nodes.
const CONTAINER_KEYS: &[&str] = &[
    "@graph",
    "graph",
    "itemListElement",
    "item",
    "mainEntity",
    "hasMenu",
    "hasMenuSection",
    "hasMenuItem",
    "itemOffered",
];

/// Extractor for embedded structured data.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredDataExtractor;

impl StructuredDataExtractor {
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
                let types = ld_types(node);
                if types.iter().any(|t| PRODUCT_TYPES.contains(&t.as_str())) {
                    out.push(self.candidate(node, None, page));
                    return;
                }

                // An offer wrapping its product, typed or not
                if let Some(offered) = map.get("itemOffered").and_then(first_of) {
                    let is_offer = types.iter().any(|t| t == "offer");
                    let offers_product = ld_types(offered)
                        .iter()
                        .any(|t| PRODUCT_TYPES.contains(&t.as_str()));
                    if offered.is_object() && (is_offer || offers_product) {
                        out.push(self.candidate(offered, Some(node), page));
                        return;
                    }
                }

                for key in CONTAINER_KEYS {
                    if let Some(child) = map.get(*key) {
                        self.walk(child, page, out, depth + 1);
                    }
                }
            }
            _ => {}
        }
    }

    /// Build a candidate from a product node. `offer` is an enclosing
    /// `Offer` when the product was reached through `itemOffered`.
    ///
    /// A product that itself carries `itemOffered` falls back to the
    /// offered item's name, description and offers.
    fn candidate(&self, node: &Value, offer: Option<&Value>, page: &PageContext<'_>) -> RawCandidate {
        let offered = node.get("itemOffered").and_then(first_of).filter(|v| v.is_object());
        let offers = offer
            .or_else(|| node.get("offers").and_then(first_of))
            .or_else(|| offered.and_then(|o| o.get("offers")).and_then(first_of));

        let mut candidate = RawCandidate::new(
            Provenance::Structured,
            page.business_id,
            page.page_url.as_str(),
        )
        .with_raw(node.clone());

        candidate.title = string_field(node, &["name", "title"])
            .or_else(|| offered.and_then(|o| string_field(o, &["name", "title"])));
        candidate.description = string_field(node, &["description"])
            .or_else(|| offered.and_then(|o| string_field(o, &["description"])));
        candidate.price = offer_price(offers).or_else(|| node.get("price").and_then(RawPrice::from_json));
        candidate.currency = offer_currency(offers).or_else(|| string_field(node, &["priceCurrency"]));

        candidate.image_url = node
            .get("image")
            .and_then(image_ref)
            .or_else(|| node.get("photo").and_then(image_ref))
            .and_then(|image| page.absolutize(&image));

        candidate.product_url = string_field(node, &["url"])
            .or_else(|| offers.and_then(|o| string_field(o, &["url"])))
            .and_then(|url| page.absolutize(&url));

        candidate
    }
}

fn offer_price(offers: Option<&Value>) -> Option<RawPrice> {
    let offers = offers?;
    ["price", "lowPrice"]
        .iter()
        .find_map(|key| offers.get(*key).and_then(RawPrice::from_json))
        .or_else(|| {
            offers
                .get("priceSpecification")
                .and_then(first_of)
                .and_then(|spec| spec.get("price"))
                .and_then(RawPrice::from_json)
        })
}

fn offer_currency(offers: Option<&Value>) -> Option<String> {
    let offers = offers?;
    offers
        .get("priceCurrency")
        .and_then(json_string)
        .or_else(|| {
            offers
                .get("priceSpecification")
                .and_then(first_of)
                .and_then(|spec| spec.get("priceCurrency"))
                .and_then(json_string)
        })
}

impl Extractor for StructuredDataExtractor {
    fn name(&self) -> &str {
        "structured"
    }

    fn extract(&self, page: &PageContext<'_>) -> Vec<RawCandidate> {
        let mut out = Vec::new();

        let blocks = page.document.select(&SCRIPT_SELECTOR).filter(|script| {
            script
                .value()
                .attr("type")
                .map(|t| t.trim().eq_ignore_ascii_case("application/ld+json"))
                .unwrap_or(false)
        });

        for (index, script) in blocks.enumerate() {
            let body = script.text().collect::<String>();
            let body = body.trim();
            if body.is_empty() {
                continue;
            }

            match serde_json::from_str::<Value>(body) {
                Ok(value) => self.walk(&value, page, &mut out, 0),
                Err(source) => {
                    let err = ParseError::Json {
                        context: format!("ld+json block {} on {}", index, page.page_url),
                        source,
                    };
                    debug!(error = %err, "Skipping malformed structured data");
                }
            }
        }

        out
    }
}
