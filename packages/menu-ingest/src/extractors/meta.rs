//! Meta-tag fallback extractor.
//!
//! Treats the whole page as one product using OpenGraph / Twitter card
//! tags. Its output is weak evidence and the validator only keeps it when
//! the page also carries a price.

use lazy_static::lazy_static;
use scraper::Selector;
use serde_json::json;

use super::util::{collapse_whitespace, element_attr, meta_content, page_title};
use crate::traits::extractor::{Extractor, PageContext};
use crate::types::{Provenance, RawCandidate, RawPrice};

lazy_static! {
    static ref CANONICAL_SELECTOR: Selector = Selector::parse(r#"link[rel="canonical"]"#).unwrap();
}

/// Extractor for page-level meta tags.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetaExtractor;

impl MetaExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for MetaExtractor {
    fn name(&self) -> &str {
        "meta"
    }

    fn extract(&self, page: &PageContext<'_>) -> Vec<RawCandidate> {
        let document = page.document;

        let title = meta_content(document, &["og:title", "twitter:title"])
            .map(|t| collapse_whitespace(&t))
            .or_else(|| page_title(document));
        let Some(title) = title else {
            return Vec::new();
        };

        let description = meta_content(document, &["og:description", "twitter:description", "description"])
            .map(|d| collapse_whitespace(&d));
        let image = meta_content(document, &["og:image", "og:image:url", "og:image:secure_url", "twitter:image"]);
        let price = meta_content(document, &["product:price:amount", "og:price:amount"]);
        let currency = meta_content(document, &["product:price:currency", "og:price:currency"]);
        let url = meta_content(document, &["og:url"]).or_else(|| {
            document
                .select(&CANONICAL_SELECTOR)
                .next()
                .and_then(|el| element_attr(&el, "href"))
        });

        let raw = json!({
            "title": title,
            "description": description,
            "image": image,
            "price": price,
            "currency": currency,
            "url": url,
        });

        let mut candidate = RawCandidate::new(Provenance::Meta, page.business_id, page.page_url.as_str())
            .with_title(title)
            .with_raw(raw);
        candidate.description = description;
        candidate.price = price.map(RawPrice::Text);
        candidate.currency = currency;
        candidate.image_url = image.and_then(|i| page.absolutize(&i));
        candidate.product_url = url.and_then(|u| page.absolutize(&u));

        vec![candidate]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;
    use url::Url;

    fn extract(html: &str) -> Vec<RawCandidate> {
        let document = Html::parse_document(html);
        let url = Url::parse("https://shop.example.com/p/rub").unwrap();
        let page = PageContext::new(&document, &url, "biz-3");
        MetaExtractor.extract(&page)
    }

    #[test]
    fn test_og_product_page() {
        let out = extract(
            r#"<head><title>Dry Rub | Smokehouse</title>
            <meta property="og:title" content="Dry Rub">
            <meta property="og:description" content="Sweet and smoky.">
            <meta property="og:image" content="/img/rub.png">
            <meta property="product:price:amount" content="8.00">
            <meta property="product:price:currency" content="USD">
            <link rel="canonical" href="https://shop.example.com/p/rub?ref=x">
            </head>"#,
        );

        assert_eq!(out.len(), 1);
        let c = &out[0];
        assert_eq!(c.title.as_deref(), Some("Dry Rub"));
        assert_eq!(c.description.as_deref(), Some("Sweet and smoky."));
        assert_eq!(c.price, Some(RawPrice::Text("8.00".into())));
        assert_eq!(c.currency.as_deref(), Some("USD"));
        assert_eq!(c.image_url.as_deref(), Some("https://shop.example.com/img/rub.png"));
        assert_eq!(c.product_url.as_deref(), Some("https://shop.example.com/p/rub?ref=x"));
        assert_eq!(c.provenance, Provenance::Meta);
    }

    #[test]
    fn test_title_fallback_without_price() {
        let out = extract("<head><title>  Joe's   BBQ </title></head>");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title.as_deref(), Some("Joe's BBQ"));
        assert!(out[0].price.is_none());
    }

    #[test]
    fn test_no_title_no_candidate() {
        assert!(extract("<body><p>hello</p></body>").is_empty());
    }
}
