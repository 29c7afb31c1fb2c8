//! CSS rule-driven extractor.
//!
//! One candidate per node matched by the rule set's list selector, with
//! fields read through `selector` / `selector@attribute` rules relative to
//! that node.

use scraper::{ElementRef, Selector};
use serde_json::json;
use tracing::debug;

use super::util::{element_attr, element_text, parse_selector, slugify};
use crate::traits::extractor::{Extractor, PageContext};
use crate::types::{FieldSelector, Provenance, RawCandidate, RawPrice, RuleSet};

/// Extractor driven by a source's CSS rule set.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedExtractor;

/// A field rule with its selector compiled.
struct CompiledField {
    selector: Selector,
    attribute: Option<String>,
}

impl CompiledField {
    fn compile(field: Option<&FieldSelector>, default_attribute: Option<&str>) -> Option<Self> {
        let field = field?;
        let selector = parse_selector(&field.selector)?;
        Some(Self {
            selector,
            attribute: field
                .attribute
                .clone()
                .or_else(|| default_attribute.map(str::to_string)),
        })
    }

    /// Read the field from the first match under `node`.
    fn read(&self, node: &ElementRef<'_>) -> Option<String> {
        let element = node.select(&self.selector).next()?;
        match &self.attribute {
            Some(attribute) => element_attr(&element, attribute),
            None => element_text(&element),
        }
    }
}

/// The compiled rule set for one page.
struct CompiledRules {
    list: Selector,
    title: Option<CompiledField>,
    description: Option<CompiledField>,
    price: Option<CompiledField>,
    image: Option<CompiledField>,
    currency: Option<CompiledField>,
    currency_literal: Option<String>,
}

impl CompiledRules {
    fn compile(rules: &RuleSet) -> Option<Self> {
        let list = parse_selector(rules.list.as_deref()?.trim())?;
        let currency_literal = rules
            .currency
            .as_ref()
            .and_then(FieldSelector::as_currency_literal)
            .map(str::to_string);
        let currency = match currency_literal {
            Some(_) => None,
            None => CompiledField::compile(rules.currency.as_ref(), None),
        };

        Some(Self {
            list,
            title: CompiledField::compile(rules.title.as_ref(), None),
            description: CompiledField::compile(rules.description.as_ref(), None),
            price: CompiledField::compile(rules.price.as_ref(), None),
            image: CompiledField::compile(rules.image.as_ref(), Some("src")),
            currency,
            currency_literal,
        })
    }
}

fn read(field: &Option<CompiledField>, node: &ElementRef<'_>) -> Option<String> {
    field.as_ref().and_then(|f| f.read(node))
}

fn usable_href(href: &str) -> bool {
    let href = href.trim();
    !href.is_empty() && href != "#" && !href.to_ascii_lowercase().starts_with("javascript:")
}

impl RuleBasedExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Outbound link for a matched node.
    ///
    /// In order: first usable anchor in (or being) the node; the node's or
    /// nearest ancestor's `id` as a fragment; a title slug when the page has
    /// a matching anchor target; the page URL itself.
    fn resolve_link(&self, node: &ElementRef<'_>, title: Option<&str>, page: &PageContext<'_>) -> String {
        let own_href = (node.value().name() == "a")
            .then(|| node.value().attr("href"))
            .flatten()
            .filter(|h| usable_href(h));
        let anchor_href = own_href.or_else(|| {
            let anchors = Selector::parse("a[href]").ok()?;
            node.select(&anchors)
                .filter_map(|a| a.value().attr("href"))
                .find(|h| usable_href(h))
        });
        if let Some(url) = anchor_href.and_then(|h| page.absolutize(h)) {
            return url;
        }

        let id = std::iter::once(*node)
            .chain(node.ancestors().filter_map(ElementRef::wrap))
            .find_map(|el| element_attr(&el, "id"));
        if let Some(id) = id {
            return self.with_fragment(page, &id);
        }

        if let Some(slug) = title.map(slugify).filter(|s| !s.is_empty()) {
            let target = format!(r#"[id="{0}"], a[name="{0}"]"#, slug);
            let exists = Selector::parse(&target)
                .map(|sel| page.document.select(&sel).next().is_some())
                .unwrap_or(false);
            if exists {
                return self.with_fragment(page, &slug);
            }
        }

        page.page_url.to_string()
    }

    fn with_fragment(&self, page: &PageContext<'_>, fragment: &str) -> String {
        let mut url = page.page_url.clone();
        url.set_fragment(Some(fragment));
        url.to_string()
    }
}

impl Extractor for RuleBasedExtractor {
    fn name(&self) -> &str {
        "rule_based"
    }

    fn extract(&self, page: &PageContext<'_>) -> Vec<RawCandidate> {
        let Some(rules) = page.rules else {
            return Vec::new();
        };
        let Some(compiled) = CompiledRules::compile(rules) else {
            debug!(url = %page.page_url, "Rule set has no usable list selector");
            return Vec::new();
        };

        let mut out = Vec::new();
        for node in page.document.select(&compiled.list) {
            let title = read(&compiled.title, &node);
            let description = read(&compiled.description, &node);
            let price = read(&compiled.price, &node);
            let image = read(&compiled.image, &node);
            let currency = compiled
                .currency_literal
                .clone()
                .or_else(|| read(&compiled.currency, &node));
            let link = self.resolve_link(&node, title.as_deref(), page);

            let raw = json!({
                "title": title,
                "description": description,
                "price": price,
                "image": image,
                "currency": currency,
                "link": link,
            });

            let mut candidate =
                RawCandidate::new(Provenance::RuleBased, page.business_id, page.page_url.as_str())
                    .with_product_url(link)
                    .with_raw(raw);
            candidate.title = title;
            candidate.description = description;
            candidate.price = price.map(RawPrice::Text);
            candidate.image_url = image.and_then(|i| page.absolutize(&i));
            candidate.currency = currency;
            out.push(candidate);
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;
    use url::Url;

    fn extract(html: &str, rules: &RuleSet) -> Vec<RawCandidate> {
        let document = Html::parse_document(html);
        let url = Url::parse("https://tacos.example.com/menu").unwrap();
        let page = PageContext::new(&document, &url, "biz-4").with_rules(Some(rules));
        RuleBasedExtractor.extract(&page)
    }

    #[test]
    fn test_fields_and_attributes() {
        let rules = RuleSet::for_list(".item")
            .with_title(".name")
            .with_description(".desc")
            .with_price(".price@data-amount")
            .with_image("img")
            .with_currency("MXN");

        let out = extract(
            r#"<div class="item"><a href="/tacos/pastor"><span class="name">Al  Pastor</span></a>
               <p class="desc"> Pork, pineapple </p>
               <span class="price" data-amount="3.50">$3.50</span>
               <img src="/img/pastor.jpg"></div>"#,
            &rules,
        );

        assert_eq!(out.len(), 1);
        let c = &out[0];
        assert_eq!(c.title.as_deref(), Some("Al Pastor"));
        assert_eq!(c.description.as_deref(), Some("Pork, pineapple"));
        assert_eq!(c.price, Some(RawPrice::Text("3.50".into())));
        assert_eq!(c.image_url.as_deref(), Some("https://tacos.example.com/img/pastor.jpg"));
        assert_eq!(c.currency.as_deref(), Some("MXN"));
        assert_eq!(c.product_url.as_deref(), Some("https://tacos.example.com/tacos/pastor"));
        assert_eq!(c.provenance, Provenance::RuleBased);
    }

    #[test]
    fn test_missing_title_still_emitted() {
        let rules = RuleSet::for_list(".item").with_title(".name").with_price(".price");
        let out = extract(
            r#"<div class="item"><span class="name">Carnitas</span><span class="price">$4</span></div>
               <div class="item"><span class="price">$5</span></div>"#,
            &rules,
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].title.as_deref(), Some("Carnitas"));
        assert_eq!(out[1].title, None);
    }

    #[test]
    fn test_link_resolution_order() {
        let rules = RuleSet::for_list(".item").with_title(".name");
        let out = extract(
            r##"<section id="tacos">
                 <div class="item"><a href="javascript:void(0)">x</a><a href="#">y</a><span class="name">Asada</span></div>
               </section>
               <div class="item" id="birria-card"><span class="name">Birria</span></div>
               <div class="item"><span class="name">Lengua Taco</span></div>
               <h3 id="lengua-taco">Lengua</h3>
               <div class="item"><span class="name">Tripa</span></div>"##,
            &rules,
        );

        let links: Vec<_> = out.iter().filter_map(|c| c.product_url.as_deref()).collect();
        assert_eq!(
            links,
            vec![
                "https://tacos.example.com/menu#tacos",
                "https://tacos.example.com/menu#birria-card",
                "https://tacos.example.com/menu#lengua-taco",
                "https://tacos.example.com/menu",
            ]
        );
    }

    #[test]
    fn test_invalid_selector_yields_nothing() {
        let rules = RuleSet::for_list("div[");
        assert!(extract("<div class=item></div>", &rules).is_empty());
    }

    #[test]
    fn test_no_rules_no_candidates() {
        let document = Html::parse_document("<div class=item></div>");
        let url = Url::parse("https://tacos.example.com/").unwrap();
        let page = PageContext::new(&document, &url, "biz-4");
        assert!(RuleBasedExtractor.extract(&page).is_empty());
    }
}
