//! Same-key candidate collapsing.

use std::collections::HashMap;

use crate::types::{IdentityKey, NormalizedProduct};

/// How much usable detail a product carries.
pub fn richness(product: &NormalizedProduct) -> u8 {
    let mut score = 0;
    if product.price.is_some() {
        score += 2;
    }
    if product.image_url.is_some() {
        score += 1;
    }
    let distinct_url = product
        .product_url
        .as_deref()
        .map(|url| !url.eq_ignore_ascii_case(&product.source_url))
        .unwrap_or(false);
    if distinct_url {
        score += 1;
    }
    if product.provenance.is_structured() {
        score += 1;
    }
    score
}

/// Keep one product per identity key, preferring the richest.
///
/// Output order follows the first occurrence of each key; ties keep the
/// first-seen product. Returns the survivors and how many were merged away.
pub fn dedupe(products: Vec<NormalizedProduct>) -> (Vec<NormalizedProduct>, usize) {
    let mut index: HashMap<IdentityKey, usize> = HashMap::new();
    let mut kept: Vec<NormalizedProduct> = Vec::with_capacity(products.len());
    let mut merged = 0;

    for product in products {
        let key = product.key();
        match index.get(&key) {
            Some(&slot) => {
                merged += 1;
                if richness(&product) > richness(&kept[slot]) {
                    kept[slot] = product;
                }
            }
            None => {
                index.insert(key, kept.len());
                kept.push(product);
            }
        }
    }

    (kept, merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Provenance;
    use proptest::prelude::*;

    fn product(title: &str, provenance: Provenance) -> NormalizedProduct {
        NormalizedProduct {
            title: title.to_string(),
            description: None,
            price: None,
            currency: "USD".into(),
            product_url: None,
            image_url: None,
            primary_category: "Food".into(),
            secondary_categories: Vec::new(),
            business_id: "b1".into(),
            source_url: "https://e.com/menu".into(),
            provenance,
            snapshot: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_richness_weights() {
        let bare = product("Taco", Provenance::Meta);
        assert_eq!(richness(&bare), 0);

        let mut rich = product("Taco", Provenance::Structured);
        rich.price = Some(3.0);
        rich.image_url = Some("https://e.com/t.jpg".into());
        rich.product_url = Some("https://e.com/taco".into());
        assert_eq!(richness(&rich), 5);

        let mut same_url = product("Taco", Provenance::Meta);
        same_url.product_url = Some("HTTPS://E.COM/MENU".into());
        assert_eq!(richness(&same_url), 0);
    }

    #[test]
    fn test_case_insensitive_collapse_prefers_richer() {
        let bare = product("brisket plate", Provenance::RuleBased);
        let mut rich = product("Brisket Plate", Provenance::Structured);
        rich.price = Some(14.5);

        let (kept, merged) = dedupe(vec![bare, rich.clone(), product("Slaw", Provenance::Structured)]);

        assert_eq!(merged, 1);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0], rich);
        assert_eq!(kept[1].title, "Slaw");
    }

    #[test]
    fn test_tie_keeps_first() {
        let mut first = product("Ribs", Provenance::Structured);
        first.description = Some("first".into());
        let mut second = product("RIBS", Provenance::InlineJson);
        second.description = Some("second".into());

        let (kept, _) = dedupe(vec![first, second]);
        assert_eq!(kept[0].description.as_deref(), Some("first"));
    }

    proptest! {
        #[test]
        fn richer_candidate_always_retained(rich_first in any::<bool>(), title in "[a-z]{3,10}") {
            let bare = product(&title, Provenance::Meta);
            let mut rich = product(&title.to_uppercase(), Provenance::Meta);
            rich.price = Some(9.0);
            rich.image_url = Some("https://e.com/i.jpg".into());

            let input = if rich_first {
                vec![rich.clone(), bare]
            } else {
                vec![bare, rich.clone()]
            };
            let (kept, merged) = dedupe(input);

            prop_assert_eq!(merged, 1);
            prop_assert_eq!(kept.len(), 1);
            prop_assert_eq!(&kept[0], &rich);
        }
    }
}
