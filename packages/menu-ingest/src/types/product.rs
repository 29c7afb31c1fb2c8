//! Normalized products, identity keys and store records.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::candidate::Provenance;

/// Identity of an auto-imported product within a business.
///
/// Two products with the same key are the same product regardless of any
/// other field. Components are normalized on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityKey {
    pub business_id: String,
    pub source_url: String,
    pub title: String,
}

impl IdentityKey {
    pub fn new(business_id: &str, source_url: &str, title: &str) -> Self {
        Self {
            business_id: business_id.trim().to_string(),
            source_url: source_url.trim().to_lowercase(),
            title: title.trim().to_lowercase(),
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.business_id, self.source_url, self.title)
    }
}

/// A validated, cleaned candidate ready for reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedProduct {
    pub title: String,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub currency: String,
    pub product_url: Option<String>,
    pub image_url: Option<String>,
    pub primary_category: String,
    pub secondary_categories: Vec<String>,
    pub business_id: String,
    pub source_url: String,
    pub provenance: Provenance,

    /// Raw extractor fragment plus provenance, stored for auditing.
    pub snapshot: serde_json::Value,
}

impl NormalizedProduct {
    pub fn key(&self) -> IdentityKey {
        IdentityKey::new(&self.business_id, &self.source_url, &self.title)
    }
}

/// Create/update payload for the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub business_id: String,
    pub title: String,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub currency: String,
    pub image_url: Option<String>,
    pub product_url: Option<String>,
    pub source_url: String,
    pub primary_category: String,
    pub secondary_category_ids: Vec<String>,
    pub auto_imported: bool,
    pub snapshot: serde_json::Value,
}

impl ProductDraft {
    /// Draft for an auto-imported product with resolved category ids.
    pub fn from_product(product: &NormalizedProduct, secondary_category_ids: Vec<String>) -> Self {
        Self {
            business_id: product.business_id.clone(),
            title: product.title.clone(),
            description: product.description.clone(),
            price: product.price,
            currency: product.currency.clone(),
            image_url: product.image_url.clone(),
            product_url: product.product_url.clone(),
            source_url: product.source_url.clone(),
            primary_category: product.primary_category.clone(),
            secondary_category_ids,
            auto_imported: true,
            snapshot: product.snapshot.clone(),
        }
    }

    pub fn key(&self) -> IdentityKey {
        IdentityKey::new(&self.business_id, &self.source_url, &self.title)
    }
}

/// A product as held by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredProduct {
    pub id: String,
    pub business_id: String,
    pub title: String,
    pub source_url: String,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub image_url: Option<String>,
    pub primary_category: Option<String>,
    #[serde(default)]
    pub secondary_category_ids: Vec<String>,
    #[serde(default)]
    pub auto_imported: bool,
    /// Set by humans; the pipeline never modifies or deletes locked items.
    #[serde(default)]
    pub override_lock: bool,
}

impl StoredProduct {
    pub fn key(&self) -> IdentityKey {
        IdentityKey::new(&self.business_id, &self.source_url, &self.title)
    }

    /// Build the stored form of a freshly created draft.
    pub fn from_draft(id: impl Into<String>, draft: &ProductDraft) -> Self {
        Self {
            id: id.into(),
            business_id: draft.business_id.clone(),
            title: draft.title.clone(),
            source_url: draft.source_url.clone(),
            description: draft.description.clone(),
            price: draft.price,
            currency: Some(draft.currency.clone()),
            image_url: draft.image_url.clone(),
            primary_category: Some(draft.primary_category.clone()),
            secondary_category_ids: draft.secondary_category_ids.clone(),
            auto_imported: draft.auto_imported,
            override_lock: false,
        }
    }

    /// Overwrite mutable fields from a draft; identity, lock and
    /// auto-import origin stay.
    pub fn apply(&mut self, draft: &ProductDraft) {
        self.description = draft.description.clone();
        self.price = draft.price;
        self.currency = Some(draft.currency.clone());
        self.image_url = draft.image_url.clone();
        self.primary_category = Some(draft.primary_category.clone());
        self.secondary_category_ids = draft.secondary_category_ids.clone();
    }
}

/// Filter for listing existing products.
///
/// Locked products are always excluded from listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub business_id: String,
    /// Only auto-imported records.
    pub auto_imported_only: bool,
    /// Only records whose source URL starts with this (case-insensitive).
    pub source_url_prefix: Option<String>,
}

impl ProductFilter {
    pub fn auto_imported(business_id: impl Into<String>) -> Self {
        Self {
            business_id: business_id.into(),
            auto_imported_only: true,
            source_url_prefix: None,
        }
    }

    pub fn with_source_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.source_url_prefix = Some(prefix.into());
        self
    }

    /// Whether a stored product passes this filter.
    pub fn matches(&self, product: &StoredProduct) -> bool {
        if product.override_lock || product.business_id != self.business_id {
            return false;
        }
        if self.auto_imported_only && !product.auto_imported {
            return false;
        }
        match &self.source_url_prefix {
            Some(prefix) => product
                .source_url
                .to_lowercase()
                .starts_with(&prefix.to_lowercase()),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_key_normalization() {
        let a = IdentityKey::new("b1", "https://E.com/Menu", "  Pad Thai ");
        let b = IdentityKey::new("b1", "https://e.com/menu", "pad thai");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "b1|https://e.com/menu|pad thai");
    }

    #[test]
    fn test_identity_key_distinguishes_business() {
        let a = IdentityKey::new("b1", "https://e.com", "taco");
        let b = IdentityKey::new("b2", "https://e.com", "taco");
        assert_ne!(a, b);
    }

    #[test]
    fn test_apply_keeps_lock_and_identity() {
        let draft = ProductDraft {
            business_id: "b1".into(),
            title: "Taco".into(),
            description: Some("new".into()),
            price: Some(4.5),
            currency: "USD".into(),
            image_url: None,
            product_url: None,
            source_url: "https://e.com".into(),
            primary_category: "Food".into(),
            secondary_category_ids: vec!["c1".into()],
            auto_imported: true,
            snapshot: serde_json::Value::Null,
        };
        let mut stored = StoredProduct::from_draft("p1", &draft);
        stored.override_lock = true;
        stored.auto_imported = false;

        let mut changed = draft.clone();
        changed.price = Some(5.0);
        stored.apply(&changed);

        assert_eq!(stored.price, Some(5.0));
        assert!(stored.override_lock);
        assert!(!stored.auto_imported);
        assert_eq!(stored.id, "p1");
        assert_eq!(stored.key(), draft.key());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn key_ignores_case_and_padding(
                url in "https://[a-zA-Z]{1,10}\\.com/[a-zA-Z]{0,10}",
                title in "[a-zA-Z][a-zA-Z ]{0,20}[a-zA-Z]",
                pad in " {0,3}",
            ) {
                let plain = IdentityKey::new("b1", &url, &title);
                let noisy = IdentityKey::new(
                    "b1",
                    &url.to_uppercase(),
                    &format!("{}{}{}", pad, title.to_uppercase(), pad),
                );
                prop_assert_eq!(plain, noisy);
            }
        }
    }
}
