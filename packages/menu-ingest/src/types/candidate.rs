//! Raw candidates as produced by the extractors.

use serde::{Deserialize, Serialize};

/// Which extractor produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// JSON-LD / schema.org blocks
    Structured,
    /// Framework hydration or other embedded JSON
    InlineJson,
    /// OpenGraph / twitter / price meta tags
    Meta,
    /// Per-source CSS rules
    RuleBased,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Structured => "structured",
            Provenance::InlineJson => "inline_json",
            Provenance::Meta => "meta",
            Provenance::RuleBased => "rule_based",
        }
    }

    /// Anything other than the meta-tag fallback.
    pub fn is_structured(&self) -> bool {
        !matches!(self, Provenance::Meta)
    }
}

/// A price as found on the page, before coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPrice {
    Number(f64),
    Text(String),
}

impl RawPrice {
    /// Build from an arbitrary JSON value (numbers and strings only).
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_f64().map(RawPrice::Number),
            serde_json::Value::String(s) if !s.trim().is_empty() => {
                Some(RawPrice::Text(s.trim().to_string()))
            }
            _ => None,
        }
    }
}

impl From<f64> for RawPrice {
    fn from(value: f64) -> Self {
        RawPrice::Number(value)
    }
}

impl From<&str> for RawPrice {
    fn from(value: &str) -> Self {
        RawPrice::Text(value.to_string())
    }
}

/// An unvalidated product record from one extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCandidate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<RawPrice>,
    pub currency: Option<String>,
    pub image_url: Option<String>,
    pub product_url: Option<String>,

    /// Page the candidate was found on.
    pub source_url: String,

    pub business_id: String,

    pub provenance: Provenance,

    /// Raw fragment the candidate came from, kept as the source snapshot.
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl RawCandidate {
    /// Create an empty candidate for a page.
    pub fn new(
        provenance: Provenance,
        business_id: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            title: None,
            description: None,
            price: None,
            currency: None,
            image_url: None,
            product_url: None,
            source_url: source_url.into(),
            business_id: business_id.into(),
            provenance,
            raw: serde_json::Value::Null,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_price(mut self, price: impl Into<RawPrice>) -> Self {
        self.price = Some(price.into());
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    pub fn with_product_url(mut self, product_url: impl Into<String>) -> Self {
        self.product_url = Some(product_url.into());
        self
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = raw;
        self
    }
}
