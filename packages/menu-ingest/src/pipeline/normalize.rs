//! Normalization and classification.
//!
//! Turns a validated [`RawCandidate`] into a [`NormalizedProduct`]: numeric
//! price, currency code, trimmed text, absolute URLs, and categories.

use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;

use crate::config::IngestConfig;
use crate::types::{NormalizedProduct, RawCandidate, RawPrice};

lazy_static! {
    static ref NUMBER_RE: Regex = Regex::new(r"\d+(?:[.,]\d+)*").unwrap();

    /// Secondary categories, tested against title + description.
    static ref SECONDARY_CATEGORIES: Vec<(&'static str, Regex)> = vec![
        ("BBQ", Regex::new(r"(?i)(\bbbq\b|barbecue|smoked|brisket|ribs)").unwrap()),
        ("Tacos", Regex::new(r"(?i)(\btaco|al\s*pastor|carnitas|asada|barbacoa)").unwrap()),
        ("Sushi", Regex::new(r"(?i)(maki|nigiri|sashimi|temaki|uramaki|chirashi)").unwrap()),
        ("Asian", Regex::new(r"(?i)(ramen|pho|lo\s*mein|pad\s*thai|dumpling|bibimbap|teriyaki)").unwrap()),
        ("Ribs", Regex::new(r"(?i)\bribs?\b").unwrap()),
    ];
}

/// Coerce a raw price to a number.
///
/// Text prices take the first numeric token, so `"$1,299.00"`, `"from 12,50 €"`
/// and `"14.5 USD"` all parse. Unparsable input is `None`, never zero.
pub fn coerce_price(raw: &RawPrice) -> Option<f64> {
    match raw {
        RawPrice::Number(n) if n.is_finite() => Some(*n),
        RawPrice::Number(_) => None,
        RawPrice::Text(text) => {
            let token = NUMBER_RE.find(text)?.as_str();
            parse_number_token(token)
        }
    }
}

/// Parse a token of digits with `.`/`,` separators.
fn parse_number_token(token: &str) -> Option<f64> {
    let last_dot = token.rfind('.');
    let last_comma = token.rfind(',');

    let cleaned = match (last_dot, last_comma) {
        // Both present: whichever comes last is the decimal separator
        (Some(dot), Some(comma)) if dot > comma => token.replace(',', ""),
        (Some(_), Some(_)) => token.replace('.', "").replace(',', "."),
        (None, Some(_)) => {
            let groups: Vec<&str> = token.split(',').collect();
            let thousands = groups.len() > 2
                || groups.last().map(|g| g.len() == 3).unwrap_or(false);
            if thousands {
                token.replace(',', "")
            } else {
                token.replace(',', ".")
            }
        }
        (Some(_), None) if token.matches('.').count() > 1 => token.replace('.', ""),
        _ => token.to_string(),
    };

    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Map a currency string or symbol to an ISO code.
fn normalize_currency(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.len() == 3 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        return Some(trimmed.to_ascii_uppercase());
    }
    match trimmed {
        "$" | "US$" => Some("USD".to_string()),
        "€" => Some("EUR".to_string()),
        "£" => Some("GBP".to_string()),
        "¥" => Some("JPY".to_string()),
        "C$" | "CA$" => Some("CAD".to_string()),
        _ => None,
    }
}

/// Secondary category names matching the text, in table order.
pub fn classify(title: &str, description: Option<&str>) -> Vec<String> {
    let text = match description {
        Some(d) => format!("{} {}", title, d),
        None => title.to_string(),
    };
    SECONDARY_CATEGORIES
        .iter()
        .filter(|(_, pattern)| pattern.is_match(&text))
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Normalizer carrying the run's defaults.
#[derive(Debug, Clone)]
pub struct Normalizer {
    default_currency: String,
    default_primary_category: String,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::from_config(&IngestConfig::default())
    }
}

impl Normalizer {
    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            default_currency: config.default_currency.clone(),
            default_primary_category: config.default_primary_category.clone(),
        }
    }

    /// Normalize a validated candidate. `None` only if it has no title.
    pub fn normalize(
        &self,
        candidate: RawCandidate,
        business_category: Option<&str>,
    ) -> Option<NormalizedProduct> {
        let title = candidate
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())?
            .to_string();

        let description = candidate
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        let price = candidate.price.as_ref().and_then(coerce_price);
        let currency = candidate
            .currency
            .as_deref()
            .and_then(normalize_currency)
            .unwrap_or_else(|| self.default_currency.clone());

        let primary_category = business_category
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(self.default_primary_category.as_str())
            .to_string();
        let secondary_categories = classify(&title, description.as_deref());

        let snapshot = json!({
            "provenance": candidate.provenance.as_str(),
            "extractedAt": Utc::now().to_rfc3339(),
            "raw": candidate.raw,
        });

        Some(NormalizedProduct {
            title,
            description,
            price,
            currency,
            product_url: candidate.product_url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty()),
            image_url: candidate.image_url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty()),
            primary_category,
            secondary_categories,
            business_id: candidate.business_id,
            source_url: candidate.source_url,
            provenance: candidate.provenance,
            snapshot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Provenance;

    #[test]
    fn test_coerce_price_text_forms() {
        let cases = [
            ("14.5", Some(14.5)),
            ("$13.50", Some(13.5)),
            ("$1,299.00", Some(1299.0)),
            ("1.299,00 €", Some(1299.0)),
            ("12,50", Some(12.5)),
            ("1,250", Some(1250.0)),
            ("from 9 USD", Some(9.0)),
            ("market price", None),
            ("", None),
        ];
        for (input, expected) in cases {
            assert_eq!(coerce_price(&RawPrice::Text(input.into())), expected, "{}", input);
        }
    }

    #[test]
    fn test_coerce_price_numbers() {
        assert_eq!(coerce_price(&RawPrice::Number(14.5)), Some(14.5));
        assert_eq!(coerce_price(&RawPrice::Number(f64::NAN)), None);
        assert_eq!(coerce_price(&RawPrice::Number(0.0)), Some(0.0));
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("Brisket Plate", None), vec!["BBQ"]);
        assert_eq!(classify("Baby Back Ribs", Some("smoked")), vec!["BBQ", "Ribs"]);
        assert_eq!(classify("Al Pastor Taco", None), vec!["Tacos"]);
        assert_eq!(classify("Salmon Nigiri", None), vec!["Sushi"]);
        assert_eq!(classify("Pad  Thai", Some("with dumpling")), vec!["Asian"]);
        assert!(classify("Garden Salad", Some("fresh greens")).is_empty());
    }

    #[test]
    fn test_normalize_defaults() {
        let candidate = RawCandidate::new(Provenance::Structured, "b1", "https://e.com/menu")
            .with_title("  Brisket Plate ")
            .with_description("  Half pound  ")
            .with_price(14.5);

        let product = Normalizer::default().normalize(candidate, None).unwrap();

        assert_eq!(product.title, "Brisket Plate");
        assert_eq!(product.description.as_deref(), Some("Half pound"));
        assert_eq!(product.price, Some(14.5));
        assert_eq!(product.currency, "USD");
        assert_eq!(product.primary_category, "Food");
        assert_eq!(product.secondary_categories, vec!["BBQ"]);
        assert_eq!(product.snapshot["provenance"], "structured");
    }

    #[test]
    fn test_normalize_currency_and_business_category() {
        let candidate = RawCandidate::new(Provenance::RuleBased, "b1", "https://e.com")
            .with_title("Nigiri")
            .with_price("abc")
            .with_currency(" eur ");

        let product = Normalizer::default()
            .normalize(candidate, Some("Restaurant"))
            .unwrap();

        assert_eq!(product.price, None);
        assert_eq!(product.currency, "EUR");
        assert_eq!(product.primary_category, "Restaurant");
    }

    #[test]
    fn test_normalize_requires_title() {
        let candidate = RawCandidate::new(Provenance::Structured, "b1", "https://e.com");
        assert!(Normalizer::default().normalize(candidate, None).is_none());
    }
}
