//! Source registry entries and their extraction rules.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use url::Url;

use crate::error::FetchError;

/// How a source's pages are mined for products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMode {
    /// Structured data (JSON-LD) plus the meta-tag fallback.
    #[serde(alias = "structured", alias = "jsonld")]
    StructuredOnly,

    /// Structured data, inline hydration JSON and the meta-tag fallback.
    #[default]
    Heuristic,

    /// Everything in `Heuristic` plus the CSS rule set.
    #[serde(alias = "rules_css", alias = "rules")]
    RuleBased,
}

impl ExtractionMode {
    /// Parse the mode strings used by the store (lenient on spelling).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "structured-only" | "structured" | "jsonld" | "json-ld" => Some(Self::StructuredOnly),
            "heuristic" | "auto" => Some(Self::Heuristic),
            "rule-based" | "rules-css" | "rules" | "css" => Some(Self::RuleBased),
            _ => None,
        }
    }
}

/// Ingest status; only `Active` sources are processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    #[default]
    Active,
    Paused,
    Error,
}

impl IngestStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// A CSS selector with an optional attribute to read instead of text.
///
/// Written in rule sets as `selector` or `selector@attribute`
/// (e.g. `img.hero@src`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FieldSelector {
    pub selector: String,
    pub attribute: Option<String>,
}

impl FieldSelector {
    /// Selector that reads element text.
    pub fn text(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            attribute: None,
        }
    }

    /// Selector that reads an attribute.
    pub fn attr(selector: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            attribute: Some(attribute.into()),
        }
    }

    /// Parse `selector@attribute` notation. The last `@` wins.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.rsplit_once('@') {
            Some((selector, attribute)) if !attribute.trim().is_empty() => Self {
                selector: selector.trim().to_string(),
                attribute: Some(attribute.trim().to_string()),
            },
            Some((selector, _)) => Self::text(selector.trim()),
            None => Self::text(raw),
        }
    }

    /// True for a bare three-letter currency code like `USD` used as a literal.
    pub fn as_currency_literal(&self) -> Option<&str> {
        let s = self.selector.as_str();
        (self.attribute.is_none() && s.len() == 3 && s.chars().all(|c| c.is_ascii_uppercase()))
            .then_some(s)
    }
}

impl From<String> for FieldSelector {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<FieldSelector> for String {
    fn from(field: FieldSelector) -> Self {
        field.to_string()
    }
}

impl fmt::Display for FieldSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.attribute {
            Some(attr) => write!(f, "{}@{}", self.selector, attr),
            None => write!(f, "{}", self.selector),
        }
    }
}

/// CSS rules for the rule-based extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Selector yielding one node per product.
    #[serde(default, alias = "items")]
    pub list: Option<String>,

    #[serde(default)]
    pub title: Option<FieldSelector>,

    #[serde(default)]
    pub description: Option<FieldSelector>,

    #[serde(default)]
    pub price: Option<FieldSelector>,

    #[serde(default)]
    pub image: Option<FieldSelector>,

    /// Selector, or a literal three-letter code.
    #[serde(default)]
    pub currency: Option<FieldSelector>,

    /// Always render this source's pages with JS.
    #[serde(default, alias = "forceRender")]
    pub render: bool,

    /// Selector the renderer waits for before capturing the page.
    #[serde(default, rename = "waitFor", alias = "wait_for")]
    pub wait_for: Option<String>,
}

impl RuleSet {
    /// Rules with a list selector.
    pub fn for_list(list: impl Into<String>) -> Self {
        Self {
            list: Some(list.into()),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, raw: &str) -> Self {
        self.title = Some(FieldSelector::parse(raw));
        self
    }

    pub fn with_description(mut self, raw: &str) -> Self {
        self.description = Some(FieldSelector::parse(raw));
        self
    }

    pub fn with_price(mut self, raw: &str) -> Self {
        self.price = Some(FieldSelector::parse(raw));
        self
    }

    pub fn with_image(mut self, raw: &str) -> Self {
        self.image = Some(FieldSelector::parse(raw));
        self
    }

    pub fn with_currency(mut self, raw: &str) -> Self {
        self.currency = Some(FieldSelector::parse(raw));
        self
    }

    /// Whether the rule set can drive extraction at all.
    pub fn has_list(&self) -> bool {
        self.list
            .as_deref()
            .map(|l| !l.trim().is_empty())
            .unwrap_or(false)
    }
}

/// A registered business website to crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: String,

    pub base_url: String,

    /// Relative or absolute paths; empty means the base URL itself.
    #[serde(default)]
    pub entry_paths: Vec<String>,

    #[serde(default)]
    pub mode: ExtractionMode,

    #[serde(default)]
    pub rules: Option<RuleSet>,

    /// Extra request headers for plain GETs.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default)]
    pub status: IngestStatus,

    /// Owning business reference.
    pub business_id: Option<String>,

    /// Category declared by the owning business.
    #[serde(default)]
    pub business_category: Option<String>,
}

impl Source {
    /// Create an active heuristic-mode source.
    pub fn new(id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into(),
            entry_paths: Vec::new(),
            mode: ExtractionMode::default(),
            rules: None,
            headers: HashMap::new(),
            status: IngestStatus::Active,
            business_id: None,
            business_category: None,
        }
    }

    pub fn with_business(mut self, business_id: impl Into<String>) -> Self {
        self.business_id = Some(business_id.into());
        self
    }

    pub fn with_business_category(mut self, category: impl Into<String>) -> Self {
        self.business_category = Some(category.into());
        self
    }

    pub fn with_entry_path(mut self, path: impl Into<String>) -> Self {
        self.entry_paths.push(path.into());
        self
    }

    pub fn with_mode(mut self, mode: ExtractionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_status(mut self, status: IngestStatus) -> Self {
        self.status = status;
        self
    }

    /// Entry paths, defaulting to the root.
    pub fn effective_entry_paths(&self) -> Vec<String> {
        if self.entry_paths.is_empty() {
            vec![String::new()]
        } else {
            self.entry_paths.clone()
        }
    }

    /// Rules that should actually run (rule-based mode with a list selector).
    pub fn active_rules(&self) -> Option<&RuleSet> {
        match self.mode {
            ExtractionMode::RuleBased => self.rules.as_ref().filter(|r| r.has_list()),
            _ => None,
        }
    }
}

/// Join an entry path onto a base URL.
///
/// Absolute `http(s)` paths pass through; otherwise the base gets a trailing
/// slash and the path loses its leading one, so `https://a.com/shop` +
/// `/menu` resolves to `https://a.com/shop/menu`.
pub fn join_url(base: &str, path: &str) -> Result<String, FetchError> {
    let path = path.trim();
    let lower = path.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Url::parse(path)
            .map(|u| u.to_string())
            .map_err(|_| FetchError::InvalidUrl {
                url: path.to_string(),
            });
    }

    let base = base.trim();
    let clean_base = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{}/", base)
    };
    let base_url = Url::parse(&clean_base).map_err(|_| FetchError::InvalidUrl {
        url: base.to_string(),
    })?;

    base_url
        .join(path.trim_start_matches('/'))
        .map(|u| u.to_string())
        .map_err(|_| FetchError::InvalidUrl {
            url: format!("{}{}", clean_base, path),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_selector_parse() {
        let plain = FieldSelector::parse(" .name ");
        assert_eq!(plain.selector, ".name");
        assert_eq!(plain.attribute, None);

        let attr = FieldSelector::parse("img.hero@src");
        assert_eq!(attr.selector, "img.hero");
        assert_eq!(attr.attribute.as_deref(), Some("src"));

        let dangling = FieldSelector::parse(".price@");
        assert_eq!(dangling.selector, ".price");
        assert_eq!(dangling.attribute, None);

        assert_eq!(attr.to_string(), "img.hero@src");
    }

    #[test]
    fn test_currency_literal() {
        assert_eq!(FieldSelector::parse("EUR").as_currency_literal(), Some("EUR"));
        assert_eq!(FieldSelector::parse(".cur").as_currency_literal(), None);
        assert_eq!(FieldSelector::parse("span@data-cur").as_currency_literal(), None);
    }

    #[test]
    fn test_rule_set_deserialize() {
        let rules: RuleSet = serde_json::from_value(serde_json::json!({
            "items": ".menu-item",
            "title": ".name",
            "price": ".price@data-amount",
            "image": "img@data-src",
            "currency": "CAD",
            "waitFor": ".menu-loaded",
            "render": true
        }))
        .unwrap();

        assert_eq!(rules.list.as_deref(), Some(".menu-item"));
        assert_eq!(rules.title, Some(FieldSelector::text(".name")));
        assert_eq!(rules.price, Some(FieldSelector::attr(".price", "data-amount")));
        assert_eq!(rules.image, Some(FieldSelector::attr("img", "data-src")));
        assert_eq!(rules.wait_for.as_deref(), Some(".menu-loaded"));
        assert!(rules.render);
        assert!(rules.has_list());
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(ExtractionMode::parse("rules_css"), Some(ExtractionMode::RuleBased));
        assert_eq!(ExtractionMode::parse("jsonld"), Some(ExtractionMode::StructuredOnly));
        assert_eq!(ExtractionMode::parse("Heuristic"), Some(ExtractionMode::Heuristic));
        assert_eq!(ExtractionMode::parse("??"), None);
    }

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://example.com", "").unwrap(),
            "https://example.com/"
        );
        assert_eq!(
            join_url("https://example.com/shop", "/menu").unwrap(),
            "https://example.com/shop/menu"
        );
        assert_eq!(
            join_url("https://example.com/shop/", "menu?x=1").unwrap(),
            "https://example.com/shop/menu?x=1"
        );
        assert_eq!(
            join_url("https://example.com", "https://other.com/a").unwrap(),
            "https://other.com/a"
        );
        assert!(join_url("not a url", "menu").is_err());
    }

    #[test]
    fn test_effective_entry_paths_default_root() {
        let source = Source::new("1", "https://example.com");
        assert_eq!(source.effective_entry_paths(), vec![String::new()]);

        let source = source.with_entry_path("/menu");
        assert_eq!(source.effective_entry_paths(), vec!["/menu".to_string()]);
    }

    #[test]
    fn test_active_rules_requires_rule_mode_and_list() {
        let rules = RuleSet::for_list(".item").with_title(".name");
        let heuristic = Source::new("1", "https://e.com").with_rules(rules.clone());
        assert!(heuristic.active_rules().is_none());

        let rule_based = heuristic.with_mode(ExtractionMode::RuleBased);
        assert!(rule_based.active_rules().is_some());

        let empty = Source::new("2", "https://e.com")
            .with_mode(ExtractionMode::RuleBased)
            .with_rules(RuleSet::default());
        assert!(empty.active_rules().is_none());
    }
}
