//! Extractor trait.
//!
//! Extractors are synchronous: `scraper::Html` is not `Send`, so a page is
//! parsed and mined in one blocking step before the pipeline awaits again.

use scraper::Html;
use url::Url;

use crate::types::{RawCandidate, RuleSet};

/// Everything an extractor may look at for one page.
pub struct PageContext<'a> {
    pub document: &'a Html,

    /// Final page URL, used to resolve relative links.
    pub page_url: &'a Url,

    pub business_id: &'a str,

    /// Rule set when the source runs in rule-based mode.
    pub rules: Option<&'a RuleSet>,
}

impl<'a> PageContext<'a> {
    pub fn new(document: &'a Html, page_url: &'a Url, business_id: &'a str) -> Self {
        Self {
            document,
            page_url,
            business_id,
            rules: None,
        }
    }

    pub fn with_rules(mut self, rules: Option<&'a RuleSet>) -> Self {
        self.rules = rules;
        self
    }

    /// Resolve a possibly relative reference against the page URL.
    pub fn absolutize(&self, reference: &str) -> Option<String> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }
        self.page_url.join(reference).ok().map(|u| u.to_string())
    }
}

/// One strategy for finding product candidates in a page.
///
/// Extractors never fail the page: malformed fragments are logged and
/// skipped, and an extractor that finds nothing returns an empty list.
pub trait Extractor: Send + Sync {
    fn name(&self) -> &str;

    fn extract(&self, page: &PageContext<'_>) -> Vec<RawCandidate>;
}
