//! Candidate extraction strategies.
//!
//! Each extractor implements [`Extractor`] over a parsed page. Which ones
//! run is decided by the source's [`ExtractionMode`]:
//!
//! | Mode | Extractors |
//! |---|---|
//! | `structured-only` | structured, meta |
//! | `heuristic` | structured, inline JSON, meta |
//! | `rule-based` | structured, inline JSON, meta, CSS rules |

pub mod inline_json;
pub mod meta;
pub mod rule_based;
pub mod structured;
pub mod util;

use scraper::Html;
use tracing::debug;
use url::Url;

use crate::traits::extractor::{Extractor, PageContext};
use crate::types::{ExtractionMode, RawCandidate, Source};

pub use inline_json::InlineJsonExtractor;
pub use meta::MetaExtractor;
pub use rule_based::RuleBasedExtractor;
pub use structured::StructuredDataExtractor;

/// The extractors that run for one extraction mode.
pub struct ExtractorSet {
    extractors: Vec<Box<dyn Extractor>>,
}

impl ExtractorSet {
    pub fn new(extractors: Vec<Box<dyn Extractor>>) -> Self {
        Self { extractors }
    }

    pub fn for_mode(mode: ExtractionMode) -> Self {
        let mut extractors: Vec<Box<dyn Extractor>> = vec![Box::new(StructuredDataExtractor)];
        match mode {
            ExtractionMode::StructuredOnly => {}
            ExtractionMode::Heuristic => {
                extractors.push(Box::new(InlineJsonExtractor));
            }
            ExtractionMode::RuleBased => {
                extractors.push(Box::new(InlineJsonExtractor));
                extractors.push(Box::new(RuleBasedExtractor));
            }
        }
        extractors.push(Box::new(MetaExtractor));
        Self::new(extractors)
    }

    pub fn names(&self) -> Vec<&str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }

    /// Run every extractor, concatenating their candidates in order.
    pub fn run(&self, page: &PageContext<'_>) -> Vec<RawCandidate> {
        let mut all = Vec::new();
        for extractor in &self.extractors {
            let found = extractor.extract(page);
            debug!(
                url = %page.page_url,
                extractor = extractor.name(),
                count = found.len(),
                "Extractor finished"
            );
            all.extend(found);
        }
        all
    }
}

/// What one page yielded, plus the page-level strings the validator needs.
#[derive(Debug, Clone, Default)]
pub struct PageExtraction {
    pub candidates: Vec<RawCandidate>,
    pub page_title: Option<String>,
    pub site_name: Option<String>,
}

/// Parse `html` and run the source's extractors over it.
///
/// Synchronous on purpose: the parsed document is not `Send` and must not
/// live across an await point.
pub fn extract_page(html: &str, page_url: &Url, source: &Source, business_id: &str) -> PageExtraction {
    let document = Html::parse_document(html);
    let page = PageContext::new(&document, page_url, business_id).with_rules(source.active_rules());

    PageExtraction {
        candidates: ExtractorSet::for_mode(source.mode).run(&page),
        page_title: util::page_title(&document),
        site_name: util::site_name(&document),
    }
}
