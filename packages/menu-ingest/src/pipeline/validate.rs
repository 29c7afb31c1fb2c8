//! Candidate validation.
//!
//! Drops boilerplate and weak candidates before normalization. Rules run in
//! order and the first failing rule names the rejection.

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

use super::normalize::coerce_price;
use crate::types::{Provenance, RawCandidate};

lazy_static! {
    /// Separators between title segments (`Menu | Joe's`, `Home - Site`).
    static ref SEGMENT_RE: Regex = Regex::new(r"\s*[|·:]\s*|\s+[-–—]\s+").unwrap();
    static ref WS_RE: Regex = Regex::new(r"\s+").unwrap();
}

/// Navigation and platform phrases that are never products.
const DENYLIST: &[&str] = &[
    "order online",
    "skytab online",
    "menu",
    "our menu",
    "full menu",
    "home",
    "homepage",
    "site",
];

/// Why a candidate was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    BlankTitle,
    Untitled,
    MatchesPageTitle,
    MatchesSiteName,
    Boilerplate,
    MetaWithoutPrice,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Rejection::BlankTitle => "blank title",
            Rejection::Untitled => "untitled",
            Rejection::MatchesPageTitle => "title equals page title",
            Rejection::MatchesSiteName => "title equals site name",
            Rejection::Boilerplate => "boilerplate title",
            Rejection::MetaWithoutPrice => "meta candidate without price",
        };
        f.write_str(reason)
    }
}

fn normalize_title(text: &str) -> String {
    WS_RE.replace_all(text.trim(), " ").to_lowercase()
}

fn is_boilerplate(title: &str) -> bool {
    if DENYLIST.contains(&title) {
        return true;
    }
    SEGMENT_RE
        .split(title)
        .map(str::trim)
        .any(|segment| DENYLIST.contains(&segment))
}

/// Check one candidate against the page it came from.
pub fn validate(
    candidate: &RawCandidate,
    page_title: Option<&str>,
    site_name: Option<&str>,
) -> Result<(), Rejection> {
    let title = candidate
        .title
        .as_deref()
        .map(normalize_title)
        .unwrap_or_default();
    if title.is_empty() {
        return Err(Rejection::BlankTitle);
    }
    if title == "untitled" {
        return Err(Rejection::Untitled);
    }

    if page_title.map(normalize_title).as_deref() == Some(title.as_str()) {
        return Err(Rejection::MatchesPageTitle);
    }
    if site_name.map(normalize_title).as_deref() == Some(title.as_str()) {
        return Err(Rejection::MatchesSiteName);
    }

    if is_boilerplate(&title) {
        return Err(Rejection::Boilerplate);
    }

    match candidate.provenance {
        Provenance::Meta => {
            let priced = candidate.price.as_ref().and_then(coerce_price).is_some();
            if priced {
                Ok(())
            } else {
                Err(Rejection::MetaWithoutPrice)
            }
        }
        Provenance::Structured | Provenance::InlineJson | Provenance::RuleBased => Ok(()),
    }
}

/// Whether a candidate survives validation.
pub fn is_valid(candidate: &RawCandidate, page_title: Option<&str>, site_name: Option<&str>) -> bool {
    validate(candidate, page_title, site_name).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawPrice;
    use proptest::prelude::*;

    fn candidate(provenance: Provenance, title: &str) -> RawCandidate {
        RawCandidate::new(provenance, "b1", "https://e.com/menu").with_title(title)
    }

    #[test]
    fn test_blank_and_untitled() {
        assert_eq!(
            validate(&candidate(Provenance::Structured, "   "), None, None),
            Err(Rejection::BlankTitle)
        );
        let untitled = RawCandidate::new(Provenance::Structured, "b1", "https://e.com");
        assert_eq!(validate(&untitled, None, None), Err(Rejection::BlankTitle));
        assert_eq!(
            validate(&candidate(Provenance::Structured, "Untitled"), None, None),
            Err(Rejection::Untitled)
        );
    }

    #[test]
    fn test_page_title_and_site_name() {
        let c = candidate(Provenance::Meta, "Joe's  BBQ").with_price(10.0);
        assert_eq!(
            validate(&c, Some("joe's bbq"), None),
            Err(Rejection::MatchesPageTitle)
        );
        assert_eq!(
            validate(&c, Some("Other"), Some("JOE'S BBQ")),
            Err(Rejection::MatchesSiteName)
        );
        assert!(is_valid(&c, Some("Brisket | Joe's BBQ"), Some("Joe's")));
    }

    #[test]
    fn test_denylist() {
        for title in ["Menu", "Order Online", "SkyTab Online", "Home", "Menu | Joe's", "Joe's - Order Online"] {
            assert_eq!(
                validate(&candidate(Provenance::Structured, title), None, None),
                Err(Rejection::Boilerplate),
                "{} should be boilerplate",
                title
            );
        }
        assert!(is_valid(&candidate(Provenance::Structured, "Kids Menu Burger"), None, None));
        assert!(is_valid(&candidate(Provenance::Structured, "Al-Pastor"), None, None));
    }

    #[test]
    fn test_meta_requires_parseable_price() {
        let bare = candidate(Provenance::Meta, "Dry Rub");
        assert_eq!(validate(&bare, None, None), Err(Rejection::MetaWithoutPrice));

        let junk = candidate(Provenance::Meta, "Dry Rub").with_price("call us");
        assert_eq!(validate(&junk, None, None), Err(Rejection::MetaWithoutPrice));

        let priced = candidate(Provenance::Meta, "Dry Rub").with_price(RawPrice::Text("$8".into()));
        assert!(is_valid(&priced, None, None));
    }

    proptest! {
        #[test]
        fn meta_without_price_always_rejected(title in "[A-Za-z][A-Za-z ]{0,30}") {
            let c = candidate(Provenance::Meta, &title);
            prop_assert!(!is_valid(&c, None, None));
        }

        #[test]
        fn structured_with_title_and_price_accepted(
            title in "[A-Z][a-z]{2,12} [A-Z][a-z]{2,12}",
            price in 0.01f64..1000.0,
        ) {
            let c = candidate(Provenance::Structured, &title).with_price(price);
            prop_assert!(is_valid(&c, None, None));
        }
    }
}
