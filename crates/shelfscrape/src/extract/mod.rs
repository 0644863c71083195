//! DOM → record extraction.
//!
//! Extraction is a pure function of a rendered snapshot. The selector
//! heuristics are brittle by nature, so they sit behind [`RecordExtractor`]
//! and can be swapped or tested against fixture HTML without the pipeline.
//!
//! All entry points are synchronous: `scraper::Html` is `!Send`, so a parsed
//! document must never be held across an `.await`.

pub mod detail;
pub mod listing;

use scraper::node::Node;
use scraper::ElementRef;

use crate::model::Candidate;
use crate::session::DomSnapshot;

pub use detail::DetailExtractor;
pub use listing::ListingExtractor;

/// Turns a rendered listing page into candidate records.
pub trait RecordExtractor: Send + Sync {
    fn extract_records(&self, snapshot: &DomSnapshot) -> Vec<Candidate>;
}

/// Elements whose text never renders.
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Rendered-ish text of an element: hidden subtrees skipped, whitespace
/// collapsed to single spaces, trimmed.
pub fn visible_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(el, &mut out);
    collapse_whitespace(&out)
}

fn collect_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
            }
            Node::Element(element) => {
                if HIDDEN_TAGS.contains(&element.name()) {
                    continue;
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    out.push(' ');
                    collect_text(child_el, out);
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

/// Collapse runs of whitespace (newlines included) into single spaces.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    #[test]
    fn test_visible_text_skips_scripts_and_collapses() {
        let doc = Html::parse_fragment(
            "<div><h3>The\n  Hobbit</h3><script>var x = '£1.00';</script><span>£5.99</span></div>",
        );
        let sel = Selector::parse("div").unwrap();
        let div = doc.select(&sel).next().unwrap();
        assert_eq!(visible_text(div), "The Hobbit £5.99");
    }

    #[test]
    fn test_truncate_chars_respects_multibyte() {
        assert_eq!(truncate_chars("££££", 2), "££");
        assert_eq!(truncate_chars("ab", 10), "ab");
    }
}
