//! Product-card heuristics for listing pages.
//!
//! Every anchor on the page is a potential product link. For each one the
//! extractor locates an enclosing card, keeps it only if the card shows a
//! currency-prefixed price, and pulls title, price and image out of it.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::{collapse_whitespace, visible_text, RecordExtractor};
use crate::model::{source_id_for, Candidate};
use crate::session::DomSnapshot;

/// `<currency symbol><digits>.<2 digits>`; the first match in a card wins.
const PRICE_PATTERN: &str = r"[£$€]\d+\.\d{2}";

/// Titles shorter than this are navigational noise.
const MIN_TITLE_CHARS: usize = 2;

/// Title sources in priority order, before falling back to the anchor text.
const HEADING_SELECTORS: &[&str] = &["h3", "h2, h4, h5, h6"];
const TITLE_CLASS_SELECTORS: &[&str] = &[".title", "[class*=\"Title\"]", "[class*=\"title\"]"];

/// Image attributes in priority order; lazy-load attributes first because
/// `src` is often still a placeholder when the DOM is captured.
const IMAGE_ATTRIBUTES: &[&str] = &["data-src", "srcset", "src"];

/// Listing-page extractor.
pub struct ListingExtractor {
    price: Regex,
}

impl ListingExtractor {
    pub fn new() -> Self {
        Self {
            price: Regex::new(PRICE_PATTERN).expect("price pattern is a valid regex"),
        }
    }

    /// Extract candidates from raw HTML, resolving links against `page_url`.
    pub fn extract_html(&self, html: &str, page_url: &str) -> Vec<Candidate> {
        let document = Html::parse_document(html);
        let base = Url::parse(page_url).ok();
        let Ok(anchors) = Selector::parse("a") else {
            return Vec::new();
        };
        let selectors = CardSelectors::new();

        let candidates: Vec<Candidate> = document
            .select(&anchors)
            .filter_map(|anchor| self.candidate_for(anchor, base.as_ref(), &selectors))
            .collect();

        debug!(url = page_url, count = candidates.len(), "listing candidates");
        candidates
    }

    fn candidate_for(
        &self,
        anchor: ElementRef<'_>,
        base: Option<&Url>,
        selectors: &CardSelectors,
    ) -> Option<Candidate> {
        let card = find_card(anchor)?;

        let card_text = visible_text(card);
        let price = self.price.find(&card_text)?.as_str().to_string();

        let title = extract_title(card, anchor, selectors)?;
        let image_url = extract_image(card, selectors);
        let product_url = anchor
            .value()
            .attr("href")
            .and_then(|href| resolve_link(base, href));

        Some(Candidate {
            source_id: source_id_for(&title),
            title,
            price,
            image_url,
            product_url,
        })
    }
}

impl Default for ListingExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordExtractor for ListingExtractor {
    fn extract_records(&self, snapshot: &DomSnapshot) -> Vec<Candidate> {
        self.extract_html(&snapshot.html, &snapshot.final_url)
    }
}

/// Parsed selectors for one extraction pass.
struct CardSelectors {
    headings: Vec<Selector>,
    title_classes: Vec<Selector>,
    image: Option<Selector>,
}

impl CardSelectors {
    fn new() -> Self {
        let parse_all = |list: &[&str]| -> Vec<Selector> {
            list.iter().filter_map(|s| Selector::parse(s).ok()).collect()
        };
        Self {
            headings: parse_all(HEADING_SELECTORS),
            title_classes: parse_all(TITLE_CLASS_SELECTORS),
            image: Selector::parse("img").ok(),
        }
    }
}

/// Nearest `li` ancestor, else nearest `div` with an item-ish class, else
/// the grandparent element.
fn find_card(anchor: ElementRef<'_>) -> Option<ElementRef<'_>> {
    let ancestors = || anchor.ancestors().filter_map(ElementRef::wrap);

    if let Some(li) = ancestors().find(|el| el.value().name() == "li") {
        return Some(li);
    }

    let item_div = ancestors().find(|el| {
        el.value().name() == "div"
            && el
                .value()
                .attr("class")
                .is_some_and(|class| class.contains("item") || class.contains("Item"))
    });
    if item_div.is_some() {
        return item_div;
    }

    anchor
        .parent()
        .and_then(|parent| parent.parent())
        .and_then(ElementRef::wrap)
}

fn extract_title(
    card: ElementRef<'_>,
    anchor: ElementRef<'_>,
    selectors: &CardSelectors,
) -> Option<String> {
    let from_card = selectors
        .headings
        .iter()
        .chain(selectors.title_classes.iter())
        .find_map(|sel| card.select(sel).next())
        .map(visible_text)
        .filter(|t| !t.is_empty());

    let title = from_card.unwrap_or_else(|| visible_text(anchor));
    let title = collapse_whitespace(&title);
    (title.chars().count() >= MIN_TITLE_CHARS).then_some(title)
}

fn extract_image(card: ElementRef<'_>, selectors: &CardSelectors) -> Option<String> {
    let img = card.select(selectors.image.as_ref()?).next()?;
    IMAGE_ATTRIBUTES
        .iter()
        .filter_map(|attr| img.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

fn resolve_link(base: Option<&Url>, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    match base {
        Some(base) => base.join(href).ok().map(String::from),
        None => Url::parse(href).ok().map(String::from),
    }
}
