//! Product page extraction: description plus labelled bibliographic fields.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::{collapse_whitespace, truncate_chars, visible_text};
use crate::model::DetailFields;

const DESCRIPTION_SELECTORS: &str = ".description, #description";
const META_DESCRIPTION_SELECTOR: &str = "meta[name=\"description\"]";

/// Rows that can carry a labelled field: `<li>Label: value</li>` or a
/// table row whose first cell is the label.
const LABEL_ROW_SELECTOR: &str = "li, tr";

/// Extracts [`DetailFields`] from a rendered product page.
pub struct DetailExtractor {
    /// `Label: value` inside a list item; the colon is mandatory.
    inline_label: Regex,
    /// A whole header cell such as `ISBN-13` or `Publisher:`.
    cell_label: Regex,
    max_description_chars: usize,
}

impl DetailExtractor {
    pub fn new(max_description_chars: usize) -> Self {
        Self {
            inline_label: Regex::new(r"(?i)^(isbn(?:-1[03])?|author|publisher)\s*:\s*(.+)$")
                .expect("inline label regex is valid"),
            cell_label: Regex::new(r"(?i)^(isbn(?:-1[03])?|author|publisher)\s*:?$")
                .expect("cell label regex is valid"),
            max_description_chars,
        }
    }

    pub fn extract(&self, html: &str) -> DetailFields {
        let document = Html::parse_document(html);
        let mut fields = DetailFields {
            description: self.description(&document),
            ..DetailFields::default()
        };
        self.scan_labels(&document, &mut fields);
        fields
    }

    /// Page description element first, then the meta description.
    fn description(&self, document: &Html) -> Option<String> {
        let from_element = Selector::parse(DESCRIPTION_SELECTORS)
            .ok()
            .and_then(|sel| {
                document
                    .select(&sel)
                    .map(visible_text)
                    .find(|t| !t.is_empty())
            });

        let text = from_element.or_else(|| {
            let sel = Selector::parse(META_DESCRIPTION_SELECTOR).ok()?;
            document
                .select(&sel)
                .filter_map(|m| m.value().attr("content"))
                .map(collapse_whitespace)
                .find(|t| !t.is_empty())
        })?;

        Some(truncate_chars(&text, self.max_description_chars))
    }

    /// First labelled row wins for each field.
    fn scan_labels(&self, document: &Html, fields: &mut DetailFields) {
        let Ok(rows) = Selector::parse(LABEL_ROW_SELECTOR) else {
            return;
        };
        for row in document.select(&rows) {
            let labelled = match row.value().name() {
                "tr" => self.cell_pair(row),
                _ => self.inline_pair(row),
            };
            let Some((label, value)) = labelled else {
                continue;
            };
            let slot = match label.to_ascii_lowercase().as_str() {
                "author" => &mut fields.author,
                "publisher" => &mut fields.publisher,
                _ => &mut fields.isbn,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
    }

    fn inline_pair(&self, item: ElementRef<'_>) -> Option<(String, String)> {
        let text = visible_text(item);
        let caps = self.inline_label.captures(&text)?;
        non_empty_pair(&caps[1], &caps[2])
    }

    /// The first `th`/`td` is the label, the remaining cells the value.
    fn cell_pair(&self, row: ElementRef<'_>) -> Option<(String, String)> {
        let mut cells = row
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|cell| matches!(cell.value().name(), "th" | "td"));
        let header = visible_text(cells.next()?);
        let caps = self.cell_label.captures(&header)?;
        let value = cells.map(visible_text).collect::<Vec<_>>().join(" ");
        non_empty_pair(&caps[1], &value)
    }
}

fn non_empty_pair(label: &str, value: &str) -> Option<(String, String)> {
    let value = value.trim();
    (!value.is_empty()).then(|| (label.to_string(), value.to_string()))
}
