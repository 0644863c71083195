//! Title-keyed deduplication.
//!
//! A product card usually holds several anchors (cover, title, "buy"), so
//! raw extraction repeats records. Titles are the key: the output keeps the
//! order in which titles first appeared, and each slot holds the record seen
//! last for that title.

use std::collections::HashMap;

use crate::model::Candidate;

pub fn dedup_by_title(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(candidates.len());
    let mut out: Vec<Candidate> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        match slots.get(&candidate.title) {
            Some(&i) => out[i] = candidate,
            None => {
                slots.insert(candidate.title.clone(), out.len());
                out.push(candidate);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::source_id_for;

    fn candidate(title: &str, price: &str) -> Candidate {
        Candidate {
            title: title.to_string(),
            price: price.to_string(),
            image_url: None,
            source_id: source_id_for(title),
            product_url: None,
        }
    }

    #[test]
    fn test_first_seen_order_last_value_wins() {
        let out = dedup_by_title(vec![
            candidate("Dune", "£5.00"),
            candidate("Emma", "£3.00"),
            candidate("Dune", "£4.50"),
        ]);
        let titles: Vec<_> = out.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, ["Dune", "Emma"]);
        assert_eq!(out[0].price, "£4.50");
    }

    #[test]
    fn test_titles_are_unique_after_dedup() {
        let input: Vec<_> = (0..30)
            .map(|i| candidate(&format!("Book {}", i % 7), "£1.00"))
            .collect();
        let out = dedup_by_title(input);
        assert_eq!(out.len(), 7);
        let mut titles: Vec<_> = out.iter().map(|c| c.title.clone()).collect();
        titles.dedup();
        assert_eq!(titles.len(), 7);
    }

    #[test]
    fn test_title_match_is_exact() {
        let out = dedup_by_title(vec![candidate("dune", "£1.00"), candidate("Dune", "£1.00")]);
        assert_eq!(out.len(), 2);
    }
}
