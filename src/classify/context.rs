//! Contextual proximity scoring for concept pairs
//!
//! Four independent signals are summed and capped at 1.0:
//!
//! | Signal | Weight |
//! |---|---|
//! | shared neighbor terms | 0.1 each, up to 0.3 |
//! | location proximity | 0.2 same page, 0.15 near, 0.1 far |
//! | both terms in one excerpt | 0.3 |
//! | one definition mentions the other term | 0.2 |

use crate::config::ContextConfig;
use crate::model::Concept;
use std::collections::BTreeSet;

const NEIGHBOR_WEIGHT: f32 = 0.1;
const NEIGHBOR_CAP: f32 = 0.3;
const SAME_LOCATION: f32 = 0.2;
const NEAR_LOCATION: f32 = 0.15;
const FAR_LOCATION: f32 = 0.1;
const CO_OCCURRENCE: f32 = 0.3;
const MUTUAL_MENTION: f32 = 0.2;

/// Per-signal breakdown of a context score
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContextSignals {
    pub shared_neighbors: f32,
    pub location: f32,
    pub co_occurrence: f32,
    pub mutual_mention: f32,
}

impl ContextSignals {
    /// Sum of all signals, capped at 1.0
    pub fn strength(&self) -> f32 {
        (self.shared_neighbors + self.location + self.co_occurrence + self.mutual_mention).min(1.0)
    }
}

/// Scores the contextual proximity of two concepts
#[derive(Debug, Clone, Default)]
pub struct ContextAnalyzer {
    config: ContextConfig,
}

impl ContextAnalyzer {
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Context strength in [0, 1]
    pub fn context_strength(&self, a: &Concept, b: &Concept) -> f32 {
        self.signals(a, b).strength()
    }

    pub fn signals(&self, a: &Concept, b: &Concept) -> ContextSignals {
        ContextSignals {
            shared_neighbors: shared_neighbor_score(a, b),
            location: self.location_score(a, b),
            co_occurrence: co_occurrence_score(a, b),
            mutual_mention: mutual_mention_score(a, b),
        }
    }

    fn location_score(&self, a: &Concept, b: &Concept) -> f32 {
        let (Some(la), Some(lb)) = (a.location, b.location) else {
            return 0.0;
        };
        let distance = la.page_distance(&lb);
        if distance == 0 {
            SAME_LOCATION
        } else if distance <= self.config.near_page_window {
            NEAR_LOCATION
        } else if distance <= self.config.far_page_window {
            FAR_LOCATION
        } else {
            0.0
        }
    }
}

fn lowercase_set(terms: &BTreeSet<String>) -> BTreeSet<String> {
    terms.iter().map(|t| t.to_lowercase()).collect()
}

fn shared_neighbor_score(a: &Concept, b: &Concept) -> f32 {
    if a.neighbor_terms.is_empty() || b.neighbor_terms.is_empty() {
        return 0.0;
    }
    let shared = lowercase_set(&a.neighbor_terms)
        .intersection(&lowercase_set(&b.neighbor_terms))
        .count();
    (shared as f32 * NEIGHBOR_WEIGHT).min(NEIGHBOR_CAP)
}

fn co_occurrence_score(a: &Concept, b: &Concept) -> f32 {
    let term_a = a.term.to_lowercase();
    let term_b = b.term.to_lowercase();
    let together = a
        .source_excerpts
        .iter()
        .chain(b.source_excerpts.iter())
        .any(|excerpt| {
            let text = excerpt.to_lowercase();
            contains_term(&text, &term_a) && contains_term(&text, &term_b)
        });
    if together {
        CO_OCCURRENCE
    } else {
        0.0
    }
}

fn mutual_mention_score(a: &Concept, b: &Concept) -> f32 {
    let a_mentions_b = contains_term(&a.definition.to_lowercase(), &b.term.to_lowercase());
    let b_mentions_a = contains_term(&b.definition.to_lowercase(), &a.term.to_lowercase());
    if a_mentions_b || b_mentions_a {
        MUTUAL_MENTION
    } else {
        0.0
    }
}

/// Whole-word containment of a (lowercase) term in (lowercase) text
pub(crate) fn contains_term(text: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    text.match_indices(term).any(|(start, _)| {
        let end = start + term.len();
        let before_ok = text[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = text[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        before_ok && after_ok
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> ContextAnalyzer {
        ContextAnalyzer::new(ContextConfig::default())
    }

    #[test]
    fn unrelated_concepts_score_zero() {
        let a = Concept::new("Kernel", "core of the OS");
        let b = Concept::new("Pixel", "a picture element");
        assert_eq!(analyzer().context_strength(&a, &b), 0.0);
    }

    #[test]
    fn shared_neighbors_are_capped() {
        let mut a = Concept::new("A", "");
        let mut b = Concept::new("B", "");
        for t in ["w", "x", "y", "z"] {
            a = a.with_neighbor(t);
            b = b.with_neighbor(t.to_uppercase());
        }
        let signals = analyzer().signals(&a, &b);
        assert!((signals.shared_neighbors - 0.3).abs() < 1e-6);
    }

    #[test]
    fn location_is_tiered() {
        let analyzer = analyzer();
        let a = Concept::new("A", "").with_location(4, 0);
        let same = Concept::new("B", "").with_location(4, 900);
        let near = Concept::new("C", "").with_location(5, 0);
        let far = Concept::new("D", "").with_location(7, 0);
        let distant = Concept::new("E", "").with_location(12, 0);

        assert_eq!(analyzer.signals(&a, &same).location, 0.2);
        assert_eq!(analyzer.signals(&a, &near).location, 0.15);
        assert_eq!(analyzer.signals(&a, &far).location, 0.1);
        assert_eq!(analyzer.signals(&a, &distant).location, 0.0);
    }

    #[test]
    fn co_occurrence_needs_both_terms_in_one_excerpt() {
        let a = Concept::new("Paging", "").with_excerpt("Paging relies on the TLB.");
        let b = Concept::new("TLB", "").with_excerpt("Unrelated sentence.");
        assert_eq!(analyzer().signals(&a, &b).co_occurrence, 0.3);

        let c = Concept::new("Paging", "").with_excerpt("Paging is common.");
        assert_eq!(analyzer().signals(&c, &b).co_occurrence, 0.0);
    }

    #[test]
    fn mutual_mention_matches_whole_words_only() {
        let a = Concept::new("Thread", "a unit of execution within a process");
        let b = Concept::new("Process", "a running program");
        assert_eq!(analyzer().signals(&a, &b).mutual_mention, 0.2);

        let c = Concept::new("Proc", "short form");
        assert_eq!(analyzer().signals(&a, &c).mutual_mention, 0.0);
    }

    #[test]
    fn strength_is_capped_at_one() {
        let a = Concept::new("Heap", "memory region used with the stack")
            .with_excerpt("heap and stack grow toward each other")
            .with_location(1, 0)
            .with_neighbor("a")
            .with_neighbor("b")
            .with_neighbor("c");
        let b = Concept::new("Stack", "region adjacent to the heap")
            .with_location(1, 10)
            .with_neighbor("a")
            .with_neighbor("b")
            .with_neighbor("c");
        // 0.3 + 0.2 + 0.3 + 0.2 = 1.0
        assert!((analyzer().context_strength(&a, &b) - 1.0).abs() < 1e-6);
    }
}
