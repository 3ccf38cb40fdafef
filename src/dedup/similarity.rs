//! Duplicate-likelihood scoring for concept pairs
//!
//! Rules are tried in priority order and the first applicable one wins:
//! abbreviation (0.98), exact match (1.0), embedding blend, edit distance.

use crate::classify::tokenize;
use crate::model::Concept;
use serde::{Deserialize, Serialize};

const ABBREVIATION_SCORE: f32 = 0.98;
const EXACT_SCORE: f32 = 1.0;
const EMBEDDING_WEIGHT: f32 = 0.8;
const EDIT_WEIGHT: f32 = 0.2;

/// Words skipped when forming content-word initials ("DoD", "TCO")
const STOPWORDS: &[&str] = &["of", "the", "and", "for", "a", "an", "in", "on", "to"];

/// Which rule produced a similarity score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityRule {
    Abbreviation,
    ExactMatch,
    Embedding,
    EditDistance,
}

impl std::fmt::Display for SimilarityRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Abbreviation => "abbreviation",
            Self::ExactMatch => "exact_match",
            Self::Embedding => "embedding",
            Self::EditDistance => "edit_distance",
        };
        f.write_str(s)
    }
}

/// Score plus an audit trail naming the rule that fired
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    pub score: f32,
    pub rule: SimilarityRule,
    pub reasoning: String,
}

/// Multi-signal duplicate scorer.
///
/// Symmetric: `similarity(a, b) == similarity(b, a)`, reasoning included.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityScorer;

impl SimilarityScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn similarity(&self, a: &Concept, b: &Concept) -> SimilarityMatch {
        // Canonical order, so every rule and its reasoning is order-independent
        let (a, b) = if sort_key(a) <= sort_key(b) { (a, b) } else { (b, a) };
        let (term_a, term_b) = (a.term.trim(), b.term.trim());

        if let Some(reasoning) = abbreviation(term_a, term_b).or_else(|| abbreviation(term_b, term_a)) {
            return SimilarityMatch {
                score: ABBREVIATION_SCORE,
                rule: SimilarityRule::Abbreviation,
                reasoning,
            };
        }

        if term_a.to_lowercase() == term_b.to_lowercase() {
            return SimilarityMatch {
                score: EXACT_SCORE,
                rule: SimilarityRule::ExactMatch,
                reasoning: format!("exact match: '{}' equals '{}' ignoring case", term_a, term_b),
            };
        }

        let edit = edit_distance_similarity(term_a, term_b);

        if let (Some(ea), Some(eb)) = (&a.embedding, &b.embedding) {
            if let Some(cosine) = cosine_similarity(ea, eb) {
                let score = (cosine * EMBEDDING_WEIGHT + edit * EDIT_WEIGHT).clamp(0.0, 1.0);
                return SimilarityMatch {
                    score,
                    rule: SimilarityRule::Embedding,
                    reasoning: format!(
                        "embedding: cosine {:.3} * 0.8 + edit similarity {:.3} * 0.2",
                        cosine, edit
                    ),
                };
            }
        }

        SimilarityMatch {
            score: edit,
            rule: SimilarityRule::EditDistance,
            reasoning: format!(
                "edit distance: '{}' vs '{}' similarity {:.3}",
                term_a, term_b, edit
            ),
        }
    }
}

fn sort_key(c: &Concept) -> (String, &str, crate::model::ConceptId) {
    (c.term.trim().to_lowercase(), c.term.as_str(), c.id)
}

/// Reasoning if `short` abbreviates `long`
fn abbreviation(short: &str, long: &str) -> Option<String> {
    if is_acronym_of(short, long) {
        return Some(format!("abbreviation: '{}' is an acronym of '{}'", short, long));
    }
    if let Some((outer, inner)) = parenthetical_parts(long) {
        if inner.to_lowercase() == short.to_lowercase() {
            return Some(format!(
                "abbreviation: '{}' appears parenthetically in '{}'",
                short, long
            ));
        }
        if outer.to_lowercase() == short.to_lowercase() {
            return Some(format!(
                "abbreviation: '{}' is the expansion of parenthetical form '{}'",
                short, long
            ));
        }
    }
    None
}

/// "VM" / "Virtual Machine", "DoD" / "Department of Defense"
fn is_acronym_of(short: &str, long: &str) -> bool {
    let letters = short.chars().count();
    if letters < 2 || !short.chars().all(|c| c.is_alphanumeric()) {
        return false;
    }
    let words = tokenize(long);
    if words.len() < 2 {
        return false;
    }
    let short = short.to_lowercase();

    let all_initials: String = words.iter().filter_map(|w| w.chars().next()).collect();
    if all_initials == short {
        return true;
    }
    let content_initials: String = words
        .iter()
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .filter_map(|w| w.chars().next())
        .collect();
    content_initials.chars().count() >= 2 && content_initials == short
}

/// Split "Virtual Machine (VM)" into ("Virtual Machine", "VM")
fn parenthetical_parts(term: &str) -> Option<(String, &str)> {
    let open = term.find('(')?;
    let close = open + term[open..].find(')')?;
    let inner = term[open + 1..close].trim();
    let outer = format!("{} {}", term[..open].trim(), term[close + 1..].trim());
    let outer = outer.trim().to_string();
    if inner.is_empty() || outer.is_empty() {
        return None;
    }
    Some((outer, inner))
}

/// `1 - levenshtein / max_len` over lowercased, trimmed terms (chars)
pub fn edit_distance_similarity(a: &str, b: &str) -> f32 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(&a, &b) as f32 / max_len as f32
}

/// Simple Levenshtein distance.
pub(crate) fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (m, n) = (a.len(), b.len());
    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0usize; n + 1];
    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[n]
}

/// Cosine similarity; `None` for mismatched lengths or zero vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a * norm_b))
}
