//! Keyword-family pattern matching for relationship structure
//!
//! Two families are scored: hierarchical (classification, composition,
//! containment and position) and sequential (ordering, enabling, causation).
//! Each keyword also names the relationship type it suggests, so the
//! dominant sub-family doubles as a pattern-only relationship type.
//!
//! Matching is phrase-based over lowercase word tokens, so "is a" never
//! matches inside "this area". Counts are additive across texts, which lets
//! callers profile each concept once and combine profiles per pair.

use crate::model::{Concept, RelationshipType, StructureType};
use serde::Serialize;
use std::collections::HashMap;

/// Keyword phrases and the relationship type each one suggests.
const KEYWORDS: &[(&str, RelationshipType)] = &[
    // classification
    ("is a", RelationshipType::IsA),
    ("is an", RelationshipType::IsA),
    ("type of", RelationshipType::IsA),
    ("kind of", RelationshipType::IsA),
    ("form of", RelationshipType::IsA),
    ("class of", RelationshipType::IsA),
    ("category", RelationshipType::IsA),
    ("categories", RelationshipType::IsA),
    ("classification", RelationshipType::IsA),
    ("classified", RelationshipType::IsA),
    ("subclass", RelationshipType::IsA),
    ("subtype", RelationshipType::IsA),
    ("instance of", RelationshipType::IsA),
    ("example of", RelationshipType::IsA),
    ("belongs to", RelationshipType::IsA),
    ("member of", RelationshipType::IsA),
    // composition
    ("component", RelationshipType::HasComponent),
    ("components", RelationshipType::HasComponent),
    ("part of", RelationshipType::HasComponent),
    ("consists of", RelationshipType::HasComponent),
    ("composed of", RelationshipType::HasComponent),
    ("made up of", RelationshipType::HasComponent),
    ("comprises", RelationshipType::HasComponent),
    ("element of", RelationshipType::HasComponent),
    // containment and position
    ("contains", RelationshipType::Contains),
    ("includes", RelationshipType::Contains),
    ("within", RelationshipType::Contains),
    ("subset", RelationshipType::Contains),
    ("superset", RelationshipType::Contains),
    ("hierarchy", RelationshipType::Contains),
    ("hierarchical", RelationshipType::Contains),
    ("parent", RelationshipType::Contains),
    ("child", RelationshipType::Contains),
    ("nested", RelationshipType::Contains),
    ("layer", RelationshipType::Contains),
    ("level", RelationshipType::Contains),
    // temporal ordering and process vocabulary
    ("first", RelationshipType::Precedes),
    ("then", RelationshipType::Precedes),
    ("next", RelationshipType::Precedes),
    ("finally", RelationshipType::Precedes),
    ("after", RelationshipType::Precedes),
    ("before", RelationshipType::Precedes),
    ("subsequently", RelationshipType::Precedes),
    ("afterwards", RelationshipType::Precedes),
    ("followed by", RelationshipType::Precedes),
    ("prior to", RelationshipType::Precedes),
    ("precedes", RelationshipType::Precedes),
    ("following", RelationshipType::Precedes),
    ("earlier", RelationshipType::Precedes),
    ("later", RelationshipType::Precedes),
    ("step", RelationshipType::Precedes),
    ("steps", RelationshipType::Precedes),
    ("stage", RelationshipType::Precedes),
    ("phase", RelationshipType::Precedes),
    ("process", RelationshipType::Precedes),
    ("procedure", RelationshipType::Precedes),
    ("sequence", RelationshipType::Precedes),
    ("workflow", RelationshipType::Precedes),
    // enabling
    ("enables", RelationshipType::Enables),
    ("allows", RelationshipType::Enables),
    ("permits", RelationshipType::Enables),
    ("prerequisite", RelationshipType::Enables),
    ("required for", RelationshipType::Enables),
    // causal connectives
    ("results in", RelationshipType::ResultsIn),
    ("leads to", RelationshipType::ResultsIn),
    ("causes", RelationshipType::ResultsIn),
    ("produces", RelationshipType::ResultsIn),
    ("triggers", RelationshipType::ResultsIn),
    ("therefore", RelationshipType::ResultsIn),
    ("consequently", RelationshipType::ResultsIn),
    ("due to", RelationshipType::ResultsIn),
    // neither family: only used to name unclassified relationships
    ("applies to", RelationshipType::AppliesTo),
    ("applied to", RelationshipType::AppliesTo),
    ("used for", RelationshipType::AppliesTo),
    ("used in", RelationshipType::AppliesTo),
    ("unlike", RelationshipType::ContrastsWith),
    ("whereas", RelationshipType::ContrastsWith),
    ("versus", RelationshipType::ContrastsWith),
    ("in contrast", RelationshipType::ContrastsWith),
    ("differs from", RelationshipType::ContrastsWith),
    ("as opposed to", RelationshipType::ContrastsWith),
];

/// Tie-break order when two relationship types have equal counts
const TYPE_PRIORITY: &[RelationshipType] = &[
    RelationshipType::IsA,
    RelationshipType::HasComponent,
    RelationshipType::Contains,
    RelationshipType::Precedes,
    RelationshipType::Enables,
    RelationshipType::ResultsIn,
    RelationshipType::AppliesTo,
    RelationshipType::ContrastsWith,
];

/// Keyword counts for one text (or several texts combined)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordProfile {
    counts: HashMap<RelationshipType, usize>,
}

impl KeywordProfile {
    /// Total matches for a family
    pub fn family_matches(&self, family: StructureType) -> usize {
        self.counts
            .iter()
            .filter(|(ty, _)| ty.natural_category() == family)
            .map(|(_, n)| *n)
            .sum()
    }

    pub fn count(&self, ty: RelationshipType) -> usize {
        self.counts.get(&ty).copied().unwrap_or(0)
    }

    /// Profile of the two texts read together
    pub fn combine(&self, other: &KeywordProfile) -> KeywordProfile {
        let mut counts = self.counts.clone();
        for (ty, n) in &other.counts {
            *counts.entry(*ty).or_insert(0) += n;
        }
        KeywordProfile { counts }
    }

    fn strongest_type(&self, family: StructureType) -> Option<RelationshipType> {
        let mut best: Option<(RelationshipType, usize)> = None;
        for ty in TYPE_PRIORITY {
            if ty.natural_category() != family {
                continue;
            }
            let n = self.count(*ty);
            if n > 0 && best.map_or(true, |(_, b)| n > b) {
                best = Some((*ty, n));
            }
        }
        best.map(|(ty, _)| ty)
    }
}

/// Score for one keyword family
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CategoryScore {
    pub matches: usize,
    pub confidence: f32,
}

/// Outcome of matching a concept pair against the keyword families
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternResult {
    pub hierarchical: CategoryScore,
    pub sequential: CategoryScore,
    pub dominant_category: StructureType,
    /// Confidence of the dominant category (0 when unclassified by absence)
    pub confidence: f32,
    /// Relationship type suggested by the strongest sub-family
    pub suggested_type: RelationshipType,
}

impl PatternResult {
    pub fn category_score(&self, category: StructureType) -> Option<&CategoryScore> {
        match category {
            StructureType::Hierarchical => Some(&self.hierarchical),
            StructureType::Sequential => Some(&self.sequential),
            StructureType::Unclassified => None,
        }
    }

    pub fn total_matches(&self) -> usize {
        self.hierarchical.matches + self.sequential.matches
    }
}

/// Scores concept pairs against curated keyword families.
///
/// Pure: results depend only on the concepts' definition and excerpt text.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    phrases: Vec<(Vec<String>, RelationshipType)>,
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternMatcher {
    pub fn new() -> Self {
        let phrases = KEYWORDS
            .iter()
            .map(|(phrase, ty)| (tokenize(phrase), *ty))
            .collect();
        Self { phrases }
    }

    /// Count keyword matches in a concept's definition and excerpts
    pub fn profile(&self, concept: &Concept) -> KeywordProfile {
        let mut profile = self.profile_text(&concept.definition);
        for excerpt in &concept.source_excerpts {
            profile = profile.combine(&self.profile_text(excerpt));
        }
        profile
    }

    pub fn profile_text(&self, text: &str) -> KeywordProfile {
        let tokens = tokenize(text);
        let mut counts = HashMap::new();
        for (phrase, ty) in &self.phrases {
            let n = count_phrase(&tokens, phrase);
            if n > 0 {
                *counts.entry(*ty).or_insert(0) += n;
            }
        }
        KeywordProfile { counts }
    }

    /// Match a concept pair
    pub fn match_pair(&self, a: &Concept, b: &Concept) -> PatternResult {
        self.score(&self.profile(a).combine(&self.profile(b)))
    }

    /// Score a combined keyword profile
    pub fn score(&self, profile: &KeywordProfile) -> PatternResult {
        let h = profile.family_matches(StructureType::Hierarchical);
        let s = profile.family_matches(StructureType::Sequential);
        let total = h + s;

        let hierarchical = CategoryScore {
            matches: h,
            confidence: family_confidence(h, total),
        };
        let sequential = CategoryScore {
            matches: s,
            confidence: family_confidence(s, total),
        };

        let (dominant_category, confidence) = if h > s {
            (StructureType::Hierarchical, hierarchical.confidence)
        } else if s > h {
            (StructureType::Sequential, sequential.confidence)
        } else {
            // Tie (including no matches at all)
            (StructureType::Unclassified, hierarchical.confidence)
        };

        let suggested_type = profile
            .strongest_type(dominant_category)
            .unwrap_or(RelationshipType::RelatedTo);

        PatternResult {
            hierarchical,
            sequential,
            dominant_category,
            confidence,
            suggested_type,
        }
    }
}

/// dominance = score / (total + 1), strength = min(score / 3, 1),
/// confidence = dominance * 0.6 + strength * 0.4
fn family_confidence(family_score: usize, total_matches: usize) -> f32 {
    let dominance = family_score as f32 / (total_matches as f32 + 1.0);
    let strength = (family_score as f32 / 3.0).min(1.0);
    dominance * 0.6 + strength * 0.4
}

pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn count_phrase(tokens: &[String], phrase: &[String]) -> usize {
    if phrase.is_empty() || tokens.len() < phrase.len() {
        return 0;
    }
    tokens
        .windows(phrase.len())
        .filter(|w| w.iter().zip(phrase).all(|(t, p)| t == p))
        .count()
}
