//! Relationship classification and detection
//!
//! Combines keyword patterns, contextual proximity and the external
//! validator. Validator failures degrade single pairs to pattern-only
//! results; neither entry point fails as a whole.

use super::context::ContextAnalyzer;
use super::pattern::{KeywordProfile, PatternMatcher, PatternResult};
use crate::config::{ClassifierConfig, EngineConfig};
use crate::model::{Concept, ConceptId, Relationship, RelationshipKey, StructureType};
use crate::validator::{Judgment, JudgmentDirection, ValidationGate, ValidationRequest, ValidatorError};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Weight of the validator's strength in a validated relationship
const JUDGMENT_WEIGHT: f32 = 0.8;
/// Weight of context strength in a validated relationship
const CONTEXT_WEIGHT_VALIDATED: f32 = 0.2;
/// Weight of pattern confidence in a detection candidate
const PATTERN_WEIGHT_CANDIDATE: f32 = 0.7;
/// Weight of context strength in a detection candidate
const CONTEXT_WEIGHT_CANDIDATE: f32 = 0.3;

/// Relationships produced by a batch plus what happened along the way
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassificationReport {
    pub relationships: Vec<Relationship>,
    /// Pairs (detect) or relationships (classify) looked at
    pub pairs_considered: usize,
    /// Pairs skipped for having no keyword evidence and too little context
    pub pairs_pruned: usize,
    /// Pairs whose candidate confidence missed the threshold
    pub below_threshold: usize,
    pub validated: usize,
    pub degraded: usize,
    /// Relationships dropped for dangling/inactive endpoints or as duplicates
    pub dropped: usize,
}

impl ClassificationReport {
    fn tally(&mut self) {
        self.validated = self.relationships.iter().filter(|r| r.validated).count();
        self.degraded = self.relationships.iter().filter(|r| r.degraded).count();
    }
}

/// A pair that passed pre-filtering, waiting on the validator
struct Candidate {
    source: Arc<Concept>,
    target: Arc<Concept>,
    pattern: PatternResult,
    context_strength: f32,
    /// Score used when the validator fails
    fallback_strength: f32,
}

/// Orchestrates pattern matching, context analysis and validation.
pub struct RelationshipClassifier {
    patterns: PatternMatcher,
    context: ContextAnalyzer,
    gate: ValidationGate,
    config: ClassifierConfig,
}

impl RelationshipClassifier {
    pub fn new(gate: ValidationGate, config: &EngineConfig) -> Self {
        Self {
            patterns: PatternMatcher::new(),
            context: ContextAnalyzer::new(config.context.clone()),
            gate,
            config: config.classifier.clone(),
        }
    }

    pub fn patterns(&self) -> &PatternMatcher {
        &self.patterns
    }

    pub fn context(&self) -> &ContextAnalyzer {
        &self.context
    }

    pub fn default_min_strength(&self) -> f32 {
        self.config.min_strength
    }

    /// Re-classify existing relationships.
    ///
    /// Relationships whose endpoints are missing, merged, or identical are
    /// dropped. Validated strength is `judgment * 0.8 + context * 0.2`;
    /// degraded strength is the pattern confidence.
    pub async fn classify(
        &self,
        concepts: &[Concept],
        existing: &[Relationship],
    ) -> ClassificationReport {
        let mut report = ClassificationReport {
            pairs_considered: existing.len(),
            ..Default::default()
        };

        let active: HashMap<ConceptId, Arc<Concept>> = concepts
            .iter()
            .filter(|c| c.is_active())
            .map(|c| (c.id, Arc::new(c.clone())))
            .collect();
        let mut profiles: HashMap<ConceptId, KeywordProfile> = HashMap::new();

        let mut kept: Vec<(Relationship, Candidate)> = Vec::new();
        for rel in existing {
            let (Some(source), Some(target)) = (active.get(&rel.source_id), active.get(&rel.target_id)) else {
                warn!(relationship = %rel.id, "dropping relationship with missing or merged endpoint");
                report.dropped += 1;
                continue;
            };
            if source.id == target.id {
                warn!(relationship = %rel.id, "dropping self-referencing relationship");
                report.dropped += 1;
                continue;
            }

            let pa = profiles
                .entry(source.id)
                .or_insert_with(|| self.patterns.profile(source))
                .clone();
            let pb = profiles
                .entry(target.id)
                .or_insert_with(|| self.patterns.profile(target))
                .clone();
            let pattern = self.patterns.score(&pa.combine(&pb));
            let context_strength = self.context.context_strength(source, target);

            kept.push((
                rel.clone(),
                Candidate {
                    source: source.clone(),
                    target: target.clone(),
                    fallback_strength: pattern.confidence,
                    pattern,
                    context_strength,
                },
            ));
        }

        let requests = kept.iter().map(|(_, c)| request_for(c)).collect();
        let judgments = self.gate.validate_batch(requests).await;

        let mut refined = Vec::with_capacity(kept.len());
        for ((mut rel, candidate), outcome) in kept.into_iter().zip(judgments) {
            match outcome {
                Ok(judgment) => apply_judgment(&mut rel, &judgment, candidate.context_strength),
                Err(e) => {
                    let upstream = rel.structure_category;
                    apply_fallback(&mut rel, &candidate, &e);
                    // No pattern evidence: keep the upstream type and category
                    if candidate.pattern.dominant_category == StructureType::Unclassified {
                        rel.structure_category = upstream;
                    } else {
                        rel.relationship_type = candidate.pattern.suggested_type;
                    }
                }
            }
            refined.push(rel);
        }

        let (relationships, duplicates) = dedupe(refined);
        report.dropped += duplicates;
        report.relationships = relationships;
        report.tally();

        info!(
            considered = report.pairs_considered,
            validated = report.validated,
            degraded = report.degraded,
            dropped = report.dropped,
            validator = self.gate.validator_id(),
            "classified relationships"
        );
        report
    }

    /// Detect new relationships among active concepts.
    ///
    /// Pairs with no keyword evidence are pruned when their context strength
    /// is below the floor (or zero). Candidates with `pattern * 0.7 + context * 0.3 >= min_strength` go to the
    /// validator; failures fall back to the candidate confidence.
    pub async fn detect(&self, concepts: &[Concept], min_strength: f32) -> ClassificationReport {
        let mut report = ClassificationReport::default();

        let active: Vec<Arc<Concept>> = concepts
            .iter()
            .filter(|c| c.is_active())
            .map(|c| Arc::new(c.clone()))
            .collect();
        let profiles: Vec<KeywordProfile> =
            active.iter().map(|c| self.patterns.profile(c)).collect();

        let mut candidates = Vec::new();
        for i in 0..active.len() {
            for j in (i + 1)..active.len() {
                let (a, b) = (&active[i], &active[j]);
                if a.id == b.id {
                    continue;
                }
                report.pairs_considered += 1;

                let context_strength = self.context.context_strength(a, b);
                let pattern = self.patterns.score(&profiles[i].combine(&profiles[j]));
                if pattern.total_matches() == 0
                    && (context_strength < self.config.context_floor || context_strength == 0.0)
                {
                    report.pairs_pruned += 1;
                    continue;
                }

                let candidate_confidence = pattern.confidence * PATTERN_WEIGHT_CANDIDATE
                    + context_strength * CONTEXT_WEIGHT_CANDIDATE;
                if candidate_confidence < min_strength {
                    report.below_threshold += 1;
                    continue;
                }

                let (source, target) = orient(a, b, pattern.dominant_category);
                debug!(
                    source = %source.term,
                    target = %target.term,
                    candidate = candidate_confidence,
                    "candidate relationship"
                );
                candidates.push(Candidate {
                    source: source.clone(),
                    target: target.clone(),
                    pattern,
                    context_strength,
                    fallback_strength: candidate_confidence,
                });
            }
        }

        let requests = candidates.iter().map(request_for).collect();
        let judgments = self.gate.validate_batch(requests).await;

        let mut emitted = Vec::with_capacity(candidates.len());
        for (candidate, outcome) in candidates.into_iter().zip(judgments) {
            let mut rel = Relationship::new(
                candidate.source.id,
                candidate.target.id,
                candidate.pattern.suggested_type,
                candidate.pattern.dominant_category,
                candidate.fallback_strength,
            );
            match outcome {
                Ok(judgment) => apply_judgment(&mut rel, &judgment, candidate.context_strength),
                Err(e) => apply_fallback(&mut rel, &candidate, &e),
            }
            emitted.push(rel);
        }

        let (relationships, duplicates) = dedupe(emitted);
        report.dropped += duplicates;
        report.relationships = relationships;
        report.tally();

        info!(
            considered = report.pairs_considered,
            pruned = report.pairs_pruned,
            below_threshold = report.below_threshold,
            emitted = report.relationships.len(),
            validated = report.validated,
            degraded = report.degraded,
            validator = self.gate.validator_id(),
            "detected relationships"
        );
        report
    }
}

fn request_for(candidate: &Candidate) -> ValidationRequest {
    ValidationRequest {
        a: candidate.source.clone(),
        b: candidate.target.clone(),
        hint: candidate.pattern.clone(),
    }
}

fn apply_judgment(rel: &mut Relationship, judgment: &Judgment, context_strength: f32) {
    rel.structure_category = judgment.structure_category;
    rel.relationship_type = judgment.relationship_type;
    rel.set_strength(judgment.strength * JUDGMENT_WEIGHT + context_strength * CONTEXT_WEIGHT_VALIDATED);
    rel.validated = true;
    rel.degraded = false;
    rel.reasoning = if judgment.reasoning.is_empty() {
        None
    } else {
        Some(judgment.reasoning.clone())
    };
    if judgment.direction == JudgmentDirection::Reverse {
        rel.reverse();
    }
}

fn apply_fallback(rel: &mut Relationship, candidate: &Candidate, error: &ValidatorError) {
    rel.structure_category = candidate.pattern.dominant_category;
    rel.set_strength(candidate.fallback_strength);
    rel.validated = false;
    rel.degraded = true;
    rel.reasoning = Some(format!("pattern-only ({})", error));
}

/// Sequential pairs run from the earlier location to the later one.
fn orient<'a>(
    a: &'a Arc<Concept>,
    b: &'a Arc<Concept>,
    category: StructureType,
) -> (&'a Arc<Concept>, &'a Arc<Concept>) {
    if category == StructureType::Sequential {
        if let (Some(la), Some(lb)) = (a.location, b.location) {
            if (lb.page, lb.offset) < (la.page, la.offset) {
                return (b, a);
            }
        }
    }
    (a, b)
}

/// Collapse relationships sharing (source, target, type), keeping the
/// strongest. Returns the survivors in first-seen order and the number dropped.
fn dedupe(relationships: Vec<Relationship>) -> (Vec<Relationship>, usize) {
    let mut best: HashMap<RelationshipKey, usize> = HashMap::new();
    let mut out: Vec<Relationship> = Vec::with_capacity(relationships.len());
    let mut dropped = 0;
    for rel in relationships {
        match best.get(&rel.key()) {
            Some(&idx) => {
                dropped += 1;
                if rel.strength > out[idx].strength {
                    out[idx] = rel;
                }
            }
            None => {
                best.insert(rel.key(), out.len());
                out.push(rel);
            }
        }
    }
    (out, dropped)
}

/// Set each active concept's structure type to the category with the
/// greatest summed strength over its relationships. Ties and concepts
/// without categorized relationships become unclassified.
pub fn assign_structure_types(concepts: &mut [Concept], relationships: &[Relationship]) {
    let mut totals: HashMap<ConceptId, (f32, f32)> = HashMap::new();
    for rel in relationships {
        for id in [rel.source_id, rel.target_id] {
            let entry = totals.entry(id).or_insert((0.0, 0.0));
            match rel.structure_category {
                StructureType::Hierarchical => entry.0 += rel.strength,
                StructureType::Sequential => entry.1 += rel.strength,
                StructureType::Unclassified => {}
            }
        }
    }

    let touched: HashSet<ConceptId> = totals.keys().copied().collect();
    for concept in concepts.iter_mut().filter(|c| c.is_active()) {
        concept.structure_type = if !touched.contains(&concept.id) {
            StructureType::Unclassified
        } else {
            let (h, s) = totals[&concept.id];
            if h > s {
                StructureType::Hierarchical
            } else if s > h {
                StructureType::Sequential
            } else {
                StructureType::Unclassified
            }
        };
    }
}
