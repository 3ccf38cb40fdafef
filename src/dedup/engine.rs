//! Duplicate detection and reversible merges
//!
//! A merge folds a duplicate concept into a primary: the primary absorbs
//! the duplicate's excerpts and neighbors, every relationship touching the
//! duplicate is redirected to the primary, and the duplicate is marked
//! `MergedInto(primary)`. Everything needed to reverse the merge exactly is
//! written to a [`MergeRecord`], which is the only input `undo_merge` trusts.
//!
//! Both operations plan against copies and commit in one step, so a
//! rejected or inconsistent request leaves the document untouched.

use super::similarity::{SimilarityRule, SimilarityScorer};
use crate::config::{Blocking, DedupConfig};
use crate::document::DocumentGraph;
use crate::model::{Concept, ConceptId, ConceptState, Relationship, RelationshipId, RelationshipKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a merge request was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeRejection {
    #[error("cannot merge concept {0} into itself")]
    SameConcept(ConceptId),

    #[error("concept {0} not found")]
    NotFound(ConceptId),

    #[error("concept {0} is not active")]
    NotActive(ConceptId),

    #[error("concepts {primary} and {duplicate} belong to different documents")]
    CrossDocument {
        primary: ConceptId,
        duplicate: ConceptId,
    },
}

/// Errors from merge and undo. None of them leave partial changes behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("invalid merge request: {0}")]
    InvalidMergeRequest(#[from] MergeRejection),

    #[error("no merge to undo for concept {0}")]
    UndoNotAvailable(ConceptId),

    #[error("merge state is inconsistent: {0}")]
    Inconsistent(String),
}

/// A likely duplicate pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateCandidate {
    pub concept_a: ConceptId,
    pub concept_b: ConceptId,
    pub term_a: String,
    pub term_b: String,
    pub score: f32,
    pub rule: SimilarityRule,
    pub reasoning: String,
}

/// What a merge would do, computed without mutating anything
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergePreview {
    pub primary_id: ConceptId,
    pub duplicate_id: ConceptId,
    /// Primary's excerpts followed by the duplicate's new ones
    pub consolidated_excerpts: Vec<String>,
    pub consolidated_neighbors: BTreeSet<String>,
    pub chosen_importance: f32,
    /// Relationships that touch the duplicate
    pub affected_relationship_count: usize,
}

/// A relationship whose endpoint was moved from the duplicate to the primary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedirectedEndpoint {
    pub relationship_id: RelationshipId,
    pub original_source: ConceptId,
    pub original_target: ConceptId,
}

/// A relationship dropped during redirection, with its original position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedRelationship {
    pub index: usize,
    pub relationship: Relationship,
}

/// Bookkeeping for one merge; consumed by `undo_merge`
///
/// `added_excerpts` and `added_neighbors` list only what this merge gave
/// the primary. When another duplicate merged into the same primary carried
/// one of those items too, undoing this merge leaves the item on the
/// primary and moves it to that other record, so undoing both in any order
/// restores the primary exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeRecord {
    pub primary_id: ConceptId,
    pub duplicate_id: ConceptId,
    /// The duplicate exactly as it was before the merge
    pub duplicate_snapshot: Concept,
    pub redirected: Vec<RedirectedEndpoint>,
    /// Self-loops and parallel edges dropped by the redirection
    pub removed: Vec<RemovedRelationship>,
    /// Excerpts the primary gained from the duplicate
    pub added_excerpts: Vec<String>,
    /// Neighbor terms the primary gained from the duplicate
    pub added_neighbors: Vec<String>,
    pub primary_prior_importance: f32,
    pub merged_importance: f32,
    pub merged_at: DateTime<Utc>,
}

/// Finds duplicate concepts and performs reversible merges
#[derive(Debug, Clone, Default)]
pub struct DeduplicationEngine {
    scorer: SimilarityScorer,
    config: DedupConfig,
}

impl DeduplicationEngine {
    pub fn new(config: DedupConfig) -> Self {
        Self {
            scorer: SimilarityScorer::new(),
            config,
        }
    }

    pub fn scorer(&self) -> &SimilarityScorer {
        &self.scorer
    }

    /// Default threshold for `find_duplicates`
    pub fn threshold(&self) -> f32 {
        self.config.threshold
    }

    /// Active concept pairs scoring at least `threshold`, best first.
    pub fn find_duplicates(&self, concepts: &[Concept], threshold: f32) -> Vec<DuplicateCandidate> {
        let active: Vec<&Concept> = concepts.iter().filter(|c| c.is_active()).collect();
        let mut compared = 0usize;
        let mut candidates = Vec::new();

        for i in 0..active.len() {
            for j in (i + 1)..active.len() {
                let (a, b) = (active[i], active[j]);
                if a.id == b.id {
                    continue;
                }
                if self.config.blocking == Blocking::TermPrefix && !share_prefix(&a.term, &b.term) {
                    continue;
                }
                compared += 1;

                let m = self.scorer.similarity(a, b);
                if m.score >= threshold {
                    candidates.push(DuplicateCandidate {
                        concept_a: a.id,
                        concept_b: b.id,
                        term_a: a.term.clone(),
                        term_b: b.term.clone(),
                        score: m.score,
                        rule: m.rule,
                        reasoning: m.reasoning,
                    });
                }
            }
        }

        candidates.sort_by(|x, y| y.score.total_cmp(&x.score));
        info!(
            active = active.len(),
            compared,
            found = candidates.len(),
            threshold,
            "duplicate scan complete"
        );
        candidates
    }

    /// Describe a merge without performing it
    pub fn preview_merge(
        &self,
        graph: &DocumentGraph,
        primary_id: ConceptId,
        duplicate_id: ConceptId,
    ) -> Result<MergePreview, MergeError> {
        let (pi, di) = check_pair(graph, primary_id, duplicate_id)?;
        Ok(build_preview(graph, &graph.concepts[pi], &graph.concepts[di]))
    }

    /// Merge `duplicate_id` into `primary_id`, returning the updated primary.
    pub fn merge(
        &self,
        graph: &mut DocumentGraph,
        primary_id: ConceptId,
        duplicate_id: ConceptId,
    ) -> Result<Concept, MergeError> {
        let (pi, di) = check_pair(graph, primary_id, duplicate_id)?;
        if graph.merge_record(&duplicate_id).is_some() {
            return Err(MergeError::Inconsistent(format!(
                "active concept {} still has a merge record",
                duplicate_id
            )));
        }

        let primary = &graph.concepts[pi];
        let duplicate = &graph.concepts[di];
        let preview = build_preview(graph, primary, duplicate);

        let added_excerpts: Vec<String> =
            preview.consolidated_excerpts[primary.source_excerpts.len()..].to_vec();
        let added_neighbors: Vec<String> = preview
            .consolidated_neighbors
            .difference(&primary.neighbor_terms)
            .cloned()
            .collect();

        // Keys of relationships the merge leaves alone
        let mut keys: HashSet<RelationshipKey> = graph
            .relationships
            .iter()
            .filter(|r| !r.touches(&duplicate_id))
            .map(|r| r.key())
            .collect();

        let mut relationships = Vec::with_capacity(graph.relationships.len());
        let mut redirected = Vec::new();
        let mut removed = Vec::new();
        for (index, rel) in graph.relationships.iter().enumerate() {
            if !rel.touches(&duplicate_id) {
                relationships.push(rel.clone());
                continue;
            }

            let mut moved = rel.clone();
            if moved.source_id == duplicate_id {
                moved.source_id = primary_id;
            }
            if moved.target_id == duplicate_id {
                moved.target_id = primary_id;
            }

            if moved.source_id == moved.target_id || !keys.insert(moved.key()) {
                debug!(relationship = %rel.id, "dropping relationship made redundant by merge");
                removed.push(RemovedRelationship {
                    index,
                    relationship: rel.clone(),
                });
                continue;
            }

            redirected.push(RedirectedEndpoint {
                relationship_id: rel.id,
                original_source: rel.source_id,
                original_target: rel.target_id,
            });
            relationships.push(moved);
        }

        let record = MergeRecord {
            primary_id,
            duplicate_id,
            duplicate_snapshot: duplicate.clone(),
            redirected,
            removed,
            added_excerpts,
            added_neighbors,
            primary_prior_importance: primary.importance_score,
            merged_importance: preview.chosen_importance,
            merged_at: Utc::now(),
        };

        // Commit
        let primary = &mut graph.concepts[pi];
        primary.source_excerpts = preview.consolidated_excerpts;
        primary.neighbor_terms = preview.consolidated_neighbors;
        primary.importance_score = preview.chosen_importance;
        let merged = primary.clone();

        graph.concepts[di].state = ConceptState::MergedInto(primary_id);
        graph.relationships = relationships;
        info!(
            primary = %primary_id,
            duplicate = %duplicate_id,
            redirected = record.redirected.len(),
            dropped = record.removed.len(),
            "merged concepts"
        );
        graph.merge_records.push(record);
        graph.touch();

        Ok(merged)
    }

    /// Reverse the merge of `duplicate_id`, returning the restored concept.
    pub fn undo_merge(
        &self,
        graph: &mut DocumentGraph,
        duplicate_id: ConceptId,
    ) -> Result<Concept, MergeError> {
        let record_idx = graph
            .merge_records
            .iter()
            .position(|m| m.duplicate_id == duplicate_id)
            .ok_or(MergeError::UndoNotAvailable(duplicate_id))?;
        let record = &graph.merge_records[record_idx];
        let primary_id = record.primary_id;

        let di = graph.position(&duplicate_id).ok_or_else(|| {
            MergeError::Inconsistent(format!("merged concept {} is missing", duplicate_id))
        })?;
        if graph.concepts[di].state != ConceptState::MergedInto(primary_id) {
            return Err(MergeError::Inconsistent(format!(
                "concept {} is not merged into {}",
                duplicate_id, primary_id
            )));
        }
        let pi = graph.position(&primary_id).ok_or_else(|| {
            MergeError::Inconsistent(format!("primary concept {} is missing", primary_id))
        })?;
        if !graph.concepts[pi].is_active() {
            return Err(MergeError::Inconsistent(format!(
                "primary {} has since been merged; undo that merge first",
                primary_id
            )));
        }

        let mut relationships = graph.relationships.clone();
        for entry in &record.redirected {
            let rel = relationships
                .iter_mut()
                .find(|r| r.id == entry.relationship_id)
                .ok_or_else(|| {
                    MergeError::Inconsistent(format!(
                        "redirected relationship {} no longer exists",
                        entry.relationship_id
                    ))
                })?;
            let swap = |id: ConceptId| if id == duplicate_id { primary_id } else { id };
            if rel.source_id != swap(entry.original_source) || rel.target_id != swap(entry.original_target) {
                return Err(MergeError::Inconsistent(format!(
                    "relationship {} was re-pointed after the merge",
                    entry.relationship_id
                )));
            }
            rel.source_id = entry.original_source;
            rel.target_id = entry.original_target;
        }

        let mut reinstated = record.removed.clone();
        reinstated.sort_by_key(|r| r.index);
        for RemovedRelationship { index, relationship } in reinstated {
            let at = index.min(relationships.len());
            relationships.insert(at, relationship);
        }

        let mut seen = HashSet::new();
        for rel in &relationships {
            if !seen.insert(rel.key()) {
                return Err(MergeError::Inconsistent(format!(
                    "undo would create a parallel {} relationship between {} and {}",
                    rel.relationship_type, rel.source_id, rel.target_id
                )));
            }
        }

        // Items another merge into this primary also brought stay put
        let mut handed_off_excerpts = Vec::new();
        let mut stripped_excerpts = Vec::new();
        for excerpt in &record.added_excerpts {
            match co_contributor(&graph.merge_records, record_idx, primary_id, |c| {
                c.source_excerpts.contains(excerpt)
            }) {
                Some(other) => handed_off_excerpts.push((other, excerpt.clone())),
                None => stripped_excerpts.push(excerpt),
            }
        }
        let mut handed_off_neighbors = Vec::new();
        let mut stripped_neighbors = Vec::new();
        for neighbor in &record.added_neighbors {
            match co_contributor(&graph.merge_records, record_idx, primary_id, |c| {
                c.neighbor_terms.contains(neighbor)
            }) {
                Some(other) => handed_off_neighbors.push((other, neighbor.clone())),
                None => stripped_neighbors.push(neighbor),
            }
        }

        let mut primary = graph.concepts[pi].clone();
        primary
            .source_excerpts
            .retain(|e| !stripped_excerpts.contains(&e));
        for neighbor in stripped_neighbors {
            primary.neighbor_terms.remove(neighbor);
        }
        if primary.importance_score == record.merged_importance {
            primary.importance_score = record.primary_prior_importance;
        } else {
            warn!(
                primary = %primary_id,
                "primary importance changed since merge; keeping current value"
            );
        }
        let restored = record.duplicate_snapshot.clone();

        // Commit
        info!(
            primary = %primary_id,
            duplicate = %duplicate_id,
            restored = record.redirected.len(),
            reinstated = record.removed.len(),
            "undid merge"
        );
        graph.concepts[pi] = primary;
        graph.concepts[di] = restored.clone();
        graph.relationships = relationships;
        for (other, excerpt) in handed_off_excerpts {
            graph.merge_records[other].added_excerpts.push(excerpt);
        }
        for (other, neighbor) in handed_off_neighbors {
            graph.merge_records[other].added_neighbors.push(neighbor);
        }
        graph.merge_records.remove(record_idx);
        graph.touch();

        Ok(restored)
    }
}

/// Index of another merge into `primary_id` whose duplicate carried an item
fn co_contributor(
    records: &[MergeRecord],
    skip: usize,
    primary_id: ConceptId,
    carried: impl Fn(&Concept) -> bool,
) -> Option<usize> {
    records
        .iter()
        .enumerate()
        .find(|(i, m)| *i != skip && m.primary_id == primary_id && carried(&m.duplicate_snapshot))
        .map(|(i, _)| i)
}

/// Positions of primary and duplicate, both present and active
fn check_pair(
    graph: &DocumentGraph,
    primary_id: ConceptId,
    duplicate_id: ConceptId,
) -> Result<(usize, usize), MergeRejection> {
    if primary_id == duplicate_id {
        return Err(MergeRejection::SameConcept(primary_id));
    }
    let pi = graph
        .position(&primary_id)
        .ok_or(MergeRejection::NotFound(primary_id))?;
    let di = graph
        .position(&duplicate_id)
        .ok_or(MergeRejection::NotFound(duplicate_id))?;
    if !graph.concepts[pi].is_active() {
        return Err(MergeRejection::NotActive(primary_id));
    }
    if !graph.concepts[di].is_active() {
        return Err(MergeRejection::NotActive(duplicate_id));
    }
    Ok((pi, di))
}

fn build_preview(graph: &DocumentGraph, primary: &Concept, duplicate: &Concept) -> MergePreview {
    let mut consolidated_excerpts = primary.source_excerpts.clone();
    for excerpt in &duplicate.source_excerpts {
        if !consolidated_excerpts.contains(excerpt) {
            consolidated_excerpts.push(excerpt.clone());
        }
    }

    let consolidated_neighbors = primary
        .neighbor_terms
        .union(&duplicate.neighbor_terms)
        .cloned()
        .collect();

    MergePreview {
        primary_id: primary.id,
        duplicate_id: duplicate.id,
        consolidated_excerpts,
        consolidated_neighbors,
        chosen_importance: primary.importance_score.max(duplicate.importance_score),
        affected_relationship_count: graph.relationships_of(&duplicate.id).count(),
    }
}

/// First alphanumeric characters match, ignoring case
fn share_prefix(a: &str, b: &str) -> bool {
    let first = |s: &str| s.chars().find(|c| c.is_alphanumeric()).map(|c| c.to_lowercase().to_string());
    match (first(a), first(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}
