//! Ingress records from the upstream extractor
//!
//! Wire-form records are loosely typed (optional ids, unchecked scores).
//! They are validated exactly once here and converted into the internal
//! model; everything past this boundary works on checked values.

use super::concept::{Concept, ConceptId, ConceptState, Location, StructureType};
use super::relationship::{Relationship, RelationshipId, RelationshipType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while validating ingress records
#[derive(Debug, Error, PartialEq)]
pub enum IngestError {
    #[error("concept {0} has an empty term")]
    EmptyTerm(String),

    #[error("concept '{term}' has importance {value} outside [0, 1]")]
    ImportanceOutOfRange { term: String, value: f32 },

    #[error("concept '{0}' has a non-finite embedding component")]
    NonFiniteEmbedding(String),

    #[error("duplicate concept id: {0}")]
    DuplicateConcept(ConceptId),

    #[error("relationship {0} points at itself")]
    SelfRelationship(String),

    #[error("relationship strength {0} outside [0, 1]")]
    StrengthOutOfRange(f32),

    #[error("relationship references unknown concept: {0}")]
    UnknownEndpoint(ConceptId),

    #[error("relationship references merged concept: {0}")]
    MergedEndpoint(ConceptId),

    #[error("merge record for {0} does not match the concept's state")]
    OrphanMergeRecord(ConceptId),
}

/// A concept as delivered by the extractor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptRecord {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub term: String,
    #[serde(default)]
    pub definition: String,
    #[serde(default)]
    pub source_excerpts: Vec<String>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub neighbor_terms: Vec<String>,
    #[serde(default)]
    pub structure_type: StructureType,
    #[serde(default)]
    pub importance_score: f32,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub state: ConceptState,
}

impl TryFrom<ConceptRecord> for Concept {
    type Error = IngestError;

    fn try_from(record: ConceptRecord) -> Result<Self, Self::Error> {
        let term = record.term.trim().to_string();
        if term.is_empty() {
            let label = record
                .id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "<unnamed>".to_string());
            return Err(IngestError::EmptyTerm(label));
        }

        if !record.importance_score.is_finite() || !(0.0..=1.0).contains(&record.importance_score) {
            return Err(IngestError::ImportanceOutOfRange {
                term,
                value: record.importance_score,
            });
        }

        if let Some(embedding) = &record.embedding {
            if embedding.iter().any(|x| !x.is_finite()) {
                return Err(IngestError::NonFiniteEmbedding(term));
            }
        }

        Ok(Concept {
            id: record.id.map(ConceptId::from_uuid).unwrap_or_default(),
            term,
            definition: record.definition,
            source_excerpts: record.source_excerpts,
            location: record.location,
            neighbor_terms: record
                .neighbor_terms
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            structure_type: record.structure_type,
            importance_score: record.importance_score,
            embedding: record.embedding.filter(|e| !e.is_empty()),
            state: record.state,
        })
    }
}

impl From<&Concept> for ConceptRecord {
    fn from(concept: &Concept) -> Self {
        Self {
            id: Some(*concept.id.as_uuid()),
            term: concept.term.clone(),
            definition: concept.definition.clone(),
            source_excerpts: concept.source_excerpts.clone(),
            location: concept.location,
            neighbor_terms: concept.neighbor_terms.iter().cloned().collect(),
            structure_type: concept.structure_type,
            importance_score: concept.importance_score,
            embedding: concept.embedding.clone(),
            state: concept.state,
        }
    }
}

/// A relationship as delivered by an upstream store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipRecord {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub source_id: ConceptId,
    pub target_id: ConceptId,
    #[serde(default = "default_relationship_type")]
    pub relationship_type: RelationshipType,
    #[serde(default)]
    pub structure_category: StructureType,
    #[serde(default)]
    pub strength: f32,
    #[serde(default)]
    pub validated: bool,
    #[serde(default)]
    pub degraded: bool,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_relationship_type() -> RelationshipType {
    RelationshipType::RelatedTo
}

impl TryFrom<RelationshipRecord> for Relationship {
    type Error = IngestError;

    fn try_from(record: RelationshipRecord) -> Result<Self, Self::Error> {
        if record.source_id == record.target_id {
            return Err(IngestError::SelfRelationship(record.source_id.to_string()));
        }
        if !record.strength.is_finite() || !(0.0..=1.0).contains(&record.strength) {
            return Err(IngestError::StrengthOutOfRange(record.strength));
        }

        Ok(Relationship {
            id: record.id.map(RelationshipId::from_uuid).unwrap_or_default(),
            source_id: record.source_id,
            target_id: record.target_id,
            relationship_type: record.relationship_type,
            structure_category: record.structure_category,
            strength: record.strength,
            validated: record.validated,
            degraded: record.degraded,
            reasoning: record.reasoning,
            created_at: record.created_at.unwrap_or_else(Utc::now),
        })
    }
}

impl From<&Relationship> for RelationshipRecord {
    fn from(rel: &Relationship) -> Self {
        Self {
            id: Some(*rel.id.as_uuid()),
            source_id: rel.source_id,
            target_id: rel.target_id,
            relationship_type: rel.relationship_type,
            structure_category: rel.structure_category,
            strength: rel.strength,
            validated: rel.validated,
            degraded: rel.degraded,
            reasoning: rel.reasoning.clone(),
            created_at: Some(rel.created_at),
        }
    }
}
