//! Typed, directed, weighted relationship between two concepts

use super::concept::{ConceptId, StructureType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationshipId(Uuid);

impl RelationshipId {
    /// Create a new random RelationshipId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RelationshipId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of relationship between two concepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    IsA,
    HasComponent,
    Contains,
    Precedes,
    Enables,
    ResultsIn,
    AppliesTo,
    ContrastsWith,
    RelatedTo,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IsA => "is_a",
            Self::HasComponent => "has_component",
            Self::Contains => "contains",
            Self::Precedes => "precedes",
            Self::Enables => "enables",
            Self::ResultsIn => "results_in",
            Self::AppliesTo => "applies_to",
            Self::ContrastsWith => "contrasts_with",
            Self::RelatedTo => "related_to",
        }
    }

    /// The structure category a relationship of this type naturally falls in.
    pub fn natural_category(&self) -> StructureType {
        match self {
            Self::IsA | Self::HasComponent | Self::Contains => StructureType::Hierarchical,
            Self::Precedes | Self::Enables | Self::ResultsIn => StructureType::Sequential,
            Self::AppliesTo | Self::ContrastsWith | Self::RelatedTo => StructureType::Unclassified,
        }
    }
}

impl std::fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniqueness key: at most one relationship per (source, target, type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelationshipKey {
    pub source_id: ConceptId,
    pub target_id: ConceptId,
    pub relationship_type: RelationshipType,
}

/// A typed, directed, weighted edge between two concepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Unique identifier
    pub id: RelationshipId,
    pub source_id: ConceptId,
    pub target_id: ConceptId,
    pub relationship_type: RelationshipType,
    pub structure_category: StructureType,
    /// Strength (0.0 - 1.0)
    pub strength: f32,
    /// True if an external judgment contributed
    pub validated: bool,
    /// True if the validator was attempted but the result fell back to patterns
    pub degraded: bool,
    /// Validator reasoning, when one was given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Relationship {
    /// Create a new pattern-only relationship.
    ///
    /// Strength is clamped into [0, 1]; non-finite strengths become 0.
    pub fn new(
        source_id: ConceptId,
        target_id: ConceptId,
        relationship_type: RelationshipType,
        structure_category: StructureType,
        strength: f32,
    ) -> Self {
        Self {
            id: RelationshipId::new(),
            source_id,
            target_id,
            relationship_type,
            structure_category,
            strength: clamp_strength(strength),
            validated: false,
            degraded: false,
            reasoning: None,
            created_at: Utc::now(),
        }
    }

    pub fn key(&self) -> RelationshipKey {
        RelationshipKey {
            source_id: self.source_id,
            target_id: self.target_id,
            relationship_type: self.relationship_type,
        }
    }

    pub fn touches(&self, concept: &ConceptId) -> bool {
        self.source_id == *concept || self.target_id == *concept
    }

    /// The other endpoint, if `concept` is one of the two.
    pub fn other_endpoint(&self, concept: &ConceptId) -> Option<ConceptId> {
        if self.source_id == *concept {
            Some(self.target_id)
        } else if self.target_id == *concept {
            Some(self.source_id)
        } else {
            None
        }
    }

    pub fn set_strength(&mut self, strength: f32) {
        self.strength = clamp_strength(strength);
    }

    pub fn reverse(&mut self) {
        std::mem::swap(&mut self.source_id, &mut self.target_id);
    }
}

/// Clamp a score into [0, 1], mapping NaN to 0.
pub(crate) fn clamp_strength(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
