//! Concept representation extracted from a document

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Unique identifier for a concept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConceptId(Uuid);

impl ConceptId {
    /// Create a new random ConceptId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a ConceptId from an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ConceptId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConceptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Structural grouping of a concept or relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureType {
    Hierarchical,
    Sequential,
    #[default]
    Unclassified,
}

impl StructureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hierarchical => "hierarchical",
            Self::Sequential => "sequential",
            Self::Unclassified => "unclassified",
        }
    }
}

impl std::fmt::Display for StructureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a concept.
///
/// A merged concept keeps its identity so the merge can be undone, but it
/// never appears as an endpoint of a live relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptState {
    #[default]
    Active,
    MergedInto(ConceptId),
}

impl ConceptState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Where in the source document a concept was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    /// Page number (or section index for unpaged sources)
    pub page: u32,
    /// Character offset within the page
    #[serde(default)]
    pub offset: u64,
}

impl Location {
    pub fn new(page: u32, offset: u64) -> Self {
        Self { page, offset }
    }

    pub fn page_distance(&self, other: &Location) -> u32 {
        self.page.abs_diff(other.page)
    }
}

/// A term + definition + context record extracted from a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    /// Unique identifier
    pub id: ConceptId,
    /// The term as it appears in the document
    pub term: String,
    /// Definition text
    pub definition: String,
    /// Ordered source excerpts the concept was extracted from
    pub source_excerpts: Vec<String>,
    /// Page/offset hint
    pub location: Option<Location>,
    /// Terms of concepts found nearby in the document
    pub neighbor_terms: BTreeSet<String>,
    /// Structural grouping, assigned by the classifier
    pub structure_type: StructureType,
    /// Importance score (0.0 - 1.0)
    pub importance_score: f32,
    /// Optional embedding vector, produced upstream
    pub embedding: Option<Vec<f32>>,
    /// Lifecycle state, changed only by merge and undo
    pub state: ConceptState,
}

impl Concept {
    /// Create a new active concept with the given term and definition
    pub fn new(term: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            id: ConceptId::new(),
            term: term.into(),
            definition: definition.into(),
            source_excerpts: Vec::new(),
            location: None,
            neighbor_terms: BTreeSet::new(),
            structure_type: StructureType::Unclassified,
            importance_score: 0.0,
            embedding: None,
            state: ConceptState::Active,
        }
    }

    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.source_excerpts.push(excerpt.into());
        self
    }

    pub fn with_location(mut self, page: u32, offset: u64) -> Self {
        self.location = Some(Location::new(page, offset));
        self
    }

    pub fn with_neighbor(mut self, term: impl Into<String>) -> Self {
        self.neighbor_terms.insert(term.into());
        self
    }

    pub fn with_importance(mut self, importance: f32) -> Self {
        self.importance_score = importance.clamp(0.0, 1.0);
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Definition followed by every excerpt, for keyword scanning.
    pub fn combined_text(&self) -> String {
        let mut text = self.definition.clone();
        for excerpt in &self.source_excerpts {
            text.push('\n');
            text.push_str(excerpt);
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_concept_is_active_and_unclassified() {
        let concept = Concept::new("Kernel", "The core of an operating system");
        assert!(concept.is_active());
        assert_eq!(concept.structure_type, StructureType::Unclassified);
        assert!(concept.embedding.is_none());
    }

    #[test]
    fn importance_is_clamped_by_builder() {
        let concept = Concept::new("a", "b").with_importance(1.7);
        assert_eq!(concept.importance_score, 1.0);
    }

    #[test]
    fn merged_state_serializes_with_primary() {
        let primary = ConceptId::new();
        let json = serde_json::to_value(ConceptState::MergedInto(primary)).unwrap();
        assert_eq!(json["merged_into"], primary.to_string());

        let active = serde_json::to_value(ConceptState::Active).unwrap();
        assert_eq!(active, "active");
    }

    #[test]
    fn combined_text_joins_definition_and_excerpts() {
        let concept = Concept::new("Cache", "fast storage")
            .with_excerpt("first excerpt")
            .with_excerpt("second excerpt");
        assert_eq!(
            concept.combined_text(),
            "fast storage\nfirst excerpt\nsecond excerpt"
        );
    }
}
