//! DocumentGraph: one document's concepts, relationships and merge history

use crate::classify::assign_structure_types;
use crate::dedup::MergeRecord;
use crate::model::{
    Concept, ConceptId, ConceptRecord, ConceptState, IngestError, Relationship,
    RelationshipRecord,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a document
///
/// Serializes as a plain string (UUID or a caller-chosen name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Create a new random DocumentId (UUID-based)
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Wire form of a document, as read from and written to JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<DocumentId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub concepts: Vec<ConceptRecord>,
    #[serde(default)]
    pub relationships: Vec<RelationshipRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merge_records: Vec<MergeRecord>,
}

/// The concept/relationship graph of a single document.
///
/// Holds the invariants the classifier and deduplicator rely on:
/// concept ids are unique, every relationship joins two distinct known
/// concepts, and no live relationship touches a merged concept.
#[derive(Debug, Clone)]
pub struct DocumentGraph {
    pub id: DocumentId,
    pub name: String,
    pub(crate) concepts: Vec<Concept>,
    pub(crate) relationships: Vec<Relationship>,
    /// At most one record per merged duplicate
    pub(crate) merge_records: Vec<MergeRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentGraph {
    /// Create an empty document with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(DocumentId::new(), name)
    }

    pub fn with_id(id: DocumentId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            concepts: Vec::new(),
            relationships: Vec::new(),
            merge_records: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate and load a wire-form document.
    ///
    /// Relationships sharing (source, target, type) collapse to the stronger one.
    pub fn from_records(record: DocumentRecord) -> Result<Self, IngestError> {
        let mut graph = Self::with_id(record.id.unwrap_or_default(), record.name);

        for concept in record.concepts {
            graph.add_concept(Concept::try_from(concept)?)?;
        }
        for concept in &graph.concepts {
            if let ConceptState::MergedInto(primary) = concept.state {
                if graph.position(&primary).is_none() {
                    return Err(IngestError::UnknownEndpoint(primary));
                }
            }
        }
        for rel in record.relationships {
            graph.add_relationship(Relationship::try_from(rel)?)?;
        }
        for merge in record.merge_records {
            let consistent = graph
                .concept(&merge.duplicate_id)
                .map(|c| c.state == ConceptState::MergedInto(merge.primary_id))
                .unwrap_or(false);
            if !consistent || graph.merge_record(&merge.duplicate_id).is_some() {
                return Err(IngestError::OrphanMergeRecord(merge.duplicate_id));
            }
            graph.merge_records.push(merge);
        }
        Ok(graph)
    }

    /// Wire form of the current state
    pub fn to_record(&self) -> DocumentRecord {
        DocumentRecord {
            id: Some(self.id.clone()),
            name: self.name.clone(),
            concepts: self.concepts.iter().map(ConceptRecord::from).collect(),
            relationships: self.relationships.iter().map(RelationshipRecord::from).collect(),
            merge_records: self.merge_records.clone(),
        }
    }

    /// Add a concept, rejecting duplicate ids
    pub fn add_concept(&mut self, concept: Concept) -> Result<ConceptId, IngestError> {
        if self.position(&concept.id).is_some() {
            return Err(IngestError::DuplicateConcept(concept.id));
        }
        let id = concept.id;
        self.concepts.push(concept);
        self.touch();
        Ok(id)
    }

    /// Add a relationship between two active concepts.
    ///
    /// An existing relationship with the same (source, target, type) is kept
    /// (same id), taking the new values only if the new one is stronger.
    /// Returns true if a new relationship was inserted.
    pub fn add_relationship(&mut self, rel: Relationship) -> Result<bool, IngestError> {
        if rel.source_id == rel.target_id {
            return Err(IngestError::SelfRelationship(rel.source_id.to_string()));
        }
        for endpoint in [rel.source_id, rel.target_id] {
            match self.concept(&endpoint) {
                None => return Err(IngestError::UnknownEndpoint(endpoint)),
                Some(c) if !c.is_active() => return Err(IngestError::MergedEndpoint(endpoint)),
                Some(_) => {}
            }
        }

        let key = rel.key();
        let inserted = match self.relationships.iter_mut().find(|r| r.key() == key) {
            Some(existing) => {
                if rel.strength > existing.strength {
                    let (id, created_at) = (existing.id, existing.created_at);
                    *existing = Relationship { id, created_at, ..rel };
                }
                false
            }
            None => {
                self.relationships.push(rel);
                true
            }
        };
        self.touch();
        Ok(inserted)
    }

    /// Replace all relationships, e.g. with a re-classified set
    pub(crate) fn replace_relationships(&mut self, relationships: Vec<Relationship>) {
        self.relationships = relationships;
        self.touch();
    }

    /// Recompute each active concept's structure type from its relationships
    pub fn refresh_structure_types(&mut self) {
        assign_structure_types(&mut self.concepts, &self.relationships);
        self.touch();
    }

    pub fn concept(&self, id: &ConceptId) -> Option<&Concept> {
        self.concepts.iter().find(|c| c.id == *id)
    }

    pub(crate) fn position(&self, id: &ConceptId) -> Option<usize> {
        self.concepts.iter().position(|c| c.id == *id)
    }

    pub fn contains_concept(&self, id: &ConceptId) -> bool {
        self.position(id).is_some()
    }

    pub fn concepts(&self) -> &[Concept] {
        &self.concepts
    }

    pub fn active_concepts(&self) -> impl Iterator<Item = &Concept> {
        self.concepts.iter().filter(|c| c.is_active())
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    /// Relationships touching a concept
    pub fn relationships_of<'a>(&'a self, id: &'a ConceptId) -> impl Iterator<Item = &'a Relationship> {
        self.relationships.iter().filter(move |r| r.touches(id))
    }

    pub fn merge_records(&self) -> &[MergeRecord] {
        &self.merge_records
    }

    pub fn merge_record(&self, duplicate_id: &ConceptId) -> Option<&MergeRecord> {
        self.merge_records.iter().find(|m| m.duplicate_id == *duplicate_id)
    }

    pub fn concept_count(&self) -> usize {
        self.concepts.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    /// Update the last modified timestamp
    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RelationshipType, StructureType};

    fn concept_record(id: Uuid, term: &str) -> ConceptRecord {
        let mut rec = ConceptRecord::from(&Concept::new(term, "").with_importance(0.5));
        rec.id = Some(id);
        rec
    }

    fn relationship_record(source: Uuid, target: Uuid, strength: f32) -> RelationshipRecord {
        let mut rec = RelationshipRecord::from(&Relationship::new(
            ConceptId::from_uuid(source),
            ConceptId::from_uuid(target),
            RelationshipType::IsA,
            StructureType::Hierarchical,
            strength,
        ));
        rec.id = None;
        rec
    }

    #[test]
    fn add_relationship_collapses_same_key_to_stronger() {
        let mut graph = DocumentGraph::new("doc");
        let a = graph.add_concept(Concept::new("A", "")).unwrap();
        let b = graph.add_concept(Concept::new("B", "")).unwrap();

        let weak = Relationship::new(a, b, RelationshipType::IsA, StructureType::Hierarchical, 0.5);
        let weak_id = weak.id;
        assert!(graph.add_relationship(weak).unwrap());

        let strong = Relationship::new(a, b, RelationshipType::IsA, StructureType::Hierarchical, 0.8);
        assert!(!graph.add_relationship(strong).unwrap());

        assert_eq!(graph.relationship_count(), 1);
        assert_eq!(graph.relationships()[0].strength, 0.8);
        assert_eq!(graph.relationships()[0].id, weak_id);
    }

    #[test]
    fn add_relationship_rejects_bad_endpoints() {
        let mut graph = DocumentGraph::new("doc");
        let a = graph.add_concept(Concept::new("A", "")).unwrap();
        let mut merged = Concept::new("B", "");
        merged.state = ConceptState::MergedInto(a);
        let b = graph.add_concept(merged).unwrap();
        let ghost = ConceptId::new();

        let to_ghost = Relationship::new(a, ghost, RelationshipType::IsA, StructureType::Hierarchical, 0.5);
        assert_eq!(graph.add_relationship(to_ghost), Err(IngestError::UnknownEndpoint(ghost)));

        let to_merged = Relationship::new(a, b, RelationshipType::IsA, StructureType::Hierarchical, 0.5);
        assert_eq!(graph.add_relationship(to_merged), Err(IngestError::MergedEndpoint(b)));

        let self_loop = Relationship::new(a, a, RelationshipType::IsA, StructureType::Hierarchical, 0.5);
        assert!(matches!(
            graph.add_relationship(self_loop),
            Err(IngestError::SelfRelationship(_))
        ));
    }

    #[test]
    fn from_records_validates_and_round_trips() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let record = DocumentRecord {
            id: Some(DocumentId::from("os-book")),
            name: "Operating Systems".to_string(),
            concepts: vec![concept_record(a, "Process"), concept_record(b, "Thread")],
            relationships: vec![relationship_record(a, b, 0.4), relationship_record(a, b, 0.7)],
            merge_records: Vec::new(),
        };

        let graph = DocumentGraph::from_records(record).unwrap();
        assert_eq!(graph.id.as_str(), "os-book");
        assert_eq!(graph.concept_count(), 2);
        assert_eq!(graph.relationship_count(), 1);
        assert_eq!(graph.relationships()[0].strength, 0.7);

        let again = DocumentGraph::from_records(graph.to_record()).unwrap();
        assert_eq!(again.concepts(), graph.concepts());
        assert_eq!(again.relationships(), graph.relationships());
    }

    #[test]
    fn from_records_rejects_duplicate_concepts() {
        let a = Uuid::new_v4();
        let record = DocumentRecord {
            concepts: vec![concept_record(a, "Process"), concept_record(a, "Task")],
            ..Default::default()
        };
        assert_eq!(
            DocumentGraph::from_records(record).unwrap_err(),
            IngestError::DuplicateConcept(ConceptId::from_uuid(a))
        );
    }

    #[test]
    fn from_records_rejects_unknown_endpoint() {
        let (a, ghost) = (Uuid::new_v4(), Uuid::new_v4());
        let record = DocumentRecord {
            concepts: vec![concept_record(a, "Process")],
            relationships: vec![relationship_record(a, ghost, 0.5)],
            ..Default::default()
        };
        assert_eq!(
            DocumentGraph::from_records(record).unwrap_err(),
            IngestError::UnknownEndpoint(ConceptId::from_uuid(ghost))
        );
    }

    #[test]
    fn document_record_parses_minimal_json() {
        let json = r#"{
            "name": "notes",
            "concepts": [
                { "term": "Heap", "definition": "dynamic memory" },
                { "term": "Stack", "definition": "call frames" }
            ]
        }"#;
        let record: DocumentRecord = serde_json::from_str(json).unwrap();
        let graph = DocumentGraph::from_records(record).unwrap();
        assert_eq!(graph.name, "notes");
        assert_eq!(graph.active_concepts().count(), 2);
        assert!(graph.merge_records().is_empty());
    }
}
