//! ConcordEngine: the entry point for classification and deduplication
//!
//! Documents are registered once and then addressed by id. Each document
//! sits behind its own `RwLock`: duplicate scans and merge previews share
//! it, while classification, detection, merge and undo hold it exclusively,
//! so redirections on one document never interleave.

use super::graph::{DocumentGraph, DocumentId};
use crate::classify::{ClassificationReport, RelationshipClassifier};
use crate::config::EngineConfig;
use crate::dedup::{DeduplicationEngine, DuplicateCandidate, MergeError, MergePreview, MergeRejection};
use crate::model::{Concept, ConceptId, IngestError};
use crate::validator::{ExternalValidator, ValidationGate};
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

/// Errors that can occur in engine operations
#[derive(Debug, Error)]
pub enum ConcordError {
    #[error("document not found: {0}")]
    DocumentNotFound(DocumentId),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for engine operations
pub type ConcordResult<T> = Result<T, ConcordError>;

/// Registry of documents plus the services that operate on them.
pub struct ConcordEngine {
    documents: DashMap<DocumentId, Arc<RwLock<DocumentGraph>>>,
    classifier: RelationshipClassifier,
    dedup: DeduplicationEngine,
    config: EngineConfig,
}

impl ConcordEngine {
    /// Build an engine around the given validator.
    pub fn new(validator: Arc<dyn ExternalValidator>, config: EngineConfig) -> Self {
        let gate = ValidationGate::new(validator, &config.validator);
        Self {
            documents: DashMap::new(),
            classifier: RelationshipClassifier::new(gate, &config),
            dedup: DeduplicationEngine::new(config.dedup.clone()),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register a document, replacing any document with the same id
    pub fn insert_document(&self, graph: DocumentGraph) -> DocumentId {
        let id = graph.id.clone();
        self.documents.insert(id.clone(), Arc::new(RwLock::new(graph)));
        id
    }

    /// Snapshot of a document's current state
    pub async fn document(&self, id: &DocumentId) -> ConcordResult<DocumentGraph> {
        let handle = self.handle(id)?;
        let graph = handle.read().await;
        Ok(graph.clone())
    }

    /// Unregister a document, returning its final state
    pub async fn remove_document(&self, id: &DocumentId) -> Option<DocumentGraph> {
        let (_, handle) = self.documents.remove(id)?;
        let graph = handle.read().await;
        Some(graph.clone())
    }

    pub fn list_documents(&self) -> Vec<DocumentId> {
        self.documents.iter().map(|r| r.key().clone()).collect()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn has_document(&self, id: &DocumentId) -> bool {
        self.documents.contains_key(id)
    }

    /// Re-classify a document's existing relationships and store the result.
    pub async fn classify(&self, id: &DocumentId) -> ConcordResult<ClassificationReport> {
        let handle = self.handle(id)?;
        let mut graph = handle.write().await;

        let report = self
            .classifier
            .classify(graph.concepts(), graph.relationships())
            .await;
        graph.replace_relationships(report.relationships.clone());
        graph.refresh_structure_types();
        Ok(report)
    }

    /// Detect new relationships and add them to the document.
    ///
    /// `min_strength` defaults to `classifier.min_strength`. A detected edge
    /// sharing a key with a stored one folds into it, and the report carries
    /// the stored edge.
    pub async fn detect(
        &self,
        id: &DocumentId,
        min_strength: Option<f32>,
    ) -> ConcordResult<ClassificationReport> {
        let handle = self.handle(id)?;
        let mut graph = handle.write().await;

        let threshold = min_strength.unwrap_or_else(|| self.classifier.default_min_strength());
        let mut report = self.classifier.detect(graph.concepts(), threshold).await;

        let mut staged = graph.clone();
        for rel in report.relationships.iter_mut() {
            if staged.add_relationship(rel.clone())? {
                continue;
            }
            let key = rel.key();
            if let Some(stored) = staged.relationships().iter().find(|r| r.key() == key) {
                *rel = stored.clone();
            }
        }
        staged.refresh_structure_types();
        *graph = staged;
        Ok(report)
    }

    /// `threshold` defaults to `dedup.threshold`.
    pub async fn find_duplicates(
        &self,
        id: &DocumentId,
        threshold: Option<f32>,
    ) -> ConcordResult<Vec<DuplicateCandidate>> {
        let handle = self.handle(id)?;
        let graph = handle.read().await;
        let threshold = threshold.unwrap_or_else(|| self.dedup.threshold());
        Ok(self.dedup.find_duplicates(graph.concepts(), threshold))
    }

    pub async fn preview_merge(
        &self,
        id: &DocumentId,
        primary_id: ConceptId,
        duplicate_id: ConceptId,
    ) -> ConcordResult<MergePreview> {
        let handle = self.handle(id)?;
        let result = {
            let graph = handle.read().await;
            self.dedup.preview_merge(&graph, primary_id, duplicate_id)
        };
        match result {
            Err(e) => Err(self.explain_rejection(id, primary_id, duplicate_id, e).await),
            Ok(preview) => Ok(preview),
        }
    }

    pub async fn merge(
        &self,
        id: &DocumentId,
        primary_id: ConceptId,
        duplicate_id: ConceptId,
    ) -> ConcordResult<Concept> {
        let handle = self.handle(id)?;
        let result = {
            let mut graph = handle.write().await;
            self.dedup.merge(&mut graph, primary_id, duplicate_id)
        };
        match result {
            Err(e) => Err(self.explain_rejection(id, primary_id, duplicate_id, e).await),
            Ok(primary) => Ok(primary),
        }
    }

    pub async fn undo_merge(&self, id: &DocumentId, duplicate_id: ConceptId) -> ConcordResult<Concept> {
        let handle = self.handle(id)?;
        let mut graph = handle.write().await;
        Ok(self.dedup.undo_merge(&mut graph, duplicate_id)?)
    }

    fn handle(&self, id: &DocumentId) -> ConcordResult<Arc<RwLock<DocumentGraph>>> {
        self.documents
            .get(id)
            .map(|r| r.value().clone())
            .ok_or_else(|| ConcordError::DocumentNotFound(id.clone()))
    }

    /// Turn `NotFound` into `CrossDocument` when the missing concept lives
    /// in another registered document. Runs after the document's own lock
    /// is released.
    async fn explain_rejection(
        &self,
        id: &DocumentId,
        primary_id: ConceptId,
        duplicate_id: ConceptId,
        error: MergeError,
    ) -> ConcordError {
        let MergeError::InvalidMergeRequest(MergeRejection::NotFound(missing)) = error else {
            return error.into();
        };

        let others: Vec<(DocumentId, Arc<RwLock<DocumentGraph>>)> = self
            .documents
            .iter()
            .filter(|r| r.key() != id)
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        for (other_id, other) in others {
            if other.read().await.contains_concept(&missing) {
                info!(
                    document = %id,
                    other = %other_id,
                    concept = %missing,
                    "rejected cross-document merge"
                );
                return MergeError::from(MergeRejection::CrossDocument {
                    primary: primary_id,
                    duplicate: duplicate_id,
                })
                .into();
            }
        }
        MergeError::from(MergeRejection::NotFound(missing)).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Relationship, RelationshipType, StructureType};
    use crate::validator::StubValidator;

    fn engine() -> ConcordEngine {
        ConcordEngine::new(Arc::new(StubValidator::echo()), EngineConfig::default())
    }

    #[test]
    fn test_create_engine() {
        let engine = engine();
        assert_eq!(engine.document_count(), 0);
    }

    #[tokio::test]
    async fn test_insert_and_remove_document() {
        let engine = engine();
        let id = engine.insert_document(DocumentGraph::new("doc"));
        assert!(engine.has_document(&id));
        assert_eq!(engine.list_documents(), vec![id.clone()]);

        let removed = engine.remove_document(&id).await.unwrap();
        assert_eq!(removed.name, "doc");
        assert_eq!(engine.document_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_document() {
        let engine = engine();
        let missing = DocumentId::from("nope");
        assert!(matches!(
            engine.find_duplicates(&missing, None).await,
            Err(ConcordError::DocumentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cross_document_merge_is_rejected() {
        let engine = engine();
        let mut first = DocumentGraph::new("first");
        let a = first.add_concept(Concept::new("VM", "")).unwrap();
        let mut second = DocumentGraph::new("second");
        let b = second.add_concept(Concept::new("Virtual Machine", "")).unwrap();
        let first_id = engine.insert_document(first);
        engine.insert_document(second);

        let err = engine.merge(&first_id, a, b).await.unwrap_err();
        assert!(matches!(
            err,
            ConcordError::Merge(MergeError::InvalidMergeRequest(MergeRejection::CrossDocument { .. }))
        ));

        let ghost = ConceptId::new();
        let err = engine.merge(&first_id, a, ghost).await.unwrap_err();
        assert!(matches!(
            err,
            ConcordError::Merge(MergeError::InvalidMergeRequest(MergeRejection::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_detect_updates_structure_types() {
        let engine = engine();
        let mut graph = DocumentGraph::new("pipeline");
        let a = graph
            .add_concept(Concept::new("Ingestion", "First, raw data is collected.").with_location(1, 0))
            .unwrap();
        graph
            .add_concept(
                Concept::new("Cleaning", "Then, after ingestion, data is cleaned; finally, stored.")
                    .with_location(2, 0),
            )
            .unwrap();
        let id = engine.insert_document(graph);

        let report = engine.detect(&id, None).await.unwrap();
        assert_eq!(report.relationships.len(), 1);

        let doc = engine.document(&id).await.unwrap();
        assert_eq!(doc.relationship_count(), 1);
        assert_eq!(
            doc.concept(&a).unwrap().structure_type,
            StructureType::Sequential
        );
    }

    #[tokio::test]
    async fn test_detect_reports_stored_edge_when_folded() {
        let engine = engine();
        let mut graph = DocumentGraph::new("pipeline");
        let a = graph
            .add_concept(Concept::new("Ingestion", "First, raw data is collected.").with_location(1, 0))
            .unwrap();
        let b = graph
            .add_concept(
                Concept::new("Cleaning", "Then, after ingestion, data is cleaned; finally, stored.")
                    .with_location(2, 0),
            )
            .unwrap();
        let curated = Relationship::new(
            a,
            b,
            RelationshipType::Precedes,
            StructureType::Sequential,
            1.0,
        );
        graph.add_relationship(curated.clone()).unwrap();
        let id = engine.insert_document(graph);

        let report = engine.detect(&id, None).await.unwrap();
        assert_eq!(report.relationships.len(), 1);
        let reported = &report.relationships[0];
        assert_eq!(reported.id, curated.id);
        assert_eq!(reported.strength, 1.0);

        let doc = engine.document(&id).await.unwrap();
        assert_eq!(doc.relationships(), report.relationships.as_slice());
    }
}
