//! Merge and undo through the engine and across persistence

mod common;

use concord::{
    ConceptId, ConceptState, ConcordEngine, ConcordError, DeduplicationEngine, DocumentGraph,
    DocumentRecord, EngineConfig, MergeError, MergeRejection, StubValidator,
};
use std::collections::HashSet;
use std::sync::Arc;

fn engine() -> ConcordEngine {
    ConcordEngine::new(Arc::new(StubValidator::echo()), EngineConfig::default())
}

fn assert_consistent(graph: &DocumentGraph) {
    let mut keys = HashSet::new();
    for rel in graph.relationships() {
        assert_ne!(rel.source_id, rel.target_id);
        assert!(keys.insert(rel.key()));
        for end in [rel.source_id, rel.target_id] {
            let concept = graph.concept(&end).expect("endpoint exists");
            assert!(concept.is_active(), "relationship touches merged concept {}", end);
        }
    }
}

#[tokio::test]
async fn merge_then_undo_restores_document() {
    let engine = engine();
    let (graph, ids) = common::virtualization_document();
    let original_concepts = graph.concepts().to_vec();
    let original_relationships = graph.relationships().to_vec();
    let doc = engine.insert_document(graph);

    let candidates = engine.find_duplicates(&doc, None).await.unwrap();
    let top = candidates.first().expect("VM pair detected");
    let pair: HashSet<ConceptId> = [top.concept_a, top.concept_b].into_iter().collect();
    assert_eq!(pair, [ids.vm, ids.virtual_machine].into_iter().collect());

    let merged = engine.merge(&doc, ids.virtual_machine, ids.vm).await.unwrap();
    assert_eq!(merged.importance_score, 0.8);
    assert!(merged.neighbor_terms.contains("Hypervisor"));

    let after = engine.document(&doc).await.unwrap();
    assert_eq!(
        after.concept(&ids.vm).unwrap().state,
        ConceptState::MergedInto(ids.virtual_machine)
    );
    assert_consistent(&after);
    // hyp→vm collapses into hyp→VMach, the vm↔VMach self loop disappears
    assert_eq!(after.relationship_count(), original_relationships.len() - 2);

    let restored = engine.undo_merge(&doc, ids.vm).await.unwrap();
    assert!(restored.is_active());

    let undone = engine.document(&doc).await.unwrap();
    assert_eq!(undone.concepts(), original_concepts.as_slice());
    assert_eq!(undone.relationships(), original_relationships.as_slice());
    assert!(undone.merge_records().is_empty());
}

#[tokio::test]
async fn merging_a_merged_concept_is_rejected_without_mutation() {
    let engine = engine();
    let (graph, ids) = common::virtualization_document();
    let doc = engine.insert_document(graph);

    engine.merge(&doc, ids.virtual_machine, ids.vm).await.unwrap();
    let before = engine.document(&doc).await.unwrap();

    let err = engine.merge(&doc, ids.hypervisor, ids.vm).await.unwrap_err();
    assert!(matches!(
        err,
        ConcordError::Merge(MergeError::InvalidMergeRequest(MergeRejection::NotActive(id))) if id == ids.vm
    ));

    let after = engine.document(&doc).await.unwrap();
    assert_eq!(after.concepts(), before.concepts());
    assert_eq!(after.relationships(), before.relationships());
    assert_eq!(after.merge_records().len(), 1);
}

#[tokio::test]
async fn undo_twice_reports_no_record() {
    let engine = engine();
    let (graph, ids) = common::virtualization_document();
    let doc = engine.insert_document(graph);

    engine.merge(&doc, ids.virtual_machine, ids.vm).await.unwrap();
    engine.undo_merge(&doc, ids.vm).await.unwrap();
    let err = engine.undo_merge(&doc, ids.vm).await.unwrap_err();
    assert!(matches!(err, ConcordError::Merge(MergeError::UndoNotAvailable(id)) if id == ids.vm));
}

#[tokio::test]
async fn concurrent_merges_stay_consistent() {
    let engine = Arc::new(engine());

    let mut docs = Vec::new();
    for _ in 0..4 {
        let (graph, ids) = common::virtualization_document();
        docs.push((engine.insert_document(graph), ids));
    }
    let (shared_graph, shared) = common::virtualization_document();
    let shared_doc = engine.insert_document(shared_graph);

    let mut handles = Vec::new();
    for (doc, ids) in &docs {
        let engine = engine.clone();
        let (doc, primary, duplicate) = (doc.clone(), ids.virtual_machine, ids.vm);
        handles.push(tokio::spawn(async move { engine.merge(&doc, primary, duplicate).await }));
    }
    // Two disjoint pairs against the same document
    for (primary, duplicate) in [
        (shared.virtual_machine, shared.vm),
        (shared.hypervisor, shared.guest_os),
    ] {
        let engine = engine.clone();
        let doc = shared_doc.clone();
        handles.push(tokio::spawn(async move { engine.merge(&doc, primary, duplicate).await }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for (doc, ids) in &docs {
        let graph = engine.document(doc).await.unwrap();
        assert_consistent(&graph);
        assert!(!graph.concept(&ids.vm).unwrap().is_active());
    }
    let graph = engine.document(&shared_doc).await.unwrap();
    assert_consistent(&graph);
    assert_eq!(graph.merge_records().len(), 2);
    assert_eq!(graph.active_concepts().count(), 2);
}

#[test]
fn undo_survives_a_persistence_round_trip() {
    let dedup = DeduplicationEngine::default();
    let (mut graph, ids) = common::virtualization_document();
    let original_concepts = graph.concepts().to_vec();
    let original_relationships = graph.relationships().to_vec();

    dedup.merge(&mut graph, ids.virtual_machine, ids.vm).unwrap();

    let json = serde_json::to_string(&graph.to_record()).unwrap();
    let record: DocumentRecord = serde_json::from_str(&json).unwrap();
    let mut reloaded = DocumentGraph::from_records(record).unwrap();
    assert_eq!(reloaded.merge_records().len(), 1);

    dedup.undo_merge(&mut reloaded, ids.vm).unwrap();
    assert_eq!(reloaded.concepts(), original_concepts.as_slice());
    assert_eq!(reloaded.relationships(), original_relationships.as_slice());
}
