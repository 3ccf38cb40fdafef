//! Live validation against a running llm-orc server.
//!
//! Run with:
//!   CONCORD_LLM_ORC_URL=http://localhost:8080 cargo test --features real_llm --test llm_orc_live

#![cfg(feature = "real_llm")]

mod common;

use concord::llm_orc::{HttpClient, LlmOrcClient};
use concord::{ConcordEngine, DocumentGraph, EngineConfig, LlmOrcValidator};
use std::sync::Arc;

fn server_url() -> String {
    std::env::var("CONCORD_LLM_ORC_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

#[tokio::test]
async fn live_detect_validates_pipeline_pair() {
    let config = EngineConfig::default();
    let client = HttpClient::new(server_url()).with_timeout(config.validator.timeout());
    if !client.health().await {
        eprintln!("llm-orc not reachable at {}, skipping", client.base_url());
        return;
    }

    let validator = LlmOrcValidator::new(Arc::new(client), config.validator.ensemble.clone());
    let engine = ConcordEngine::new(Arc::new(validator), config);

    let (a, b) = common::pipeline_pair();
    let mut graph = DocumentGraph::new("live");
    graph.add_concept(a).unwrap();
    graph.add_concept(b).unwrap();
    let doc = engine.insert_document(graph);

    let report = engine.detect(&doc, None).await.unwrap();
    assert_eq!(report.relationships.len(), 1);
    let rel = &report.relationships[0];
    assert!((0.0..=1.0).contains(&rel.strength));
    assert!(rel.validated || rel.degraded);
}
