//! Concord: Concept Relationship Classification & Deduplication Engine
//!
//! Given the concepts extracted from a document, Concord infers typed
//! structural relationships between them and finds, merges and un-merges
//! duplicate concepts.
//!
//! # Core Concepts
//!
//! - **Concepts**: term + definition + source context, `Active` or `MergedInto` a primary
//! - **Relationships**: typed, directed, weighted edges; hierarchical, sequential or unclassified
//! - **Validator**: an external oracle refining candidate relationships; failures degrade
//!   single pairs to pattern-only results
//! - **Documents**: the unit of deduplication and of write serialization
//!
//! # Example
//!
//! ```
//! use concord::{Concept, ConcordEngine, DocumentGraph, EngineConfig, StubValidator};
//! use std::sync::Arc;
//!
//! let engine = ConcordEngine::new(Arc::new(StubValidator::echo()), EngineConfig::default());
//! let mut doc = DocumentGraph::new("notes");
//! doc.add_concept(Concept::new("VM", "a software emulation of a computer")).unwrap();
//! let id = engine.insert_document(doc);
//! assert!(engine.has_document(&id));
//! ```

pub mod classify;
pub mod config;
pub mod dedup;
pub mod document;
pub mod llm_orc;
pub mod model;
pub mod validator;

pub use classify::{ClassificationReport, ContextAnalyzer, PatternMatcher, PatternResult, RelationshipClassifier};
pub use config::{ConfigError, EngineConfig};
pub use dedup::{
    DeduplicationEngine, DuplicateCandidate, MergeError, MergePreview, MergeRecord, MergeRejection,
    SimilarityMatch, SimilarityRule, SimilarityScorer,
};
pub use document::{ConcordEngine, ConcordError, ConcordResult, DocumentGraph, DocumentId, DocumentRecord};
pub use model::{
    Concept, ConceptId, ConceptRecord, ConceptState, IngestError, Location, Relationship,
    RelationshipId, RelationshipRecord, RelationshipType, StructureType,
};
pub use validator::{ExternalValidator, Judgment, LlmOrcValidator, StubValidator, ValidatorError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
