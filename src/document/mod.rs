//! Per-document graphs and the engine that serializes writes to them

mod engine;
mod graph;

pub use engine::{ConcordEngine, ConcordError, ConcordResult};
pub use graph::{DocumentGraph, DocumentId, DocumentRecord};
