//! Relationship classification
//!
//! - [`PatternMatcher`]: keyword-family scoring of a concept pair
//! - [`ContextAnalyzer`]: proximity signals (neighbors, location, excerpts)
//! - [`RelationshipClassifier`]: combines both with the external validator

mod classifier;
mod context;
mod pattern;

pub use classifier::{assign_structure_types, ClassificationReport, RelationshipClassifier};
pub use context::{ContextAnalyzer, ContextSignals};
pub use pattern::{CategoryScore, KeywordProfile, PatternMatcher, PatternResult};

pub(crate) use pattern::tokenize;
