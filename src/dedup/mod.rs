//! Duplicate concept detection and reversible merging

mod engine;
mod similarity;

pub use engine::{
    DeduplicationEngine, DuplicateCandidate, MergeError, MergePreview, MergeRecord,
    MergeRejection, RedirectedEndpoint, RemovedRelationship,
};
pub use similarity::{edit_distance_similarity, SimilarityMatch, SimilarityRule, SimilarityScorer};
