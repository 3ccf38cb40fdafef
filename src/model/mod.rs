//! Core record types: concepts, relationships, and their ingress forms

mod concept;
mod record;
mod relationship;

pub use concept::{Concept, ConceptId, ConceptState, Location, StructureType};
pub use record::{ConceptRecord, IngestError, RelationshipRecord};
pub use relationship::{Relationship, RelationshipId, RelationshipKey, RelationshipType};
