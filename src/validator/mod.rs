//! External semantic validation of candidate relationships
//!
//! The validator is an oracle: given a concept pair and the pattern
//! matcher's hint, it returns a refined [`Judgment`]. Implementations:
//! - [`LlmOrcValidator`]: asks an llm-orc ensemble (production)
//! - [`StubValidator`]: deterministic, network-free (tests, offline runs)
//!
//! Calls go through a [`ValidationGate`] that bounds concurrency and applies
//! a per-call timeout. Every failure is local to one pair; callers fall back
//! to pattern-only results and mark the relationship degraded.

mod gate;
mod llm;
mod stub;

pub use gate::{ValidationGate, ValidationRequest};
pub use llm::LlmOrcValidator;
pub use stub::{StubMode, StubValidator};

use crate::classify::PatternResult;
use crate::model::{Concept, RelationshipType, StructureType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Why a validator call produced no usable judgment
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidatorError {
    #[error("validator unavailable: {0}")]
    Unavailable(String),

    #[error("validator timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed judgment: {0}")]
    MalformedJudgment(String),
}

/// Orientation of a judged relationship relative to the (a, b) pair asked about
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgmentDirection {
    /// a → b
    #[default]
    Forward,
    /// b → a
    Reverse,
}

/// A refined relationship judgment from the validator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    pub structure_category: StructureType,
    pub relationship_type: RelationshipType,
    #[serde(default)]
    pub direction: JudgmentDirection,
    pub strength: f32,
    #[serde(default)]
    pub reasoning: String,
}

impl Judgment {
    /// Parse a judgment from a JSON object.
    ///
    /// Accepts `category` for `structure_category` and `relationship` for
    /// `relationship_type`. Strength must be a finite number in [0, 1].
    pub fn from_value(value: serde_json::Value) -> Result<Self, ValidatorError> {
        let mut value = value;
        if let Some(obj) = value.as_object_mut() {
            rename_key(obj, "category", "structure_category");
            rename_key(obj, "relationship", "relationship_type");
        }

        let judgment: Judgment = serde_json::from_value(value)
            .map_err(|e| ValidatorError::MalformedJudgment(e.to_string()))?;

        if !judgment.strength.is_finite() || !(0.0..=1.0).contains(&judgment.strength) {
            return Err(ValidatorError::MalformedJudgment(format!(
                "strength {} outside [0, 1]",
                judgment.strength
            )));
        }
        Ok(judgment)
    }
}

fn rename_key(obj: &mut serde_json::Map<String, serde_json::Value>, from: &str, to: &str) {
    if !obj.contains_key(to) {
        if let Some(v) = obj.remove(from) {
            obj.insert(to.to_string(), v);
        }
    }
}

/// Oracle consulted to refine or confirm a candidate relationship.
#[async_trait]
pub trait ExternalValidator: Send + Sync {
    /// Stable identifier, used in logs.
    fn id(&self) -> &str;

    /// Cheap reachability check, run once per batch.
    async fn is_available(&self) -> bool {
        true
    }

    async fn validate(
        &self,
        a: &Concept,
        b: &Concept,
        hint: &PatternResult,
    ) -> Result<Judgment, ValidatorError>;
}
