//! Validator backed by an llm-orc ensemble
//!
//! The ensemble receives both concepts and the pattern hint as JSON and is
//! expected to answer with a judgment object:
//!
//! ```json
//! {
//!   "structure_category": "hierarchical",
//!   "relationship_type": "is_a",
//!   "direction": "forward",
//!   "strength": 0.85,
//!   "reasoning": "a virtual machine is a kind of emulator"
//! }
//! ```

use super::{ExternalValidator, Judgment, ValidatorError};
use crate::classify::PatternResult;
use crate::llm_orc::{snippet, LlmOrcClient, LlmOrcError};
use crate::model::Concept;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Excerpts sent per concept; long documents would otherwise blow the prompt.
const MAX_EXCERPTS: usize = 3;

/// Pull the judgment object out of free-form model output.
///
/// Models answer with bare JSON, a fenced code block, or JSON surrounded by
/// prose. Each shape is tried in that order; only objects are accepted.
pub(crate) fn extract_json(text: &str) -> Option<serde_json::Value> {
    let text = text.trim();
    let object = |slice: &str| {
        serde_json::from_str::<serde_json::Value>(slice.trim())
            .ok()
            .filter(serde_json::Value::is_object)
    };

    object(text)
        .or_else(|| fenced_block(text).and_then(object))
        .or_else(|| {
            let open = text.find('{')?;
            let close = text.rfind('}')?;
            (open < close).then(|| &text[open..=close]).and_then(object)
        })
}

/// Body of the first ``` fence, with an optional language tag skipped.
fn fenced_block(text: &str) -> Option<&str> {
    let after_open = &text[text.find("```")? + 3..];
    let body = match after_open.find('\n') {
        Some(newline) if !after_open[..newline].contains('{') => &after_open[newline + 1..],
        _ => after_open,
    };
    body.find("```").map(|close| &body[..close])
}

/// Asks an llm-orc ensemble to judge a concept pair.
pub struct LlmOrcValidator {
    client: Arc<dyn LlmOrcClient>,
    ensemble_name: String,
}

impl LlmOrcValidator {
    pub fn new(client: Arc<dyn LlmOrcClient>, ensemble_name: impl Into<String>) -> Self {
        Self {
            client,
            ensemble_name: ensemble_name.into(),
        }
    }

    /// Build the ensemble input for one pair.
    fn build_input(&self, a: &Concept, b: &Concept, hint: &PatternResult) -> serde_json::Value {
        let concept_json = |c: &Concept| {
            serde_json::json!({
                "id": c.id,
                "term": c.term,
                "definition": c.definition,
                "excerpts": c.source_excerpts.iter().take(MAX_EXCERPTS).collect::<Vec<_>>(),
            })
        };

        serde_json::json!({
            "concept_a": concept_json(a),
            "concept_b": concept_json(b),
            "pattern_hint": {
                "dominant_category": hint.dominant_category,
                "confidence": hint.confidence,
                "suggested_type": hint.suggested_type,
                "hierarchical_matches": hint.hierarchical.matches,
                "sequential_matches": hint.sequential.matches,
            },
        })
    }

    fn parse_response(&self, response_text: &str) -> Result<Judgment, ValidatorError> {
        let value = extract_json(response_text).ok_or_else(|| {
            warn!(
                ensemble = %self.ensemble_name,
                raw = %snippet(response_text),
                "no JSON object in validator response"
            );
            ValidatorError::MalformedJudgment("no JSON object in response".to_string())
        })?;

        Judgment::from_value(value).map_err(|e| {
            warn!(
                ensemble = %self.ensemble_name,
                raw = %snippet(response_text),
                error = %e,
                "validator response is not a judgment"
            );
            e
        })
    }
}

#[async_trait]
impl ExternalValidator for LlmOrcValidator {
    fn id(&self) -> &str {
        "llm-orc"
    }

    async fn is_available(&self) -> bool {
        self.client.health().await
    }

    async fn validate(
        &self,
        a: &Concept,
        b: &Concept,
        hint: &PatternResult,
    ) -> Result<Judgment, ValidatorError> {
        let input = self.build_input(a, b, hint);

        let response = self
            .client
            .invoke(&self.ensemble_name, &input)
            .await
            .map_err(|e| match e {
                LlmOrcError::Decode(msg) => ValidatorError::MalformedJudgment(msg),
                other => ValidatorError::Unavailable(other.to_string()),
            })?;

        if response.failed() {
            return Err(ValidatorError::Unavailable(
                format!("ensemble '{}' reported failure", self.ensemble_name),
            ));
        }

        let text = response.verdict().ok_or_else(|| {
            ValidatorError::MalformedJudgment("no agent responses in llm-orc result".to_string())
        })?;

        debug!(source = %a.id, target = %b.id, "validator responded");
        self.parse_response(text)
    }
}
