//! Deterministic validator for tests and offline runs

use super::{ExternalValidator, Judgment, JudgmentDirection, ValidatorError};
use crate::classify::PatternResult;
use crate::model::Concept;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// What the stub answers with
#[derive(Debug, Clone)]
pub enum StubMode {
    /// Confirm the pattern hint: same category, type and confidence
    EchoHint,
    /// Always return this judgment
    Fixed(Judgment),
    /// Fail as if the service were unreachable
    Unavailable,
    /// Fail as if the response could not be parsed
    Malformed,
}

/// Network-free validator with scripted behavior.
///
/// Counts calls so tests can check how many pairs reached the oracle.
pub struct StubValidator {
    mode: StubMode,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubValidator {
    pub fn new(mode: StubMode) -> Self {
        Self {
            mode,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Echoes the pattern hint back as a judgment
    pub fn echo() -> Self {
        Self::new(StubMode::EchoHint)
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `validate` calls received so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for StubValidator {
    fn default() -> Self {
        Self::echo()
    }
}

#[async_trait]
impl ExternalValidator for StubValidator {
    fn id(&self) -> &str {
        "stub"
    }

    async fn validate(
        &self,
        a: &Concept,
        b: &Concept,
        hint: &PatternResult,
    ) -> Result<Judgment, ValidatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.mode {
            StubMode::EchoHint => Ok(Judgment {
                structure_category: hint.dominant_category,
                relationship_type: hint.suggested_type,
                direction: JudgmentDirection::Forward,
                strength: hint.confidence.clamp(0.0, 1.0),
                reasoning: format!(
                    "pattern hint for '{}' / '{}': {} ({} hierarchical, {} sequential matches)",
                    a.term,
                    b.term,
                    hint.dominant_category,
                    hint.hierarchical.matches,
                    hint.sequential.matches
                ),
            }),
            StubMode::Fixed(judgment) => Ok(judgment.clone()),
            StubMode::Unavailable => Err(ValidatorError::Unavailable(
                "stub configured as unavailable".to_string(),
            )),
            StubMode::Malformed => Err(ValidatorError::MalformedJudgment(
                "stub configured to return garbage".to_string(),
            )),
        }
    }
}
