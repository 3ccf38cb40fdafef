//! Scripted validators

use async_trait::async_trait;
use concord::{Concept, ExternalValidator, Judgment, PatternResult, ValidatorError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Confirms the pattern hint on even calls and fails on odd ones.
#[derive(Default)]
pub struct FlakyValidator {
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl FlakyValidator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExternalValidator for FlakyValidator {
    fn id(&self) -> &str {
        "flaky"
    }

    async fn validate(
        &self,
        _a: &Concept,
        _b: &Concept,
        hint: &PatternResult,
    ) -> Result<Judgment, ValidatorError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n % 2 == 1 {
            return Err(ValidatorError::MalformedJudgment("scripted failure".to_string()));
        }
        Ok(Judgment {
            structure_category: hint.dominant_category,
            relationship_type: hint.suggested_type,
            direction: Default::default(),
            strength: hint.confidence,
            reasoning: "scripted confirmation".to_string(),
        })
    }
}

/// Never finishes its availability check.
pub struct StallingValidator;

#[async_trait]
impl ExternalValidator for StallingValidator {
    fn id(&self) -> &str {
        "stalling"
    }

    async fn is_available(&self) -> bool {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        true
    }

    async fn validate(
        &self,
        _a: &Concept,
        _b: &Concept,
        _hint: &PatternResult,
    ) -> Result<Judgment, ValidatorError> {
        Err(ValidatorError::Unavailable("never reached".to_string()))
    }
}
