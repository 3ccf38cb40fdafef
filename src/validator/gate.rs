//! Bounded-concurrency, timed access to an external validator

use super::{ExternalValidator, Judgment, ValidatorError};
use crate::classify::PatternResult;
use crate::config::ValidatorConfig;
use crate::model::Concept;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// One pair to validate
#[derive(Debug, Clone)]
pub struct ValidationRequest {
    pub a: Arc<Concept>,
    pub b: Arc<Concept>,
    pub hint: PatternResult,
}

/// Wraps a validator with a semaphore and a per-call timeout.
///
/// Failures never escape a batch: each request yields its own `Result`,
/// in request order.
#[derive(Clone)]
pub struct ValidationGate {
    validator: Arc<dyn ExternalValidator>,
    semaphore: Arc<Semaphore>,
    timeout: Duration,
}

impl ValidationGate {
    pub fn new(validator: Arc<dyn ExternalValidator>, config: &ValidatorConfig) -> Self {
        Self {
            validator,
            semaphore: Arc::new(Semaphore::new(config.concurrency.max(1))),
            timeout: config.timeout(),
        }
    }

    pub fn validator_id(&self) -> &str {
        self.validator.id()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Validate a single pair under the gate
    pub async fn validate(&self, request: ValidationRequest) -> Result<Judgment, ValidatorError> {
        run_gated(
            self.validator.clone(),
            self.semaphore.clone(),
            self.timeout,
            request,
        )
        .await
    }

    /// Validate many pairs concurrently (bounded by the semaphore).
    ///
    /// Checks availability once up front, within the per-call timeout; when
    /// the validator is unreachable or the check stalls, every request fails
    /// fast with `Unavailable` instead of waiting out its timeout.
    pub async fn validate_batch(
        &self,
        requests: Vec<ValidationRequest>,
    ) -> Vec<Result<Judgment, ValidatorError>> {
        if requests.is_empty() {
            return Vec::new();
        }

        let available = tokio::time::timeout(self.timeout, self.validator.is_available())
            .await
            .unwrap_or(false);
        if !available {
            warn!(
                validator = self.validator.id(),
                pairs = requests.len(),
                "validator unavailable, degrading batch to pattern-only"
            );
            return requests
                .iter()
                .map(|_| {
                    Err(ValidatorError::Unavailable(format!(
                        "{} not reachable",
                        self.validator.id()
                    )))
                })
                .collect();
        }

        let handles: Vec<_> = requests
            .into_iter()
            .map(|request| {
                tokio::spawn(run_gated(
                    self.validator.clone(),
                    self.semaphore.clone(),
                    self.timeout,
                    request,
                ))
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(ValidatorError::Unavailable(format!(
                    "validator task failed: {}",
                    e
                ))),
            };
            results.push(result);
        }
        results
    }
}

async fn run_gated(
    validator: Arc<dyn ExternalValidator>,
    semaphore: Arc<Semaphore>,
    timeout: Duration,
    request: ValidationRequest,
) -> Result<Judgment, ValidatorError> {
    let _permit = semaphore
        .acquire_owned()
        .await
        .map_err(|e| ValidatorError::Unavailable(format!("semaphore closed: {}", e)))?;

    let outcome = tokio::time::timeout(
        timeout,
        validator.validate(&request.a, &request.b, &request.hint),
    )
    .await;

    match outcome {
        Ok(Ok(judgment)) => {
            debug!(
                source = %request.a.id,
                target = %request.b.id,
                category = %judgment.structure_category,
                "pair validated"
            );
            Ok(judgment)
        }
        Ok(Err(e)) => {
            warn!(
                validator = validator.id(),
                source = %request.a.id,
                target = %request.b.id,
                error = %e,
                "validator call failed"
            );
            Err(e)
        }
        Err(_) => {
            warn!(
                validator = validator.id(),
                source = %request.a.id,
                target = %request.b.id,
                timeout_ms = timeout.as_millis() as u64,
                "validator call timed out"
            );
            Err(ValidatorError::Timeout(timeout))
        }
    }
}
