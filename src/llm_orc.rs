//! llm-orc transport for the relationship validator
//!
//! An ensemble is invoked with a JSON payload describing one concept pair
//! and answers with per-agent outputs. [`HttpClient`] talks to a running
//! llm-orc server; [`ScriptedClient`] replays canned answers for tests and
//! offline runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Agent whose output wins when an ensemble has one.
const SYNTHESIZER: &str = "synthesizer";

/// Overall outcome reported by llm-orc for an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStatus {
    Completed,
    CompletedWithErrors,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Output of a single ensemble agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentOutput {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Response to an ensemble invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleResponse {
    /// Agent name to output, ordered by name
    pub results: BTreeMap<String, AgentOutput>,
    pub status: InvocationStatus,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl EnsembleResponse {
    /// A completed response where every agent answered the given text.
    pub fn answered(agents: &[(&str, &str)]) -> Self {
        let results = agents
            .iter()
            .map(|(name, text)| {
                (
                    name.to_string(),
                    AgentOutput {
                        response: Some(text.to_string()),
                        error: None,
                    },
                )
            })
            .collect();
        Self {
            results,
            status: InvocationStatus::Completed,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn failed(&self) -> bool {
        self.status == InvocationStatus::Failed
    }

    /// The text carrying the ensemble's verdict.
    ///
    /// The synthesizer agent answers for the ensemble when present;
    /// otherwise the last error-free agent by name does.
    pub fn verdict(&self) -> Option<&str> {
        if let Some(text) = self
            .results
            .get(SYNTHESIZER)
            .and_then(|out| out.response.as_deref())
        {
            return Some(text);
        }
        self.results
            .values()
            .rev()
            .filter(|out| out.error.is_none())
            .find_map(|out| out.response.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LlmOrcError {
    #[error("llm-orc unreachable: {0}")]
    Unreachable(String),
    #[error("unknown ensemble '{0}'")]
    UnknownEnsemble(String),
    #[error("llm-orc returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("cannot decode llm-orc response: {0}")]
    Decode(String),
}

/// Transport to an llm-orc deployment.
#[async_trait]
pub trait LlmOrcClient: Send + Sync {
    /// Whether the server answers its health check.
    async fn health(&self) -> bool;

    async fn invoke(
        &self,
        ensemble: &str,
        input: &serde_json::Value,
    ) -> Result<EnsembleResponse, LlmOrcError>;
}

/// Client for the llm-orc HTTP API.
///
/// Invocations go to `POST {base}/ensembles/{name}/invoke` with body
/// `{"input": <payload as string>}`; health is `GET {base}/health`.
pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Per-request transport timeout. The validation gate enforces its own
    /// deadline on top.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl LlmOrcClient for HttpClient {
    async fn health(&self) -> bool {
        self.http
            .get(self.endpoint("health"))
            .timeout(self.timeout)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn invoke(
        &self,
        ensemble: &str,
        input: &serde_json::Value,
    ) -> Result<EnsembleResponse, LlmOrcError> {
        let url = self.endpoint(&format!("ensembles/{}/invoke", ensemble));
        let body = serde_json::json!({ "input": input.to_string() });
        let response = self
            .http
            .post(url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| LlmOrcError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LlmOrcError::UnknownEnsemble(ensemble.to_owned()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmOrcError::Rejected {
                status: status.as_u16(),
                body: snippet(&text),
            });
        }

        response
            .json::<EnsembleResponse>()
            .await
            .map_err(|e| LlmOrcError::Decode(e.to_string()))
    }
}

/// In-process client that replays canned replies per ensemble.
pub struct ScriptedClient {
    reachable: bool,
    delay: Option<Duration>,
    replies: HashMap<String, Result<EnsembleResponse, LlmOrcError>>,
}

impl ScriptedClient {
    pub fn reachable() -> Self {
        Self {
            reachable: true,
            delay: None,
            replies: HashMap::new(),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::reachable()
        }
    }

    /// Reply to `ensemble` with a completed response from one agent.
    pub fn answering(self, ensemble: &str, text: &str) -> Self {
        self.replying(ensemble, EnsembleResponse::answered(&[(ensemble, text)]))
    }

    pub fn replying(mut self, ensemble: &str, response: EnsembleResponse) -> Self {
        self.replies.insert(ensemble.to_owned(), Ok(response));
        self
    }

    pub fn failing(mut self, ensemble: &str, error: LlmOrcError) -> Self {
        self.replies.insert(ensemble.to_owned(), Err(error));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl LlmOrcClient for ScriptedClient {
    async fn health(&self) -> bool {
        self.reachable
    }

    async fn invoke(
        &self,
        ensemble: &str,
        _input: &serde_json::Value,
    ) -> Result<EnsembleResponse, LlmOrcError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if !self.reachable {
            return Err(LlmOrcError::Unreachable("scripted client is offline".to_owned()));
        }
        self.replies
            .get(ensemble)
            .cloned()
            .unwrap_or_else(|| Err(LlmOrcError::UnknownEnsemble(ensemble.to_owned())))
    }
}

/// First 200 characters of a response body, for errors and logs.
pub(crate) fn snippet(text: &str) -> String {
    text.chars().take(200).collect()
}
