//! Azure-style provider: a synchronous chat client (the GitHub Models inference
//! endpoint) driven from the async server by offloading each call to Tokio's
//! blocking pool.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use super::{ChatRequest, ChatResponse, Completion, LlmProvider, LlmRequest};

pub const GITHUB_MODELS_ENDPOINT: &str = "https://models.github.ai/inference";

/// Substrings (lowercase) that mark an unstructured error message as throttling.
///
/// "too many requests" can also match unrelated error text.
pub const RATE_LIMIT_KEYWORDS: &[&str] = &[
    "ratelimitreached",
    "rate limit",
    "429",
    "quota exceeded",
    "too many requests",
];

/// Failure raised by a blocking chat backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend answered with a structured HTTP error.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    /// Anything else (transport, decoding, SDK-level errors) carried as text.
    #[error("{0}")]
    Transport(String),
}

/// A synchronous chat completion client.
pub trait BlockingChatClient: Send + Sync + 'static {
    fn complete(&self, request: &LlmRequest) -> Result<String, BackendError>;
}

/// Fallback classifier for unstructured errors.
pub fn looks_rate_limited(message: &str) -> bool {
    let lower = message.to_lowercase();
    RATE_LIMIT_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Map a backend error to the adapter result.
pub fn classify_error(model: &str, err: &BackendError) -> Completion {
    match err {
        BackendError::Http { status: 429, .. } => {
            warn!("Azure rate limit hit for model {}", model);
            Completion::RateLimited
        }
        BackendError::Http { status, body } => {
            error!("Azure HTTP error {} for model {}: {}", status, model, body);
            Completion::Unavailable
        }
        BackendError::Transport(msg) if looks_rate_limited(msg) => {
            warn!("Azure rate limit detected in error message for model {}: {}", model, msg);
            Completion::RateLimited
        }
        BackendError::Transport(msg) => {
            error!("Error processing request with model {}: {}", model, msg);
            Completion::Unavailable
        }
    }
}

/// Adapter running a [`BlockingChatClient`] off the async scheduler.
pub struct AzureStyleProvider<C: BlockingChatClient> {
    client: Arc<C>,
    temperature: f32,
    top_p: f32,
}

impl<C: BlockingChatClient> AzureStyleProvider<C> {
    pub fn new(client: C) -> Self {
        Self {
            client: Arc::new(client),
            temperature: 0.7,
            top_p: 1.0,
        }
    }

    pub fn with_sampling(mut self, temperature: f32, top_p: f32) -> Self {
        self.temperature = temperature;
        self.top_p = top_p;
        self
    }
}

#[async_trait::async_trait]
impl<C: BlockingChatClient> LlmProvider for AzureStyleProvider<C> {
    async fn generate(&self, mut request: LlmRequest) -> Completion {
        request.temperature.get_or_insert(self.temperature);
        request.top_p.get_or_insert(self.top_p);

        let model = request.model.clone();
        let client = Arc::clone(&self.client);

        info!("Starting Azure API call to model: {}", model);
        let joined = tokio::task::spawn_blocking(move || client.complete(&request)).await;

        match joined {
            Ok(Ok(text)) => {
                info!("Successfully got response from Azure model: {}", model);
                Completion::Text(text.trim().to_string())
            }
            Ok(Err(err)) => classify_error(&model, &err),
            Err(join_err) => {
                error!("Azure worker for model {} did not complete: {}", model, join_err);
                Completion::Unavailable
            }
        }
    }
}

/// Blocking client for the GitHub Models (Azure AI inference) chat endpoint.
pub struct GithubModelsClient {
    endpoint: String,
    token: Option<String>,
    timeout: Duration,
}

impl GithubModelsClient {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout = Duration::from_secs(timeout_secs);
        self
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }
}

impl BlockingChatClient for GithubModelsClient {
    fn complete(&self, request: &LlmRequest) -> Result<String, BackendError> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| BackendError::Transport("GitHub Models token is not configured".into()))?;

        let timeout = request
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.timeout);

        // Built per call: a blocking client must not be dropped inside the async runtime.
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let response = client
            .post(self.url())
            .bearer_auth(token)
            .json(&ChatRequest::from_request(request))
            .send()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(BackendError::Http { status: status.as_u16(), body });
        }

        let body: ChatResponse = response
            .json()
            .map_err(|e| BackendError::Transport(format!("failed to decode response: {}", e)))?;
        body.first_text()
            .ok_or_else(|| BackendError::Transport("response has no choices".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_heuristic_is_case_insensitive() {
        assert!(looks_rate_limited("Quota Exceeded for this model"));
        assert!(looks_rate_limited("RateLimitReached: wait 60 seconds"));
        assert!(looks_rate_limited("upstream said: Too Many Requests"));
        assert!(looks_rate_limited("status code 429"));
        assert!(!looks_rate_limited("connection reset by peer"));
    }

    #[test]
    fn structured_errors_ignore_the_heuristic() {
        let err = BackendError::Http { status: 500, body: "too many requests in queue".into() };
        assert_eq!(classify_error("m", &err), Completion::Unavailable);

        let err = BackendError::Http { status: 429, body: String::new() };
        assert_eq!(classify_error("m", &err), Completion::RateLimited);
    }

    #[test]
    fn unstructured_errors_use_the_heuristic() {
        let err = BackendError::Transport("quota exceeded".into());
        assert_eq!(classify_error("m", &err), Completion::RateLimited);

        let err = BackendError::Transport("dns failure".into());
        assert_eq!(classify_error("m", &err), Completion::Unavailable);
    }

    #[test]
    fn chat_url_tolerates_trailing_slash() {
        let client = GithubModelsClient::new("https://models.github.ai/inference/", None);
        assert_eq!(client.url(), "https://models.github.ai/inference/chat/completions");
    }
}
