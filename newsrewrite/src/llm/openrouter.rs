use std::time::Duration;

use reqwest::StatusCode;
use tracing::{error, info, warn};

use super::{ChatRequest, ChatResponse, Completion, LlmProvider, LlmRequest};

pub const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// OpenRouter provider using its OpenAI-compatible HTTP API
pub struct OpenRouterProvider {
    api_url: String,
    api_key: Option<String>,
    default_timeout: Duration,
    client: reqwest::Client,
}

impl OpenRouterProvider {
    pub fn new(api_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key,
            default_timeout: Duration::from_secs(60),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.default_timeout = Duration::from_secs(timeout_secs);
        self
    }
}

impl OpenRouterProvider {
    /// One request/response exchange, body decoding included.
    async fn exchange(&self, api_key: &str, request: &LlmRequest) -> Completion {
        let response = match self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&ChatRequest::from_request(request))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                error!("OpenRouter request failed for model {}: {}", request.model, e);
                return Completion::Unavailable;
            }
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Rate limit hit for OpenRouter model {}", request.model);
            return Completion::RateLimited;
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("OpenRouter API error {} for model {}: {}", status, request.model, body);
            return Completion::Unavailable;
        }

        match response.json::<ChatResponse>().await {
            Ok(body) => match body.first_text() {
                Some(text) => {
                    info!("Successfully received response from OpenRouter model {}", request.model);
                    Completion::Text(text)
                }
                None => {
                    error!("OpenRouter response for model {} has no content", request.model);
                    Completion::Unavailable
                }
            },
            Err(e) => {
                error!("Failed to parse OpenRouter response for model {}: {}", request.model, e);
                Completion::Unavailable
            }
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenRouterProvider {
    async fn generate(&self, request: LlmRequest) -> Completion {
        let Some(api_key) = self.api_key.as_deref() else {
            error!("OpenRouter API key is not configured; cannot call model {}", request.model);
            return Completion::Unavailable;
        };

        let timeout = request
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        info!("Calling OpenRouter API with model {}", request.model);

        // The deadline covers headers and body alike
        match tokio::time::timeout(timeout, self.exchange(api_key, &request)).await {
            Ok(completion) => completion,
            Err(_) => {
                error!("OpenRouter request timed out after {:?} for model {}", timeout, request.model);
                Completion::Unavailable
            }
        }
    }
}
