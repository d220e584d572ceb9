/// Core trait for chat-completion providers.
///
/// Implementations own their error boundary: every failure is folded into a
/// [`Completion`] value, nothing is returned as an error or allowed to panic
/// past `generate`.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, request: LlmRequest) -> Completion;
}

/// Request structure for a single chat completion
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub timeout_seconds: Option<u64>,
}

impl LlmRequest {
    pub fn new(model: impl Into<String>, system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: system.into(),
            prompt: prompt.into(),
            temperature: None,
            top_p: None,
            timeout_seconds: None,
        }
    }
}

/// Raw provider result: text, the rate-limit signal, or a generic failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Text(String),
    RateLimited,
    Unavailable,
}

pub mod azure;
pub mod openrouter;

// OpenAI-compatible chat structures shared by both providers
#[derive(Debug, serde::Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

#[derive(Debug, serde::Serialize)]
pub(crate) struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

impl<'a> ChatRequest<'a> {
    pub fn from_request(request: &'a LlmRequest) -> Self {
        Self {
            model: &request.model,
            messages: vec![
                ChatMessage { role: "system", content: &request.system },
                ChatMessage { role: "user", content: &request.prompt },
            ],
            temperature: request.temperature,
            top_p: request.top_p,
        }
    }
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct ChatResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatResponse {
    /// Text of the first choice, trimmed. `None` when there are no choices or no content.
    pub fn first_text(&self) -> Option<String> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(|s| s.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_carries_system_and_user_messages() {
        let mut req = LlmRequest::new("openai/gpt-4.1", "be an editor", "Original news:");
        req.temperature = Some(0.7);
        let body = serde_json::to_value(ChatRequest::from_request(&req)).unwrap();

        assert_eq!(body["model"], "openai/gpt-4.1");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Original news:");
        assert!(body.get("top_p").is_none());
    }

    #[test]
    fn first_text_is_trimmed() {
        let resp: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"  नमस्ते \n"}}]}"#,
        )
        .unwrap();
        assert_eq!(resp.first_text().as_deref(), Some("नमस्ते"));

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(empty.first_text().is_none());
    }
}
